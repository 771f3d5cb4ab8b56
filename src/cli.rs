use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "redis-checks", about, version)]
pub struct Cli {
    /// Config file (defaults to $REDIS_CHECKS_CONFIG, then config/redis_checks.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Run only these checks (by name); repeatable
    #[arg(long = "check", value_name = "NAME")]
    pub checks: Vec<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Write Prometheus text metrics here after the run
    #[arg(long, value_name = "PATH")]
    pub metrics_file: Option<PathBuf>,

    /// Print a sample config and exit
    #[arg(long)]
    pub sample: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}
