use anyhow::Context;
use clap::Parser;
use redis_checks::appconfig::{AppConfig, config_path, config_sample};
use redis_checks::checks::{CheckConfig, CheckMetrics, CheckSet};
use redis_checks::cli::{Cli, OutputFormat};
use redis_checks::error::{AppError, AppResult};
use redis_checks::redis::EndpointResolver;
use redis_checks::report::{UNKNOWN_EXIT_CODE, exit_code, render_json, render_text};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.sample {
        print!("{}", config_sample());
        return ExitCode::SUCCESS;
    }

    match run(cli).await {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            println!("UNKNOWN: {e:#}");
            ExitCode::from(UNKNOWN_EXIT_CODE as u8)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let path = config_path(cli.config.as_deref());
    let cfg = AppConfig::load(&path).with_context(|| format!("loading {}", path.display()))?;

    init_tracing(&cfg.logging.level);

    let checks = select_checks(&cfg.checks, &cli.checks)?;
    let set = CheckSet::new(
        cfg.connection.clone(),
        EndpointResolver::redis(),
        CheckMetrics::new()?,
    )?;

    tracing::debug!(config = %path.display(), checks = checks.len(), "running checks");
    let outcomes = set.run_all(&checks).await;

    match cli.format {
        OutputFormat::Text => print!("{}", render_text(&outcomes)),
        OutputFormat::Json => println!("{}", render_json(&outcomes)?),
    }

    if let Some(metrics_path) = &cli.metrics_file {
        std::fs::write(metrics_path, set.metrics().encode_text()?)
            .with_context(|| format!("writing metrics to {}", metrics_path.display()))?;
    }

    Ok(exit_code(&outcomes))
}

/// Logs go to stderr; stdout carries check output only.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn select_checks(all: &[CheckConfig], names: &[String]) -> AppResult<Vec<CheckConfig>> {
    if names.is_empty() {
        return Ok(all.to_vec());
    }

    let mut picked = Vec::new();
    for name in names {
        let matching: Vec<_> = all.iter().filter(|c| c.name() == name.as_str()).cloned().collect();
        if matching.is_empty() {
            return Err(AppError::UnknownCheck(name.clone()));
        }
        picked.extend(matching);
    }
    Ok(picked)
}
