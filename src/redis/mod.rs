pub mod client;
pub mod config;
pub mod resolver;
#[cfg(feature = "sentinel")]
pub mod sentinel;

pub use client::*;
pub use config::*;
pub use resolver::*;
#[cfg(feature = "sentinel")]
pub use sentinel::*;
