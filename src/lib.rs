//! Redis health checks: samples server state and reduces it to
//! OK / WARNING / CRITICAL against configured thresholds.
//!
//! Direct connections and Sentinel-managed groups are both supported; see
//! [`redis::EndpointResolver`]. Checks that read `INFO` share one snapshot per
//! evaluation context ([`checks::SnapshotCache`]).

pub mod appconfig;
pub mod checks;
pub mod cli;
pub mod error;
pub mod redis;
pub mod report;
pub mod units;
