// src/report.rs

use crate::checks::types::CheckOutcome;
use crate::error::AppResult;
use serde_json::json;

/// Exit code for a check that errored instead of producing a status.
pub const UNKNOWN_EXIT_CODE: i32 = 3;

/// One line per check: `STATUS name: message`, or `UNKNOWN name: error`.
pub fn render_text(outcomes: &[CheckOutcome]) -> String {
    let mut out = String::new();
    for o in outcomes {
        match &o.result {
            Ok(r) => out.push_str(&format!("{} {}: {}\n", r.status, o.name, r.message)),
            Err(e) => out.push_str(&format!("UNKNOWN {}: {}\n", o.name, e)),
        }
    }
    out
}

pub fn render_json(outcomes: &[CheckOutcome]) -> AppResult<String> {
    let items: Vec<_> = outcomes
        .iter()
        .map(|o| match &o.result {
            Ok(r) => json!({ "name": o.name, "status": r.status, "message": r.message }),
            Err(e) => json!({ "name": o.name, "error": e.to_string() }),
        })
        .collect();
    Ok(serde_json::to_string_pretty(&items)?)
}

/// Worst outcome wins; errors count as UNKNOWN.
pub fn exit_code(outcomes: &[CheckOutcome]) -> i32 {
    outcomes
        .iter()
        .map(|o| match &o.result {
            Ok(r) => r.status.exit_code(),
            Err(_) => UNKNOWN_EXIT_CODE,
        })
        .max()
        .unwrap_or(0)
}
