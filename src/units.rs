// src/units.rs

use crate::error::{AppError, AppResult};

/// Binary magnitude suffixes, index + 1 is the power of 1024.
const SUFFIXES: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];

/// Parse a human-readable size ("128M", "1.5g", "512", "64B") into bytes.
///
/// Suffixes are single letters, case-insensitive, and multiply by 1024^n.
/// No suffix (or `B`) means raw bytes. Fractional mantissas are rounded to the
/// nearest byte.
pub fn human_to_bytes(text: &str) -> AppResult<u64> {
    let s = text.trim();
    let Some(last) = s.chars().last() else {
        return Err(AppError::Format("empty size".into()));
    };

    let (num, power) = if last.is_ascii_alphabetic() {
        let upper = last.to_ascii_uppercase();
        let power = if upper == 'B' {
            0
        } else {
            SUFFIXES
                .iter()
                .position(|c| *c == upper)
                .map(|i| i as u32 + 1)
                .ok_or_else(|| AppError::Format(format!("unknown size suffix in '{s}'")))?
        };
        (s[..s.len() - 1].trim(), power)
    } else {
        (s, 0)
    };

    if num.is_empty() {
        return Err(AppError::Format(format!("missing number in '{s}'")));
    }

    let unit = 1u64 << (10 * power);

    // Whole numbers stay in integer arithmetic so large values are exact.
    if let Ok(n) = num.parse::<u64>() {
        return n
            .checked_mul(unit)
            .ok_or_else(|| AppError::Format(format!("size '{s}' overflows u64")));
    }

    let value: f64 = num
        .parse()
        .map_err(|_| AppError::Format(format!("invalid number in '{s}'")))?;
    if !value.is_finite() || value < 0.0 {
        return Err(AppError::Format(format!("size '{s}' must be a non-negative number")));
    }

    // `u64::MAX as f64` is exactly 2^64; the saturating cast maps that to
    // u64::MAX, which is what "16.00E" renders from.
    let bytes = (value * unit as f64).round();
    if bytes > u64::MAX as f64 {
        return Err(AppError::Format(format!("size '{s}' overflows u64")));
    }
    Ok(bytes as u64)
}

/// Render a byte count with the largest suffix that keeps the mantissa >= 1,
/// two decimals. Counts under 1024 render as plain bytes ("0B", "512B").
pub fn bytes_to_human(bytes: u64) -> String {
    for (i, suffix) in SUFFIXES.iter().enumerate().rev() {
        let unit = 1u64 << (10 * (i + 1));
        if bytes >= unit {
            return format!("{:.2}{}", bytes as f64 / unit as f64, suffix);
        }
    }
    format!("{bytes}B")
}
