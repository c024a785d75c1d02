use std::fmt;

pub const KB: u64 = 1024;
pub const MB: u64 = 1024 * KB;
pub const GB: u64 = 1024 * MB;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteSizeParseError {
    input: String,
}

impl fmt::Display for ByteSizeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid byte size {:?}; expected a number with an optional K/M/G suffix",
            self.input
        )
    }
}

impl std::error::Error for ByteSizeParseError {}

/// Parse `"512"`, `"64K"`, `"256M"`, `"1.5G"`, `"2GiB"`, ... into bytes (binary multiples).
pub fn parse_byte_size(input: &str) -> Result<u64, ByteSizeParseError> {
    let err = || ByteSizeParseError {
        input: input.to_string(),
    };

    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, suffix) = trimmed.split_at(split);
    if number.is_empty() {
        return Err(err());
    }

    let multiplier = match suffix.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" | "kib" => KB,
        "m" | "mb" | "mib" => MB,
        "g" | "gb" | "gib" => GB,
        _ => return Err(err()),
    };

    if let Ok(whole) = number.parse::<u64>() {
        return whole.checked_mul(multiplier).ok_or_else(err);
    }
    let fractional = number.parse::<f64>().map_err(|_| err())?;
    let bytes = fractional * multiplier as f64;
    if !bytes.is_finite() || bytes < 0.0 || bytes >= u64::MAX as f64 {
        return Err(err());
    }
    Ok(bytes as u64)
}

/// Render a byte count with the largest exact binary suffix.
pub fn format_byte_size(bytes: u64) -> String {
    for (unit, suffix) in [(GB, "G"), (MB, "M"), (KB, "K")] {
        if bytes >= unit && bytes % unit == 0 {
            return format!("{}{suffix}", bytes / unit);
        }
    }
    bytes.to_string()
}
