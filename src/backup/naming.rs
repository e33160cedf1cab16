//! Snapshot naming
//!
//! Generated names have the form `backup_YYYYMMDD_HHMMSS`. When two
//! snapshots land in the same second the later one gets a `_1`, `_2`, ...
//! suffix. Custom names are limited to ASCII letters, digits, `_` and `-`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::error::{SnapvaultError, SnapvaultResult};

/// Prefix of generated snapshot names
pub const NAME_PREFIX: &str = "backup_";

/// Longest accepted snapshot name
pub const MAX_NAME_LEN: usize = 128;

/// Name for a snapshot taken at `timestamp`
pub fn generate_name(timestamp: DateTime<Utc>) -> String {
    format!("{}{}", NAME_PREFIX, timestamp.format("%Y%m%d_%H%M%S"))
}

/// Check that a name is usable as a snapshot name
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Validate a user-supplied snapshot name
pub fn validate_name(name: &str) -> SnapvaultResult<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(SnapvaultError::InvalidPolicy(format!(
            "Invalid snapshot name '{}': use 1-{} letters, digits, '_' or '-'",
            name, MAX_NAME_LEN
        )))
    }
}

/// First of `base`, `base_1`, `base_2`, ... that `is_taken` rejects
pub fn unique_name(base: &str, is_taken: impl Fn(&str) -> bool) -> String {
    if !is_taken(base) {
        return base.to_string();
    }
    let mut suffix = 1u32;
    loop {
        let candidate = format!("{}_{}", base, suffix);
        if !is_taken(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

/// Recover the creation time encoded in a generated name
///
/// Accepts an optional same-second suffix. Custom names return `None`.
pub fn parse_timestamp(name: &str) -> Option<DateTime<Utc>> {
    let rest = name.strip_prefix(NAME_PREFIX)?;
    let parts: Vec<&str> = rest.split('_').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return None;
    }

    let date_part = parts[0];
    let time_part = parts[1];
    if parts.len() == 3 && parts[2].parse::<u32>().is_err() {
        return None;
    }

    if date_part.len() != 8 || time_part.len() != 6 {
        return None;
    }
    if !date_part.bytes().chain(time_part.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }

    let year: i32 = date_part[0..4].parse().ok()?;
    let month: u32 = date_part[4..6].parse().ok()?;
    let day: u32 = date_part[6..8].parse().ok()?;
    let hour: u32 = time_part[0..2].parse().ok()?;
    let minute: u32 = time_part[2..4].parse().ok()?;
    let second: u32 = time_part[4..6].parse().ok()?;

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let time = NaiveTime::from_hms_opt(hour, minute, second)?;

    Some(DateTime::from_naive_utc_and_offset(
        NaiveDateTime::new(date, time),
        Utc,
    ))
}
