//! Subcommand implementations

pub mod classify;
pub mod forecast;
pub mod monitor;
pub mod status;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, TimeDelta, Utc};

/// Parse an absolute RFC 3339 time, or a relative one such as `30s`, `10m`,
/// `1h` or `2d` meaning that long before `now`.
pub fn parse_time(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(ts.with_timezone(&Utc));
    }

    let split = input
        .find(|c: char| !c.is_ascii_digit())
        .with_context(|| format!("Missing unit in '{}' (use s, m, h or d)", input))?;
    let (amount, unit) = input.split_at(split);
    let amount: i64 = amount
        .parse()
        .with_context(|| format!("Invalid time '{}'", input))?;

    let ago = match unit {
        "s" => TimeDelta::try_seconds(amount),
        "m" => TimeDelta::try_minutes(amount),
        "h" => TimeDelta::try_hours(amount),
        "d" => TimeDelta::try_days(amount),
        other => bail!("Unknown time unit '{}' (use s, m, h or d)", other),
    }
    .with_context(|| format!("Time '{}' is out of range", input))?;
    now.checked_sub_signed(ago)
        .with_context(|| format!("Time '{}' is out of range", input))
}
