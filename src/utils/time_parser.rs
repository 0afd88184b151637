//! 时间参数解析（CLI 使用）

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::errors::{LinkpulseError, Result};

/// 解析过期时间，支持：
/// - RFC3339 格式：2026-10-01T12:00:00Z
/// - 相对时间：1d, 2w, 3M, 1y, 1h30m, 2d12h
pub fn parse_expire_time(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    let offset = parse_relative(input)?;
    now.checked_add_signed(offset)
        .ok_or_else(|| LinkpulseError::date_parse("Expiration time is out of range"))
}

/// 解析 YYYY-MM-DD 日期
pub fn parse_day(input: &str) -> Result<NaiveDate> {
    Ok(NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")?)
}

fn parse_relative(input: &str) -> Result<Duration> {
    let mut total = Duration::zero();
    let mut remaining = input;

    while !remaining.is_empty() {
        let digits = remaining
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(remaining.len());
        if digits == 0 {
            return Err(LinkpulseError::date_parse(format!(
                "Invalid time format: '{}'",
                input
            )));
        }
        let num: i64 = remaining[..digits]
            .parse()
            .map_err(|_| LinkpulseError::date_parse(format!("Invalid number in '{}'", input)))?;
        remaining = &remaining[digits..];

        let unit_len = remaining
            .find(|c: char| !c.is_alphabetic())
            .unwrap_or(remaining.len());
        if unit_len == 0 {
            return Err(LinkpulseError::date_parse(format!(
                "Missing time unit after '{}'",
                num
            )));
        }
        let unit = &remaining[..unit_len];
        remaining = &remaining[unit_len..];

        // "M" 表示月，其余单位大小写不敏感
        let step = match unit {
            "M" => Duration::days(num * 30),
            _ => match unit.to_lowercase().as_str() {
                "s" | "sec" | "second" | "seconds" => Duration::seconds(num),
                "m" | "min" | "minute" | "minutes" => Duration::minutes(num),
                "h" | "hour" | "hours" => Duration::hours(num),
                "d" | "day" | "days" => Duration::days(num),
                "w" | "week" | "weeks" => Duration::weeks(num),
                "month" | "months" => Duration::days(num * 30),
                "y" | "year" | "years" => Duration::days(num * 365),
                _ => {
                    return Err(LinkpulseError::date_parse(format!(
                        "Unsupported time unit: '{}'",
                        unit
                    )));
                }
            },
        };
        total += step;
    }

    if total == Duration::zero() {
        return Err(LinkpulseError::date_parse("Time offset cannot be zero"));
    }
    Ok(total)
}
