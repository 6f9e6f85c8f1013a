// SPDX-License-Identifier: MIT

//! Date building, manipulation and interval expansion.
//!
//! Formats use strftime syntax. Timezones are fixed offsets (`UTC`,
//! `+05:30`, `-0800`).

use chrono::format::{Item, StrftimeItems};
use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Months, NaiveDate, NaiveDateTime, Utc,
};
use serde::Deserialize;
use serde_json::Value;

use super::{resolve_value, Runtime, Scope};
use crate::engine::error::{EngineError, Result};
use crate::ruleflow::ops::values::{as_number, display, parse_date};

pub const DEFAULT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const MAX_INTERVALS: usize = 100_000;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DateInput {
    /// Current time when absent
    #[serde(default)]
    pub input: Option<Value>,
    #[serde(default)]
    pub parse: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DateManipulator {
    pub operator: String,
    pub operand: Value,
    pub unit: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DateNode {
    #[serde(default)]
    pub input: DateInput,
    #[serde(default)]
    pub manipulators: Vec<DateManipulator>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub utc: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DateIntervalsNode {
    pub start: DateInput,
    pub end: DateInput,
    pub unit: String,
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl Unit {
    fn parse(s: &str) -> Result<Self> {
        let unit = match s.trim() {
            "s" | "second" | "seconds" => Self::Second,
            "m" | "minute" | "minutes" => Self::Minute,
            "h" | "hour" | "hours" => Self::Hour,
            "d" | "day" | "days" => Self::Day,
            "w" | "week" | "weeks" => Self::Week,
            "M" | "month" | "months" => Self::Month,
            "y" | "year" | "years" => Self::Year,
            other => return Err(EngineError::node("date", format!("unknown unit '{other}'"))),
        };
        Ok(unit)
    }

    /// Bucket a date falls into at this unit's granularity
    fn granule(self, dt: &DateTime<FixedOffset>) -> i64 {
        let local = dt.naive_local();
        let secs = local.and_utc().timestamp();
        match self {
            Self::Second => secs,
            Self::Minute => secs.div_euclid(60),
            Self::Hour => secs.div_euclid(3600),
            Self::Day | Self::Week => i64::from(local.date().num_days_from_ce()),
            Self::Month => i64::from(local.year()) * 12 + i64::from(local.month0()),
            Self::Year => i64::from(local.year()),
        }
    }
}

fn shift(dt: DateTime<FixedOffset>, amount: i64, unit: Unit) -> Result<DateTime<FixedOffset>> {
    let overflow = || EngineError::node("date", "date out of range");
    let by_duration = |d: Option<Duration>| {
        d.and_then(|d| dt.checked_add_signed(d))
            .ok_or_else(overflow)
    };

    match unit {
        Unit::Second => by_duration(Duration::try_seconds(amount)),
        Unit::Minute => by_duration(Duration::try_minutes(amount)),
        Unit::Hour => by_duration(Duration::try_hours(amount)),
        Unit::Day => by_duration(Duration::try_days(amount)),
        Unit::Week => by_duration(Duration::try_weeks(amount)),
        Unit::Month | Unit::Year => {
            let months = if unit == Unit::Year {
                amount.checked_mul(12).ok_or_else(overflow)?
            } else {
                amount
            };
            let magnitude = u32::try_from(months.unsigned_abs()).map_err(|_| overflow())?;
            if months >= 0 {
                dt.checked_add_months(Months::new(magnitude))
            } else {
                dt.checked_sub_months(Months::new(magnitude))
            }
            .ok_or_else(overflow)
        }
    }
}

fn parse_offset(tz: &str) -> Result<FixedOffset> {
    let tz = tz.trim();
    if tz.eq_ignore_ascii_case("utc") || tz == "Z" {
        return FixedOffset::east_opt(0).ok_or_else(|| EngineError::node("date", "bad offset"));
    }
    let (sign, rest) = match tz.as_bytes().first() {
        Some(b'+') => (1, &tz[1..]),
        Some(b'-') => (-1, &tz[1..]),
        _ => return Err(EngineError::node("date", format!("unsupported timezone '{tz}'"))),
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(EngineError::node("date", format!("unsupported timezone '{tz}'")));
    }
    let hours: i32 = digits[..2].parse().unwrap_or(0);
    let minutes: i32 = digits[2..].parse().unwrap_or(0);
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| EngineError::node("date", format!("offset out of range '{tz}'")))
}

fn parse_with(s: &str, fmt: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
        return Some(dt);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
        return Some(naive.and_utc().fixed_offset());
    }
    NaiveDate::parse_from_str(s, fmt)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Format with a strftime pattern, rejecting malformed patterns
pub fn format_date(dt: &DateTime<FixedOffset>, fmt: &str) -> Result<String> {
    let items: Vec<Item> = StrftimeItems::new(fmt).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(EngineError::node("date", format!("invalid format '{fmt}'")));
    }
    Ok(dt.format_with_items(items.iter()).to_string())
}

impl DateInput {
    async fn get(&self, rt: &Runtime, scope: &Scope) -> Result<DateTime<FixedOffset>> {
        let date = match &self.input {
            None => Utc::now().fixed_offset(),
            Some(raw) => {
                let value = resolve_value(raw.clone(), rt, scope).await?;
                let parsed = match self.parse.as_deref() {
                    Some(fmt) if !fmt.is_empty() => parse_with(display(&value).trim(), fmt),
                    _ => parse_date(&value),
                };
                parsed.ok_or_else(|| {
                    EngineError::node("date", format!("cannot parse date {value}"))
                })?
            }
        };

        match self.timezone.as_deref() {
            Some(tz) if !tz.is_empty() => Ok(date.with_timezone(&parse_offset(tz)?)),
            _ => Ok(date),
        }
    }
}

impl DateManipulator {
    async fn apply(
        &self,
        date: DateTime<FixedOffset>,
        rt: &Runtime,
        scope: &Scope,
    ) -> Result<DateTime<FixedOffset>> {
        let operand = resolve_value(self.operand.clone(), rt, scope).await?;
        let amount = as_number(&operand)
            .map(|f| f.trunc() as i64)
            .ok_or_else(|| {
                EngineError::node("date", format!("operand {operand} is not a number"))
            })?;
        let unit = Unit::parse(&self.unit)?;
        match self.operator.trim() {
            "+" => shift(date, amount, unit),
            "-" => shift(date, -amount, unit),
            other => Err(EngineError::node("date", format!("unknown operator '{other}'"))),
        }
    }
}

pub(super) async fn build(node: &DateNode, rt: &Runtime, scope: &Scope) -> Result<Value> {
    let mut date = node.input.get(rt, scope).await?;
    for manipulator in &node.manipulators {
        date = manipulator.apply(date, rt, scope).await?;
    }

    let text = match node.format.as_deref() {
        Some(fmt) if !fmt.is_empty() => format_date(&date, fmt)?,
        _ if node.utc => date
            .with_timezone(&Utc)
            .format("%Y-%m-%dT%H:%M:%S%.3fZ")
            .to_string(),
        _ => format_date(&date, DEFAULT_FORMAT)?,
    };
    Ok(Value::String(text))
}

/// Every step from start to end inclusive, compared at unit granularity
pub(super) async fn intervals(
    node: &DateIntervalsNode,
    rt: &Runtime,
    scope: &Scope,
) -> Result<Value> {
    let mut current = node.start.get(rt, scope).await?;
    let end = node.end.get(rt, scope).await?;
    let unit = Unit::parse(&node.unit)?;
    let fmt = node.format.as_deref().filter(|f| !f.is_empty()).unwrap_or(DEFAULT_FORMAT);

    let mut out = Vec::new();
    while unit.granule(&current) <= unit.granule(&end) {
        if out.len() >= MAX_INTERVALS {
            return Err(EngineError::node(
                "dateIntervals",
                format!("more than {MAX_INTERVALS} intervals"),
            ));
        }
        out.push(Value::String(format_date(&current, fmt)?));
        current = shift(current, 1, unit)?;
    }
    Ok(Value::Array(out))
}
