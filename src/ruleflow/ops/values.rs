//! Value coercions shared by comparators, arithmetic and nodes.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{Number, Value};

/// Read a value as a float; numeric strings are accepted
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Read a value as a bool; "true"/"false" strings are accepted
pub fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Integral floats become JSON integers so `1 + 2` reads back as `3`
pub fn number_value(f: f64) -> Value {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 {
        Value::Number(Number::from(f as i64))
    } else {
        Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// Text form of a value: strings unquoted, null empty, the rest as JSON
pub fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 9.0e15 => {
                (f as i64).to_string()
            }
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

const DATE_TIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parse a date from RFC 3339, common layouts (read as UTC) or unix seconds
pub fn parse_date(value: &Value) -> Option<DateTime<FixedOffset>> {
    match value {
        Value::String(s) => parse_date_str(s.trim()),
        Value::Number(n) => {
            let secs = n.as_f64()?;
            Utc.timestamp_opt(secs.trunc() as i64, 0)
                .single()
                .map(|dt| dt.fixed_offset())
        }
        _ => None,
    }
}

pub fn parse_date_str(s: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    for fmt in DATE_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc().fixed_offset());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_as_number() {
        assert_eq!(as_number(&json!(2)), Some(2.0));
        assert_eq!(as_number(&json!(" 2.5 ")), Some(2.5));
        assert_eq!(as_number(&json!("abc")), None);
        assert_eq!(as_number(&json!(true)), None);
    }

    #[test]
    fn test_number_value_normalizes_integral_floats() {
        assert_eq!(number_value(3.0), json!(3));
        assert_eq!(number_value(2.5), json!(2.5));
        assert_eq!(number_value(f64::NAN), Value::Null);
    }

    #[test]
    fn test_display() {
        assert_eq!(display(&json!("a")), "a");
        assert_eq!(display(&json!(1)), "1");
        assert_eq!(display(&json!(1.0)), "1");
        assert_eq!(display(&Value::Null), "");
        assert_eq!(display(&json!({"k": 1})), r#"{"k":1}"#);
    }

    #[test]
    fn test_parse_date_layouts() {
        let a = parse_date(&json!("2024-03-01T10:00:00Z")).unwrap();
        let b = parse_date(&json!("2024-03-01 10:00:00")).unwrap();
        assert_eq!(a, b);
        let d = parse_date(&json!("2024-03-01")).unwrap();
        assert!(d < a);
        let unix = parse_date(&json!(0)).unwrap();
        assert_eq!(unix.timestamp(), 0);
        assert!(parse_date(&json!("yesterday")).is_none());
    }
}
