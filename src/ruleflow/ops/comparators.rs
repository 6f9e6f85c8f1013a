// SPDX-License-Identifier: MIT

//! Comparator table keyed by `(comparator, comparisonType)`.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use serde_json::Value;

use super::values::{as_bool, as_number, display, parse_date};
use crate::engine::error::{EngineError, Result};

/// Operand families a comparator can interpret values as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonType {
    String,
    Number,
    Boolean,
    Date,
    /// One-way hashed secret; operand1 is the hash, operand2 the plain text
    Hash,
}

impl ComparisonType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "boolean" | "bool" => Some(Self::Boolean),
            "date" => Some(Self::Date),
            "hash" | "bcrypt" => Some(Self::Hash),
            _ => None,
        }
    }
}

impl fmt::Display for ComparisonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Hash => "hash",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    Eq,
    Ne,
    /// operand1 is contained in the operand2 list
    In,
    /// operand1 is not contained in the operand2 list
    Ni,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl Comparator {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "eq" | "==" => Some(Self::Eq),
            "ne" | "!=" => Some(Self::Ne),
            "in" => Some(Self::In),
            "ni" | "notIn" => Some(Self::Ni),
            "lt" | "<" => Some(Self::Lt),
            "lte" | "<=" => Some(Self::Lte),
            "gt" | ">" => Some(Self::Gt),
            "gte" | ">=" => Some(Self::Gte),
            _ => None,
        }
    }
}

pub type CompareFn = fn(&Value, &Value) -> Result<bool>;

static COMPARATORS: Lazy<HashMap<(Comparator, ComparisonType), CompareFn>> = Lazy::new(|| {
    use Comparator::*;
    use ComparisonType as T;

    let mut table: HashMap<(Comparator, ComparisonType), CompareFn> = HashMap::new();

    table.insert((Eq, T::String), |a, b| Ok(display(a) == display(b)));
    table.insert((Ne, T::String), |a, b| Ok(display(a) != display(b)));
    table.insert((Lt, T::String), |a, b| Ok(string_of(a, "string")? < string_of(b, "string")?));
    table.insert((Lte, T::String), |a, b| Ok(string_of(a, "string")? <= string_of(b, "string")?));
    table.insert((Gt, T::String), |a, b| Ok(string_of(a, "string")? > string_of(b, "string")?));
    table.insert((Gte, T::String), |a, b| Ok(string_of(a, "string")? >= string_of(b, "string")?));
    table.insert((In, T::String), |a, b| includes(a, b, T::String));
    table.insert((Ni, T::String), |a, b| includes(a, b, T::String).map(|r| !r));

    table.insert((Eq, T::Number), |a, b| Ok(number_of(a)? == number_of(b)?));
    table.insert((Ne, T::Number), |a, b| Ok(number_of(a)? != number_of(b)?));
    table.insert((Lt, T::Number), |a, b| Ok(number_of(a)? < number_of(b)?));
    table.insert((Lte, T::Number), |a, b| Ok(number_of(a)? <= number_of(b)?));
    table.insert((Gt, T::Number), |a, b| Ok(number_of(a)? > number_of(b)?));
    table.insert((Gte, T::Number), |a, b| Ok(number_of(a)? >= number_of(b)?));
    table.insert((In, T::Number), |a, b| includes(a, b, T::Number));
    table.insert((Ni, T::Number), |a, b| includes(a, b, T::Number).map(|r| !r));

    table.insert((Eq, T::Boolean), |a, b| Ok(bool_of(a)? == bool_of(b)?));
    table.insert((Ne, T::Boolean), |a, b| Ok(bool_of(a)? != bool_of(b)?));
    table.insert((In, T::Boolean), |a, b| includes(a, b, T::Boolean));
    table.insert((Ni, T::Boolean), |a, b| includes(a, b, T::Boolean).map(|r| !r));

    table.insert((Eq, T::Date), |a, b| Ok(date_of(a)? == date_of(b)?));
    table.insert((Ne, T::Date), |a, b| Ok(date_of(a)? != date_of(b)?));
    table.insert((Lt, T::Date), |a, b| Ok(date_of(a)? < date_of(b)?));
    table.insert((Lte, T::Date), |a, b| Ok(date_of(a)? <= date_of(b)?));
    table.insert((Gt, T::Date), |a, b| Ok(date_of(a)? > date_of(b)?));
    table.insert((Gte, T::Date), |a, b| Ok(date_of(a)? >= date_of(b)?));

    table.insert((Eq, T::Hash), hash_matches);
    table.insert((Ne, T::Hash), |a, b| hash_matches(a, b).map(|r| !r));

    table
});

/// Look up the comparator before any operand is resolved
pub fn lookup(comparator: &str, comparison_type: &str) -> Result<CompareFn> {
    let not_found = || EngineError::ComparatorNotFound {
        comparator: comparator.to_string(),
        comparison_type: comparison_type.to_string(),
    };
    let cmp = Comparator::parse(comparator).ok_or_else(not_found)?;
    let ty = ComparisonType::parse(comparison_type).ok_or_else(not_found)?;
    COMPARATORS.get(&(cmp, ty)).copied().ok_or_else(not_found)
}

/// Look up and apply in one step
#[cfg(test)]
pub fn compare(comparator: &str, comparison_type: &str, a: &Value, b: &Value) -> Result<bool> {
    lookup(comparator, comparison_type)?(a, b)
}

fn string_of<'a>(value: &'a Value, ty: &str) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| EngineError::mismatch(ty, format!("expected string, got {value}")))
}

fn number_of(value: &Value) -> Result<f64> {
    as_number(value)
        .ok_or_else(|| EngineError::mismatch("number", format!("expected number, got {value}")))
}

fn bool_of(value: &Value) -> Result<bool> {
    as_bool(value)
        .ok_or_else(|| EngineError::mismatch("boolean", format!("expected boolean, got {value}")))
}

fn date_of(value: &Value) -> Result<chrono::DateTime<chrono::FixedOffset>> {
    parse_date(value)
        .ok_or_else(|| EngineError::mismatch("date", format!("expected date, got {value}")))
}

/// A scalar haystack is read as a one-element list
fn includes(needle: &Value, haystack: &Value, ty: ComparisonType) -> Result<bool> {
    let items = match haystack {
        Value::Array(items) => items.as_slice(),
        scalar => std::slice::from_ref(scalar),
    };
    for item in items {
        let equal = match ty {
            ComparisonType::String => display(needle) == display(item),
            ComparisonType::Number => number_of(needle)? == number_of(item)?,
            ComparisonType::Boolean => bool_of(needle)? == bool_of(item)?,
            ComparisonType::Date | ComparisonType::Hash => needle == item,
        };
        if equal {
            return Ok(true);
        }
    }
    Ok(false)
}

fn hash_matches(hash: &Value, plain: &Value) -> Result<bool> {
    let hash = string_of(hash, "hash")?;
    let plain = string_of(plain, "hash")?;
    // A malformed hash never matches
    Ok(bcrypt::verify(plain, hash).unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_comparators() {
        assert!(compare("eq", "string", &json!("a"), &json!("a")).unwrap());
        assert!(compare("ne", "string", &json!("a"), &json!("b")).unwrap());
        assert!(compare("lt", "string", &json!("a"), &json!("b")).unwrap());
        assert!(compare("in", "string", &json!("b"), &json!(["a", "b"])).unwrap());
        assert!(compare("ni", "string", &json!("c"), &json!(["a", "b"])).unwrap());
    }

    #[test]
    fn test_number_comparators_accept_numeric_strings() {
        assert!(compare("eq", "number", &json!(2), &json!("2.0")).unwrap());
        assert!(compare("gte", "number", &json!(3), &json!(2)).unwrap());
        assert!(!compare("gt", "number", &json!(2), &json!(2)).unwrap());
        assert!(compare("in", "number", &json!(2), &json!([1, 2.0])).unwrap());
    }

    #[test]
    fn test_boolean_and_date() {
        assert!(compare("eq", "boolean", &json!(true), &json!("true")).unwrap());
        assert!(compare(
            "lt",
            "date",
            &json!("2024-01-01"),
            &json!("2024-01-02T00:00:00Z")
        )
        .unwrap());
    }

    #[test]
    fn test_hash_comparison_is_one_way() {
        let hashed = bcrypt::hash("secret", 4).unwrap();
        assert!(compare("eq", "bcrypt", &json!(hashed), &json!("secret")).unwrap());
        assert!(compare("ne", "hash", &json!(hashed), &json!("other")).unwrap());
        // Byte equality is not a match
        assert!(!compare("eq", "hash", &json!("secret"), &json!("secret")).unwrap());
    }

    #[test]
    fn test_missing_comparator() {
        let err = lookup("gt", "boolean").unwrap_err();
        assert!(matches!(err, EngineError::ComparatorNotFound { .. }));
        assert!(lookup("approx", "number").is_err());
        assert!(lookup("eq", "color").is_err());
    }

    #[test]
    fn test_operand_type_mismatch() {
        let err = compare("lt", "number", &json!("abc"), &json!(1)).unwrap_err();
        assert!(matches!(err, EngineError::OperandTypeMismatch { .. }));
        let err = compare("gt", "string", &json!(2), &json!("1")).unwrap_err();
        assert!(matches!(err, EngineError::OperandTypeMismatch { .. }));
    }

    #[test]
    fn test_string_equality_compares_text_forms() {
        assert!(compare("eq", "string", &json!(1), &json!("1")).unwrap());
        assert!(compare("eq", "string", &json!(true), &json!("true")).unwrap());
        // A missing value reads as empty text
        assert!(!compare("eq", "string", &Value::Null, &json!("x")).unwrap());
        assert!(compare("ne", "string", &Value::Null, &json!("x")).unwrap());
    }

    #[test]
    fn test_scalar_haystack_is_a_single_item_list() {
        assert!(compare("in", "string", &json!("a"), &json!("a")).unwrap());
        assert!(!compare("in", "string", &json!("a"), &json!("abc")).unwrap());
        assert!(compare("ni", "string", &json!("a"), &json!("b")).unwrap());
        assert!(compare("in", "number", &json!("3"), &json!(3)).unwrap());
        assert!(compare("in", "string", &json!(7), &json!(["7", "8"])).unwrap());
    }
}
