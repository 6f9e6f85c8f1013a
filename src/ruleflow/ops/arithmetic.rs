// SPDX-License-Identifier: MIT

//! Arithmetic operator table.
//!
//! `+` concatenates when the left operand is not numeric or the right side
//! cannot be read as a number; every other operator works on floats.
//! Division and remainder by zero are errors, as is any result that
//! overflows: JSON numbers cannot carry infinities or NaN.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde_json::Value;

use super::values::{as_number, display, number_value};
use crate::engine::error::{EngineError, Result};

pub type ArithmeticFn = fn(&Value, &Value) -> Result<Value>;

static OPERATORS: Lazy<HashMap<&'static str, ArithmeticFn>> = Lazy::new(|| {
    let mut table: HashMap<&'static str, ArithmeticFn> = HashMap::new();
    table.insert("+", add);
    table.insert("-", |a, b| floats(a, b, "-").and_then(|(x, y)| finite(x - y, "-")));
    table.insert("*", |a, b| floats(a, b, "*").and_then(|(x, y)| finite(x * y, "*")));
    table.insert("/", |a, b| {
        let (x, y) = floats(a, b, "/")?;
        if y == 0.0 {
            return Err(EngineError::Arithmetic("division by zero".into()));
        }
        finite(x / y, "/")
    });
    table.insert("%", |a, b| {
        let (x, y) = floats(a, b, "%")?;
        if y == 0.0 {
            return Err(EngineError::Arithmetic("remainder by zero".into()));
        }
        finite(x % y, "%")
    });
    table
});

pub fn lookup(operation: &str) -> Result<ArithmeticFn> {
    OPERATORS
        .get(operation.trim())
        .copied()
        .ok_or_else(|| EngineError::Arithmetic(format!("unknown operation '{operation}'")))
}

/// Apply `operation` to two operands
#[cfg(test)]
pub fn apply(operation: &str, a: &Value, b: &Value) -> Result<Value> {
    lookup(operation)?(a, b)
}

/// Left fold of `operation` over `operands`
#[cfg(test)]
pub fn fold(operation: &str, operands: &[Value]) -> Result<Value> {
    let op = lookup(operation)?;
    let mut iter = operands.iter();
    let Some(first) = iter.next() else {
        return Ok(Value::Null);
    };
    iter.try_fold(first.clone(), |acc, next| op(&acc, next))
}

fn add(a: &Value, b: &Value) -> Result<Value> {
    if let Value::Number(x) = a {
        if let (Some(x), Some(y)) = (x.as_f64(), as_number(b)) {
            return finite(x + y, "+");
        }
    }
    Ok(Value::String(format!("{}{}", display(a), display(b))))
}

fn finite(result: f64, op: &str) -> Result<Value> {
    if !result.is_finite() {
        return Err(EngineError::Arithmetic(format!("'{op}' overflowed")));
    }
    Ok(number_value(result))
}

fn floats(a: &Value, b: &Value, op: &str) -> Result<(f64, f64)> {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(EngineError::Arithmetic(format!(
            "'{op}' needs numeric operands, got {a} and {b}"
        ))),
    }
}
