// SPDX-License-Identifier: MIT

//! Value-producing nodes without side effects: arithmetic, jq, string
//! interpolation, uuid and cast.

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Deserialize;
use serde_json::Value;

use super::structural::resolve_list;
use super::{resolve_value, Runtime, Scope};
use crate::engine::error::{EngineError, Result};
use crate::ruleflow::ops::arithmetic as ops;
use crate::ruleflow::ops::values::{as_bool, as_number, display, number_value};
use crate::ruleflow::state::path;

/// Left fold of `operation` over `operators`. An operator either carries a
/// `value` or is itself a `group` evaluated recursively.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArithmeticNode {
    #[serde(default)]
    pub group: bool,
    #[serde(default)]
    pub operation: String,
    #[serde(default)]
    pub operators: Vec<ArithmeticNode>,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JqNode {
    pub query: Value,
    #[serde(default)]
    pub input: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InterpolationNode {
    pub template: String,
    #[serde(default)]
    pub parameters: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UuidNode {
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CastNode {
    #[serde(default)]
    pub input: Value,
    pub to: String,
}

pub(super) fn arithmetic<'a>(
    node: &'a ArithmeticNode,
    rt: &'a Runtime,
    scope: &'a Scope,
) -> BoxFuture<'a, Result<Value>> {
    async move {
        let op = ops::lookup(&node.operation)?;
        let mut acc: Option<Value> = None;

        for (i, operand) in node.operators.iter().enumerate() {
            let value = if operand.group {
                arithmetic(operand, rt, scope).await
            } else {
                resolve_value(operand.value.clone(), rt, scope).await
            }
            .map_err(|e| e.at(format!("operand {i}")))?;

            acc = Some(match acc {
                None => value,
                Some(prev) => op(&prev, &value)?,
            });
        }

        Ok(acc.unwrap_or(Value::Null))
    }
    .boxed()
}

pub(super) async fn jq(node: &JqNode, rt: &Runtime, scope: &Scope) -> Result<Value> {
    let query = resolve_value(node.query.clone(), rt, scope).await?;
    let query = query
        .as_str()
        .ok_or_else(|| EngineError::node("jq", format!("query must be a string, got {query}")))?
        .to_string();
    let input = resolve_value(node.input.clone(), rt, scope).await?;
    path::query(&input, &query)
}

/// Replace each `$param` in order with the matching parameter
pub(super) async fn interpolate(
    node: &InterpolationNode,
    rt: &Runtime,
    scope: &Scope,
) -> Result<Value> {
    let params = resolve_list(node.parameters.clone(), rt, scope).await?;
    let mut out = node.template.clone();
    for param in &params {
        out = out.replacen("$param", &display(param), 1);
    }
    Ok(Value::String(out))
}

pub(super) fn uuid(node: &UuidNode) -> Result<Value> {
    let id = match node.version.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("v7") | Some("7") => uuid::Uuid::now_v7(),
        Some("v4") | Some("4") => uuid::Uuid::new_v4(),
        Some(other) => {
            return Err(EngineError::node(
                "uuid",
                format!("unsupported version '{other}'"),
            ))
        }
    };
    Ok(Value::String(id.to_string()))
}

pub(super) async fn cast(node: &CastNode, rt: &Runtime, scope: &Scope) -> Result<Value> {
    let input = resolve_value(node.input.clone(), rt, scope).await?;
    let fail = || EngineError::node("cast", format!("cannot cast {} to {}", input, node.to));

    match node.to.to_ascii_lowercase().as_str() {
        "string" => Ok(Value::String(display(&input))),
        "number" => match &input {
            Value::Bool(b) => Ok(Value::from(u8::from(*b))),
            other => as_number(other).map(number_value).ok_or_else(fail),
        },
        "boolean" | "bool" => match &input {
            Value::Number(n) => Ok(Value::Bool(n.as_f64().map(|f| f != 0.0).unwrap_or(false))),
            other => as_bool(other).map(Value::Bool).ok_or_else(fail),
        },
        other => Err(EngineError::node(
            "cast",
            format!("unknown target type '{other}'"),
        )),
    }
}
