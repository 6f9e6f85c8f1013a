// SPDX-License-Identifier: MIT

//! Iteration nodes: `forEach` and `filterMap`
//!
//! Both take a list, or a number `n` standing for `[0, n)` with `n` capped
//! by `EngineConfig::max_iterations`. Each element runs with its own
//! `getIter` binding in scope. Sequential mode stops at the first failure;
//! `async` mode runs one task per element and cancels the remaining ones
//! when a task fails.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use super::node::Node;
use super::{fan_out, resolve_value, run_actions, Runtime, Scope};
use crate::engine::error::{EngineError, Result};
use crate::ruleflow::condition::{evaluate_optional, Condition};

#[derive(Debug, Clone, Deserialize)]
pub struct ForEachNode {
    #[serde(default)]
    pub input: Value,
    #[serde(rename = "do", default)]
    pub actions: Vec<Node>,
    #[serde(rename = "async", default)]
    pub run_async: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilterMapNode {
    #[serde(default)]
    pub input: Value,
    #[serde(rename = "do", default)]
    pub actions: Vec<Node>,
    #[serde(default)]
    pub condition: Option<Condition>,
    #[serde(rename = "async", default)]
    pub run_async: bool,
}

/// Elements to iterate over; `None` for a null input
fn elements(kind: &str, input: Value, limit: u64) -> Result<Option<Vec<Value>>> {
    match input {
        Value::Null => Ok(None),
        Value::Array(items) => Ok(Some(items)),
        Value::Number(n) => {
            let len = n.as_f64().unwrap_or_default().trunc();
            if len > limit as f64 {
                return Err(EngineError::node(
                    kind,
                    format!("range of {len} exceeds the limit of {limit} iterations"),
                ));
            }
            let len = if len > 0.0 { len as u64 } else { 0 };
            Ok(Some((0..len).map(Value::from).collect()))
        }
        other => Err(EngineError::node(
            kind,
            format!("input must be a list or a number, got {other}"),
        )),
    }
}

pub(super) async fn for_each(node: Arc<ForEachNode>, rt: &Runtime, scope: &Scope) -> Result<Value> {
    let input = resolve_value(node.input.clone(), rt, scope).await?;
    let Some(items) = elements("forEach", input, rt.config.max_iterations)? else {
        return Ok(Value::Null);
    };

    if node.run_async {
        let indexed: Vec<(usize, Value)> = items.into_iter().enumerate().collect();
        fan_out(indexed, scope, |(index, element), child| {
            let node = node.clone();
            let rt = rt.clone();
            async move {
                let child = child.with_iteration(element, index);
                run_actions(&node.actions, &rt, &child).await.map(|_| ())
            }
        })
        .await
        .map_err(|e| e.locate(|i| format!("element {i}")))?;
    } else {
        for (index, element) in items.into_iter().enumerate() {
            let child = scope.with_iteration(element, index);
            run_actions(&node.actions, rt, &child)
                .await
                .map_err(|e| e.at(format!("element {index}")))?;
        }
    }

    Ok(Value::Null)
}

/// Keep the elements whose condition holds, running `do` for each of them.
/// Output follows input order in both modes.
pub(super) async fn filter_map(
    node: Arc<FilterMapNode>,
    rt: &Runtime,
    scope: &Scope,
) -> Result<Value> {
    let input = resolve_value(node.input.clone(), rt, scope).await?;
    let Some(items) = elements("filterMap", input, rt.config.max_iterations)? else {
        return Ok(Value::Null);
    };

    let kept: Vec<Option<Value>> = if node.run_async {
        let indexed: Vec<(usize, Value)> = items.into_iter().enumerate().collect();
        fan_out(indexed, scope, |(index, element), child| {
            let node = node.clone();
            let rt = rt.clone();
            async move { filter_one(&node, element, index, &rt, &child).await }
        })
        .await
        .map_err(|e| e.locate(|i| format!("element {i}")))?
    } else {
        let mut kept = Vec::with_capacity(items.len());
        for (index, element) in items.into_iter().enumerate() {
            let out = filter_one(&node, element, index, rt, scope)
                .await
                .map_err(|e| e.at(format!("element {index}")))?;
            kept.push(out);
        }
        kept
    };

    Ok(Value::Array(kept.into_iter().flatten().collect()))
}

async fn filter_one(
    node: &FilterMapNode,
    element: Value,
    index: usize,
    rt: &Runtime,
    scope: &Scope,
) -> Result<Option<Value>> {
    if scope.is_cancelled() {
        return Err(EngineError::Cancelled);
    }
    let child = scope.with_iteration(element.clone(), index);
    if !evaluate_optional(node.condition.as_ref(), rt, &child).await? {
        return Ok(None);
    }
    run_actions(&node.actions, rt, &child).await?;
    Ok(Some(element))
}
