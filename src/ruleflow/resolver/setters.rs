// SPDX-License-Identifier: MIT

//! Nodes that mutate the request context: store and response writers,
//! user logs and response emission.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::structural::resolve_map;
use super::{resolve_value, Runtime, Scope};
use crate::engine::error::{EngineError, Result};
use crate::ruleflow::ops::values::{as_number, display};
use crate::ruleflow::state::{LogEntry, Response};

/// `{path: value, ...}` written into the store or the response accumulator
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct SetNode {
    pub entries: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResNode {
    pub response_code: Value,
    #[serde(default)]
    pub response_description: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogNode {
    #[serde(default)]
    pub log_data: Value,
    #[serde(default = "default_log_type")]
    pub log_type: String,
}

fn default_log_type() -> String {
    "info".to_string()
}

/// Values resolve concurrently; writes then apply in key order
pub(super) async fn set_store(node: &SetNode, rt: &Runtime, scope: &Scope) -> Result<Value> {
    let resolved = resolve_map(node.entries.clone(), rt, scope).await?;
    for (path, value) in resolved.iter() {
        rt.ctx
            .store_set(path, value.clone())
            .await
            .map_err(|e| e.at(format!("key '{path}'")))?;
    }
    Ok(Value::Object(resolved))
}

pub(super) async fn set_response(node: &SetNode, rt: &Runtime, scope: &Scope) -> Result<Value> {
    let resolved = resolve_map(node.entries.clone(), rt, scope).await?;
    for (path, value) in resolved.iter() {
        rt.ctx
            .response_set(path, value.clone())
            .await
            .map_err(|e| e.at(format!("key '{path}'")))?;
    }
    Ok(Value::Object(resolved))
}

pub(super) async fn log(node: &LogNode, rt: &Runtime, scope: &Scope) -> Result<Value> {
    let data = resolve_value(node.log_data.clone(), rt, scope).await?;
    match node.log_type.to_ascii_lowercase().as_str() {
        "error" => log::error!("[{}] {}", rt.tracer(), data),
        "warn" | "warning" => log::warn!("[{}] {}", rt.tracer(), data),
        "debug" => log::debug!("[{}] {}", rt.tracer(), data),
        _ => log::info!("[{}] {}", rt.tracer(), data),
    }
    rt.ctx
        .push_log(LogEntry {
            log_type: node.log_type.clone(),
            data: data.clone(),
            at: chrono::Utc::now().to_rfc3339(),
        })
        .await;
    Ok(data)
}

/// Emit the response built from the accumulator; a second emission is a no-op
pub(super) async fn send_response(
    node: &SendResNode,
    rt: &Runtime,
    scope: &Scope,
) -> Result<Value> {
    let code_value = resolve_value(node.response_code.clone(), rt, scope).await?;
    let code = as_number(&code_value)
        .filter(|c| *c >= 0.0 && c.fract() == 0.0 && *c <= f64::from(u16::MAX))
        .ok_or_else(|| EngineError::node("sendRes", format!("invalid response code {code_value}")))?
        as u16;
    let description = display(&resolve_value(node.response_description.clone(), rt, scope).await?);

    let response = Response::new(
        code,
        description,
        rt.ctx.response_snapshot().await,
        rt.ctx.user_errors().await,
    );
    let sent = rt.ctx.respond(response).await;
    if sent {
        log::info!("[{}] response {} sent", rt.tracer(), code);
    }
    Ok(Value::Bool(sent))
}
