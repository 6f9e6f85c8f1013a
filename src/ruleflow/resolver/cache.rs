//! App cache nodes

use serde::Deserialize;
use serde_json::Value;

use super::{resolve_value, Runtime, Scope};
use crate::engine::error::{EngineError, Result};
use crate::ruleflow::ops::values::{as_number, display};

#[derive(Debug, Clone, Deserialize)]
pub struct SetCacheNode {
    pub key: Value,
    #[serde(default)]
    pub value: Value,
    /// Seconds; the configured default when absent
    #[serde(default)]
    pub ttl: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheKeyNode {
    pub key: Value,
}

async fn resolve_key(key: &Value, rt: &Runtime, scope: &Scope) -> Result<String> {
    let key = display(&resolve_value(key.clone(), rt, scope).await?);
    if key.is_empty() {
        return Err(EngineError::node("cache", "empty key"));
    }
    Ok(key)
}

pub(super) async fn set(node: &SetCacheNode, rt: &Runtime, scope: &Scope) -> Result<Value> {
    let cache = rt.deps.app_cache()?;
    let key = resolve_key(&node.key, rt, scope).await?;
    let value = resolve_value(node.value.clone(), rt, scope).await?;
    let ttl = match &node.ttl {
        None => rt.config.default_cache_ttl,
        Some(raw) => {
            let ttl = resolve_value(raw.clone(), rt, scope).await?;
            as_number(&ttl)
                .filter(|t| *t >= 0.0)
                .map(|t| t as u64)
                .ok_or_else(|| EngineError::node("setCache", format!("invalid ttl {ttl}")))?
        }
    };

    cache.set(&key, &value, ttl).await?;
    log::debug!("[{}] cache set {} (ttl {}s)", rt.tracer(), key, ttl);
    Ok(value)
}

pub(super) async fn get(node: &CacheKeyNode, rt: &Runtime, scope: &Scope) -> Result<Value> {
    let cache = rt.deps.app_cache()?;
    let key = resolve_key(&node.key, rt, scope).await?;
    Ok(cache.get(&key).await?.unwrap_or(Value::Null))
}

pub(super) async fn delete(node: &CacheKeyNode, rt: &Runtime, scope: &Scope) -> Result<Value> {
    let cache = rt.deps.app_cache()?;
    let key = resolve_key(&node.key, rt, scope).await?;
    Ok(Value::from(cache.delete(&key).await?))
}
