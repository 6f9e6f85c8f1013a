//! Read-only nodes over the request context

use serde::Deserialize;
use serde_json::Value;

use super::{Runtime, Scope};
use crate::engine::error::{EngineError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct ConstNode {
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetStoreNode {
    /// jq-style path into the store; the whole store when absent
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetIterNode {
    /// Return the iteration index instead of the element
    #[serde(default)]
    pub index: bool,
}

pub(super) async fn get_store(node: &GetStoreNode, rt: &Runtime) -> Result<Value> {
    match node.query.as_deref() {
        Some(query) if !query.trim().is_empty() => rt.ctx.store_get(query).await,
        _ => Ok(rt.ctx.store_snapshot().await),
    }
}

pub(super) fn get_iter(node: &GetIterNode, scope: &Scope) -> Result<Value> {
    let element = scope
        .iteration
        .as_ref()
        .ok_or_else(|| EngineError::node("getIter", "no iteration in scope"))?;
    if node.index {
        Ok(Value::from(element.index))
    } else {
        Ok(element.element.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::registry::Dependencies;
    use crate::ruleflow::resolver::testing::{eval, runtime_with};
    use serde_json::json;

    #[tokio::test]
    async fn test_request_getters() {
        let rt = runtime_with(json!({"id": 9}), Dependencies::new());
        assert_eq!(eval(&rt, json!({"kind": "getReq", "data": {}})).await.unwrap(), json!({"id": 9}));
        assert_eq!(eval(&rt, json!({"kind": "getHeaders", "data": {}})).await.unwrap(), json!({}));
        assert_eq!(eval(&rt, json!({"kind": "getErrors", "data": {}})).await.unwrap(), json!([]));
    }

    #[tokio::test]
    async fn test_get_store_with_and_without_query() {
        let rt = runtime_with(Value::Null, Dependencies::new());
        rt.ctx.store_set(".user", json!({"name": "ada"})).await.unwrap();

        let whole = eval(&rt, json!({"kind": "getStore", "data": {}})).await.unwrap();
        assert_eq!(whole, json!({"user": {"name": "ada"}}));

        let name = eval(&rt, json!({"kind": "getStore", "data": {"query": ".user.name"}}))
            .await
            .unwrap();
        assert_eq!(name, json!("ada"));
    }

    #[test]
    fn test_get_iter_requires_iteration() {
        let node = GetIterNode { index: false };
        assert!(get_iter(&node, &Scope::default()).is_err());

        let scope = Scope::default().with_iteration(json!("x"), 3);
        assert_eq!(get_iter(&node, &scope).unwrap(), json!("x"));
        assert_eq!(get_iter(&GetIterNode { index: true }, &scope).unwrap(), json!(3));
    }
}
