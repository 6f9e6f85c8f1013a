// SPDX-License-Identifier: MIT

//! Structural resolution
//!
//! Walks an arbitrary JSON value and evaluates every embedded node. Map
//! entries and list elements are resolved concurrently, one task per entry,
//! and reassembled in their original shape. The first failing task cancels
//! its siblings and the call returns that error tagged with the failing key
//! or index; no partial value is returned.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{Map, Value};
use tokio::task::JoinSet;

use super::node::Node;
use super::{Runtime, Scope};
use crate::engine::error::{EngineError, Result};

const KIND_KEYS: [&str; 2] = ["resolveType", "kind"];
const DATA_KEYS: [&str; 2] = ["resolveData", "data"];

/// First failure of a fan-out and the position it happened at
#[derive(Debug)]
pub struct FanOutError {
    pub index: Option<usize>,
    pub error: EngineError,
}

impl FanOutError {
    /// Tag the error with a location derived from the failing index
    pub fn locate<F>(self, describe: F) -> EngineError
    where
        F: FnOnce(usize) -> String,
    {
        match self.index {
            Some(index) => self.error.at(describe(index)),
            None => self.error,
        }
    }
}

/// Run `work` once per item concurrently, preserving input order in the
/// output.
///
/// Every task receives a scope carrying a child of the caller's
/// cancellation token. Tasks that start after cancellation skip their
/// work. The first real error wins over `Cancelled` errors caused by it.
pub async fn fan_out<T, O, F, Fut>(
    items: Vec<T>,
    scope: &Scope,
    work: F,
) -> std::result::Result<Vec<O>, FanOutError>
where
    T: Send + 'static,
    O: Send + 'static,
    F: Fn(T, Scope) -> Fut,
    Fut: Future<Output = Result<O>> + Send + 'static,
{
    let token = scope.cancel.child_token();
    let len = items.len();
    let mut set = JoinSet::new();

    for (index, item) in items.into_iter().enumerate() {
        let task_token = token.clone();
        let fut = work(item, scope.with_cancel(token.clone()));
        set.spawn(async move {
            if task_token.is_cancelled() {
                return (index, Err(EngineError::Cancelled));
            }
            let outcome = AssertUnwindSafe(fut)
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(EngineError::TaskFailed(panic_message(panic))));
            if outcome.is_err() {
                task_token.cancel();
            }
            (index, outcome)
        });
    }

    let mut slots: Vec<Option<O>> = (0..len).map(|_| None).collect();
    let mut first: Option<FanOutError> = None;

    while let Some(joined) = set.join_next().await {
        let (index, outcome) = match joined {
            Ok((index, outcome)) => (Some(index), outcome),
            Err(e) => (None, Err(EngineError::TaskFailed(e.to_string()))),
        };
        match outcome {
            Ok(value) => {
                if let Some(i) = index {
                    slots[i] = Some(value);
                }
            }
            Err(error) => {
                token.cancel();
                let replace = match &first {
                    None => true,
                    Some(prev) => prev.error.is_cancelled() && !error.is_cancelled(),
                };
                if replace {
                    first = Some(FanOutError { index, error });
                }
            }
        }
    }

    if let Some(failure) = first {
        return Err(failure);
    }
    Ok(slots.into_iter().flatten().collect())
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}

/// Split a map into `(kind, data)` when it is an embedded node
pub fn embedded_node(map: &Map<String, Value>) -> Option<(&str, &Value)> {
    let kind = KIND_KEYS
        .iter()
        .find_map(|k| map.get(*k))
        .and_then(Value::as_str)
        .filter(|k| !k.is_empty())?;
    let data = DATA_KEYS
        .iter()
        .find_map(|k| map.get(*k))
        .filter(|d| d.is_object())?;
    Some((kind, data))
}

/// Whether any embedded node lives anywhere inside `value`
pub fn contains_node(value: &Value) -> bool {
    match value {
        Value::Object(map) => embedded_node(map).is_some() || map.values().any(contains_node),
        Value::Array(items) => items.iter().any(contains_node),
        _ => false,
    }
}

/// Resolve every embedded node in `value`
pub fn resolve_value(
    value: Value,
    rt: &Runtime,
    scope: &Scope,
) -> BoxFuture<'static, Result<Value>> {
    let rt = rt.clone();
    let scope = scope.clone();
    async move {
        if scope.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        if !contains_node(&value) {
            return Ok(value);
        }
        match value {
            Value::Object(map) => {
                if let Some((kind, data)) = embedded_node(&map) {
                    let node = Node::decode(kind, data.clone())?;
                    return node.evaluate(&rt, &scope).await;
                }
                resolve_map(map, &rt, &scope).await.map(Value::Object)
            }
            Value::Array(items) => resolve_list(items, &rt, &scope).await.map(Value::Array),
            other => Ok(other),
        }
    }
    .boxed()
}

/// Resolve every entry of a map concurrently, one task per key
pub async fn resolve_map(
    map: Map<String, Value>,
    rt: &Runtime,
    scope: &Scope,
) -> Result<Map<String, Value>> {
    let keys: Vec<String> = map.keys().cloned().collect();
    let entries: Vec<(String, Value)> = map.into_iter().collect();
    let resolved = fan_out(entries, scope, |(key, value), child| {
        let rt = rt.clone();
        async move {
            let value = resolve_value(value, &rt, &child).await?;
            Ok((key, value))
        }
    })
    .await
    .map_err(|e| e.locate(|i| format!("key '{}'", keys[i])))?;
    Ok(resolved.into_iter().collect())
}

/// Resolve every element of a list concurrently, preserving index order
pub async fn resolve_list(items: Vec<Value>, rt: &Runtime, scope: &Scope) -> Result<Vec<Value>> {
    fan_out(items, scope, |item, child| {
        let rt = rt.clone();
        async move { resolve_value(item, &rt, &child).await }
    })
    .await
    .map_err(|e| e.locate(|i| format!("index {i}")))
}

/// Evaluate actions in declaration order, stopping at the first failure
pub async fn run_actions(actions: &[Node], rt: &Runtime, scope: &Scope) -> Result<Vec<Value>> {
    let mut results = Vec::with_capacity(actions.len());
    for (i, action) in actions.iter().enumerate() {
        if scope.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let value = action
            .evaluate(rt, scope)
            .await
            .map_err(|e| e.at(format!("action {} ({})", i, action.kind())))?;
        results.push(value);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ruleflow::resolver::testing::{eval, runtime};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_embedded_node_detection() {
        let node = json!({"resolveType": "getReq", "resolveData": {}});
        assert!(embedded_node(node.as_object().unwrap()).is_some());

        let aliased = json!({"kind": "const", "data": {"value": 1}});
        assert_eq!(embedded_node(aliased.as_object().unwrap()).unwrap().0, "const");

        let empty_kind = json!({"kind": "", "data": {}});
        assert!(embedded_node(empty_kind.as_object().unwrap()).is_none());

        let scalar_data = json!({"kind": "user", "data": 5});
        assert!(embedded_node(scalar_data.as_object().unwrap()).is_none());
    }

    #[tokio::test]
    async fn test_map_preserves_every_key() {
        let rt = runtime();
        let out = eval(
            &rt,
            json!({"x": 1, "y": {"kind": "const", "data": {"value": 2}}}),
        )
        .await
        .unwrap();
        assert_eq!(out, json!({"x": 1, "y": 2}));
    }

    #[tokio::test]
    async fn test_nested_structures_resolve() {
        let rt = runtime();
        let out = eval(
            &rt,
            json!({
                "list": [1, {"kind": "const", "data": {"value": "two"}}, [3, {"kind": "const", "data": {"value": 4}}]],
                "deep": {"a": {"b": {"kind": "const", "data": {"value": true}}}}
            }),
        )
        .await
        .unwrap();
        assert_eq!(
            out,
            json!({"list": [1, "two", [3, 4]], "deep": {"a": {"b": true}}})
        );
    }

    #[tokio::test]
    async fn test_list_failure_reports_index_without_partial_result() {
        let rt = runtime();
        let doc = json!([
            {"kind": "const", "data": {"value": "A"}},
            {"kind": "noSuchKind", "data": {}},
            {"kind": "const", "data": {"value": "C"}}
        ]);
        let err = eval(&rt, doc).await.unwrap_err();
        match &err {
            EngineError::At { location, source } => {
                assert_eq!(location, "index 1");
                assert!(matches!(**source, EngineError::UnknownKind(ref k) if k == "noSuchKind"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_map_failure_reports_key() {
        let rt = runtime();
        let doc = json!({"ok": 1, "bad": {"kind": "cast", "data": {"input": "x", "to": "number"}}});
        let err = eval(&rt, doc).await.unwrap_err();
        assert!(err.to_string().starts_with("at key 'bad'"), "{err}");
    }

    #[tokio::test]
    async fn test_fan_out_first_error_wins_and_skips_unstarted() {
        let started = Arc::new(AtomicUsize::new(0));
        let scope = Scope::default();
        let counter = started.clone();
        let result = fan_out((0..50).collect::<Vec<usize>>(), &scope, move |i, child| {
            let counter = counter.clone();
            async move {
                if i == 0 {
                    return Err(EngineError::Arithmetic("boom".into()));
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
                if child.is_cancelled() {
                    return Err(EngineError::Cancelled);
                }
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(i)
            }
        })
        .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.index, Some(0));
        assert!(matches!(failure.error, EngineError::Arithmetic(_)));
        // The caller's token is untouched
        assert!(!scope.is_cancelled());
    }

    #[tokio::test]
    async fn test_fan_out_catches_panics() {
        let result = fan_out(vec![1, 2], &Scope::default(), |i, _| async move {
            if i == 2 {
                panic!("kaboom");
            }
            Ok(i)
        })
        .await;
        let failure = result.unwrap_err();
        assert_eq!(failure.index, Some(1));
        assert!(matches!(failure.error, EngineError::TaskFailed(ref m) if m == "kaboom"));
    }

    #[tokio::test]
    async fn test_cancelled_scope_short_circuits() {
        let rt = runtime();
        let scope = Scope::default();
        scope.cancel.cancel();
        let err = resolve_value(json!({"kind": "getReq", "data": {}}), &rt, &scope)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
