// SPDX-License-Identifier: MIT

//! Per-request context
//!
//! One `RequestContext` is created per invocation and shared behind an
//! `Arc` by every node that runs inside it. Mutable fields sit behind tokio
//! locks because sibling tasks write to them concurrently.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::{oneshot, Mutex, RwLock};

use super::path;
use super::response::Response;
use super::store::Store;
use crate::engine::error::Result;

/// Entry written by `log` nodes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub log_type: String,
    pub data: Value,
    pub at: String,
}

pub struct RequestContext {
    tracer: String,
    body: Value,
    headers: Map<String, Value>,
    store: RwLock<Store>,
    response: RwLock<Value>,
    query_log: Mutex<Map<String, Value>>,
    api_log: Mutex<Map<String, Value>>,
    user_errors: Mutex<Vec<Value>>,
    system_errors: Mutex<Vec<String>>,
    exec_log: Mutex<Vec<LogEntry>>,
    external_time_ms: AtomicU64,
    responder: Mutex<Option<oneshot::Sender<Response>>>,
    final_response: Mutex<Option<Response>>,
}

impl RequestContext {
    pub fn new(body: Value, headers: Map<String, Value>) -> Self {
        Self {
            tracer: uuid::Uuid::new_v4().to_string(),
            body,
            headers,
            store: RwLock::new(Store::empty()),
            response: RwLock::new(Value::Object(Map::new())),
            query_log: Mutex::new(Map::new()),
            api_log: Mutex::new(Map::new()),
            user_errors: Mutex::new(Vec::new()),
            system_errors: Mutex::new(Vec::new()),
            exec_log: Mutex::new(Vec::new()),
            external_time_ms: AtomicU64::new(0),
            responder: Mutex::new(None),
            final_response: Mutex::new(None),
        }
    }

    /// Route the emitted response into `tx`
    pub fn with_responder(self, tx: oneshot::Sender<Response>) -> Self {
        Self {
            responder: Mutex::new(Some(tx)),
            ..self
        }
    }

    pub fn tracer(&self) -> &str {
        &self.tracer
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn headers(&self) -> &Map<String, Value> {
        &self.headers
    }

    pub async fn store_get(&self, query: &str) -> Result<Value> {
        self.store.read().await.get_path(query)
    }

    pub async fn store_set(&self, query: &str, value: Value) -> Result<()> {
        self.store.write().await.set_path(query, value)
    }

    pub async fn store_snapshot(&self) -> Value {
        self.store.read().await.to_json()
    }

    pub async fn response_set(&self, query: &str, value: Value) -> Result<()> {
        let segments = path::parse(query)?;
        let mut response = self.response.write().await;
        path::set(&mut response, &segments, value)
    }

    pub async fn response_snapshot(&self) -> Value {
        self.response.read().await.clone()
    }

    pub async fn record_query(&self, signature: &str, record: Value) {
        self.query_log
            .lock()
            .await
            .insert(signature.to_string(), record);
    }

    pub async fn query_log(&self) -> Value {
        Value::Object(self.query_log.lock().await.clone())
    }

    pub async fn record_api(&self, signature: &str, record: Value) {
        self.api_log
            .lock()
            .await
            .insert(signature.to_string(), record);
    }

    pub async fn api_log(&self) -> Value {
        Value::Object(self.api_log.lock().await.clone())
    }

    /// User-facing error, returned in the response `errors` list
    pub async fn push_user_error(&self, error: Value) {
        self.user_errors.lock().await.push(error);
    }

    pub async fn user_errors(&self) -> Vec<Value> {
        self.user_errors.lock().await.clone()
    }

    /// Internal error text, never sent to the caller
    pub async fn push_system_error(&self, error: String) {
        self.system_errors.lock().await.push(error);
    }

    pub async fn system_errors(&self) -> Vec<String> {
        self.system_errors.lock().await.clone()
    }

    pub async fn push_log(&self, entry: LogEntry) {
        self.exec_log.lock().await.push(entry);
    }

    pub async fn exec_log(&self) -> Vec<LogEntry> {
        self.exec_log.lock().await.clone()
    }

    pub fn add_external_time(&self, ms: u64) {
        self.external_time_ms.fetch_add(ms, Ordering::Relaxed);
    }

    pub fn external_time_ms(&self) -> u64 {
        self.external_time_ms.load(Ordering::Relaxed)
    }

    /// Emit the response. Only the first call wins; returns whether this
    /// call was the one delivered.
    pub async fn respond(&self, response: Response) -> bool {
        let mut slot = self.final_response.lock().await;
        if slot.is_some() {
            log::debug!("[{}] response already sent, dropping", self.tracer);
            return false;
        }
        *slot = Some(response.clone());
        drop(slot);

        if let Some(tx) = self.responder.lock().await.take() {
            if tx.send(response).is_err() {
                log::debug!("[{}] response receiver dropped", self.tracer);
            }
        }
        true
    }

    pub async fn has_responded(&self) -> bool {
        self.final_response.lock().await.is_some()
    }

    pub async fn final_response(&self) -> Option<Response> {
        self.final_response.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ruleflow::state::response::ResponseCode;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_respond_exactly_once() {
        let (tx, rx) = oneshot::channel();
        let ctx = RequestContext::new(json!({}), Map::new()).with_responder(tx);

        let first = Response::from_code(ResponseCode::Success, json!(1), vec![]);
        let second = Response::from_code(ResponseCode::NotFound, json!(2), vec![]);
        assert!(ctx.respond(first.clone()).await);
        assert!(!ctx.respond(second).await);

        assert_eq!(rx.await.unwrap(), first);
        assert_eq!(ctx.final_response().await, Some(first));
    }

    #[tokio::test]
    async fn test_concurrent_store_writes() {
        let ctx = Arc::new(RequestContext::new(Value::Null, Map::new()));
        let mut handles = Vec::new();
        for i in 0..20 {
            let ctx = ctx.clone();
            handles.push(tokio::spawn(async move {
                ctx.store_set(&format!(".k{i}"), json!(i)).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        let snapshot = ctx.store_snapshot().await;
        assert_eq!(snapshot.as_object().unwrap().len(), 20);
        assert_eq!(ctx.store_get(".k7").await.unwrap(), json!(7));
    }

    #[tokio::test]
    async fn test_response_accumulator_and_logs() {
        let ctx = RequestContext::new(json!({"id": 1}), Map::new());
        ctx.response_set(".user.id", json!(1)).await.unwrap();
        ctx.record_query("q1", json!({"rows": 0})).await;
        ctx.push_user_error(json!("bad input")).await;
        ctx.add_external_time(5);
        ctx.add_external_time(7);

        assert_eq!(ctx.response_snapshot().await, json!({"user": {"id": 1}}));
        assert_eq!(ctx.query_log().await, json!({"q1": {"rows": 0}}));
        assert_eq!(ctx.user_errors().await, vec![json!("bad input")]);
        assert_eq!(ctx.external_time_ms(), 12);
        assert_eq!(ctx.tracer().len(), 36);
    }
}
