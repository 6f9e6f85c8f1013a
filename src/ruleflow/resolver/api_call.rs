// SPDX-License-Identifier: MIT

//! `api`: outbound HTTP calls through the shared reqwest client
//!
//! The call is logged in the API log under `METHOD|url|start`. JSON bodies
//! are parsed when the response says `application/json`; anything else is
//! kept as text.

use std::time::{Duration, Instant};

use chrono::Utc;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{resolve_value, Runtime, Scope};
use crate::engine::error::{EngineError, Result};
use crate::ruleflow::ops::values::display;
use crate::ruleflow::state::RequestContext;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiCallNode {
    #[serde(default = "default_method")]
    pub method: String,
    pub url: Value,
    #[serde(default)]
    pub headers: Value,
    #[serde(default)]
    pub body: Value,
    #[serde(default, rename = "async")]
    pub run_async: bool,
    /// Milliseconds
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub signature: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

fn parse_method(method: &str) -> Result<Method> {
    match method.trim().to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "PATCH" => Ok(Method::PATCH),
        "DELETE" => Ok(Method::DELETE),
        other => Err(EngineError::node("api", format!("unsupported method '{other}'"))),
    }
}

fn header_map(headers: &HeaderMap) -> Value {
    let mut out = Map::new();
    for (name, value) in headers {
        out.insert(
            name.as_str().to_string(),
            Value::String(value.to_str().unwrap_or_default().to_string()),
        );
    }
    Value::Object(out)
}

struct Call {
    client: reqwest::Client,
    ctx: std::sync::Arc<RequestContext>,
    method: Method,
    url: String,
    headers: Map<String, Value>,
    body: Value,
    timeout: Option<u64>,
    run_async: bool,
    signature: String,
}

pub(super) async fn run(node: &ApiCallNode, rt: &Runtime, scope: &Scope) -> Result<Value> {
    let client = rt.deps.http()?.clone();
    let method = parse_method(&node.method)?;

    let url = display(&resolve_value(node.url.clone(), rt, scope).await?);
    if url.is_empty() {
        return Err(EngineError::node("api", "empty url"));
    }
    let headers = match resolve_value(node.headers.clone(), rt, scope).await? {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            return Err(EngineError::node(
                "api",
                format!("headers must be an object, got {other}"),
            ))
        }
    };
    let body = resolve_value(node.body.clone(), rt, scope).await?;

    let start = Utc::now();
    let signature = node
        .signature
        .clone()
        .unwrap_or_else(|| format!("{}|{}|{}", method, url, start.timestamp_millis()));

    let call = Call {
        client,
        ctx: rt.ctx.clone(),
        method,
        url,
        headers,
        body,
        timeout: node.timeout,
        run_async: node.run_async,
        signature: signature.clone(),
    };

    if node.run_async {
        let pending = json!({
            "request": call.request_value(),
            "metadata": {"start": start.to_rfc3339(), "async": true, "pending": true},
            "response": Value::Null,
        });
        rt.ctx.record_api(&signature, pending.clone()).await;
        let tracer = rt.tracer().to_string();
        tokio::spawn(async move {
            if let Err(e) = call.execute().await {
                log::warn!("[{}] async api call {} failed: {}", tracer, signature, e);
            }
        });
        return Ok(pending);
    }

    call.execute().await
}

impl Call {
    fn request_value(&self) -> Value {
        json!({
            "method": self.method.as_str(),
            "url": self.url,
            "headers": self.headers,
            "body": self.body,
        })
    }

    async fn send(&self) -> reqwest::Result<Value> {
        let mut request = self.client.request(self.method.clone(), &self.url);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), display(value));
        }
        if !self.body.is_null() {
            request = request.json(&self.body);
        }
        if let Some(ms) = self.timeout {
            request = request.timeout(Duration::from_millis(ms));
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = header_map(response.headers());
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("application/json"))
            .unwrap_or(false);
        let text = response.text().await?;
        let body = if is_json {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        } else {
            Value::String(text)
        };

        Ok(json!({
            "statusCode": status.as_u16(),
            "status": status.canonical_reason().unwrap_or_default(),
            "headers": headers,
            "body": body,
        }))
    }

    async fn execute(self) -> Result<Value> {
        let start = Utc::now();
        let clock = Instant::now();
        let outcome = self.send().await;
        let elapsed = clock.elapsed().as_millis() as u64;
        self.ctx.add_external_time(elapsed);

        let did_timeout = matches!(&outcome, Err(e) if e.is_timeout());

        let (response, error) = match &outcome {
            Ok(response) => (response.clone(), Value::Null),
            Err(_) if did_timeout => (Value::Null, Value::Null),
            Err(e) => (Value::Null, json!(e.to_string())),
        };
        let record = json!({
            "request": self.request_value(),
            "metadata": {
                "start": start.to_rfc3339(),
                "end": Utc::now().to_rfc3339(),
                "timeTaken": elapsed,
                "timeout": self.timeout,
                "didTimeout": did_timeout,
                "async": self.run_async,
                "error": error,
            },
            "response": response,
        });
        self.ctx.record_api(&self.signature, record.clone()).await;

        match outcome {
            Err(_) if did_timeout => {
                log::warn!("[{}] api call {} timed out", self.ctx.tracer(), self.signature);
                Ok(record)
            }
            Err(e) => Err(e.into()),
            Ok(_) => Ok(record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::registry::{Capability, Dependencies};
    use crate::ruleflow::resolver::testing::{eval, runtime, runtime_with};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response and return the base url
    async fn serve_once(content_type: &'static str, body: &'static str, delay_ms: u64) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let _ = socket.read(&mut buf).await;
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            let reply = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                content_type,
                body.len(),
                body
            );
            let _ = socket.write_all(reply.as_bytes()).await;
        });
        format!("http://{addr}")
    }

    fn http_runtime() -> Runtime {
        runtime_with(
            Value::Null,
            Dependencies::new().with_http(reqwest::Client::new()),
        )
    }

    #[tokio::test]
    async fn test_json_response_is_parsed_and_logged() {
        let base = serve_once("application/json", r#"{"ok":true}"#, 0).await;
        let rt = http_runtime();
        let record = eval(
            &rt,
            json!({"kind": "api", "data": {
                "method": "post", "url": format!("{base}/hook"), "body": {"a": 1}, "signature": "hook"
            }}),
        )
        .await
        .unwrap();

        assert_eq!(record["response"]["statusCode"], json!(200));
        assert_eq!(record["response"]["body"], json!({"ok": true}));
        assert_eq!(record["request"]["method"], json!("POST"));
        assert_eq!(rt.ctx.api_log().await["hook"], record);
    }

    #[tokio::test]
    async fn test_text_response_and_default_signature() {
        let base = serve_once("text/plain", "pong", 0).await;
        let rt = http_runtime();
        let record = eval(&rt, json!({"kind": "api", "data": {"url": format!("{base}/ping")}}))
            .await
            .unwrap();
        assert_eq!(record["response"]["body"], json!("pong"));

        let log = rt.ctx.api_log().await;
        let key = log.as_object().unwrap().keys().next().unwrap().clone();
        assert!(key.starts_with(&format!("GET|{base}/ping|")));
    }

    #[tokio::test]
    async fn test_timeout_marks_record() {
        let base = serve_once("text/plain", "late", 500).await;
        let rt = http_runtime();
        let record = eval(
            &rt,
            json!({"kind": "api", "data": {"url": base, "timeout": 20}}),
        )
        .await
        .unwrap();
        assert_eq!(record["metadata"]["didTimeout"], json!(true));
        assert_eq!(record["response"], Value::Null);
    }

    #[tokio::test]
    async fn test_requires_client_and_valid_method() {
        let err = eval(&runtime(), json!({"kind": "api", "data": {"url": "http://localhost"}}))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::DependencyMissing(Capability::Http)));

        let err = eval(
            &http_runtime(),
            json!({"kind": "api", "data": {"method": "TRACE", "url": "http://localhost"}}),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("unsupported method"));
    }
}
