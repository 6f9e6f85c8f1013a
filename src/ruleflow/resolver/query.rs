// SPDX-License-Identifier: MIT

//! `db`: raw statements through the query repository
//!
//! Every execution is recorded in the query log under its signature as
//! `{request, metadata, results}`. A per-node timeout marks the record with
//! `didTimeout` instead of failing the node.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::structural::{resolve_list, resolve_map};
use super::{Runtime, Scope};
use crate::engine::error::{EngineError, Result};
use crate::engine::repository::RawQueryRepository;
use crate::ruleflow::state::RequestContext;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryNode {
    pub query_string: String,
    /// Return rows instead of the affected row count
    #[serde(default)]
    pub scan: bool,
    #[serde(default)]
    pub parameters: Vec<Value>,
    #[serde(default)]
    pub named_parameters: Option<Map<String, Value>>,
    #[serde(default, rename = "async")]
    pub run_async: bool,
    /// Milliseconds
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub signature: Option<String>,
}

enum Params {
    Positional(Vec<Value>),
    Named(Map<String, Value>),
}

struct Execution {
    repo: Arc<dyn RawQueryRepository>,
    ctx: Arc<RequestContext>,
    query: String,
    params: Params,
    scan: bool,
    timeout: Option<u64>,
    run_async: bool,
    signature: String,
    request: Value,
}

/// Expand array parameters that directly follow `(` into `?,?,..`
pub fn expand_in_params(query: &str, params: Vec<Value>) -> (String, Vec<Value>) {
    let mut out = String::with_capacity(query.len());
    let mut flat = Vec::with_capacity(params.len());
    let mut params = params.into_iter();
    let mut last_significant: Option<char> = None;

    for c in query.chars() {
        if c == '?' {
            match params.next() {
                Some(Value::Array(items)) if last_significant == Some('(') => {
                    if items.is_empty() {
                        out.push_str("NULL");
                    } else {
                        out.push_str(&vec!["?"; items.len()].join(","));
                        flat.extend(items);
                    }
                }
                Some(other) => {
                    out.push('?');
                    flat.push(other);
                }
                None => out.push('?'),
            }
        } else {
            out.push(c);
        }
        if !c.is_whitespace() {
            last_significant = Some(c);
        }
    }
    flat.extend(params);
    (out, flat)
}

fn default_signature(query: &str, start_ms: i64) -> String {
    let head: String = query.split_whitespace().take(4).collect::<Vec<_>>().join(" ");
    format!("query|{head}|{start_ms}")
}

pub(super) async fn run(node: &QueryNode, rt: &Runtime, scope: &Scope) -> Result<Value> {
    let repo = rt.deps.raw_query()?.clone();

    let (query, params) = match &node.named_parameters {
        Some(named) => {
            let resolved = resolve_map(named.clone(), rt, scope).await?;
            (node.query_string.clone(), Params::Named(resolved))
        }
        None => {
            let resolved = resolve_list(node.parameters.clone(), rt, scope).await?;
            let (query, flat) = expand_in_params(&node.query_string, resolved);
            (query, Params::Positional(flat))
        }
    };

    let start = Utc::now();
    let signature = node
        .signature
        .clone()
        .unwrap_or_else(|| default_signature(&query, start.timestamp_millis()));
    let request = json!({
        "query": query,
        "parameters": match &params {
            Params::Positional(p) => Value::Array(p.clone()),
            Params::Named(m) => Value::Object(m.clone()),
        },
    });

    let execution = Execution {
        repo,
        ctx: rt.ctx.clone(),
        query,
        params,
        scan: node.scan,
        timeout: node.timeout,
        run_async: node.run_async,
        signature: signature.clone(),
        request: request.clone(),
    };

    if node.run_async {
        let pending = json!({
            "request": request,
            "metadata": {"start": start.to_rfc3339(), "async": true, "pending": true},
            "results": Value::Null,
        });
        rt.ctx.record_query(&signature, pending.clone()).await;
        let tracer = rt.tracer().to_string();
        tokio::spawn(async move {
            if let Err(e) = execution.execute().await {
                log::warn!("[{}] async query {} failed: {}", tracer, signature, e);
            }
        });
        return Ok(pending);
    }

    execution.execute().await
}

impl Execution {
    async fn execute(self) -> Result<Value> {
        let start = Utc::now();
        let clock = Instant::now();
        let work = run_statement(self.repo.clone(), &self.query, &self.params, self.scan);

        let outcome = match self.timeout {
            Some(ms) => tokio::time::timeout(Duration::from_millis(ms), work)
                .await
                .ok(),
            None => Some(work.await),
        };

        let elapsed = clock.elapsed().as_millis() as u64;
        self.ctx.add_external_time(elapsed);

        let (results, rows_affected, error, did_timeout) = match &outcome {
            None => (Value::Null, Value::Null, Value::Null, true),
            Some(Ok((results, affected))) => (results.clone(), json!(affected), Value::Null, false),
            Some(Err(e)) => (Value::Null, Value::Null, json!(e.to_string()), false),
        };

        let record = json!({
            "request": self.request,
            "metadata": {
                "start": start.to_rfc3339(),
                "end": Utc::now().to_rfc3339(),
                "timeTaken": elapsed,
                "timeout": self.timeout,
                "didTimeout": did_timeout,
                "async": self.run_async,
                "error": error,
                "rowsAffected": rows_affected,
            },
            "results": results,
        });
        self.ctx.record_query(&self.signature, record.clone()).await;

        if did_timeout {
            log::warn!("[{}] query {} timed out", self.ctx.tracer(), self.signature);
        }
        match outcome {
            Some(Err(e)) => Err(e),
            _ => Ok(record),
        }
    }
}

async fn run_statement(
    repo: Arc<dyn RawQueryRepository>,
    query: &str,
    params: &Params,
    scan: bool,
) -> Result<(Value, u64)> {
    let result = match (params, scan) {
        (Params::Positional(p), true) => repo.run_positional(query, p).await.map(rows_value),
        (Params::Named(m), true) => repo.run_named(query, m).await.map(rows_value),
        (Params::Positional(p), false) => repo
            .exec_positional(query, p)
            .await
            .map(|n| (Value::Null, n)),
        (Params::Named(m), false) => repo.exec_named(query, m).await.map(|n| (Value::Null, n)),
    };
    result.map_err(EngineError::from)
}

fn rows_value(rows: Vec<Map<String, Value>>) -> (Value, u64) {
    let count = rows.len() as u64;
    (Value::Array(rows.into_iter().map(Value::Object).collect()), count)
}
