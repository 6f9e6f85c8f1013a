//! `dbDump`: append a row of resolved columns to an audit table
//!
//! Insert failures are recorded as user errors and do not abort the flow.

use std::time::Instant;

use serde::Deserialize;
use serde_json::{json, Value};

use super::{resolve_value, Runtime, Scope};
use crate::engine::error::{EngineError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct DbDumpNode {
    pub columns: Value,
    pub table: String,
}

pub(super) async fn run(node: &DbDumpNode, rt: &Runtime, scope: &Scope) -> Result<Value> {
    let repo = rt.deps.dump()?.clone();
    let columns = match resolve_value(node.columns.clone(), rt, scope).await? {
        Value::Object(map) => map,
        other => {
            return Err(EngineError::node(
                "dbDump",
                format!("columns must resolve to an object, got {other}"),
            ))
        }
    };

    let clock = Instant::now();
    let outcome = repo.insert_dump(&columns, &node.table).await;
    rt.ctx.add_external_time(clock.elapsed().as_millis() as u64);

    match outcome {
        Ok(()) => Ok(Value::Bool(true)),
        Err(e) => {
            log::warn!("[{}] dump into {} failed: {}", rt.tracer(), node.table, e);
            rt.ctx
                .push_user_error(json!({"table": node.table, "error": e.to_string()}))
                .await;
            Ok(Value::Bool(false))
        }
    }
}
