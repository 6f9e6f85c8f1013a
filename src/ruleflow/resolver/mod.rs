// SPDX-License-Identifier: MIT

//! Resolvable node interpreter
//!
//! This module provides:
//! - `Node` - the closed set of node kinds, decoded from `{resolveType, resolveData}`
//! - `resolve_value` - structural resolution of JSON values with embedded nodes
//! - `Runtime` / `Scope` - what every evaluation receives

mod api_call;
mod cache;
mod control;
mod date;
mod dump;
mod encode;
mod getters;
mod iteration;
mod misc;
pub mod node;
mod query;
mod setters;
pub mod structural;

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::engine::config::EngineConfig;
use crate::engine::registry::Dependencies;
use crate::ruleflow::state::RequestContext;
use crate::ruleflow::types::Flow;

pub use node::Node;
pub use structural::{fan_out, resolve_value, run_actions, FanOutError};

/// Process-wide and request-wide handles shared by every evaluation
#[derive(Clone)]
pub struct Runtime {
    pub ctx: Arc<RequestContext>,
    pub deps: Arc<Dependencies>,
    pub config: Arc<EngineConfig>,
}

impl Runtime {
    pub fn new(
        ctx: Arc<RequestContext>,
        deps: Arc<Dependencies>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self { ctx, deps, config }
    }

    pub fn tracer(&self) -> &str {
        self.ctx.tracer()
    }
}

/// Binding visible to `getIter` inside an iteration
#[derive(Debug, Clone, PartialEq)]
pub struct IterElement {
    pub element: Value,
    pub index: usize,
}

/// Lexical scope of one evaluation: the current iteration binding, the
/// flow being executed (for `callRule`) and the cancellation handle of the
/// enclosing fan-out.
#[derive(Clone, Default)]
pub struct Scope {
    pub iteration: Option<Arc<IterElement>>,
    pub flow: Option<Arc<Flow>>,
    pub cancel: CancellationToken,
}

impl Scope {
    pub fn root(cancel: CancellationToken) -> Self {
        Self {
            iteration: None,
            flow: None,
            cancel,
        }
    }

    pub fn with_iteration(&self, element: Value, index: usize) -> Self {
        Self {
            iteration: Some(Arc::new(IterElement { element, index })),
            ..self.clone()
        }
    }

    pub fn with_flow(&self, flow: Arc<Flow>) -> Self {
        Self {
            flow: Some(flow),
            ..self.clone()
        }
    }

    pub fn with_cancel(&self, cancel: CancellationToken) -> Self {
        Self {
            cancel,
            ..self.clone()
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use serde_json::Map;

    /// Runtime over an empty request and no adapters
    pub fn runtime() -> Runtime {
        runtime_with(Value::Null, Dependencies::new())
    }

    pub fn runtime_with(body: Value, deps: Dependencies) -> Runtime {
        Runtime::new(
            Arc::new(RequestContext::new(body, Map::new())),
            Arc::new(deps),
            Arc::new(EngineConfig::default()),
        )
    }

    /// Decode and evaluate a node document at the root scope
    pub async fn eval(rt: &Runtime, doc: Value) -> crate::engine::error::Result<Value> {
        resolve_value(doc, rt, &Scope::default()).await
    }
}
