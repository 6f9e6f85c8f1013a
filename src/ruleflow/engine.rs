// SPDX-License-Identifier: MIT

//! Invocation entry point
//!
//! `Engine` owns the process-wide pieces (adapters and configuration) and
//! turns a flow definition plus a request into one spawned run. The caller
//! gets the request context, a receiver for the single response and the
//! handle of the run.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::graph::{self, outcome_value};
use super::resolver::{run_actions, Runtime, Scope};
use super::state::{RequestContext, Response, ResponseCode};
use super::types::FlowDefinition;
use crate::engine::config::EngineConfig;
use crate::engine::error::{EngineError, Result};
use crate::engine::registry::Dependencies;

/// Request handed to an invocation
#[derive(Debug, Clone, Default)]
pub struct RequestInput {
    pub body: Value,
    pub headers: Map<String, Value>,
}

/// A running invocation
pub struct Invocation {
    pub context: Arc<RequestContext>,
    pub response: oneshot::Receiver<Response>,
    pub handle: JoinHandle<Result<()>>,
}

#[derive(Clone)]
pub struct Engine {
    deps: Arc<Dependencies>,
    config: Arc<EngineConfig>,
}

impl Engine {
    pub fn new(deps: Dependencies, config: EngineConfig) -> Self {
        Self {
            deps: Arc::new(deps),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn dependencies(&self) -> &Dependencies {
        &self.deps
    }

    /// Spawn a run of `definition` for one request
    pub fn invoke(&self, definition: Arc<FlowDefinition>, input: RequestInput) -> Invocation {
        let (tx, rx) = oneshot::channel();
        let context = Arc::new(RequestContext::new(input.body, input.headers).with_responder(tx));
        let rt = Runtime::new(context.clone(), self.deps.clone(), self.config.clone());

        log::info!("[{}] invoking '{}'", rt.tracer(), definition.name);
        let handle = tokio::spawn(async move { drive(definition, rt).await });

        Invocation {
            context,
            response: rx,
            handle,
        }
    }

    /// Invoke and wait for the response. The run may still be finishing
    /// side effects when this returns.
    pub async fn run(
        &self,
        definition: Arc<FlowDefinition>,
        input: RequestInput,
    ) -> Result<Response> {
        let invocation = self.invoke(definition, input);
        invocation
            .response
            .await
            .map_err(|_| EngineError::TaskFailed("invocation ended without a response".into()))
    }

    /// Invoke and wait for both the response and the end of the run
    pub async fn run_to_completion(
        &self,
        definition: Arc<FlowDefinition>,
        input: RequestInput,
    ) -> Result<(Response, Result<()>)> {
        let invocation = self.invoke(definition, input);
        let outcome = invocation
            .handle
            .await
            .map_err(|e| EngineError::TaskFailed(e.to_string()))?;
        let response = invocation
            .response
            .await
            .map_err(|_| EngineError::TaskFailed("invocation ended without a response".into()))?;
        Ok((response, outcome))
    }
}

/// Run preConfig and every start point, then make sure a response was sent
async fn drive(definition: Arc<FlowDefinition>, rt: Runtime) -> Result<()> {
    let scope = Scope::root(CancellationToken::new());
    let outcome = execute(&definition, &rt, &scope).await;

    match &outcome {
        Ok(()) => {
            if !rt.ctx.has_responded().await {
                let data = rt.ctx.response_snapshot().await;
                let errors = rt.ctx.user_errors().await;
                rt.ctx
                    .respond(Response::from_code(ResponseCode::Exhausted, data, errors))
                    .await;
            }
            log::info!(
                "[{}] '{}' finished ({} ms external)",
                rt.tracer(),
                definition.name,
                rt.ctx.external_time_ms()
            );
        }
        Err(e) => {
            log::error!("[{}] '{}' failed: {}", rt.tracer(), definition.name, e);
            rt.ctx.push_system_error(e.to_string()).await;
            // Internal error text stays out of the response
            let errors = rt.ctx.user_errors().await;
            rt.ctx
                .respond(Response::from_code(
                    ResponseCode::SystemMalfunction,
                    Value::Null,
                    errors,
                ))
                .await;
        }
    }
    outcome
}

async fn execute(definition: &FlowDefinition, rt: &Runtime, scope: &Scope) -> Result<()> {
    run_actions(&definition.pre_config, rt, scope)
        .await
        .map_err(|e| e.at("preConfig"))?;

    let outcomes = graph::run_triggers(&definition.triggers, rt, scope).await?;
    for (i, outcome) in outcomes.iter().enumerate() {
        if let Some(outcome) = outcome {
            log::debug!("[{}] trigger {}: {}", rt.tracer(), i, outcome_value(outcome));
        }
    }
    Ok(())
}
