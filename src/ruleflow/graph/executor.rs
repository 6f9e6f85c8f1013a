// SPDX-License-Identifier: MIT

//! Flow executor

use std::sync::Arc;

use serde_json::Value;

use crate::engine::error::{EngineError, Result};
use crate::ruleflow::condition;
use crate::ruleflow::resolver::{fan_out, run_actions, Runtime, Scope};
use crate::ruleflow::types::{Case, Flow, Rule, StartPoint};

/// What a flow did before it stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowOutcome {
    /// Rule ids in execution order
    pub visited: Vec<String>,
    /// State the flow stopped at
    pub final_state: u64,
    pub transitions: u64,
}

/// Run the rule `rule_id` of `flow` and return the state it selected
pub async fn execute_rule(flow: &Flow, rule_id: &str, rt: &Runtime, scope: &Scope) -> Result<u64> {
    let rule = flow
        .rules
        .get(rule_id)
        .ok_or_else(|| EngineError::RuleNotFound {
            flow: flow.label(),
            rule: rule_id.to_string(),
        })?;
    run_rule(flow, rule_id, rule, rt, scope).await
}

async fn run_rule(
    flow: &Flow,
    rule_id: &str,
    rule: &Rule,
    rt: &Runtime,
    scope: &Scope,
) -> Result<u64> {
    log::debug!("[{}] flow {} rule {} | pre", rt.tracer(), flow.label(), rule_id);
    run_actions(&rule.pre, rt, scope)
        .await
        .map_err(|e| e.at("pre"))?;

    let (label, case) = select_case(rule, rt, scope).await?;
    log::debug!("[{}] flow {} rule {} | {}", rt.tracer(), flow.label(), rule_id, label);
    run_actions(&case.actions, rt, scope)
        .await
        .map_err(|e| e.at(label.clone()))?;

    log::debug!("[{}] flow {} rule {} | finally", rt.tracer(), flow.label(), rule_id);
    run_actions(&rule.finally, rt, scope)
        .await
        .map_err(|e| e.at("finally"))?;

    Ok(case.return_state)
}

/// First case whose condition holds, in declaration order, else the default
async fn select_case<'r>(
    rule: &'r Rule,
    rt: &Runtime,
    scope: &Scope,
) -> Result<(String, &'r Case)> {
    for (i, case) in rule.switch.cases.iter().enumerate() {
        let holds = condition::evaluate_optional(case.condition.as_ref(), rt, scope)
            .await
            .map_err(|e| e.at(format!("case {i}")))?;
        if holds {
            return Ok((format!("case {i}"), case));
        }
    }
    Ok(("default case".to_string(), &rule.switch.default))
}

/// Walk the flow from its start state until a state has no branch or a
/// return state has no transition.
pub async fn execute_flow(flow: Arc<Flow>, rt: &Runtime, scope: &Scope) -> Result<FlowOutcome> {
    let scope = scope.with_flow(flow.clone());
    let label = flow.label();
    let mut state = flow.start_state;
    let mut visited = Vec::new();
    let mut transitions = 0u64;

    loop {
        if scope.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let Some(branch) = flow.branches.get(&state) else {
            log::info!("[{}] flow {}: no branch for state {}, ending", rt.tracer(), label, state);
            break;
        };
        let rule = flow
            .rules
            .get(&branch.rule)
            .ok_or_else(|| EngineError::RuleNotFound {
                flow: label.clone(),
                rule: branch.rule.clone(),
            })?;

        log::info!("[{}] flow {}: state {} -> rule {}", rt.tracer(), label, state, branch.rule);
        visited.push(branch.rule.clone());
        let returned = run_rule(&flow, &branch.rule, rule, rt, &scope)
            .await
            .map_err(|e| e.at(format!("rule '{}'", branch.rule)))?;

        let Some(next) = branch.states.get(&returned) else {
            log::info!(
                "[{}] flow {}: no transition for return state {}, ending",
                rt.tracer(),
                label,
                returned
            );
            break;
        };

        transitions += 1;
        if let Some(limit) = rt.config.max_transitions {
            if transitions > limit {
                return Err(EngineError::TransitionLimit { flow: label, limit });
            }
        }
        state = *next;
    }

    Ok(FlowOutcome {
        visited,
        final_state: state,
        transitions,
    })
}

/// Run every start point concurrently against the shared request context.
///
/// Each start point enters its flow only when its entry condition holds;
/// the outcome is `None` for start points that did not enter. The first
/// failure cancels the others and is returned once every task has unwound.
pub async fn run_triggers(
    start_points: &[StartPoint],
    rt: &Runtime,
    scope: &Scope,
) -> Result<Vec<Option<FlowOutcome>>> {
    log::info!("[{}] starting {} trigger(s)", rt.tracer(), start_points.len());

    let outcomes = fan_out(start_points.to_vec(), scope, |start, child| {
        let rt = rt.clone();
        async move {
            let entered = match start.entry.as_deref() {
                Some(entry) => condition::evaluate(entry, &rt, &child).await?,
                None => true,
            };
            if !entered {
                log::debug!("[{}] flow {} not entered", rt.tracer(), start.trigger.label());
                return Ok(None);
            }
            execute_flow(start.trigger.clone(), &rt, &child).await.map(Some)
        }
    })
    .await
    .map_err(|e| e.locate(|i| format!("trigger {i}")));

    match &outcomes {
        Ok(_) => log::info!("[{}] triggers finished", rt.tracer()),
        Err(e) => log::debug!("[{}] triggers failed: {}", rt.tracer(), e),
    }
    outcomes
}

/// Serialize an outcome for logs
pub(crate) fn outcome_value(outcome: &FlowOutcome) -> Value {
    serde_json::json!({
        "visited": outcome.visited,
        "finalState": outcome.final_state,
        "transitions": outcome.transitions,
    })
}
