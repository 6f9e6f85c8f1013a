//! Control-flow nodes: `conditional` and `callRule`

use serde::Deserialize;
use serde_json::Value;

use super::node::Node;
use super::{resolve_value, run_actions, Runtime, Scope};
use crate::engine::error::{EngineError, Result};
use crate::ruleflow::condition::{self, Condition};
use crate::ruleflow::graph;
use crate::ruleflow::ops::values::display;

#[derive(Debug, Clone, Deserialize)]
pub struct ConditionalNode {
    pub condition: Condition,
    #[serde(rename = "true", default)]
    pub on_true: Vec<Node>,
    #[serde(rename = "false", default)]
    pub on_false: Vec<Node>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallRuleNode {
    #[serde(alias = "ruleId")]
    pub rule: Value,
}

/// Run the branch picked by the condition; yields the branch's action results
pub(super) async fn conditional(
    node: &ConditionalNode,
    rt: &Runtime,
    scope: &Scope,
) -> Result<Value> {
    let holds = condition::evaluate(&node.condition, rt, scope).await?;
    let (branch, actions) = if holds {
        ("true", &node.on_true)
    } else {
        ("false", &node.on_false)
    };
    let results = run_actions(actions, rt, scope)
        .await
        .map_err(|e| e.at(format!("{branch} branch")))?;
    Ok(Value::Array(results))
}

/// Run one rule of the enclosing flow and return its state
pub(super) async fn call_rule(node: &CallRuleNode, rt: &Runtime, scope: &Scope) -> Result<Value> {
    let flow = scope
        .flow
        .clone()
        .ok_or_else(|| EngineError::node("callRule", "no flow in scope"))?;
    let rule = display(&resolve_value(node.rule.clone(), rt, scope).await?);
    let state = graph::execute_rule(&flow, &rule, rt, scope).await?;
    Ok(Value::from(state))
}

#[cfg(test)]
mod tests {
    use crate::engine::error::EngineError;
    use crate::ruleflow::resolver::testing::{eval, runtime};
    use serde_json::json;

    #[tokio::test]
    async fn test_conditional_picks_branch() {
        let rt = runtime();
        let doc = |lhs: i64| {
            json!({"kind": "conditional", "data": {
                "condition": {"operand1": lhs, "comparator": "gt", "operand2": 5, "comparisonType": "number"},
                "true": [{"kind": "setStore", "data": {"picked": "yes"}}],
                "false": [{"kind": "setStore", "data": {"picked": "no"}}]
            }})
        };

        eval(&rt, doc(9)).await.unwrap();
        assert_eq!(rt.ctx.store_get("picked").await.unwrap(), json!("yes"));

        eval(&rt, doc(1)).await.unwrap();
        assert_eq!(rt.ctx.store_get("picked").await.unwrap(), json!("no"));
    }

    #[tokio::test]
    async fn test_conditional_missing_branch_is_noop() {
        let rt = runtime();
        let out = eval(
            &rt,
            json!({"kind": "conditional", "data": {
                "condition": {"logicOp": "OR", "children": []},
                "true": [{"kind": "setStore", "data": {"x": 1}}]
            }}),
        )
        .await
        .unwrap();
        assert_eq!(out, json!([]));
        assert_eq!(rt.ctx.store_snapshot().await, json!({}));
    }

    #[tokio::test]
    async fn test_call_rule_outside_flow_fails() {
        let err = eval(&runtime(), json!({"kind": "callRule", "data": {"rule": "R1"}}))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidNode { ref kind, .. } if kind == "callRule"));
    }
}
