//! Condition evaluator
//!
//! Groups evaluate children one at a time in declaration order so that AND
//! stops at the first false child and OR at the first true one.

use futures::future::BoxFuture;
use futures::FutureExt;

use super::ast::{Comparison, Condition, ConditionGroup, LogicOp};
use crate::engine::error::Result;
use crate::ruleflow::ops::comparators;
use crate::ruleflow::resolver::{resolve_value, Runtime, Scope};

/// Evaluate a condition against the request context
pub fn evaluate<'a>(
    condition: &'a Condition,
    rt: &'a Runtime,
    scope: &'a Scope,
) -> BoxFuture<'a, Result<bool>> {
    async move {
        match condition {
            Condition::Group(group) => evaluate_group(group, rt, scope).await,
            Condition::Leaf(comparison) => evaluate_comparison(comparison, rt, scope).await,
        }
    }
    .boxed()
}

/// `None` conditions always hold
pub async fn evaluate_optional(
    condition: Option<&Condition>,
    rt: &Runtime,
    scope: &Scope,
) -> Result<bool> {
    match condition {
        Some(c) => evaluate(c, rt, scope).await,
        None => Ok(true),
    }
}

async fn evaluate_group(group: &ConditionGroup, rt: &Runtime, scope: &Scope) -> Result<bool> {
    let op = group.logic()?;

    for child in &group.children {
        let result = evaluate(child, rt, scope).await?;
        match op {
            LogicOp::And if !result => return Ok(false),
            LogicOp::Or if result => return Ok(true),
            _ => {}
        }
    }

    // Empty AND holds, empty OR does not
    Ok(op == LogicOp::And)
}

async fn evaluate_comparison(comparison: &Comparison, rt: &Runtime, scope: &Scope) -> Result<bool> {
    let compare = comparators::lookup(&comparison.comparator, &comparison.comparison_type)?;
    let left = resolve_value(comparison.operand1.clone(), rt, scope).await?;
    let right = resolve_value(comparison.operand2.clone(), rt, scope).await?;
    let result = compare(&left, &right)?;

    log::debug!(
        "[{}] {} {} {} ({}) => {}",
        rt.tracer(),
        left,
        comparison.comparator,
        right,
        comparison.comparison_type,
        result
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::error::EngineError;
    use crate::engine::registry::Dependencies;
    use crate::ruleflow::resolver::testing::runtime_with;
    use serde_json::{json, Value};

    /// A leaf whose operand fails to resolve if it is ever reached
    fn exploding() -> Condition {
        Condition::compare(
            json!({"kind": "cast", "data": {"input": "not a number", "to": "number"}}),
            "eq",
            json!(1),
            "number",
        )
    }

    fn always(value: bool) -> Condition {
        Condition::compare(json!(value), "eq", json!(true), "boolean")
    }

    async fn check(cond: &Condition) -> Result<bool> {
        let rt = runtime_with(json!({"age": 30, "name": "ada"}), Dependencies::new());
        evaluate(cond, &rt, &Scope::default()).await
    }

    #[tokio::test]
    async fn test_empty_groups() {
        assert!(check(&Condition::and(vec![])).await.unwrap());
        assert!(!check(&Condition::or(vec![])).await.unwrap());
    }

    #[tokio::test]
    async fn test_and_short_circuits_on_false() {
        let cond = Condition::and(vec![always(false), exploding()]);
        assert!(!check(&cond).await.unwrap());

        // Reaching the exploding child surfaces its error
        let cond = Condition::and(vec![always(true), exploding()]);
        assert!(check(&cond).await.is_err());
    }

    #[tokio::test]
    async fn test_or_short_circuits_on_true() {
        let cond = Condition::or(vec![always(true), exploding()]);
        assert!(check(&cond).await.unwrap());

        let cond = Condition::or(vec![always(false), exploding()]);
        assert!(check(&cond).await.is_err());
    }

    #[tokio::test]
    async fn test_nested_groups_with_resolved_operands() {
        let age = json!({"kind": "jq", "data": {
            "query": ".age",
            "input": {"kind": "getReq", "data": {}}
        }});
        let cond = Condition::and(vec![
            Condition::compare(age.clone(), "gte", json!(18), "number"),
            Condition::or(vec![
                Condition::compare(json!("bob"), "eq", json!("ada"), "string"),
                Condition::compare(json!("ada"), "in", json!(["ada", "grace"]), "string"),
            ]),
        ]);
        assert!(check(&cond).await.unwrap());
    }

    #[tokio::test]
    async fn test_comparator_checked_before_operands() {
        let cond = Condition::compare(exploding_operand(), "between", json!(1), "number");
        let err = check(&cond).await.unwrap_err();
        assert!(matches!(err, EngineError::ComparatorNotFound { .. }));
    }

    fn exploding_operand() -> Value {
        json!({"kind": "noSuchKind", "data": {}})
    }

    #[tokio::test]
    async fn test_invalid_logic_op_fails_evaluation() {
        let cond: Condition = serde_json::from_value(json!({
            "logicOp": "NAND",
            "children": [{"op1": 1, "opnd": "eq", "op2": 1, "comparisonType": "number"}]
        }))
        .unwrap();
        assert!(matches!(check(&cond).await, Err(EngineError::InvalidCondition(_))));
    }

    #[tokio::test]
    async fn test_optional_condition_defaults_true() {
        let rt = runtime_with(Value::Null, Dependencies::new());
        assert!(evaluate_optional(None, &rt, &Scope::default()).await.unwrap());
    }
}
