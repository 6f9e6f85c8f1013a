// SPDX-License-Identifier: MIT

//! Condition tree

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::engine::error::{EngineError, Result};

/// Logical connective of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

impl LogicOp {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AND" => Ok(Self::And),
            "OR" => Ok(Self::Or),
            _ => Err(EngineError::InvalidCondition(format!(
                "logic op must be AND or OR, got '{s}'"
            ))),
        }
    }
}

/// A condition is either a group of children or a single comparison
#[derive(Debug, Clone)]
pub enum Condition {
    Group(ConditionGroup),
    Leaf(Comparison),
}

#[derive(Debug, Clone)]
pub struct ConditionGroup {
    /// Checked when the group is evaluated
    pub logic_op: String,
    pub children: Vec<Condition>,
}

impl ConditionGroup {
    pub fn logic(&self) -> Result<LogicOp> {
        LogicOp::parse(&self.logic_op)
    }
}

/// Leaf comparison; operands may embed nodes
#[derive(Debug, Clone)]
pub struct Comparison {
    pub operand1: Value,
    pub comparator: String,
    pub operand2: Value,
    pub comparison_type: String,
}

impl Condition {
    pub fn and(children: Vec<Condition>) -> Self {
        Self::Group(ConditionGroup {
            logic_op: "AND".to_string(),
            children,
        })
    }

    pub fn or(children: Vec<Condition>) -> Self {
        Self::Group(ConditionGroup {
            logic_op: "OR".to_string(),
            children,
        })
    }

    pub fn compare(
        operand1: Value,
        comparator: &str,
        operand2: Value,
        comparison_type: &str,
    ) -> Self {
        Self::Leaf(Comparison {
            operand1,
            comparator: comparator.to_string(),
            operand2,
            comparison_type: comparison_type.to_string(),
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCondition {
    #[serde(default)]
    group: Option<bool>,
    #[serde(default, alias = "conditionType")]
    logic_op: Option<String>,
    #[serde(default, alias = "conditions")]
    children: Option<Vec<Condition>>,
    #[serde(default, alias = "op1")]
    operand1: Value,
    #[serde(default, alias = "opnd")]
    comparator: Option<String>,
    #[serde(default, alias = "op2")]
    operand2: Value,
    #[serde(default, alias = "comparisionType")]
    comparison_type: Option<String>,
}

impl TryFrom<RawCondition> for Condition {
    type Error = EngineError;

    fn try_from(raw: RawCondition) -> Result<Self> {
        let is_group =
            raw.group.unwrap_or(false) || raw.children.is_some() || raw.logic_op.is_some();

        match (is_group, raw.comparator) {
            (true, Some(_)) => Err(EngineError::InvalidCondition(
                "a condition cannot be both a group and a comparison".into(),
            )),
            (true, None) => Ok(Condition::Group(ConditionGroup {
                logic_op: raw.logic_op.unwrap_or_else(|| "AND".to_string()),
                children: raw.children.unwrap_or_default(),
            })),
            (false, Some(comparator)) => Ok(Condition::Leaf(Comparison {
                operand1: raw.operand1,
                comparator,
                operand2: raw.operand2,
                comparison_type: raw.comparison_type.unwrap_or_else(|| "string".to_string()),
            })),
            (false, None) => Err(EngineError::InvalidCondition(
                "condition needs either children or a comparator".into(),
            )),
        }
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawCondition::deserialize(deserializer)?;
        Condition::try_from(raw).map_err(serde::de::Error::custom)
    }
}
