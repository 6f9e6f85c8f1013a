// SPDX-License-Identifier: MIT

//! Flow document types
//!
//! A definition carries `preConfig` actions and a list of start points.
//! Each start point guards a [`Flow`]: a state machine whose states map to
//! branches, each branch naming the rule to run and where each of the
//! rule's return states leads next.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::engine::error::{EngineError, Result};
use crate::ruleflow::condition::Condition;
use crate::ruleflow::resolver::Node;

/// Top-level flow document
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowDefinition {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Actions run once, in order, before any start point
    #[serde(default)]
    pub pre_config: Vec<Node>,
    #[serde(default)]
    pub triggers: Vec<StartPoint>,
}

/// Entry condition plus the flow it starts
#[derive(Debug, Clone, Deserialize)]
pub struct StartPoint {
    /// Absent means always enter
    #[serde(rename = "if", default)]
    pub entry: Option<Arc<Condition>>,
    pub trigger: Arc<Flow>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    #[serde(default, deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub start_state: u64,
    #[serde(default, alias = "branchFlows")]
    pub branches: HashMap<u64, Branch>,
    #[serde(default)]
    pub rules: HashMap<String, Rule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Branch {
    #[serde(deserialize_with = "id_string")]
    pub rule: String,
    /// Return state of the rule -> next state; a missing entry ends the flow
    #[serde(default)]
    pub states: HashMap<u64, u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    #[serde(default, deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub pre: Vec<Node>,
    pub switch: RuleSwitch,
    #[serde(default)]
    pub finally: Vec<Node>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleSwitch {
    #[serde(default)]
    pub cases: Vec<Case>,
    pub default: Case,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Case {
    #[serde(default)]
    pub condition: Option<Condition>,
    #[serde(default, alias = "do")]
    pub actions: Vec<Node>,
    #[serde(default, alias = "return")]
    pub return_state: u64,
}

/// Ids appear both as strings and as numbers in stored documents
fn id_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "id must be a string or a number, got {other}"
        ))),
    }
}

impl Flow {
    /// Label used in logs and errors
    pub fn label(&self) -> String {
        match (self.id.is_empty(), self.name.is_empty()) {
            (false, false) => format!("{} | {}", self.id, self.name),
            (false, true) => self.id.clone(),
            (true, false) => self.name.clone(),
            (true, true) => "<unnamed>".to_string(),
        }
    }

    /// Static checks: the start state has a branch and every branch names
    /// an existing rule
    pub fn validate(&self) -> Result<()> {
        if !self.branches.contains_key(&self.start_state) {
            return Err(EngineError::BranchNotFound {
                flow: self.label(),
                state: self.start_state,
            });
        }

        let mut states: Vec<&u64> = self.branches.keys().collect();
        states.sort();
        for state in states {
            let branch = &self.branches[state];
            if !self.rules.contains_key(&branch.rule) {
                return Err(EngineError::RuleNotFound {
                    flow: self.label(),
                    rule: branch.rule.clone(),
                });
            }
        }
        Ok(())
    }
}

impl FlowDefinition {
    pub fn validate(&self) -> Result<()> {
        for (i, start) in self.triggers.iter().enumerate() {
            start
                .trigger
                .validate()
                .map_err(|e| e.at(format!("trigger {i}")))?;
        }
        Ok(())
    }
}
