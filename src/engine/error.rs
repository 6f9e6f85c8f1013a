// SPDX-License-Identifier: MIT

//! Typed error handling for ruleflow-rs
//!
//! Every resolution call returns [`EngineError`]. Fan-outs wrap the first
//! failure they observe in [`EngineError::At`] so the failing key or index
//! survives propagation.

use thiserror::Error;

use super::registry::Capability;
use super::repository::RepositoryError;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Top-level error type for ruleflow-rs
#[derive(Debug, Error)]
pub enum EngineError {
    /// Node kind has no registered behaviour
    #[error("unknown node kind '{0}'")]
    UnknownKind(String),

    /// Node data does not fit the payload of its kind
    #[error("could not decode '{kind}' node: {source}")]
    Decode {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    /// No comparator registered for the (comparator, comparisonType) pair
    #[error("no comparator '{comparator}' for comparison type '{comparison_type}'")]
    ComparatorNotFound {
        comparator: String,
        comparison_type: String,
    },

    /// Comparator operands could not be read as the comparison type
    #[error("operand type mismatch for {comparison_type}: {message}")]
    OperandTypeMismatch {
        comparison_type: String,
        message: String,
    },

    /// Malformed condition tree
    #[error("invalid condition: {0}")]
    InvalidCondition(String),

    /// A branch references a rule the flow does not define
    #[error("rule '{rule}' not found in flow '{flow}'")]
    RuleNotFound { flow: String, rule: String },

    /// A start state has no branch
    #[error("branch {state} not found in flow '{flow}'")]
    BranchNotFound { flow: String, state: u64 },

    /// The dependency registry has no adapter for a capability
    #[error("dependency missing: {0}")]
    DependencyMissing(Capability),

    /// Failure reported by a storage or HTTP adapter
    #[error("upstream {source_kind} failure: {message}")]
    Upstream { source_kind: String, message: String },

    /// A sibling task failed first
    #[error("cancelled")]
    Cancelled,

    /// Positional wrapper added by fan-outs
    #[error("at {location}: {source}")]
    At {
        location: String,
        #[source]
        source: Box<EngineError>,
    },

    /// Node-level bad input (cast, date, encoder, ...)
    #[error("{kind}: {message}")]
    InvalidNode { kind: String, message: String },

    /// Arithmetic failure such as division by zero
    #[error("arithmetic error: {0}")]
    Arithmetic(String),

    /// A flow exceeded the configured transition limit
    #[error("flow '{flow}' exceeded {limit} transitions")]
    TransitionLimit { flow: String, limit: u64 },

    /// A spawned task panicked
    #[error("task failed: {0}")]
    TaskFailed(String),

    /// Invalid engine configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Create an invalid-node error
    pub fn node(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidNode {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Create an upstream error
    pub fn upstream(source_kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            source_kind: source_kind.into(),
            message: message.into(),
        }
    }

    pub fn mismatch(comparison_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::OperandTypeMismatch {
            comparison_type: comparison_type.into(),
            message: message.into(),
        }
    }

    /// Wrap with the key or index a fan-out failed at
    pub fn at(self, location: impl Into<String>) -> Self {
        Self::At {
            location: location.into(),
            source: Box::new(self),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), Self::Cancelled)
    }

    /// The innermost error beneath any positional wrappers
    pub fn root(&self) -> &EngineError {
        match self {
            Self::At { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<RepositoryError> for EngineError {
    fn from(err: RepositoryError) -> Self {
        Self::upstream(err.source_kind(), err.to_string())
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        Self::upstream("http", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_unwraps_positional_wrappers() {
        let err = EngineError::UnknownKind("nope".into())
            .at("index 1")
            .at("key 'y'");
        assert!(matches!(err.root(), EngineError::UnknownKind(k) if k == "nope"));
        assert_eq!(err.to_string(), "at key 'y': at index 1: unknown node kind 'nope'");
    }

    #[test]
    fn test_cancelled_detection() {
        assert!(EngineError::Cancelled.at("index 0").is_cancelled());
        assert!(!EngineError::Arithmetic("x".into()).is_cancelled());
    }

    #[test]
    fn test_repository_error_becomes_upstream() {
        let err: EngineError = RepositoryError::Query("syntax".into()).into();
        match err {
            EngineError::Upstream { source_kind, message } => {
                assert_eq!(source_kind, "query");
                assert!(message.contains("syntax"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
