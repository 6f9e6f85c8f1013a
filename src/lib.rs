// SPDX-License-Identifier: MIT

//! ruleflow-rs: an interpreter for JSON-configured rule flows.
//!
//! Flows are documents of branches and rules whose actions are
//! resolvable nodes (`{resolveType, resolveData}`). The [`engine`] module
//! holds process-wide plumbing (errors, configuration, the dependency
//! registry); [`ruleflow`] holds the interpreter itself.

pub mod engine;
pub mod ruleflow;

pub use engine::error::{EngineError, Result};
pub use ruleflow::engine::Engine;
