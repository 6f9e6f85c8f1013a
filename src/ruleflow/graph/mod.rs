//! Rule/trigger state machine
//!
//! This module provides:
//! - `execute_rule` - one rule: pre, switch, finally
//! - `execute_flow` - branch -> rule -> branch until no transition applies
//! - `run_triggers` - every start point of a definition, concurrently

mod executor;

pub use executor::{execute_flow, execute_rule, run_triggers, FlowOutcome};
pub(crate) use executor::outcome_value;
