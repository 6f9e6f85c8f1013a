//! The rule flow interpreter
//!
//! - `resolver` evaluates resolvable nodes and JSON values embedding them
//! - `condition` evaluates AND/OR condition trees
//! - `graph` runs flows as branch/rule state machines
//! - `engine` ties a definition, a request and the adapters into one invocation

pub mod condition;
pub mod engine;
pub mod graph;
pub mod loader;
pub mod ops;
pub mod resolver;
pub mod state;
pub mod types;
