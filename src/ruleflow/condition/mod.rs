// SPDX-License-Identifier: MIT

//! Condition evaluation for rule cases, entry conditions and iteration
//! filters.
//!
//! A condition is a tree of AND/OR groups over leaf comparisons:
//! - `{"logicOp": "AND", "children": [...]}`
//! - `{"operand1": .., "comparator": "gte", "operand2": .., "comparisonType": "number"}`

mod ast;
mod evaluator;

pub use ast::{Comparison, Condition, ConditionGroup, LogicOp};
pub use evaluator::{evaluate, evaluate_optional};
