// SPDX-License-Identifier: MIT

//! Per-request state
//!
//! This module provides:
//! - `RequestContext` - mutable state shared by every node of an invocation
//! - `Store` - the free-form key-value store inside it
//! - `path` - jq-style path reads and writes over JSON values
//! - `Response` - the value delivered once to the caller

mod context;
pub mod path;
mod response;
mod store;

pub use context::{LogEntry, RequestContext};
pub use response::{Response, ResponseCode};
pub use store::Store;
