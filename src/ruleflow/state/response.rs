//! Response emitted once per invocation

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Well-known response codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    Success,
    /// Every flow ran to completion without emitting a response
    Exhausted,
    BadRequest,
    NotFound,
    SystemMalfunction,
}

impl ResponseCode {
    pub fn code(self) -> u16 {
        match self {
            Self::Success => 0,
            Self::Exhausted => 10,
            Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::SystemMalfunction => 500,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Exhausted => "flow exhausted",
            Self::BadRequest => "bad request",
            Self::NotFound => "not found",
            Self::SystemMalfunction => "system malfunction",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub response_code: u16,
    pub response_description: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub errors: Vec<Value>,
}

impl Response {
    pub fn new(code: u16, description: impl Into<String>, data: Value, errors: Vec<Value>) -> Self {
        Self {
            response_code: code,
            response_description: description.into(),
            data,
            errors,
        }
    }

    pub fn from_code(code: ResponseCode, data: Value, errors: Vec<Value>) -> Self {
        Self::new(code.code(), code.description(), data, errors)
    }
}
