// SPDX-License-Identifier: MIT

//! Free-form key-value store shared by the nodes of one invocation

use serde_json::{Map, Value};

use super::path;
use crate::engine::error::Result;

#[derive(Debug, Clone, Default)]
pub struct Store {
    fields: Map<String, Value>,
}

impl Store {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Overwrite a top-level field
    #[cfg(test)]
    pub fn update(&mut self, key: &str, value: Value) {
        self.fields.insert(key.to_string(), value);
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Read with a jq-style path such as `.user.tags[0]`
    pub fn get_path(&self, query: &str) -> Result<Value> {
        let segments = path::parse(query)?;
        match segments.split_first() {
            None => Ok(self.to_json()),
            Some((path::Segment::Key(key), rest)) => {
                path::get(self.fields.get(key).unwrap_or(&Value::Null), rest)
            }
            Some(_) => path::get(&self.to_json(), &segments),
        }
    }

    /// Write with a jq-style path, creating intermediate containers
    pub fn set_path(&mut self, query: &str, value: Value) -> Result<()> {
        let segments = path::parse(query)?;
        let mut root = Value::Object(std::mem::take(&mut self.fields));
        let outcome = path::set(&mut root, &segments, value);
        if let Value::Object(fields) = root {
            self.fields = fields;
        }
        outcome
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}
