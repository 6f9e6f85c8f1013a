// SPDX-License-Identifier: MIT

//! Storage collaborator contracts
//!
//! The interpreter reaches storage only through these traits. Concrete
//! adapters live outside the crate; [`super::memory`] provides in-process
//! versions for the CLI and tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// One result row, keyed by column name
pub type Row = Map<String, Value>;

/// Errors returned by repository adapters
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("query failed: {0}")]
    Query(String),

    #[error("cache failed: {0}")]
    Cache(String),

    #[error("model '{0}' not found")]
    ModelNotFound(String),

    #[error("insert failed: {0}")]
    Insert(String),

    #[error("connection failed: {0}")]
    Connection(String),
}

impl RepositoryError {
    /// Short tag naming the failing collaborator
    pub fn source_kind(&self) -> &'static str {
        match self {
            Self::Query(_) => "query",
            Self::Cache(_) => "cache",
            Self::ModelNotFound(_) => "orm",
            Self::Insert(_) => "dump",
            Self::Connection(_) => "connection",
        }
    }
}

pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// Raw statement execution against the relational store
#[async_trait]
pub trait RawQueryRepository: Send + Sync {
    async fn run_positional(&self, query: &str, params: &[Value]) -> RepositoryResult<Vec<Row>>;

    async fn run_named(&self, query: &str, params: &Map<String, Value>)
        -> RepositoryResult<Vec<Row>>;

    /// Execute without returning rows; yields the affected row count
    async fn exec_positional(&self, query: &str, params: &[Value]) -> RepositoryResult<u64>;

    async fn exec_named(&self, query: &str, params: &Map<String, Value>) -> RepositoryResult<u64>;
}

/// Application key-value cache
#[async_trait]
pub trait AppCacheRepository: Send + Sync {
    async fn set(&self, key: &str, value: &Value, ttl_secs: u64) -> RepositoryResult<()>;

    /// `None` when the key is absent or expired
    async fn get(&self, key: &str) -> RepositoryResult<Option<Value>>;

    /// Returns the number of keys removed
    async fn delete(&self, key: &str) -> RepositoryResult<u64>;
}

/// Association edge between two models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Association {
    pub name: String,
    pub target: String,
    #[serde(default)]
    pub join_key: String,
}

/// Cached table description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub name: String,
    pub primary_key: String,
    #[serde(default)]
    pub projections: Vec<String>,
    #[serde(default)]
    pub associations: Vec<Association>,
}

/// Schema cache used by association flatteners
#[async_trait]
pub trait OrmCacheRepository: Send + Sync {
    async fn get_model(&self, name: &str) -> RepositoryResult<Model>;
}

/// Bulk insert sink for dump tables
#[async_trait]
pub trait DumpRepository: Send + Sync {
    async fn insert_dump(&self, columns: &Map<String, Value>, table: &str) -> RepositoryResult<()>;
}
