// SPDX-License-Identifier: MIT

//! In-process repository adapters used by the CLI and tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::repository::{AppCacheRepository, DumpRepository, RepositoryResult};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

/// TTL-aware key-value cache held in memory
#[derive(Clone, Default)]
pub struct MemoryAppCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl MemoryAppCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys held, expired or not
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl AppCacheRepository for MemoryAppCache {
    async fn set(&self, key: &str, value: &Value, ttl_secs: u64) -> RepositoryResult<()> {
        let entry = CacheEntry {
            value: value.clone(),
            expires_at: Instant::now() + Duration::from_secs(ttl_secs),
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> RepositoryResult<Option<Value>> {
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> RepositoryResult<u64> {
        let removed = self.entries.write().await.remove(key);
        Ok(u64::from(removed.is_some()))
    }
}

/// Dump sink that records every insert per table
#[derive(Clone, Default)]
pub struct MemoryDump {
    tables: Arc<RwLock<HashMap<String, Vec<Map<String, Value>>>>>,
}

impl MemoryDump {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn rows(&self, table: &str) -> Vec<Map<String, Value>> {
        self.tables
            .read()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl DumpRepository for MemoryDump {
    async fn insert_dump(&self, columns: &Map<String, Value>, table: &str) -> RepositoryResult<()> {
        log::debug!("dump insert into {}: {} columns", table, columns.len());
        self.tables
            .write()
            .await
            .entry(table.to_string())
            .or_default()
            .push(columns.clone());
        Ok(())
    }
}
