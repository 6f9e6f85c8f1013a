// SPDX-License-Identifier: MIT

//! Dependency registry: capability tag to adapter binding.
//!
//! Built once at process start and shared read-only behind an `Arc`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::error::{EngineError, Result};
use super::repository::{
    AppCacheRepository, DumpRepository, OrmCacheRepository, RawQueryRepository,
};

/// Capabilities a node may require
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    RawQuery,
    AppCache,
    OrmCache,
    DbDump,
    Http,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RawQuery => "raw query repository",
            Self::AppCache => "app cache repository",
            Self::OrmCache => "orm cache repository",
            Self::DbDump => "dump repository",
            Self::Http => "http client",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Default)]
pub struct Dependencies {
    raw_query: Option<Arc<dyn RawQueryRepository>>,
    app_cache: Option<Arc<dyn AppCacheRepository>>,
    orm_cache: Option<Arc<dyn OrmCacheRepository>>,
    dump: Option<Arc<dyn DumpRepository>>,
    http: Option<reqwest::Client>,
}

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw_query(mut self, repo: Arc<dyn RawQueryRepository>) -> Self {
        self.raw_query = Some(repo);
        self
    }

    pub fn with_app_cache(mut self, repo: Arc<dyn AppCacheRepository>) -> Self {
        self.app_cache = Some(repo);
        self
    }

    pub fn with_orm_cache(mut self, repo: Arc<dyn OrmCacheRepository>) -> Self {
        self.orm_cache = Some(repo);
        self
    }

    pub fn with_dump(mut self, repo: Arc<dyn DumpRepository>) -> Self {
        self.dump = Some(repo);
        self
    }

    pub fn with_http(mut self, client: reqwest::Client) -> Self {
        self.http = Some(client);
        self
    }

    /// Build a reqwest client with an optional default timeout and register it
    pub fn with_http_timeout(self, timeout_ms: Option<u64>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(ms) = timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        Ok(self.with_http(builder.build()?))
    }

    pub fn raw_query(&self) -> Result<&Arc<dyn RawQueryRepository>> {
        self.raw_query
            .as_ref()
            .ok_or(EngineError::DependencyMissing(Capability::RawQuery))
    }

    pub fn app_cache(&self) -> Result<&Arc<dyn AppCacheRepository>> {
        self.app_cache
            .as_ref()
            .ok_or(EngineError::DependencyMissing(Capability::AppCache))
    }

    pub fn orm_cache(&self) -> Result<&Arc<dyn OrmCacheRepository>> {
        self.orm_cache
            .as_ref()
            .ok_or(EngineError::DependencyMissing(Capability::OrmCache))
    }

    pub fn dump(&self) -> Result<&Arc<dyn DumpRepository>> {
        self.dump
            .as_ref()
            .ok_or(EngineError::DependencyMissing(Capability::DbDump))
    }

    pub fn http(&self) -> Result<&reqwest::Client> {
        self.http
            .as_ref()
            .ok_or(EngineError::DependencyMissing(Capability::Http))
    }

    /// Capabilities currently bound
    pub fn capabilities(&self) -> Vec<Capability> {
        let mut caps = Vec::new();
        if self.raw_query.is_some() {
            caps.push(Capability::RawQuery);
        }
        if self.app_cache.is_some() {
            caps.push(Capability::AppCache);
        }
        if self.orm_cache.is_some() {
            caps.push(Capability::OrmCache);
        }
        if self.dump.is_some() {
            caps.push(Capability::DbDump);
        }
        if self.http.is_some() {
            caps.push(Capability::Http);
        }
        caps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::memory::{MemoryAppCache, MemoryDump};

    #[test]
    fn test_missing_dependency_reports_capability() {
        let deps = Dependencies::new();
        match deps.raw_query() {
            Err(EngineError::DependencyMissing(Capability::RawQuery)) => {}
            other => panic!("unexpected {:?}", other.err()),
        }
        assert!(matches!(
            deps.http(),
            Err(EngineError::DependencyMissing(Capability::Http))
        ));
    }

    #[test]
    fn test_registered_dependencies_are_listed() {
        let deps = Dependencies::new()
            .with_app_cache(Arc::new(MemoryAppCache::new()))
            .with_dump(Arc::new(MemoryDump::new()));

        assert!(deps.app_cache().is_ok());
        assert!(deps.dump().is_ok());
        assert_eq!(
            deps.capabilities(),
            vec![Capability::AppCache, Capability::DbDump]
        );
    }

    #[test]
    fn test_capability_display() {
        assert_eq!(Capability::OrmCache.to_string(), "orm cache repository");
    }
}
