// SPDX-License-Identifier: MIT

//! Engine configuration read from the environment.

use std::env;

use super::error::{EngineError, Result};

/// Default TTL for `setCache` nodes that omit one, in seconds
pub const DEFAULT_CACHE_TTL: u64 = 86_400;

/// Largest numeric `forEach`/`filterMap` input accepted by default
pub const DEFAULT_MAX_ITERATIONS: u64 = 100_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound on state transitions per flow; `None` runs unbounded
    pub max_transitions: Option<u64>,
    /// Client-wide default timeout for `api` nodes
    pub http_timeout_ms: Option<u64>,
    pub default_cache_ttl: u64,
    /// Upper bound on the range a numeric iteration input expands to
    pub max_iterations: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_transitions: None,
            http_timeout_ms: None,
            default_cache_ttl: DEFAULT_CACHE_TTL,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl EngineConfig {
    /// Read `RULEFLOW_MAX_TRANSITIONS`, `RULEFLOW_HTTP_TIMEOUT_MS`,
    /// `RULEFLOW_CACHE_TTL` and `RULEFLOW_MAX_ITERATIONS`. Unset variables
    /// keep their defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(v) = parse_var(&lookup, "RULEFLOW_MAX_TRANSITIONS")? {
            config.max_transitions = Some(v);
        }
        if let Some(v) = parse_var(&lookup, "RULEFLOW_HTTP_TIMEOUT_MS")? {
            config.http_timeout_ms = Some(v);
        }
        if let Some(v) = parse_var(&lookup, "RULEFLOW_CACHE_TTL")? {
            config.default_cache_ttl = v;
        }
        if let Some(v) = parse_var(&lookup, "RULEFLOW_MAX_ITERATIONS")? {
            config.max_iterations = v;
        }
        Ok(config)
    }

    pub fn with_max_transitions(mut self, limit: Option<u64>) -> Self {
        self.max_transitions = limit;
        self
    }

    pub fn with_max_iterations(mut self, limit: u64) -> Self {
        self.max_iterations = limit;
        self
    }
}

fn parse_var<F>(lookup: &F, key: &str) -> Result<Option<u64>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| EngineError::Config(format!("{key}={raw}: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.default_cache_ttl, 86_400);
        assert!(config.max_transitions.is_none());
    }

    #[test]
    fn test_reads_variables() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            ("RULEFLOW_MAX_TRANSITIONS", "50"),
            ("RULEFLOW_HTTP_TIMEOUT_MS", " 2000 "),
            ("RULEFLOW_CACHE_TTL", ""),
            ("RULEFLOW_MAX_ITERATIONS", "500"),
        ]))
        .unwrap();
        assert_eq!(config.max_transitions, Some(50));
        assert_eq!(config.http_timeout_ms, Some(2000));
        assert_eq!(config.default_cache_ttl, DEFAULT_CACHE_TTL);
        assert_eq!(config.max_iterations, 500);
    }

    #[test]
    fn test_rejects_non_numeric() {
        let err = EngineConfig::from_lookup(lookup_from(&[("RULEFLOW_CACHE_TTL", "soon")]))
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(ref m) if m.contains("RULEFLOW_CACHE_TTL")));
    }
}
