//! Runtime configuration for the searcher and the binary.
//!
//! Values are read with the `config` crate from an optional
//! `contentsearch.toml` (or any file given to [`SearcherConfig::load_from`])
//! and then from `CONTENTSEARCH_*` environment variables, which win.

use serde::Deserialize;

use crate::error::Result;

pub const DEFAULT_CONFIG_FILE: &str = "contentsearch";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearcherConfig {
    /// Upper bound on the rows any single request may return.
    pub max_individual_result_set: i64,
    /// How long a cached permission snapshot may be trusted; 0 disables the cache.
    pub permission_cache_seconds: u64,
    pub database: String,
    pub pool_size: usize,
    pub log_filter: String,
}

impl Default for SearcherConfig {
    fn default() -> Self {
        Self {
            max_individual_result_set: 1000,
            permission_cache_seconds: 0,
            database: "contentsearch.db".into(),
            pool_size: 4,
            log_filter: "info".into(),
        }
    }
}

impl SearcherConfig {
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }
    pub fn load_from(file: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(file).required(false))
            .add_source(config::Environment::with_prefix("CONTENTSEARCH"))
            .build()?;
        let loaded: SearcherConfig = settings.try_deserialize()?;
        Ok(loaded.sanitized())
    }
    fn sanitized(mut self) -> Self {
        if self.max_individual_result_set <= 0 {
            self.max_individual_result_set = Self::default().max_individual_result_set;
        }
        self.pool_size = self.pool_size.max(1);
        self
    }
}
