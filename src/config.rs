use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::cache::{default_tiers, TtlTier};
use crate::error::ConfigError;
use crate::search::SearchSettings;
use crate::store::{default_db_path, DEFAULT_POOL_SIZE};

const ENV_PREFIX: &str = "CIVIC_SEARCH";
/// Honoured when no database path is configured otherwise.
const LEGACY_DATABASE_ENV: &str = "DATABASE_URL";
const MAX_FRAGMENT_TOKENS: u32 = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub tiers: Vec<TtlTier>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            enabled: true,
            tiers: default_tiers(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub database_path: Option<PathBuf>,
    /// SQLite connections shared by concurrent requests.
    pub pool_size: u32,
    pub page_size: usize,
    pub min_content_len: usize,
    pub max_text_len: usize,
    pub preview_max_len: usize,
    pub fragment_tokens: u32,
    pub request_timeout_ms: u64,
    pub log_dir: Option<PathBuf>,
    pub cache: CacheConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let settings = SearchSettings::default();
        SearchConfig {
            database_path: None,
            pool_size: DEFAULT_POOL_SIZE,
            page_size: settings.page_size,
            min_content_len: settings.min_content_len,
            max_text_len: settings.max_text_len,
            preview_max_len: settings.preview_max_len,
            fragment_tokens: settings.fragment_tokens,
            request_timeout_ms: settings.timeout.as_millis() as u64,
            log_dir: None,
            cache: CacheConfig::default(),
        }
    }
}

impl SearchConfig {
    /// Optional TOML file, then `CIVIC_SEARCH__*` variables, then `DATABASE_URL`.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );
        let mut config: SearchConfig = builder.build()?.try_deserialize()?;

        if config.database_path.is_none() {
            config.database_path = std::env::var(LEGACY_DATABASE_ENV)
                .ok()
                .and_then(|url| database_path_from_url(&url));
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_size == 0 {
            return Err(ConfigError::Invalid("pool_size must be at least 1".into()));
        }
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be at least 1".into()));
        }
        if !(1..=MAX_FRAGMENT_TOKENS).contains(&self.fragment_tokens) {
            return Err(ConfigError::Invalid(format!(
                "fragment_tokens must be between 1 and {MAX_FRAGMENT_TOKENS}"
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_ms must be positive".into(),
            ));
        }
        for tier in &self.cache.tiers {
            if tier.min_popularity < 0 || tier.ttl_minutes < 0 {
                return Err(ConfigError::Invalid(format!(
                    "cache tier {tier:?} has a negative bound"
                )));
            }
        }
        for pair in self.cache.tiers.windows(2) {
            if pair[1].min_popularity <= pair[0].min_popularity {
                return Err(ConfigError::Invalid(
                    "cache tiers must be sorted by min_popularity".into(),
                ));
            }
            if pair[1].ttl_minutes < pair[0].ttl_minutes {
                return Err(ConfigError::Invalid(
                    "cache tier ttl must not decrease with popularity".into(),
                ));
            }
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path.clone().unwrap_or_else(default_db_path)
    }

    pub fn search_settings(&self) -> SearchSettings {
        SearchSettings {
            page_size: self.page_size,
            min_content_len: self.min_content_len,
            max_text_len: self.max_text_len,
            preview_max_len: self.preview_max_len,
            fragment_tokens: self.fragment_tokens,
            timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }
}

/// `sqlite:///abs/path.db`, `sqlite://rel.db`, `file:path.db` or a bare path.
/// Other schemes belong to other engines and are ignored.
fn database_path_from_url(url: &str) -> Option<PathBuf> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    let path = if let Some(rest) = url.strip_prefix("sqlite://") {
        rest
    } else if let Some(rest) = url.strip_prefix("file:") {
        rest
    } else if url.contains("://") {
        return None;
    } else {
        url
    };
    let path = path.split('?').next().unwrap_or(path);
    (!path.is_empty()).then(|| PathBuf::from(path))
}
