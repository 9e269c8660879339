//! Configuration for the access core

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,
    /// Redis configuration
    pub redis: RedisConfig,
    /// Cache tuning
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

/// Cache tuning knobs
///
/// Catalog entries (role lists, per-role permission sets) change rarely and
/// carry a long TTL. Derived hierarchy entries (inherited and effective
/// sets, the tree view) recompose whenever any role changes, so they carry
/// a deliberately shorter TTL.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// TTL for catalog and per-user lookup entries, in seconds
    pub catalog_ttl_secs: u64,
    /// TTL for derived hierarchy entries, in seconds
    pub hierarchy_ttl_secs: u64,
    /// Upper bound on users primed by warm-up and rebuild
    pub warmup_user_limit: i64,
    /// Recency window for rebuild priming, in days
    pub rebuild_active_days: i64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            catalog_ttl_secs: 86_400,
            hierarchy_ttl_secs: 3_600,
            warmup_user_limit: 100,
            rebuild_active_days: 7,
        }
    }
}

impl CacheSettings {
    pub fn catalog_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog_ttl_secs)
    }

    pub fn hierarchy_ttl(&self) -> Duration {
        Duration::from_secs(self.hierarchy_ttl_secs)
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").context("DATABASE_URL is required")?,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
                min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()
                    .unwrap_or(2),
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            },
            cache: CacheSettings {
                catalog_ttl_secs: env::var("CACHE_CATALOG_TTL_SECS")
                    .unwrap_or_else(|_| "86400".to_string())
                    .parse()
                    .unwrap_or(86_400),
                hierarchy_ttl_secs: env::var("CACHE_HIERARCHY_TTL_SECS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()
                    .unwrap_or(3_600),
                warmup_user_limit: env::var("CACHE_WARMUP_USER_LIMIT")
                    .unwrap_or_else(|_| "100".to_string())
                    .parse()
                    .unwrap_or(100),
                rebuild_active_days: env::var("CACHE_REBUILD_ACTIVE_DAYS")
                    .unwrap_or_else(|_| "7".to_string())
                    .parse()
                    .unwrap_or(7),
            },
        })
    }
}
