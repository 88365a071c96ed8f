//! Centralized configuration (environment variables + defaults).

use crate::domain::query::DEFAULT_PAGE_SIZE;
use anyhow::Context;
use std::path::PathBuf;
use std::time::Duration;

/// Base URL of the pg-meta service (`/query`, `/schemas`, `/tables`).
pub fn pg_meta_url() -> String {
    std::env::var("PG_META_URL")
        .map(|v| v.trim_end_matches('/').to_string())
        .unwrap_or_else(|_| "http://localhost:8000".to_string())
}

/// Optional direct Postgres connection. When set, statements run over sqlx instead of pg-meta.
pub fn database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty())
}

pub fn bind_addr() -> String {
    std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string())
}

pub fn recent_tables_path() -> PathBuf {
    std::env::var("RECENT_TABLES_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".table-editor/recent-tables.json"))
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} must be a valid number (got '{}')", key, v)),
        Err(_) => Ok(default),
    }
}

/// Runtime knobs handed to the table service. Built once at startup and passed down explicitly.
#[derive(Debug, Clone)]
pub struct EditorConfig {
    pub query_timeout: Duration,
    /// Extra attempts for SELECT/COUNT after a transport failure. Mutations never retry.
    pub read_retries: u32,
    pub default_page_size: u32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_millis(30_000),
            read_retries: 2,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl EditorConfig {
    /// Reads `QUERY_TIMEOUT_MS`, `READ_RETRIES`, `DEFAULT_PAGE_SIZE`.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        let timeout_ms = parse_env("QUERY_TIMEOUT_MS", defaults.query_timeout.as_millis() as u64)?;
        Ok(Self {
            query_timeout: Duration::from_millis(timeout_ms.max(1)),
            read_retries: parse_env("READ_RETRIES", defaults.read_retries)?,
            default_page_size: parse_env("DEFAULT_PAGE_SIZE", defaults.default_page_size)?.max(1),
        })
    }
}
