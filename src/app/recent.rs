//! Most-recently-visited tables, persisted to a small JSON file between runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use utoipa::ToSchema;

pub const MAX_RECENT_TABLES: usize = 5;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct RecentTable {
    pub id: i64,
    pub name: String,
    pub schema: String,
    /// Epoch milliseconds on the wire.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[schema(value_type = i64)]
    pub last_visited: DateTime<Utc>,
}

/// Newest first, at most [`MAX_RECENT_TABLES`] entries, one per table id.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct RecentTables {
    entries: Vec<RecentTable>,
}

impl RecentTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the table to the front, replacing any earlier visit.
    pub fn visit(&mut self, id: i64, schema: &str, name: &str, at: DateTime<Utc>) {
        self.entries.retain(|e| e.id != id);
        self.entries.insert(
            0,
            RecentTable {
                id,
                name: name.to_string(),
                schema: schema.to_string(),
                last_visited: at,
            },
        );
        self.entries.truncate(MAX_RECENT_TABLES);
    }

    pub fn entries(&self) -> &[RecentTable] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// A missing or unreadable file starts an empty list.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::new();
        }
        match Self::read_file(path) {
            Ok(mut recent) => {
                recent.entries.truncate(MAX_RECENT_TABLES);
                tracing::debug!(path = %path.display(), count = recent.entries.len(), "loaded recent tables");
                recent
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable recent tables file");
                Self::new()
            }
        }
    }

    fn read_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
