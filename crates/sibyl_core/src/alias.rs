//! Persistent alias store: human-friendly names for opaque resource IDs
//! (typically spreadsheet IDs).
//!
//! The map is loaded once at construction and the whole file is rewritten
//! on every mutation. Mutation is a read-modify-write critical section, so
//! all access goes through one async mutex; concurrent writers cannot
//! clobber each other's entries.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

pub struct AliasStore {
    path: PathBuf,
    resources: Mutex<HashMap<String, String>>,
}

impl AliasStore {
    /// Load the alias store from disk. A missing or unreadable file is an
    /// empty store, not an error.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let resources = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!("Could not parse alias store {}: {}", path.display(), e);
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self {
            path,
            resources: Mutex::new(resources),
        }
    }

    /// Persist a new alias → resource_id mapping. Last write wins.
    pub async fn save_alias(&self, alias: &str, resource_id: &str) -> Result<()> {
        let mut resources = self.resources.lock().await;
        resources.insert(alias.to_string(), resource_id.to_string());
        let json = serde_json::to_string_pretty(&*resources)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write alias store {}", self.path.display()))?;
        tracing::debug!("Saved alias '{}' -> '{}'", alias, resource_id);
        Ok(())
    }

    /// Resolve an alias to its resource ID, or return the input unchanged.
    /// Callers never need to know whether they hold an alias or a raw ID.
    pub async fn get_id(&self, alias_or_id: &str) -> String {
        let resources = self.resources.lock().await;
        resources
            .get(alias_or_id)
            .cloned()
            .unwrap_or_else(|| alias_or_id.to_string())
    }

    /// All saved aliases.
    pub async fn list_aliases(&self) -> HashMap<String, String> {
        self.resources.lock().await.clone()
    }
}
