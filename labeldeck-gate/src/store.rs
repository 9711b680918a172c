//! Baseline artist roster
//!
//! The orchestrator only needs [`ArtistStore`]; [`MemoryStore`] is the
//! in-process implementation, optionally seeded from a JSON roster file.

use crate::record::ArtistRecord;
use async_trait::async_trait;
use labeldeck_common::{Error, Result};
use std::path::Path;
use tokio::sync::RwLock;
use tracing::info;

/// Read access to baseline records
#[async_trait]
pub trait ArtistStore: Send + Sync {
    /// Baseline record for `id`, if the roster has one
    async fn get_by_id(&self, id: &str) -> Option<ArtistRecord>;

    /// Full roster, in roster order
    async fn list_all(&self) -> Vec<ArtistRecord>;
}

/// Roster held in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Vec<ArtistRecord>>,
}

impl MemoryStore {
    pub fn new(records: Vec<ArtistRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Load a roster from a JSON array of artist records
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let records: Vec<ArtistRecord> = serde_json::from_str(&content).map_err(|e| {
            Error::Config(format!("Invalid roster file {}: {}", path.display(), e))
        })?;

        info!(path = %path.display(), artists = records.len(), "Loaded artist roster");
        Ok(Self::new(records))
    }

    /// Insert or replace by id; returns true when a record was replaced
    pub async fn upsert(&self, record: ArtistRecord) -> bool {
        let mut records = self.records.write().await;
        match records.iter_mut().find(|existing| existing.id == record.id) {
            Some(existing) => {
                *existing = record;
                true
            }
            None => {
                records.push(record);
                false
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ArtistStore for MemoryStore {
    async fn get_by_id(&self, id: &str) -> Option<ArtistRecord> {
        self.records
            .read()
            .await
            .iter()
            .find(|record| record.id == id)
            .cloned()
    }

    async fn list_all(&self) -> Vec<ArtistRecord> {
        self.records.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let store = MemoryStore::new(vec![ArtistRecord::new("art_rezz", "REZZ")]);

        assert!(!store.upsert(ArtistRecord::new("art_attlas", "ATTLAS")).await);
        assert!(store.upsert(ArtistRecord::new("art_rezz", "Rezz")).await);

        let names: Vec<String> = store.list_all().await.into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["Rezz", "ATTLAS"]);
    }

    #[tokio::test]
    async fn test_get_by_id_missing() {
        let store = MemoryStore::default();
        assert!(store.get_by_id("art_rezz").await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_load_roster_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id": "art_rezz", "name": "REZZ", "monthlyListeners": 42}}]"#
        )
        .unwrap();

        let store = MemoryStore::from_json_file(file.path()).unwrap();
        let record = store.get_by_id("art_rezz").await.unwrap();
        assert_eq!(record.monthly_listeners, 42);
        assert_eq!(store.len().await, 1);
    }

    #[test]
    fn test_invalid_roster_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let result = MemoryStore::from_json_file(file.path());
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
