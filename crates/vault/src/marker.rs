//! Per-tenant migration completion markers.
//!
//! The orchestrator writes a marker once every pass for a tenant has
//! succeeded; the calling feature reads it to decide whether to run again.

use std::{
    collections::{BTreeMap, HashMap},
    path::PathBuf,
    sync::Mutex,
};

use {
    anyhow::{Context, Result},
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    tokio::fs,
};

/// Proof that a tenant's legacy plaintext was fully migrated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationMarker {
    pub tenant_id: String,
    pub completed_at: DateTime<Utc>,
    pub migrated_count: usize,
    pub skipped_count: usize,
}

/// Local persistence for [`MigrationMarker`]s, namespaced by tenant id.
#[async_trait]
pub trait MarkerStore: Send + Sync {
    async fn get(&self, tenant_id: &str) -> Result<Option<MigrationMarker>>;
    /// Insert or replace the marker for `marker.tenant_id`.
    async fn put(&self, marker: &MigrationMarker) -> Result<()>;
}

/// Marker store backed by `HashMap`. No persistence.
#[derive(Default)]
pub struct InMemoryMarkerStore {
    markers: Mutex<HashMap<String, MigrationMarker>>,
}

impl InMemoryMarkerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MarkerStore for InMemoryMarkerStore {
    async fn get(&self, tenant_id: &str) -> Result<Option<MigrationMarker>> {
        let markers = self.markers.lock().unwrap_or_else(|e| e.into_inner());
        Ok(markers.get(tenant_id).cloned())
    }

    async fn put(&self, marker: &MigrationMarker) -> Result<()> {
        let mut markers = self.markers.lock().unwrap_or_else(|e| e.into_inner());
        markers.insert(marker.tenant_id.clone(), marker.clone());
        Ok(())
    }
}

/// All markers in a single JSON object keyed by tenant id, written atomically.
pub struct FileMarkerStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileMarkerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<BTreeMap<String, MigrationMarker>> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(BTreeMap::new());
        }
        let data = fs::read_to_string(&self.path).await?;
        serde_json::from_str(&data)
            .with_context(|| format!("failed to parse {}", self.path.display()))
    }

    async fn write_all(&self, markers: &BTreeMap<String, MigrationMarker>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(markers)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json.as_bytes()).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl MarkerStore for FileMarkerStore {
    async fn get(&self, tenant_id: &str) -> Result<Option<MigrationMarker>> {
        Ok(self.read_all().await?.remove(tenant_id))
    }

    async fn put(&self, marker: &MigrationMarker) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut markers = self.read_all().await?;
        markers.insert(marker.tenant_id.clone(), marker.clone());
        self.write_all(&markers).await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn marker(tenant: &str, migrated: usize) -> MigrationMarker {
        MigrationMarker {
            tenant_id: tenant.into(),
            completed_at: Utc::now(),
            migrated_count: migrated,
            skipped_count: 0,
        }
    }

    #[tokio::test]
    async fn memory_store_put_get() {
        let store = InMemoryMarkerStore::new();
        assert!(store.get("t1").await.unwrap().is_none());
        store.put(&marker("t1", 3)).await.unwrap();
        assert_eq!(store.get("t1").await.unwrap().unwrap().migrated_count, 3);
        assert!(store.get("t2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_store_persists_per_tenant() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state").join("markers.json");

        let store = FileMarkerStore::new(&path);
        assert!(store.get("t1").await.unwrap().is_none());
        store.put(&marker("t1", 1)).await.unwrap();
        store.put(&marker("t2", 2)).await.unwrap();
        store.put(&marker("t1", 5)).await.unwrap();

        let reopened = FileMarkerStore::new(&path);
        assert_eq!(reopened.get("t1").await.unwrap().unwrap().migrated_count, 5);
        assert_eq!(reopened.get("t2").await.unwrap().unwrap().migrated_count, 2);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn file_store_rejects_corrupt_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("markers.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(FileMarkerStore::new(&path).get("t1").await.is_err());
    }
}
