//! Persistence contract for canonical grants. The pipeline depends only
//! on this trait: upsert-by-identity-key, a connectivity probe, and a
//! predicate-based purge for previously stored low-quality records.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use grantwatch_core::CanonicalGrant;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("malformed store file: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertStats {
    pub inserted: usize,
    pub updated: usize,
}

#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Upsert a batch by identity key: full replace for existing keys,
    /// insert for new ones. Within one batch, later records overwrite
    /// earlier ones sharing a key.
    async fn upsert_batch(&self, grants: &[CanonicalGrant]) -> Result<UpsertStats, StoreError>;

    async fn load_all(&self) -> Result<Vec<CanonicalGrant>, StoreError>;

    /// Connectivity probe. `false` tells the caller to carry on with
    /// in-memory data only.
    async fn ping(&self) -> bool;

    /// Maintenance operation: drop stored records failing `keep`.
    /// Returns how many were removed.
    async fn purge(
        &self,
        keep: &(dyn for<'a> Fn(&'a CanonicalGrant) -> bool + Sync),
    ) -> Result<usize, StoreError>;
}

/// In-memory store, used by tests and as the fallback when persistence
/// is unreachable. A single mutex serializes writers.
#[derive(Debug, Default)]
pub struct MemoryStore {
    grants: Mutex<BTreeMap<String, CanonicalGrant>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GrantStore for MemoryStore {
    async fn upsert_batch(&self, grants: &[CanonicalGrant]) -> Result<UpsertStats, StoreError> {
        let mut map = self.grants.lock().await;
        Ok(apply_upserts(&mut map, grants))
    }

    async fn load_all(&self) -> Result<Vec<CanonicalGrant>, StoreError> {
        let map = self.grants.lock().await;
        Ok(map.values().cloned().collect())
    }

    async fn ping(&self) -> bool {
        true
    }

    async fn purge(
        &self,
        keep: &(dyn for<'a> Fn(&'a CanonicalGrant) -> bool + Sync),
    ) -> Result<usize, StoreError> {
        let mut map = self.grants.lock().await;
        let before = map.len();
        map.retain(|_, grant| keep(grant));
        Ok(before - map.len())
    }
}

/// JSON-file-backed store: the whole canonical set lives in one file,
/// rewritten atomically on every mutation. The mutex keeps one writer
/// at a time so overlapping refreshes cannot lose updates.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    async fn load_map(&self) -> Result<BTreeMap<String, CanonicalGrant>, StoreError> {
        match fs::read_to_string(&self.path).await {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn write_map(&self, map: &BTreeMap<String, CanonicalGrant>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let temp_path = self
            .path
            .with_file_name(format!(".{}.tmp", Uuid::new_v4()));
        let bytes = serde_json::to_vec_pretty(map)?;
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        drop(file);
        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl GrantStore for JsonFileStore {
    async fn upsert_batch(&self, grants: &[CanonicalGrant]) -> Result<UpsertStats, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.load_map().await?;
        let stats = apply_upserts(&mut map, grants);
        self.write_map(&map).await?;
        Ok(stats)
    }

    async fn load_all(&self) -> Result<Vec<CanonicalGrant>, StoreError> {
        let map = self.load_map().await?;
        Ok(map.into_values().collect())
    }

    async fn ping(&self) -> bool {
        let Some(parent) = self.path.parent() else {
            return true;
        };
        if let Err(err) = fs::create_dir_all(parent).await {
            warn!(path = %self.path.display(), %err, "grant store is unreachable");
            return false;
        }
        true
    }

    async fn purge(
        &self,
        keep: &(dyn for<'a> Fn(&'a CanonicalGrant) -> bool + Sync),
    ) -> Result<usize, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.load_map().await?;
        let before = map.len();
        map.retain(|_, grant| keep(grant));
        let removed = before - map.len();
        if removed > 0 {
            self.write_map(&map).await?;
        }
        Ok(removed)
    }
}

fn apply_upserts(
    map: &mut BTreeMap<String, CanonicalGrant>,
    grants: &[CanonicalGrant],
) -> UpsertStats {
    let mut stats = UpsertStats::default();
    for grant in grants {
        match map.insert(grant.id.clone(), grant.clone()) {
            Some(_) => stats.updated += 1,
            None => stats.inserted += 1,
        }
    }
    stats
}
