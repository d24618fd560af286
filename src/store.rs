//! Durable storage for match aggregates.
//!
//! A store only has to offer atomic single-match writes. The state machine
//! saves the next version of a match before it replaces the in-memory copy,
//! so a failed save leaves both sides on the previous version.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::types::{Match, MatchId};

/// Schema version for stored match records
/// Version 1: initial layout
pub const RECORD_SCHEMA_VERSION: u32 = 1;

#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Atomically replace the stored record for this match
    async fn save(&self, record: &Match) -> StoreResult<()>;

    async fn load(&self, id: &MatchId) -> StoreResult<Option<Match>>;

    /// Every stored match, in no particular order
    async fn list(&self) -> StoreResult<Vec<Match>>;
}

/// Envelope written to disk around each match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub schema_version: u32,
    pub saved_at: DateTime<Utc>,
    #[serde(rename = "match")]
    pub record: Match,
}

impl MatchRecord {
    pub fn new(record: Match) -> Self {
        Self {
            schema_version: RECORD_SCHEMA_VERSION,
            saved_at: Utc::now(),
            record,
        }
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.schema_version > RECORD_SCHEMA_VERSION {
            return Err(StoreError::UnsupportedSchema {
                found: self.schema_version,
                supported: RECORD_SCHEMA_VERSION,
            });
        }
        Ok(())
    }
}

/// In-process store. Can be told to fail so callers can exercise retry paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<MatchId, Match>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent save fail until reset
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl MatchStore for MemoryStore {
    async fn save(&self, record: &Match) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store set to fail".to_string()));
        }
        self.records
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn load(&self, id: &MatchId) -> StoreResult<Option<Match>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<Match>> {
        Ok(self.records.read().await.values().cloned().collect())
    }
}

/// One JSON file per match in a directory.
///
/// Writes go to a temp file that is renamed over the record, so a reader
/// never sees a half-written match.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub async fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        tracing::info!("Using match store at {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    async fn read_record(path: &Path) -> StoreResult<Match> {
        let bytes = tokio::fs::read(path).await?;
        let record: MatchRecord = serde_json::from_slice(&bytes)?;
        record.validate()?;
        Ok(record.record)
    }
}

#[async_trait]
impl MatchStore for JsonFileStore {
    async fn save(&self, record: &Match) -> StoreResult<()> {
        let json = serde_json::to_vec_pretty(&MatchRecord::new(record.clone()))?;
        let target = self.path_for(&record.id);
        let tmp = self.dir.join(format!("{}.json.tmp", record.id));

        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &target).await?;
        tracing::debug!("Saved match {} v{}", record.id, record.version);
        Ok(())
    }

    async fn load(&self, id: &MatchId) -> StoreResult<Option<Match>> {
        let path = self.path_for(id);
        match tokio::fs::try_exists(&path).await? {
            true => Ok(Some(Self::read_record(&path).await?)),
            false => Ok(None),
        }
    }

    async fn list(&self) -> StoreResult<Vec<Match>> {
        let mut matches = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_record(&path).await {
                Ok(record) => matches.push(record),
                Err(e) => tracing::warn!("Skipping unreadable record {}: {}", path.display(), e),
            }
        }
        Ok(matches)
    }
}
