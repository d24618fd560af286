mod game;
mod restore;
mod round;
mod vote;

pub use game::new_match;

use crate::clock::{Clock, SystemClock};
use crate::config::MatchConfig;
use crate::error::{MatchError, MatchResult};
use crate::game::CategoryPool;
use crate::profiles::ProfileRegistry;
use crate::protocol::{MatchEvent, ServerMessage};
use crate::store::{MatchStore, MemoryStore};
use crate::types::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};

/// Shared application state.
///
/// Each live match sits behind its own mutex: every mutation of a match
/// (ready signals, ballots, deadline expiry, cancel) holds that lock, so
/// matches never observe concurrent writers while different matches run in
/// parallel.
pub struct AppState {
    pub config: MatchConfig,
    pub pool: CategoryPool,
    pub profiles: Arc<ProfileRegistry>,
    matches: RwLock<HashMap<MatchId, Arc<Mutex<Match>>>>,
    /// Finished and cancelled matches, read-only
    archive: RwLock<HashMap<MatchId, Match>>,
    store: Arc<dyn MatchStore>,
    clock: Arc<dyn Clock>,
    rng: std::sync::Mutex<StdRng>,
    /// State machine events (phase changes, round results, match results)
    pub events: broadcast::Sender<MatchEvent>,
    /// Live updates that are not state transitions (vote progress)
    pub live: broadcast::Sender<ServerMessage>,
}

impl AppState {
    /// In-memory state with the wall clock and an OS-seeded rng
    pub fn new(config: MatchConfig) -> Self {
        Self::with_parts(
            config,
            CategoryPool::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
            StdRng::from_os_rng(),
        )
    }

    pub fn with_parts(
        config: MatchConfig,
        pool: CategoryPool,
        store: Arc<dyn MatchStore>,
        clock: Arc<dyn Clock>,
        rng: StdRng,
    ) -> Self {
        let (events, _rx) = broadcast::channel(256);
        let (live, _rx) = broadcast::channel(100);
        Self {
            config,
            pool,
            profiles: Arc::new(ProfileRegistry::new()),
            matches: RwLock::new(HashMap::new()),
            archive: RwLock::new(HashMap::new()),
            store,
            clock,
            rng: std::sync::Mutex::new(rng),
            events,
            live,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MatchEvent> {
        self.events.subscribe()
    }

    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    /// Snapshot of a live or archived match
    pub async fn get_match(&self, match_id: &str) -> MatchResult<Match> {
        let slot = self.matches.read().await.get(match_id).cloned();
        if let Some(slot) = slot {
            return Ok(slot.lock().await.clone());
        }
        self.archive
            .read()
            .await
            .get(match_id)
            .cloned()
            .ok_or_else(|| MatchError::NotFound(match_id.to_string()))
    }

    /// Snapshots of all live matches, oldest first
    pub async fn list_matches(&self) -> Vec<Match> {
        let slots: Vec<_> = self.matches.read().await.values().cloned().collect();
        let mut out = Vec::with_capacity(slots.len());
        for slot in slots {
            out.push(slot.lock().await.clone());
        }
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        out
    }

    /// Lobby view of the live matches
    pub async fn match_summaries(&self) -> Vec<MatchSummary> {
        self.list_matches()
            .await
            .iter()
            .map(MatchSummary::from)
            .collect()
    }

    /// Snapshots of finished and cancelled matches
    pub async fn archived_matches(&self) -> Vec<Match> {
        let mut out: Vec<Match> = self.archive.read().await.values().cloned().collect();
        out.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then_with(|| a.id.cmp(&b.id)));
        out
    }

    pub async fn live_match_ids(&self) -> Vec<MatchId> {
        self.matches.read().await.keys().cloned().collect()
    }

    /// The lock for a live match. Archived matches reject mutation with
    /// `InvalidPhase` so late requests see why they failed.
    async fn slot(&self, match_id: &str) -> MatchResult<Arc<Mutex<Match>>> {
        if let Some(slot) = self.matches.read().await.get(match_id) {
            return Ok(slot.clone());
        }
        match self.archive.read().await.get(match_id) {
            Some(archived) => Err(MatchError::InvalidPhase {
                phase: archived.phase,
            }),
            None => Err(MatchError::NotFound(match_id.to_string())),
        }
    }

    /// Persist `next` and make it the current version of the match.
    ///
    /// Nothing changes in memory and no event is emitted unless the store
    /// accepted the write.
    async fn commit(
        &self,
        current: &mut Match,
        mut next: Match,
        events: Vec<MatchEvent>,
    ) -> MatchResult<()> {
        next.version = current.version + 1;
        next.updated_at = self.clock.now();

        if let Err(e) = self.store.save(&next).await {
            tracing::error!(
                "Failed to persist match {} v{}: {}",
                next.id,
                next.version,
                e
            );
            return Err(e.into());
        }

        *current = next;

        if current.phase.is_terminal() {
            let mut matches = self.matches.write().await;
            matches.remove(&current.id);
            self.archive
                .write()
                .await
                .insert(current.id.clone(), current.clone());
            tracing::info!("Archived match {} ({:?})", current.id, current.phase);
        }

        for event in events {
            // No subscribers is fine
            let _ = self.events.send(event);
        }
        Ok(())
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut rng)
    }
}
