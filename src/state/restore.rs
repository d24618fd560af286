use super::AppState;
use crate::error::MatchResult;
use crate::types::Phase;
use std::sync::Arc;
use tokio::sync::Mutex;

impl AppState {
    /// Load every stored match. Ongoing matches become live again with their
    /// deadlines intact; ended ones go to the archive. Returns the number of
    /// live matches.
    pub async fn restore(&self) -> MatchResult<usize> {
        let stored = self.store.list().await?;

        let mut matches = self.matches.write().await;
        let mut archive = self.archive.write().await;
        for m in stored {
            if m.phase.is_terminal() {
                archive.insert(m.id.clone(), m);
            } else if m.phase == Phase::Resolving {
                tracing::warn!("Skipping match {} stored mid-resolution", m.id);
            } else {
                matches.insert(m.id.clone(), Arc::new(Mutex::new(m)));
            }
        }

        tracing::info!(
            "Restored {} live and {} archived matches",
            matches.len(),
            archive.len()
        );
        Ok(matches.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::MatchConfig;
    use crate::game::CategoryPool;
    use crate::store::JsonFileStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    async fn file_state(dir: &std::path::Path, clock: Arc<ManualClock>) -> AppState {
        let store = JsonFileStore::open(dir).await.unwrap();
        AppState::with_parts(
            MatchConfig::default(),
            CategoryPool::beat_genres(),
            Arc::new(store),
            clock,
            StdRng::seed_from_u64(11),
        )
    }

    #[tokio::test]
    async fn test_restore_resumes_live_and_archives_ended() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::default());

        let (live_id, ended_id, category) = {
            let state = file_state(dir.path(), clock.clone()).await;
            let live = state
                .create_match("alice".to_string(), "bob".to_string())
                .await
                .unwrap();
            state.signal_ready(&live.id, "alice").await.unwrap();
            let live = state.signal_ready(&live.id, "bob").await.unwrap();

            let ended = state
                .create_match("carol".to_string(), "dave".to_string())
                .await
                .unwrap();
            state.cancel(&ended.id, "carol", "no show").await.unwrap();
            (live.id, ended.id, live.current_category)
        };

        let state = file_state(dir.path(), clock.clone()).await;
        assert_eq!(state.restore().await.unwrap(), 1);

        let live = state.get_match(&live_id).await.unwrap();
        assert_eq!(live.phase, Phase::Production);
        assert_eq!(live.current_category, category);

        let ended = state.get_match(&ended_id).await.unwrap();
        assert_eq!(ended.phase, Phase::Cancelled);
        assert!(state.cancel(&ended_id, "carol", "again").await.is_err());

        // The restored deadline still fires
        clock.advance(state.config.production_duration());
        assert_eq!(state.expire_deadlines().await, vec![live_id.clone()]);
        assert_eq!(
            state.get_match(&live_id).await.unwrap().phase,
            Phase::Voting
        );
    }
}
