// In-memory implementation of ScoreStore, used by the core's tests.
// Follows the same contract as the SQLite store, just without the disk.

use crate::core::leveling::{LevelingError, ScoreStore, UserScore};
use async_trait::async_trait;
use dashmap::DashMap;

/// DashMap-backed store. Safe to share across tasks without an outer Mutex;
/// same-user read-modify-write serialization still happens in the service.
pub struct InMemoryScoreStore {
    scores: DashMap<u64, UserScore>,
    cooldowns: DashMap<u64, f64>,
}

impl InMemoryScoreStore {
    pub fn new() -> Self {
        Self {
            scores: DashMap::new(),
            cooldowns: DashMap::new(),
        }
    }
}

impl Default for InMemoryScoreStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScoreStore for InMemoryScoreStore {
    async fn get_score(&self, user_id: u64) -> Result<Option<UserScore>, LevelingError> {
        Ok(self.scores.get(&user_id).map(|entry| *entry.value()))
    }

    async fn upsert_score(&self, user_id: u64, xp: u64, level: u32) -> Result<(), LevelingError> {
        self.scores.insert(user_id, UserScore { user_id, xp, level });
        Ok(())
    }

    async fn get_cooldown(&self, user_id: u64) -> Result<Option<f64>, LevelingError> {
        Ok(self.cooldowns.get(&user_id).map(|entry| *entry.value()))
    }

    async fn touch_cooldown(
        &self,
        user_id: u64,
        last_message_at: f64,
    ) -> Result<(), LevelingError> {
        self.cooldowns.insert(user_id, last_message_at);
        Ok(())
    }

    async fn top_n(&self, n: usize) -> Result<Vec<UserScore>, LevelingError> {
        let mut scores: Vec<UserScore> = self.scores.iter().map(|entry| *entry.value()).collect();

        // XP descending; user_id breaks ties so ordering is deterministic.
        scores.sort_by(|a, b| b.xp.cmp(&a.xp).then(a.user_id.cmp(&b.user_id)));
        scores.truncate(n);

        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_creates_then_overwrites() {
        let store = InMemoryScoreStore::new();

        assert!(store.get_score(1).await.unwrap().is_none());

        store.upsert_score(1, 10, 0).await.unwrap();
        let score = store.get_score(1).await.unwrap().unwrap();
        assert_eq!(score.xp, 10);
        assert_eq!(score.level, 0);

        store.upsert_score(1, 120, 1).await.unwrap();
        let score = store.get_score(1).await.unwrap().unwrap();
        assert_eq!(score.xp, 120);
        assert_eq!(score.level, 1);
    }

    #[tokio::test]
    async fn cooldown_touch_is_idempotent() {
        let store = InMemoryScoreStore::new();

        store.touch_cooldown(1, 123.5).await.unwrap();
        store.touch_cooldown(1, 123.5).await.unwrap();
        assert_eq!(store.get_cooldown(1).await.unwrap(), Some(123.5));

        store.touch_cooldown(1, 200.0).await.unwrap();
        assert_eq!(store.get_cooldown(1).await.unwrap(), Some(200.0));
    }

    #[tokio::test]
    async fn top_n_orders_by_xp_descending() {
        let store = InMemoryScoreStore::new();

        store.upsert_score(1, 500, 2).await.unwrap(); // A
        store.upsert_score(2, 1500, 3).await.unwrap(); // B
        store.upsert_score(3, 10, 0).await.unwrap(); // C

        let top = store.top_n(2).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].user_id, 2);
        assert_eq!(top[1].user_id, 1);
    }
}
