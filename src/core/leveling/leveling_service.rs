// Business logic for the leveling system. This module has NO Discord-specific
// code (no serenity, no poise imports) - it works with primitive types so the
// same core could sit behind any frontend.

use crate::core::leveling::progression::{self, LevelProgress};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

/// Progress bars default to ten cells unless an adapter asks otherwise.
pub const DEFAULT_BAR_LENGTH: usize = 10;

// ============================================================================
// DOMAIN MODELS
// ============================================================================

/// A user's persisted XP and level.
///
/// `level` is cached in storage but always derived: after every mutation it
/// equals `progression::level_for(xp)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserScore {
    pub user_id: u64,
    pub xp: u64,
    pub level: u32,
}

/// Where an XP award came from. Carried on level-up events so announcements
/// can say "from voice".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XpSource {
    Message,
    Voice,
}

/// Returned when an award pushed a user over a level threshold.
/// The Discord layer turns this into an announcement; delivery is best-effort
/// and the persisted state never depends on it.
#[derive(Debug, Clone, Copy)]
pub struct LevelUpEvent {
    pub user_id: u64,
    pub old_level: u32,
    pub new_level: u32,
    pub total_xp: u64,
    pub source: XpSource,
}

/// One connected voice participant as seen by the scanner.
#[derive(Debug, Clone, Copy)]
pub struct VoiceParticipant {
    pub user_id: u64,
    pub is_bot: bool,
    pub is_muted: bool,
    pub is_deafened: bool,
}

/// A user's score joined with render-ready progress data, for the level
/// commands.
#[derive(Debug, Clone, Copy)]
pub struct ProgressReport {
    pub xp: u64,
    pub level: u32,
    pub progress: LevelProgress,
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum LevelingError {
    #[error("User is on cooldown. Time remaining: {0:?}")]
    OnCooldown(Duration),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid user ID")]
    InvalidId,
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Storage port for score and cooldown state. The core defines WHAT it needs;
/// infra provides SQLite for production and an in-memory map for tests.
///
/// Every method is fully durable before it returns: a subsequent read in the
/// same process observes the write. Same-user linearizability is NOT this
/// trait's job - the service serializes those spans with a per-user lock.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Fetch a user's score, `None` if they have never earned XP.
    async fn get_score(&self, user_id: u64) -> Result<Option<UserScore>, LevelingError>;

    /// Create or overwrite a user's score row. The caller has already
    /// recomputed `level` from `xp` via the progression module.
    async fn upsert_score(&self, user_id: u64, xp: u64, level: u32) -> Result<(), LevelingError>;

    /// Last accepted message time (seconds since epoch), `None` if the user
    /// has never sent one.
    async fn get_cooldown(&self, user_id: u64) -> Result<Option<f64>, LevelingError>;

    /// Insert-or-update the cooldown timestamp. Idempotent for equal inputs.
    async fn touch_cooldown(&self, user_id: u64, last_message_at: f64)
        -> Result<(), LevelingError>;

    /// Top `n` users by XP descending. Ties break deterministically.
    async fn top_n(&self, n: usize) -> Result<Vec<UserScore>, LevelingError>;
}

// ============================================================================
// SERVICE
// ============================================================================

/// Tunables for the leveling service, sourced from configuration.
#[derive(Debug, Clone, Copy)]
pub struct LevelingSettings {
    pub xp_per_message: u64,
    pub xp_per_voice_interval: u64,
    pub message_cooldown: Duration,
    /// Whether self-muted / self-deafened voice participants still earn XP.
    /// Deployments disagree on this, so it's a flag rather than a constant.
    pub voice_xp_while_muted: bool,
}

impl Default for LevelingSettings {
    fn default() -> Self {
        Self {
            xp_per_message: 10,
            xp_per_voice_interval: 15,
            message_cooldown: Duration::from_secs(60),
            voice_xp_while_muted: true,
        }
    }
}

/// The activity event processor. Stateless between events apart from the
/// injected store; generic over the storage implementation.
pub struct LevelingService<S: ScoreStore> {
    store: S,
    settings: LevelingSettings,

    /// Per-user async locks held across each read-modify-write span.
    /// The message handler and the voice scanner can both award the same user
    /// at the same suspension point; without this, both would read the same
    /// stale score and one award would be lost.
    user_locks: DashMap<u64, Arc<Mutex<()>>>,
}

impl<S: ScoreStore> LevelingService<S> {
    pub fn new(store: S, settings: LevelingSettings) -> Self {
        Self {
            store,
            settings,
            user_locks: DashMap::new(),
        }
    }

    fn validate_id(user_id: u64) -> Result<(), LevelingError> {
        if user_id == 0 {
            Err(LevelingError::InvalidId)
        } else {
            Ok(())
        }
    }

    fn user_lock(&self, user_id: u64) -> Arc<Mutex<()>> {
        Arc::clone(
            self.user_locks
                .entry(user_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    /// Process one message event.
    ///
    /// `now_secs` is wall-clock seconds since the epoch, passed in rather
    /// than read here so tests control time.
    ///
    /// **Returns:**
    /// - `Ok(Some(event))` - XP awarded and the user leveled up
    /// - `Ok(None)` - XP awarded, no level change
    /// - `Err(LevelingError::OnCooldown)` - inside the cooldown window; the
    ///   event is fully absorbed, nothing was written
    /// - `Err(...)` - storage errors
    pub async fn process_message(
        &self,
        user_id: u64,
        now_secs: f64,
    ) -> Result<Option<LevelUpEvent>, LevelingError> {
        Self::validate_id(user_id)?;

        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        if let Some(last) = self.store.get_cooldown(user_id).await? {
            let elapsed = now_secs - last;
            if elapsed < self.settings.message_cooldown.as_secs_f64() {
                let remaining = self.settings.message_cooldown.as_secs_f64() - elapsed;
                return Err(LevelingError::OnCooldown(Duration::from_secs_f64(
                    remaining.max(0.0),
                )));
            }
        }

        // Touched on every accepted message, including the very first one.
        self.store.touch_cooldown(user_id, now_secs).await?;

        self.award_locked(user_id, self.settings.xp_per_message, XpSource::Message)
            .await
    }

    /// Award XP for one voice tick. No cooldown gating - every qualifying
    /// participant earns once per tick.
    pub async fn process_voice_tick(
        &self,
        user_id: u64,
    ) -> Result<Option<LevelUpEvent>, LevelingError> {
        Self::validate_id(user_id)?;

        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        self.award_locked(
            user_id,
            self.settings.xp_per_voice_interval,
            XpSource::Voice,
        )
        .await
    }

    /// Policy gate for the voice scanner. Bots never qualify; muted or
    /// deafened participants qualify only when the deployment says so.
    pub fn voice_participant_qualifies(&self, participant: &VoiceParticipant) -> bool {
        if participant.is_bot {
            return false;
        }
        if !self.settings.voice_xp_while_muted
            && (participant.is_muted || participant.is_deafened)
        {
            return false;
        }
        true
    }

    /// Shared award-and-check. Caller holds the per-user lock.
    ///
    /// The level is recomputed from the new XP on every write - the cached
    /// column is never trusted, so a stale level can never survive a write.
    /// Persisting happens before the level-up event is returned; delivery
    /// failures upstream can't roll the award back.
    async fn award_locked(
        &self,
        user_id: u64,
        award: u64,
        source: XpSource,
    ) -> Result<Option<LevelUpEvent>, LevelingError> {
        let (xp, level) = match self.store.get_score(user_id).await? {
            Some(score) => (score.xp, score.level),
            None => (0, 0),
        };

        let new_xp = xp.saturating_add(award);
        let computed_level = progression::level_for(new_xp);

        self.store
            .upsert_score(user_id, new_xp, computed_level)
            .await?;

        if computed_level > level {
            Ok(Some(LevelUpEvent {
                user_id,
                old_level: level,
                new_level: computed_level,
                total_xp: new_xp,
                source,
            }))
        } else {
            Ok(None)
        }
    }

    /// Level/progress query shared by the prefix and slash command adapters.
    /// `Ok(None)` means the user has no record yet - not an error.
    pub async fn get_progress(
        &self,
        user_id: u64,
    ) -> Result<Option<ProgressReport>, LevelingError> {
        Self::validate_id(user_id)?;

        let Some(score) = self.store.get_score(user_id).await? else {
            return Ok(None);
        };

        Ok(Some(ProgressReport {
            xp: score.xp,
            level: score.level,
            progress: progression::progress(score.xp, score.level, DEFAULT_BAR_LENGTH),
        }))
    }

    /// Top `n` users by XP for the leaderboard commands.
    pub async fn leaderboard(&self, n: usize) -> Result<Vec<UserScore>, LevelingError> {
        self.store.top_n(n).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::leveling::InMemoryScoreStore;

    fn make_service() -> LevelingService<InMemoryScoreStore> {
        LevelingService::new(InMemoryScoreStore::new(), LevelingSettings::default())
    }

    #[tokio::test]
    async fn message_cooldown_window() {
        let service = make_service();

        // t=0: accepted
        let first = service.process_message(1, 0.0).await.unwrap();
        assert!(first.is_none());
        assert_eq!(service.get_progress(1).await.unwrap().unwrap().xp, 10);

        // t=30: inside the window, absorbed
        let err = service.process_message(1, 30.0).await.unwrap_err();
        assert!(matches!(err, LevelingError::OnCooldown(_)));
        assert_eq!(service.get_progress(1).await.unwrap().unwrap().xp, 10);

        // t=61: window expired, accepted again
        service.process_message(1, 61.0).await.unwrap();
        assert_eq!(service.get_progress(1).await.unwrap().unwrap().xp, 20);
    }

    #[tokio::test]
    async fn level_up_emits_event_exactly_at_threshold() {
        let service = make_service();
        service.store.upsert_score(1, 90, 0).await.unwrap();

        let event = service
            .process_message(1, 0.0)
            .await
            .unwrap()
            .expect("crossing 100 XP should level up");

        assert_eq!(event.old_level, 0);
        assert_eq!(event.new_level, 1);
        assert_eq!(event.total_xp, 100);
        assert!(matches!(event.source, XpSource::Message));
    }

    #[tokio::test]
    async fn first_award_does_not_level_up() {
        let service = make_service();

        let event = service.process_message(1, 0.0).await.unwrap();
        assert!(event.is_none());

        let report = service.get_progress(1).await.unwrap().unwrap();
        assert_eq!(report.xp, 10);
        assert_eq!(report.level, 0);
    }

    #[tokio::test]
    async fn stored_level_always_matches_stored_xp() {
        let service = make_service();

        for _ in 0..40 {
            service.process_voice_tick(7).await.unwrap();
            let report = service.get_progress(7).await.unwrap().unwrap();
            assert_eq!(
                report.level,
                progression::level_for(report.xp),
                "invariant broken at xp={}",
                report.xp
            );
        }
        // 40 ticks * 15 XP, nothing lost along the way
        assert_eq!(service.get_progress(7).await.unwrap().unwrap().xp, 600);
    }

    #[tokio::test]
    async fn concurrent_awards_for_same_user_are_not_lost() {
        let service = Arc::new(make_service());

        let a = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.process_voice_tick(1).await })
        };
        let b = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.process_voice_tick(1).await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        // Both awards must land: 2 * 15, never 15.
        assert_eq!(service.get_progress(1).await.unwrap().unwrap().xp, 30);
    }

    #[tokio::test]
    async fn voice_tick_has_no_cooldown() {
        let service = make_service();

        service.process_message(1, 0.0).await.unwrap();
        // Message cooldown is active, but voice ticks don't care.
        service.process_voice_tick(1).await.unwrap();
        assert_eq!(service.get_progress(1).await.unwrap().unwrap().xp, 25);
    }

    #[tokio::test]
    async fn unknown_user_has_no_progress() {
        let service = make_service();
        assert!(service.get_progress(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn zero_user_id_is_rejected() {
        let service = make_service();
        assert!(matches!(
            service.process_message(0, 0.0).await,
            Err(LevelingError::InvalidId)
        ));
    }

    #[test]
    fn voice_qualification_policy() {
        let unconditional = make_service();
        let strict = LevelingService::new(
            InMemoryScoreStore::new(),
            LevelingSettings {
                voice_xp_while_muted: false,
                ..Default::default()
            },
        );

        let human = VoiceParticipant {
            user_id: 1,
            is_bot: false,
            is_muted: false,
            is_deafened: false,
        };
        let muted = VoiceParticipant {
            is_muted: true,
            ..human
        };
        let deafened = VoiceParticipant {
            is_deafened: true,
            ..human
        };
        let bot = VoiceParticipant {
            is_bot: true,
            ..human
        };

        assert!(unconditional.voice_participant_qualifies(&human));
        assert!(unconditional.voice_participant_qualifies(&muted));
        assert!(unconditional.voice_participant_qualifies(&deafened));
        assert!(!unconditional.voice_participant_qualifies(&bot));

        assert!(strict.voice_participant_qualifies(&human));
        assert!(!strict.voice_participant_qualifies(&muted));
        assert!(!strict.voice_participant_qualifies(&deafened));
        assert!(!strict.voice_participant_qualifies(&bot));
    }
}
