// Leveling domain: pure progression math plus the event-processing service.

pub mod leveling_service;
pub mod progression;

// Re-export for convenience
pub use leveling_service::{
    LevelUpEvent, LevelingError, LevelingService, LevelingSettings, ProgressReport, ScoreStore,
    UserScore, VoiceParticipant, XpSource, DEFAULT_BAR_LENGTH,
};
