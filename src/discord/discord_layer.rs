// Discord layer - commands, announcements, and the voice scan task.

#[path = "commands/command_catalog.rs"]
pub mod commands;

#[path = "leveling/leveling_announcements.rs"]
pub mod leveling_announcements;

#[path = "leveling/voice_scanner.rs"]
pub mod voice_scanner;

// Re-export command types for convenience
pub use commands::leveling::{Data, Error};
