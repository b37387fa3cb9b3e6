// Environment-sourced configuration, resolved once at startup and passed
// down explicitly. A missing token or channel ID is fatal before we ever
// touch Discord or the database.

use crate::core::leveling::LevelingSettings;
use anyhow::{anyhow, Context};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub discord_token: String,
    /// Path of the SQLite database file, created on first run.
    pub database_path: String,
    /// Channel that receives level-up announcements.
    pub level_up_channel_id: u64,
    /// How often the voice scanner runs.
    pub voice_tick: Duration,
    pub leveling: LevelingSettings,
}

impl BotConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let discord_token = std::env::var("DISCORD_TOKEN")
            .map_err(|_| anyhow!("DISCORD_TOKEN is not set"))?
            .trim()
            .to_string();
        if discord_token.is_empty() {
            return Err(anyhow!("DISCORD_TOKEN is empty"));
        }

        let database_path = std::env::var("DATABASE_PATH")
            .unwrap_or_else(|_| "data/leveling.db".to_string());

        let level_up_channel_id = std::env::var("LEVEL_UP_CHANNEL_ID")
            .map_err(|_| anyhow!("LEVEL_UP_CHANNEL_ID is not set"))?
            .trim()
            .parse::<u64>()
            .context("LEVEL_UP_CHANNEL_ID must be a channel ID")?;

        let leveling = LevelingSettings {
            xp_per_message: env_u64("XP_PER_MESSAGE", 10)?,
            xp_per_voice_interval: env_u64("XP_PER_VOICE_INTERVAL", 15)?,
            message_cooldown: Duration::from_secs(env_u64("MESSAGE_COOLDOWN_SECONDS", 60)?),
            voice_xp_while_muted: env_bool("VOICE_XP_WHILE_MUTED", true)?,
        };

        Ok(Self {
            discord_token,
            database_path,
            level_up_channel_id,
            voice_tick: Duration::from_secs(env_u64("VOICE_TICK_SECONDS", 60)?),
            leveling,
        })
    }
}

fn env_u64(name: &str, default: u64) -> anyhow::Result<u64> {
    parse_u64(name, std::env::var(name).ok(), default)
}

fn env_bool(name: &str, default: bool) -> anyhow::Result<bool> {
    parse_bool(name, std::env::var(name).ok(), default)
}

fn parse_u64(name: &str, value: Option<String>, default: u64) -> anyhow::Result<u64> {
    match value {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("{} must be a non-negative integer, got {:?}", name, raw)),
        None => Ok(default),
    }
}

fn parse_bool(name: &str, value: Option<String>, default: bool) -> anyhow::Result<bool> {
    match value {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(anyhow!("{} must be true or false, got {:?}", name, raw)),
        },
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u64_parsing_defaults_and_errors() {
        assert_eq!(parse_u64("X", None, 60).unwrap(), 60);
        assert_eq!(parse_u64("X", Some("15".into()), 60).unwrap(), 15);
        assert_eq!(parse_u64("X", Some(" 15 ".into()), 60).unwrap(), 15);
        assert!(parse_u64("X", Some("soon".into()), 60).is_err());
    }

    #[test]
    fn bool_parsing_accepts_common_spellings() {
        assert!(parse_bool("X", None, true).unwrap());
        assert!(!parse_bool("X", None, false).unwrap());
        assert!(parse_bool("X", Some("TRUE".into()), false).unwrap());
        assert!(!parse_bool("X", Some("0".into()), true).unwrap());
        assert!(parse_bool("X", Some("maybe".into()), true).is_err());
    }
}
