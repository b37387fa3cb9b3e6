// This is the entry point of the Discord bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (storage)
// - `discord/` = Discord-specific adapters (commands, events, voice scan)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Register commands and event handlers

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

mod config;

use crate::config::BotConfig;
use crate::core::leveling::{LevelingError, LevelingService};
use crate::discord::leveling_announcements::send_level_up_embed;
use crate::discord::{voice_scanner, Data, Error};
use crate::infra::leveling::SqliteScoreStore;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

/// Event handler for non-command Discord events.
/// This is where messages earn XP.
async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    if let serenity::FullEvent::Message { new_message } = event {
        // Ignore bot messages (including our own)
        if new_message.author.bot {
            return Ok(());
        }

        let user_id = new_message.author.id.get();
        let now_secs = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;

        match data.leveling.process_message(user_id, now_secs).await {
            Ok(Some(level_up)) => {
                tracing::info!(
                    user_id = level_up.user_id,
                    old_level = level_up.old_level,
                    new_level = level_up.new_level,
                    total_xp = level_up.total_xp,
                    "User leveled up"
                );

                // The award is already persisted; announcing is best-effort.
                if let Err(err) =
                    send_level_up_embed(&ctx.http, data.config.level_up_channel_id, &level_up)
                        .await
                {
                    tracing::warn!("Failed to send level-up embed: {err}");
                }
            }
            Ok(None) => {
                // XP was awarded but no level up - nothing to do
            }
            Err(LevelingError::OnCooldown(_)) => {
                // User is on cooldown - silently ignore
            }
            Err(e) => {
                // The user misses one award; don't crash over it.
                tracing::error!("Error processing XP for message: {e}");
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    // Configuration errors are fatal: refuse to start half-configured.
    let config = match BotConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Configuration error: {err:#}");
            std::process::exit(1);
        }
    };

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Create our services with their dependencies.
    // This is the "composition root" where we wire everything together.

    let score_store = SqliteScoreStore::new(&config.database_path)
        .await
        .expect("Failed to initialize SQLite store");

    let leveling_service = Arc::new(LevelingService::new(score_store, config.leveling));

    let token = config.discord_token.clone();
    let config = Arc::new(config);

    let data = Data {
        leveling: Arc::clone(&leveling_service),
        config: Arc::clone(&config),
    };

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================
    // Configure the poise framework with our commands and settings.

    let intents = serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT // Required to read message content
        | serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::GUILD_VOICE_STATES;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            // Register all our commands here
            commands: vec![
                discord::commands::leveling::level(),
                discord::commands::leveling::leaderboard(),
            ],
            // Same commands, reachable as !level / !leaderboard
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some("!".to_string()),
                ..Default::default()
            },
            // Event handler for messages
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                println!("🤖 Bot is starting up...");

                // Register slash commands globally (can take up to an hour to propagate)
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                println!("✅ Commands registered!");
                println!("🚀 Bot is ready!");

                // Background voice XP scan, one tick per configured interval.
                voice_scanner::spawn(ctx, &data);

                Ok(data)
            })
        })
        .build();

    // Create the client and start the bot
    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await
        .expect("Error creating client");

    client.start().await.expect("Error running bot");
}
