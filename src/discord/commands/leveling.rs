// Discord commands for the leveling system.
//
// **Notice the pattern:**
// 1. Extract primitive data from Discord types
// 2. Call core service
// 3. Format the response based on the result
//
// This layer is THIN - no business logic, just translation. `level` and
// `leaderboard` each register as BOTH a slash command and a `!` prefix
// command, and both entry points funnel into the same shared helpers.

use crate::config::BotConfig;
use crate::core::leveling::{LevelingService, ProgressReport, UserScore};
use crate::infra::leveling::SqliteScoreStore;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

/// Type alias for our bot's context.
/// This is what every command receives as its first parameter.
pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// Data that's shared across all commands.
pub struct Data {
    pub leveling: Arc<LevelingService<SqliteScoreStore>>,
    pub config: Arc<BotConfig>,
}

/// Show your current level and XP.
#[poise::command(slash_command, prefix_command)]
pub async fn level(
    ctx: Context<'_>,
    #[description = "User to check (defaults to you)"] user: Option<serenity::User>,
) -> Result<(), Error> {
    show_level(ctx, user).await
}

/// Shared logic for the slash and prefix variants of the level command.
async fn show_level(ctx: Context<'_>, user: Option<serenity::User>) -> Result<(), Error> {
    let target_user = user.as_ref().unwrap_or_else(|| ctx.author());

    if target_user.bot {
        ctx.say("Bots don't have levels! 🤖").await?;
        return Ok(());
    }

    let report = ctx.data().leveling.get_progress(target_user.id.get()).await?;

    let Some(report) = report else {
        ctx.say("You have no level yet.").await?;
        return Ok(());
    };

    let embed = serenity::CreateEmbed::new()
        .title(format!("⭐ Level {}", report.level))
        .description(format!(
            "{} **{}%**\nXP: **{} / {}**",
            render_bar(&report),
            report.progress.percent,
            report.xp,
            report.progress.next_threshold
        ))
        .color(0x00ff00)
        .thumbnail(target_user.face())
        .field(
            "XP to next level",
            report.progress.xp_remaining.to_string(),
            true,
        );

    ctx.send(poise::CreateReply::default().embed(embed)).await?;

    Ok(())
}

fn render_bar(report: &ProgressReport) -> String {
    "🟦".repeat(report.progress.filled) + &"⬜".repeat(report.progress.empty)
}

/// Show the server's XP leaderboard.
#[poise::command(slash_command, prefix_command)]
pub async fn leaderboard(ctx: Context<'_>) -> Result<(), Error> {
    let top = ctx.data().leveling.leaderboard(10).await?;

    if top.is_empty() {
        ctx.say("No one has earned XP yet! Start chatting to get on the leaderboard! 💬")
            .await?;
        return Ok(());
    }

    let mut description = String::new();
    for (index, score) in top.iter().enumerate() {
        description.push_str(&format_entry(&ctx, index + 1, score));
    }

    let embed = serenity::CreateEmbed::new()
        .title("📊 Leaderboard")
        .description(description)
        .color(0xffd700); // Gold color

    ctx.send(poise::CreateReply::default().embed(embed)).await?;

    Ok(())
}

fn format_entry(ctx: &Context<'_>, rank: usize, score: &UserScore) -> String {
    // Medal emojis for the top 3
    let medal = match rank {
        1 => "🥇",
        2 => "🥈",
        3 => "🥉",
        _ => "  ",
    };

    format!(
        "{} **#{}** {} — Level {} | {} XP\n",
        medal,
        rank,
        resolve_display_name_cached(ctx, score.user_id),
        score.level,
        score.xp
    )
}

/// Resolve a human-friendly display name for a user.
///
/// Order of preference:
/// 1. Guild nickname (from cache)
/// 2. Username from cache
/// 3. "Unknown"
///
/// Cache ONLY - no HTTP calls, so a ten-row leaderboard never blocks on the
/// Discord API.
fn resolve_display_name_cached(ctx: &Context<'_>, user_id: u64) -> String {
    let user_id_s = serenity::UserId::from(user_id);

    if let Some(guild_id) = ctx.guild_id() {
        if let Some(guild) = ctx.serenity_context().cache.guild(guild_id) {
            if let Some(member) = guild.members.get(&user_id_s) {
                // display_name() prefers nick over username
                return member.display_name().to_string();
            }
        }
    }

    if let Some(user) = ctx.serenity_context().cache.user(user_id_s) {
        return user.name.clone();
    }

    "Unknown".to_string()
}
