use crate::core::leveling::{progression, LevelUpEvent, XpSource};
use poise::serenity_prelude::{self as serenity, builder::CreateMessage};
use rand::seq::SliceRandom;

/// Send a level-up embed to the announcement channel.
///
/// Best-effort by contract: the XP was persisted before this event was ever
/// emitted, so a failure here is logged by the caller and never retried.
pub async fn send_level_up_embed(
    http: &serenity::Http,
    channel_id: u64,
    level_up: &LevelUpEvent,
) -> Result<(), serenity::Error> {
    let announcement_channel_id = serenity::ChannelId::from(channel_id);

    let headline = match level_up.source {
        XpSource::Message => format!(
            "🎉 <@{}> reached **Level {}**!",
            level_up.user_id, level_up.new_level
        ),
        XpSource::Voice => format!(
            "🎉 <@{}> reached **Level {}** from voice!",
            level_up.user_id, level_up.new_level
        ),
    };

    let p = progression::progress(level_up.total_xp, level_up.new_level, 18);

    let embed = serenity::CreateEmbed::new()
        .title("Level Up!")
        .description(headline)
        .color(level_color(level_up.new_level))
        .field("Total XP", level_up.total_xp.to_string(), true)
        .field(
            "Progress",
            format!(
                "{}{} ({}%)",
                "▰".repeat(p.filled),
                "▱".repeat(p.empty),
                p.percent
            ),
            false,
        )
        .footer(serenity::CreateEmbedFooter::new(random_flavor_line()));

    announcement_channel_id
        .send_message(http, CreateMessage::new().embed(embed))
        .await
        .map(|_| ())
}

fn level_color(level: u32) -> serenity::Colour {
    if level >= 50 {
        serenity::Colour::DARK_PURPLE
    } else if level >= 25 {
        serenity::Colour::ORANGE
    } else if level >= 10 {
        serenity::Colour::GOLD
    } else if level >= 5 {
        serenity::Colour::BLURPLE
    } else {
        serenity::Colour::LIGHT_GREY
    }
}

fn random_flavor_line() -> &'static str {
    const FLAVOR_LINES: [&str; 4] = [
        "Keep the streak going!",
        "Your grind is paying off.",
        "Another level, another flex.",
        "That XP bar never stood a chance.",
    ];

    FLAVOR_LINES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(FLAVOR_LINES[0])
}
