// Periodic voice XP scan.
//
// Every tick: snapshot who's connected to voice from the serenity cache,
// then award each qualifying participant one interval's worth of XP. The
// snapshot is taken synchronously and the cache guard dropped BEFORE any
// await - cache refs are not Send and must never be held across a
// suspension point.

use crate::core::leveling::VoiceParticipant;
use crate::discord::leveling_announcements::send_level_up_embed;
use crate::discord::Data;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;

/// Spawn the background scan task. Runs for the life of the process.
pub fn spawn(ctx: &serenity::Context, data: &Data) {
    let http = ctx.http.clone();
    let cache = ctx.cache.clone();
    let leveling = Arc::clone(&data.leveling);
    let config = Arc::clone(&data.config);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.voice_tick);
        // If a scan outlives the interval, skip the missed tick instead of
        // queueing a burst of catch-up scans.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let participants = snapshot_participants(&cache);
            let mut awarded = 0usize;

            for participant in participants {
                if !leveling.voice_participant_qualifies(&participant) {
                    continue;
                }

                // One participant failing must not abort the rest of the
                // scan; the next tick retries naturally.
                match leveling.process_voice_tick(participant.user_id).await {
                    Ok(Some(level_up)) => {
                        awarded += 1;
                        tracing::info!(
                            user_id = level_up.user_id,
                            new_level = level_up.new_level,
                            total_xp = level_up.total_xp,
                            "User leveled up from voice"
                        );
                        if let Err(err) =
                            send_level_up_embed(&http, config.level_up_channel_id, &level_up).await
                        {
                            tracing::warn!("Failed to send voice level-up embed: {err}");
                        }
                    }
                    Ok(None) => awarded += 1,
                    Err(err) => {
                        tracing::warn!(
                            user_id = participant.user_id,
                            "Voice XP award failed: {err}"
                        );
                    }
                }
            }

            tracing::debug!(awarded, "Voice XP scan finished");
        }
    });
}

/// Collect connected voice participants across all cached guilds.
/// Iteration order is whatever the cache yields; per-user awards are
/// independent, so it doesn't matter.
fn snapshot_participants(cache: &Arc<serenity::Cache>) -> Vec<VoiceParticipant> {
    let mut participants = Vec::new();

    for guild_id in cache.guilds() {
        let Some(guild) = cache.guild(guild_id) else {
            continue;
        };

        for (user_id, state) in guild.voice_states.iter() {
            if state.channel_id.is_none() {
                continue;
            }

            let is_bot = guild
                .members
                .get(user_id)
                .map(|member| member.user.bot)
                .unwrap_or(false);

            participants.push(VoiceParticipant {
                user_id: user_id.get(),
                is_bot,
                is_muted: state.self_mute || state.mute,
                is_deafened: state.self_deaf || state.deaf,
            });
        }
    }

    participants
}
