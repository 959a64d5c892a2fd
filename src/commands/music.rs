use std::sync::Arc;

use crate::bot::data::Context;
use crate::bot::error::Error;
use crate::constants::embeds::{self, BULLET};
use crate::services::media::player::MediaQuery;
use crate::services::media::{MediaError, MediaPlayer};
use crate::utils::formatting::{mention_user, truncate};

const QUEUE_DISPLAY_LIMIT: usize = 10;

fn player(ctx: &Context<'_>) -> Result<Arc<dyn MediaPlayer>, Error> {
    ctx.data().media.clone().ok_or(Error::Media(MediaError::Disabled))
}

async fn reply(ctx: Context<'_>, text: impl Into<String>) -> Result<(), Error> {
    let embed = embeds::success_embed().description(text.into());
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Play a song from a link or a search
#[poise::command(slash_command, prefix_command, guild_only, aliases("p"))]
pub async fn play(
    ctx: Context<'_>,
    #[description = "Link or search terms"]
    #[rest]
    query: String,
) -> Result<(), Error> {
    let player = player(&ctx)?;
    let guild_id = ctx
        .guild_id()
        .ok_or_else(|| Error::custom("Not in a guild"))?;
    let query = MediaQuery::parse(&query)
        .ok_or_else(|| Error::custom("Tell me what to play"))?;

    ctx.defer().await?;
    let (track, position) = player.play(guild_id, query, ctx.author().id).await?;

    let text = if position == 1 {
        format!("🎵 Now playing **{}**", truncate(&track.to_string(), 80))
    } else {
        format!(
            "➕ Queued **{}** at position {}",
            truncate(&track.to_string(), 80),
            position
        )
    };
    reply(ctx, text).await
}

/// Pause the current song
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn pause(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or_else(|| Error::custom("Not in a guild"))?;
    player(&ctx)?.pause(guild_id).await?;
    reply(ctx, "⏸️ Paused").await
}

/// Resume the paused song
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn resume(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or_else(|| Error::custom("Not in a guild"))?;
    player(&ctx)?.resume(guild_id).await?;
    reply(ctx, "▶️ Resumed").await
}

/// Skip to the next song
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn skip(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or_else(|| Error::custom("Not in a guild"))?;
    let remaining = player(&ctx)?.skip(guild_id).await?;
    reply(ctx, format!("⏭️ Skipped, {} left in the queue", remaining)).await
}

/// Stop playback and clear the queue
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn stop(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or_else(|| Error::custom("Not in a guild"))?;
    player(&ctx)?.stop(guild_id).await?;
    reply(ctx, "⏹️ Stopped and cleared the queue").await
}

/// Show the song queue
#[poise::command(slash_command, prefix_command, guild_only, aliases("q"))]
pub async fn queue(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or_else(|| Error::custom("Not in a guild"))?;
    let tracks = player(&ctx)?.queue(guild_id).await?;

    let description = if tracks.is_empty() {
        "The queue is empty.".to_string()
    } else {
        let mut lines: Vec<String> = tracks
            .iter()
            .take(QUEUE_DISPLAY_LIMIT)
            .enumerate()
            .map(|(idx, track)| {
                let marker = if idx == 0 {
                    "▶️".to_string()
                } else {
                    format!("`{}.`", idx + 1)
                };
                format!(
                    "{} {} · {}",
                    marker,
                    truncate(&track.to_string(), 60),
                    mention_user(track.requested_by)
                )
            })
            .collect();
        if tracks.len() > QUEUE_DISPLAY_LIMIT {
            lines.push(format!(
                "{} and {} more",
                BULLET,
                tracks.len() - QUEUE_DISPLAY_LIMIT
            ));
        }
        lines.join("\n")
    };

    let embed = embeds::info_embed()
        .title("Queue")
        .description(description);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}
