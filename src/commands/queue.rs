use crate::bot::data::Context;
use crate::bot::error::Error;
use crate::constants::embeds::{self, BULLET};
use crate::constants::timeouts::format_duration;
use crate::services::queue::{QueuePosition, WaitEntry};
use crate::utils::formatting::{mention_channel, mention_user, relative_time};

pub fn describe_position(position: &QueuePosition) -> String {
    let wait = if position.estimated_wait.is_zero() {
        "you are next".to_string()
    } else {
        format!("~{}", format_duration(position.estimated_wait))
    };

    format!(
        "{} Position: **#{}** of {}\n\
        {} Estimated wait: **{}**\n\
        A bot comes to your channel by itself as soon as one is free.",
        BULLET, position.position, position.total, BULLET, wait
    )
}

pub fn describe_queue(entries: &[WaitEntry]) -> String {
    if entries.is_empty() {
        return "The queue is empty.".to_string();
    }

    entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            format!(
                "**#{}** {} ({}) for {}, asked {}",
                idx + 1,
                mention_user(entry.user_id()),
                entry.tier,
                mention_channel(entry.channel_id.get()),
                relative_time(entry.queued_at)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Check your place in the queue for a busy fleet
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn queue_status(ctx: Context<'_>) -> Result<(), Error> {
    let embed = match ctx.data().queue.position(ctx.author().id) {
        Some(position) => embeds::info_embed()
            .title("Queue Status")
            .description(describe_position(&position)),
        None => embeds::success_embed().description("You are not in the queue."),
    };

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// Give up your place in the queue
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn queue_leave(ctx: Context<'_>) -> Result<(), Error> {
    if !ctx.data().queue.leave(ctx.author().id) {
        return Err(Error::custom("You are not in the queue."));
    }

    let embed = embeds::success_embed().description("You left the queue.");
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// Everyone waiting for a bot (admin)
#[poise::command(
    slash_command,
    prefix_command,
    required_permissions = "ADMINISTRATOR",
    guild_only
)]
pub async fn queue_list(ctx: Context<'_>) -> Result<(), Error> {
    let entries = ctx.data().queue.list();

    let embed = embeds::standard_embed()
        .title(format!("Queue ({} waiting)", entries.len()))
        .description(describe_queue(&entries));

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}
