use poise::serenity_prelude::Channel;
use tracing::warn;

use crate::bot::data::Context;
use crate::bot::error::Error;
use crate::bot::data::command_prefix;
use crate::constants::embeds::{self, BULLET};
use crate::services::queue::{admit, Admission};
use crate::services::stats::CallRecord;
use crate::utils::formatting::{full_time, mention_channel, relative_time};
use crate::utils::member::author_profile;

/// Ask this bot to guard a voice channel (yours by default)
#[poise::command(slash_command, prefix_command, guild_only, aliases("join", "jaga"))]
pub async fn guard(
    ctx: Context<'_>,
    #[description = "Voice channel to guard (defaults to the one you are in)"]
    #[channel_types("Voice")]
    channel: Option<Channel>,
) -> Result<(), Error> {
    ctx.defer().await?;

    let data = ctx.data();
    let profile = author_profile(ctx).await?;
    let channel = channel.map(|c| c.id());

    match admit(&data.queue, &data.fleet, &data.instance, channel, &profile).await {
        Admission::Serve => {}
        Admission::Redirect(free) => {
            let embed = embeds::info_embed()
                .title(format!("Satpam Bot #{} is busy", data.number()))
                .description(format!(
                    "**Satpam Bot #{}** is free. Ask it with `/guard` on that bot or `{}guard`.",
                    free,
                    command_prefix(free)
                ));
            ctx.send(poise::CreateReply::default().embed(embed)).await?;
            return Ok(());
        }
        Admission::Queued(position) => {
            let embed = embeds::info_embed()
                .title("All bots are busy")
                .description(super::queue::describe_position(&position));
            ctx.send(poise::CreateReply::default().embed(embed)).await?;
            return Ok(());
        }
    }

    let outcome = data.instance.guard(channel, &profile).await?;

    let record = CallRecord {
        user_id: profile.user_id,
        instance: data.number(),
        channel_id: outcome.channel_id,
        tier: outcome.tier,
        stay_duration_hours: outcome.stay_duration_hours,
    };
    if let Err(e) = data.stats.record_call(record).await {
        warn!("Bot #{}: failed to record statistics: {}", data.number(), e);
    }
    let times_guarded = data
        .stats
        .channel_stats(outcome.channel_id)
        .await
        .map_or(0, |totals| totals.total_calls);

    let title = if outcome.refreshed {
        "Stay Extended"
    } else {
        "Now Guarding"
    };

    let embed = embeds::tier_embed(outcome.tier)
        .title(title)
        .description(format!(
            "{} Channel: {}\n\
            {} Tier: **{}**\n\
            {} Stay: **{} hours**\n\
            {} Leaves: {} ({})",
            BULLET,
            mention_channel(outcome.channel_id.get()),
            BULLET,
            outcome.tier,
            BULLET,
            outcome.stay_duration_hours,
            BULLET,
            full_time(outcome.stay_until),
            relative_time(outcome.stay_until),
        ))
        .footer(poise::serenity_prelude::CreateEmbedFooter::new(format!(
            "Satpam Bot #{} · channel guarded {} time{}",
            data.number(),
            times_guarded,
            if times_guarded == 1 { "" } else { "s" }
        )));

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Send this bot home from the channel it guards
#[poise::command(slash_command, prefix_command, guild_only, aliases("leave", "pulang"))]
pub async fn dismiss(
    ctx: Context<'_>,
    #[description = "Guarded channel (defaults to the one you are in)"]
    #[channel_types("Voice")]
    channel: Option<Channel>,
) -> Result<(), Error> {
    let data = ctx.data();
    let profile = author_profile(ctx).await?;
    let channel_id = data
        .instance
        .unguard(channel.map(|c| c.id()), &profile)
        .await?;

    let embed = embeds::success_embed()
        .title("Dismissed")
        .description(format!(
            "Satpam Bot #{} stopped guarding {}",
            data.number(),
            mention_channel(channel_id.get())
        ));

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}
