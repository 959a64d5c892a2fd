use poise::serenity_prelude::CreateEmbedFooter;

use crate::bot::data::Context;
use crate::bot::error::Error;
use crate::constants::embeds::{self, BULLET};
use crate::services::guard::{Tier, TierInfo};
use crate::utils::formatting::full_time;
use crate::utils::member::author_profile;

fn describe_tier_info(info: &TierInfo) -> String {
    let mut lines = vec![
        format!("{} Tier: **{}**", BULLET, info.tier),
        format!("{} Stay duration: **{} hours**", BULLET, info.stay_duration_hours),
        format!("{} Requirement: {}", BULLET, info.requirement),
    ];

    if let Some(since) = info.boost_since {
        lines.push(format!("{} Boosting since {}", BULLET, full_time(since)));
    }
    if let Some(role) = &info.matched_role {
        lines.push(format!("{} Granted by role **{}**", BULLET, role));
    }

    lines.join("\n")
}

/// Show your tier and how long a bot will stay for you
#[poise::command(slash_command, prefix_command, guild_only, aliases("mytier"))]
pub async fn tier(ctx: Context<'_>) -> Result<(), Error> {
    let profile = author_profile(ctx).await?;
    let info = ctx.data().coordinator.tiers.info(&profile);

    let embed = embeds::tier_embed(info.tier)
        .title(format!("Tier for {}", profile.display_name))
        .description(describe_tier_info(&info))
        .footer(CreateEmbedFooter::new(
            "Tiers are re-checked every time you call a bot",
        ));

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// List every tier and its stay duration
#[poise::command(slash_command, prefix_command)]
pub async fn tiers(ctx: Context<'_>) -> Result<(), Error> {
    let mut embed = embeds::standard_embed()
        .title("Satpam Tiers")
        .description("Higher tiers win when you qualify for more than one.");

    for tier in Tier::PRIORITY {
        let details = tier.details();
        embed = embed.field(
            tier.to_string(),
            format!(
                "**{} hours** stay\n{}\n*{}*",
                details.stay_duration_hours, details.description, details.requirement
            ),
            false,
        );
    }

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}
