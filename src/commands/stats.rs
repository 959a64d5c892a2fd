use poise::serenity_prelude::User;

use crate::bot::data::Context;
use crate::bot::error::Error;
use crate::constants::embeds::{self, BULLET, DIVIDER};
use crate::services::guard::Tier;
use crate::services::stats::{LeaderboardEntry, UserStats};
use crate::utils::formatting::{mention_user, rank_marker, relative_time};

const DEFAULT_LEADERBOARD_SIZE: usize = 10;
const MAX_LEADERBOARD_SIZE: usize = 25;

fn describe_user_stats(stats: &UserStats) -> String {
    let mut usage: Vec<String> = stats
        .tier_usage
        .iter()
        .map(|(key, count)| format!("{} {}: **{}**", BULLET, Tier::from_key(key), count))
        .collect();
    if usage.is_empty() {
        usage.push(format!("{} none yet", BULLET));
    }

    format!(
        "{}\n\n\
        **Usage**\n\
        {} Bot calls: **{}**\n\
        {} Hours of guarding: **{}**\n\
        {} Last call: {}\n\n\
        **Tiers used**\n{}",
        DIVIDER,
        BULLET,
        stats.total_calls,
        BULLET,
        stats.total_hours,
        BULLET,
        stats
            .last_used
            .map(relative_time)
            .unwrap_or_else(|| "never".to_string()),
        usage.join("\n")
    )
}

fn describe_leaderboard(entries: &[LeaderboardEntry]) -> String {
    if entries.is_empty() {
        return "Nobody has called a bot yet.".to_string();
    }

    entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            format!(
                "{} {} · **{}** calls · {}h",
                rank_marker(idx + 1),
                mention_user(entry.user_id),
                entry.total_calls,
                entry.total_hours
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// View bot usage statistics for a member
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn stats(
    ctx: Context<'_>,
    #[description = "User to view stats for (defaults to yourself)"] user: Option<User>,
) -> Result<(), Error> {
    let target_user = user.as_ref().unwrap_or_else(|| ctx.author());

    let stats = ctx
        .data()
        .stats
        .user_stats(target_user.id)
        .await
        .unwrap_or_default();

    let embed = embeds::standard_embed()
        .title(format!("Stats for {}", target_user.name))
        .thumbnail(target_user.face())
        .description(describe_user_stats(&stats));

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Members who call the bots most often
#[poise::command(slash_command, prefix_command, guild_only, aliases("top"))]
pub async fn leaderboard(
    ctx: Context<'_>,
    #[description = "How many places to show (default 10)"]
    #[min = 1]
    #[max = 25]
    limit: Option<usize>,
) -> Result<(), Error> {
    let limit = limit
        .unwrap_or(DEFAULT_LEADERBOARD_SIZE)
        .clamp(1, MAX_LEADERBOARD_SIZE);
    let entries = ctx.data().stats.leaderboard(limit).await;

    let embed = embeds::standard_embed()
        .title("Satpam Leaderboard")
        .description(describe_leaderboard(&entries));

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serenity::all::UserId;

    #[test]
    fn test_leaderboard_text() {
        assert!(describe_leaderboard(&[]).contains("Nobody"));

        let text = describe_leaderboard(&[
            LeaderboardEntry {
                user_id: UserId::new(1),
                total_calls: 4,
                total_hours: 48,
            },
            LeaderboardEntry {
                user_id: UserId::new(2),
                total_calls: 1,
                total_hours: 12,
            },
        ]);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("🥇 <@1>"));
        assert!(lines[1].contains("**1** calls"));
    }

    #[test]
    fn test_empty_user_stats() {
        let text = describe_user_stats(&UserStats::default());
        assert!(text.contains("never"));
        assert!(text.contains("none yet"));
    }
}
