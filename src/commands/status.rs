use crate::bot::data::Context;
use crate::bot::error::Error;
use crate::constants::embeds::{self, DIVIDER};
use crate::constants::timeouts::format_duration;
use crate::services::guard::InstanceStatus;
use crate::services::stats::UsageTotals;
use crate::utils::formatting::{mention_channel, mention_user, relative_time};

pub fn describe_status(number: u8, status: &InstanceStatus) -> String {
    match status {
        InstanceStatus::Disconnected => format!("**Satpam Bot #{}** 💤 offline", number),
        InstanceStatus::Idle { channel_id } => format!(
            "**Satpam Bot #{}** 🟢 available, idling in {}",
            number,
            mention_channel(channel_id.get())
        ),
        InstanceStatus::Guarding {
            channel_id,
            requester,
            tier,
            occupants,
            remaining,
            stay_until,
        } => format!(
            "**Satpam Bot #{}** 🛡️ guarding {} for {}\n\
            ↳ {} · {} · {} left, leaves {}",
            number,
            mention_channel(channel_id.get()),
            mention_user(*requester),
            tier,
            match occupants {
                0 => "empty".to_string(),
                1 => "1 member".to_string(),
                n => format!("{} members", n),
            },
            format_duration(*remaining),
            relative_time(*stay_until),
        ),
    }
}

/// All-time service record of one bot
pub fn describe_totals(totals: &UsageTotals) -> String {
    format!(
        "↳ {} call{} served, {}h on guard in total",
        totals.total_calls,
        if totals.total_calls == 1 { "" } else { "s" },
        totals.total_hours
    )
}

/// Show what every Satpam bot is doing right now
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let data = ctx.data();
    let mut lines = Vec::new();
    for instance in data.instances() {
        let status = instance.status().await;
        let mut line = describe_status(instance.number(), &status);
        if let Some(totals) = data.stats.bot_stats(instance.number()).await {
            line.push('\n');
            line.push_str(&describe_totals(&totals));
        }
        lines.push(line);
    }

    let guarded = data.coordinator.assignments.len();
    let waiting = data.queue.len();
    let embed = embeds::standard_embed()
        .title("Satpam Fleet Status")
        .description(format!(
            "{}\n{}\n\n{} of {} bots on guard duty, {} member{} waiting in the queue",
            lines.join("\n\n"),
            DIVIDER,
            guarded,
            lines.len(),
            waiting,
            if waiting == 1 { "" } else { "s" }
        ));

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::guard::Tier;
    use chrono::Utc;
    use serenity::all::{ChannelId, UserId};
    use std::time::Duration;

    #[test]
    fn test_describe_idle_and_offline() {
        assert!(describe_status(1, &InstanceStatus::Disconnected).contains("offline"));
        let idle = describe_status(
            2,
            &InstanceStatus::Idle {
                channel_id: ChannelId::new(9),
            },
        );
        assert!(idle.contains("#2"));
        assert!(idle.contains("<#9>"));
    }

    #[test]
    fn test_describe_guarding() {
        let text = describe_status(
            3,
            &InstanceStatus::Guarding {
                channel_id: ChannelId::new(4),
                requester: UserId::new(5),
                tier: Tier::Booster,
                occupants: 0,
                remaining: Duration::from_secs(2 * 3600),
                stay_until: Utc::now(),
            },
        );
        assert!(text.contains("<#4>"));
        assert!(text.contains("<@5>"));
        assert!(text.contains("empty"));
        assert!(text.contains("2 hours"));
    }

    #[test]
    fn test_describe_totals() {
        let once = describe_totals(&UsageTotals {
            total_calls: 1,
            total_hours: 36,
            last_used: None,
        });
        assert!(once.contains("1 call served"));
        assert!(once.contains("36h"));

        let many = describe_totals(&UsageTotals {
            total_calls: 4,
            total_hours: 60,
            last_used: Some(Utc::now()),
        });
        assert!(many.contains("4 calls served"));
    }
}
