use async_trait::async_trait;
use serenity::all::{ChannelId, UserId};

use super::tier::Tier;
use crate::utils::formatting::{mention_channel, mention_user};

/// Something worth telling the people around a guarded channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Guarding {
        instance: u8,
        requester: UserId,
        tier: Tier,
        stay_duration_hours: i64,
    },
    Dismissed {
        instance: u8,
        by: UserId,
    },
    ExpiryWarning {
        instance: u8,
        requester: UserId,
        minutes_remaining: u64,
    },
    Expired {
        instance: u8,
        requester: UserId,
    },
    QueueReady {
        instance: u8,
        requester: UserId,
    },
}

impl Notice {
    pub fn render(&self, channel_id: ChannelId) -> String {
        let channel = mention_channel(channel_id.get());
        match self {
            Notice::Guarding {
                instance,
                requester,
                tier,
                stay_duration_hours,
            } => format!(
                "✅ {} **Satpam Bot #{}** is now guarding {}!\n\
                📊 **Tier:** {} ({} hours stay)\n\
                ⏰ The bot stays for **{} hours** after you leave the voice channel.",
                mention_user(*requester),
                instance,
                channel,
                tier,
                stay_duration_hours,
                stay_duration_hours
            ),
            Notice::Dismissed { instance, by } => format!(
                "👋 {} **Satpam Bot #{}** has gone home from {}.",
                mention_user(*by),
                instance,
                channel
            ),
            Notice::ExpiryWarning {
                instance,
                requester,
                minutes_remaining,
            } => format!(
                "⚠️ {} **Satpam Bot #{}** will leave {} in **{} minutes**!",
                mention_user(*requester),
                instance,
                channel,
                minutes_remaining
            ),
            Notice::Expired {
                instance,
                requester,
            } => format!(
                "⌛ {} **Satpam Bot #{}** finished its watch over {} and is heading back.",
                mention_user(*requester),
                instance,
                channel
            ),
            Notice::QueueReady {
                instance,
                requester,
            } => format!(
                "🎉 {} it's your turn! **Satpam Bot #{}** is free and now guards {}.",
                mention_user(*requester),
                instance,
                channel
            ),
        }
    }
}

/// Delivers notices to humans. Delivery failures are the sink's problem.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, channel_id: ChannelId, notice: Notice);
}
