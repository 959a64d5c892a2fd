use std::sync::Arc;

use serenity::all::{ChannelId, UserId};
use tokio::time::sleep;
use tracing::debug;

use super::instance::BotInstance;
use crate::constants::timeouts::VACANCY_CHECK_DELAY;

/// A member's voice presence moving between channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceChange {
    pub user_id: UserId,
    pub old_channel: Option<ChannelId>,
    pub new_channel: Option<ChannelId>,
}

impl PresenceChange {
    /// The channel this change left, if the member actually left one
    pub fn left_channel(&self) -> Option<ChannelId> {
        self.old_channel.filter(|old| self.new_channel != Some(*old))
    }
}

impl BotInstance {
    /// React to a voice presence change anywhere in the guild.
    ///
    /// When someone leaves the channel this instance guards, a debounced
    /// vacancy check is scheduled. Returns whether one was scheduled.
    pub fn on_presence_change(self: &Arc<Self>, bot_user: UserId, change: PresenceChange) -> bool {
        if change.user_id == bot_user {
            return false;
        }

        let Some(left) = change.left_channel() else {
            return false;
        };

        if self.coordinator.assignments.owner_of(left) != Some(self.number()) {
            return false;
        }

        debug!(
            "Bot #{}: {} left guarded channel {}, checking vacancy",
            self.number(),
            change.user_id,
            left
        );

        let instance = Arc::clone(self);
        tokio::spawn(async move {
            sleep(VACANCY_CHECK_DELAY).await;
            instance.check_vacancy(left).await;
        });

        true
    }

    /// If only the bot remains in its guarded channel, make sure the stay
    /// countdown is running. An emptied channel never shortens or restarts the stay.
    pub async fn check_vacancy(&self, channel_id: ChannelId) -> bool {
        let slot = self.slot.lock().await;

        if slot.presence.guarded_channel() != Some(channel_id) {
            return false;
        }

        match self.live_member_count(channel_id).await {
            Some(count) if count <= 1 => self.ensure_countdown(&slot, channel_id),
            Some(count) => {
                debug!(
                    "Bot #{}: {} still has {} members",
                    self.number(),
                    channel_id,
                    count
                );
                false
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::guard::coordinator::Coordinator;
    use crate::services::guard::member::MemberProfile;
    use crate::services::guard::testing::{guild, FakeGateway, RecordingNotifier};

    fn bot_user() -> UserId {
        UserId::new(999)
    }

    fn change(user: u64, old: Option<u64>, new: Option<u64>) -> PresenceChange {
        PresenceChange {
            user_id: UserId::new(user),
            old_channel: old.map(ChannelId::new),
            new_channel: new.map(ChannelId::new),
        }
    }

    #[test]
    fn test_left_channel() {
        assert_eq!(change(1, Some(5), None).left_channel(), Some(ChannelId::new(5)));
        assert_eq!(change(1, Some(5), Some(6)).left_channel(), Some(ChannelId::new(5)));
        assert_eq!(change(1, None, Some(5)).left_channel(), None);
        // Muting or deafening in place repeats the same channel on both sides
        assert_eq!(change(1, Some(5), Some(5)).left_channel(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_departures_from_own_post_schedule_a_check() {
        let gateway = Arc::new(FakeGateway::new());
        let guarded = gateway.add_voice(5);
        let other = gateway.add_voice(6);
        let bot = BotInstance::new(
            1,
            None,
            gateway,
            Arc::new(RecordingNotifier::new()),
            Arc::new(Coordinator::default()),
        );
        let member = MemberProfile::new(UserId::new(10), guild(), "member-10");
        bot.guard(Some(guarded), &member).await.unwrap();

        assert!(!bot.on_presence_change(bot_user(), change(10, Some(5), Some(5))));
        assert!(!bot.on_presence_change(bot_user(), change(999, Some(5), None)));
        assert!(!bot.on_presence_change(bot_user(), change(10, Some(other.get()), None)));
        assert!(bot.on_presence_change(bot_user(), change(10, Some(5), None)));
    }
}
