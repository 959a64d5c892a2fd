use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{Cache, ChannelId, ChannelType, CreateMessage, GuildChannel, Http, Permissions};
use tracing::{debug, warn};

use crate::services::guard::{Notice, NotificationSink};

/// Posts notices to a text channel next to the voice channel they concern
pub struct DiscordNotifier {
    instance: u8,
    http: Arc<Http>,
    cache: Arc<Cache>,
}

impl DiscordNotifier {
    pub fn new(instance: u8, http: Arc<Http>, cache: Arc<Cache>) -> Self {
        Self {
            instance,
            http,
            cache,
        }
    }

    /// A text channel in the voice channel's category, else any text channel
    /// the bot can write to
    fn find_text_channel(&self, voice_channel: ChannelId) -> Option<ChannelId> {
        let guild_id = self.cache.channel(voice_channel)?.guild_id;
        let guild = self.cache.guild(guild_id)?;
        let category = guild.channels.get(&voice_channel)?.parent_id;
        let bot_member = guild.members.get(&self.cache.current_user().id);

        let writable = |channel: &&GuildChannel| {
            channel.kind == ChannelType::Text
                && bot_member.map_or(true, |member| {
                    guild
                        .user_permissions_in(channel, member)
                        .contains(Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES)
                })
        };

        let mut candidates: Vec<&GuildChannel> = guild.channels.values().filter(writable).collect();
        candidates.sort_by_key(|channel| (channel.position, channel.id));

        candidates
            .iter()
            .find(|channel| category.is_some() && channel.parent_id == category)
            .or_else(|| candidates.first())
            .map(|channel| channel.id)
    }
}

#[async_trait]
impl NotificationSink for DiscordNotifier {
    async fn notify(&self, channel_id: ChannelId, notice: Notice) {
        let Some(target) = self.find_text_channel(channel_id) else {
            debug!(
                "Bot #{}: no text channel to announce in for {}",
                self.instance, channel_id
            );
            return;
        };

        let message = CreateMessage::new().content(notice.render(channel_id));
        if let Err(e) = target.send_message(self.http.as_ref(), message).await {
            warn!(
                "Bot #{}: failed to send notice to {}: {:?}",
                self.instance, target, e
            );
        }
    }
}
