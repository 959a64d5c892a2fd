use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{Cache, Channel, ChannelId, ChannelType, Http, Permissions};
use songbird::error::JoinError;
use songbird::Songbird;
use tracing::{debug, warn};

use crate::services::guard::{ChannelInfo, ChannelKind, GatewayError, VoiceGateway, VoiceHandle};

/// Voice capabilities of one bot identity, backed by its own HTTP client,
/// cache and songbird manager
pub struct SongbirdGateway {
    instance: u8,
    http: Arc<Http>,
    cache: Arc<Cache>,
    songbird: Arc<Songbird>,
}

impl SongbirdGateway {
    pub fn new(instance: u8, http: Arc<Http>, cache: Arc<Cache>, songbird: Arc<Songbird>) -> Self {
        Self {
            instance,
            http,
            cache,
            songbird,
        }
    }

    /// Permissions of this bot in a channel, when the cache knows enough to tell
    fn cached_permissions(&self, channel: &ChannelInfo) -> Option<Permissions> {
        let bot_id = self.cache.current_user().id;
        let guild = self.cache.guild(channel.guild_id)?;
        let guild_channel = guild.channels.get(&channel.id)?;
        let member = guild.members.get(&bot_id)?;
        Some(guild.user_permissions_in(guild_channel, member))
    }
}

pub fn channel_kind(kind: ChannelType) -> ChannelKind {
    match kind {
        ChannelType::Voice => ChannelKind::Voice,
        ChannelType::Stage => ChannelKind::Stage,
        ChannelType::Text | ChannelType::News => ChannelKind::Text,
        _ => ChannelKind::Other,
    }
}

/// Map an HTTP failure onto the stable gateway classification
fn classify_http(error: serenity::Error) -> GatewayError {
    if let serenity::Error::Http(ref http) = error {
        match http.status_code().map(|s| s.as_u16()) {
            Some(404) => return GatewayError::NotFound,
            Some(403) => return GatewayError::PermissionDenied,
            _ => {}
        }
    }
    GatewayError::Unknown(error.to_string())
}

fn classify_join(error: JoinError) -> GatewayError {
    match error {
        JoinError::TimedOut => GatewayError::ConnectionTimeout,
        other => GatewayError::Unknown(other.to_string()),
    }
}

#[async_trait]
impl VoiceGateway for SongbirdGateway {
    async fn fetch_channel(&self, channel_id: ChannelId) -> Result<ChannelInfo, GatewayError> {
        let channel = channel_id
            .to_channel(self.http.as_ref())
            .await
            .map_err(classify_http)?;

        match channel {
            Channel::Guild(channel) => Ok(ChannelInfo {
                id: channel.id,
                guild_id: channel.guild_id,
                name: channel.name.clone(),
                kind: channel_kind(channel.kind),
            }),
            _ => Err(GatewayError::WrongType),
        }
    }

    async fn connect(&self, channel: &ChannelInfo) -> Result<VoiceHandle, GatewayError> {
        // Discord silently drops joins without CONNECT, which would surface as a timeout
        if let Some(perms) = self.cached_permissions(channel) {
            if !perms.view_channel() || !perms.connect() {
                return Err(GatewayError::PermissionDenied);
            }
        }

        let call = self
            .songbird
            .join(channel.guild_id, channel.id)
            .await
            .map_err(classify_join)?;

        if let Err(e) = call.lock().await.deafen(true).await {
            warn!(
                "Bot #{}: could not self-deafen in {}: {:?}",
                self.instance, channel.name, e
            );
        }

        debug!("Bot #{}: voice connected to {}", self.instance, channel.name);

        Ok(VoiceHandle {
            guild_id: channel.guild_id,
            channel_id: channel.id,
        })
    }

    async fn disconnect(&self, handle: VoiceHandle) {
        if let Err(e) = self.songbird.remove(handle.guild_id).await {
            debug!(
                "Bot #{}: leaving {} reported {:?}",
                self.instance, handle.channel_id, e
            );
        }
    }

    async fn abort_connect(&self, channel: &ChannelInfo) {
        if self.songbird.get(channel.guild_id).is_some() {
            if let Err(e) = self.songbird.remove(channel.guild_id).await {
                debug!(
                    "Bot #{}: cleaning up abandoned join to {} reported {:?}",
                    self.instance, channel.name, e
                );
            }
        }
    }

    async fn live_member_count(&self, channel_id: ChannelId) -> Result<usize, GatewayError> {
        let guild_id = self
            .cache
            .channel(channel_id)
            .map(|channel| channel.guild_id)
            .ok_or(GatewayError::NotFound)?;

        let guild = self.cache.guild(guild_id).ok_or(GatewayError::NotFound)?;
        Ok(guild
            .voice_states
            .values()
            .filter(|state| state.channel_id == Some(channel_id))
            .count())
    }
}
