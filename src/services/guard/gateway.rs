use async_trait::async_trait;
use serenity::all::{ChannelId, GuildId};
use thiserror::Error;

/// Stable classification of platform capability failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("channel not found")]
    NotFound,

    #[error("channel is not a voice channel")]
    WrongType,

    #[error("missing permission to view or connect")]
    PermissionDenied,

    #[error("voice connection timed out")]
    ConnectionTimeout,

    #[error("{0}")]
    Unknown(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Voice,
    Stage,
    Text,
    Other,
}

impl ChannelKind {
    pub fn is_joinable(self) -> bool {
        self == ChannelKind::Voice
    }
}

/// Minimal view of a platform channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: ChannelId,
    pub guild_id: GuildId,
    pub name: String,
    pub kind: ChannelKind,
}

/// A live voice connection.
///
/// Deliberately neither `Clone` nor `Copy`: the owning instance must hand it
/// back to [`VoiceGateway::disconnect`] before it can hold another one.
#[derive(Debug, PartialEq, Eq)]
pub struct VoiceHandle {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
}

/// Voice capabilities one bot instance needs from the platform
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    async fn fetch_channel(&self, channel_id: ChannelId) -> Result<ChannelInfo, GatewayError>;

    /// Join a voice channel, self-deafened
    async fn connect(&self, channel: &ChannelInfo) -> Result<VoiceHandle, GatewayError>;

    async fn disconnect(&self, handle: VoiceHandle);

    /// Tear down whatever a connect attempt that was abandoned may have left behind
    async fn abort_connect(&self, channel: &ChannelInfo);

    /// Members currently in the channel, the bot itself included
    async fn live_member_count(&self, channel_id: ChannelId) -> Result<usize, GatewayError>;
}
