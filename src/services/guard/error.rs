use serenity::all::ChannelId;
use thiserror::Error;

use super::gateway::GatewayError;

/// Failures surfaced by guard and dismiss requests
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    #[error("You need to be in a voice channel or name the channel to use")]
    NotInVoiceChannel,

    #[error("Channel <#{0}> was not found")]
    NotFound(ChannelId),

    #[error("<#{0}> is not a voice channel")]
    WrongType(ChannelId),

    #[error("Missing permission to join <#{0}> (needs View Channel and Connect)")]
    PermissionDenied(ChannelId),

    #[error("Timed out connecting to <#{0}>")]
    ConnectionTimeout(ChannelId),

    #[error("<#{channel_id}> is already guarded by Satpam Bot #{held_by}")]
    AssignmentConflict { channel_id: ChannelId, held_by: u8 },

    #[error("<#{0}> is not guarded by this bot")]
    NotGuarded(ChannelId),

    #[error("Satpam Bot #{instance} is busy guarding <#{channel_id}>")]
    Busy { instance: u8, channel_id: ChannelId },

    #[error("{0}")]
    Unknown(String),
}

impl GuardError {
    pub fn from_gateway(channel_id: ChannelId, error: GatewayError) -> Self {
        match error {
            GatewayError::NotFound => GuardError::NotFound(channel_id),
            GatewayError::WrongType => GuardError::WrongType(channel_id),
            GatewayError::PermissionDenied => GuardError::PermissionDenied(channel_id),
            GatewayError::ConnectionTimeout => GuardError::ConnectionTimeout(channel_id),
            GatewayError::Unknown(msg) => GuardError::Unknown(msg),
        }
    }
}
