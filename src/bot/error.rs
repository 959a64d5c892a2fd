use thiserror::Error;

use crate::config::ConfigError;
use crate::services::guard::GuardError;
use crate::services::media::MediaError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Discord API error: {0}")]
    Serenity(#[from] serenity::Error),

    #[error("{0}")]
    Guard(#[from] GuardError),

    #[error("{0}")]
    Media(#[from] MediaError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Custom(String),
}

impl Error {
    pub fn custom<S: Into<String>>(msg: S) -> Self {
        Error::Custom(msg.into())
    }

    /// Whether the message is meant for the member who ran the command
    /// rather than for the operator's logs
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Error::Guard(_) | Error::Media(_) | Error::Custom(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serenity::all::ChannelId;

    #[test]
    fn test_guard_errors_are_user_facing() {
        let err: Error = GuardError::NotGuarded(ChannelId::new(5)).into();
        assert!(err.is_user_facing());

        let err: Error = std::io::Error::other("disk").into();
        assert!(!err.is_user_facing());
    }
}
