use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serenity::all::{GuildId, UserId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("Media playback is not enabled for this bot")]
    Disabled,

    #[error("The bot is not connected to a voice channel in this server")]
    NotConnected,

    #[error("Nothing is playing right now")]
    NothingPlaying,

    #[error("Could not find anything for {0:?}")]
    NotFound(String),

    #[error("Playback failed: {0}")]
    Playback(String),
}

/// What to look up: a direct link or a free-text search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaQuery {
    Url(String),
    Search(String),
}

impl MediaQuery {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            None
        } else if raw.starts_with("http://") || raw.starts_with("https://") {
            Some(MediaQuery::Url(raw.to_string()))
        } else {
            Some(MediaQuery::Search(raw.to_string()))
        }
    }
}

/// A track waiting in, or playing from, the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedTrack {
    pub title: String,
    pub duration: Option<Duration>,
    pub url: Option<String>,
    pub requested_by: UserId,
}

impl fmt::Display for QueuedTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.duration {
            Some(d) => {
                let secs = d.as_secs();
                write!(f, "{} ({}:{:02})", self.title, secs / 60, secs % 60)
            }
            None => write!(f, "{}", self.title),
        }
    }
}

#[async_trait]
pub trait MediaPlayer: Send + Sync {
    /// Resolve and enqueue; returns the track and its 1-based queue position
    async fn play(
        &self,
        guild_id: GuildId,
        query: MediaQuery,
        requested_by: UserId,
    ) -> Result<(QueuedTrack, usize), MediaError>;

    async fn pause(&self, guild_id: GuildId) -> Result<(), MediaError>;

    async fn resume(&self, guild_id: GuildId) -> Result<(), MediaError>;

    /// Skip the current track; returns how many remain queued
    async fn skip(&self, guild_id: GuildId) -> Result<usize, MediaError>;

    /// Stop playback and clear the queue
    async fn stop(&self, guild_id: GuildId) -> Result<(), MediaError>;

    /// Current track first
    async fn queue(&self, guild_id: GuildId) -> Result<Vec<QueuedTrack>, MediaError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query() {
        assert_eq!(
            MediaQuery::parse(" https://youtu.be/abc "),
            Some(MediaQuery::Url("https://youtu.be/abc".to_string()))
        );
        assert_eq!(
            MediaQuery::parse("lofi hip hop"),
            Some(MediaQuery::Search("lofi hip hop".to_string()))
        );
        assert_eq!(MediaQuery::parse("   "), None);
    }

    #[test]
    fn test_track_display() {
        let track = QueuedTrack {
            title: "Song".to_string(),
            duration: Some(Duration::from_secs(185)),
            url: None,
            requested_by: UserId::new(1),
        };
        assert_eq!(track.to_string(), "Song (3:05)");

        let live = QueuedTrack {
            duration: None,
            ..track
        };
        assert_eq!(live.to_string(), "Song");
    }
}
