use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serenity::all::{GuildId, UserId};
use songbird::input::{Compose, YoutubeDl};
use songbird::tracks::Track;
use songbird::{Call, Songbird};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::player::{MediaError, MediaPlayer, MediaQuery, QueuedTrack};

/// Plays through songbird's built-in queue on the instance's existing voice call
pub struct SongbirdPlayer {
    instance: u8,
    songbird: Arc<Songbird>,
    http: HttpClient,
}

impl SongbirdPlayer {
    pub fn new(instance: u8, songbird: Arc<Songbird>, http: HttpClient) -> Self {
        Self {
            instance,
            songbird,
            http,
        }
    }

    /// The live call in this guild; playback never opens a connection of its own
    fn call(&self, guild_id: GuildId) -> Result<Arc<Mutex<Call>>, MediaError> {
        self.songbird.get(guild_id).ok_or(MediaError::NotConnected)
    }
}

fn playback_error(e: impl std::fmt::Display) -> MediaError {
    MediaError::Playback(e.to_string())
}

#[async_trait]
impl MediaPlayer for SongbirdPlayer {
    async fn play(
        &self,
        guild_id: GuildId,
        query: MediaQuery,
        requested_by: UserId,
    ) -> Result<(QueuedTrack, usize), MediaError> {
        let call = self.call(guild_id)?;

        let (mut source, raw) = match query {
            MediaQuery::Url(url) => (YoutubeDl::new(self.http.clone(), url.clone()), url),
            MediaQuery::Search(terms) => {
                (YoutubeDl::new_search(self.http.clone(), terms.clone()), terms)
            }
        };

        let meta = source.aux_metadata().await.map_err(|e| {
            debug!("Bot #{}: lookup for {:?} failed: {:?}", self.instance, raw, e);
            MediaError::NotFound(raw.clone())
        })?;

        let track = QueuedTrack {
            title: meta.title.unwrap_or(raw),
            duration: meta.duration,
            url: meta.source_url,
            requested_by,
        };

        let mut handler = call.lock().await;
        if handler.current_channel().is_none() {
            return Err(MediaError::NotConnected);
        }

        handler
            .enqueue(Track::new_with_data(source.into(), Arc::new(track.clone())))
            .await;
        let position = handler.queue().len();

        info!(
            "Bot #{}: queued {:?} at position {} for {}",
            self.instance, track.title, position, requested_by
        );

        Ok((track, position))
    }

    async fn pause(&self, guild_id: GuildId) -> Result<(), MediaError> {
        let call = self.call(guild_id)?;
        let handler = call.lock().await;
        if handler.queue().is_empty() {
            return Err(MediaError::NothingPlaying);
        }
        handler.queue().pause().map_err(playback_error)
    }

    async fn resume(&self, guild_id: GuildId) -> Result<(), MediaError> {
        let call = self.call(guild_id)?;
        let handler = call.lock().await;
        if handler.queue().is_empty() {
            return Err(MediaError::NothingPlaying);
        }
        handler.queue().resume().map_err(playback_error)
    }

    async fn skip(&self, guild_id: GuildId) -> Result<usize, MediaError> {
        let call = self.call(guild_id)?;
        let handler = call.lock().await;
        let queued = handler.queue().len();
        if queued == 0 {
            return Err(MediaError::NothingPlaying);
        }
        handler.queue().skip().map_err(playback_error)?;
        Ok(queued - 1)
    }

    async fn stop(&self, guild_id: GuildId) -> Result<(), MediaError> {
        let call = self.call(guild_id)?;
        let handler = call.lock().await;
        handler.queue().stop();
        info!("Bot #{}: playback stopped in {}", self.instance, guild_id);
        Ok(())
    }

    async fn queue(&self, guild_id: GuildId) -> Result<Vec<QueuedTrack>, MediaError> {
        let call = self.call(guild_id)?;
        let handler = call.lock().await;
        Ok(handler
            .queue()
            .current_queue()
            .iter()
            .map(|handle| handle.data::<QueuedTrack>().as_ref().clone())
            .collect())
    }
}
