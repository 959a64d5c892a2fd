//! Media playback for the instance designated to play music

pub mod backend;
pub mod player;

pub use backend::SongbirdPlayer;
pub use player::{MediaError, MediaPlayer, QueuedTrack};
