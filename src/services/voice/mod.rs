//! Discord-backed implementations of the guard core's platform seams

pub mod gateway;
pub mod notifier;

pub use gateway::SongbirdGateway;
pub use notifier::DiscordNotifier;
