use std::fmt;
use std::sync::Arc;

use crate::config::Settings;
pub use crate::services::guard::Fleet;
use crate::services::guard::{BotInstance, Coordinator};
use crate::services::media::MediaPlayer;
use crate::services::queue::WaitQueue;
use crate::services::snapshot::SnapshotStore;
use crate::services::stats::StatsStore;

/// Shared data available to all commands and handlers of one instance
pub struct Data {
    pub instance: Arc<BotInstance>,
    pub settings: Arc<Settings>,
    pub coordinator: Arc<Coordinator>,
    pub fleet: Arc<Fleet>,
    pub stats: Arc<StatsStore>,
    pub queue: Arc<WaitQueue>,
    pub snapshots: Arc<SnapshotStore>,
    /// Present only on the instance allowed to play media
    pub media: Option<Arc<dyn MediaPlayer>>,
}

impl Data {
    pub fn number(&self) -> u8 {
        self.instance.number()
    }

    /// The prefix this instance answers to, e.g. `satpam#2!`
    pub fn prefix(&self) -> String {
        command_prefix(self.number())
    }

    /// Instances sorted by number
    pub fn instances(&self) -> Vec<Arc<BotInstance>> {
        let mut all: Vec<Arc<BotInstance>> =
            self.fleet.iter().map(|entry| Arc::clone(entry.value())).collect();
        all.sort_by_key(|instance| instance.number());
        all
    }
}

pub fn command_prefix(instance: u8) -> String {
    format!("satpam#{}!", instance)
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Data")
            .field("instance", &self.number())
            .field("fleet_size", &self.fleet.len())
            .field("media", &self.media.is_some())
            .finish_non_exhaustive()
    }
}

pub type Context<'a> = poise::Context<'a, Arc<Data>, crate::bot::error::Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_prefix() {
        assert_eq!(command_prefix(1), "satpam#1!");
        assert_eq!(command_prefix(5), "satpam#5!");
    }
}
