use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serenity::all::ChannelId;
use tokio::sync::broadcast;

use super::assignments::AssignmentTable;
use super::instance::BotInstance;
use super::tier::TierResolver;
use super::timers::{StayTimerRegistry, TimerRecord};

/// Every running instance, keyed by instance number
pub type Fleet = DashMap<u8, Arc<BotInstance>>;

const VACANCY_CAPACITY: usize = 16;

/// State shared by every instance in the fleet.
///
/// Handed to each instance as an `Arc`; the tables only expose their narrow
/// mutation APIs.
#[derive(Debug)]
pub struct Coordinator {
    pub assignments: AssignmentTable,
    pub timers: StayTimerRegistry,
    pub tiers: TierResolver,
    vacancies: broadcast::Sender<u8>,
}

/// Point-in-time copy of the shared tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetSnapshot {
    pub assignments: BTreeMap<ChannelId, u8>,
    pub timers: BTreeMap<ChannelId, TimerRecord>,
    pub timestamp: DateTime<Utc>,
}

impl Coordinator {
    pub fn new(tiers: TierResolver) -> Self {
        let (vacancies, _) = broadcast::channel(VACANCY_CAPACITY);
        Self {
            assignments: AssignmentTable::new(),
            timers: StayTimerRegistry::new(),
            tiers,
            vacancies,
        }
    }

    /// Instance numbers, announced each time an instance gives up a post
    pub fn subscribe_vacancies(&self) -> broadcast::Receiver<u8> {
        self.vacancies.subscribe()
    }

    pub(super) fn announce_vacancy(&self, instance: u8) {
        // No subscribers just means nobody is waiting
        let _ = self.vacancies.send(instance);
    }

    pub fn snapshot(&self) -> FleetSnapshot {
        FleetSnapshot {
            assignments: self.assignments.snapshot(),
            timers: self.timers.snapshot(),
            timestamp: Utc::now(),
        }
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new(TierResolver::default())
    }
}
