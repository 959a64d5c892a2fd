use std::collections::BTreeMap;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serenity::all::ChannelId;

/// Outcome of claiming a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// The channel was free and now belongs to the caller
    Acquired,
    /// The caller already held the channel
    AlreadyHeld,
}

/// Process-wide channel -> instance number mapping.
///
/// Each mutation is a single shard-locked entry operation, so two instances
/// racing for the same channel can never both win.
#[derive(Debug, Default)]
pub struct AssignmentTable {
    owners: DashMap<ChannelId, u8>,
}

impl AssignmentTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomic check-and-set. Fails with the current owner when another
    /// instance holds the channel.
    pub fn try_assign(&self, channel_id: ChannelId, instance: u8) -> Result<Claim, u8> {
        match self.owners.entry(channel_id) {
            Entry::Occupied(entry) => {
                let held_by = *entry.get();
                if held_by == instance {
                    Ok(Claim::AlreadyHeld)
                } else {
                    Err(held_by)
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(instance);
                Ok(Claim::Acquired)
            }
        }
    }

    /// Remove the entry only if `instance` owns it. Returns whether a removal occurred.
    pub fn release(&self, channel_id: ChannelId, instance: u8) -> bool {
        self.owners
            .remove_if(&channel_id, |_, owner| *owner == instance)
            .is_some()
    }

    pub fn owner_of(&self, channel_id: ChannelId) -> Option<u8> {
        self.owners.get(&channel_id).map(|owner| *owner)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Point-in-time copy, ordered by channel for stable output
    pub fn snapshot(&self) -> BTreeMap<ChannelId, u8> {
        self.owners
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect()
    }
}
