use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serenity::all::{ChannelId, UserId};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::constants::timeouts::{QUEUE_ENTRY_TTL, QUEUE_WAIT_PER_ENTRY};
use crate::services::guard::{MemberProfile, Tier};

/// A member waiting for any instance to come free
#[derive(Debug, Clone)]
pub struct WaitEntry {
    pub member: MemberProfile,
    pub channel_id: ChannelId,
    /// Tier at the time of asking; re-resolved when the member is served
    pub tier: Tier,
    pub queued_at: DateTime<Utc>,
    enqueued: Instant,
}

impl WaitEntry {
    pub fn user_id(&self) -> UserId {
        self.member.user_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuePosition {
    /// 1-based
    pub position: usize,
    pub total: usize,
    pub estimated_wait: Duration,
}

/// First come, first served. Entries that wait longer than the TTL are
/// dropped instead of served.
#[derive(Debug)]
pub struct WaitQueue {
    entries: Mutex<VecDeque<WaitEntry>>,
    ttl: Duration,
}

impl Default for WaitQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitQueue {
    pub fn new() -> Self {
        Self::with_ttl(QUEUE_ENTRY_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            ttl,
        }
    }

    /// Put a member at the back of the line, replacing any earlier request of theirs
    pub fn enqueue(&self, member: MemberProfile, channel_id: ChannelId, tier: Tier) -> QueuePosition {
        let mut entries = self.lock();
        self.purge_expired(&mut entries);
        entries.retain(|entry| entry.member.user_id != member.user_id);

        debug!(
            "Queued {} for {} ({} waiting)",
            member.user_id,
            channel_id,
            entries.len() + 1
        );

        entries.push_back(WaitEntry {
            member,
            channel_id,
            tier,
            queued_at: Utc::now(),
            enqueued: Instant::now(),
        });

        let total = entries.len();
        QueuePosition {
            position: total,
            total,
            estimated_wait: estimate(total),
        }
    }

    /// Take a member out of the line; false if they were not in it
    pub fn leave(&self, user_id: UserId) -> bool {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|entry| entry.member.user_id != user_id);
        entries.len() != before
    }

    pub fn position(&self, user_id: UserId) -> Option<QueuePosition> {
        let mut entries = self.lock();
        self.purge_expired(&mut entries);

        let idx = entries
            .iter()
            .position(|entry| entry.member.user_id == user_id)?;
        Some(QueuePosition {
            position: idx + 1,
            total: entries.len(),
            estimated_wait: estimate(idx + 1),
        })
    }

    /// Everyone still waiting, front of the line first
    pub fn list(&self) -> Vec<WaitEntry> {
        let mut entries = self.lock();
        self.purge_expired(&mut entries);
        entries.iter().cloned().collect()
    }

    pub fn pop_next(&self) -> Option<WaitEntry> {
        let mut entries = self.lock();
        self.purge_expired(&mut entries);
        entries.pop_front()
    }

    /// Return an entry that could not be served yet to the front of the line.
    /// Its wait window starts over.
    pub fn requeue_front(&self, mut entry: WaitEntry) {
        let mut entries = self.lock();
        entries.retain(|queued| queued.member.user_id != entry.member.user_id);
        entry.enqueued = Instant::now();
        entries.push_front(entry);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<WaitEntry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("wait queue lock poisoned; recovering state");
                poisoned.into_inner()
            }
        }
    }

    fn purge_expired(&self, entries: &mut VecDeque<WaitEntry>) {
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|entry| now.duration_since(entry.enqueued) <= self.ttl);

        let dropped = before - entries.len();
        if dropped > 0 {
            debug!("Dropped {} expired queue entr{}", dropped, if dropped == 1 { "y" } else { "ies" });
        }
    }
}

fn estimate(position: usize) -> Duration {
    let ahead = u32::try_from(position.saturating_sub(1)).unwrap_or(u32::MAX);
    QUEUE_WAIT_PER_ENTRY.saturating_mul(ahead)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::guard::testing::guild;
    use tokio::time::sleep;

    const MINUTE: Duration = Duration::from_secs(60);

    fn member(id: u64) -> MemberProfile {
        MemberProfile::new(UserId::new(id), guild(), format!("member-{}", id))
    }

    #[tokio::test(start_paused = true)]
    async fn test_positions_and_estimates() {
        let queue = WaitQueue::new();

        let first = queue.enqueue(member(1), ChannelId::new(10), Tier::Free);
        let second = queue.enqueue(member(2), ChannelId::new(11), Tier::Booster);

        assert_eq!(first.position, 1);
        assert_eq!(first.estimated_wait, Duration::ZERO);
        assert_eq!(second.position, 2);
        assert_eq!(second.total, 2);
        assert_eq!(second.estimated_wait, 15 * MINUTE);
        assert_eq!(queue.position(UserId::new(1)).map(|p| p.total), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_asking_again_moves_to_the_back() {
        let queue = WaitQueue::new();
        queue.enqueue(member(1), ChannelId::new(10), Tier::Free);
        queue.enqueue(member(2), ChannelId::new(11), Tier::Free);

        let again = queue.enqueue(member(1), ChannelId::new(12), Tier::Free);

        assert_eq!(again.position, 2);
        assert_eq!(queue.len(), 2);
        let next = queue.pop_next().unwrap();
        assert_eq!(next.user_id(), UserId::new(2));
        assert_eq!(queue.pop_next().unwrap().channel_id, ChannelId::new(12));
    }

    #[tokio::test(start_paused = true)]
    async fn test_leave_closes_the_gap() {
        let queue = WaitQueue::new();
        for id in 1..=3 {
            queue.enqueue(member(id), ChannelId::new(10 + id), Tier::Free);
        }

        assert!(queue.leave(UserId::new(2)));
        assert!(!queue.leave(UserId::new(2)));

        let third = queue.position(UserId::new(3)).unwrap();
        assert_eq!(third.position, 2);
        assert_eq!(third.total, 2);
        assert_eq!(queue.position(UserId::new(2)), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_entries_are_dropped() {
        let queue = WaitQueue::new();
        queue.enqueue(member(1), ChannelId::new(10), Tier::Free);
        sleep(3 * MINUTE).await;
        queue.enqueue(member(2), ChannelId::new(11), Tier::Free);
        sleep(3 * MINUTE).await;

        let waiting = queue.list();
        assert_eq!(waiting.len(), 1);
        assert_eq!(waiting[0].user_id(), UserId::new(2));
        assert_eq!(queue.position(UserId::new(2)).map(|p| p.position), Some(1));

        sleep(3 * MINUTE).await;
        assert!(queue.pop_next().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_requeue_front_restarts_the_wait() {
        let queue = WaitQueue::new();
        queue.enqueue(member(1), ChannelId::new(10), Tier::Free);
        queue.enqueue(member(2), ChannelId::new(11), Tier::Free);
        sleep(4 * MINUTE).await;

        let next = queue.pop_next().unwrap();
        queue.requeue_front(next);
        sleep(2 * MINUTE).await;

        let waiting = queue.list();
        assert_eq!(waiting.len(), 1);
        assert_eq!(waiting[0].user_id(), UserId::new(1));
    }
}
