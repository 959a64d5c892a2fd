use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serenity::all::{ChannelId, UserId};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::constants::timeouts::EXPIRY_WARNING_LEAD;

/// Lifecycle of a live stay timer. Expired and disarmed timers leave the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPhase {
    Armed,
    Warned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEventKind {
    /// Five minutes remain before the instance leaves
    Warning,
    /// The stay has elapsed
    Expired,
}

/// Fired by a countdown task towards the instance that armed it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent {
    pub channel_id: ChannelId,
    pub instance: u8,
    pub generation: u64,
    pub kind: TimerEventKind,
}

/// Serializable view of a timer, as written to snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerRecord {
    pub instance: u8,
    pub user_id: UserId,
    pub stay_until: DateTime<Utc>,
    pub stay_duration_hours: i64,
}

/// What a timer counts down to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    pub instance: u8,
    pub requester: UserId,
    pub stay_duration_hours: i64,
    pub deadline: Instant,
    pub stay_until: DateTime<Utc>,
}

#[derive(Debug)]
struct StayTimer {
    countdown: Countdown,
    phase: TimerPhase,
    generation: u64,
    cancel: CancellationToken,
}

/// Process-wide channel -> stay timer mapping.
///
/// Every timer owns a countdown task holding a cancellation token; disarming
/// or re-arming cancels the task, and each event carries a generation so a
/// callback already in flight for a superseded timer is recognised as stale.
#[derive(Debug, Default)]
pub struct StayTimerRegistry {
    timers: DashMap<ChannelId, StayTimer>,
    next_generation: AtomicU64,
}

impl StayTimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) the countdown for a channel. The returned countdown
    /// carries the absolute deadline, which never moves afterwards.
    pub fn arm(
        &self,
        channel_id: ChannelId,
        instance: u8,
        requester: UserId,
        stay_duration_hours: i64,
        events: mpsc::UnboundedSender<TimerEvent>,
    ) -> Countdown {
        let stay = u64::try_from(stay_duration_hours)
            .map(|hours| Duration::from_secs(hours.saturating_mul(3600)))
            .unwrap_or(Duration::ZERO);

        let countdown = Countdown {
            instance,
            requester,
            stay_duration_hours,
            deadline: Instant::now() + stay,
            stay_until: Utc::now() + chrono::Duration::hours(stay_duration_hours),
        };

        self.schedule(channel_id, countdown, events);
        countdown
    }

    /// Arm a countdown against an existing deadline without moving it
    pub fn schedule(
        &self,
        channel_id: ChannelId,
        countdown: Countdown,
        events: mpsc::UnboundedSender<TimerEvent>,
    ) {
        let now = Instant::now();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();

        let warn_at = countdown
            .deadline
            .checked_sub(EXPIRY_WARNING_LEAD)
            .filter(|at| *at > now);

        let previous = self.timers.insert(
            channel_id,
            StayTimer {
                countdown,
                phase: TimerPhase::Armed,
                generation,
                cancel: cancel.clone(),
            },
        );
        if let Some(previous) = previous {
            previous.cancel.cancel();
            debug!(
                "Replaced stay timer for channel {} (generation {} -> {})",
                channel_id, previous.generation, generation
            );
        }

        let event = |kind| TimerEvent {
            channel_id,
            instance: countdown.instance,
            generation,
            kind,
        };
        let warning = warn_at.map(|at| (at, event(TimerEventKind::Warning)));
        let expiry = (countdown.deadline, event(TimerEventKind::Expired));

        tokio::spawn(run_countdown(warning, expiry, cancel, events));
    }

    /// Cancel the countdown for a channel and drop its entry
    pub fn disarm(&self, channel_id: ChannelId) -> bool {
        match self.timers.remove(&channel_id) {
            Some((_, timer)) => {
                timer.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn remaining(&self, channel_id: ChannelId) -> Option<Duration> {
        self.timers
            .get(&channel_id)
            .map(|timer| timer.countdown.deadline.saturating_duration_since(Instant::now()))
    }

    #[cfg(test)]
    pub(crate) fn phase(&self, channel_id: ChannelId) -> Option<TimerPhase> {
        self.timers.get(&channel_id).map(|timer| timer.phase)
    }

    pub fn countdown(&self, channel_id: ChannelId) -> Option<Countdown> {
        self.timers.get(&channel_id).map(|timer| timer.countdown)
    }

    /// Whether a live countdown task exists for the channel
    pub fn is_armed(&self, channel_id: ChannelId) -> bool {
        self.timers
            .get(&channel_id)
            .map(|timer| !timer.cancel.is_cancelled())
            .unwrap_or(false)
    }

    /// Whether an event belongs to the timer currently registered for its channel
    pub fn is_current(&self, event: &TimerEvent) -> bool {
        self.timers
            .get(&event.channel_id)
            .map(|timer| timer.generation == event.generation)
            .unwrap_or(false)
    }

    /// Move a timer to `Warned`. Returns false for stale events.
    pub fn mark_warned(&self, event: &TimerEvent) -> bool {
        match self.timers.get_mut(&event.channel_id) {
            Some(mut timer) if timer.generation == event.generation => {
                timer.phase = TimerPhase::Warned;
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn snapshot(&self) -> BTreeMap<ChannelId, TimerRecord> {
        self.timers
            .iter()
            .map(|entry| {
                let countdown = entry.value().countdown;
                (
                    *entry.key(),
                    TimerRecord {
                        instance: countdown.instance,
                        user_id: countdown.requester,
                        stay_until: countdown.stay_until,
                        stay_duration_hours: countdown.stay_duration_hours,
                    },
                )
            })
            .collect()
    }
}

async fn run_countdown(
    warning: Option<(Instant, TimerEvent)>,
    expiry: (Instant, TimerEvent),
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<TimerEvent>,
) {
    for (at, event) in warning.into_iter().chain(std::iter::once(expiry)) {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = sleep_until(at) => {}
        }

        if events.send(event).is_err() {
            // Listener is gone; nobody is left to act on the timer
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::error::TryRecvError;
    use tokio::time::sleep;

    const HOUR: Duration = Duration::from_secs(3600);

    fn channel() -> ChannelId {
        ChannelId::new(1001)
    }

    fn user() -> UserId {
        UserId::new(42)
    }

    #[tokio::test(start_paused = true)]
    async fn test_warning_then_expiry() {
        let registry = StayTimerRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        registry.arm(channel(), 1, user(), 1, tx);
        assert_eq!(registry.phase(channel()), Some(TimerPhase::Armed));

        sleep(HOUR - EXPIRY_WARNING_LEAD + Duration::from_secs(1)).await;
        let warning = rx.try_recv().unwrap();
        assert_eq!(warning.kind, TimerEventKind::Warning);
        assert!(registry.mark_warned(&warning));
        assert_eq!(registry.phase(channel()), Some(TimerPhase::Warned));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        sleep(EXPIRY_WARNING_LEAD).await;
        let expired = rx.try_recv().unwrap();
        assert_eq!(expired.kind, TimerEventKind::Expired);
        assert!(registry.is_current(&expired));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_suppresses_callbacks() {
        let registry = StayTimerRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        registry.arm(channel(), 1, user(), 12, tx);
        assert!(registry.disarm(channel()));
        assert!(!registry.is_armed(channel()));

        sleep(13 * HOUR).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Disconnected));
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_deadline() {
        let registry = StayTimerRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        registry.arm(channel(), 1, user(), 1, tx.clone());
        sleep(HOUR / 2).await;
        registry.arm(channel(), 1, user(), 2, tx);
        assert_eq!(registry.len(), 1);

        // Past the first deadline: nothing from the superseded timer
        sleep(HOUR).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        sleep(HOUR + Duration::from_secs(1)).await;
        let warning = rx.try_recv().unwrap();
        let expired = rx.try_recv().unwrap();
        assert_eq!(warning.kind, TimerEventKind::Warning);
        assert_eq!(expired.kind, TimerEventKind::Expired);
        assert!(registry.is_current(&expired));
    }

    #[tokio::test(start_paused = true)]
    async fn test_degenerate_duration_expires_without_warning() {
        let registry = StayTimerRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        registry.arm(channel(), 1, user(), 0, tx);
        // Never fired synchronously from arm
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        sleep(Duration::from_millis(1)).await;
        assert_eq!(rx.try_recv().unwrap().kind, TimerEventKind::Expired);
        assert_eq!(rx.try_recv(), Err(TryRecvError::Disconnected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_countdown_skips_warning() {
        let registry = StayTimerRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let countdown = Countdown {
            instance: 1,
            requester: user(),
            stay_duration_hours: 0,
            deadline: Instant::now() + Duration::from_secs(180),
            stay_until: Utc::now(),
        };
        registry.schedule(channel(), countdown, tx);

        sleep(Duration::from_secs(181)).await;
        assert_eq!(rx.try_recv().unwrap().kind, TimerEventKind::Expired);
        assert_eq!(rx.try_recv(), Err(TryRecvError::Disconnected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_counts_down() {
        let registry = StayTimerRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        registry.arm(channel(), 1, user(), 12, tx);
        sleep(HOUR).await;

        assert_eq!(registry.remaining(channel()), Some(11 * HOUR));
        assert_eq!(registry.remaining(ChannelId::new(7)), None);
    }
}
