use std::sync::Arc;

use serenity::all::ChannelId;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::wait::{QueuePosition, WaitEntry, WaitQueue};
use crate::services::guard::{BotInstance, Coordinator, Fleet, GuardError, GuardOutcome, MemberProfile};
use crate::services::stats::{CallRecord, StatsStore};

/// How a guard request is routed given what the rest of the fleet is doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The asked instance handles it (or answers with a precise error)
    Serve,
    /// The asked instance is busy, but this one is free
    Redirect(u8),
    /// Every instance is busy; the member now waits in line
    Queued(QueuePosition),
}

fn instances(fleet: &Fleet) -> Vec<Arc<BotInstance>> {
    let mut all: Vec<Arc<BotInstance>> = fleet.iter().map(|e| Arc::clone(e.value())).collect();
    all.sort_by_key(|instance| instance.number());
    all
}

/// Decide whether `asked` should take a guard request itself.
///
/// A busy instance is never pulled off its post by a new request: the member
/// is pointed at a free instance, or queued when there is none.
pub async fn admit(
    queue: &WaitQueue,
    fleet: &Fleet,
    asked: &BotInstance,
    channel: Option<ChannelId>,
    member: &MemberProfile,
) -> Admission {
    let Some(channel_id) = channel.or(member.voice_channel) else {
        return Admission::Serve;
    };

    // Already guarded: a refresh or a conflict, both answered by guard itself
    if asked.coordinator().assignments.owner_of(channel_id).is_some() || asked.is_free().await {
        return Admission::Serve;
    }

    for other in instances(fleet) {
        if other.number() != asked.number() && other.is_free().await {
            return Admission::Redirect(other.number());
        }
    }

    let tier = asked.coordinator().tiers.resolve(member);
    let position = queue.enqueue(member.clone(), channel_id, tier);
    info!(
        "All bots busy; {} queued for {} at position {}",
        member.user_id, channel_id, position.position
    );
    Admission::Queued(position)
}

/// Hand the longest-waiting member to an instance that just came free
pub async fn dispatch_next(
    queue: &WaitQueue,
    instance: &BotInstance,
) -> Option<(WaitEntry, GuardOutcome)> {
    while let Some(entry) = queue.pop_next() {
        match instance.serve_queued(entry.channel_id, &entry.member).await {
            Ok(outcome) => {
                info!(
                    "Bot #{}: served {} from the queue in {}",
                    instance.number(),
                    entry.user_id(),
                    entry.channel_id
                );
                return Some((entry, outcome));
            }
            Err(e @ (GuardError::Busy { .. } | GuardError::ConnectionTimeout(_) | GuardError::Unknown(_))) => {
                debug!(
                    "Bot #{}: could not serve {} yet: {}",
                    instance.number(),
                    entry.user_id(),
                    e
                );
                queue.requeue_front(entry);
                return None;
            }
            Err(e) => {
                warn!(
                    "Bot #{}: dropping queued request of {} for {}: {}",
                    instance.number(),
                    entry.user_id(),
                    entry.channel_id,
                    e
                );
            }
        }
    }
    None
}

/// Serve the queue each time an instance gives up a post, until cancelled
pub fn spawn_queue_dispatcher(
    queue: Arc<WaitQueue>,
    fleet: Arc<Fleet>,
    coordinator: &Coordinator,
    stats: Arc<StatsStore>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let mut vacancies = coordinator.subscribe_vacancies();

    tokio::spawn(async move {
        loop {
            let number = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = vacancies.recv() => match event {
                    Ok(number) => number,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Queue dispatcher missed {} vacancies", skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
            };

            if queue.is_empty() {
                continue;
            }

            let Some(instance) = fleet.get(&number).map(|e| Arc::clone(e.value())) else {
                continue;
            };

            let Some((entry, outcome)) = dispatch_next(&queue, &instance).await else {
                continue;
            };

            let record = CallRecord {
                user_id: entry.user_id(),
                instance: number,
                channel_id: outcome.channel_id,
                tier: outcome.tier,
                stay_duration_hours: outcome.stay_duration_hours,
            };
            if let Err(e) = stats.record_call(record).await {
                warn!("Bot #{}: failed to record statistics: {}", number, e);
            }
        }

        debug!("Queue dispatcher stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use dashmap::DashMap;
    use serenity::all::UserId;
    use tokio::time::sleep;

    use crate::services::guard::testing::{guild, FakeGateway, RecordingNotifier};
    use crate::services::guard::{Notice, Presence, Tier};

    const HOUR: Duration = Duration::from_secs(3600);
    const SETTLE: Duration = Duration::from_millis(100);

    struct Harness {
        gateway: Arc<FakeGateway>,
        notifier: Arc<RecordingNotifier>,
        coordinator: Arc<Coordinator>,
        fleet: Arc<Fleet>,
        queue: Arc<WaitQueue>,
        idle: ChannelId,
        v1: ChannelId,
        v2: ChannelId,
        v3: ChannelId,
    }

    impl Harness {
        fn new() -> Self {
            let gateway = Arc::new(FakeGateway::new());
            Self {
                idle: gateway.add_voice(900),
                v1: gateway.add_voice(1001),
                v2: gateway.add_voice(1002),
                v3: gateway.add_voice(1003),
                gateway,
                notifier: Arc::new(RecordingNotifier::new()),
                coordinator: Arc::new(Coordinator::default()),
                fleet: Arc::new(DashMap::new()),
                queue: Arc::new(WaitQueue::new()),
            }
        }

        fn instance(&self, number: u8) -> Arc<BotInstance> {
            let instance = BotInstance::new(
                number,
                Some(self.idle),
                self.gateway.clone(),
                self.notifier.clone(),
                self.coordinator.clone(),
            );
            self.fleet.insert(number, Arc::clone(&instance));
            instance
        }

        async fn admit(&self, asked: &BotInstance, channel: ChannelId, id: u64) -> Admission {
            admit(&self.queue, &self.fleet, asked, Some(channel), &member(id)).await
        }
    }

    fn member(id: u64) -> MemberProfile {
        MemberProfile::new(UserId::new(id), guild(), format!("member-{}", id))
    }

    async fn stats_in(dir: &tempfile::TempDir) -> Arc<StatsStore> {
        Arc::new(StatsStore::open(dir.path().join("statistics.json")).await)
    }

    #[tokio::test(start_paused = true)]
    async fn test_free_instance_serves_directly() {
        let h = Harness::new();
        let bot = h.instance(1);
        bot.join_idle().await.unwrap();

        assert_eq!(h.admit(&bot, h.v1, 10).await, Admission::Serve);
        assert!(h.queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_instance_points_at_a_free_one() {
        let h = Harness::new();
        let first = h.instance(1);
        let second = h.instance(2);
        second.join_idle().await.unwrap();
        first.guard(Some(h.v1), &member(10)).await.unwrap();

        assert_eq!(h.admit(&first, h.v2, 11).await, Admission::Redirect(2));
        assert!(h.queue.is_empty());
        assert_eq!(first.presence().await.guarded_channel(), Some(h.v1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_is_never_queued() {
        let h = Harness::new();
        let bot = h.instance(1);
        bot.guard(Some(h.v1), &member(10)).await.unwrap();

        assert_eq!(h.admit(&bot, h.v1, 10).await, Admission::Serve);
        assert!(h.queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_fleet_queues_request() {
        let h = Harness::new();
        let first = h.instance(1);
        let second = h.instance(2);
        first.guard(Some(h.v1), &member(10)).await.unwrap();
        second.guard(Some(h.v2), &member(11)).await.unwrap();

        let Admission::Queued(position) = h.admit(&first, h.v3, 12).await else {
            panic!("expected the request to be queued");
        };
        assert_eq!(position.position, 1);
        assert_eq!(position.estimated_wait, Duration::ZERO);

        let v4 = h.gateway.add_voice(1004);
        let Admission::Queued(position) = h.admit(&second, v4, 13).await else {
            panic!("expected the request to be queued");
        };
        assert_eq!(position.position, 2);
        assert_eq!(position.estimated_wait, Duration::from_secs(15 * 60));

        // Nobody was pulled off their post
        assert_eq!(first.presence().await.guarded_channel(), Some(h.v1));
        assert_eq!(second.presence().await.guarded_channel(), Some(h.v2));
        assert_eq!(h.coordinator.assignments.owner_of(h.v3), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismissal_hands_instance_to_next_in_line() {
        let h = Harness::new();
        let dir = tempfile::tempdir().unwrap();
        let stats = stats_in(&dir).await;
        let bot = h.instance(1);
        bot.guard(Some(h.v1), &member(10)).await.unwrap();
        assert!(matches!(h.admit(&bot, h.v2, 11).await, Admission::Queued(_)));

        let shutdown = CancellationToken::new();
        let dispatcher = spawn_queue_dispatcher(
            h.queue.clone(),
            h.fleet.clone(),
            &h.coordinator,
            stats.clone(),
            shutdown.clone(),
        );

        bot.unguard(Some(h.v1), &member(10)).await.unwrap();
        sleep(SETTLE).await;

        assert_eq!(bot.presence().await.guarded_channel(), Some(h.v2));
        assert_eq!(h.coordinator.assignments.owner_of(h.v2), Some(1));
        assert_eq!(h.coordinator.assignments.owner_of(h.v1), None);
        assert!(h.queue.is_empty());
        assert_eq!(h.gateway.open_connections(), 1);
        assert!(h.notifier.notices().iter().any(|(channel, notice)| {
            *channel == h.v2
                && *notice
                    == Notice::QueueReady {
                        instance: 1,
                        requester: UserId::new(11),
                    }
        }));
        assert_eq!(stats.user_stats(UserId::new(11)).await.map(|s| s.total_calls), Some(1));

        shutdown.cancel();
        dispatcher.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_hands_instance_to_next_in_line() {
        let h = Harness::new();
        let dir = tempfile::tempdir().unwrap();
        let bot = h.instance(1);
        bot.guard(Some(h.v1), &member(10)).await.unwrap();

        let shutdown = CancellationToken::new();
        let _dispatcher = spawn_queue_dispatcher(
            h.queue.clone(),
            h.fleet.clone(),
            &h.coordinator,
            stats_in(&dir).await,
            shutdown.clone(),
        );

        // Ask shortly before the stay runs out so the entry is still fresh
        sleep(12 * HOUR - Duration::from_secs(60)).await;
        assert!(matches!(h.admit(&bot, h.v2, 11).await, Admission::Queued(_)));

        sleep(Duration::from_secs(61)).await;
        sleep(SETTLE).await;

        match bot.presence().await {
            Presence::Guarding { channel_id, countdown, .. } => {
                assert_eq!(channel_id, h.v2);
                assert_eq!(countdown.requester, UserId::new(11));
            }
            other => panic!("expected guarding, got {:?}", other),
        }
        assert!(h.queue.is_empty());
        shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_channels_are_skipped() {
        let h = Harness::new();
        let bot = h.instance(1);
        bot.join_idle().await.unwrap();

        h.queue.enqueue(member(10), ChannelId::new(4242), Tier::Free);
        h.queue.enqueue(member(11), h.v2, Tier::Free);

        let (entry, outcome) = dispatch_next(&h.queue, &bot).await.unwrap();
        assert_eq!(entry.user_id(), UserId::new(11));
        assert_eq!(outcome.channel_id, h.v2);
        assert!(h.queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_instance_keeps_entry_at_front() {
        let h = Harness::new();
        let bot = h.instance(1);
        bot.guard(Some(h.v1), &member(10)).await.unwrap();
        h.queue.enqueue(member(11), h.v2, Tier::Free);

        assert!(dispatch_next(&h.queue, &bot).await.is_none());

        assert_eq!(bot.presence().await.guarded_channel(), Some(h.v1));
        assert_eq!(h.queue.position(UserId::new(11)).map(|p| p.position), Some(1));
    }
}
