use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serenity::all::{ChannelId, UserId};
use tokio::sync::{mpsc, Mutex};
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use super::assignments::Claim;
use super::coordinator::Coordinator;
use super::error::GuardError;
use super::gateway::{ChannelInfo, VoiceGateway, VoiceHandle};
use super::member::MemberProfile;
use super::notice::{Notice, NotificationSink};
use super::tier::Tier;
use super::timers::{Countdown, TimerEvent, TimerEventKind};
use crate::constants::timeouts::{format_duration, EXPIRY_WARNING_LEAD, VOICE_CONNECT_TIMEOUT};

/// Where an instance currently is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presence {
    /// No voice connection (startup, or between leaving a post and reaching idle)
    Disconnected,
    /// Parked in the configured idle channel
    Idle { channel_id: ChannelId },
    /// Holding a channel for a member
    Guarding {
        channel_id: ChannelId,
        tier: Tier,
        countdown: Countdown,
    },
}

impl Presence {
    pub fn guarded_channel(&self) -> Option<ChannelId> {
        match self {
            Presence::Guarding { channel_id, .. } => Some(*channel_id),
            _ => None,
        }
    }

    pub fn current_channel(&self) -> Option<ChannelId> {
        match self {
            Presence::Disconnected => None,
            Presence::Idle { channel_id } | Presence::Guarding { channel_id, .. } => {
                Some(*channel_id)
            }
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Presence::Idle { .. })
    }
}

/// Result of a successful guard request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardOutcome {
    pub channel_id: ChannelId,
    pub tier: Tier,
    pub stay_duration_hours: i64,
    pub stay_until: DateTime<Utc>,
    /// The instance already held the channel and only restarted the countdown
    pub refreshed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceStatus {
    Disconnected,
    Idle {
        channel_id: ChannelId,
    },
    Guarding {
        channel_id: ChannelId,
        requester: UserId,
        tier: Tier,
        /// Members other than the bot
        occupants: usize,
        remaining: Duration,
        stay_until: DateTime<Utc>,
    },
}

/// Private voice state of one instance. Only that instance ever touches it.
#[derive(Debug)]
pub(super) struct VoiceSlot {
    pub(super) presence: Presence,
    pub(super) connection: Option<VoiceHandle>,
}

/// One bot identity of the fleet: owns a voice connection and guards at most
/// one channel at a time.
pub struct BotInstance {
    number: u8,
    idle_channel: Option<ChannelId>,
    gateway: Arc<dyn VoiceGateway>,
    notifier: Arc<dyn NotificationSink>,
    pub(super) coordinator: Arc<Coordinator>,
    pub(super) slot: Mutex<VoiceSlot>,
    pub(super) timer_tx: mpsc::UnboundedSender<TimerEvent>,
}

impl BotInstance {
    pub fn new(
        number: u8,
        idle_channel: Option<ChannelId>,
        gateway: Arc<dyn VoiceGateway>,
        notifier: Arc<dyn NotificationSink>,
        coordinator: Arc<Coordinator>,
    ) -> Arc<Self> {
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();

        let instance = Arc::new(Self {
            number,
            idle_channel,
            gateway,
            notifier,
            coordinator,
            slot: Mutex::new(VoiceSlot {
                presence: Presence::Disconnected,
                connection: None,
            }),
            timer_tx,
        });

        tokio::spawn(listen_for_timers(Arc::downgrade(&instance), timer_rx));
        instance
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn idle_channel(&self) -> Option<ChannelId> {
        self.idle_channel
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    pub async fn presence(&self) -> Presence {
        self.slot.lock().await.presence.clone()
    }

    /// Move to the configured idle channel. Never called while guarding.
    pub async fn join_idle(&self) -> Result<ChannelId, GuardError> {
        let mut slot = self.slot.lock().await;

        if let Some(channel_id) = slot.presence.guarded_channel() {
            debug!(
                "Bot #{}: not joining idle channel while guarding {}",
                self.number, channel_id
            );
            return Ok(channel_id);
        }

        self.join_idle_locked(&mut slot).await
    }

    /// Join a channel on a member's behalf and start the stay countdown.
    /// An instance already guarding elsewhere gives that post up first.
    pub async fn guard(
        &self,
        channel: Option<ChannelId>,
        member: &MemberProfile,
    ) -> Result<GuardOutcome, GuardError> {
        self.guard_with(channel, member, true).await
    }

    /// Guard a channel for a member who waited in the queue. Never abandons a
    /// post: a busy instance answers `GuardError::Busy`.
    pub async fn serve_queued(
        &self,
        channel_id: ChannelId,
        member: &MemberProfile,
    ) -> Result<GuardOutcome, GuardError> {
        let outcome = self.guard_with(Some(channel_id), member, false).await?;

        self.notifier
            .notify(
                channel_id,
                Notice::QueueReady {
                    instance: self.number,
                    requester: member.user_id,
                },
            )
            .await;

        Ok(outcome)
    }

    /// Not guarding anything, so free to take a request
    pub async fn is_free(&self) -> bool {
        self.slot.lock().await.presence.guarded_channel().is_none()
    }

    async fn guard_with(
        &self,
        channel: Option<ChannelId>,
        member: &MemberProfile,
        may_move: bool,
    ) -> Result<GuardOutcome, GuardError> {
        let channel_id = channel
            .or(member.voice_channel)
            .ok_or(GuardError::NotInVoiceChannel)?;

        // Cheap early rejection; the authoritative check is try_assign below
        if let Some(held_by) = self
            .coordinator
            .assignments
            .owner_of(channel_id)
            .filter(|owner| *owner != self.number)
        {
            return Err(GuardError::AssignmentConflict {
                channel_id,
                held_by,
            });
        }

        let info = self.fetch_voice_channel(channel_id).await?;
        let tier = self.coordinator.tiers.resolve(member);
        let hours = tier.stay_duration_hours();

        let mut slot = self.slot.lock().await;

        if let Some(current) = slot.presence.guarded_channel() {
            if !may_move && current != channel_id {
                return Err(GuardError::Busy {
                    instance: self.number,
                    channel_id: current,
                });
            }
        }

        let claim = self
            .coordinator
            .assignments
            .try_assign(channel_id, self.number)
            .map_err(|held_by| GuardError::AssignmentConflict {
                channel_id,
                held_by,
            })?;

        let already_here = slot.presence.guarded_channel() == Some(channel_id)
            && slot.connection.is_some();

        if claim == Claim::AlreadyHeld && already_here {
            let countdown = self.coordinator.timers.arm(
                channel_id,
                self.number,
                member.user_id,
                hours,
                self.timer_tx.clone(),
            );
            slot.presence = Presence::Guarding {
                channel_id,
                tier,
                countdown,
            };

            info!(
                "Bot #{}: refreshed guard of {} for {} ({} hours)",
                self.number, channel_id, member.user_id, hours
            );

            return Ok(GuardOutcome {
                channel_id,
                tier,
                stay_duration_hours: hours,
                stay_until: countdown.stay_until,
                refreshed: true,
            });
        }

        if let Some(previous) = slot.presence.guarded_channel() {
            if previous != channel_id {
                info!(
                    "Bot #{}: leaving {} to guard {}",
                    self.number, previous, channel_id
                );
                self.release_post(previous);
            }
        }

        self.drop_connection(&mut slot).await;

        let handle = match self.connect_bounded(&info).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(
                    "Bot #{}: failed to join {} ({}): {}",
                    self.number, info.name, channel_id, e
                );
                self.release_post(channel_id);

                if self.idle_channel.is_some() {
                    if let Err(idle_err) = self.join_idle_locked(&mut slot).await {
                        warn!(
                            "Bot #{}: could not return to idle channel: {}",
                            self.number, idle_err
                        );
                    }
                }
                return Err(e);
            }
        };

        slot.connection = Some(handle);

        let countdown = self.coordinator.timers.arm(
            channel_id,
            self.number,
            member.user_id,
            hours,
            self.timer_tx.clone(),
        );
        slot.presence = Presence::Guarding {
            channel_id,
            tier,
            countdown,
        };
        drop(slot);

        info!(
            "Bot #{}: guarding {} for {} as {:?} until {}",
            self.number, channel_id, member.user_id, tier, countdown.stay_until
        );

        self.notifier
            .notify(
                channel_id,
                Notice::Guarding {
                    instance: self.number,
                    requester: member.user_id,
                    tier,
                    stay_duration_hours: hours,
                },
            )
            .await;

        Ok(GuardOutcome {
            channel_id,
            tier,
            stay_duration_hours: hours,
            stay_until: countdown.stay_until,
            refreshed: false,
        })
    }

    /// Stop guarding a channel on a member's request
    pub async fn unguard(
        &self,
        channel: Option<ChannelId>,
        member: &MemberProfile,
    ) -> Result<ChannelId, GuardError> {
        let channel_id = channel
            .or(member.voice_channel)
            .ok_or(GuardError::NotInVoiceChannel)?;

        let mut slot = self.slot.lock().await;

        match self.coordinator.assignments.owner_of(channel_id) {
            None => return Err(GuardError::NotGuarded(channel_id)),
            Some(held_by) if held_by != self.number => {
                return Err(GuardError::AssignmentConflict {
                    channel_id,
                    held_by,
                })
            }
            Some(_) => {}
        }

        if slot.presence.guarded_channel() != Some(channel_id) {
            // Table entry without a matching post; clear it rather than leave it dangling
            warn!(
                "Bot #{}: assignment for {} had no matching post, releasing",
                self.number, channel_id
            );
            self.release_post(channel_id);
            return Err(GuardError::NotGuarded(channel_id));
        }

        self.leave_post(&mut slot).await;
        drop(slot);

        info!(
            "Bot #{}: dismissed from {} by {}",
            self.number, channel_id, member.user_id
        );

        self.notifier
            .notify(
                channel_id,
                Notice::Dismissed {
                    instance: self.number,
                    by: member.user_id,
                },
            )
            .await;

        Ok(channel_id)
    }

    /// Leave whatever this instance is doing and head back to idle
    pub async fn disconnect(&self) {
        let mut slot = self.slot.lock().await;
        self.leave_post(&mut slot).await;
    }

    /// Leave everything for process shutdown; does not rejoin idle
    pub async fn shutdown(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(channel_id) = slot.presence.guarded_channel() {
            self.release_post(channel_id);
        }
        self.drop_connection(&mut slot).await;
        info!("Bot #{}: shut down", self.number);
    }

    pub async fn status(&self) -> InstanceStatus {
        let slot = self.slot.lock().await;

        match &slot.presence {
            Presence::Disconnected => InstanceStatus::Disconnected,
            Presence::Idle { channel_id } => InstanceStatus::Idle {
                channel_id: *channel_id,
            },
            Presence::Guarding {
                channel_id,
                tier,
                countdown,
            } => {
                let occupants = match self.gateway.live_member_count(*channel_id).await {
                    Ok(count) => count.saturating_sub(1),
                    Err(e) => {
                        debug!("Bot #{}: member count unavailable: {}", self.number, e);
                        0
                    }
                };
                let remaining = self
                    .coordinator
                    .timers
                    .remaining(*channel_id)
                    .unwrap_or_else(|| countdown.deadline.saturating_duration_since(Instant::now()));

                InstanceStatus::Guarding {
                    channel_id: *channel_id,
                    requester: countdown.requester,
                    tier: *tier,
                    occupants,
                    remaining,
                    stay_until: countdown.stay_until,
                }
            }
        }
    }

    pub(super) async fn handle_timer_event(&self, event: TimerEvent) {
        match event.kind {
            TimerEventKind::Warning => {
                if !self.coordinator.timers.mark_warned(&event) {
                    debug!("Bot #{}: stale warning for {}", self.number, event.channel_id);
                    return;
                }
                let Some(countdown) = self.coordinator.timers.countdown(event.channel_id) else {
                    return;
                };

                info!(
                    "Bot #{}: {} until leaving {}",
                    self.number,
                    format_duration(EXPIRY_WARNING_LEAD),
                    event.channel_id
                );

                self.notifier
                    .notify(
                        event.channel_id,
                        Notice::ExpiryWarning {
                            instance: self.number,
                            requester: countdown.requester,
                            minutes_remaining: EXPIRY_WARNING_LEAD.as_secs() / 60,
                        },
                    )
                    .await;
            }
            TimerEventKind::Expired => {
                let mut slot = self.slot.lock().await;

                // Checked under the slot lock so a concurrent re-arm wins
                if !self.coordinator.timers.is_current(&event) {
                    debug!("Bot #{}: stale expiry for {}", self.number, event.channel_id);
                    return;
                }

                let requester = match &slot.presence {
                    Presence::Guarding {
                        channel_id,
                        countdown,
                        ..
                    } if *channel_id == event.channel_id => countdown.requester,
                    _ => {
                        warn!(
                            "Bot #{}: timer for {} outlived its post, clearing",
                            self.number, event.channel_id
                        );
                        self.release_post(event.channel_id);
                        return;
                    }
                };

                info!("Bot #{}: stay in {} expired", self.number, event.channel_id);
                self.leave_post(&mut slot).await;
                drop(slot);

                self.notifier
                    .notify(
                        event.channel_id,
                        Notice::Expired {
                            instance: self.number,
                            requester,
                        },
                    )
                    .await;
            }
        }
    }

    /// Restart the countdown for a guarded channel if it is not running.
    /// Never moves the deadline.
    pub(super) fn ensure_countdown(&self, slot: &VoiceSlot, channel_id: ChannelId) -> bool {
        if self.coordinator.timers.is_armed(channel_id) {
            debug!(
                "Bot #{}: countdown for {} already running",
                self.number, channel_id
            );
            return false;
        }

        match &slot.presence {
            Presence::Guarding {
                channel_id: guarded,
                countdown,
                ..
            } if *guarded == channel_id => {
                info!(
                    "Bot #{}: resuming countdown for {} (until {})",
                    self.number, channel_id, countdown.stay_until
                );
                self.coordinator
                    .timers
                    .schedule(channel_id, *countdown, self.timer_tx.clone());
                true
            }
            _ => false,
        }
    }

    pub(super) async fn live_member_count(&self, channel_id: ChannelId) -> Option<usize> {
        match self.gateway.live_member_count(channel_id).await {
            Ok(count) => Some(count),
            Err(e) => {
                warn!(
                    "Bot #{}: could not count members in {}: {}",
                    self.number, channel_id, e
                );
                None
            }
        }
    }

    async fn join_idle_locked(&self, slot: &mut VoiceSlot) -> Result<ChannelId, GuardError> {
        let idle = self
            .idle_channel
            .ok_or_else(|| GuardError::Unknown("No idle channel configured".to_string()))?;

        if slot.presence == (Presence::Idle { channel_id: idle }) && slot.connection.is_some() {
            return Ok(idle);
        }

        let result = match self.fetch_voice_channel(idle).await {
            Ok(info) => {
                self.drop_connection(slot).await;
                self.connect_bounded(&info).await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(handle) => {
                slot.connection = Some(handle);
                slot.presence = Presence::Idle { channel_id: idle };
                info!("Bot #{}: joined idle channel {}", self.number, idle);
                Ok(idle)
            }
            Err(e) => {
                warn!(
                    "Bot #{}: could not join idle channel {}: {}",
                    self.number, idle, e
                );
                Err(e)
            }
        }
    }

    async fn fetch_voice_channel(&self, channel_id: ChannelId) -> Result<ChannelInfo, GuardError> {
        let info = self
            .gateway
            .fetch_channel(channel_id)
            .await
            .map_err(|e| GuardError::from_gateway(channel_id, e))?;

        if !info.kind.is_joinable() {
            return Err(GuardError::WrongType(channel_id));
        }
        Ok(info)
    }

    async fn connect_bounded(&self, channel: &ChannelInfo) -> Result<VoiceHandle, GuardError> {
        match timeout(VOICE_CONNECT_TIMEOUT, self.gateway.connect(channel)).await {
            Ok(Ok(handle)) => Ok(handle),
            Ok(Err(e)) => {
                self.gateway.abort_connect(channel).await;
                Err(GuardError::from_gateway(channel.id, e))
            }
            Err(_) => {
                self.gateway.abort_connect(channel).await;
                Err(GuardError::ConnectionTimeout(channel.id))
            }
        }
    }

    /// Give up the current post and, if configured, go back to idle
    async fn leave_post(&self, slot: &mut VoiceSlot) {
        if let Some(channel_id) = slot.presence.guarded_channel() {
            self.release_post(channel_id);
        }
        self.drop_connection(slot).await;

        if self.idle_channel.is_some() {
            // Failure leaves the instance disconnected; logged by join_idle_locked
            let _ = self.join_idle_locked(slot).await;
        }

        self.coordinator.announce_vacancy(self.number);
    }

    /// Disarm the timer and release the assignment for a channel
    fn release_post(&self, channel_id: ChannelId) {
        // Only touch the timer if it is ours
        if self
            .coordinator
            .timers
            .countdown(channel_id)
            .is_some_and(|countdown| countdown.instance == self.number)
        {
            self.coordinator.timers.disarm(channel_id);
        }
        self.coordinator.assignments.release(channel_id, self.number);
    }

    async fn drop_connection(&self, slot: &mut VoiceSlot) {
        if let Some(handle) = slot.connection.take() {
            self.gateway.disconnect(handle).await;
        }
        slot.presence = Presence::Disconnected;
    }
}

async fn listen_for_timers(instance: Weak<BotInstance>, mut events: mpsc::UnboundedReceiver<TimerEvent>) {
    while let Some(event) = events.recv().await {
        let Some(instance) = instance.upgrade() else {
            break;
        };
        instance.handle_timer_event(event).await;
    }
}
