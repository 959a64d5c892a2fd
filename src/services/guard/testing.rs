//! In-memory platform doubles for exercising instances without Discord

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use serenity::all::{ChannelId, GuildId};

use super::gateway::{ChannelInfo, ChannelKind, GatewayError, VoiceGateway, VoiceHandle};
use super::notice::{Notice, NotificationSink};

pub fn guild() -> GuildId {
    GuildId::new(1)
}

#[derive(Default)]
pub struct FakeGateway {
    channels: DashMap<ChannelId, ChannelInfo>,
    members: DashMap<ChannelId, usize>,
    denied: DashSet<ChannelId>,
    hang_next: DashSet<ChannelId>,
    open: AtomicUsize,
    aborted: AtomicUsize,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_channel(&self, id: u64, kind: ChannelKind) -> ChannelId {
        let channel_id = ChannelId::new(id);
        self.channels.insert(
            channel_id,
            ChannelInfo {
                id: channel_id,
                guild_id: guild(),
                name: format!("channel-{}", id),
                kind,
            },
        );
        channel_id
    }

    pub fn add_voice(&self, id: u64) -> ChannelId {
        self.add_channel(id, ChannelKind::Voice)
    }

    pub fn set_members(&self, channel_id: ChannelId, count: usize) {
        self.members.insert(channel_id, count);
    }

    pub fn deny(&self, channel_id: ChannelId) {
        self.denied.insert(channel_id);
    }

    /// The next connect to this channel never completes
    pub fn hang_next(&self, channel_id: ChannelId) {
        self.hang_next.insert(channel_id);
    }

    pub fn open_connections(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn aborted(&self) -> usize {
        self.aborted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoiceGateway for FakeGateway {
    async fn fetch_channel(&self, channel_id: ChannelId) -> Result<ChannelInfo, GatewayError> {
        self.channels
            .get(&channel_id)
            .map(|c| c.clone())
            .ok_or(GatewayError::NotFound)
    }

    async fn connect(&self, channel: &ChannelInfo) -> Result<VoiceHandle, GatewayError> {
        if self.hang_next.remove(&channel.id).is_some() {
            return std::future::pending().await;
        }
        if self.denied.contains(&channel.id) {
            return Err(GatewayError::PermissionDenied);
        }

        self.open.fetch_add(1, Ordering::SeqCst);
        Ok(VoiceHandle {
            guild_id: channel.guild_id,
            channel_id: channel.id,
        })
    }

    async fn disconnect(&self, _handle: VoiceHandle) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }

    async fn abort_connect(&self, _channel: &ChannelInfo) {
        self.aborted.fetch_add(1, Ordering::SeqCst);
    }

    async fn live_member_count(&self, channel_id: ChannelId) -> Result<usize, GatewayError> {
        Ok(self.members.get(&channel_id).map(|c| *c).unwrap_or(1))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(ChannelId, Notice)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<(ChannelId, Notice)> {
        self.notices.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify(&self, channel_id: ChannelId, notice: Notice) {
        self.notices.lock().unwrap().push((channel_id, notice));
    }
}
