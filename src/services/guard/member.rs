use chrono::{DateTime, Utc};
use serenity::all::{ChannelId, GuildId, RoleId, UserId};

/// A role held by a member, with the name resolved from the guild cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRef {
    pub id: RoleId,
    pub name: String,
}

/// Everything the guard core needs to know about the member issuing a request.
///
/// Built from already-fetched platform data so tier resolution and guarding
/// never perform I/O of their own.
#[derive(Debug, Clone)]
pub struct MemberProfile {
    pub user_id: UserId,
    pub guild_id: GuildId,
    pub display_name: String,
    pub roles: Vec<RoleRef>,
    /// Set while the member is boosting the guild
    pub premium_since: Option<DateTime<Utc>>,
    /// The voice channel the member currently sits in, if any
    pub voice_channel: Option<ChannelId>,
}

impl MemberProfile {
    pub fn new(user_id: UserId, guild_id: GuildId, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            guild_id,
            display_name: display_name.into(),
            roles: Vec::new(),
            premium_since: None,
            voice_channel: None,
        }
    }

    pub fn with_role(mut self, id: u64, name: impl Into<String>) -> Self {
        self.roles.push(RoleRef {
            id: RoleId::new(id),
            name: name.into(),
        });
        self
    }

    pub fn boosting_since(mut self, since: DateTime<Utc>) -> Self {
        self.premium_since = Some(since);
        self
    }

    pub fn in_voice(mut self, channel_id: ChannelId) -> Self {
        self.voice_channel = Some(channel_id);
        self
    }
}
