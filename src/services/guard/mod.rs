//! Channel guarding: who guards what, for how long, and what happens when the time runs out

pub mod assignments;
pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod instance;
pub mod member;
pub mod notice;
pub mod presence;
pub mod tier;
pub mod timers;

#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::{Coordinator, Fleet, FleetSnapshot};
pub use error::GuardError;
pub use gateway::{ChannelInfo, ChannelKind, GatewayError, VoiceGateway, VoiceHandle};
pub use instance::{BotInstance, GuardOutcome, InstanceStatus, Presence};
pub use member::MemberProfile;
pub use notice::{Notice, NotificationSink};
pub use presence::PresenceChange;
pub use tier::{RoleMatcher, Tier, TierInfo, TierResolver};
