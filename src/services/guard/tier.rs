use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serenity::all::RoleId;

use super::member::{MemberProfile, RoleRef};

/// Entitlement class of a requesting member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Booster,
    Donatur,
    Loyalist,
}

/// Fixed record describing a tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierDetails {
    pub name: &'static str,
    pub emoji: &'static str,
    pub stay_duration_hours: i64,
    pub description: &'static str,
    pub requirement: &'static str,
}

const FREE: TierDetails = TierDetails {
    name: "Free User",
    emoji: "🆓",
    stay_duration_hours: 12,
    description: "Default tier for everyone",
    requirement: "Every member gets this tier automatically",
};

const BOOSTER: TierDetails = TierDetails {
    name: "Server Booster",
    emoji: "🚀",
    stay_duration_hours: 36,
    description: "For members boosting the server",
    requirement: "Boost this Discord server",
};

const DONATUR: TierDetails = TierDetails {
    name: "Donatur",
    emoji: "💝",
    stay_duration_hours: 48,
    description: "For members holding a Donatur role",
    requirement: "Hold a Donatur role",
};

const LOYALIST: TierDetails = TierDetails {
    name: "Server Loyalist",
    emoji: "👑",
    stay_duration_hours: 24,
    description: "For members holding a Server Loyalist role",
    requirement: "Hold a Server Loyalist role",
};

impl Tier {
    /// Tiers in resolution priority order
    pub const PRIORITY: [Tier; 4] = [Tier::Booster, Tier::Donatur, Tier::Loyalist, Tier::Free];

    pub fn details(self) -> &'static TierDetails {
        match self {
            Tier::Free => &FREE,
            Tier::Booster => &BOOSTER,
            Tier::Donatur => &DONATUR,
            Tier::Loyalist => &LOYALIST,
        }
    }

    pub fn stay_duration_hours(self) -> i64 {
        self.details().stay_duration_hours
    }

    pub fn key(self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Booster => "booster",
            Tier::Donatur => "donatur",
            Tier::Loyalist => "loyalist",
        }
    }

    /// Parse a tier key, degrading unknown keys to `Free`
    pub fn from_key(key: &str) -> Tier {
        match key.trim().to_ascii_lowercase().as_str() {
            "booster" => Tier::Booster,
            "donatur" => Tier::Donatur,
            "loyalist" => Tier::Loyalist,
            _ => Tier::Free,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let details = self.details();
        write!(f, "{} {}", details.emoji, details.name)
    }
}

/// Role IDs and names that qualify a member for a tier
#[derive(Debug, Clone, Default)]
pub struct RoleMatcher {
    pub ids: HashSet<RoleId>,
    pub names: HashSet<String>,
}

impl RoleMatcher {
    pub fn new(ids: impl IntoIterator<Item = u64>, names: impl IntoIterator<Item = String>) -> Self {
        Self {
            ids: ids.into_iter().map(RoleId::new).collect(),
            names: names.into_iter().collect(),
        }
    }

    /// First role of the member matching by ID, then by name
    fn find<'a>(&self, roles: &'a [RoleRef]) -> Option<&'a RoleRef> {
        roles
            .iter()
            .find(|role| self.ids.contains(&role.id))
            .or_else(|| roles.iter().find(|role| self.names.contains(&role.name)))
    }
}

/// Detailed tier information for a member
#[derive(Debug, Clone, PartialEq)]
pub struct TierInfo {
    pub tier: Tier,
    pub name: &'static str,
    pub stay_duration_hours: i64,
    pub requirement: &'static str,
    pub boost_since: Option<DateTime<Utc>>,
    pub matched_role: Option<String>,
}

/// Maps a member's roles and boost status to a tier.
///
/// Priority: booster > donatur > loyalist > free. Tiers are recomputed on
/// every call and never cached per member.
#[derive(Debug, Clone, Default)]
pub struct TierResolver {
    donatur: RoleMatcher,
    loyalist: RoleMatcher,
}

impl TierResolver {
    pub fn new(donatur: RoleMatcher, loyalist: RoleMatcher) -> Self {
        Self { donatur, loyalist }
    }

    pub fn resolve(&self, member: &MemberProfile) -> Tier {
        if member.premium_since.is_some() {
            Tier::Booster
        } else if self.donatur.find(&member.roles).is_some() {
            Tier::Donatur
        } else if self.loyalist.find(&member.roles).is_some() {
            Tier::Loyalist
        } else {
            Tier::Free
        }
    }

    pub fn stay_duration_hours(&self, member: &MemberProfile) -> i64 {
        self.resolve(member).stay_duration_hours()
    }

    pub fn info(&self, member: &MemberProfile) -> TierInfo {
        let tier = self.resolve(member);
        let details = tier.details();

        let matched_role = match tier {
            Tier::Donatur => self.donatur.find(&member.roles),
            Tier::Loyalist => self.loyalist.find(&member.roles),
            Tier::Free | Tier::Booster => None,
        }
        .map(|role| role.name.clone());

        TierInfo {
            tier,
            name: details.name,
            stay_duration_hours: details.stay_duration_hours,
            requirement: details.requirement,
            boost_since: member.premium_since.filter(|_| tier == Tier::Booster),
            matched_role,
        }
    }
}
