use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serenity::all::{ChannelId, UserId};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::bot::error::Error;
use crate::services::guard::Tier;

/// One successful guard request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallRecord {
    pub user_id: UserId,
    pub instance: u8,
    pub channel_id: ChannelId,
    pub tier: Tier,
    pub stay_duration_hours: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub total_calls: u64,
    pub total_hours: i64,
    /// Calls per tier key
    #[serde(default)]
    pub tier_usage: BTreeMap<String, u64>,
    pub last_used: Option<DateTime<Utc>>,
}

/// Call count and hours for a bot instance or a channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageTotals {
    pub total_calls: u64,
    pub total_hours: i64,
    pub last_used: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub user_id: UserId,
    pub total_calls: u64,
    pub total_hours: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StatsData {
    #[serde(default)]
    users: BTreeMap<UserId, UserStats>,
    #[serde(default)]
    bots: BTreeMap<u8, UsageTotals>,
    #[serde(default)]
    channels: BTreeMap<ChannelId, UsageTotals>,
}

impl UsageTotals {
    fn add(&mut self, hours: i64, at: DateTime<Utc>) {
        self.total_calls += 1;
        self.total_hours += hours;
        self.last_used = Some(at);
    }
}

/// Usage statistics, kept in memory and written through to a JSON file
#[derive(Debug)]
pub struct StatsStore {
    path: PathBuf,
    data: Mutex<StatsData>,
}

impl StatsStore {
    /// Load the statistics file, starting empty when it is missing or unreadable
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let data = match fs::read(&path).await {
            Ok(raw) => serde_json::from_slice(&raw).unwrap_or_else(|e| {
                warn!(
                    "Statistics file {} is malformed ({}), starting fresh",
                    path.display(),
                    e
                );
                StatsData::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StatsData::default(),
            Err(e) => {
                warn!("Could not read {}: {}, starting fresh", path.display(), e);
                StatsData::default()
            }
        };

        Self {
            path,
            data: Mutex::new(data),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn record_call(&self, call: CallRecord) -> Result<(), Error> {
        let now = Utc::now();
        let mut data = self.data.lock().await;

        let user = data.users.entry(call.user_id).or_default();
        user.total_calls += 1;
        user.total_hours += call.stay_duration_hours;
        *user.tier_usage.entry(call.tier.key().to_string()).or_default() += 1;
        user.last_used = Some(now);

        data.bots
            .entry(call.instance)
            .or_default()
            .add(call.stay_duration_hours, now);
        data.channels
            .entry(call.channel_id)
            .or_default()
            .add(call.stay_duration_hours, now);

        self.persist(&data).await
    }

    pub async fn user_stats(&self, user_id: UserId) -> Option<UserStats> {
        self.data.lock().await.users.get(&user_id).cloned()
    }

    pub async fn bot_stats(&self, instance: u8) -> Option<UsageTotals> {
        self.data.lock().await.bots.get(&instance).cloned()
    }

    pub async fn channel_stats(&self, channel_id: ChannelId) -> Option<UsageTotals> {
        self.data.lock().await.channels.get(&channel_id).cloned()
    }

    /// Users ordered by total calls, ties broken by total hours
    pub async fn leaderboard(&self, limit: usize) -> Vec<LeaderboardEntry> {
        let data = self.data.lock().await;

        let mut entries: Vec<LeaderboardEntry> = data
            .users
            .iter()
            .map(|(user_id, stats)| LeaderboardEntry {
                user_id: *user_id,
                total_calls: stats.total_calls,
                total_hours: stats.total_hours,
            })
            .collect();

        entries.sort_by(|a, b| {
            b.total_calls
                .cmp(&a.total_calls)
                .then(b.total_hours.cmp(&a.total_hours))
                .then(a.user_id.cmp(&b.user_id))
        });
        entries.truncate(limit);
        entries
    }

    async fn persist(&self, data: &StatsData) -> Result<(), Error> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(data)?).await?;
        fs::rename(&tmp, &self.path).await?;

        debug!("Statistics saved to {}", self.path.display());
        Ok(())
    }
}
