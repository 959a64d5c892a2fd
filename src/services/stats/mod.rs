pub mod store;

pub use store::{CallRecord, LeaderboardEntry, StatsStore, UsageTotals, UserStats};
