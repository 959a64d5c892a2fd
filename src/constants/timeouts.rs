use std::time::Duration;

/// Maximum number of bot instances in one fleet
pub const MAX_INSTANCES: usize = 5;

/// Tokens shorter than this are treated as placeholders and skipped
pub const MIN_TOKEN_LENGTH: usize = 50;

/// How long before expiry the "leaving soon" warning fires
pub const EXPIRY_WARNING_LEAD: Duration = Duration::from_secs(5 * 60);

/// Ceiling for a single voice-connect handshake
pub const VOICE_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Debounce before checking whether a guarded channel emptied out
pub const VACANCY_CHECK_DELAY: Duration = Duration::from_secs(2);

/// Delay after ready before joining the idle channel (lets the cache fill)
pub const IDLE_JOIN_DELAY: Duration = Duration::from_secs(2);

/// Snapshot cadence and retention
pub const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const SNAPSHOT_RETENTION: usize = 10;

/// Queued requests not served within this window are dropped
pub const QUEUE_ENTRY_TTL: Duration = Duration::from_secs(5 * 60);

/// Rough wait quoted per member ahead in the queue
pub const QUEUE_WAIT_PER_ENTRY: Duration = Duration::from_secs(15 * 60);

/// Login attempts per instance before it is given up on
pub const LOGIN_ATTEMPTS: u32 = 3;
pub const LOGIN_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Format duration for display
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();

    if total_secs < 60 {
        format!("{} second{}", total_secs, if total_secs == 1 { "" } else { "s" })
    } else if total_secs < 3600 {
        let mins = total_secs / 60;
        format!("{} minute{}", mins, if mins == 1 { "" } else { "s" })
    } else {
        let hours = total_secs / 3600;
        let mins = (total_secs % 3600) / 60;
        let hours_part = format!("{} hour{}", hours, if hours == 1 { "" } else { "s" });
        if mins == 0 {
            hours_part
        } else {
            format!("{} {} min", hours_part, mins)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(1)), "1 second");
        assert_eq!(format_duration(Duration::from_secs(45)), "45 seconds");
        assert_eq!(format_duration(Duration::from_secs(5 * 60)), "5 minutes");
        assert_eq!(format_duration(Duration::from_secs(12 * 3600)), "12 hours");
        assert_eq!(format_duration(Duration::from_secs(11 * 3600 + 59 * 60)), "11 hours 59 min");
    }
}
