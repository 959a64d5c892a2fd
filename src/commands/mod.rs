pub mod backup;
pub mod guard;
pub mod help;
pub mod music;
pub mod queue;
pub mod stats;
pub mod status;
pub mod tier;

use std::sync::Arc;

use crate::bot::data::Data;
use crate::bot::error::Error;

/// Commands registered on an instance; music only where playback is enabled
pub fn all(music_enabled: bool) -> Vec<poise::Command<Arc<Data>, Error>> {
    let mut commands = vec![
        guard::guard(),
        guard::dismiss(),
        status::status(),
        tier::tier(),
        tier::tiers(),
        stats::stats(),
        stats::leaderboard(),
        queue::queue_status(),
        queue::queue_leave(),
        queue::queue_list(),
        backup::backup_status(),
        help::help(),
    ];

    if music_enabled {
        commands.extend([
            music::play(),
            music::pause(),
            music::resume(),
            music::skip(),
            music::stop(),
            music::queue(),
        ]);
    }

    commands
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_music_commands_only_when_enabled() {
        let names = |cmds: Vec<poise::Command<Arc<Data>, Error>>| {
            cmds.into_iter().map(|c| c.name).collect::<Vec<_>>()
        };

        let plain = names(all(false));
        assert!(plain.contains(&"guard".to_string()));
        assert!(plain.contains(&"leaderboard".to_string()));
        assert!(plain.contains(&"queue_status".to_string()));
        assert!(plain.contains(&"backup_status".to_string()));
        assert!(!plain.contains(&"play".to_string()));

        let music = names(all(true));
        assert_eq!(music.len(), plain.len() + 6);
        assert!(music.contains(&"queue".to_string()));
    }
}
