use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::{info, warn};

use crate::constants::timeouts::{MAX_INSTANCES, MIN_TOKEN_LENGTH};
use crate::services::guard::{RoleMatcher, TierResolver};

const DEFAULT_CONFIG_PATH: &str = "config.json";
const DEFAULT_SNAPSHOT_DIR: &str = "backups";
const DEFAULT_STATS_PATH: &str = "statistics.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("No usable bot tokens configured (set bot_tokens in config.json or BOT_TOKENS)")]
    NoTokens,
}

/// Role sets per tier, as they appear in config.json
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct TierRoles<T> {
    #[serde(default)]
    pub donatur: Vec<T>,
    #[serde(default)]
    pub loyalist: Vec<T>,
}

/// Raw shape of config.json. Snowflakes may be written as numbers or strings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub bot_tokens: Vec<String>,
    #[serde(default, deserialize_with = "optional_snowflake")]
    pub idle_voice_channel_id: Option<u64>,
    #[serde(default)]
    pub music_enabled_bot: Option<u8>,
    #[serde(default, deserialize_with = "snowflake_sets")]
    pub role_ids: TierRoles<u64>,
    #[serde(default)]
    pub role_names: TierRoles<String>,
    #[serde(default, deserialize_with = "optional_snowflake")]
    pub guild_id: Option<u64>,
    #[serde(default)]
    pub snapshot_dir: Option<PathBuf>,
    #[serde(default)]
    pub stats_path: Option<PathBuf>,
}

impl FileConfig {
    /// Read a config file; a missing file is an empty config
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("No config file at {}, using environment only", path.display());
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Clone)]
pub struct Settings {
    /// One token per instance; instance numbers follow this order starting at 1
    pub bot_tokens: Vec<String>,
    pub idle_channel_id: Option<u64>,
    /// Only this instance may play media; every instance when unset
    pub music_enabled_bot: Option<u8>,
    pub role_ids: TierRoles<u64>,
    pub role_names: TierRoles<String>,
    pub guild_id: Option<u64>,
    pub snapshot_dir: PathBuf,
    pub stats_path: PathBuf,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var("SATPAM_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let file = FileConfig::read(Path::new(&path))?;
        Self::resolve(file, |key| env::var(key).ok())
    }

    /// Merge a config file with environment overrides
    pub fn resolve(
        file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let var = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let raw_tokens = match var("BOT_TOKENS") {
            Some(list) => list.split(',').map(|t| t.trim().to_string()).collect(),
            None => file.bot_tokens,
        };
        let bot_tokens = usable_tokens(raw_tokens);
        if bot_tokens.is_empty() {
            return Err(ConfigError::NoTokens);
        }

        let idle_channel_id = match var("IDLE_VOICE_CHANNEL_ID") {
            Some(v) => optional_var("IDLE_VOICE_CHANNEL_ID", &v),
            None => file.idle_voice_channel_id,
        }
        .filter(|id| *id != 0);

        let music_enabled_bot = match var("MUSIC_ENABLED_BOT") {
            Some(v) => optional_var("MUSIC_ENABLED_BOT", &v),
            None => file.music_enabled_bot,
        }
        .filter(|n| *n != 0);
        if let Some(n) = music_enabled_bot {
            if usize::from(n) > bot_tokens.len() {
                warn!(
                    "music_enabled_bot={} but only {} bot(s) configured, media playback is disabled",
                    n,
                    bot_tokens.len()
                );
            }
        }

        let guild_id = match var("GUILD_ID") {
            Some(v) => optional_var("GUILD_ID", &v),
            None => file.guild_id,
        };

        let snapshot_dir = var("SNAPSHOT_DIR")
            .map(PathBuf::from)
            .or(file.snapshot_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_DIR));

        let stats_path = var("STATS_PATH")
            .map(PathBuf::from)
            .or(file.stats_path)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATS_PATH));

        Ok(Self {
            bot_tokens,
            idle_channel_id,
            music_enabled_bot,
            role_ids: file.role_ids,
            role_names: file.role_names,
            guild_id,
            snapshot_dir,
            stats_path,
        })
    }

    pub fn tier_resolver(&self) -> TierResolver {
        TierResolver::new(
            RoleMatcher::new(
                self.role_ids.donatur.iter().copied(),
                self.role_names.donatur.iter().cloned(),
            ),
            RoleMatcher::new(
                self.role_ids.loyalist.iter().copied(),
                self.role_names.loyalist.iter().cloned(),
            ),
        )
    }

    pub fn music_enabled(&self, instance: u8) -> bool {
        self.music_enabled_bot.map_or(true, |n| n == instance)
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("bot_tokens", &format!("<{} redacted>", self.bot_tokens.len()))
            .field("idle_channel_id", &self.idle_channel_id)
            .field("music_enabled_bot", &self.music_enabled_bot)
            .field("guild_id", &self.guild_id)
            .field("snapshot_dir", &self.snapshot_dir)
            .field("stats_path", &self.stats_path)
            .finish_non_exhaustive()
    }
}

/// Drop placeholders and short tokens, and cap the fleet size
fn usable_tokens(raw: Vec<String>) -> Vec<String> {
    let mut tokens = Vec::new();

    for (idx, token) in raw.into_iter().enumerate() {
        let token = token.trim().to_string();
        if token.is_empty() || token.contains("token_bot_") || token.contains("disini") {
            continue;
        }
        if token.len() < MIN_TOKEN_LENGTH {
            warn!("Token #{} is too short to be valid, skipping", idx + 1);
            continue;
        }
        tokens.push(token);
    }

    if tokens.len() > MAX_INSTANCES {
        warn!(
            "{} tokens configured, only the first {} will be used",
            tokens.len(),
            MAX_INSTANCES
        );
        tokens.truncate(MAX_INSTANCES);
    }

    tokens
}

/// Parse an optional override; a malformed value is logged and ignored
fn optional_var<T: std::str::FromStr>(key: &str, value: &str) -> Option<T> {
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a valid number", key, value);
            None
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Snowflake {
    Number(u64),
    Text(String),
}

impl Snowflake {
    fn into_u64<E: serde::de::Error>(self) -> Result<u64, E> {
        match self {
            Snowflake::Number(n) => Ok(n),
            Snowflake::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("invalid snowflake {:?}", s))),
        }
    }
}

fn optional_snowflake<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    Option::<Snowflake>::deserialize(deserializer)?
        .map(Snowflake::into_u64)
        .transpose()
}

fn snowflake_sets<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TierRoles<u64>, D::Error> {
    let raw = TierRoles::<Snowflake>::deserialize(deserializer)?;
    let convert = |ids: Vec<Snowflake>| {
        ids.into_iter()
            .map(Snowflake::into_u64)
            .collect::<Result<Vec<_>, D::Error>>()
    };

    Ok(TierRoles {
        donatur: convert(raw.donatur)?,
        loyalist: convert(raw.loyalist)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn token(c: char) -> String {
        std::iter::repeat(c).take(60).collect()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_parse_file_with_string_snowflakes() {
        let raw = format!(
            r#"{{
                "bot_tokens": ["{}", "token_bot_2_disini", ""],
                "idle_voice_channel_id": "123456789012345678",
                "music_enabled_bot": 1,
                "role_ids": {{ "donatur": ["111", 222] }},
                "role_names": {{ "loyalist": ["Server Loyalist"] }}
            }}"#,
            token('a')
        );
        let file: FileConfig = serde_json::from_str(&raw).unwrap();
        let settings = Settings::resolve(file, no_env).unwrap();

        assert_eq!(settings.bot_tokens.len(), 1);
        assert_eq!(settings.idle_channel_id, Some(123456789012345678));
        assert_eq!(settings.role_ids.donatur, vec![111, 222]);
        assert!(settings.role_ids.loyalist.is_empty());
        assert_eq!(settings.role_names.loyalist, vec!["Server Loyalist".to_string()]);
        assert!(settings.music_enabled(1));
        assert_eq!(settings.snapshot_dir, PathBuf::from("backups"));
    }

    #[test]
    fn test_env_overrides_file() {
        let file = FileConfig {
            bot_tokens: vec![token('a')],
            idle_voice_channel_id: Some(1),
            ..Default::default()
        };
        let env: HashMap<&str, String> = HashMap::from([
            ("BOT_TOKENS", format!("{}, {}", token('b'), token('c'))),
            ("IDLE_VOICE_CHANNEL_ID", "77".to_string()),
            ("MUSIC_ENABLED_BOT", "2".to_string()),
        ]);

        let settings = Settings::resolve(file, |k| env.get(k).cloned()).unwrap();

        assert_eq!(settings.bot_tokens, vec![token('b'), token('c')]);
        assert_eq!(settings.idle_channel_id, Some(77));
        assert!(!settings.music_enabled(1));
        assert!(settings.music_enabled(2));
    }

    #[test]
    fn test_tokens_are_capped_and_validated() {
        let file = FileConfig {
            bot_tokens: vec![
                "short".to_string(),
                token('a'),
                token('b'),
                token('c'),
                token('d'),
                token('e'),
                token('f'),
            ],
            ..Default::default()
        };
        let settings = Settings::resolve(file, no_env).unwrap();
        assert_eq!(settings.bot_tokens.len(), MAX_INSTANCES);
        assert_eq!(settings.bot_tokens[0], token('a'));
    }

    #[test]
    fn test_no_tokens_is_an_error() {
        assert!(matches!(
            Settings::resolve(FileConfig::default(), no_env),
            Err(ConfigError::NoTokens)
        ));
    }

    #[test]
    fn test_music_bot_out_of_range_disables_media() {
        let file = FileConfig {
            bot_tokens: vec![token('a'), token('b')],
            music_enabled_bot: Some(3),
            ..Default::default()
        };
        let settings = Settings::resolve(file, no_env).unwrap();

        assert_eq!(settings.music_enabled_bot, Some(3));
        assert!(!settings.music_enabled(1));
        assert!(!settings.music_enabled(2));
    }

    #[test]
    fn test_malformed_overrides_are_ignored() {
        let file = FileConfig {
            bot_tokens: vec![token('a'), token('b')],
            guild_id: Some(5),
            ..Default::default()
        };
        let env: HashMap<&str, String> = HashMap::from([
            ("IDLE_VOICE_CHANNEL_ID", "general".to_string()),
            ("MUSIC_ENABLED_BOT", "two".to_string()),
            ("GUILD_ID", "my-guild".to_string()),
        ]);

        let settings = Settings::resolve(file, |k| env.get(k).cloned()).unwrap();

        assert_eq!(settings.idle_channel_id, None);
        assert_eq!(settings.music_enabled_bot, None);
        assert!(settings.music_enabled(1));
        assert!(settings.music_enabled(2));
        assert_eq!(settings.guild_id, None);
    }

    #[test]
    fn test_tier_role_ids_accept_numbers_and_strings() {
        let file: FileConfig = serde_json::from_str(
            r#"{ "role_ids": { "loyalist": [5, "6"] } }"#,
        )
        .unwrap();
        assert!(file.role_ids.donatur.is_empty());
        assert_eq!(file.role_ids.loyalist, vec![5, 6]);
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let file = FileConfig {
            bot_tokens: vec![token('z')],
            ..Default::default()
        };
        let settings = Settings::resolve(file, no_env).unwrap();
        assert!(!format!("{:?}", settings).contains("zzzz"));
    }
}
