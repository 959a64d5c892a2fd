use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bot::error::Error;
use crate::constants::timeouts::SNAPSHOT_INTERVAL;
use crate::services::guard::{Coordinator, FleetSnapshot};

const FILE_PREFIX: &str = "backup_";
const FILE_SUFFIX: &str = ".json";

/// One snapshot file on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub backup_id: String,
    pub timestamp: DateTime<Utc>,
    pub data: FleetSnapshot,
}

/// Write-only record of coordinator state for diagnostics.
/// Nothing restores from these at startup.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
    retention: usize,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>, retention: usize) -> Self {
        Self {
            dir: dir.into(),
            retention,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    /// Write a snapshot and prune old ones; returns the new file's path
    pub async fn create(&self, data: FleetSnapshot) -> Result<PathBuf, Error> {
        fs::create_dir_all(&self.dir).await?;

        let timestamp = Utc::now();
        let mut millis = timestamp.timestamp_millis();
        let mut path = self.path_for(millis);
        while fs::try_exists(&path).await? {
            millis += 1;
            path = self.path_for(millis);
        }

        let file = SnapshotFile {
            backup_id: format!("{}{}", FILE_PREFIX, millis),
            timestamp,
            data,
        };
        fs::write(&path, serde_json::to_vec_pretty(&file)?).await?;
        debug!("Wrote snapshot {}", path.display());

        self.prune().await?;
        Ok(path)
    }

    /// Delete all but the newest `retention` snapshots; returns how many were removed
    pub async fn prune(&self) -> Result<usize, Error> {
        let files = self.list().await?;
        let excess = files.len().saturating_sub(self.retention);

        for (_, path) in files.iter().take(excess) {
            fs::remove_file(path).await?;
        }

        if excess > 0 {
            debug!("Pruned {} old snapshots", excess);
        }
        Ok(excess)
    }

    /// The newest snapshot, read back for the backup status report
    pub async fn latest(&self) -> Result<Option<SnapshotFile>, Error> {
        let Some((_, path)) = self.list().await?.pop() else {
            return Ok(None);
        };
        let raw = fs::read(&path).await?;
        Ok(Some(serde_json::from_slice(&raw)?))
    }

    /// Snapshot files, oldest first
    pub async fn list(&self) -> Result<Vec<(i64, PathBuf)>, Error> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if let Some(millis) = name.to_str().and_then(parse_file_name) {
                files.push((millis, entry.path()));
            }
        }

        files.sort();
        Ok(files)
    }

    fn path_for(&self, millis: i64) -> PathBuf {
        self.dir
            .join(format!("{}{}{}", FILE_PREFIX, millis, FILE_SUFFIX))
    }
}

fn parse_file_name(name: &str) -> Option<i64> {
    name.strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_SUFFIX)?
        .parse()
        .ok()
}

/// Snapshot the coordinator on a fixed interval until cancelled
pub fn spawn_snapshot_task(
    store: Arc<SnapshotStore>,
    coordinator: Arc<Coordinator>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(SNAPSHOT_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so startup isn't recorded empty
        ticker.tick().await;

        info!(
            "Snapshotting fleet state to {} every {:?}",
            store.dir().display(),
            SNAPSHOT_INTERVAL
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match store.create(coordinator.snapshot()).await {
                Ok(path) => debug!("Snapshot saved to {}", path.display()),
                Err(Error::Io(e)) => warn!("Snapshot write failed: {}", e),
                Err(e) => error!("Snapshot failed: {:?}", e),
            }
        }

        debug!("Snapshot task stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::guard::TierResolver;
    use serenity::all::ChannelId;

    fn coordinator() -> Coordinator {
        let coordinator = Coordinator::new(TierResolver::default());
        coordinator
            .assignments
            .try_assign(ChannelId::new(10), 2)
            .unwrap();
        coordinator
    }

    #[tokio::test]
    async fn test_create_and_read_latest() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path(), 10);

        assert!(store.latest().await.unwrap().is_none());

        let path = store.create(coordinator().snapshot()).await.unwrap();
        assert!(path.file_name().unwrap().to_str().unwrap().starts_with("backup_"));

        let latest = store.latest().await.unwrap().unwrap();
        assert!(latest.backup_id.starts_with("backup_"));
        assert_eq!(latest.data.assignments.get(&ChannelId::new(10)), Some(&2));
    }

    #[tokio::test]
    async fn test_retention_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path(), 3);
        let coordinator = coordinator();

        let mut written = Vec::new();
        for _ in 0..5 {
            written.push(store.create(coordinator.snapshot()).await.unwrap());
        }

        let remaining: Vec<PathBuf> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|(_, p)| p)
            .collect();
        assert_eq!(remaining, written[2..].to_vec());
    }

    #[tokio::test]
    async fn test_foreign_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "keep me").unwrap();
        let store = SnapshotStore::new(dir.path(), 1);

        store.create(coordinator().snapshot()).await.unwrap();
        store.create(coordinator().snapshot()).await.unwrap();

        assert_eq!(store.list().await.unwrap().len(), 1);
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn test_parse_file_name() {
        assert_eq!(parse_file_name("backup_1700000000000.json"), Some(1700000000000));
        assert_eq!(parse_file_name("backup_x.json"), None);
        assert_eq!(parse_file_name("other.json"), None);
    }
}
