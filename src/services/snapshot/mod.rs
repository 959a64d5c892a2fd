pub mod store;

pub use store::{spawn_snapshot_task, SnapshotFile, SnapshotStore};
