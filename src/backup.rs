//! Backup Writer
//!
//! Pre-mutation snapshots of a rename session. A snapshot is written before
//! anything is changed on the server and is the manual recovery path when an
//! in-protocol rollback fails.

use crate::data::{DataValue, Event};
use crate::error::{GovernanceError, Result};
use crate::metadata::CodedEntity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Everything needed to put an option and its dependent data back as they were.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameSnapshot {
    pub session_id: Uuid,
    pub entity_id: String,
    pub option: CodedEntity,
    pub data_values: Vec<DataValue>,
    pub events: Vec<Event>,
    pub dry_run: bool,
    pub created_at: DateTime<Utc>,
}

/// Destination for snapshots. Returns a human-readable location of the stored copy.
pub trait SnapshotSink: Send + Sync {
    fn save(&self, snapshot: &RenameSnapshot) -> Result<String>;
}

/// Writes each snapshot once, as a pretty-printed JSON file named after the option id.
pub struct DiskSnapshotSink {
    dir: PathBuf,
}

impl DiskSnapshotSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(snapshot: &RenameSnapshot) -> String {
        format!(
            "rename-{}-{}.json",
            snapshot.entity_id,
            snapshot.created_at.format("%Y%m%dT%H%M%S%.3fZ")
        )
    }
}

impl SnapshotSink for DiskSnapshotSink {
    fn save(&self, snapshot: &RenameSnapshot) -> Result<String> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(Self::file_name(snapshot));

        // create_new: an existing backup is never overwritten
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| {
                GovernanceError::Snapshot(format!("cannot create {}: {}", path.display(), e))
            })?;
        let content = serde_json::to_string_pretty(snapshot)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;

        info!(
            "Backup saved: option {} with {} data values and {} events -> {}",
            snapshot.entity_id,
            snapshot.data_values.len(),
            snapshot.events.len(),
            path.display()
        );
        Ok(path.display().to_string())
    }
}

/// Keeps snapshots in memory.
#[derive(Default)]
pub struct MemorySnapshotSink {
    snapshots: Mutex<Vec<RenameSnapshot>>,
}

impl MemorySnapshotSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> Vec<RenameSnapshot> {
        self.snapshots
            .lock()
            .map(|snapshots| snapshots.clone())
            .unwrap_or_default()
    }
}

impl SnapshotSink for MemorySnapshotSink {
    fn save(&self, snapshot: &RenameSnapshot) -> Result<String> {
        let mut snapshots = self
            .snapshots
            .lock()
            .map_err(|_| GovernanceError::Snapshot("snapshot store poisoned".to_string()))?;
        snapshots.push(snapshot.clone());
        Ok(format!("memory://{}/{}", snapshot.entity_id, snapshots.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn snapshot() -> RenameSnapshot {
        RenameSnapshot {
            session_id: Uuid::new_v4(),
            entity_id: "O1".to_string(),
            option: CodedEntity::new("O1", "Yes", "YES"),
            data_values: Vec::new(),
            events: Vec::new(),
            dry_run: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_disk_sink_writes_readable_json() {
        let temp_dir = TempDir::new().unwrap();
        let sink = DiskSnapshotSink::new(temp_dir.path().join("backups"));
        let snapshot = snapshot();

        let location = sink.save(&snapshot).unwrap();
        assert!(location.contains("rename-O1-"));

        let content = fs::read_to_string(&location).unwrap();
        let restored: RenameSnapshot = serde_json::from_str(&content).unwrap();
        assert_eq!(restored, snapshot);
    }

    #[test]
    fn test_disk_sink_never_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let sink = DiskSnapshotSink::new(temp_dir.path());
        let snapshot = snapshot();

        sink.save(&snapshot).unwrap();
        let second = sink.save(&snapshot);
        assert!(matches!(second, Err(GovernanceError::Snapshot(_))));
    }
}
