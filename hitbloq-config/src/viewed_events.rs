use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

#[derive(Debug, Default, Serialize, Deserialize)]
struct ViewedEventsFile {
    viewed_events: BTreeSet<i64>,
    updated_at: Option<DateTime<Utc>>,
}

/// Remembers which events the player has already been shown
pub struct ViewedEventsStore {
    path: PathBuf,
    viewed: BTreeSet<i64>,
}

impl ViewedEventsStore {
    pub fn new() -> Result<Self, ConfigError> {
        Self::with_path(crate::config_dir()?.join("viewed_events.json"))
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    ConfigError::Storage(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }
        }

        let viewed = Self::load(&path)?.viewed_events;
        Ok(Self { path, viewed })
    }

    fn load(path: &Path) -> Result<ViewedEventsFile, ConfigError> {
        if !path.exists() {
            return Ok(ViewedEventsFile::default());
        }

        let json = fs::read_to_string(path)
            .map_err(|e| ConfigError::Storage(format!("Failed to read viewed events: {}", e)))?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn contains(&self, event_id: i64) -> bool {
        self.viewed.contains(&event_id)
    }

    /// Record `event_id` as viewed and persist. Returns `false` if it already was.
    pub fn mark_viewed(&mut self, event_id: i64) -> Result<bool, ConfigError> {
        if self.viewed.contains(&event_id) {
            return Ok(false);
        }

        let mut viewed_events = self.viewed.clone();
        viewed_events.insert(event_id);
        let file = ViewedEventsFile {
            viewed_events,
            updated_at: Some(Utc::now()),
        };
        let json = serde_json::to_string_pretty(&file)?;
        fs::write(&self.path, json)
            .map_err(|e| ConfigError::Storage(format!("Failed to save viewed events: {}", e)))?;

        // Only remembered once it is on disk, so a failed save is retried
        self.viewed = file.viewed_events;
        tracing::debug!(event_id, path = %self.path.display(), "Marked event as viewed");
        Ok(true)
    }
}
