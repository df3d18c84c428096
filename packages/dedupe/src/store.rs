//! JSON file persistence for [`ShownIds`].
//!
//! The file holds a JSON array of identity strings. A missing or corrupt
//! file loads as an empty set. Saves write a sibling temp file and rename
//! it over the target so a crash mid-write leaves the previous file intact.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use quake_watch_event_models::EventId;

use crate::{DedupeError, ShownIds};

/// Persists shown identities at a fixed path.
#[derive(Debug, Clone)]
pub struct ShownIdStore {
    path: PathBuf,
}

impl ShownIdStore {
    /// Creates a store for `path`. Nothing is read until [`Self::load`].
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the set and evicts identities older than `now - window`.
    ///
    /// Never fails: read and parse problems are logged and yield an empty
    /// set.
    #[must_use]
    pub fn load(&self, now: DateTime<Utc>, window: Duration) -> ShownIds {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No shown-events file at {}", self.path.display());
                return ShownIds::new();
            }
            Err(e) => {
                log::warn!(
                    "Failed to read shown events from {}: {e}",
                    self.path.display()
                );
                return ShownIds::new();
            }
        };

        let ids: Vec<String> = match serde_json::from_str(&contents) {
            Ok(ids) => ids,
            Err(e) => {
                log::warn!(
                    "Ignoring corrupt shown-events file {}: {e}",
                    self.path.display()
                );
                return ShownIds::new();
            }
        };

        let mut shown: ShownIds = ids.into_iter().map(EventId::from).collect();
        let evicted = shown.evict_stale(now, window);
        log::info!(
            "Loaded {} shown event(s) from {} ({evicted} evicted)",
            shown.len(),
            self.path.display()
        );
        shown
    }

    /// Writes the whole set, replacing the previous file atomically.
    ///
    /// # Errors
    ///
    /// Returns [`DedupeError`] if serialization, the temp write, or the
    /// rename fails.
    pub fn save(&self, shown: &ShownIds) -> Result<(), DedupeError> {
        let ids: Vec<&str> = shown.iter().map(EventId::as_str).collect();
        let json = serde_json::to_string_pretty(&ids)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;
        log::debug!(
            "Saved {} shown event(s) to {}",
            shown.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("quake_watch_dedupe_{name}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn saved_ids_load_in_a_fresh_store() {
        let dir = test_dir("round_trip");
        let path = dir.join("shown.json");
        let recent = EventId::composite(3.0, 36.0, -4.0, Some(now() - Duration::hours(2)), "");
        let opaque = EventId::new("X123");

        let shown: ShownIds = [recent.clone(), opaque.clone()].into_iter().collect();
        ShownIdStore::new(&path).save(&shown).unwrap();

        let loaded = ShownIdStore::new(&path).load(now(), Duration::hours(48));
        assert_eq!(loaded, shown);
        assert!(loaded.contains(&recent));
        assert!(loaded.contains(&opaque));
        assert!(!dir.join("shown.json.tmp").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_evicts_stale_ids() {
        let dir = test_dir("evict");
        let path = dir.join("shown.json");
        let stale = EventId::composite(3.0, 36.0, -4.0, Some(now() - Duration::days(5)), "");
        std::fs::write(
            &path,
            serde_json::to_string(&[stale.as_str(), "not|a|time|stamp"]).unwrap(),
        )
        .unwrap();

        let loaded = ShownIdStore::new(&path).load(now(), Duration::hours(48));
        assert!(!loaded.contains(&stale));
        assert!(loaded.contains(&EventId::new("not|a|time|stamp")));
        assert_eq!(loaded.len(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = test_dir("missing");
        let loaded = ShownIdStore::new(dir.join("absent.json")).load(now(), Duration::hours(48));
        assert!(loaded.is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let dir = test_dir("corrupt");
        let path = dir.join("shown.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(ShownIdStore::new(&path).load(now(), Duration::hours(48)).is_empty());

        std::fs::write(&path, r#"{"ids": ["a"]}"#).unwrap();
        assert!(ShownIdStore::new(&path).load(now(), Duration::hours(48)).is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = test_dir("nested");
        let path = dir.join("state").join("shown.json");
        ShownIdStore::new(&path)
            .save(&[EventId::new("a")].into_iter().collect())
            .unwrap();
        assert!(path.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
