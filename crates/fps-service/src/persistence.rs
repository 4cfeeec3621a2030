//! Storage collaborators: raw sets files and the per-profile clearing record.
//!
//! Reads never fail (a missing or unreadable file is empty input) and writes
//! are best effort.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use fps_core::Site;
use tempfile::NamedTempFile;

/// Error type for persistence writes.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to replace '{path}': {source}")]
    Rename {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Raw byte access to the sets files.
pub trait SetsPersistence: Send + Sync {
    /// Contents of `path`, or empty on any failure.
    fn read_raw_bytes(&self, path: &Path) -> Vec<u8>;

    /// Replace the contents of `path`. Failures are logged, never returned.
    fn write_raw_bytes(&self, path: &Path, bytes: &[u8]);
}

/// Filesystem-backed persistence with atomic replacement.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilePersistence;

impl FilePersistence {
    fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let write_error = |source| PersistenceError::Write {
            path: parent.to_path_buf(),
            source,
        };
        fs::create_dir_all(parent).map_err(write_error)?;
        let mut tmp = NamedTempFile::new_in(parent).map_err(write_error)?;
        tmp.write_all(bytes).map_err(write_error)?;
        tmp.persist(path).map_err(|e| PersistenceError::Rename {
            path: path.to_path_buf(),
            source: e.error,
        })?;
        Ok(())
    }
}

impl SetsPersistence for FilePersistence {
    fn read_raw_bytes(&self, path: &Path) -> Vec<u8> {
        match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("no sets file at '{}'", path.display());
                Vec::new()
            }
            Err(e) => {
                log::warn!("failed to read '{}': {e}", path.display());
                Vec::new()
            }
        }
    }

    fn write_raw_bytes(&self, path: &Path, bytes: &[u8]) {
        if let Err(e) = Self::write_atomically(path, bytes) {
            log::warn!("{e}");
        }
    }
}

// =============================================================================
// Sites To Clear
// =============================================================================

/// Per-profile record of sites marked for data clearing.
pub trait SitesToClearStore: Send + Sync {
    fn record_sites_to_clear(&self, browser_context_id: &str, sites: &BTreeSet<Site>);

    /// Sites recorded since the profile last completed a clearing pass.
    fn fetch_sites_to_clear(&self, browser_context_id: &str) -> BTreeSet<Site>;
}

#[derive(Debug, Default)]
struct ContextRecord {
    run_count: u64,
    cleared_through: u64,
    /// Site -> run at which it was last marked.
    marked: BTreeMap<Site, u64>,
}

/// In-memory store keeping a run counter per browser context.
#[derive(Debug, Default)]
pub struct InMemorySitesToClearStore {
    contexts: Mutex<HashMap<String, ContextRecord>>,
}

impl InMemorySitesToClearStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `browser_context_id` finished clearing everything marked so far.
    pub fn mark_cleared(&self, browser_context_id: &str) {
        let mut contexts = self.contexts.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(record) = contexts.get_mut(browser_context_id) {
            record.cleared_through = record.run_count;
        }
    }

    pub fn run_count(&self, browser_context_id: &str) -> u64 {
        let contexts = self.contexts.lock().unwrap_or_else(PoisonError::into_inner);
        contexts.get(browser_context_id).map_or(0, |record| record.run_count)
    }
}

impl SitesToClearStore for InMemorySitesToClearStore {
    fn record_sites_to_clear(&self, browser_context_id: &str, sites: &BTreeSet<Site>) {
        let mut contexts = self.contexts.lock().unwrap_or_else(PoisonError::into_inner);
        let record = contexts.entry(browser_context_id.to_string()).or_default();
        record.run_count += 1;
        for site in sites {
            record.marked.insert(site.clone(), record.run_count);
        }
    }

    fn fetch_sites_to_clear(&self, browser_context_id: &str) -> BTreeSet<Site> {
        let contexts = self.contexts.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(record) = contexts.get(browser_context_id) else {
            return BTreeSet::new();
        };
        record
            .marked
            .iter()
            .filter(|(_, &run)| run > record.cleared_through)
            .map(|(site, _)| site.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(origin: &str) -> Site {
        Site::canonicalize(origin, false).unwrap()
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FilePersistence.read_raw_bytes(&dir.path().join("missing.json")).is_empty());
    }

    #[test]
    fn writes_then_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("persisted.json");
        FilePersistence.write_raw_bytes(&path, b"{\"a\":\"b\"}");
        assert_eq!(FilePersistence.read_raw_bytes(&path), b"{\"a\":\"b\"}");

        FilePersistence.write_raw_bytes(&path, b"{}");
        assert_eq!(FilePersistence.read_raw_bytes(&path), b"{}");
    }

    #[test]
    fn write_leaves_sibling_files_alone() {
        let dir = tempfile::tempdir().unwrap();
        let sibling = dir.path().join("sets.tmp");
        fs::write(&sibling, "user data").unwrap();

        let path = dir.path().join("sets.json");
        FilePersistence.write_raw_bytes(&path, b"{}");

        assert_eq!(fs::read_to_string(&sibling).unwrap(), "user data");
        assert_eq!(FilePersistence.read_raw_bytes(&path), b"{}");
        let entries = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 2);
    }

    #[test]
    fn store_tracks_runs_per_context() {
        let store = InMemorySitesToClearStore::new();
        store.record_sites_to_clear("profile-1", &BTreeSet::from([site("https://a.test")]));
        store.record_sites_to_clear("profile-1", &BTreeSet::from([site("https://b.test")]));

        assert_eq!(store.run_count("profile-1"), 2);
        assert_eq!(store.fetch_sites_to_clear("profile-1").len(), 2);
        assert!(store.fetch_sites_to_clear("profile-2").is_empty());

        store.mark_cleared("profile-1");
        assert!(store.fetch_sites_to_clear("profile-1").is_empty());

        store.record_sites_to_clear("profile-1", &BTreeSet::from([site("https://a.test")]));
        assert_eq!(
            store.fetch_sites_to_clear("profile-1"),
            BTreeSet::from([site("https://a.test")])
        );
    }
}
