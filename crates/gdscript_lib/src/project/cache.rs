//! The diagnostic cache and its on-disk form.
//!
//! Entries are keyed by `(project_relative_path, content_hash)`; the hash
//! is a SHA-256 of the source bytes. Entries are published atomically after
//! a per-file task completes, so concurrent readers only ever see whole
//! results. The cache persists to a directory keyed by project path and
//! tool version; a version mismatch erases and rebuilds.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::diagnostics::Diagnostic;

/// The version stamp persisted state is keyed by.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn hash_content(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub path: String,
    pub content_hash: String,
    pub diagnostics: Vec<Diagnostic>,
    pub dependencies: Vec<String>,
    /// Seconds since the Unix epoch at publication.
    pub cached_at: u64,
}

impl CacheEntry {
    pub fn new(
        path: impl Into<String>,
        content_hash: impl Into<String>,
        diagnostics: Vec<Diagnostic>,
        mut dependencies: Vec<String>,
    ) -> CacheEntry {
        dependencies.sort();
        CacheEntry {
            path: path.into(),
            content_hash: content_hash.into(),
            diagnostics,
            dependencies,
            cached_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }
}

/// Concurrent map of per-file results. One entry per path; the hash inside
/// the entry is what a lookup validates against.
#[derive(Debug, Default)]
pub struct DiagnosticCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl DiagnosticCache {
    pub fn new() -> DiagnosticCache {
        DiagnosticCache::default()
    }

    /// A hit only when both the path and the content hash match.
    pub fn get(&self, path: &str, content_hash: &str) -> Option<CacheEntry> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(path)
            .filter(|entry| entry.content_hash == content_hash)
            .cloned()
    }

    /// The entry for a path regardless of hash (used to keep a timed-out
    /// file's previous result).
    pub fn get_any(&self, path: &str) -> Option<CacheEntry> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(path).cloned()
    }

    /// Publish a completed result. The whole entry replaces the previous
    /// one in a single write.
    pub fn publish(&self, entry: CacheEntry) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(entry.path.clone(), entry);
    }

    pub fn remove(&self, path: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(path);
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<CacheEntry> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<CacheEntry> = entries.values().cloned().collect();
        all.sort_by(|a, b| a.path.cmp(&b.path));
        all
    }

    pub fn load(&self, entries: Vec<CacheEntry>) {
        let mut map = self.entries.write().unwrap_or_else(|e| e.into_inner());
        map.clear();
        for entry in entries {
            map.insert(entry.path.clone(), entry);
        }
    }
}

/// On-disk form of the incremental state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedState {
    pub version: String,
    pub project: String,
    pub entries: Vec<CacheEntry>,
    /// Reverse dependency graph as an adjacency list.
    pub dependents: BTreeMap<String, Vec<String>>,
}

const STATE_FILE: &str = "incremental.json";

/// Write the state under `dir`, in a subdirectory keyed by the project
/// path so unrelated projects never collide.
pub fn save_state(dir: &Path, state: &PersistedState) -> std::io::Result<()> {
    let target = dir.join(project_key(&state.project));
    std::fs::create_dir_all(&target)?;
    let json = serde_json::to_string_pretty(state)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(target.join(STATE_FILE), json)
}

/// Load the state for `project`. A missing file, unreadable content or a
/// tool-version mismatch all yield `None`; the mismatched state is erased
/// so the next save starts clean.
pub fn load_state(dir: &Path, project: &str) -> Option<PersistedState> {
    let target = dir.join(project_key(project)).join(STATE_FILE);
    let content = std::fs::read_to_string(&target).ok()?;
    let state: PersistedState = match serde_json::from_str(&content) {
        Ok(state) => state,
        Err(error) => {
            log::warn!("discarding unreadable incremental state: {error}");
            let _ = std::fs::remove_file(&target);
            return None;
        }
    };
    if state.version != TOOL_VERSION || state.project != project {
        log::info!(
            "incremental state version '{}' does not match '{}', rebuilding",
            state.version,
            TOOL_VERSION
        );
        let _ = std::fs::remove_file(&target);
        return None;
    }
    Some(state)
}

fn project_key(project: &str) -> String {
    hash_content(project.as_bytes())[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable_and_content_sensitive() {
        let a = hash_content(b"var x = 1\n");
        let b = hash_content(b"var x = 1\n");
        let c = hash_content(b"var x = 2\n");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_cache_hit_requires_matching_hash() {
        let cache = DiagnosticCache::new();
        cache.publish(CacheEntry::new("res://a.gd", "hash1", vec![], vec![]));

        assert!(cache.get("res://a.gd", "hash1").is_some());
        assert!(cache.get("res://a.gd", "hash2").is_none());
        assert!(cache.get_any("res://a.gd").is_some());
        assert!(cache.get("res://b.gd", "hash1").is_none());
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let state = PersistedState {
            version: TOOL_VERSION.to_string(),
            project: "/tmp/project".to_string(),
            entries: vec![CacheEntry::new("res://a.gd", "h", vec![], vec![])],
            dependents: BTreeMap::new(),
        };
        save_state(dir.path(), &state).unwrap();

        let loaded = load_state(dir.path(), "/tmp/project").unwrap();
        assert_eq!(loaded.entries.len(), 1);
        assert_eq!(loaded.entries[0].path, "res://a.gd");

        assert!(load_state(dir.path(), "/other/project").is_none());
    }

    #[test]
    fn test_version_mismatch_erases_state() {
        let dir = tempfile::tempdir().unwrap();
        let state = PersistedState {
            version: "0.0.0-old".to_string(),
            project: "/tmp/project".to_string(),
            entries: vec![],
            dependents: BTreeMap::new(),
        };
        save_state(dir.path(), &state).unwrap();

        assert!(load_state(dir.path(), "/tmp/project").is_none());
        // erased: a second load still finds nothing
        assert!(load_state(dir.path(), "/tmp/project").is_none());
    }
}
