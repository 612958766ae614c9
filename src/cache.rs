//! Tool Cache
//!
//! Previously parsed tools keyed by the path of their definition file. An
//! entry is valid only while its content hash matches the file on disk.
//! Every lookup re-hashes; a moved modification time with unchanged content
//! just refreshes the stored mtime, so touching a file keeps the entry while
//! editing it evicts the tool even when the mtime was preserved.
//!
//! `put` captures hash and mtime when called. A file rewritten between the
//! parse and the `put` is therefore only detected on the next `get`.

pub mod hasher;

use crate::tool::Tool;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

/// One cached tool.
#[derive(Debug, Clone)]
pub struct ToolCacheEntry {
    pub config_path: PathBuf,
    pub content_hash: String,
    pub mod_time: Option<SystemTime>,
    pub tool: Arc<Tool>,
    /// Set when a re-parse failed and the previous tool was kept.
    pub stale: bool,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<PathBuf, ToolCacheEntry>,
    paths_by_tool_id: HashMap<String, HashSet<PathBuf>>,
}

impl CacheInner {
    fn remove_path(&mut self, path: &Path) -> Option<ToolCacheEntry> {
        let entry = self.entries.remove(path)?;
        let tool_id = entry.tool.panel_id().to_string();
        if let Some(paths) = self.paths_by_tool_id.get_mut(&tool_id) {
            paths.remove(path);
            if paths.is_empty() {
                self.paths_by_tool_id.remove(&tool_id);
            }
        }
        Some(entry)
    }

    fn is_current(entry: &ToolCacheEntry) -> bool {
        hasher::hash_file(&entry.config_path)
            .map(|hash| hash == entry.content_hash)
            .unwrap_or(false)
    }
}

/// Content-addressed cache shared by every loader in the process.
#[derive(Default)]
pub struct ToolCache {
    inner: Mutex<CacheInner>,
}

impl ToolCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached tool for `path` if the file is unchanged.
    pub fn get(&self, path: &Path) -> Option<Arc<Tool>> {
        let mut inner = self.inner.lock();
        let entry = inner.entries.get_mut(path)?;
        let metadata = std::fs::metadata(path).ok()?;
        let mod_time = metadata.modified().ok();
        match hasher::hash_file(path) {
            Ok(hash) if hash == entry.content_hash => {
                if mod_time != entry.mod_time {
                    debug!(path = %path.display(), "Tool file touched without content change");
                    entry.mod_time = mod_time;
                }
                entry.stale = false;
                Some(Arc::clone(&entry.tool))
            }
            _ => None,
        }
    }

    /// Cache `tool` for `path`, recording the file's current hash and mtime.
    pub fn put(&self, path: &Path, tool: Arc<Tool>) {
        let content_hash = match hasher::hash_file(path) {
            Ok(hash) => hash,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Not caching unreadable tool file");
                return;
            }
        };
        let mod_time = std::fs::metadata(path).and_then(|m| m.modified()).ok();

        let mut inner = self.inner.lock();
        inner.remove_path(path);
        inner
            .paths_by_tool_id
            .entry(tool.panel_id().to_string())
            .or_default()
            .insert(path.to_path_buf());
        inner.entries.insert(
            path.to_path_buf(),
            ToolCacheEntry {
                config_path: path.to_path_buf(),
                content_hash,
                mod_time,
                tool,
                stale: false,
            },
        );
    }

    /// Drop every entry holding `tool_id`. Returns the number removed.
    pub fn expire(&self, tool_id: &str) -> usize {
        let mut inner = self.inner.lock();
        let paths: Vec<PathBuf> = inner
            .paths_by_tool_id
            .get(tool_id)
            .map(|paths| paths.iter().cloned().collect())
            .unwrap_or_default();
        for path in &paths {
            inner.remove_path(path);
        }
        paths.len()
    }

    /// Remove entries whose file vanished or changed and return their tool ids.
    pub fn sweep(&self) -> Vec<String> {
        let mut inner = self.inner.lock();
        let invalid: Vec<PathBuf> = inner
            .entries
            .values()
            .filter(|entry| !CacheInner::is_current(entry))
            .map(|entry| entry.config_path.clone())
            .collect();

        let mut removed = Vec::new();
        for path in invalid {
            if let Some(entry) = inner.remove_path(&path) {
                removed.push(entry.tool.panel_id().to_string());
            }
        }
        removed.sort();
        removed.dedup();
        removed
    }

    /// Keep the previous tool for `path` after a failed re-parse, flagging
    /// it stale. Returns `None` when nothing was cached.
    pub fn retain_stale(&self, path: &Path) -> Option<Arc<Tool>> {
        let mut inner = self.inner.lock();
        let entry = inner.entries.get_mut(path)?;
        entry.stale = true;
        Some(Arc::clone(&entry.tool))
    }

    pub fn is_stale(&self, path: &Path) -> bool {
        self.inner
            .lock()
            .entries
            .get(path)
            .map(|e| e.stale)
            .unwrap_or(false)
    }

    pub fn paths_for_tool(&self, tool_id: &str) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .inner
            .lock()
            .paths_by_tool_id
            .get(tool_id)
            .map(|paths| paths.iter().cloned().collect())
            .unwrap_or_default();
        paths.sort();
        paths
    }

    pub fn entry(&self, path: &Path) -> Option<ToolCacheEntry> {
        self.inner.lock().entries.get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
