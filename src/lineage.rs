//! Lineage Map
//!
//! Groups every known version of a logical tool. Shed tools share a lineage
//! through their guid with the version stripped; other tools are grouped by
//! id. Lineages record ids and versions only, never tool objects, and are
//! append-only for the life of the process.

mod version;

pub use version::VersionKey;

use crate::error::LineageError;
use crate::tool::Tool;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Shared reference to one lineage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineageHandle(Arc<str>);

impl LineageHandle {
    pub fn id(&self) -> &str {
        &self.0
    }
}

/// One version entry, oldest first within a lineage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineageVersion {
    /// Panel id (guid or plain id) of the tool carrying this version.
    pub tool_id: String,
    pub version: String,
    pub ordinal: usize,
}

struct Entry {
    key: VersionKey,
    sequence: u64,
    tool_id: String,
    version: String,
}

struct Lineage {
    entries: Vec<Entry>,
    published: Arc<[LineageVersion]>,
}

impl Lineage {
    fn publish(&mut self) {
        self.entries
            .sort_by(|a, b| a.key.cmp(&b.key).then(a.sequence.cmp(&b.sequence)));
        self.published = self
            .entries
            .iter()
            .enumerate()
            .map(|(ordinal, e)| LineageVersion {
                tool_id: e.tool_id.clone(),
                version: e.version.clone(),
                ordinal,
            })
            .collect();
    }

    fn ordinal_of(&self, tool_id: &str, version: &str) -> Option<usize> {
        self.published
            .iter()
            .find(|v| v.tool_id == tool_id && v.version == version)
            .map(|v| v.ordinal)
    }
}

#[derive(Default)]
struct Inner {
    lineages: HashMap<Arc<str>, Lineage>,
    by_tool_id: HashMap<String, LineageHandle>,
    sequence: u64,
}

/// Process-wide lineage registry.
#[derive(Default)]
pub struct LineageMap {
    inner: RwLock<Inner>,
}

/// Lineage id of `tool`: versionless guid for shed tools, else the id.
pub fn lineage_id(tool: &Tool) -> &str {
    tool.versionless_guid().unwrap_or(&tool.id)
}

impl LineageMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `tool` in its lineage. Registering the same id and version
    /// again returns the existing handle without reordering.
    pub fn register(&self, tool: &Tool) -> Result<LineageHandle, LineageError> {
        if tool.version.trim().is_empty() {
            return Err(LineageError::EmptyVersion(tool.panel_id().to_string()));
        }
        let lineage_key: Arc<str> = Arc::from(lineage_id(tool));
        let handle = LineageHandle(Arc::clone(&lineage_key));
        let panel_id = tool.panel_id().to_string();

        let mut inner = self.inner.write();
        inner.sequence += 1;
        let sequence = inner.sequence;

        let lineage = inner
            .lineages
            .entry(Arc::clone(&lineage_key))
            .or_insert_with(|| Lineage {
                entries: Vec::new(),
                published: Arc::from(Vec::new()),
            });
        if lineage.ordinal_of(&panel_id, &tool.version).is_none() {
            lineage.entries.push(Entry {
                key: VersionKey::parse(&tool.version),
                sequence,
                tool_id: panel_id.clone(),
                version: tool.version.clone(),
            });
            lineage.publish();
            debug!(lineage = %lineage_key, tool_id = %panel_id, version = %tool.version, "Registered lineage version");
        }

        inner
            .by_tool_id
            .insert(panel_id.clone(), handle.clone());
        if panel_id != tool.id {
            inner
                .by_tool_id
                .entry(tool.id.clone())
                .or_insert_with(|| handle.clone());
        }
        Ok(handle)
    }

    /// Find the lineage for a tool id, guid, or versionless guid.
    pub fn get(&self, tool_id: &str) -> Option<LineageHandle> {
        let inner = self.inner.read();
        if let Some(handle) = inner.by_tool_id.get(tool_id) {
            return Some(handle.clone());
        }
        if let Some((key, _)) = inner.lineages.get_key_value(tool_id) {
            return Some(LineageHandle(Arc::clone(key)));
        }
        let (prefix, _) = tool_id.rsplit_once('/')?;
        inner
            .lineages
            .get_key_value(prefix)
            .map(|(key, _)| LineageHandle(Arc::clone(key)))
    }

    /// Versions of a lineage, oldest to newest.
    pub fn get_versions(&self, handle: &LineageHandle) -> Arc<[LineageVersion]> {
        self.inner
            .read()
            .lineages
            .get(handle.id())
            .map(|l| Arc::clone(&l.published))
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    /// Order two tools: lineage ordinals when both sit in the same lineage,
    /// else their version keys.
    pub fn compare(&self, a: &Tool, b: &Tool) -> Ordering {
        let inner = self.inner.read();
        let (la, lb) = (lineage_id(a), lineage_id(b));
        if la == lb {
            if let Some(lineage) = inner.lineages.get(la) {
                let oa = lineage.ordinal_of(a.panel_id(), &a.version);
                let ob = lineage.ordinal_of(b.panel_id(), &b.version);
                if let (Some(oa), Some(ob)) = (oa, ob) {
                    return oa.cmp(&ob);
                }
            }
        }
        VersionKey::parse(&a.version).cmp(&VersionKey::parse(&b.version))
    }

    /// True when `a` is strictly newer than `b`.
    pub fn is_newer(&self, a: &Tool, b: &Tool) -> bool {
        self.compare(a, b) == Ordering::Greater
    }

    pub fn len(&self) -> usize {
        self.inner.read().lineages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shed_tool(version: &str) -> Tool {
        let mut tool = Tool::new("cat1", version);
        tool.guid = Some(format!("shed.example.org/repos/owner/cat/cat1/{}", version));
        tool
    }

    #[test]
    fn test_versions_sorted_oldest_first() {
        let map = LineageMap::new();
        let newer = Tool::new("sort", "1.10");
        let older = Tool::new("sort", "1.9");
        let handle = map.register(&newer).unwrap();
        map.register(&older).unwrap();

        let versions = map.get_versions(&handle);
        let listed: Vec<&str> = versions.iter().map(|v| v.version.as_str()).collect();
        assert_eq!(listed, vec!["1.9", "1.10"]);
        assert_eq!(versions[0].ordinal, 0);
        assert_eq!(versions[1].ordinal, 1);
        assert!(map.is_newer(&newer, &older));
        assert!(!map.is_newer(&older, &newer));
    }

    #[test]
    fn test_shed_guids_share_lineage() {
        let map = LineageMap::new();
        let v1 = shed_tool("1.0");
        let v2 = shed_tool("2.0");
        let h1 = map.register(&v1).unwrap();
        let h2 = map.register(&v2).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(h1.id(), "shed.example.org/repos/owner/cat/cat1");

        assert_eq!(map.get("cat1"), Some(h1.clone()));
        assert_eq!(map.get("shed.example.org/repos/owner/cat/cat1/3.0"), Some(h1.clone()));
        assert_eq!(map.get_versions(&h1).len(), 2);
    }

    #[test]
    fn test_register_is_idempotent() {
        let map = LineageMap::new();
        let tool = Tool::new("x", "1.0");
        let handle = map.register(&tool).unwrap();
        let first = map.get_versions(&handle);
        map.register(&tool).unwrap();
        assert_eq!(map.get_versions(&handle), first);
    }

    #[test]
    fn test_equal_keys_later_registration_is_newer() {
        let map = LineageMap::new();
        let mut a = shed_tool("1.0");
        a.guid = Some("host/repos/o/r/t/1.0".to_string());
        let mut b = a.clone();
        b.version = "1.00".to_string();
        b.guid = Some("host/repos/o/r/t/1.00".to_string());
        map.register(&a).unwrap();
        map.register(&b).unwrap();
        assert!(map.is_newer(&b, &a));
    }

    #[test]
    fn test_empty_version_is_rejected() {
        let map = LineageMap::new();
        let err = map.register(&Tool::new("bad", "")).unwrap_err();
        assert!(matches!(err, LineageError::EmptyVersion(id) if id == "bad"));
        assert!(map.get("bad").is_none());
    }
}
