//! Ordered keyed panel containers.

use super::section::{ToolSection, ToolSectionLabel};
use crate::tool::{Tool, Workflow};
use indexmap::IndexMap;
use serde::ser::{SerializeSeq, Serializer};
use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

pub const TOOL_PREFIX: &str = "tool_";
pub const LABEL_PREFIX: &str = "label_";
pub const WORKFLOW_PREFIX: &str = "workflow_";

pub fn tool_key(id: &str) -> String {
    format!("{}{}", TOOL_PREFIX, id)
}

pub fn label_key(id: &str) -> String {
    format!("{}{}", LABEL_PREFIX, id)
}

pub fn workflow_key(id: &str) -> String {
    format!("{}{}", WORKFLOW_PREFIX, id)
}

/// Kind of a panel item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelItemKind {
    Tool,
    Workflow,
    Label,
    Section,
}

impl PanelItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PanelItemKind::Tool => "tool",
            PanelItemKind::Workflow => "workflow",
            PanelItemKind::Label => "label",
            PanelItemKind::Section => "section",
        }
    }
}

impl FromStr for PanelItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "tool" => Ok(PanelItemKind::Tool),
            "workflow" => Ok(PanelItemKind::Workflow),
            "label" => Ok(PanelItemKind::Label),
            "section" => Ok(PanelItemKind::Section),
            other => Err(format!("unknown panel item type '{}'", other)),
        }
    }
}

/// One entry of a panel container. `None` payloads are stubs: positions
/// remembered by the integrated panel for items not loaded this run.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelItem {
    Tool(Option<Arc<Tool>>),
    Workflow(Option<Workflow>),
    Label(ToolSectionLabel),
    Section(ToolSection),
}

impl PanelItem {
    pub fn kind(&self) -> PanelItemKind {
        match self {
            PanelItem::Tool(_) => PanelItemKind::Tool,
            PanelItem::Workflow(_) => PanelItemKind::Workflow,
            PanelItem::Label(_) => PanelItemKind::Label,
            PanelItem::Section(_) => PanelItemKind::Section,
        }
    }

    pub fn is_stub(&self) -> bool {
        matches!(self, PanelItem::Tool(None) | PanelItem::Workflow(None))
    }

    pub fn as_tool(&self) -> Option<&Arc<Tool>> {
        match self {
            PanelItem::Tool(tool) => tool.as_ref(),
            _ => None,
        }
    }

    pub fn as_section(&self) -> Option<&ToolSection> {
        match self {
            PanelItem::Section(section) => Some(section),
            _ => None,
        }
    }

    pub fn as_section_mut(&mut self) -> Option<&mut ToolSection> {
        match self {
            PanelItem::Section(section) => Some(section),
            _ => None,
        }
    }
}

/// Insertion-ordered `PanelKey -> PanelItem` map plus a reverse index from
/// tool id to the section holding it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ToolPanelElements {
    items: IndexMap<String, PanelItem>,
    section_by_tool: HashMap<String, (String, String)>,
}

impl ToolPanelElements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.items.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PanelItem)> {
        self.items.iter()
    }

    pub fn get(&self, key: &str) -> Option<&PanelItem> {
        self.items.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut PanelItem> {
        self.items.get_mut(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.items.get_index_of(key)
    }

    /// Insert or replace the value for `key` at the end (new keys) or in
    /// place (existing keys).
    pub fn append(&mut self, key: impl Into<String>, item: PanelItem) {
        self.items.insert(key.into(), item);
    }

    /// Place `key` at `index`, clamped to the container. An existing key is
    /// moved there and its value replaced.
    pub fn insert_at(&mut self, index: usize, key: impl Into<String>, item: PanelItem) {
        let key = key.into();
        let max = if self.items.contains_key(&key) {
            self.items.len().saturating_sub(1)
        } else {
            self.items.len()
        };
        self.items.shift_insert(index.min(max), key, item);
    }

    /// Replace an existing key's value in place, otherwise insert at
    /// `index` (or append when no index is known).
    pub fn update_or_insert(&mut self, index: Option<usize>, key: impl Into<String>, item: PanelItem) {
        let key = key.into();
        match (self.items.get_mut(&key), index) {
            (Some(existing), _) => *existing = item,
            (None, Some(index)) => self.insert_at(index, key, item),
            (None, None) => self.append(key, item),
        }
    }

    /// Move `key` to directly after `after`. Returns false when either key
    /// is missing.
    pub fn move_after(&mut self, key: &str, after: &str) -> bool {
        let (Some(from), Some(anchor)) = (self.index_of(key), self.index_of(after)) else {
            return false;
        };
        let to = if from < anchor { anchor } else { anchor + 1 };
        self.items.move_index(from, to);
        true
    }

    /// Swap the tool at `tool_<previous_id>` for `tool`, keeping its slot.
    pub fn replace_tool(&mut self, previous_id: &str, tool: Arc<Tool>) -> bool {
        let previous_key = tool_key(previous_id);
        let Some(index) = self.index_of(&previous_key) else {
            return false;
        };
        self.items.shift_remove(&previous_key);
        if let Some((section_key, section_name)) = self.section_by_tool.remove(previous_id) {
            self.section_by_tool
                .insert(tool.panel_id().to_string(), (section_key, section_name));
        }
        let key = tool_key(tool.panel_id());
        self.insert_at(index, key, PanelItem::Tool(Some(tool)));
        true
    }

    pub fn remove(&mut self, key: &str) -> Option<PanelItem> {
        self.items.shift_remove(key)
    }

    /// Deep copy.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    pub fn append_tool(&mut self, tool: Arc<Tool>) {
        let key = tool_key(tool.panel_id());
        self.append(key, PanelItem::Tool(Some(tool)));
    }

    pub fn has_tool_with_id(&self, tool_id: &str) -> bool {
        self.contains_key(&tool_key(tool_id))
    }

    pub fn get_tool_with_id(&self, tool_id: &str) -> Option<&Arc<Tool>> {
        self.get(&tool_key(tool_id)).and_then(PanelItem::as_tool)
    }

    pub fn section_mut(&mut self, key: &str) -> Option<&mut ToolSection> {
        self.items.get_mut(key).and_then(PanelItem::as_section_mut)
    }

    /// Section under `key`, created at the end when missing.
    pub fn get_or_create_section(&mut self, id: &str, name: &str, version: &str) -> &mut ToolSection {
        if !matches!(self.items.get(id), Some(PanelItem::Section(_))) {
            self.append(id, PanelItem::Section(ToolSection::new(id, name, version)));
        }
        match self.items.get_mut(id) {
            Some(PanelItem::Section(section)) => section,
            _ => unreachable!("section inserted above"),
        }
    }

    pub fn record_section_for_tool_id(&mut self, tool_id: &str, section_key: &str, section_name: &str) {
        self.section_by_tool.insert(
            tool_id.to_string(),
            (section_key.to_string(), section_name.to_string()),
        );
    }

    pub fn get_section_for_tool_id(&self, tool_id: &str) -> Option<&(String, String)> {
        self.section_by_tool.get(tool_id)
    }

    /// Recompute the reverse section index from the tree.
    pub fn rebuild_section_index(&mut self) {
        let mut index = HashMap::new();
        for (key, item) in &self.items {
            if let PanelItem::Section(section) = item {
                for tool in section.elems.iter().filter_map(|(_, i)| i.as_tool()) {
                    index.insert(
                        tool.panel_id().to_string(),
                        (key.clone(), section.name.clone()),
                    );
                }
            }
        }
        self.section_by_tool = index;
    }

    /// Remove `tool_<tool_id>` here and inside every section. Returns true
    /// when anything was removed.
    pub fn remove_tool_everywhere(&mut self, tool_id: &str) -> bool {
        let key = tool_key(tool_id);
        let mut removed = self.items.shift_remove(&key).is_some();
        for item in self.items.values_mut() {
            if let PanelItem::Section(section) = item {
                removed |= section.elems.items.shift_remove(&key).is_some();
            }
        }
        self.section_by_tool.remove(tool_id);
        removed
    }

    /// Turn every `tool_<tool_id>` payload into a stub, keeping positions.
    pub fn stub_out_tool(&mut self, tool_id: &str) -> bool {
        let key = tool_key(tool_id);
        let mut changed = false;
        if let Some(item) = self.items.get_mut(&key) {
            *item = PanelItem::Tool(None);
            changed = true;
        }
        for item in self.items.values_mut() {
            if let PanelItem::Section(section) = item {
                changed |= section.elems.stub_out_tool(tool_id);
            }
        }
        changed
    }

    /// Stable-sort this container, and the sections in it, by the key
    /// order of `reference`. Keys unknown to `reference` keep their relative
    /// order after every known key.
    pub fn reorder_by(&mut self, reference: &ToolPanelElements) {
        let rank = |key: &String| reference.index_of(key).unwrap_or(usize::MAX);
        self.items.sort_by(|a, _, b, _| rank(a).cmp(&rank(b)));
        for (key, item) in self.items.iter_mut() {
            if let (PanelItem::Section(section), Some(PanelItem::Section(known))) =
                (item, reference.get(key))
            {
                section.elems.reorder_by(&known.elems);
            }
        }
    }

    /// Loaded tools in panel order, sections included, first occurrence
    /// of each panel id only.
    pub fn walk_tools(&self) -> Vec<Arc<Tool>> {
        let mut seen = std::collections::HashSet::new();
        let mut tools = Vec::new();
        self.collect_tools(&mut seen, &mut tools);
        tools
    }

    fn collect_tools(
        &self,
        seen: &mut std::collections::HashSet<String>,
        out: &mut Vec<Arc<Tool>>,
    ) {
        for item in self.items.values() {
            match item {
                PanelItem::Tool(Some(tool)) => {
                    if seen.insert(tool.panel_id().to_string()) {
                        out.push(Arc::clone(tool));
                    }
                }
                PanelItem::Section(section) => section.elems.collect_tools(seen, out),
                _ => {}
            }
        }
    }
}

#[derive(Serialize)]
struct EntryRef<'a> {
    key: &'a str,
    #[serde(rename = "type")]
    kind: PanelItemKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'a str>,
    stub: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    elems: Option<&'a ToolPanelElements>,
}

impl Serialize for ToolPanelElements {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.items.len()))?;
        for (key, item) in &self.items {
            let (name, version, elems) = match item {
                PanelItem::Tool(Some(tool)) => (Some(tool.name.as_str()), Some(tool.version.as_str()), None),
                PanelItem::Workflow(Some(wf)) => (Some(wf.name.as_str()), None, None),
                PanelItem::Label(label) => (Some(label.text.as_str()), None, None),
                PanelItem::Section(section) => (Some(section.name.as_str()), None, Some(&section.elems)),
                PanelItem::Tool(None) | PanelItem::Workflow(None) => (None, None, None),
            };
            seq.serialize_element(&EntryRef {
                key,
                kind: item.kind(),
                name,
                version,
                stub: item.is_stub(),
                elems,
            })?;
        }
        seq.end()
    }
}
