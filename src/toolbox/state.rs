//! Snapshot state swapped in by every completed mutation.

use crate::integrated::IntegratedPanel;
use crate::lineage::LineageMap;
use crate::panel::{tool_key, PanelItem, ToolPanelElements};
use crate::source::ToolConfItem;
use crate::tool::{Tool, Workflow};
use crate::views::{ToolBoxRegistry, ToolPanelView};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Load state of one configuration source.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SourceState {
    Unloaded,
    Loading,
    Loaded,
    Failed(String),
}

#[derive(Debug, Clone)]
pub(crate) struct SourceStatus {
    pub path: PathBuf,
    pub state: SourceState,
    pub dynamic: bool,
    pub monitored: bool,
    pub base_path: Option<PathBuf>,
}

/// Where a tool file was declared, so a change to it can be replayed.
#[derive(Debug, Clone)]
pub(crate) struct ToolLocation {
    /// Section key, `None` for the root.
    pub container: Option<String>,
    pub item: ToolConfItem,
    /// Panel id of the tool last loaded from this file.
    pub tool_id: Option<String>,
    pub watched: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WatchedDir {
    pub container: Option<String>,
    pub recursive: bool,
}

impl WatchedDir {
    pub fn covers(&self, dir: &Path, path: &Path) -> bool {
        if self.recursive {
            path.starts_with(dir) && path != dir
        } else {
            path.parent() == Some(dir)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct PanelState {
    /// Newest loaded tool per panel id.
    pub tools_by_id: HashMap<String, Arc<Tool>>,
    /// Every loaded release per plain tool id.
    pub tool_versions_by_id: HashMap<String, Vec<Arc<Tool>>>,
    pub panel: ToolPanelElements,
    pub integrated: IntegratedPanel,
    pub workflows: HashMap<String, Workflow>,
    pub sources: Vec<SourceStatus>,
    pub tool_locations: HashMap<PathBuf, ToolLocation>,
    pub watched_dirs: HashMap<PathBuf, WatchedDir>,
    pub watched_configs: Vec<PathBuf>,
    pub views: BTreeMap<String, ToolPanelElements>,
}

impl PanelState {
    pub fn with_integrated(integrated: IntegratedPanel) -> Self {
        Self {
            integrated,
            ..Self::default()
        }
    }

    /// Start of a full load: everything derived from sources is dropped,
    /// the integrated panel carries over.
    pub fn reset_for_load(&self) -> Self {
        Self::with_integrated(self.integrated.clone())
    }

    /// Record `tool` in the id tables. Returns true when it became the
    /// tool served for its panel id: nothing was there, it is newer, or it
    /// is the same release re-parsed.
    pub fn register_tool(&mut self, tool: Arc<Tool>, lineage: &LineageMap) -> bool {
        let panel_id = tool.panel_id().to_string();
        let versions = self.tool_versions_by_id.entry(tool.id.clone()).or_default();
        match versions
            .iter_mut()
            .find(|t| t.panel_id() == panel_id && t.version == tool.version)
        {
            Some(slot) => *slot = Arc::clone(&tool),
            None => versions.push(Arc::clone(&tool)),
        }

        let replace = match self.tools_by_id.get(&panel_id) {
            None => true,
            Some(existing) => {
                existing.version == tool.version || lineage.is_newer(&tool, existing)
            }
        };
        if replace {
            self.tools_by_id.insert(panel_id, tool);
        }
        replace
    }

    /// Drop a panel id from the id tables and the live panel. With
    /// `from_integrated` the persisted position goes too.
    pub fn remove_tool(&mut self, tool_id: &str, from_integrated: bool) -> bool {
        let mut removed = self.tools_by_id.remove(tool_id).is_some();
        for versions in self.tool_versions_by_id.values_mut() {
            let before = versions.len();
            versions.retain(|t| t.panel_id() != tool_id);
            removed |= versions.len() != before;
        }
        self.tool_versions_by_id.retain(|_, versions| !versions.is_empty());
        removed |= self.panel.remove_tool_everywhere(tool_id);
        if from_integrated {
            removed |= self.integrated.elements_mut().remove_tool_everywhere(tool_id);
        } else {
            self.integrated.elements_mut().stub_out_tool(tool_id);
        }
        for location in self.tool_locations.values_mut() {
            if location.tool_id.as_deref() == Some(tool_id) {
                location.tool_id = None;
            }
        }
        removed
    }

    /// Every loaded release of a plain tool id.
    pub fn versions_of(&self, tool_id: &str) -> &[Arc<Tool>] {
        self.tool_versions_by_id
            .get(tool_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Rebuild the section indexes and every view from the live panel.
    pub fn recompute_views(&mut self, views: &[Arc<dyn ToolPanelView>], lineage: &LineageMap) {
        self.panel.rebuild_section_index();
        let mut computed = BTreeMap::new();
        {
            let registry = StateRegistry::new(self, lineage);
            for view in views {
                match view.apply(&self.panel, &registry) {
                    Ok(elements) => {
                        computed.insert(view.id().to_string(), elements);
                    }
                    Err(e) => warn!(view = %view.id(), error = %e, "Failed to build panel view"),
                }
            }
        }
        self.views = computed;
    }
}

/// `ToolBoxRegistry` over one snapshot.
pub(crate) struct StateRegistry<'a> {
    state: &'a PanelState,
    lineage: &'a LineageMap,
}

impl<'a> StateRegistry<'a> {
    pub fn new(state: &'a PanelState, lineage: &'a LineageMap) -> Self {
        Self { state, lineage }
    }
}

impl ToolBoxRegistry for StateRegistry<'_> {
    fn has_tool(&self, tool_id: &str) -> bool {
        self.state.tools_by_id.contains_key(tool_id)
    }

    fn get_tool(&self, tool_id: &str) -> Option<Arc<Tool>> {
        self.state.tools_by_id.get(tool_id).cloned()
    }

    fn get_workflow(&self, workflow_id: &str) -> Option<Workflow> {
        self.state.workflows.get(workflow_id).cloned()
    }

    fn add_tool_to_view(&self, tool: Arc<Tool>, container: &mut ToolPanelElements) {
        let sibling = self.lineage.get(tool.panel_id()).and_then(|handle| {
            self.lineage
                .get_versions(&handle)
                .iter()
                .filter(|v| v.tool_id != tool.panel_id())
                .find_map(|v| container.get_tool_with_id(&v.tool_id).cloned())
        });
        match sibling {
            Some(existing) => {
                if self.lineage.is_newer(&tool, &existing) {
                    container.replace_tool(existing.panel_id(), tool);
                }
            }
            None => container.append(tool_key(tool.panel_id()), PanelItem::Tool(Some(tool))),
        }
    }
}
