//! Walking configuration sources into the live and integrated panels.

use super::state::{PanelState, SourceState, SourceStatus, ToolLocation, WatchedDir};
use crate::cache::ToolCache;
use crate::config::ToolBoxConfig;
use crate::error::{ConfigParseError, ToolLoadError};
use crate::lineage::LineageMap;
use crate::panel::{label_key, tool_key, workflow_key, PanelItem, ToolPanelElements, ToolSection, ToolSectionLabel};
use crate::source::{expand_source_paths, open_config_source, ConfItem, ConfigSource, ToolConfItem};
use crate::tool::{Tool, ToolParser, Workflow, WorkflowLoader};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Outcome of a full load.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub sources_loaded: usize,
    pub failed_sources: Vec<(PathBuf, String)>,
    pub tools_loaded: usize,
    pub failed_tools: Vec<(PathBuf, String)>,
    pub persisted: bool,
}

/// Collaborators a load needs.
pub(crate) struct LoadContext<'a> {
    pub config: &'a ToolBoxConfig,
    pub parser: &'a dyn ToolParser,
    pub workflows: &'a dyn WorkflowLoader,
    pub cache: &'a ToolCache,
    pub lineage: &'a LineageMap,
}

/// Open a source, retrying once after the configured delay.
fn open_with_retry(
    path: &Path,
    retry_delay: Duration,
) -> Result<Box<dyn ConfigSource>, ConfigParseError> {
    match open_config_source(path) {
        Ok(source) => Ok(source),
        Err(ConfigParseError::UnsupportedFormat(p)) => Err(ConfigParseError::UnsupportedFormat(p)),
        Err(first) => {
            debug!(path = %path.display(), error = %first, "Retrying config source");
            std::thread::sleep(retry_delay);
            open_config_source(path)
        }
    }
}

fn container_mut<'e>(
    elements: &'e mut ToolPanelElements,
    container: Option<&str>,
) -> Option<&'e mut ToolPanelElements> {
    match container {
        None => Some(elements),
        Some(key) => elements.section_mut(key).map(|s| &mut s.elems),
    }
}

fn container_ref<'e>(
    elements: &'e ToolPanelElements,
    container: Option<&str>,
) -> Option<&'e ToolPanelElements> {
    match container {
        None => Some(elements),
        Some(key) => elements
            .get(key)
            .and_then(PanelItem::as_section)
            .map(|s| &s.elems),
    }
}

/// Slot in `live` for `key` following the integrated order: directly after
/// the nearest integrated predecessor already in `live`, or the front.
fn slot_after_predecessor(
    integrated: &ToolPanelElements,
    live: &ToolPanelElements,
    key: &str,
) -> Option<usize> {
    let position = integrated.index_of(key)?;
    let predecessor = integrated
        .keys()
        .take(position)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .find_map(|k| live.index_of(k));
    Some(predecessor.map(|i| i + 1).unwrap_or(0))
}

fn hidden_name(name: &std::ffi::OsStr) -> bool {
    name.to_str()
        .map(|n| n.starts_with('.') || n.starts_with('_'))
        .unwrap_or(true)
}

/// One mutation pass over a `PanelState`.
pub(crate) struct Loader<'a> {
    ctx: LoadContext<'a>,
    state: &'a mut PanelState,
    pub report: LoadReport,
    root_index: usize,
    section_index: HashMap<String, usize>,
}

impl<'a> Loader<'a> {
    pub fn new(ctx: LoadContext<'a>, state: &'a mut PanelState) -> Self {
        Self {
            ctx,
            state,
            report: LoadReport::default(),
            root_index: 0,
            section_index: HashMap::new(),
        }
    }

    /// Load every configured source in order.
    pub fn load_sources(&mut self) {
        let retry_delay = Duration::from_millis(self.ctx.config.parse_retry_delay_ms);
        let paths: Vec<PathBuf> = self
            .ctx
            .config
            .tool_config_files
            .iter()
            .flat_map(|p| expand_source_paths(p))
            .collect();

        for path in paths {
            let mut status = SourceStatus {
                path: path.clone(),
                state: SourceState::Loading,
                dynamic: false,
                monitored: false,
                base_path: None,
            };
            let parsed = open_with_retry(&path, retry_delay)
                .and_then(|source| source.parse_items().map(|items| (source, items)));
            match parsed {
                Ok((source, items)) => {
                    status.dynamic = source.is_dynamic();
                    status.monitored = source.should_monitor();
                    status.base_path = source.parse_base_path();
                    if self.ctx.config.watch_tool_config_files || status.monitored {
                        self.state.watched_configs.push(path.clone());
                    }
                    info!(path = %path.display(), items = items.len(), "Loading tool config source");
                    for item in &items {
                        let index = self.next_index(None);
                        self.load_item(&status, item, None, Some(index));
                    }
                    status.state = SourceState::Loaded;
                    self.report.sources_loaded += 1;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping tool config source");
                    status.state = SourceState::Failed(e.to_string());
                    self.report.failed_sources.push((path.clone(), e.to_string()));
                }
            }
            self.state.sources.push(status);
        }
    }

    fn next_section_index(&mut self, section: &str) -> usize {
        let counter = self.section_index.entry(section.to_string()).or_insert(0);
        let index = *counter;
        *counter += 1;
        index
    }

    /// Next running index in `container`.
    fn next_index(&mut self, container: Option<&str>) -> usize {
        match container {
            Some(section) => self.next_section_index(section),
            None => {
                let index = self.root_index;
                self.root_index += 1;
                index
            }
        }
    }

    fn load_item(
        &mut self,
        source: &SourceStatus,
        item: &ConfItem,
        container: Option<&str>,
        index: Option<usize>,
    ) {
        match item {
            ConfItem::Tool(tool_item) => {
                let path = self.resolve_tool_path(source, &tool_item.file);
                let watched = self.ctx.config.watch_tools || source.monitored;
                self.load_tool_entry(&path, tool_item, container, index, watched);
            }
            ConfItem::Label { id, text, version } => {
                let label = ToolSectionLabel::new(id.clone(), text.clone(), version.clone());
                self.place_entry(label_key(id), PanelItem::Label(label), container, index);
            }
            ConfItem::Workflow { id } => match self.ctx.workflows.load_workflow(id) {
                Some(workflow) => self.place_workflow(workflow, container, index),
                None => warn!(workflow_id = %id, "Skipping unknown workflow"),
            },
            ConfItem::Section {
                id,
                name,
                version,
                items,
            } => {
                if container.is_some() {
                    warn!(section = %id, "Nested sections are not supported, skipping");
                    return;
                }
                self.ensure_section(id, name, version, index);
                for child in items {
                    let child_index = self.next_section_index(id);
                    self.load_item(source, child, Some(id.as_str()), Some(child_index));
                }
            }
            ConfItem::ToolDir { dir, recursive } => {
                self.load_tool_dir(source, dir, *recursive, container, index);
            }
        }
    }

    /// Section in both panels. An integrated section that already exists
    /// keeps its position and children.
    pub fn ensure_section(&mut self, id: &str, name: &str, version: &str, index: Option<usize>) {
        let integrated = self.state.integrated.elements_mut();
        match integrated.section_mut(id) {
            Some(section) => {
                section.name = name.to_string();
                section.version = version.to_string();
            }
            None => integrated.update_or_insert(
                index,
                id,
                PanelItem::Section(ToolSection::new(id, name, version)),
            ),
        }
        let live = self.state.panel.get_or_create_section(id, name, version);
        live.name = name.to_string();
        live.version = version.to_string();
    }

    /// Make sure section `id` is in the live panel, taking its name from
    /// the integrated panel when known.
    pub fn ensure_section_exists(&mut self, id: &str) {
        if self.state.panel.section_mut(id).is_some() {
            return;
        }
        let (name, version) = self
            .state
            .integrated
            .elements()
            .get(id)
            .and_then(PanelItem::as_section)
            .map(|s| (s.name.clone(), s.version.clone()))
            .unwrap_or_else(|| (id.to_string(), String::new()));
        self.ensure_section(id, &name, &version, None);
    }

    fn resolve_tool_path(&self, source: &SourceStatus, file: &Path) -> PathBuf {
        if file.is_absolute() {
            return file.to_path_buf();
        }
        source
            .base_path
            .as_deref()
            .unwrap_or(&self.ctx.config.tool_path)
            .join(file)
    }

    /// Cached or freshly parsed tool with the config entry's overrides.
    pub fn resolve_tool(&mut self, path: &Path, item: &ToolConfItem) -> Option<Arc<Tool>> {
        match self.try_resolve_tool(path, item) {
            Ok(tool) => Some(tool),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping tool");
                self.report.failed_tools.push((path.to_path_buf(), e.to_string()));
                None
            }
        }
    }

    pub fn try_resolve_tool(&mut self, path: &Path, item: &ToolConfItem) -> Result<Arc<Tool>, ToolLoadError> {
        let cached = self
            .ctx
            .cache
            .get(path)
            .filter(|tool| tool.guid.as_deref() == item.guid.as_deref());
        let parsed = match cached {
            Some(tool) => tool,
            None => match self.ctx.parser.parse_tool(path, item.guid.as_deref()) {
                Ok(tool) => {
                    let tool = Arc::new(tool);
                    self.ctx.cache.put(path, Arc::clone(&tool));
                    tool
                }
                Err(e) => match self.ctx.cache.retain_stale(path) {
                    Some(stale) => {
                        warn!(path = %path.display(), error = %e, "Keeping stale tool after failed parse");
                        stale
                    }
                    None => return Err(e),
                },
            },
        };
        self.report.tools_loaded += 1;

        let mut tool = (*parsed).clone();
        tool.hidden |= item.hidden;
        if !item.labels.is_empty() {
            tool.labels = item.labels.clone();
        }
        if item.tool_shed.is_some() {
            tool.tool_shed = item.tool_shed.clone();
        }
        if tool.guid.is_none() {
            tool.guid = item.guid.clone();
        }
        Ok(Arc::new(tool))
    }

    fn load_tool_entry(
        &mut self,
        path: &Path,
        item: &ToolConfItem,
        container: Option<&str>,
        index: Option<usize>,
        watched: bool,
    ) {
        let tool = self.resolve_tool(path, item);
        if let Some(tool) = &tool {
            self.place_tool(Arc::clone(tool), container, index);
        }
        self.record_location(path, item, container, tool.as_ref(), watched);
    }

    fn record_location(
        &mut self,
        path: &Path,
        item: &ToolConfItem,
        container: Option<&str>,
        tool: Option<&Arc<Tool>>,
        watched: bool,
    ) {
        self.state.tool_locations.insert(
            path.to_path_buf(),
            ToolLocation {
                container: container.map(str::to_string),
                item: item.clone(),
                tool_id: tool.map(|t| t.panel_id().to_string()),
                watched,
            },
        );
    }

    /// Keys of other lineage releases, newest first.
    fn lineage_sibling_keys(&self, tool: &Tool) -> Vec<String> {
        let Some(handle) = self.ctx.lineage.get(tool.panel_id()) else {
            return Vec::new();
        };
        self.ctx
            .lineage
            .get_versions(&handle)
            .iter()
            .rev()
            .filter(|v| v.tool_id != tool.panel_id())
            .map(|v| tool_key(&v.tool_id))
            .fold(Vec::new(), |mut keys, key| {
                if !keys.contains(&key) {
                    keys.push(key);
                }
                keys
            })
    }

    /// Merge one tool into the id tables, the integrated panel and the
    /// live panel.
    pub fn place_tool(&mut self, tool: Arc<Tool>, container: Option<&str>, index: Option<usize>) {
        if let Err(e) = self.ctx.lineage.register(&tool) {
            warn!(tool_id = %tool.panel_id(), error = %e, "Tracking tool without lineage");
        }
        self.state.register_tool(Arc::clone(&tool), self.ctx.lineage);
        let siblings = self.lineage_sibling_keys(&tool);
        self.place_integrated(&tool, &siblings, container, index);
        self.place_live(&tool, &siblings, container);
        if let Some(section) = container {
            let name = self
                .state
                .panel
                .get(section)
                .and_then(PanelItem::as_section)
                .map(|s| s.name.clone())
                .unwrap_or_default();
            self.state
                .integrated
                .elements_mut()
                .record_section_for_tool_id(tool.panel_id(), section, &name);
        }
    }

    fn place_integrated(
        &mut self,
        tool: &Arc<Tool>,
        siblings: &[String],
        container: Option<&str>,
        index: Option<usize>,
    ) {
        let lineage = self.ctx.lineage;
        let Some(target) = container_mut(self.state.integrated.elements_mut(), container) else {
            return;
        };
        let key = tool_key(tool.panel_id());
        if let Some(PanelItem::Tool(Some(existing))) = target.get(&key) {
            if lineage.is_newer(existing, tool) {
                return;
            }
        }
        if !target.contains_key(&key) {
            if let Some(anchor) = siblings.iter().find(|k| target.contains_key(k)) {
                let anchor = anchor.clone();
                target.append(key.clone(), PanelItem::Tool(Some(Arc::clone(tool))));
                target.move_after(&key, &anchor);
                return;
            }
        }
        target.update_or_insert(index, key, PanelItem::Tool(Some(Arc::clone(tool))));
    }

    fn place_live(&mut self, tool: &Arc<Tool>, siblings: &[String], container: Option<&str>) {
        let lineage = self.ctx.lineage;
        let key = tool_key(tool.panel_id());
        let PanelState {
            panel, integrated, ..
        } = &mut *self.state;
        let integrated = container_ref(integrated.elements(), container);
        let Some(live) = container_mut(panel, container) else {
            return;
        };

        if let Some(PanelItem::Tool(existing)) = live.get(&key) {
            let keep_existing = existing
                .as_ref()
                .map(|e| lineage.is_newer(e, tool))
                .unwrap_or(false);
            if !keep_existing {
                live.append(key, PanelItem::Tool(Some(Arc::clone(tool))));
            }
            return;
        }
        for sibling_key in siblings {
            if let Some(existing) = live.get(sibling_key).and_then(PanelItem::as_tool).cloned() {
                if lineage.is_newer(tool, &existing) {
                    debug!(old = %existing.panel_id(), new = %tool.panel_id(), "Replacing older release in panel");
                    live.replace_tool(existing.panel_id(), Arc::clone(tool));
                }
                return;
            }
        }

        let slot = integrated.and_then(|integrated| {
            slot_after_predecessor(integrated, live, &key).or_else(|| {
                siblings
                    .iter()
                    .find_map(|sibling| slot_after_predecessor(integrated, live, sibling))
            })
        });
        let item = PanelItem::Tool(Some(Arc::clone(tool)));
        match slot {
            Some(slot) => live.insert_at(slot, key, item),
            None => live.append(key, item),
        }
    }

    /// Labels, workflows and other keyed entries.
    pub fn place_entry(&mut self, key: String, item: PanelItem, container: Option<&str>, index: Option<usize>) {
        if let Some(target) = container_mut(self.state.integrated.elements_mut(), container) {
            target.update_or_insert(index, key.clone(), item.clone());
        }
        if let Some(live) = container_mut(&mut self.state.panel, container) {
            live.append(key, item);
        }
    }

    pub fn place_workflow(&mut self, workflow: Workflow, container: Option<&str>, index: Option<usize>) {
        let key = workflow_key(&workflow.id);
        self.state.workflows.insert(workflow.id.clone(), workflow.clone());
        self.place_entry(key, PanelItem::Workflow(Some(workflow)), container, index);
    }

    /// Scanned tools take consecutive running indexes, starting at the
    /// slot given to the `tool_dir` item itself.
    fn load_tool_dir(
        &mut self,
        source: &SourceStatus,
        dir: &Path,
        recursive: bool,
        container: Option<&str>,
        first_index: Option<usize>,
    ) {
        let dir = self.resolve_tool_path(source, dir);
        let watchable = self.ctx.config.watch_tools || source.monitored;
        let max_depth = if recursive { usize::MAX } else { 1 };
        let walker = WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !hidden_name(entry.file_name()));

        let mut found = 0usize;
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Error scanning tool directory");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !self.ctx.parser.is_tool_like(entry.path()) {
                continue;
            }
            let item = ToolConfItem {
                file: entry.path().to_path_buf(),
                ..ToolConfItem::default()
            };
            let index = match (found, first_index) {
                (_, None) => None,
                (0, Some(first)) => Some(first),
                _ => Some(self.next_index(container)),
            };
            self.load_tool_entry(entry.path(), &item, container, index, watchable);
            found += 1;
        }
        debug!(dir = %dir.display(), tools = found, "Scanned tool directory");

        if watchable {
            self.state.watched_dirs.insert(
                dir,
                WatchedDir {
                    container: container.map(str::to_string),
                    recursive,
                },
            );
        }
    }

    /// Reload one tool file recorded by an earlier load. Returns the tool
    /// now served for it, `None` when the file is gone.
    pub fn reload_tool_file(
        &mut self,
        path: &Path,
        location: ToolLocation,
    ) -> Result<Option<Arc<Tool>>, ToolLoadError> {
        if !path.exists() {
            if let Some(tool_id) = &location.tool_id {
                info!(path = %path.display(), tool_id = %tool_id, "Tool file removed");
                self.state.remove_tool(tool_id, false);
                self.ctx.cache.expire(tool_id);
            }
            self.state.tool_locations.remove(path);
            return Ok(None);
        }

        let tool = self.try_resolve_tool(path, &location.item)?;
        if let Some(previous) = &location.tool_id {
            if previous != tool.panel_id() {
                info!(old = %previous, new = %tool.panel_id(), "Tool id changed on reload");
                self.state.remove_tool(previous, false);
            }
        }
        let container = location.container.as_deref();
        if let Some(section) = container {
            self.ensure_section_exists(section);
        }
        self.place_tool(Arc::clone(&tool), container, None);
        self.record_location(path, &location.item, container, Some(&tool), location.watched);
        Ok(Some(tool))
    }

    /// Reorder the live panel by the integrated order.
    pub fn apply_integrated_order(&mut self) {
        let PanelState {
            panel, integrated, ..
        } = &mut *self.state;
        panel.reorder_by(integrated.elements());
    }
}
