//! Tool Registry
//!
//! `ToolBox` owns the live panel, the integrated panel and the id tables
//! inside one `PanelState` snapshot. Every mutation takes the mutation
//! lock, clones the snapshot, edits the clone and swaps it in; readers
//! clone the `Arc` and never see a half-applied change.

mod load;
mod lookup;
mod state;

pub use load::LoadReport;
pub use lookup::ToolQuery;
pub use state::SourceState;

use crate::cache::ToolCache;
use crate::config::ToolBoxConfig;
use crate::error::{LookupError, PersistenceError, ToolBoxError, ToolLoadError, ViewError, WatchError};
use crate::filter::{FilterContext, FilterFactory, FilterRegistry};
use crate::integrated::IntegratedPanel;
use crate::lineage::LineageMap;
use crate::panel::{label_key, PanelItem, ToolPanelElements, ToolSectionLabel};
use crate::source::ToolConfItem;
use crate::tool::{DescriptorToolParser, StaticWorkflowLoader, Tool, ToolParser, Workflow, WorkflowLoader};
use crate::views::{load_static_views, DefaultView, ToolBoxRegistry, ToolPanelView};
use crate::watch::{ChangeHandler, WatchSet, WatchTarget};
use load::{LoadContext, Loader};
use parking_lot::{Mutex, RwLock};
use state::{PanelState, StateRegistry, ToolLocation};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// A view after per-caller filtering, plus the filters that were refused.
#[derive(Debug, Clone)]
pub struct FilteredPanel {
    pub panel: ToolPanelElements,
    pub errors: Vec<crate::error::FilterConfigError>,
}

/// Builder for `ToolBox`. Every collaborator has a default.
pub struct ToolBoxBuilder {
    config: ToolBoxConfig,
    parser: Option<Arc<dyn ToolParser>>,
    workflow_loader: Option<Arc<dyn WorkflowLoader>>,
    cache: Option<Arc<ToolCache>>,
    lineage: Option<Arc<LineageMap>>,
    filter_registry: Option<Arc<FilterRegistry>>,
    views: Vec<Arc<dyn ToolPanelView>>,
}

impl ToolBoxBuilder {
    pub fn parser(mut self, parser: Arc<dyn ToolParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn workflow_loader(mut self, loader: Arc<dyn WorkflowLoader>) -> Self {
        self.workflow_loader = Some(loader);
        self
    }

    pub fn cache(mut self, cache: Arc<ToolCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn lineage(mut self, lineage: Arc<LineageMap>) -> Self {
        self.lineage = Some(lineage);
        self
    }

    pub fn filter_registry(mut self, registry: Arc<FilterRegistry>) -> Self {
        self.filter_registry = Some(registry);
        self
    }

    /// Register an extra view. A later view replaces an earlier one with
    /// the same id.
    pub fn view(mut self, view: Arc<dyn ToolPanelView>) -> Self {
        self.views.push(view);
        self
    }

    /// Assemble the registry. The integrated panel is read as stubs; no
    /// source is loaded until `load_all`.
    pub fn build(self) -> ToolBox {
        let config = self.config;
        let integrated = match IntegratedPanel::load(&config.integrated_tool_panel_config) {
            Ok(integrated) => integrated,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable integrated tool panel");
                IntegratedPanel::new()
            }
        };

        let mut views: Vec<Arc<dyn ToolPanelView>> = vec![Arc::new(DefaultView)];
        if let Some(dir) = &config.panel_views_dir {
            let (loaded, errors) = load_static_views(dir);
            if !errors.is_empty() {
                warn!(dir = %dir.display(), failed = errors.len(), "Some panel views failed to load");
            }
            views.extend(loaded.into_iter().map(|v| Arc::new(v) as Arc<dyn ToolPanelView>));
        }
        for view in self.views {
            views.retain(|existing| existing.id() != view.id());
            views.push(view);
        }

        let filters = FilterFactory::new(
            self.filter_registry
                .unwrap_or_else(|| Arc::new(FilterRegistry::with_builtins())),
            config.filter_settings(),
        );
        let shed_hosts = config.tool_sheds.clone();

        ToolBox {
            parser: self
                .parser
                .unwrap_or_else(|| Arc::new(DescriptorToolParser::new())),
            workflow_loader: self
                .workflow_loader
                .unwrap_or_else(|| Arc::new(StaticWorkflowLoader::new())),
            cache: self.cache.unwrap_or_default(),
            lineage: self.lineage.unwrap_or_default(),
            filters,
            views,
            state: RwLock::new(Arc::new(PanelState::with_integrated(integrated))),
            mutation: Mutex::new(()),
            shed_hosts: Mutex::new(shed_hosts),
            watches: Mutex::new(None),
            config,
        }
    }
}

/// The tool registry.
pub struct ToolBox {
    config: ToolBoxConfig,
    parser: Arc<dyn ToolParser>,
    workflow_loader: Arc<dyn WorkflowLoader>,
    cache: Arc<ToolCache>,
    lineage: Arc<LineageMap>,
    filters: FilterFactory,
    views: Vec<Arc<dyn ToolPanelView>>,
    state: RwLock<Arc<PanelState>>,
    mutation: Mutex<()>,
    /// Shed hosts, most recently matched first.
    shed_hosts: Mutex<Vec<String>>,
    watches: Mutex<Option<WatchSet>>,
}

impl ToolBox {
    pub fn builder(config: ToolBoxConfig) -> ToolBoxBuilder {
        ToolBoxBuilder {
            config,
            parser: None,
            workflow_loader: None,
            cache: None,
            lineage: None,
            filter_registry: None,
            views: Vec::new(),
        }
    }

    fn snapshot(&self) -> Arc<PanelState> {
        Arc::clone(&self.state.read())
    }

    fn load_context(&self) -> LoadContext<'_> {
        LoadContext {
            config: &self.config,
            parser: self.parser.as_ref(),
            workflows: self.workflow_loader.as_ref(),
            cache: &self.cache,
            lineage: &self.lineage,
        }
    }

    /// Recompute views, persist when asked, publish the new snapshot and
    /// refresh watches. Caller holds the mutation lock.
    fn commit(&self, mut state: PanelState, persist: bool) -> bool {
        state.recompute_views(&self.views, &self.lineage);
        let persisted = persist && self.persist(&state);
        let targets = watch_targets(&state);
        *self.state.write() = Arc::new(state);
        self.sync_watches(&targets);
        persisted
    }

    fn persist(&self, state: &PanelState) -> bool {
        if self.config.read_only {
            return false;
        }
        match state.integrated.save(
            &self.config.integrated_tool_panel_config,
            self.config.integrated_tool_panel_tracking_directory.as_deref(),
        ) {
            Ok(_) => true,
            Err(e) => {
                error!(error = %e, "Failed to write integrated tool panel");
                false
            }
        }
    }

    /// Load every configured source from scratch.
    pub fn load_all(&self, persist: bool) -> LoadReport {
        let _guard = self.mutation.lock();
        let previous = self.snapshot();
        let had_order = previous.integrated.has_contents();
        let mut state = previous.reset_for_load();

        let mut report = {
            let mut loader = Loader::new(self.load_context(), &mut state);
            loader.load_sources();
            if had_order {
                loader.apply_integrated_order();
            }
            loader.report
        };
        info!(
            sources = report.sources_loaded,
            failed_sources = report.failed_sources.len(),
            tools = report.tools_loaded,
            failed_tools = report.failed_tools.len(),
            "Tool panel loaded"
        );
        report.persisted = self.commit(state, persist);
        report
    }

    /// Reload after a change to a configuration document.
    pub fn reload_config(&self, path: &Path) -> Result<LoadReport, ToolBoxError> {
        let known = self.snapshot().sources.iter().any(|s| s.path == path)
            || self.config.tool_config_files.iter().any(|p| path.starts_with(p));
        if !known {
            return Err(ToolBoxError::ConfigError(format!(
                "{} is not a configured tool source",
                path.display()
            )));
        }
        info!(path = %path.display(), "Reloading tool configuration");
        Ok(self.load_all(true))
    }

    /// Re-read one tool file recorded by an earlier load, or a new file in
    /// a watched tool directory. `Ok(None)` when the path is unknown or the
    /// file was removed.
    pub fn load_single_tool(&self, path: &Path) -> Result<Option<Arc<Tool>>, ToolLoadError> {
        let _guard = self.mutation.lock();
        let mut state = (*self.snapshot()).clone();

        let location = state.tool_locations.get(path).cloned().or_else(|| {
            state
                .watched_dirs
                .iter()
                .find(|(dir, watched)| watched.covers(dir, path))
                .map(|(_, watched)| ToolLocation {
                    container: watched.container.clone(),
                    item: ToolConfItem {
                        file: path.to_path_buf(),
                        ..ToolConfItem::default()
                    },
                    tool_id: None,
                    watched: true,
                })
        });
        let Some(location) = location else {
            debug!(path = %path.display(), "Ignoring change to untracked file");
            return Ok(None);
        };

        let tool = {
            let mut loader = Loader::new(self.load_context(), &mut state);
            loader.reload_tool_file(path, location)?
        };
        self.commit(state, true);
        Ok(tool)
    }

    /// Route a file change to the matching reload.
    pub fn handle_file_change(&self, path: &Path) {
        let snapshot = self.snapshot();
        if snapshot.watched_configs.iter().any(|p| p == path) {
            if let Err(e) = self.reload_config(path) {
                warn!(path = %path.display(), error = %e, "Config reload failed");
            }
            return;
        }
        let tracked = snapshot
            .tool_locations
            .get(path)
            .map(|l| l.watched)
            .unwrap_or(false);
        let in_watched_dir = snapshot
            .watched_dirs
            .iter()
            .any(|(dir, watched)| watched.covers(dir, path))
            && (!path.exists() || self.parser.is_tool_like(path));
        if tracked || in_watched_dir {
            match self.load_single_tool(path) {
                Ok(Some(tool)) => info!(tool_id = %tool.panel_id(), "Reloaded tool"),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Tool reload failed"),
            }
        }
    }

    /// Remove a tool from the id tables and the live panel, and with
    /// `from_integrated` from the persisted order as well.
    pub fn remove_tool(&self, tool_id: &str, from_integrated: bool) -> bool {
        let _guard = self.mutation.lock();
        let mut state = (*self.snapshot()).clone();
        let removed = state.remove_tool(tool_id, from_integrated);
        self.cache.expire(tool_id);
        if removed {
            info!(tool_id = %tool_id, from_integrated, "Removed tool");
            self.commit(state, from_integrated);
        }
        removed
    }

    /// Sweep the cache and drop tools whose files vanished or changed.
    /// Their integrated positions stay as stubs.
    pub fn cleanup(&self) -> Vec<String> {
        let _guard = self.mutation.lock();
        let removed = self.cache.sweep();
        if removed.is_empty() {
            return removed;
        }
        let mut state = (*self.snapshot()).clone();
        for tool_id in &removed {
            state.remove_tool(tool_id, false);
        }
        info!(removed = removed.len(), "Evicted changed tools");
        self.commit(state, false);
        removed
    }

    fn edit_panel<F>(&self, edit: F) -> Result<(), ToolBoxError>
    where
        F: FnOnce(&mut Loader<'_>) -> Result<(), ToolBoxError>,
    {
        let _guard = self.mutation.lock();
        let mut state = (*self.snapshot()).clone();
        {
            let mut loader = Loader::new(self.load_context(), &mut state);
            edit(&mut loader)?;
        }
        self.commit(state, true);
        Ok(())
    }

    /// Add a section to both panels. Existing sections are renamed.
    pub fn add_section(&self, id: &str, name: &str) -> Result<(), ToolBoxError> {
        self.edit_panel(|loader| {
            loader.ensure_section(id, name, "", None);
            Ok(())
        })
    }

    /// Add a label at the end of the root or of `section`.
    pub fn add_label(&self, id: &str, text: &str, section: Option<&str>) -> Result<(), ToolBoxError> {
        self.edit_panel(|loader| {
            ensure_named_section(loader, section);
            let label = ToolSectionLabel::new(id, text, "");
            loader.place_entry(label_key(id), PanelItem::Label(label), section, None);
            Ok(())
        })
    }

    /// Place a workflow at the end of the root or of `section`.
    pub fn add_workflow(&self, workflow: Workflow, section: Option<&str>) -> Result<(), ToolBoxError> {
        self.edit_panel(|loader| {
            ensure_named_section(loader, section);
            loader.place_workflow(workflow, section, None);
            Ok(())
        })
    }

    /// Add a tool on behalf of a dynamic source (e.g. an installer).
    pub fn register_dynamic_tool(
        &self,
        source: &Path,
        item: ToolConfItem,
        section: Option<&str>,
    ) -> Result<Arc<Tool>, ToolBoxError> {
        let snapshot = self.snapshot();
        let status = snapshot
            .sources
            .iter()
            .find(|s| s.path == source && s.dynamic)
            .ok_or_else(|| {
                ToolBoxError::ConfigError(format!(
                    "{} is not a loaded dynamic tool source",
                    source.display()
                ))
            })?;
        let path = if item.file.is_absolute() {
            item.file.clone()
        } else {
            status
                .base_path
                .as_deref()
                .unwrap_or(&self.config.tool_path)
                .join(&item.file)
        };
        let location = ToolLocation {
            container: section.map(str::to_string),
            item,
            tool_id: None,
            watched: self.config.watch_tools || status.monitored,
        };

        let _guard = self.mutation.lock();
        let mut state = (*self.snapshot()).clone();
        let tool = {
            let mut loader = Loader::new(self.load_context(), &mut state);
            loader.reload_tool_file(&path, location)?
        };
        let tool = tool.ok_or(ToolLoadError::NotFound(path))?;
        info!(tool_id = %tool.panel_id(), "Registered dynamic tool");
        self.commit(state, true);
        Ok(tool)
    }

    /// Live panel.
    pub fn panel(&self) -> ToolPanelElements {
        self.snapshot().panel.clone()
    }

    pub fn integrated_panel(&self) -> IntegratedPanel {
        self.snapshot().integrated.clone()
    }

    pub fn panel_view(&self, view_id: &str) -> Result<ToolPanelElements, ViewError> {
        self.snapshot()
            .views
            .get(view_id)
            .cloned()
            .ok_or_else(|| ViewError::UnknownView(view_id.to_string()))
    }

    /// Registered view ids with their display names, in registration order.
    pub fn views(&self) -> Vec<(String, String)> {
        self.views
            .iter()
            .map(|v| (v.id().to_string(), v.name().to_string()))
            .collect()
    }

    pub fn view_ids(&self) -> Vec<String> {
        self.views.iter().map(|v| v.id().to_string()).collect()
    }

    /// A view filtered for one caller. `None` selects the configured
    /// default view.
    pub fn filtered_panel(
        &self,
        view_id: Option<&str>,
        ctx: &FilterContext,
    ) -> Result<FilteredPanel, ToolBoxError> {
        let view_id = view_id.unwrap_or(&self.config.default_panel_view);
        let base = self.panel_view(view_id)?;
        let (filters, errors) = self.filters.build(ctx);
        let panel = base.apply_filter(&filters, ctx)?;
        Ok(FilteredPanel { panel, errors })
    }

    /// Section key and name holding `tool_id` in the live panel.
    pub fn section_for_tool(&self, tool_id: &str) -> Option<(String, String)> {
        self.snapshot().panel.get_section_for_tool_id(tool_id).cloned()
    }

    pub fn source_states(&self) -> Vec<(PathBuf, SourceState)> {
        self.snapshot()
            .sources
            .iter()
            .map(|s| (s.path.clone(), s.state.clone()))
            .collect()
    }

    /// Write the integrated panel now. `Ok(None)` in read-only mode.
    pub fn save_integrated_panel(&self) -> Result<Option<PathBuf>, PersistenceError> {
        if self.config.read_only {
            return Ok(None);
        }
        let _guard = self.mutation.lock();
        self.snapshot().integrated.save(
            &self.config.integrated_tool_panel_config,
            self.config.integrated_tool_panel_tracking_directory.as_deref(),
        )?;
        Ok(Some(self.config.integrated_tool_panel_config.clone()))
    }

    pub fn lookup(&self, query: &ToolQuery) -> Result<Vec<Arc<Tool>>, LookupError> {
        let snapshot = self.snapshot();
        let hosts = self.shed_hosts.lock().clone();
        let outcome = lookup::lookup(&snapshot, &self.lineage, &hosts, query)?;
        if let Some(host) = outcome.matched_host {
            let mut hosts = self.shed_hosts.lock();
            if let Some(at) = hosts.iter().position(|h| *h == host) {
                let host = hosts.remove(at);
                hosts.insert(0, host);
            }
        }
        Ok(outcome.tools)
    }

    /// Newest matching tool, or the requested version.
    pub fn get_tool(&self, tool_id: &str, version: Option<&str>) -> Option<Arc<Tool>> {
        let mut query = ToolQuery::new(tool_id);
        query.version = version.map(str::to_string);
        self.lookup(&query).ok()?.into_iter().next()
    }

    /// Direct id table hit only.
    pub fn get_tool_exact(&self, tool_id: &str, version: Option<&str>) -> Option<Arc<Tool>> {
        let mut query = ToolQuery::new(tool_id).exact();
        query.version = version.map(str::to_string);
        self.lookup(&query).ok()?.into_iter().next()
    }

    /// Every loaded release reachable from `tool_id`, oldest first.
    pub fn get_all_versions(&self, tool_id: &str) -> Vec<Arc<Tool>> {
        self.lookup(&ToolQuery::new(tool_id).all_versions())
            .unwrap_or_default()
    }

    pub fn has_tool(&self, tool_id: &str) -> bool {
        self.get_tool(tool_id, None).is_some()
    }

    pub fn get_workflow(&self, workflow_id: &str) -> Option<Workflow> {
        self.snapshot().workflows.get(workflow_id).cloned()
    }

    /// Every tool served by id, sorted by panel id.
    pub fn tools(&self) -> Vec<Arc<Tool>> {
        let mut tools: Vec<Arc<Tool>> = self.snapshot().tools_by_id.values().cloned().collect();
        tools.sort_by(|a, b| a.panel_id().cmp(b.panel_id()));
        tools
    }

    pub fn config(&self) -> &ToolBoxConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ToolCache> {
        &self.cache
    }

    pub fn lineage(&self) -> &Arc<LineageMap> {
        &self.lineage
    }

    /// Start watching the files and directories recorded by the last load.
    pub fn start_watching(self: &Arc<Self>) -> Result<(), WatchError> {
        let debounce = Duration::from_millis(self.config.watch_debounce_ms);
        let mut watches = WatchSet::start(Arc::downgrade(self), debounce)?;
        let targets = watch_targets(&self.snapshot());
        if let Err(errors) = watches.sync(&targets) {
            warn!(failed = errors.len(), "Some watch targets could not be watched");
        }
        *self.watches.lock() = Some(watches);
        info!(targets = targets.len(), "Watching tool panel sources");
        Ok(())
    }

    pub fn stop_watching(&self) {
        if self.watches.lock().take().is_some() {
            info!("Stopped watching tool panel sources");
        }
    }

    pub fn is_watching(&self) -> bool {
        self.watches.lock().is_some()
    }

    fn sync_watches(&self, targets: &[WatchTarget]) {
        if let Some(watches) = self.watches.lock().as_mut() {
            if let Err(errors) = watches.sync(targets) {
                warn!(failed = errors.len(), "Some watch targets could not be watched");
            }
        }
    }
}

fn ensure_named_section(loader: &mut Loader<'_>, section: Option<&str>) {
    if let Some(id) = section {
        loader.ensure_section_exists(id);
    }
}

fn watch_targets(state: &PanelState) -> Vec<WatchTarget> {
    let mut targets: Vec<WatchTarget> = state
        .watched_configs
        .iter()
        .cloned()
        .map(WatchTarget::File)
        .collect();
    targets.extend(
        state
            .tool_locations
            .iter()
            .filter(|(_, location)| location.watched)
            .map(|(path, _)| WatchTarget::File(path.clone())),
    );
    targets.extend(state.watched_dirs.iter().map(|(dir, watched)| WatchTarget::Dir {
        path: dir.clone(),
        recursive: watched.recursive,
    }));
    targets
}

impl ChangeHandler for ToolBox {
    fn handle_change(&self, path: &Path) {
        self.handle_file_change(path);
    }
}

impl ToolBoxRegistry for ToolBox {
    fn has_tool(&self, tool_id: &str) -> bool {
        ToolBox::has_tool(self, tool_id)
    }

    fn get_tool(&self, tool_id: &str) -> Option<Arc<Tool>> {
        ToolBox::get_tool(self, tool_id, None)
    }

    fn get_workflow(&self, workflow_id: &str) -> Option<Workflow> {
        ToolBox::get_workflow(self, workflow_id)
    }

    fn add_tool_to_view(&self, tool: Arc<Tool>, container: &mut ToolPanelElements) {
        let snapshot = self.snapshot();
        StateRegistry::new(&snapshot, &self.lineage).add_tool_to_view(tool, container);
    }
}
