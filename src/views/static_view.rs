//! Curated views built from static documents.

use super::definition::{ExcludeRule, StaticViewDefinition, ViewItem};
use super::{ToolBoxRegistry, ToolPanelView};
use crate::error::ViewError;
use crate::panel::{label_key, workflow_key, PanelItem, ToolPanelElements, ToolSection, ToolSectionLabel};
use std::path::Path;
use tracing::{debug, warn};

/// Exclusion rules in effect at one node, root first.
type ExcludeChain<'a> = Vec<&'a [ExcludeRule]>;

fn excluded(chain: &ExcludeChain<'_>, item: &PanelItem) -> bool {
    chain.iter().flat_map(|rules| rules.iter()).any(|rule| match item {
        PanelItem::Tool(Some(tool)) => rule.excludes_tool(tool),
        other => rule.excludes_kind(other.kind()),
    })
}

fn extend<'a>(chain: &ExcludeChain<'a>, rules: &'a [ExcludeRule]) -> ExcludeChain<'a> {
    let mut next = chain.clone();
    next.push(rules);
    next
}

/// A view defined by a `StaticViewDefinition`.
#[derive(Debug, Clone)]
pub struct StaticView {
    definition: StaticViewDefinition,
}

impl StaticView {
    pub fn new(definition: StaticViewDefinition) -> Self {
        Self { definition }
    }

    pub fn from_file(path: &Path) -> Result<Self, ViewError> {
        StaticViewDefinition::from_file(path).map(Self::new)
    }

    pub fn definition(&self) -> &StaticViewDefinition {
        &self.definition
    }

    /// Copy `source` into `target`, dropping excluded items. Sections are
    /// copied recursively under the same chain; one left with no children
    /// is dropped.
    fn copy_filtered(
        source: &ToolPanelElements,
        target: &mut ToolPanelElements,
        chain: &ExcludeChain<'_>,
        registry: &dyn ToolBoxRegistry,
    ) {
        for (key, item) in source.iter() {
            if item.is_stub() || excluded(chain, item) {
                continue;
            }
            match item {
                PanelItem::Section(section) => {
                    let mut copy = section.empty_copy();
                    Self::copy_filtered(&section.elems, &mut copy.elems, chain, registry);
                    if !copy.elems.is_empty() {
                        target.append(key.clone(), PanelItem::Section(copy));
                    }
                }
                PanelItem::Tool(Some(tool)) => {
                    registry.add_tool_to_view(tool.clone(), target);
                }
                _ => target.append(key.clone(), item.clone()),
            }
        }
    }

    fn build(
        &self,
        items: &[ViewItem],
        target: &mut ToolPanelElements,
        chain: &ExcludeChain<'_>,
        base: &ToolPanelElements,
        registry: &dyn ToolBoxRegistry,
    ) {
        for item in items {
            match item {
                ViewItem::Tool { id } => match registry.get_tool(id) {
                    Some(tool) => {
                        let entry = PanelItem::Tool(Some(tool.clone()));
                        if !excluded(chain, &entry) {
                            registry.add_tool_to_view(tool, target);
                        }
                    }
                    None => debug!(view = %self.definition.id, tool_id = %id, "View references unloaded tool"),
                },
                ViewItem::Workflow { id } => match registry.get_workflow(id) {
                    Some(workflow) => {
                        let entry = PanelItem::Workflow(Some(workflow));
                        if !excluded(chain, &entry) {
                            target.append(workflow_key(id), entry);
                        }
                    }
                    None => debug!(view = %self.definition.id, workflow_id = %id, "View references unknown workflow"),
                },
                ViewItem::Label { id, text } => {
                    let entry = PanelItem::Label(ToolSectionLabel::new(id.clone(), text.clone(), ""));
                    if !excluded(chain, &entry) {
                        target.append(label_key(id), entry);
                    }
                }
                ViewItem::Section {
                    id,
                    name,
                    items,
                    excludes,
                } => {
                    let section = ToolSection::new(id.clone(), name.clone(), "");
                    if excluded(chain, &PanelItem::Section(section.empty_copy())) {
                        continue;
                    }
                    let mut section = section;
                    self.build(items, &mut section.elems, &extend(chain, excludes), base, registry);
                    target.append(id.clone(), PanelItem::Section(section));
                }
                ViewItem::SectionAlias { section, excludes } => {
                    let Some(live) = base.get(section).and_then(PanelItem::as_section) else {
                        warn!(view = %self.definition.id, section = %section, "Aliased section not in panel");
                        continue;
                    };
                    let mut copy = live.empty_copy();
                    Self::copy_filtered(&live.elems, &mut copy.elems, &extend(chain, excludes), registry);
                    target.append(section.clone(), PanelItem::Section(copy));
                }
                ViewItem::ItemsFrom { section, excludes } => {
                    let Some(live) = base.get(section).and_then(PanelItem::as_section) else {
                        warn!(view = %self.definition.id, section = %section, "items_from section not in panel");
                        continue;
                    };
                    Self::copy_filtered(&live.elems, target, &extend(chain, excludes), registry);
                }
            }
        }
    }
}

impl ToolPanelView for StaticView {
    fn id(&self) -> &str {
        &self.definition.id
    }

    fn name(&self) -> &str {
        &self.definition.name
    }

    fn apply(
        &self,
        base: &ToolPanelElements,
        registry: &dyn ToolBoxRegistry,
    ) -> Result<ToolPanelElements, ViewError> {
        let root: ExcludeChain<'_> = vec![self.definition.excludes.as_slice()];
        let mut view = ToolPanelElements::new();
        match self.definition.items.as_deref() {
            None | Some([]) => Self::copy_filtered(base, &mut view, &root, registry),
            Some(items) => self.build(items, &mut view, &root, base, registry),
        }
        view.rebuild_section_index();
        Ok(view)
    }
}

/// Load every `.yml`, `.yaml` and `.xml` view document in `dir`, sorted by
/// file name. Documents that fail to parse are returned as errors and
/// skipped.
pub fn load_static_views(dir: &Path) -> (Vec<StaticView>, Vec<ViewError>) {
    let mut views = Vec::new();
    let mut errors = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return (views, errors);
    };
    let mut paths: Vec<_> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("yml") | Some("yaml") | Some("xml")
                )
        })
        .collect();
    paths.sort();

    for path in paths {
        match StaticView::from_file(&path) {
            Ok(view) => views.push(view),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping invalid view definition");
                errors.push(e);
            }
        }
    }
    (views, errors)
}
