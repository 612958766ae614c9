//! Panel Views
//!
//! Named projections of the live panel. A view is a pure transform of the
//! live panel plus the registry's loaded tools; it never mutates either.
//! Views are recomputed after every completed load and cached by id.

mod definition;
mod ontology;
mod static_view;

pub use definition::{ExcludeRule, StaticViewDefinition, ViewItem};
pub use ontology::{OntologyTerm, OntologyView, UNCATEGORIZED};
pub use static_view::{load_static_views, StaticView};

use crate::error::ViewError;
use crate::panel::ToolPanelElements;
use crate::tool::{Tool, Workflow};
use std::sync::Arc;

pub const DEFAULT_VIEW_ID: &str = "default";

/// Read access to the registry while a view is being built.
pub trait ToolBoxRegistry {
    fn has_tool(&self, tool_id: &str) -> bool;

    fn get_tool(&self, tool_id: &str) -> Option<Arc<Tool>>;

    fn get_workflow(&self, workflow_id: &str) -> Option<Workflow>;

    /// Place `tool` into a view container, replacing an older release of
    /// the same lineage already there.
    fn add_tool_to_view(&self, tool: Arc<Tool>, container: &mut ToolPanelElements);
}

/// A named projection of the live panel.
pub trait ToolPanelView: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn apply(
        &self,
        base: &ToolPanelElements,
        registry: &dyn ToolBoxRegistry,
    ) -> Result<ToolPanelElements, ViewError>;
}

/// The live panel as-is.
#[derive(Debug, Clone, Default)]
pub struct DefaultView;

impl ToolPanelView for DefaultView {
    fn id(&self) -> &str {
        DEFAULT_VIEW_ID
    }

    fn name(&self) -> &str {
        "Full Tool Panel"
    }

    fn apply(
        &self,
        base: &ToolPanelElements,
        _registry: &dyn ToolBoxRegistry,
    ) -> Result<ToolPanelElements, ViewError> {
        Ok(base.copy())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::MapRegistry;
    use super::*;

    #[test]
    fn test_default_view_is_identity() {
        let mut panel = ToolPanelElements::new();
        panel.append_tool(Arc::new(Tool::new("a", "1")));
        let view = DefaultView;
        let applied = view.apply(&panel, &MapRegistry::with_panel(&panel)).unwrap();
        assert_eq!(applied, panel);
        assert_eq!(view.id(), "default");
    }
}
