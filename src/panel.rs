//! Panel Tree
//!
//! Ordered keyed containers of tools, workflows, labels and sections. Keys
//! are `tool_<id>`, `workflow_<id>`, `label_<id>` or a bare section id and
//! are unique within one container.

mod elements;
mod section;
mod walk;

pub use elements::{
    label_key, tool_key, workflow_key, PanelItem, PanelItemKind, ToolPanelElements, LABEL_PREFIX,
    TOOL_PREFIX, WORKFLOW_PREFIX,
};
pub use section::{ToolSection, ToolSectionLabel};
