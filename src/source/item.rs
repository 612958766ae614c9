//! Parsed configuration items.

use crate::tool::ShedProvenance;
use std::path::PathBuf;

/// A `tool` entry of a configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ToolConfItem {
    /// Tool file, relative to the source's base path unless absolute.
    pub file: PathBuf,
    pub guid: Option<String>,
    pub hidden: bool,
    pub labels: Vec<String>,
    /// Provenance parsed from the entry's sibling metadata elements.
    pub tool_shed: Option<ShedProvenance>,
}

/// One configuration entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfItem {
    Tool(ToolConfItem),
    Label {
        id: String,
        text: String,
        version: String,
    },
    Workflow {
        id: String,
    },
    Section {
        id: String,
        name: String,
        version: String,
        items: Vec<ConfItem>,
    },
    ToolDir {
        dir: PathBuf,
        recursive: bool,
    },
}

impl ConfItem {
    pub fn kind(&self) -> &'static str {
        match self {
            ConfItem::Tool(_) => "tool",
            ConfItem::Label { .. } => "label",
            ConfItem::Workflow { .. } => "workflow",
            ConfItem::Section { .. } => "section",
            ConfItem::ToolDir { .. } => "tool_dir",
        }
    }
}
