//! Sections and labels of the panel tree.

use super::elements::ToolPanelElements;
use serde::Serialize;

/// A named group of panel items.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ToolSection {
    pub id: String,
    pub name: String,
    pub version: String,
    pub elems: ToolPanelElements,
}

impl ToolSection {
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            elems: ToolPanelElements::new(),
        }
    }

    /// Same identity with no children.
    pub fn empty_copy(&self) -> Self {
        Self::new(self.id.clone(), self.name.clone(), self.version.clone())
    }
}

/// A non-interactive heading between panel items.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ToolSectionLabel {
    pub id: String,
    pub text: String,
    pub version: String,
}

impl ToolSectionLabel {
    pub fn new(id: impl Into<String>, text: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            version: version.into(),
        }
    }
}
