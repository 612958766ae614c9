//! Filtering walk over a panel tree.

use super::elements::{PanelItem, ToolPanelElements};
use super::section::ToolSectionLabel;
use crate::error::FilterConfigError;
use crate::filter::{FilterContext, FilterSet};

impl ToolPanelElements {
    /// Filtered copy of this tree. Stubs never survive. A label is kept
    /// only when it passes the label filters and at least one tool or
    /// workflow after it survives before the next label or section; a
    /// section is kept when it passes the section filters and keeps at
    /// least one child.
    pub fn apply_filter(
        &self,
        filters: &FilterSet,
        ctx: &FilterContext,
    ) -> Result<ToolPanelElements, FilterConfigError> {
        let mut filtered = ToolPanelElements::new();
        let mut pending_label: Option<(String, ToolSectionLabel)> = None;

        for (key, item) in self.iter() {
            let keep_leaf = match item {
                PanelItem::Tool(Some(tool)) => filters.allows_tool(ctx, tool)?,
                PanelItem::Workflow(Some(workflow)) => filters.allows_workflow(ctx, workflow)?,
                PanelItem::Tool(None) | PanelItem::Workflow(None) => false,
                PanelItem::Label(label) => {
                    pending_label = if filters.allows_label(ctx, label)? {
                        Some((key.clone(), label.clone()))
                    } else {
                        None
                    };
                    continue;
                }
                PanelItem::Section(section) => {
                    pending_label = None;
                    if filters.allows_section(ctx, section)? {
                        let elems = section.elems.apply_filter(filters, ctx)?;
                        if !elems.is_empty() {
                            let mut kept = section.empty_copy();
                            kept.elems = elems;
                            filtered.append(key.clone(), PanelItem::Section(kept));
                        }
                    }
                    continue;
                }
            };

            if keep_leaf {
                if let Some((label_key, label)) = pending_label.take() {
                    filtered.append(label_key, PanelItem::Label(label));
                }
                filtered.append(key.clone(), item.clone());
            }
        }

        filtered.rebuild_section_index();
        Ok(filtered)
    }
}
