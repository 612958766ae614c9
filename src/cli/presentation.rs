//! CLI presentation: text and json formatters per command.

use crate::error::ToolBoxError;
use crate::panel::{PanelItem, ToolPanelElements};
use crate::tool::Tool;
use crate::toolbox::LoadReport;
use comfy_table::{presets, Table};
use std::sync::Arc;

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, ToolBoxError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ToolBoxError::ConfigError(format!("Failed to serialize output: {}", e)))
}

fn panel_rows(elements: &ToolPanelElements, section: &str, rows: &mut Vec<Vec<String>>) {
    for (key, item) in elements.iter() {
        let kind = item.kind().as_str().to_string();
        match item {
            PanelItem::Tool(Some(tool)) => rows.push(vec![
                kind,
                tool.panel_id().to_string(),
                tool.name.clone(),
                tool.version.clone(),
                section.to_string(),
                if tool.hidden { "hidden" } else { "" }.to_string(),
            ]),
            PanelItem::Workflow(Some(workflow)) => rows.push(vec![
                kind,
                workflow.id.clone(),
                workflow.name.clone(),
                String::new(),
                section.to_string(),
                String::new(),
            ]),
            PanelItem::Tool(None) | PanelItem::Workflow(None) => rows.push(vec![
                kind,
                key.clone(),
                String::new(),
                String::new(),
                section.to_string(),
                "stub".to_string(),
            ]),
            PanelItem::Label(label) => rows.push(vec![
                kind,
                label.id.clone(),
                label.text.clone(),
                label.version.clone(),
                section.to_string(),
                String::new(),
            ]),
            PanelItem::Section(inner) => {
                rows.push(vec![
                    kind,
                    inner.id.clone(),
                    inner.name.clone(),
                    inner.version.clone(),
                    section.to_string(),
                    format!("{} items", inner.elems.len()),
                ]);
                panel_rows(&inner.elems, &inner.id, rows);
            }
        }
    }
}

pub fn format_panel_text(elements: &ToolPanelElements) -> String {
    if elements.is_empty() {
        return "Panel is empty.".to_string();
    }
    let mut rows = Vec::new();
    panel_rows(elements, "", &mut rows);
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL);
    table.set_header(vec!["Kind", "Id", "Name", "Version", "Section", "Notes"]);
    for row in rows {
        table.add_row(row);
    }
    table.to_string()
}

pub fn format_panel_json(elements: &ToolPanelElements) -> Result<String, ToolBoxError> {
    to_json(elements)
}

pub fn format_tools_text(tools: &[Arc<Tool>]) -> String {
    if tools.is_empty() {
        return "No matching tool.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL);
    table.set_header(vec!["Id", "Name", "Version", "Guid", "File"]);
    for tool in tools {
        table.add_row(vec![
            tool.id.clone(),
            tool.name.clone(),
            tool.version.clone(),
            tool.guid.clone().unwrap_or_else(|| "-".to_string()),
            tool.config_file.display().to_string(),
        ]);
    }
    table.to_string()
}

pub fn format_tools_json(tools: &[Arc<Tool>]) -> Result<String, ToolBoxError> {
    let tools: Vec<&Tool> = tools.iter().map(Arc::as_ref).collect();
    to_json(&tools)
}

pub fn format_views_text(views: &[(String, String)], default_view: &str) -> String {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL);
    table.set_header(vec!["Id", "Name", "Default"]);
    for (id, name) in views {
        let default = if id == default_view { "*" } else { "" };
        table.add_row(vec![id.as_str(), name.as_str(), default]);
    }
    table.to_string()
}

pub fn format_load_report(report: &LoadReport) -> String {
    let mut s = format!(
        "Loaded {} source(s), {} tool(s)",
        report.sources_loaded, report.tools_loaded
    );
    if report.persisted {
        s.push_str(", integrated panel written");
    }
    if !report.failed_sources.is_empty() {
        s.push_str(&format!("\n\nFailed sources ({}):", report.failed_sources.len()));
        for (path, reason) in &report.failed_sources {
            s.push_str(&format!("\n  - {}: {}", path.display(), reason));
        }
    }
    if !report.failed_tools.is_empty() {
        s.push_str(&format!("\n\nFailed tools ({}):", report.failed_tools.len()));
        for (path, reason) in &report.failed_tools {
            s.push_str(&format!("\n  - {}: {}", path.display(), reason));
        }
    }
    s
}
