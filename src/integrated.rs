//! Integrated Panel
//!
//! The canonical, persisted ordering of every panel item ever loaded. On
//! startup the file is read back as stubs so positions survive restarts
//! even for tools that have not been parsed yet. Stubs whose tools do not
//! come back are kept; only explicit removal drops an entry.

use crate::error::PersistenceError;
use crate::panel::{
    label_key, tool_key, workflow_key, PanelItem, ToolPanelElements, ToolSection,
    ToolSectionLabel, TOOL_PREFIX, WORKFLOW_PREFIX,
};
use crate::xml::{parse_document, XmlElement, XmlWriter};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const HEADER_COMMENT: &str = " This is a location to store tool panel state. It is generated \
automatically and reordering entries here reorders the panel on the next load. ";

/// Persisted panel order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntegratedPanel {
    elements: ToolPanelElements,
}

impl IntegratedPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_elements(elements: ToolPanelElements) -> Self {
        Self { elements }
    }

    pub fn elements(&self) -> &ToolPanelElements {
        &self.elements
    }

    pub fn elements_mut(&mut self) -> &mut ToolPanelElements {
        &mut self.elements
    }

    pub fn has_contents(&self) -> bool {
        !self.elements.is_empty()
    }

    /// Read a persisted panel as stubs. A missing file is an empty panel.
    pub fn load(path: &Path) -> Result<Self, PersistenceError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let text = fs::read_to_string(path).map_err(|e| PersistenceError::io(path, e))?;
        Self::parse(path, &text)
    }

    fn parse(path: &Path, text: &str) -> Result<Self, PersistenceError> {
        let malformed = |message: String| PersistenceError::Malformed {
            path: path.to_path_buf(),
            message,
        };
        let root = parse_document(text).map_err(malformed)?;
        if root.name != "toolbox" {
            return Err(malformed(format!(
                "root element is <{}>, expected <toolbox>",
                root.name
            )));
        }

        let mut elements = ToolPanelElements::new();
        for child in &root.children {
            if child.name == "section" {
                let Some(id) = child.attr("id") else {
                    warn!(path = %path.display(), "Skipping integrated section without id");
                    continue;
                };
                let mut section = ToolSection::new(
                    id,
                    child.attr("name").unwrap_or_default(),
                    child.attr("version").unwrap_or_default(),
                );
                for grandchild in &child.children {
                    if let Some((key, item)) = stub_for(grandchild) {
                        if matches!(item, PanelItem::Tool(_)) {
                            let tool_id = key.trim_start_matches(TOOL_PREFIX).to_string();
                            elements.record_section_for_tool_id(&tool_id, id, &section.name);
                        }
                        section.elems.append(key, item);
                    }
                }
                elements.append(id, PanelItem::Section(section));
            } else if let Some((key, item)) = stub_for(child) {
                elements.append(key, item);
            }
        }
        debug!(path = %path.display(), items = elements.len(), "Loaded integrated panel");
        Ok(Self { elements })
    }

    /// Serialize to the nested-element document.
    pub fn to_xml(&self) -> Result<String, PersistenceError> {
        let mut writer = XmlWriter::new();
        let ser = PersistenceError::Serialize;
        writer.declaration().map_err(ser)?;
        writer.start("toolbox", &[]).map_err(ser)?;
        writer.comment(HEADER_COMMENT).map_err(ser)?;
        for (key, item) in self.elements.iter() {
            match item {
                PanelItem::Section(section) => {
                    writer
                        .start(
                            "section",
                            &[
                                ("id", section.id.as_str()),
                                ("name", section.name.as_str()),
                                ("version", section.version.as_str()),
                            ],
                        )
                        .map_err(ser)?;
                    for (child_key, child) in section.elems.iter() {
                        if matches!(child, PanelItem::Section(_)) {
                            warn!(section = %section.id, key = %child_key, "Not persisting nested section");
                            continue;
                        }
                        write_leaf(&mut writer, child_key, child)?;
                    }
                    writer.end("section").map_err(ser)?;
                }
                _ => write_leaf(&mut writer, key, item)?,
            }
        }
        writer.end("toolbox").map_err(ser)?;
        Ok(writer.into_string())
    }

    /// Write the panel to `path` through a temp file and rename. With a
    /// tracking directory, a timestamped copy is written there first and
    /// then copied over `path`. Returns the tracking copy when one was made.
    pub fn save(&self, path: &Path, tracking_dir: Option<&Path>) -> Result<Option<PathBuf>, PersistenceError> {
        let document = self.to_xml()?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| PersistenceError::io(parent, e))?;
        }

        let tracked = match tracking_dir {
            Some(dir) => {
                fs::create_dir_all(dir).map_err(|e| PersistenceError::io(dir, e))?;
                let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.6f");
                let tracked = dir.join(format!("integrated_tool_panel-{}.xml", stamp));
                fs::write(&tracked, &document).map_err(|e| PersistenceError::io(&tracked, e))?;
                Some(tracked)
            }
            None => None,
        };

        let temp_path = temp_path_for(path);
        let written = match &tracked {
            Some(tracked) => fs::copy(tracked, &temp_path).map(|_| ()),
            None => fs::write(&temp_path, &document),
        };
        written.map_err(|e| PersistenceError::io(&temp_path, e))?;

        if let Err(e) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(PersistenceError::io(path, e));
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o644))
                .map_err(|e| PersistenceError::io(path, e))?;
        }

        debug!(path = %path.display(), "Saved integrated panel");
        Ok(tracked)
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "integrated_tool_panel.xml".into());
    name.push(".tmp");
    path.with_file_name(name)
}

fn stub_for(element: &XmlElement) -> Option<(String, PanelItem)> {
    match element.name.as_str() {
        "tool" => element
            .attr("id")
            .map(|id| (tool_key(id), PanelItem::Tool(None))),
        "workflow" => element
            .attr("id")
            .map(|id| (workflow_key(id), PanelItem::Workflow(None))),
        "label" => {
            let id = element.attr("id")?;
            let label = ToolSectionLabel::new(
                id,
                element.attr("text").unwrap_or_default(),
                element.attr("version").unwrap_or_default(),
            );
            Some((label_key(id), PanelItem::Label(label)))
        }
        _ => None,
    }
}

fn write_leaf(writer: &mut XmlWriter, key: &str, item: &PanelItem) -> Result<(), PersistenceError> {
    let ser = PersistenceError::Serialize;
    match item {
        PanelItem::Tool(tool) => {
            let id = match tool {
                Some(tool) => tool.panel_id(),
                None => key.trim_start_matches(TOOL_PREFIX),
            };
            writer.empty("tool", &[("id", id)]).map_err(ser)
        }
        PanelItem::Workflow(workflow) => {
            let id = match workflow {
                Some(workflow) => workflow.id.as_str(),
                None => key.trim_start_matches(WORKFLOW_PREFIX),
            };
            writer.empty("workflow", &[("id", id)]).map_err(ser)
        }
        PanelItem::Label(label) => writer
            .empty(
                "label",
                &[
                    ("id", label.id.as_str()),
                    ("text", label.text.as_str()),
                    ("version", label.version.as_str()),
                ],
            )
            .map_err(ser),
        PanelItem::Section(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::Tool;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn sample() -> IntegratedPanel {
        let mut elements = ToolPanelElements::new();
        elements.append("label_top", PanelItem::Label(ToolSectionLabel::new("top", "Top & Co", "")));
        elements.append_tool(Arc::new(Tool::new("cat1", "1.0")));
        elements.append("workflow_wf1", PanelItem::Workflow(None));
        let mut section = ToolSection::new("text", "Text Tools", "");
        section.elems.append("tool_sort1", PanelItem::Tool(None));
        elements.append("text", PanelItem::Section(section));
        IntegratedPanel::from_elements(elements)
    }

    #[test]
    fn test_save_and_load_round_trip_as_stubs() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("integrated_tool_panel.xml");
        let panel = sample();
        assert!(panel.save(&path, None).unwrap().is_none());

        let loaded = IntegratedPanel::load(&path).unwrap();
        let keys: Vec<&String> = loaded.elements().keys().collect();
        assert_eq!(keys, vec!["label_top", "tool_cat1", "workflow_wf1", "text"]);
        assert!(loaded.elements().get("tool_cat1").unwrap().is_stub());
        match loaded.elements().get("label_top").unwrap() {
            PanelItem::Label(label) => assert_eq!(label.text, "Top & Co"),
            other => panic!("expected label, got {:?}", other),
        }
        assert_eq!(
            loaded.elements().get_section_for_tool_id("sort1"),
            Some(&("text".to_string(), "Text Tools".to_string()))
        );
        assert!(!temp_path_for(&path).exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_save_resets_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("panel.xml");
        sample().save(&path, None).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn test_tracking_directory_keeps_timestamped_copy() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("panel.xml");
        let tracking = temp_dir.path().join("history");
        let tracked = sample().save(&path, Some(&tracking)).unwrap().unwrap();

        assert!(tracked.starts_with(&tracking));
        let name = tracked.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("integrated_tool_panel-") && name.ends_with(".xml"));
        assert_eq!(fs::read(&tracked).unwrap(), fs::read(&path).unwrap());
    }

    #[test]
    fn test_missing_file_is_empty_and_garbage_is_malformed() {
        let temp_dir = TempDir::new().unwrap();
        let missing = IntegratedPanel::load(&temp_dir.path().join("none.xml")).unwrap();
        assert!(!missing.has_contents());

        let bad = temp_dir.path().join("bad.xml");
        fs::write(&bad, "<notatoolbox/>").unwrap();
        assert!(matches!(
            IntegratedPanel::load(&bad),
            Err(PersistenceError::Malformed { .. })
        ));
    }
}
