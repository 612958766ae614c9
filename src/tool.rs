//! Tool and workflow records plus the collaborator traits that produce them.
//!
//! The registry treats tools as opaque, already-parsed units. `ToolParser`
//! is the seam to whatever understands tool definitions; the bundled
//! `DescriptorToolParser` reads only the header fields the registry needs.

use crate::error::ToolLoadError;
use crate::xml::{as_bool, parse_document};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Remote-repository origin of a tool installed from a shed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ShedProvenance {
    pub tool_shed: String,
    pub repository_name: String,
    pub repository_owner: String,
    pub installed_changeset_revision: String,
}

impl ShedProvenance {
    /// True when every field needed for disambiguation is present.
    pub fn is_complete(&self) -> bool {
        !self.tool_shed.is_empty()
            && !self.repository_name.is_empty()
            && !self.repository_owner.is_empty()
            && !self.installed_changeset_revision.is_empty()
    }
}

/// A loaded tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tool {
    pub id: String,
    pub name: String,
    pub version: String,
    pub guid: Option<String>,
    pub old_id: Option<String>,
    pub hidden: bool,
    pub require_login: bool,
    pub config_file: PathBuf,
    pub tool_shed: Option<ShedProvenance>,
    pub labels: Vec<String>,
    /// Classification terms consumed by ontology views.
    pub ontology_terms: Vec<String>,
}

impl Tool {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            version: version.into(),
            guid: None,
            old_id: None,
            hidden: false,
            require_login: false,
            config_file: PathBuf::new(),
            tool_shed: None,
            labels: Vec::new(),
            ontology_terms: Vec::new(),
        }
    }

    /// Identifier used in the direct table and in `tool_<id>` panel keys:
    /// the guid for shed tools, the plain id otherwise.
    pub fn panel_id(&self) -> &str {
        self.guid.as_deref().unwrap_or(&self.id)
    }

    /// Guid with its trailing version component removed, shared by every
    /// release of a shed tool.
    pub fn versionless_guid(&self) -> Option<&str> {
        self.guid
            .as_deref()
            .and_then(|guid| guid.rsplit_once('/').map(|(prefix, _)| prefix))
    }

    pub fn is_shed_tool(&self) -> bool {
        self.guid.is_some()
            && self
                .tool_shed
                .as_ref()
                .map(ShedProvenance::is_complete)
                .unwrap_or(false)
    }
}

/// A saved workflow placed in the panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
}

impl Workflow {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Parses tool definition files into `Tool` records.
pub trait ToolParser: Send + Sync {
    /// Parse one tool file. `guid` comes from the config entry, when any.
    fn parse_tool(&self, path: &Path, guid: Option<&str>) -> Result<Tool, ToolLoadError>;

    /// Cheap check used when scanning tool directories.
    fn is_tool_like(&self, path: &Path) -> bool;
}

/// Resolves workflow ids placed in the panel.
pub trait WorkflowLoader: Send + Sync {
    fn load_workflow(&self, id: &str) -> Option<Workflow>;
}

/// In-memory workflow store.
#[derive(Default)]
pub struct StaticWorkflowLoader {
    workflows: RwLock<HashMap<String, Workflow>>,
}

impl StaticWorkflowLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, workflow: Workflow) {
        self.workflows.write().insert(workflow.id.clone(), workflow);
    }
}

impl WorkflowLoader for StaticWorkflowLoader {
    fn load_workflow(&self, id: &str) -> Option<Workflow> {
        self.workflows.read().get(id).cloned()
    }
}

/// Header of a YAML tool descriptor.
#[derive(Debug, Deserialize)]
struct YamlDescriptor {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default = "default_version")]
    version: String,
    #[serde(default)]
    old_id: Option<String>,
    #[serde(default)]
    hidden: bool,
    #[serde(default)]
    require_login: bool,
    #[serde(default)]
    edam_operations: Vec<String>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

/// Reads the header of XML (`<tool id=.. version=..>`) or YAML tool
/// descriptors. Parameters, commands and the rest of the definition are
/// left to the execution side.
#[derive(Debug, Default, Clone)]
pub struct DescriptorToolParser;

impl DescriptorToolParser {
    pub fn new() -> Self {
        Self
    }

    fn parse_xml(&self, path: &Path, text: &str) -> Result<Tool, ToolLoadError> {
        let root = parse_document(text).map_err(|e| ToolLoadError::parse(path, e))?;
        if root.name != "tool" {
            return Err(ToolLoadError::parse(
                path,
                format!("root element is <{}>, expected <tool>", root.name),
            ));
        }
        let id = root
            .attr("id")
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ToolLoadError::parse(path, "missing id attribute"))?;
        let mut tool = Tool::new(id, root.attr("version").unwrap_or("1.0.0"));
        tool.name = root.attr("name").unwrap_or(id).to_string();
        tool.old_id = root.attr("old_id").map(str::to_string);
        tool.hidden = root.attr("hidden").map(as_bool).unwrap_or(false);
        tool.require_login = root.attr("require_login").map(as_bool).unwrap_or(false);
        if let Some(ops) = root.child("edam_operations") {
            tool.ontology_terms = ops
                .children
                .iter()
                .filter(|c| c.name == "edam_operation")
                .map(|c| c.text.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
        }
        Ok(tool)
    }

    fn parse_yaml(&self, path: &Path, text: &str) -> Result<Tool, ToolLoadError> {
        let descriptor: YamlDescriptor =
            serde_yaml::from_str(text).map_err(|e| ToolLoadError::parse(path, e))?;
        let mut tool = Tool::new(descriptor.id.clone(), descriptor.version);
        tool.name = descriptor.name.unwrap_or(descriptor.id);
        tool.old_id = descriptor.old_id;
        tool.hidden = descriptor.hidden;
        tool.require_login = descriptor.require_login;
        tool.ontology_terms = descriptor.edam_operations;
        Ok(tool)
    }
}

impl ToolParser for DescriptorToolParser {
    fn parse_tool(&self, path: &Path, guid: Option<&str>) -> Result<Tool, ToolLoadError> {
        if !path.exists() {
            return Err(ToolLoadError::NotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path).map_err(|source| ToolLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut tool = match extension(path).as_deref() {
            Some("yml") | Some("yaml") => self.parse_yaml(path, &text)?,
            _ => self.parse_xml(path, &text)?,
        };
        tool.guid = guid.map(str::to_string);
        tool.config_file = path.to_path_buf();
        Ok(tool)
    }

    fn is_tool_like(&self, path: &Path) -> bool {
        let Ok(text) = std::fs::read_to_string(path) else {
            return false;
        };
        match extension(path).as_deref() {
            Some("xml") => parse_document(&text)
                .map(|root| root.name == "tool")
                .unwrap_or(false),
            Some("yml") | Some("yaml") => serde_yaml::from_str::<YamlDescriptor>(&text).is_ok(),
            _ => false,
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_xml_descriptor() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cat.xml");
        std::fs::write(
            &path,
            r#"<tool id="cat1" name="Concatenate" version="1.0.2" require_login="true">
    <edam_operations><edam_operation>operation_3436</edam_operation></edam_operations>
</tool>"#,
        )
        .unwrap();

        let parser = DescriptorToolParser::new();
        assert!(parser.is_tool_like(&path));
        let tool = parser.parse_tool(&path, Some("shed/repos/o/r/cat1/1.0.2")).unwrap();
        assert_eq!(tool.id, "cat1");
        assert_eq!(tool.name, "Concatenate");
        assert_eq!(tool.version, "1.0.2");
        assert!(tool.require_login);
        assert_eq!(tool.ontology_terms, vec!["operation_3436".to_string()]);
        assert_eq!(tool.panel_id(), "shed/repos/o/r/cat1/1.0.2");
        assert_eq!(tool.versionless_guid(), Some("shed/repos/o/r/cat1"));
    }

    #[test]
    fn test_parse_yaml_descriptor() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sort.yml");
        std::fs::write(&path, "id: sort1\nversion: '2.0'\nhidden: true\n").unwrap();

        let tool = DescriptorToolParser::new().parse_tool(&path, None).unwrap();
        assert_eq!(tool.id, "sort1");
        assert_eq!(tool.version, "2.0");
        assert!(tool.hidden);
        assert_eq!(tool.panel_id(), "sort1");
    }

    #[test]
    fn test_non_tool_documents_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("macros.xml");
        std::fs::write(&path, "<macros><token name=\"x\"/></macros>").unwrap();

        let parser = DescriptorToolParser::new();
        assert!(!parser.is_tool_like(&path));
        assert!(parser.parse_tool(&path, None).is_err());
        assert!(matches!(
            parser.parse_tool(&temp_dir.path().join("missing.xml"), None),
            Err(ToolLoadError::NotFound(_))
        ));
    }
}
