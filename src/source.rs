//! Configuration Sources
//!
//! One on-disk configuration document describing part of the panel tree.
//! Two encodings are supported and selected purely by file extension:
//! nested-element (`.xml`) and flat-document (`.yml` / `.yaml`). Both produce
//! identical `ConfItem` trees for equivalent content.

use crate::error::ConfigParseError;
use std::path::{Path, PathBuf};

mod item;
mod xml;
mod yaml;

pub use item::{ConfItem, ToolConfItem};
pub use xml::XmlConfigSource;
pub use yaml::YamlConfigSource;

/// A parsed configuration document.
pub trait ConfigSource: Send + Sync {
    /// File this source was read from.
    fn path(&self) -> &Path;

    /// Items in declaration order.
    fn parse_items(&self) -> Result<Vec<ConfItem>, ConfigParseError>;

    /// Base directory tool files are resolved against, when the document
    /// declares one. Relative declarations resolve against the document's
    /// own directory.
    fn parse_base_path(&self) -> Option<PathBuf>;

    /// Whether entries are expected to be added at runtime by another
    /// subsystem (e.g. a shed installer).
    fn is_dynamic(&self) -> bool;

    /// Whether the document and its tools should be watched for changes.
    fn should_monitor(&self) -> bool;
}

/// Document-level attributes plus items, shared by both encodings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ToolboxDocument {
    pub tool_path: Option<String>,
    pub monitor: bool,
    pub dynamic: bool,
    pub items: Vec<ConfItem>,
}

impl ToolboxDocument {
    pub fn base_path(&self, document_path: &Path) -> Option<PathBuf> {
        let declared = self.tool_path.as_deref()?;
        let declared = Path::new(declared);
        if declared.is_absolute() {
            return Some(declared.to_path_buf());
        }
        let parent = document_path.parent().unwrap_or_else(|| Path::new("."));
        Some(parent.join(declared))
    }
}

/// Supported document encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    NestedElement,
    FlatDocument,
}

impl SourceFormat {
    /// Select an encoding from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "xml" => Some(SourceFormat::NestedElement),
            "yml" | "yaml" => Some(SourceFormat::FlatDocument),
            _ => None,
        }
    }
}

/// Open and parse a configuration document.
pub fn open_config_source(path: &Path) -> Result<Box<dyn ConfigSource>, ConfigParseError> {
    match SourceFormat::from_path(path) {
        Some(SourceFormat::NestedElement) => Ok(Box::new(XmlConfigSource::open(path)?)),
        Some(SourceFormat::FlatDocument) => Ok(Box::new(YamlConfigSource::open(path)?)),
        None => Err(ConfigParseError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Expand a configured path into document files: directories yield their
/// supported documents sorted by name, files are returned as-is.
pub fn expand_source_paths(path: &Path) -> Vec<PathBuf> {
    if !path.is_dir() {
        return vec![path.to_path_buf()];
    }
    let mut files: Vec<PathBuf> = match std::fs::read_dir(path) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|p| p.is_file() && SourceFormat::from_path(p).is_some())
            .collect(),
        Err(_) => Vec::new(),
    };
    files.sort();
    files
}

pub(crate) fn read_document(path: &Path) -> Result<String, ConfigParseError> {
    std::fs::read_to_string(path).map_err(|source| ConfigParseError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Split a comma-separated label list.
pub(crate) fn split_labels(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const XML_DOC: &str = r#"<?xml version="1.0"?>
<toolbox tool_path="tools" monitor="true">
    <label id="top" text="Top"/>
    <tool file="cat.xml" labels="new, beta"/>
    <workflow id="wf1"/>
    <section id="text" name="Text Tools">
        <tool file="sort.xml" guid="shed.example.org/repos/owner/sort/sort1/1.0">
            <tool_shed>shed.example.org</tool_shed>
            <repository_name>sort</repository_name>
            <repository_owner>owner</repository_owner>
            <installed_changeset_revision>abc123</installed_changeset_revision>
        </tool>
        <label id="sub" text="Sub"/>
    </section>
    <tool_dir dir="extra" recursive="false"/>
</toolbox>
"#;

    const YAML_DOC: &str = r#"
tool_path: tools
monitor: true
items:
  - type: label
    id: top
    text: Top
  - type: tool
    file: cat.xml
    labels: [new, beta]
  - type: workflow
    id: wf1
  - type: section
    id: text
    name: Text Tools
    items:
      - type: tool
        file: sort.xml
        guid: shed.example.org/repos/owner/sort/sort1/1.0
        tool_shed:
          tool_shed: shed.example.org
          repository_name: sort
          repository_owner: owner
          installed_changeset_revision: abc123
      - type: label
        id: sub
        text: Sub
  - type: tool_dir
    dir: extra
    recursive: false
"#;

    #[test]
    fn test_encodings_produce_identical_items() {
        let temp_dir = TempDir::new().unwrap();
        let xml_path = temp_dir.path().join("tool_conf.xml");
        let yaml_path = temp_dir.path().join("tool_conf.yml");
        std::fs::write(&xml_path, XML_DOC).unwrap();
        std::fs::write(&yaml_path, YAML_DOC).unwrap();

        let xml = open_config_source(&xml_path).unwrap();
        let yaml = open_config_source(&yaml_path).unwrap();

        let xml_items = xml.parse_items().unwrap();
        assert_eq!(xml_items, yaml.parse_items().unwrap());
        assert_eq!(xml_items.len(), 5);
        assert_eq!(xml.parse_base_path(), Some(temp_dir.path().join("tools")));
        assert_eq!(xml.parse_base_path(), yaml.parse_base_path());
        assert!(xml.should_monitor() && yaml.should_monitor());
        assert!(!xml.is_dynamic() && !yaml.is_dynamic());

        match &xml_items[3] {
            ConfItem::Section { id, items, .. } => {
                assert_eq!(id, "text");
                match &items[0] {
                    ConfItem::Tool(tool) => {
                        let shed = tool.tool_shed.as_ref().unwrap();
                        assert_eq!(shed.repository_owner, "owner");
                        assert!(shed.is_complete());
                    }
                    other => panic!("expected tool, got {:?}", other),
                }
            }
            other => panic!("expected section, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_document_names_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.xml");
        std::fs::write(&path, "<toolbox><section id=\"a\"></toolbox>").unwrap();

        let err = open_config_source(&path).err().unwrap();
        assert_eq!(err.path(), path.as_path());
        assert!(err.to_string().contains("broken.xml"));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = open_config_source(Path::new("tool_conf.ini")).err().unwrap();
        assert!(matches!(err, ConfigParseError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_expand_directory_sorted() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("b.yml"), "[]").unwrap();
        std::fs::write(temp_dir.path().join("a.xml"), "<toolbox/>").unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), "").unwrap();

        let files = expand_source_paths(temp_dir.path());
        assert_eq!(
            files,
            vec![temp_dir.path().join("a.xml"), temp_dir.path().join("b.yml")]
        );
    }
}
