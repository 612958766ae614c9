//! Nested-element configuration documents.

use super::item::{ConfItem, ToolConfItem};
use super::{read_document, split_labels, ConfigSource, ToolboxDocument};
use crate::error::ConfigParseError;
use crate::tool::ShedProvenance;
use crate::xml::{as_bool, parse_document, XmlElement};
use std::path::{Path, PathBuf};

/// `<toolbox>` document source.
#[derive(Debug, Clone)]
pub struct XmlConfigSource {
    path: PathBuf,
    document: ToolboxDocument,
}

impl XmlConfigSource {
    pub fn open(path: &Path) -> Result<Self, ConfigParseError> {
        let text = read_document(path)?;
        let document = Self::parse(path, &text)?;
        Ok(Self {
            path: path.to_path_buf(),
            document,
        })
    }

    pub(crate) fn parse(path: &Path, text: &str) -> Result<ToolboxDocument, ConfigParseError> {
        let root = parse_document(text).map_err(|e| ConfigParseError::malformed(path, e))?;
        if root.name != "toolbox" {
            return Err(ConfigParseError::malformed(
                path,
                format!("root element is <{}>, expected <toolbox>", root.name),
            ));
        }
        let items = parse_children(path, &root)?;
        Ok(ToolboxDocument {
            tool_path: root.attr("tool_path").map(str::to_string),
            monitor: root.attr("monitor").map(as_bool).unwrap_or(false),
            dynamic: root.attr("dynamic").map(as_bool).unwrap_or(false),
            items,
        })
    }
}

impl ConfigSource for XmlConfigSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn parse_items(&self) -> Result<Vec<ConfItem>, ConfigParseError> {
        Ok(self.document.items.clone())
    }

    fn parse_base_path(&self) -> Option<PathBuf> {
        self.document.base_path(&self.path)
    }

    fn is_dynamic(&self) -> bool {
        self.document.dynamic
    }

    fn should_monitor(&self) -> bool {
        self.document.monitor
    }
}

fn parse_children(path: &Path, parent: &XmlElement) -> Result<Vec<ConfItem>, ConfigParseError> {
    let mut items = Vec::new();
    for element in &parent.children {
        if let Some(item) = parse_item(path, element)? {
            items.push(item);
        }
    }
    Ok(items)
}

fn parse_item(path: &Path, element: &XmlElement) -> Result<Option<ConfItem>, ConfigParseError> {
    let required = |name: &str| {
        element
            .attr(name)
            .map(str::to_string)
            .ok_or_else(|| {
                ConfigParseError::malformed(
                    path,
                    format!("<{}> is missing the '{}' attribute", element.name, name),
                )
            })
    };

    let item = match element.name.as_str() {
        "tool" => ConfItem::Tool(ToolConfItem {
            file: PathBuf::from(required("file")?),
            guid: element.attr("guid").map(str::to_string),
            hidden: element.attr("hidden").map(as_bool).unwrap_or(false),
            labels: element.attr("labels").map(split_labels).unwrap_or_default(),
            tool_shed: parse_provenance(element),
        }),
        "label" => {
            let text = required("text")?;
            ConfItem::Label {
                id: element.attr("id").map(str::to_string).unwrap_or_else(|| text.clone()),
                text,
                version: element.attr("version").unwrap_or_default().to_string(),
            }
        }
        "workflow" => ConfItem::Workflow { id: required("id")? },
        "section" => ConfItem::Section {
            id: required("id")?,
            name: element.attr("name").unwrap_or_default().to_string(),
            version: element.attr("version").unwrap_or_default().to_string(),
            items: parse_children(path, element)?,
        },
        "tool_dir" => ConfItem::ToolDir {
            dir: PathBuf::from(required("dir")?),
            recursive: element.attr("recursive").map(as_bool).unwrap_or(true),
        },
        other => {
            tracing::debug!(element = other, path = %path.display(), "Ignoring unknown config element");
            return Ok(None);
        }
    };
    Ok(Some(item))
}

fn parse_provenance(element: &XmlElement) -> Option<ShedProvenance> {
    let provenance = ShedProvenance {
        tool_shed: element.child_text("tool_shed").unwrap_or_default(),
        repository_name: element.child_text("repository_name").unwrap_or_default(),
        repository_owner: element.child_text("repository_owner").unwrap_or_default(),
        installed_changeset_revision: element
            .child_text("installed_changeset_revision")
            .unwrap_or_default(),
    };
    (provenance != ShedProvenance::default()).then_some(provenance)
}
