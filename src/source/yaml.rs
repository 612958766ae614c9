//! Flat-document configuration sources.
//!
//! The document is either a bare sequence of items or a mapping carrying
//! document attributes next to an `items` sequence.

use super::item::{ConfItem, ToolConfItem};
use super::{read_document, split_labels, ConfigSource, ToolboxDocument};
use crate::error::ConfigParseError;
use crate::tool::ShedProvenance;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct YamlToolbox {
    #[serde(default)]
    tool_path: Option<String>,
    #[serde(default)]
    monitor: bool,
    #[serde(default)]
    dynamic: bool,
    #[serde(default)]
    items: Vec<YamlItem>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LabelList {
    List(Vec<String>),
    Csv(String),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum YamlItem {
    Tool {
        file: PathBuf,
        #[serde(default)]
        guid: Option<String>,
        #[serde(default)]
        hidden: bool,
        #[serde(default)]
        labels: Option<LabelList>,
        #[serde(default)]
        tool_shed: Option<ShedProvenance>,
    },
    Label {
        #[serde(default)]
        id: Option<String>,
        text: String,
        #[serde(default)]
        version: String,
    },
    Workflow {
        id: String,
    },
    Section {
        id: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        version: String,
        #[serde(default)]
        items: Vec<YamlItem>,
    },
    ToolDir {
        dir: PathBuf,
        #[serde(default = "default_recursive")]
        recursive: bool,
    },
}

fn default_recursive() -> bool {
    true
}

impl From<YamlItem> for ConfItem {
    fn from(item: YamlItem) -> Self {
        match item {
            YamlItem::Tool {
                file,
                guid,
                hidden,
                labels,
                tool_shed,
            } => ConfItem::Tool(ToolConfItem {
                file,
                guid,
                hidden,
                labels: match labels {
                    Some(LabelList::List(list)) => list,
                    Some(LabelList::Csv(csv)) => split_labels(&csv),
                    None => Vec::new(),
                },
                tool_shed: tool_shed.filter(|p| *p != ShedProvenance::default()),
            }),
            YamlItem::Label { id, text, version } => ConfItem::Label {
                id: id.unwrap_or_else(|| text.clone()),
                text,
                version,
            },
            YamlItem::Workflow { id } => ConfItem::Workflow { id },
            YamlItem::Section {
                id,
                name,
                version,
                items,
            } => ConfItem::Section {
                id,
                name,
                version,
                items: items.into_iter().map(ConfItem::from).collect(),
            },
            YamlItem::ToolDir { dir, recursive } => ConfItem::ToolDir { dir, recursive },
        }
    }
}

/// YAML document source.
#[derive(Debug, Clone)]
pub struct YamlConfigSource {
    path: PathBuf,
    document: ToolboxDocument,
}

impl YamlConfigSource {
    pub fn open(path: &Path) -> Result<Self, ConfigParseError> {
        let text = read_document(path)?;
        let document = Self::parse(path, &text)?;
        Ok(Self {
            path: path.to_path_buf(),
            document,
        })
    }

    pub(crate) fn parse(path: &Path, text: &str) -> Result<ToolboxDocument, ConfigParseError> {
        let value: serde_yaml::Value =
            serde_yaml::from_str(text).map_err(|e| ConfigParseError::malformed(path, e))?;

        let toolbox = match value {
            serde_yaml::Value::Null => YamlToolbox {
                tool_path: None,
                monitor: false,
                dynamic: false,
                items: Vec::new(),
            },
            serde_yaml::Value::Sequence(_) => YamlToolbox {
                tool_path: None,
                monitor: false,
                dynamic: false,
                items: serde_yaml::from_value(value)
                    .map_err(|e| ConfigParseError::malformed(path, e))?,
            },
            serde_yaml::Value::Mapping(_) => {
                serde_yaml::from_value(value).map_err(|e| ConfigParseError::malformed(path, e))?
            }
            _ => {
                return Err(ConfigParseError::malformed(
                    path,
                    "expected a sequence of items or a mapping with 'items'",
                ))
            }
        };

        Ok(ToolboxDocument {
            tool_path: toolbox.tool_path,
            monitor: toolbox.monitor,
            dynamic: toolbox.dynamic,
            items: toolbox.items.into_iter().map(ConfItem::from).collect(),
        })
    }
}

impl ConfigSource for YamlConfigSource {
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
