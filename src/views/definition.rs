//! Static view documents.
//!
//! YAML:
//!
//! ```yaml
//! id: curated
//! name: Curated Tools
//! excludes:
//!   - tool_id_regex: "^scratch_"
//! items:
//!   - type: label
//!     text: Favourites
//!   - type: tool
//!     id: cat1
//!   - type: section
//!     id: text
//!     name: Text
//!     items:
//!       - type: items_from
//!         items_from: text_tools
//!         excludes:
//!           - types: [label]
//!   - type: section_alias
//!     section: filters
//! ```
//!
//! The XML encoding uses a `<view id name type>` root with the same item
//! element names and `<exclude tool_id=.. tool_id_regex=.. types=..>`
//! children.

use crate::error::ViewError;
use crate::panel::PanelItemKind;
use crate::tool::Tool;
use crate::xml::{parse_document, XmlElement};
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

/// One exclusion applied to the items of a node and everything below it.
#[derive(Debug, Clone)]
pub enum ExcludeRule {
    ToolId(String),
    /// Anchored at the start of the id.
    ToolIdRegex(Regex),
    Types(Vec<PanelItemKind>),
}

impl ExcludeRule {
    pub fn tool_id_regex(pattern: &str) -> Result<Self, ViewError> {
        Regex::new(&format!("^(?:{})", pattern))
            .map(ExcludeRule::ToolIdRegex)
            .map_err(|e| ViewError::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })
    }

    pub fn excludes_tool(&self, tool: &Tool) -> bool {
        match self {
            ExcludeRule::ToolId(id) => tool.id == *id || tool.panel_id() == id,
            ExcludeRule::ToolIdRegex(regex) => regex.is_match(&tool.id) || regex.is_match(tool.panel_id()),
            ExcludeRule::Types(kinds) => kinds.contains(&PanelItemKind::Tool),
        }
    }

    pub fn excludes_kind(&self, kind: PanelItemKind) -> bool {
        matches!(self, ExcludeRule::Types(kinds) if kinds.contains(&kind))
    }
}

/// An entry of a static view.
#[derive(Debug, Clone)]
pub enum ViewItem {
    Tool {
        id: String,
    },
    Workflow {
        id: String,
    },
    Label {
        id: String,
        text: String,
    },
    Section {
        id: String,
        name: String,
        items: Vec<ViewItem>,
        excludes: Vec<ExcludeRule>,
    },
    /// Copy a live section, under its own key and name.
    SectionAlias {
        section: String,
        excludes: Vec<ExcludeRule>,
    },
    /// Splice the children of a live section into the current container.
    ItemsFrom {
        section: String,
        excludes: Vec<ExcludeRule>,
    },
}

/// A parsed static view document.
#[derive(Debug, Clone)]
pub struct StaticViewDefinition {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub view_type: String,
    /// `None` when the document declares no items.
    pub items: Option<Vec<ViewItem>>,
    pub excludes: Vec<ExcludeRule>,
}

#[derive(Debug, Deserialize)]
struct RawDefinition {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, rename = "type")]
    view_type: Option<String>,
    #[serde(default)]
    items: Option<Vec<RawItem>>,
    #[serde(default)]
    excludes: Vec<RawExclude>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawItem {
    Tool {
        id: String,
    },
    Workflow {
        id: String,
    },
    Label {
        #[serde(default)]
        id: Option<String>,
        text: String,
    },
    Section {
        id: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        items: Vec<RawItem>,
        #[serde(default)]
        excludes: Vec<RawExclude>,
    },
    SectionAlias {
        section: String,
        #[serde(default)]
        excludes: Vec<RawExclude>,
    },
    ItemsFrom {
        items_from: String,
        #[serde(default)]
        excludes: Vec<RawExclude>,
    },
}

#[derive(Debug, Default, Deserialize)]
struct RawExclude {
    #[serde(default)]
    tool_id: Option<String>,
    #[serde(default)]
    tool_id_regex: Option<String>,
    #[serde(default)]
    types: Option<Vec<String>>,
}

impl RawExclude {
    fn into_rule(self, path: &Path) -> Result<ExcludeRule, ViewError> {
        match (self.tool_id, self.tool_id_regex, self.types) {
            (Some(id), None, None) => Ok(ExcludeRule::ToolId(id)),
            (None, Some(pattern), None) => ExcludeRule::tool_id_regex(&pattern),
            (None, None, Some(types)) => types
                .iter()
                .map(|t| t.parse::<PanelItemKind>())
                .collect::<Result<Vec<_>, _>>()
                .map(ExcludeRule::Types)
                .map_err(|message| invalid(path, message)),
            _ => Err(invalid(
                path,
                "each exclude needs exactly one of tool_id, tool_id_regex or types",
            )),
        }
    }
}

fn invalid(path: &Path, message: impl std::fmt::Display) -> ViewError {
    ViewError::InvalidDefinition {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

fn convert_excludes(path: &Path, raw: Vec<RawExclude>) -> Result<Vec<ExcludeRule>, ViewError> {
    raw.into_iter().map(|e| e.into_rule(path)).collect()
}

fn convert_item(path: &Path, raw: RawItem) -> Result<ViewItem, ViewError> {
    Ok(match raw {
        RawItem::Tool { id } => ViewItem::Tool { id },
        RawItem::Workflow { id } => ViewItem::Workflow { id },
        RawItem::Label { id, text } => ViewItem::Label {
            id: id.unwrap_or_else(|| text.clone()),
            text,
        },
        RawItem::Section {
            id,
            name,
            items,
            excludes,
        } => ViewItem::Section {
            name: name.unwrap_or_else(|| id.clone()),
            id,
            items: items
                .into_iter()
                .map(|i| convert_item(path, i))
                .collect::<Result<_, _>>()?,
            excludes: convert_excludes(path, excludes)?,
        },
        RawItem::SectionAlias { section, excludes } => ViewItem::SectionAlias {
            section,
            excludes: convert_excludes(path, excludes)?,
        },
        RawItem::ItemsFrom {
            items_from,
            excludes,
        } => ViewItem::ItemsFrom {
            section: items_from,
            excludes: convert_excludes(path, excludes)?,
        },
    })
}

fn default_id(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "static".to_string())
}

impl StaticViewDefinition {
    /// Read a view document, selecting the encoding by extension.
    pub fn from_file(path: &Path) -> Result<Self, ViewError> {
        let text = std::fs::read_to_string(path).map_err(|e| invalid(path, e))?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("yml") | Some("yaml") => Self::from_yaml(path, &text),
            Some("xml") => Self::from_xml(path, &text),
            _ => Err(invalid(path, "unsupported view document extension")),
        }
    }

    pub fn from_yaml(path: &Path, text: &str) -> Result<Self, ViewError> {
        let raw: RawDefinition = serde_yaml::from_str(text).map_err(|e| invalid(path, e))?;
        let id = raw.id.unwrap_or_else(|| default_id(path));
        Ok(Self {
            name: raw.name.unwrap_or_else(|| id.clone()),
            id,
            description: raw.description,
            view_type: raw.view_type.unwrap_or_else(|| "generic".to_string()),
            items: raw
                .items
                .map(|items| {
                    items
                        .into_iter()
                        .map(|i| convert_item(path, i))
                        .collect::<Result<Vec<_>, _>>()
                })
                .transpose()?,
            excludes: convert_excludes(path, raw.excludes)?,
        })
    }

    pub fn from_xml(path: &Path, text: &str) -> Result<Self, ViewError> {
        let root = parse_document(text).map_err(|e| invalid(path, e))?;
        if root.name != "view" {
            return Err(invalid(
                path,
                format!("root element is <{}>, expected <view>", root.name),
            ));
        }
        let id = root
            .attr("id")
            .map(str::to_string)
            .unwrap_or_else(|| default_id(path));
        let (items, excludes) = xml_children(path, &root)?;
        Ok(Self {
            name: root.attr("name").map(str::to_string).unwrap_or_else(|| id.clone()),
            id,
            description: root.child_text("description"),
            view_type: root.attr("type").unwrap_or("generic").to_string(),
            items: (!items.is_empty()).then_some(items),
            excludes,
        })
    }
}

fn xml_children(path: &Path, parent: &XmlElement) -> Result<(Vec<ViewItem>, Vec<ExcludeRule>), ViewError> {
    let mut items = Vec::new();
    let mut excludes = Vec::new();
    for child in &parent.children {
        let required = |name: &str| {
            child
                .attr(name)
                .map(str::to_string)
                .ok_or_else(|| invalid(path, format!("<{}> is missing '{}'", child.name, name)))
        };
        match child.name.as_str() {
            "exclude" => {
                let raw = RawExclude {
                    tool_id: child.attr("tool_id").map(str::to_string),
                    tool_id_regex: child.attr("tool_id_regex").map(str::to_string),
                    types: child.attr("types").map(|t| {
                        t.split(',')
                            .map(|s| s.trim().to_string())
                            .filter(|s| !s.is_empty())
                            .collect()
                    }),
                };
                excludes.push(raw.into_rule(path)?);
            }
            "tool" => items.push(ViewItem::Tool { id: required("id")? }),
            "workflow" => items.push(ViewItem::Workflow { id: required("id")? }),
            "label" => {
                let text = required("text")?;
                items.push(ViewItem::Label {
                    id: child.attr("id").map(str::to_string).unwrap_or_else(|| text.clone()),
                    text,
                });
            }
            "section" => {
                let id = required("id")?;
                let (children, section_excludes) = xml_children(path, child)?;
                items.push(ViewItem::Section {
                    name: child.attr("name").map(str::to_string).unwrap_or_else(|| id.clone()),
                    id,
                    items: children,
                    excludes: section_excludes,
                });
            }
            "section_alias" | "items_from" => {
                let section = required("section")?;
                let (_, nested_excludes) = xml_children(path, child)?;
                items.push(if child.name == "section_alias" {
                    ViewItem::SectionAlias {
                        section,
                        excludes: nested_excludes,
                    }
                } else {
                    ViewItem::ItemsFrom {
                        section,
                        excludes: nested_excludes,
                    }
                });
            }
            "description" => {}
            other => {
                return Err(invalid(path, format!("unknown view element <{}>", other)));
            }
        }
    }
    Ok((items, excludes))
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
id: curated
name: Curated
excludes:
  - tool_id_regex: "scratch_"
items:
  - type: label
    text: Favourites
  - type: tool
    id: cat1
  - type: section
    id: text
    items:
      - type: items_from
        items_from: text_tools
        excludes:
          - types: [label, workflow]
  - type: section_alias
    section: filters
"#;

    const XML: &str = r#"<view id="curated" name="Curated">
    <exclude tool_id_regex="scratch_"/>
    <label text="Favourites"/>
    <tool id="cat1"/>
    <section id="text">
        <items_from section="text_tools">
            <exclude types="label,workflow"/>
        </items_from>
    </section>
    <section_alias section="filters"/>
</view>"#;

    fn shape(def: &StaticViewDefinition) -> Vec<String> {
        fn walk(items: &[ViewItem], out: &mut Vec<String>) {
            for item in items {
                match item {
                    ViewItem::Tool { id } => out.push(format!("tool:{}", id)),
                    ViewItem::Workflow { id } => out.push(format!("workflow:{}", id)),
                    ViewItem::Label { id, .. } => out.push(format!("label:{}", id)),
                    ViewItem::Section { id, items, .. } => {
                        out.push(format!("section:{}", id));
                        walk(items, out);
                    }
                    ViewItem::SectionAlias { section, excludes } => {
                        out.push(format!("alias:{}:{}", section, excludes.len()))
                    }
                    ViewItem::ItemsFrom { section, excludes } => {
                        out.push(format!("from:{}:{}", section, excludes.len()))
                    }
                }
            }
        }
        let mut out = Vec::new();
        walk(def.items.as_deref().unwrap_or_default(), &mut out);
        out
    }

    #[test]
    fn test_yaml_and_xml_definitions_agree() {
        let yaml = StaticViewDefinition::from_yaml(Path::new("curated.yml"), YAML).unwrap();
        let xml = StaticViewDefinition::from_xml(Path::new("curated.xml"), XML).unwrap();
        assert_eq!(shape(&yaml), shape(&xml));
        assert_eq!(
            shape(&yaml),
            vec![
                "label:Favourites",
                "tool:cat1",
                "section:text",
                "from:text_tools:1",
                "alias:filters:0"
            ]
        );
        assert_eq!(yaml.id, xml.id);
        assert_eq!(yaml.excludes.len(), 1);
        assert_eq!(xml.excludes.len(), 1);
    }

    #[test]
    fn test_regex_excludes_are_anchored() {
        let rule = ExcludeRule::tool_id_regex("cat").unwrap();
        assert!(rule.excludes_tool(&Tool::new("cat1", "1")));
        assert!(!rule.excludes_tool(&Tool::new("concat", "1")));
        assert!(matches!(
            ExcludeRule::tool_id_regex("("),
            Err(ViewError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_missing_items_means_mirror() {
        let def = StaticViewDefinition::from_yaml(
            Path::new("mirror.yml"),
            "excludes:\n  - tool_id: x\n",
        )
        .unwrap();
        assert_eq!(def.id, "mirror");
        assert!(def.items.is_none());
        assert!(StaticViewDefinition::from_yaml(Path::new("bad.yml"), "excludes:\n  - {}\n").is_err());
    }
}
