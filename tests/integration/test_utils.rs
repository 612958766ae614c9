//! Shared fixtures: a temporary workspace holding tool files and
//! configuration documents.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use toolpanel::config::ToolBoxConfig;
use toolpanel::panel::{PanelItem, ToolPanelElements};
use toolpanel::ToolBox;

pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root().join(name)
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub fn write_tool(&self, file: &str, id: &str, version: &str) -> PathBuf {
        self.write(
            file,
            &format!(
                r#"<tool id="{id}" name="{id} tool" version="{version}"/>"#,
                id = id,
                version = version
            ),
        )
    }

    /// Config listing `sources` in order, everything else defaulted.
    pub fn config(&self, sources: &[&str]) -> ToolBoxConfig {
        ToolBoxConfig {
            tool_config_files: sources.iter().map(|s| self.path(s)).collect(),
            tool_path: self.root().to_path_buf(),
            integrated_tool_panel_config: self.path("integrated_tool_panel.xml"),
            parse_retry_delay_ms: 1,
            ..ToolBoxConfig::default()
        }
    }

    pub fn toolbox(&self, sources: &[&str]) -> ToolBox {
        ToolBox::builder(self.config(sources)).build()
    }
}

/// Push a file's modification time forward without touching its content.
pub fn bump_mtime(path: &Path) {
    std::fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(5))
        .unwrap();
}

pub fn keys(elements: &ToolPanelElements) -> Vec<String> {
    elements.keys().cloned().collect()
}

/// Keys of the whole tree, section children as `section/key`.
pub fn tree_keys(elements: &ToolPanelElements) -> Vec<String> {
    let mut out = Vec::new();
    for (key, item) in elements.iter() {
        out.push(key.clone());
        if let PanelItem::Section(section) = item {
            out.extend(section.elems.keys().map(|k| format!("{}/{}", key, k)));
        }
    }
    out
}
