//! Configuration System
//!
//! Registry settings loaded from layered sources (defaults, global file,
//! workspace files, environment) with validation that reports every problem
//! at once.

use crate::filter::FilterSettings;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

mod facade;
mod merge {
    pub mod merge_policy;
}
mod sources {
    pub mod global_file;
    pub mod workspace_file;
}

pub use facade::ConfigLoader;
pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolBoxConfig {
    /// Configuration documents or directories of documents, in load order
    #[serde(default)]
    pub tool_config_files: Vec<PathBuf>,

    /// Base directory for tool files when a document declares none
    #[serde(default = "default_tool_path")]
    pub tool_path: PathBuf,

    /// Persisted panel order
    #[serde(default = "default_integrated_tool_panel_config")]
    pub integrated_tool_panel_config: PathBuf,

    /// Keep a timestamped copy of every integrated panel write here
    #[serde(default)]
    pub integrated_tool_panel_tracking_directory: Option<PathBuf>,

    /// Never write the integrated panel
    #[serde(default)]
    pub read_only: bool,

    /// Watch tool files and tool directories of every source
    #[serde(default)]
    pub watch_tools: bool,

    /// Watch configuration documents and reload on change
    #[serde(default)]
    pub watch_tool_config_files: bool,

    #[serde(default = "default_watch_debounce_ms")]
    pub watch_debounce_ms: u64,

    /// Delay before the single retry of a source that failed to open
    #[serde(default = "default_parse_retry_delay_ms")]
    pub parse_retry_delay_ms: u64,

    #[serde(default)]
    pub tool_filters: Vec<String>,
    #[serde(default)]
    pub tool_section_filters: Vec<String>,
    #[serde(default)]
    pub tool_label_filters: Vec<String>,

    /// Allow-lists for filters callers may select
    #[serde(default)]
    pub user_tool_filters: Vec<String>,
    #[serde(default)]
    pub user_tool_section_filters: Vec<String>,
    #[serde(default)]
    pub user_tool_label_filters: Vec<String>,

    /// Shed hosts tried for `/repos/`-qualified lookups
    #[serde(default)]
    pub tool_sheds: Vec<String>,

    /// Directory of static view documents
    #[serde(default)]
    pub panel_views_dir: Option<PathBuf>,

    #[serde(default = "default_panel_view")]
    pub default_panel_view: String,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_tool_path() -> PathBuf {
    PathBuf::from("tools")
}

fn default_integrated_tool_panel_config() -> PathBuf {
    PathBuf::from("integrated_tool_panel.xml")
}

fn default_watch_debounce_ms() -> u64 {
    500
}

fn default_parse_retry_delay_ms() -> u64 {
    250
}

fn default_panel_view() -> String {
    crate::views::DEFAULT_VIEW_ID.to_string()
}

impl Default for ToolBoxConfig {
    fn default() -> Self {
        Self {
            tool_config_files: Vec::new(),
            tool_path: default_tool_path(),
            integrated_tool_panel_config: default_integrated_tool_panel_config(),
            integrated_tool_panel_tracking_directory: None,
            read_only: false,
            watch_tools: false,
            watch_tool_config_files: false,
            watch_debounce_ms: default_watch_debounce_ms(),
            parse_retry_delay_ms: default_parse_retry_delay_ms(),
            tool_filters: Vec::new(),
            tool_section_filters: Vec::new(),
            tool_label_filters: Vec::new(),
            user_tool_filters: Vec::new(),
            user_tool_section_filters: Vec::new(),
            user_tool_label_filters: Vec::new(),
            tool_sheds: Vec::new(),
            panel_views_dir: None,
            default_panel_view: default_panel_view(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Sources(String),
    Persistence(String),
    Filters(String),
    ToolSheds(String),
    Views(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Sources(msg) => write!(f, "Sources: {}", msg),
            ValidationError::Persistence(msg) => write!(f, "Persistence: {}", msg),
            ValidationError::Filters(msg) => write!(f, "Filters: {}", msg),
            ValidationError::ToolSheds(msg) => write!(f, "Tool sheds: {}", msg),
            ValidationError::Views(msg) => write!(f, "Views: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

fn resolve(base: &Path, path: &mut PathBuf) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

impl ToolBoxConfig {
    /// Make every configured path absolute against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        for file in &mut self.tool_config_files {
            resolve(base, file);
        }
        resolve(base, &mut self.tool_path);
        resolve(base, &mut self.integrated_tool_panel_config);
        if let Some(dir) = self.integrated_tool_panel_tracking_directory.as_mut() {
            resolve(base, dir);
        }
        if let Some(dir) = self.panel_views_dir.as_mut() {
            resolve(base, dir);
        }
        resolve(base, &mut self.logging.file);
    }

    pub fn filter_settings(&self) -> FilterSettings {
        FilterSettings {
            tool_filters: self.tool_filters.clone(),
            section_filters: self.tool_section_filters.clone(),
            label_filters: self.tool_label_filters.clone(),
            user_tool_filters: self.user_tool_filters.clone(),
            user_section_filters: self.user_tool_section_filters.clone(),
            user_label_filters: self.user_tool_label_filters.clone(),
        }
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.tool_config_files.is_empty() {
            errors.push(ValidationError::Sources(
                "tool_config_files must list at least one document".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for file in &self.tool_config_files {
            if !seen.insert(file) {
                errors.push(ValidationError::Sources(format!(
                    "{:?} is listed more than once",
                    file
                )));
            }
        }

        if self.integrated_tool_panel_config.as_os_str().is_empty() {
            errors.push(ValidationError::Persistence(
                "integrated_tool_panel_config cannot be empty".to_string(),
            ));
        }

        let filter_lists = [
            ("tool_filters", &self.tool_filters),
            ("tool_section_filters", &self.tool_section_filters),
            ("tool_label_filters", &self.tool_label_filters),
            ("user_tool_filters", &self.user_tool_filters),
            ("user_tool_section_filters", &self.user_tool_section_filters),
            ("user_tool_label_filters", &self.user_tool_label_filters),
        ];
        for (list, names) in filter_lists {
            if names.iter().any(|n| n.trim().is_empty()) {
                errors.push(ValidationError::Filters(format!(
                    "{} contains an empty filter name",
                    list
                )));
            }
        }

        for shed in &self.tool_sheds {
            if shed.trim().is_empty() || shed.contains('/') {
                errors.push(ValidationError::ToolSheds(format!(
                    "'{}' is not a bare host name",
                    shed
                )));
            }
        }

        if self.default_panel_view.trim().is_empty() {
            errors.push(ValidationError::Views(
                "default_panel_view cannot be empty".to_string(),
            ));
        }

        if self.logging.format != "json" && self.logging.format != "text" {
            errors.push(ValidationError::Logging(format!(
                "format '{}' must be 'json' or 'text'",
                self.logging.format
            )));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
