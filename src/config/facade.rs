//! Single entry point for loading `ToolBoxConfig` from layered sources.

use super::merge::merge_policy;
use super::sources::{global_file, workspace_file};
use super::ToolBoxConfig;
use config::{ConfigError, Environment, File};
use std::path::Path;

const LIST_KEYS: [&str; 8] = [
    "tool_config_files",
    "tool_filters",
    "tool_section_filters",
    "tool_label_filters",
    "user_tool_filters",
    "user_tool_section_filters",
    "user_tool_label_filters",
    "tool_sheds",
];

/// Loads registry configuration.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, then the global file, then workspace files, then
    /// `TOOLPANEL__*` environment variables. Relative paths resolve against
    /// `workspace_root`.
    pub fn load(workspace_root: &Path) -> Result<ToolBoxConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let mut config: ToolBoxConfig = builder
            .add_source(environment())
            .build()?
            .try_deserialize()?;
        config.resolve_paths(workspace_root);
        Ok(config)
    }

    /// Defaults, then exactly one file, then the environment. Relative paths
    /// resolve against the file's directory.
    pub fn load_from_file(path: &Path) -> Result<ToolBoxConfig, ConfigError> {
        let mut config: ToolBoxConfig = merge_policy::builder_with_defaults()?
            .add_source(File::from(path).required(true))
            .add_source(environment())
            .build()?
            .try_deserialize()?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);
        Ok(config)
    }
}

fn environment() -> Environment {
    LIST_KEYS.iter().fold(
        Environment::with_prefix("TOOLPANEL")
            .separator("__")
            .try_parsing(true)
            .list_separator(","),
        |env, key| env.with_list_parse_key(key),
    )
}
