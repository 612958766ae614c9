//! CLI route: single route table and run context. Dispatches to the
//! registry and presentation.

use crate::cli::parse::{Audience, Commands, OutputFormat};
use crate::cli::presentation::{
    format_load_report, format_panel_json, format_panel_text, format_tools_json,
    format_tools_text, format_views_text,
};
use crate::config::{ConfigLoader, ToolBoxConfig};
use crate::error::ToolBoxError;
use crate::filter::FilterContext;
use crate::toolbox::{ToolBox, ToolQuery};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const CLI_USER: &str = "cli";

/// Runtime context for CLI execution: the loaded configuration and the
/// registry built from it.
pub struct RunContext {
    toolbox: Arc<ToolBox>,
    format: OutputFormat,
}

impl RunContext {
    /// Build from a workspace root and optional explicit config file.
    pub fn new(
        workspace_root: PathBuf,
        config_path: Option<PathBuf>,
        format: OutputFormat,
    ) -> Result<Self, ToolBoxError> {
        let config = match config_path {
            Some(path) => ConfigLoader::load_from_file(&path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        Self::from_config(config, format)
    }

    pub fn from_config(config: ToolBoxConfig, format: OutputFormat) -> Result<Self, ToolBoxError> {
        if let Err(errors) = config.validate() {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            return Err(ToolBoxError::ConfigError(messages.join("; ")));
        }
        Ok(Self {
            toolbox: Arc::new(ToolBox::builder(config).build()),
            format,
        })
    }

    pub fn toolbox(&self) -> &Arc<ToolBox> {
        &self.toolbox
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, ToolBoxError> {
        match command {
            Commands::Load { no_persist } => {
                let report = self.toolbox.load_all(!no_persist);
                let panel = self.toolbox.panel();
                match self.format {
                    OutputFormat::Json => {
                        let out = json!({ "report": report, "panel": panel });
                        serde_json::to_string_pretty(&out)
                            .map_err(|e| ToolBoxError::ConfigError(e.to_string()))
                    }
                    OutputFormat::Text => Ok(format!(
                        "{}\n\n{}",
                        format_load_report(&report),
                        format_panel_text(&panel)
                    )),
                }
            }
            Commands::View { id, filters_for } => {
                self.toolbox.load_all(false);
                let panel = match filters_for {
                    None => {
                        let id = id
                            .as_deref()
                            .unwrap_or(&self.toolbox.config().default_panel_view);
                        self.toolbox.panel_view(id)?
                    }
                    Some(audience) => {
                        let ctx = filter_context(*audience);
                        let filtered = self.toolbox.filtered_panel(id.as_deref(), &ctx)?;
                        for error in &filtered.errors {
                            tracing::warn!(error = %error, "Filter not applied");
                        }
                        filtered.panel
                    }
                };
                match self.format {
                    OutputFormat::Json => format_panel_json(&panel),
                    OutputFormat::Text => Ok(format_panel_text(&panel)),
                }
            }
            Commands::Lookup {
                id,
                version,
                exact,
                all_versions,
            } => {
                self.toolbox.load_all(false);
                let query = ToolQuery {
                    id: id.clone(),
                    version: version.clone(),
                    exact: *exact,
                    all_versions: *all_versions,
                };
                let tools = self.toolbox.lookup(&query)?;
                match self.format {
                    OutputFormat::Json => format_tools_json(&tools),
                    OutputFormat::Text => Ok(format_tools_text(&tools)),
                }
            }
            Commands::Views => {
                let views = self.toolbox.views();
                match self.format {
                    OutputFormat::Json => {
                        let out: Vec<_> = views
                            .iter()
                            .map(|(id, name)| json!({ "id": id, "name": name }))
                            .collect();
                        serde_json::to_string_pretty(&out)
                            .map_err(|e| ToolBoxError::ConfigError(e.to_string()))
                    }
                    OutputFormat::Text => Ok(format_views_text(
                        &views,
                        &self.toolbox.config().default_panel_view,
                    )),
                }
            }
            Commands::Watch => {
                let report = self.toolbox.load_all(true);
                println!("{}", format_load_report(&report));
                self.toolbox.start_watching()?;
                info!("Watching for changes, interrupt to stop");
                loop {
                    std::thread::sleep(Duration::from_secs(60));
                }
            }
        }
    }
}

fn filter_context(audience: Audience) -> FilterContext {
    match audience {
        Audience::Anonymous => FilterContext::anonymous(),
        Audience::User => FilterContext::user(CLI_USER),
        Audience::Admin => FilterContext::admin(CLI_USER),
    }
}
