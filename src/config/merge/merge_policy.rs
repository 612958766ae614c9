//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("tool_path", "tools")?
        .set_default("integrated_tool_panel_config", "integrated_tool_panel.xml")?
        .set_default("watch_debounce_ms", 500_u64)?
        .set_default("parse_retry_delay_ms", 250_u64)?
        .set_default("default_panel_view", "default")
}
