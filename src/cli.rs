//! CLI domain: parse, route and presentation only.
//! The route table is the single place commands meet the registry.

mod parse;
mod presentation;
mod route;

pub use parse::{Audience, Cli, Commands, OutputFormat};
pub use presentation::{
    format_load_report, format_panel_json, format_panel_text, format_tools_json,
    format_tools_text, format_views_text,
};
pub use route::RunContext;

/// Map registry errors to a string for CLI output.
pub fn map_error(e: &crate::error::ToolBoxError) -> String {
    e.to_string()
}
