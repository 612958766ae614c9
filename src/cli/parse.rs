//! CLI parse: clap types for toolpanel. No behavior; definitions only.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// toolpanel - Tool registry and panel builder
#[derive(Parser, Debug)]
#[command(name = "toolpanel")]
#[command(about = "Load tool configuration sources into an ordered, filterable tool panel")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, global = true, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Who a filtered view is rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Audience {
    Anonymous,
    User,
    Admin,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load every configured source and print the live panel
    Load {
        /// Do not write the integrated panel
        #[arg(long)]
        no_persist: bool,
    },
    /// Print one panel view
    View {
        /// View id (default: the configured default view)
        id: Option<String>,
        /// Apply the filters configured for this kind of caller
        #[arg(long, value_enum)]
        filters_for: Option<Audience>,
    },
    /// Look up a tool by id or guid
    Lookup {
        id: String,
        /// Requested version
        #[arg(long)]
        version: Option<String>,
        /// Only accept a direct id match
        #[arg(long)]
        exact: bool,
        /// Return every loaded version
        #[arg(long)]
        all_versions: bool,
    },
    /// List registered panel views
    Views,
    /// Load, then reload on changes until interrupted
    Watch,
}
