//! toolpanel: Tool Registry and Panel Builder
//!
//! Loads tool configuration documents into an ordered panel of tools,
//! workflows, labels and sections, keeps a persisted integrated order across
//! restarts, resolves tool versions through lineages and serves filtered
//! views of the panel.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod filter;
pub mod integrated;
pub mod lineage;
pub mod logging;
pub mod panel;
pub mod source;
pub mod tool;
pub mod toolbox;
pub mod views;
pub mod watch;
pub(crate) mod xml;

pub use error::ToolBoxError;
pub use toolbox::{ToolBox, ToolQuery};
