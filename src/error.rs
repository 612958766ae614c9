//! Error types for the tool panel registry.
//!
//! Every failure except a malformed lookup request degrades to "skip this
//! item/source/filter and continue"; these types carry the diagnostic.

use std::path::PathBuf;
use thiserror::Error;

/// A configuration document could not be read or parsed.
#[derive(Debug, Error)]
pub enum ConfigParseError {
    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config file {path:?}: {message}")]
    Malformed { path: PathBuf, message: String },

    #[error("Unsupported config file extension: {0:?}")]
    UnsupportedFormat(PathBuf),
}

impl ConfigParseError {
    pub fn malformed(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        ConfigParseError::Malformed {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// The file the error refers to.
    pub fn path(&self) -> &std::path::Path {
        match self {
            ConfigParseError::Io { path, .. }
            | ConfigParseError::Malformed { path, .. }
            | ConfigParseError::UnsupportedFormat(path) => path,
        }
    }
}

/// An individual tool failed to load.
#[derive(Debug, Error)]
pub enum ToolLoadError {
    #[error("Tool file not found: {0:?}")]
    NotFound(PathBuf),

    #[error("Failed to read tool file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse tool file {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
}

impl ToolLoadError {
    pub fn parse(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        ToolLoadError::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Inconsistent version data for one tool id.
#[derive(Debug, Error)]
pub enum LineageError {
    #[error("Tool '{0}' declares an empty version")]
    EmptyVersion(String),
}

/// A filter could not be built or failed while evaluating.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterConfigError {
    #[error("Unknown filter '{0}'")]
    Unknown(String),

    #[error("Filter '{0}' is not in the allow-list for per-user filters")]
    NotAllowed(String),

    #[error("Filter '{filter}' failed: {reason}")]
    Failed { filter: String, reason: String },
}

/// The integrated panel could not be read or written.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Integrated panel I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize integrated panel: {0}")]
    Serialize(String),

    #[error("Malformed integrated panel {path:?}: {message}")]
    Malformed { path: PathBuf, message: String },
}

impl PersistenceError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PersistenceError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Malformed lookup request. Not-found is never an error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("Cannot request an exact match together with all versions of tool '{0}'")]
    ExactWithAllVersions(String),
}

/// A panel view could not be defined or applied.
#[derive(Debug, Error)]
pub enum ViewError {
    #[error("Unknown panel view '{0}'")]
    UnknownView(String),

    #[error("Invalid view definition {path:?}: {message}")]
    InvalidDefinition { path: PathBuf, message: String },

    #[error("Invalid exclude pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

/// Watcher setup failures.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Failed to create watcher: {0}")]
    Create(String),

    #[error("Failed to watch {path:?}: {message}")]
    Watch { path: PathBuf, message: String },
}

/// Umbrella error for registry operations
#[derive(Debug, Error)]
pub enum ToolBoxError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    ConfigParse(#[from] ConfigParseError),

    #[error(transparent)]
    ToolLoad(#[from] ToolLoadError),

    #[error(transparent)]
    Filter(#[from] FilterConfigError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    View(#[from] ViewError),

    #[error(transparent)]
    Watch(#[from] WatchError),
}

impl From<config::ConfigError> for ToolBoxError {
    fn from(err: config::ConfigError) -> Self {
        ToolBoxError::ConfigError(err.to_string())
    }
}
