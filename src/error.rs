use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RflaunchError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid plugin manifest '{path}': {reason}")]
    Manifest { path: PathBuf, reason: String },

    #[error("Unsupported plugin language '{language}' in {path}")]
    UnsupportedLanguage { language: String, path: PathBuf },

    #[error("Plugin executable not found: {0}")]
    MissingExecutable(PathBuf),

    #[error("Failed to load plugin library: {0}")]
    Library(#[from] libloading::Error),

    #[error("Failed to start plugin process '{program}': {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Plugin '{plugin_id}' timed out after {millis}ms")]
    Timeout { plugin_id: String, millis: u64 },

    #[error("Protocol error from plugin '{plugin_id}': {reason}")]
    Protocol { plugin_id: String, reason: String },

    #[error("Plugin '{plugin_id}' panicked: {message}")]
    PluginPanicked { plugin_id: String, message: String },

    #[error("Plugin '{plugin_id}' failed: {source}")]
    Plugin {
        plugin_id: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to load icon '{path}': {source}")]
    Icon {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unknown plugin: {0}")]
    UnknownPlugin(String),

    #[error("Action keyword '{keyword}' is already owned by plugin '{owner}'")]
    KeywordConflict { keyword: String, owner: String },

    #[error("Unknown host API method: {0}")]
    UnknownHostMethod(String),

    #[error("An unexpected error occurred: {0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Coarse error classes used when deciding how a failure is isolated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad manifest, unsupported language, missing executable, bad config.
    Configuration,
    /// A plugin call failed, timed out, or could not start.
    Invocation,
    /// A plugin answered with something that is not a valid response.
    Protocol,
    /// Icon or other presentation resources could not be produced.
    Presentation,
    Internal,
}

impl RflaunchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RflaunchError::Config(_)
            | RflaunchError::Manifest { .. }
            | RflaunchError::UnsupportedLanguage { .. }
            | RflaunchError::MissingExecutable(_)
            | RflaunchError::Library(_)
            | RflaunchError::KeywordConflict { .. }
            | RflaunchError::UnknownPlugin(_) => ErrorKind::Configuration,
            RflaunchError::Spawn { .. }
            | RflaunchError::Timeout { .. }
            | RflaunchError::PluginPanicked { .. }
            | RflaunchError::Plugin { .. } => ErrorKind::Invocation,
            RflaunchError::Protocol { .. }
            | RflaunchError::Json(_)
            | RflaunchError::UnknownHostMethod(_) => ErrorKind::Protocol,
            RflaunchError::Icon { .. } => ErrorKind::Presentation,
            RflaunchError::Io(_) | RflaunchError::Other(_) | RflaunchError::Anyhow(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Wraps an arbitrary plugin-side error so it can be attributed to a plugin.
    pub fn plugin<E>(plugin_id: &str, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        RflaunchError::Plugin {
            plugin_id: plugin_id.to_string(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RflaunchError>;
