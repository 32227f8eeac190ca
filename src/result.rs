//! Result candidates produced by plugins
use crate::protocol::host::HostApi;
use crate::protocol::JsonRpcAction;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Environment handed to a native action when the user picks a result.
pub struct ActionContext<'a> {
    pub host: &'a dyn HostApi,
}

/// Callback run in-process for native plugins. Returns whether the window should hide.
pub type NativeAction = Arc<dyn Fn(&ActionContext<'_>) -> bool + Send + Sync>;

/// What happens when a result is selected.
#[derive(Clone, Default)]
pub enum ResultAction {
    #[default]
    None,
    Native(NativeAction),
    /// Deferred call for out-of-process plugins, see [`crate::protocol`].
    Rpc(JsonRpcAction),
}

impl fmt::Debug for ResultAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultAction::None => f.write_str("None"),
            ResultAction::Native(_) => f.write_str("Native(..)"),
            ResultAction::Rpc(action) => f.debug_tuple("Rpc").field(action).finish(),
        }
    }
}

impl ResultAction {
    pub fn native<F>(action: F) -> Self
    where
        F: Fn(&ActionContext<'_>) -> bool + Send + Sync + 'static,
    {
        ResultAction::Native(Arc::new(action))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ResultAction::None)
    }
}

/// Identity used for pinning and selection bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultIdentity {
    pub plugin_id: String,
    pub title: String,
    pub subtitle: String,
}

#[derive(Debug, Clone, Default)]
pub struct PluginResult {
    pub title: String,
    pub subtitle: String,
    pub score: i32,
    pub icon_path: Option<PathBuf>,
    pub plugin_id: String,
    /// Raw text of the query this result answered.
    pub origin_query: Option<String>,
    pub context_data: Option<serde_json::Value>,
    pub action: ResultAction,
}

impl PluginResult {
    pub fn new(title: impl Into<String>, subtitle: impl Into<String>, score: i32) -> Self {
        Self {
            title: title.into(),
            subtitle: subtitle.into(),
            score,
            ..Default::default()
        }
    }

    pub fn with_action(mut self, action: ResultAction) -> Self {
        self.action = action;
        self
    }

    pub fn with_icon(mut self, icon_path: impl Into<PathBuf>) -> Self {
        self.icon_path = Some(icon_path.into());
        self
    }

    pub fn with_context_data(mut self, data: serde_json::Value) -> Self {
        self.context_data = Some(data);
        self
    }

    pub fn identity(&self) -> ResultIdentity {
        ResultIdentity {
            plugin_id: self.plugin_id.clone(),
            title: self.title.clone(),
            subtitle: self.subtitle.clone(),
        }
    }

    pub fn same_identity(&self, other: &PluginResult) -> bool {
        self.plugin_id == other.plugin_id
            && self.title == other.title
            && self.subtitle == other.subtitle
    }
}

impl fmt::Display for PluginResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.subtitle.is_empty() {
            write!(f, "{}", self.title)
        } else {
            write!(f, "{} - {}", self.title, self.subtitle)
        }
    }
}

/// Serializable view of a result for JSON output.
#[derive(Debug, Serialize)]
pub struct ResultSummary<'a> {
    pub title: &'a str,
    pub subtitle: &'a str,
    pub score: i32,
    pub plugin_id: &'a str,
    pub icon_path: Option<&'a PathBuf>,
    pub has_action: bool,
}

impl<'a> From<&'a PluginResult> for ResultSummary<'a> {
    fn from(result: &'a PluginResult) -> Self {
        Self {
            title: &result.title,
            subtitle: &result.subtitle,
            score: result.score,
            plugin_id: &result.plugin_id,
            icon_path: result.icon_path.as_ref(),
            has_action: !result.action.is_none(),
        }
    }
}
