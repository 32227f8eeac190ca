//! Wire protocol spoken with out-of-process plugins.
//!
//! Every call is a single request/response pair: the host serializes one
//! [`JsonRpcRequest`] into a command-line argument of a freshly spawned plugin
//! process and reads that process's stdout to completion. There is no
//! persistent connection.
pub mod host;

use crate::error::{Result as RflaunchResult, RflaunchError};
use crate::result::{PluginResult, ResultAction};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use host::{HostApi, HOST_API_PREFIX};

pub const METHOD_QUERY: &str = "query";
pub const METHOD_CONTEXT_MENU: &str = "contextmenu";

/// Host to plugin request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(alias = "Method")]
    pub method: String,
    #[serde(default, alias = "Parameters")]
    pub parameters: Vec<Value>,
}

impl JsonRpcRequest {
    pub fn query(search: &str) -> Self {
        Self {
            method: METHOD_QUERY.to_string(),
            parameters: vec![Value::String(search.to_string())],
        }
    }

    pub fn context_menu(context_data: Value) -> Self {
        Self {
            method: METHOD_CONTEXT_MENU.to_string(),
            parameters: vec![context_data],
        }
    }

    /// Re-invokes a previously returned action.
    pub fn callback(action: &JsonRpcAction) -> Self {
        Self {
            method: action.method.clone(),
            parameters: action.parameters.clone(),
        }
    }

    pub fn targets_host(&self) -> bool {
        host::is_host_method(&self.method)
    }

    pub fn to_argument(&self) -> RflaunchResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Deferred action attached to a result returned by a plugin process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcAction {
    #[serde(alias = "Method")]
    pub method: String,
    #[serde(default, alias = "Parameters")]
    pub parameters: Vec<Value>,
    #[serde(
        default,
        rename = "dontHideAfterAction",
        alias = "DontHideAfterAction"
    )]
    pub dont_hide_after_action: bool,
}

impl JsonRpcAction {
    pub fn targets_host(&self) -> bool {
        host::is_host_method(&self.method)
    }

    /// Whether the launcher window should hide after the action ran.
    pub fn hides_window(&self) -> bool {
        !self.dont_hide_after_action
    }
}

/// Plugin to host response to `query` and `contextmenu`.
#[derive(Debug, Deserialize)]
pub struct JsonRpcQueryResponse {
    #[serde(default, alias = "Result")]
    pub result: Option<Vec<JsonRpcResult>>,
}

/// One result element as written by a plugin process.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResult {
    #[serde(rename = "Title", alias = "title", default)]
    pub title: String,
    #[serde(rename = "SubTitle", alias = "subTitle", alias = "subtitle", default)]
    pub sub_title: String,
    #[serde(rename = "IcoPath", alias = "icoPath", default)]
    pub ico_path: Option<String>,
    #[serde(rename = "Score", alias = "score", default)]
    pub score: i32,
    #[serde(rename = "ContextData", alias = "contextData", default)]
    pub context_data: Option<Value>,
    #[serde(rename = "JsonRPCAction", alias = "jsonRPCAction", default)]
    pub json_rpc_action: Option<JsonRpcAction>,
}

impl From<JsonRpcResult> for PluginResult {
    fn from(raw: JsonRpcResult) -> Self {
        let action = match raw.json_rpc_action {
            Some(action) => ResultAction::Rpc(action),
            None => ResultAction::None,
        };
        PluginResult {
            title: raw.title,
            subtitle: raw.sub_title,
            score: raw.score,
            icon_path: raw
                .ico_path
                .filter(|path| !path.trim().is_empty())
                .map(Into::into),
            context_data: raw.context_data.filter(|data| !data.is_null()),
            action,
            ..Default::default()
        }
    }
}

/// Parses the stdout of a `query` or `contextmenu` call.
pub fn parse_query_response(plugin_id: &str, output: &str) -> RflaunchResult<Vec<PluginResult>> {
    let response: JsonRpcQueryResponse =
        serde_json::from_str(output.trim()).map_err(|e| RflaunchError::Protocol {
            plugin_id: plugin_id.to_string(),
            reason: format!("invalid response JSON: {e}"),
        })?;

    Ok(response
        .result
        .unwrap_or_default()
        .into_iter()
        .map(PluginResult::from)
        .collect())
}

/// Parses the stdout of a callback call. Plugins may answer with a follow-up
/// request (usually a host API call) or with nothing at all.
pub fn parse_callback_response(
    plugin_id: &str,
    output: &str,
) -> RflaunchResult<Option<JsonRpcRequest>> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(trimmed).map_err(|e| RflaunchError::Protocol {
        plugin_id: plugin_id.to_string(),
        reason: format!("invalid callback JSON: {e}"),
    })?;

    let has_method = value
        .as_object()
        .is_some_and(|obj| obj.contains_key("method") || obj.contains_key("Method"));
    if !has_method {
        return Ok(None);
    }

    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| RflaunchError::Protocol {
            plugin_id: plugin_id.to_string(),
            reason: format!("malformed callback request: {e}"),
        })
}
