//! Host API reachable from plugin actions by method name
use crate::error::{Result as RflaunchResult, RflaunchError};
use lazy_static::lazy_static;
use log::debug;
use serde_json::Value;
use std::collections::HashMap;

/// Reserved prefix for methods answered by the host instead of the plugin.
pub const HOST_API_PREFIX: &str = "Wox.";

/// Operations a plugin may ask the launcher to perform.
pub trait HostApi: Send + Sync {
    fn change_query(&self, query: &str, requery: bool);
    fn show_message(&self, title: &str, subtitle: &str, icon_path: &str);
    fn copy_to_clipboard(&self, text: &str);
    fn hide_app(&self);
    fn show_app(&self);
    fn reload_plugin_data(&self);
}

type HostMethod = fn(&dyn HostApi, &[Value]) -> RflaunchResult<()>;

lazy_static! {
    static ref HOST_METHODS: HashMap<&'static str, HostMethod> = {
        let mut m: HashMap<&'static str, HostMethod> = HashMap::new();
        m.insert("Wox.ChangeQuery", |host, params| {
            let query = string_param("Wox.ChangeQuery", params, 0)?;
            let requery = params.get(1).and_then(Value::as_bool).unwrap_or(false);
            host.change_query(query, requery);
            Ok(())
        });
        m.insert("Wox.ShowMsg", |host, params| {
            let title = string_param("Wox.ShowMsg", params, 0)?;
            let subtitle = optional_string(params, 1);
            let icon = optional_string(params, 2);
            host.show_message(title, subtitle, icon);
            Ok(())
        });
        m.insert("Wox.CopyToClipboard", |host, params| {
            host.copy_to_clipboard(string_param("Wox.CopyToClipboard", params, 0)?);
            Ok(())
        });
        m.insert("Wox.HideApp", |host, _| {
            host.hide_app();
            Ok(())
        });
        m.insert("Wox.ShowApp", |host, _| {
            host.show_app();
            Ok(())
        });
        m.insert("Wox.ReloadAllPluginData", |host, _| {
            host.reload_plugin_data();
            Ok(())
        });
        m
    };
}

/// Whether `method` is addressed to the launcher rather than the plugin.
pub fn is_host_method(method: &str) -> bool {
    method.starts_with(HOST_API_PREFIX)
}

/// Runs a host API method by name. Unknown names are rejected.
pub fn invoke(host: &dyn HostApi, method: &str, parameters: &[Value]) -> RflaunchResult<()> {
    let handler = HOST_METHODS
        .get(method)
        .ok_or_else(|| RflaunchError::UnknownHostMethod(method.to_string()))?;
    debug!("Invoking host method {method} with {} parameter(s)", parameters.len());
    handler(host, parameters)
}

fn string_param<'a>(method: &str, params: &'a [Value], index: usize) -> RflaunchResult<&'a str> {
    params
        .get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| RflaunchError::Protocol {
            plugin_id: method.to_string(),
            reason: format!("parameter {index} must be a string"),
        })
}

fn optional_string(params: &[Value], index: usize) -> &str {
    params.get(index).and_then(Value::as_str).unwrap_or("")
}
