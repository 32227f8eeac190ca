use mockall::mock;
use mockall::predicate::*;
use rflaunch::action::ActionExecutor;
use rflaunch::error::ErrorKind;
use rflaunch::plugin::PluginRegistry;
use rflaunch::protocol::host::{self, HostApi};
use rflaunch::protocol::JsonRpcAction;
use rflaunch::ranking::RankingStore;
use rflaunch::result::{PluginResult, ResultAction};
use rflaunch::RflaunchError;
use serde_json::json;
use std::sync::Arc;

mock! {
    pub Host {}

    impl HostApi for Host {
        fn change_query(&self, query: &str, requery: bool);
        fn show_message(&self, title: &str, subtitle: &str, icon_path: &str);
        fn copy_to_clipboard(&self, text: &str);
        fn hide_app(&self);
        fn show_app(&self);
        fn reload_plugin_data(&self);
    }
}

#[test]
fn change_query_passes_both_parameters() {
    let mut mock = MockHost::new();
    mock.expect_change_query()
        .with(eq("g rust"), eq(true))
        .times(1)
        .return_const(());

    host::invoke(&mock, "Wox.ChangeQuery", &[json!("g rust"), json!(true)]).unwrap();
}

#[test]
fn show_message_tolerates_missing_optional_parameters() {
    let mut mock = MockHost::new();
    mock.expect_show_message()
        .with(eq("Done"), eq(""), eq(""))
        .times(1)
        .return_const(());

    host::invoke(&mock, "Wox.ShowMsg", &[json!("Done")]).unwrap();
}

#[test]
fn parameterless_methods() {
    let mut mock = MockHost::new();
    mock.expect_hide_app().times(1).return_const(());
    mock.expect_show_app().times(1).return_const(());
    mock.expect_reload_plugin_data().times(1).return_const(());

    host::invoke(&mock, "Wox.HideApp", &[]).unwrap();
    host::invoke(&mock, "Wox.ShowApp", &[]).unwrap();
    host::invoke(&mock, "Wox.ReloadAllPluginData", &[]).unwrap();
}

#[test]
fn unknown_method_is_rejected_without_touching_host() {
    let mock = MockHost::new();
    let err = host::invoke(&mock, "Wox.FormatDisk", &[]).unwrap_err();
    assert!(matches!(err, RflaunchError::UnknownHostMethod(ref m) if m == "Wox.FormatDisk"));
    assert_eq!(err.kind(), ErrorKind::Protocol);
}

#[test]
fn wrong_parameter_type_is_protocol_error() {
    let mock = MockHost::new();
    let err = host::invoke(&mock, "Wox.CopyToClipboard", &[json!(42)]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
}

#[test]
fn host_prefixed_result_action_is_invoked_directly() {
    let mut mock = MockHost::new();
    mock.expect_copy_to_clipboard()
        .with(eq("secret"))
        .times(1)
        .return_const(());

    let executor = ActionExecutor::new(
        Arc::new(PluginRegistry::new()),
        Arc::new(RankingStore::new()),
        Arc::new(mock),
    );
    let mut result = PluginResult::new("Copy", "", 0).with_action(ResultAction::Rpc(JsonRpcAction {
        method: "Wox.CopyToClipboard".to_string(),
        parameters: vec![json!("secret")],
        dont_hide_after_action: false,
    }));
    result.plugin_id = "not-loaded".to_string();

    assert!(executor.execute(&result).unwrap());
}

#[test]
fn plugin_callback_for_unknown_plugin_fails() {
    let executor = ActionExecutor::new(
        Arc::new(PluginRegistry::new()),
        Arc::new(RankingStore::new()),
        Arc::new(MockHost::new()),
    );
    let mut result = PluginResult::new("Open", "", 0).with_action(ResultAction::Rpc(JsonRpcAction {
        method: "open".to_string(),
        parameters: vec![],
        dont_hide_after_action: false,
    }));
    result.plugin_id = "ghost".to_string();

    let err = executor.execute(&result).unwrap_err();
    assert!(matches!(err, RflaunchError::UnknownPlugin(_)));
}
