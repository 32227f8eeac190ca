//! Running the action behind a selected result
use crate::error::{Result as RflaunchResult, RflaunchError};
use crate::plugin::PluginRegistry;
use crate::protocol::host::{self, HostApi};
use crate::protocol::JsonRpcAction;
use crate::ranking::RankingStore;
use crate::result::{ActionContext, PluginResult, ResultAction};
use log::{debug, error, warn};
use std::sync::Arc;

pub struct ActionExecutor {
    registry: Arc<PluginRegistry>,
    ranking: Arc<RankingStore>,
    host: Arc<dyn HostApi>,
}

impl ActionExecutor {
    pub fn new(
        registry: Arc<PluginRegistry>,
        ranking: Arc<RankingStore>,
        host: Arc<dyn HostApi>,
    ) -> Self {
        Self {
            registry,
            ranking,
            host,
        }
    }

    pub fn host(&self) -> &Arc<dyn HostApi> {
        &self.host
    }

    /// Records the selection and runs the result's action. Returns whether the
    /// launcher window should hide afterwards.
    pub fn execute(&self, result: &PluginResult) -> RflaunchResult<bool> {
        let count = self.ranking.record_selection(result);
        debug!("Selected '{}' from {} ({} times)", result.title, result.plugin_id, count);

        match &result.action {
            ResultAction::None => Ok(false),
            ResultAction::Native(action) => {
                let context = ActionContext {
                    host: self.host.as_ref(),
                };
                Ok(action(&context))
            }
            ResultAction::Rpc(action) => {
                self.run_rpc(&result.plugin_id, action)?;
                Ok(action.hides_window())
            }
        }
    }

    fn run_rpc(&self, plugin_id: &str, action: &JsonRpcAction) -> RflaunchResult<()> {
        if action.targets_host() {
            return host::invoke(self.host.as_ref(), &action.method, &action.parameters);
        }

        let handle = self
            .registry
            .get(plugin_id)
            .ok_or_else(|| RflaunchError::UnknownPlugin(plugin_id.to_string()))?;
        let process = handle.runtime.as_process().ok_or_else(|| {
            RflaunchError::Other(format!(
                "plugin '{plugin_id}' returned an RPC action but does not run out of process"
            ))
        })?;

        match process.callback(action)? {
            Some(request) if request.targets_host() => {
                host::invoke(self.host.as_ref(), &request.method, &request.parameters)
            }
            Some(request) => {
                warn!(
                    "Plugin {} answered callback '{}' with non-host method '{}'",
                    plugin_id, action.method, request.method
                );
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Secondary actions for `result`, asked from the plugin that produced it.
    /// Plugin failures are logged and give an empty menu.
    pub fn context_menu(&self, result: &PluginResult) -> RflaunchResult<Vec<PluginResult>> {
        let handle = self
            .registry
            .get(&result.plugin_id)
            .ok_or_else(|| RflaunchError::UnknownPlugin(result.plugin_id.clone()))?;

        let mut items = match handle.runtime.load_context_menu(handle.id(), result) {
            Ok(items) => items,
            Err(e) => {
                error!(
                    "Plugin '{}' ({}) at {} failed to load context menu: {}",
                    handle.id(),
                    handle.descriptor.name,
                    handle.descriptor.directory.display(),
                    e
                );
                return Ok(Vec::new());
            }
        };
        for item in &mut items {
            item.plugin_id = result.plugin_id.clone();
            item.origin_query = result.origin_query.clone();
        }
        Ok(items)
    }
}
