//! In-process plugins
use crate::dispatch::CancellationToken;
use crate::error::{Result as RflaunchResult, RflaunchError};
use crate::query::Query;
use crate::result::PluginResult;
use libloading::{Library, Symbol};
use log::info;
use std::path::Path;
use std::sync::Arc;

/// Name of the constructor symbol a native plugin library must export.
pub const CREATE_PLUGIN_SYMBOL: &[u8] = b"create_plugin";

/// Receives successive result batches from a streaming plugin. Each batch
/// replaces the previous one for that plugin.
pub trait BatchSink {
    /// Returns `false` once nobody is listening any more.
    fn send(&self, batch: Vec<PluginResult>) -> bool;
}

impl<F> BatchSink for F
where
    F: Fn(Vec<PluginResult>) -> bool,
{
    fn send(&self, batch: Vec<PluginResult>) -> bool {
        self(batch)
    }
}

/// Plugin implemented in Rust and called directly.
pub trait NativePlugin: Send + Sync {
    /// Produce results for `query`. Long-running plugins should poll `token`
    /// and return early once it is cancelled.
    fn query(&self, query: &Query, token: &CancellationToken) -> RflaunchResult<Vec<PluginResult>>;

    fn load_context_menu(&self, _result: &PluginResult) -> RflaunchResult<Vec<PluginResult>> {
        Ok(Vec::new())
    }

    /// Whether [`NativePlugin::query_stream`] should be used instead of `query`.
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Emit progressively refined batches. The default sends one `query` batch.
    fn query_stream(
        &self,
        query: &Query,
        token: &CancellationToken,
        sink: &dyn BatchSink,
    ) -> RflaunchResult<()> {
        let results = self.query(query, token)?;
        sink.send(results);
        Ok(())
    }
}

/// A native plugin together with the library that provides its code, if any.
pub struct NativeRuntime {
    // Dropped before `_library` so plugin code is never unloaded while in use.
    plugin: Arc<dyn NativePlugin>,
    _library: Option<Arc<Library>>,
}

impl NativeRuntime {
    pub fn new(plugin: Arc<dyn NativePlugin>) -> Self {
        Self {
            plugin,
            _library: None,
        }
    }

    /// Loads a shared library exporting `create_plugin`.
    pub fn load(path: &Path) -> RflaunchResult<Self> {
        unsafe {
            let lib = Library::new(path)?;

            let create_plugin: Symbol<unsafe extern "C" fn() -> *mut dyn NativePlugin> =
                lib.get(CREATE_PLUGIN_SYMBOL)?;

            let plugin_ptr = create_plugin();
            if plugin_ptr.is_null() {
                return Err(RflaunchError::Other(format!(
                    "Plugin creation function in {} returned null",
                    path.display()
                )));
            }

            let plugin: Arc<dyn NativePlugin> = Arc::from(Box::from_raw(plugin_ptr));
            info!("Loaded native plugin library {}", path.display());
            Ok(Self {
                plugin,
                _library: Some(Arc::new(lib)),
            })
        }
    }

    pub fn plugin(&self) -> &Arc<dyn NativePlugin> {
        &self.plugin
    }
}
