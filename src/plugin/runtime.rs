//! Uniform call surface over the different plugin execution strategies
use super::manifest::{Language, PluginDescriptor};
use super::native::{BatchSink, NativePlugin, NativeRuntime};
use super::process::{PluginCommand, ProcessRuntime};
use crate::config::ProtocolConfig;
use crate::dispatch::CancellationToken;
use crate::error::{Result as RflaunchResult, RflaunchError};
use crate::query::Query;
use crate::result::PluginResult;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Closed set of execution strategies, picked from the manifest language.
pub enum PluginRuntime {
    Native(NativeRuntime),
    /// Both interpreted scripts and compiled executables.
    Process(ProcessRuntime),
}

impl PluginRuntime {
    pub fn for_descriptor(
        descriptor: &PluginDescriptor,
        protocol: &ProtocolConfig,
    ) -> RflaunchResult<Self> {
        let timeout = descriptor.timeout(protocol);
        let runtime = match descriptor.language {
            Language::Native => {
                PluginRuntime::Native(NativeRuntime::load(&descriptor.executable_path)?)
            }
            Language::Python => PluginRuntime::Process(ProcessRuntime::new(
                &descriptor.id,
                PluginCommand::python(&protocol.python_path, &descriptor.executable_path),
                &descriptor.directory,
                timeout,
            )),
            Language::Executable => PluginRuntime::Process(ProcessRuntime::new(
                &descriptor.id,
                PluginCommand::executable(&descriptor.executable_path),
                &descriptor.directory,
                timeout,
            )),
        };
        Ok(runtime)
    }

    pub fn native(plugin: Arc<dyn NativePlugin>) -> Self {
        PluginRuntime::Native(NativeRuntime::new(plugin))
    }

    pub fn supports_streaming(&self) -> bool {
        match self {
            PluginRuntime::Native(runtime) => runtime.plugin().supports_streaming(),
            PluginRuntime::Process(_) => false,
        }
    }

    /// One-shot query. Panics inside native plugins are converted to errors.
    pub fn query(
        &self,
        plugin_id: &str,
        query: &Query,
        token: &CancellationToken,
    ) -> RflaunchResult<Vec<PluginResult>> {
        match self {
            PluginRuntime::Native(runtime) => {
                guard_panics(plugin_id, || runtime.plugin().query(query, token))
            }
            PluginRuntime::Process(runtime) => runtime.query(query),
        }
    }

    /// Streaming query; one-shot runtimes emit a single batch.
    pub fn query_stream(
        &self,
        plugin_id: &str,
        query: &Query,
        token: &CancellationToken,
        sink: &dyn BatchSink,
    ) -> RflaunchResult<()> {
        match self {
            PluginRuntime::Native(runtime) => guard_panics(plugin_id, || {
                runtime.plugin().query_stream(query, token, sink)
            }),
            PluginRuntime::Process(runtime) => {
                let results = runtime.query(query)?;
                sink.send(results);
                Ok(())
            }
        }
    }

    pub fn load_context_menu(
        &self,
        plugin_id: &str,
        result: &PluginResult,
    ) -> RflaunchResult<Vec<PluginResult>> {
        match self {
            PluginRuntime::Native(runtime) => {
                guard_panics(plugin_id, || runtime.plugin().load_context_menu(result))
            }
            PluginRuntime::Process(runtime) => runtime.load_context_menu(result),
        }
    }

    pub fn as_process(&self) -> Option<&ProcessRuntime> {
        match self {
            PluginRuntime::Process(runtime) => Some(runtime),
            PluginRuntime::Native(_) => None,
        }
    }
}

fn guard_panics<T, F>(plugin_id: &str, call: F) -> RflaunchResult<T>
where
    F: FnOnce() -> RflaunchResult<T>,
{
    panic::catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panic payload unavailable".to_string());
        Err(RflaunchError::PluginPanicked {
            plugin_id: plugin_id.to_string(),
            message,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse;
    use std::collections::HashSet;

    struct Exploding;

    impl NativePlugin for Exploding {
        fn query(&self, _: &Query, _: &CancellationToken) -> RflaunchResult<Vec<PluginResult>> {
            panic!("boom");
        }
    }

    #[test]
    fn native_panic_becomes_invocation_error() {
        let runtime = PluginRuntime::native(Arc::new(Exploding));
        let query = parse("hi", &HashSet::<String>::new()).unwrap();
        let err = runtime
            .query("exploding", &query, &CancellationToken::new())
            .unwrap_err();
        match err {
            RflaunchError::PluginPanicked { plugin_id, message } => {
                assert_eq!(plugin_id, "exploding");
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
