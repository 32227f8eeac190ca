//! Plugin discovery, routing and execution
pub mod manifest;
pub mod native;
pub mod process;
pub mod registry;
pub mod runtime;

pub use manifest::{Keyword, Language, PluginDescriptor, PluginManifest, GLOBAL_KEYWORD};
pub use native::{BatchSink, NativePlugin};
pub use registry::{PluginHandle, PluginRegistry};
pub use runtime::PluginRuntime;
