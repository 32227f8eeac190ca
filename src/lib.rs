//! Core of a plugin-driven launcher: keyword routing, parallel plugin dispatch
//! with a streaming merge, ranking overlay, the out-of-process JSON plugin
//! protocol and an expiring icon cache.
pub mod action;
pub mod app;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod icon_cache;
pub mod metrics;
pub mod plugin;
pub mod protocol;
pub mod query;
pub mod ranking;
pub mod result;

pub use crate::app::Launcher;
pub use crate::config::Config;
pub use crate::dispatch::{CancellationToken, DispatchEngine, DispatchOutcome, MergedBatch};
pub use crate::error::{Result, RflaunchError};
pub use crate::plugin::{NativePlugin, PluginDescriptor, PluginRegistry};
pub use crate::query::{parse, Query};
pub use crate::result::{PluginResult, ResultAction};
pub use clap::Parser;
