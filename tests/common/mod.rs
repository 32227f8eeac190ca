#![allow(dead_code)]

use rflaunch::config::KeywordScope;
use rflaunch::dispatch::{CancellationToken, DispatchEngine, DispatchSettings};
use rflaunch::error::Result as RflaunchResult;
use rflaunch::metrics::PluginTelemetry;
use rflaunch::plugin::{BatchSink, NativePlugin, PluginDescriptor, PluginRegistry};
use rflaunch::query::Query;
use rflaunch::ranking::RankingStore;
use rflaunch::result::PluginResult;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Native plugin answering every query with a fixed list.
pub struct StaticPlugin {
    results: Vec<(String, String, i32)>,
    delay: Duration,
    pub calls: AtomicUsize,
}

impl StaticPlugin {
    pub fn new(results: &[(&str, i32)]) -> Self {
        Self {
            results: results
                .iter()
                .map(|(title, score)| (title.to_string(), String::new(), *score))
                .collect(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleeps in small steps, giving up as soon as the token is cancelled.
    pub fn slow(results: &[(&str, i32)], delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(results)
        }
    }
}

impl NativePlugin for StaticPlugin {
    fn query(&self, _query: &Query, token: &CancellationToken) -> RflaunchResult<Vec<PluginResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = Duration::from_millis(5);
        let mut waited = Duration::ZERO;
        while waited < self.delay {
            if token.is_cancelled() {
                return Ok(Vec::new());
            }
            thread::sleep(step);
            waited += step;
        }
        Ok(self
            .results
            .iter()
            .map(|(title, subtitle, score)| PluginResult::new(title.as_str(), subtitle.as_str(), *score))
            .collect())
    }
}

/// Echoes the search text back as the only result title.
pub struct EchoPlugin;

impl NativePlugin for EchoPlugin {
    fn query(&self, query: &Query, _token: &CancellationToken) -> RflaunchResult<Vec<PluginResult>> {
        Ok(vec![PluginResult::new(query.search(), "echo", 1)])
    }
}

/// Streams refined batches: each batch replaces the previous one.
pub struct RefiningPlugin {
    pub batches: Vec<Vec<(&'static str, i32)>>,
}

impl NativePlugin for RefiningPlugin {
    fn query(&self, _query: &Query, _token: &CancellationToken) -> RflaunchResult<Vec<PluginResult>> {
        Ok(Vec::new())
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    fn query_stream(
        &self,
        _query: &Query,
        token: &CancellationToken,
        sink: &dyn BatchSink,
    ) -> RflaunchResult<()> {
        for batch in &self.batches {
            if token.is_cancelled() {
                break;
            }
            let results = batch
                .iter()
                .map(|(title, score)| PluginResult::new(*title, "", *score))
                .collect();
            if !sink.send(results) {
                break;
            }
        }
        Ok(())
    }
}

pub struct FailingPlugin;

impl NativePlugin for FailingPlugin {
    fn query(&self, _query: &Query, _token: &CancellationToken) -> RflaunchResult<Vec<PluginResult>> {
        Err(rflaunch::RflaunchError::Other("backend unavailable".to_string()))
    }
}

pub struct PanickingPlugin;

impl NativePlugin for PanickingPlugin {
    fn query(&self, _query: &Query, _token: &CancellationToken) -> RflaunchResult<Vec<PluginResult>> {
        panic!("plugin bug")
    }
}

pub fn register(registry: &PluginRegistry, id: &str, keywords: &[&str], plugin: impl NativePlugin + 'static) {
    registry
        .register_native(PluginDescriptor::native(id, id, keywords), Arc::new(plugin))
        .expect("register plugin");
}

pub fn engine(registry: Arc<PluginRegistry>, ranking: Arc<RankingStore>) -> DispatchEngine {
    engine_with_scope(registry, ranking, KeywordScope::Narrow)
}

pub fn engine_with_scope(
    registry: Arc<PluginRegistry>,
    ranking: Arc<RankingStore>,
    keyword_scope: KeywordScope,
) -> DispatchEngine {
    DispatchEngine::new(
        registry,
        ranking,
        PluginTelemetry::new(),
        DispatchSettings {
            result_limit: 50,
            keyword_scope,
            worker_threads: 4,
        },
    )
    .expect("dispatch engine")
}

pub fn titles(results: &[PluginResult]) -> Vec<String> {
    results.iter().map(|r| r.title.clone()).collect()
}

/// Writes a plugin directory with a manifest and, optionally, an executable
/// shell script.
pub fn write_plugin(root: &Path, dir_name: &str, manifest: &str, script: Option<(&str, &str)>) -> PathBuf {
    let dir = root.join(dir_name);
    fs::create_dir_all(&dir).expect("plugin dir");
    fs::write(dir.join("plugin.json"), manifest).expect("manifest");
    if let Some((file_name, body)) = script {
        let path = dir.join(file_name);
        fs::write(&path, body).expect("script");
        make_executable(&path);
    }
    dir
}

#[cfg(unix)]
pub fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("chmod");
}

#[cfg(not(unix))]
pub fn make_executable(_path: &Path) {}

pub fn executable_manifest(id: &str, keyword: &str, exe: &str) -> String {
    format!(
        r#"{{"id":"{id}","name":"{id}","language":"executable","executeFileName":"{exe}","actionKeyword":"{keyword}"}}"#
    )
}
