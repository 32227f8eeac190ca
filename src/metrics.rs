use parking_lot::Mutex;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Running totals for a single plugin.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PluginStats {
    pub invocations: u64,
    pub failures: u64,
    pub total_time_ms: u64,
    pub avg_time_ms: f64,
}

#[derive(Clone)]
pub struct PluginTelemetry {
    pub invocations: IntCounterVec,
    pub failures: IntCounterVec,
    pub generations: IntCounter,
    pub superseded: IntCounter,
    stats: Arc<Mutex<HashMap<String, PluginStats>>>,
    registry: Arc<Registry>,
}

impl Default for PluginTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginTelemetry {
    pub fn new() -> Self {
        let registry = Registry::new();
        let invocations = IntCounterVec::new(
            Opts::new("plugin_invocations_total", "Number of plugin query calls"),
            &["plugin"],
        )
        .expect("valid metric definition");
        let failures = IntCounterVec::new(
            Opts::new("plugin_failures_total", "Number of failed plugin query calls"),
            &["plugin"],
        )
        .expect("valid metric definition");
        let generations = IntCounter::with_opts(Opts::new(
            "dispatch_generations_total",
            "Number of dispatched query generations",
        ))
        .expect("valid metric definition");
        let superseded = IntCounter::with_opts(Opts::new(
            "dispatch_superseded_total",
            "Number of generations cancelled by a newer query",
        ))
        .expect("valid metric definition");

        registry.register(Box::new(invocations.clone())).ok();
        registry.register(Box::new(failures.clone())).ok();
        registry.register(Box::new(generations.clone())).ok();
        registry.register(Box::new(superseded.clone())).ok();

        PluginTelemetry {
            invocations,
            failures,
            generations,
            superseded,
            stats: Arc::new(Mutex::new(HashMap::new())),
            registry: Arc::new(registry),
        }
    }

    pub fn record_call(&self, plugin_id: &str, elapsed: Duration, success: bool) {
        self.invocations.with_label_values(&[plugin_id]).inc();
        if !success {
            self.failures.with_label_values(&[plugin_id]).inc();
        }

        let mut stats = self.stats.lock();
        let entry = stats.entry(plugin_id.to_string()).or_default();
        entry.invocations += 1;
        if !success {
            entry.failures += 1;
        }
        entry.total_time_ms += elapsed.as_millis() as u64;
        entry.avg_time_ms = entry.total_time_ms as f64 / entry.invocations as f64;
    }

    pub fn stats(&self, plugin_id: &str) -> Option<PluginStats> {
        self.stats.lock().get(plugin_id).cloned()
    }

    /// Per-plugin stats sorted by plugin id.
    pub fn snapshot(&self) -> Vec<(String, PluginStats)> {
        let mut all: Vec<_> = self
            .stats
            .lock()
            .iter()
            .map(|(id, stats)| (id.clone(), stats.clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Prometheus text exposition of all counters.
    pub fn gather(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if encoder.encode(&metric_families, &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
