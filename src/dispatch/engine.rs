//! Fan-out of one query generation over the candidate plugins
use super::cancel::CancellationToken;
use super::merge::ResultMerger;
use crate::config::{Config, KeywordScope};
use crate::error::{Result as RflaunchResult, RflaunchError};
use crate::metrics::PluginTelemetry;
use crate::plugin::{PluginHandle, PluginRegistry};
use crate::query::Query;
use crate::ranking::RankingStore;
use crate::result::PluginResult;
use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use log::{debug, error};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Maximum number of merged results per emission.
    pub result_limit: usize,
    pub keyword_scope: KeywordScope,
    pub worker_threads: usize,
}

impl DispatchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            result_limit: config.launcher.result_limit(),
            keyword_scope: config.dispatch.keyword_scope,
            worker_threads: config.dispatch.worker_threads(),
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// One emission of the merged view.
#[derive(Debug, Clone)]
pub struct MergedBatch {
    pub generation: u64,
    pub results: Vec<PluginResult>,
    /// Set on the last emission, once every candidate has finished.
    pub complete: bool,
}

#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Completed(MergedBatch),
    /// A newer generation started (or the caller cancelled) before this one finished.
    Superseded { generation: u64 },
}

impl DispatchOutcome {
    pub fn results(&self) -> &[PluginResult] {
        match self {
            DispatchOutcome::Completed(batch) => &batch.results,
            DispatchOutcome::Superseded { .. } => &[],
        }
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, DispatchOutcome::Superseded { .. })
    }
}

enum WorkerEvent {
    Batch {
        slot: usize,
        results: Vec<PluginResult>,
    },
    Finished,
}

pub struct DispatchEngine {
    registry: Arc<PluginRegistry>,
    ranking: Arc<RankingStore>,
    telemetry: PluginTelemetry,
    pool: rayon::ThreadPool,
    settings: DispatchSettings,
    generation: AtomicU64,
    active: Mutex<CancellationToken>,
}

impl DispatchEngine {
    pub fn new(
        registry: Arc<PluginRegistry>,
        ranking: Arc<RankingStore>,
        telemetry: PluginTelemetry,
        settings: DispatchSettings,
    ) -> RflaunchResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(settings.worker_threads.max(1))
            .thread_name(|i| format!("rflaunch-dispatch-{i}"))
            .build()
            .map_err(|e| RflaunchError::Other(format!("failed to build dispatch pool: {e}")))?;

        Ok(Self {
            registry,
            ranking,
            telemetry,
            pool,
            settings,
            generation: AtomicU64::new(0),
            active: Mutex::new(CancellationToken::new()),
        })
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn ranking(&self) -> &Arc<RankingStore> {
        &self.ranking
    }

    pub fn telemetry(&self) -> &PluginTelemetry {
        &self.telemetry
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Cancels whatever generation is in flight without starting a new one.
    pub fn cancel_current(&self) {
        self.active.lock().cancel();
    }

    /// Cancels the in-flight generation and starts an empty one in its place,
    /// for input that produces no query. Returns the new generation.
    pub fn supersede(&self) -> u64 {
        let (generation, _) = self.begin_generation();
        debug!("Generation {} started with no query", generation);
        generation
    }

    fn begin_generation(&self) -> (u64, CancellationToken) {
        let token = CancellationToken::new();
        let mut active = self.active.lock();
        active.cancel();
        *active = token.clone();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.telemetry.generations.inc();
        (generation, token)
    }

    /// Runs one generation for `query`, calling `on_batch` with the merged view
    /// every time a plugin delivers a batch. Blocks until every candidate has
    /// finished or the generation is superseded.
    pub fn dispatch<F>(&self, query: &Query, mut on_batch: F) -> DispatchOutcome
    where
        F: FnMut(&MergedBatch),
    {
        let (generation, token) = self.begin_generation();
        let candidates = self.registry.candidates(query, self.settings.keyword_scope);
        debug!(
            "Generation {} for '{}': {} candidate plugin(s)",
            generation,
            query.raw_query(),
            candidates.len()
        );

        let (tx, rx) = unbounded();
        for (slot, handle) in candidates.iter().cloned().enumerate() {
            let tx = tx.clone();
            let token = token.clone();
            let query = query.clone();
            let ranking = Arc::clone(&self.ranking);
            let telemetry = self.telemetry.clone();
            self.pool.spawn(move || {
                run_candidate(slot, &handle, &query, &token, &ranking, &telemetry, &tx);
                let _ = tx.send(WorkerEvent::Finished);
            });
        }
        drop(tx);

        let mut merger = ResultMerger::new(candidates.len(), self.settings.result_limit);
        let mut pending = candidates.len();
        while pending > 0 {
            if token.is_cancelled() {
                return self.superseded(generation);
            }
            match rx.recv_timeout(CANCEL_POLL_INTERVAL) {
                Ok(WorkerEvent::Batch { slot, results }) => {
                    merger.replace(slot, results);
                    if token.is_cancelled() {
                        return self.superseded(generation);
                    }
                    on_batch(&MergedBatch {
                        generation,
                        results: merger.view(),
                        complete: false,
                    });
                }
                Ok(WorkerEvent::Finished) => pending -= 1,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        if token.is_cancelled() {
            return self.superseded(generation);
        }
        let last = MergedBatch {
            generation,
            results: merger.view(),
            complete: true,
        };
        on_batch(&last);
        debug!(
            "Generation {} complete with {} result(s)",
            generation,
            last.results.len()
        );
        DispatchOutcome::Completed(last)
    }

    /// Dispatch without progress callbacks.
    pub fn dispatch_blocking(&self, query: &Query) -> DispatchOutcome {
        self.dispatch(query, |_| {})
    }

    fn superseded(&self, generation: u64) -> DispatchOutcome {
        self.telemetry.superseded.inc();
        debug!("Generation {} superseded", generation);
        DispatchOutcome::Superseded { generation }
    }
}

fn run_candidate(
    slot: usize,
    handle: &PluginHandle,
    query: &Query,
    token: &CancellationToken,
    ranking: &RankingStore,
    telemetry: &PluginTelemetry,
    tx: &Sender<WorkerEvent>,
) {
    if token.is_cancelled() {
        return;
    }
    let started = Instant::now();
    let outcome = if handle.runtime.supports_streaming() {
        let sink = |batch: Vec<PluginResult>| {
            if token.is_cancelled() {
                return false;
            }
            let results = prepare_results(handle, query, ranking, batch);
            tx.send(WorkerEvent::Batch { slot, results }).is_ok()
        };
        handle
            .runtime
            .query_stream(handle.id(), query, token, &sink)
    } else {
        handle
            .runtime
            .query(handle.id(), query, token)
            .map(|batch| {
                if !token.is_cancelled() {
                    let results = prepare_results(handle, query, ranking, batch);
                    let _ = tx.send(WorkerEvent::Batch { slot, results });
                }
            })
    };

    telemetry.record_call(handle.id(), started.elapsed(), outcome.is_ok());
    if let Err(e) = outcome {
        error!(
            "Plugin '{}' ({}) at {} failed: {}",
            handle.id(),
            handle.descriptor.name,
            handle.descriptor.directory.display(),
            e
        );
    }
}

/// Stamps ownership and origin onto fresh results, resolves icons and applies
/// the ranking overlay.
fn prepare_results(
    handle: &PluginHandle,
    query: &Query,
    ranking: &RankingStore,
    mut batch: Vec<PluginResult>,
) -> Vec<PluginResult> {
    let descriptor = &handle.descriptor;
    for result in &mut batch {
        result.plugin_id = descriptor.id.clone();
        result.origin_query = Some(query.raw_query().to_string());
        result.icon_path = match result.icon_path.take() {
            Some(path) if path.is_relative() => Some(descriptor.directory.join(path)),
            Some(path) => Some(path),
            None => descriptor.icon_path.clone(),
        };
        result.score = ranking.adjusted_score(query.raw_query(), result, descriptor.keep_raw_score);
    }
    batch
}
