//! Wiring of registry, dispatch, ranking, actions and icons into one launcher
use crate::action::ActionExecutor;
use crate::config::{self, Config};
use crate::dispatch::{DispatchEngine, DispatchOutcome, DispatchSettings, MergedBatch, ResultView};
use crate::error::Result as RflaunchResult;
use crate::icon_cache::{IconCache, IconImage, IconKey};
use crate::metrics::PluginTelemetry;
use crate::plugin::{PluginDescriptor, PluginRegistry};
use crate::protocol::HostApi;
use crate::query::{self, Query};
use crate::ranking::RankingStore;
use crate::result::PluginResult;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

/// Main launcher struct that coordinates all components
pub struct Launcher {
    config: Config,
    registry: Arc<PluginRegistry>,
    ranking: Arc<RankingStore>,
    engine: DispatchEngine,
    executor: ActionExecutor,
    icons: IconCache<IconImage>,
    view: ResultView,
}

impl Launcher {
    /// Loads plugins from the configured directories plus `extra_dirs` and
    /// opens the persisted ranking data.
    pub fn new(
        config: Config,
        extra_dirs: &[PathBuf],
        host: Arc<dyn HostApi>,
    ) -> RflaunchResult<Self> {
        config::validate(&config)?;
        let mut directories = config.launcher.plugin_directories.clone();
        directories.extend(extra_dirs.iter().cloned());

        let registry = Arc::new(PluginRegistry::load(&directories, &config.protocol));
        let ranking = Arc::new(RankingStore::open(&config.storage.data_dir()));
        info!(
            "Loaded {} plugin(s) from {} director(ies)",
            registry.len(),
            directories.len()
        );
        Self::with_parts(config, registry, ranking, host)
    }

    /// Builds a launcher around an existing registry and ranking store.
    pub fn with_parts(
        config: Config,
        registry: Arc<PluginRegistry>,
        ranking: Arc<RankingStore>,
        host: Arc<dyn HostApi>,
    ) -> RflaunchResult<Self> {
        let engine = DispatchEngine::new(
            Arc::clone(&registry),
            Arc::clone(&ranking),
            PluginTelemetry::new(),
            DispatchSettings::from_config(&config),
        )?;
        let executor = ActionExecutor::new(Arc::clone(&registry), Arc::clone(&ranking), host);
        let icons = IconCache::from_config(&config.icon_cache)?;

        Ok(Self {
            config,
            registry,
            ranking,
            engine,
            executor,
            icons,
            view: ResultView::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn ranking(&self) -> &Arc<RankingStore> {
        &self.ranking
    }

    pub fn engine(&self) -> &DispatchEngine {
        &self.engine
    }

    pub fn telemetry(&self) -> &PluginTelemetry {
        self.engine.telemetry()
    }

    pub fn view(&self) -> &ResultView {
        &self.view
    }

    pub fn parse(&self, text: &str) -> Option<Query> {
        query::parse(text, self.registry.as_ref())
    }

    /// Runs one generation for `text`. Emissions that the view accepts are
    /// passed on to `on_batch`. Blank input cancels the running generation,
    /// empties the view and returns `None`.
    pub fn query<F>(&self, text: &str, mut on_batch: F) -> Option<DispatchOutcome>
    where
        F: FnMut(&MergedBatch),
    {
        let Some(query) = self.parse(text) else {
            let generation = self.engine.supersede();
            self.view.clear(generation);
            return None;
        };
        let outcome = self.engine.dispatch(&query, |batch| {
            if self.view.publish(batch) {
                on_batch(batch);
            }
        });
        Some(outcome)
    }

    /// Results currently shown.
    pub fn results(&self) -> Vec<PluginResult> {
        self.view.snapshot()
    }

    pub fn cancel(&self) {
        self.engine.cancel_current();
    }

    pub fn execute(&self, result: &PluginResult) -> RflaunchResult<bool> {
        self.executor.execute(result)
    }

    pub fn context_menu(&self, result: &PluginResult) -> RflaunchResult<Vec<PluginResult>> {
        self.executor.context_menu(result)
    }

    /// Pins `result` for the query that produced it.
    pub fn pin(&self, result: &PluginResult) -> bool {
        match &result.origin_query {
            Some(raw) => {
                self.ranking.pin(raw, result);
                true
            }
            None => false,
        }
    }

    pub fn unpin(&self, raw_query: &str) -> bool {
        self.ranking.unpin(raw_query)
    }

    /// Icon declared in the plugin manifest, through the icon cache.
    pub fn plugin_icon(&self, descriptor: &PluginDescriptor) -> Option<IconImage> {
        let icon_path = descriptor.icon_path.as_ref()?;
        Some(
            self.icons
                .icon(IconKey::new(&descriptor.directory, icon_path)),
        )
    }

    pub fn icons(&self) -> &IconCache<IconImage> {
        &self.icons
    }

    /// Persists pinned records and selection counts.
    pub fn save(&self) -> RflaunchResult<()> {
        self.ranking.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::CancellationToken;
    use crate::plugin::NativePlugin;
    use std::thread;
    use std::time::Duration;

    struct NullHost;

    impl HostApi for NullHost {
        fn change_query(&self, _query: &str, _requery: bool) {}
        fn show_message(&self, _title: &str, _subtitle: &str, _icon_path: &str) {}
        fn copy_to_clipboard(&self, _text: &str) {}
        fn hide_app(&self) {}
        fn show_app(&self) {}
        fn reload_plugin_data(&self) {}
    }

    /// Answers after `delay`, or with nothing once cancelled.
    struct Slow {
        delay: Duration,
    }

    impl NativePlugin for Slow {
        fn query(&self, _: &Query, token: &CancellationToken) -> RflaunchResult<Vec<PluginResult>> {
            let step = Duration::from_millis(5);
            let mut waited = Duration::ZERO;
            while waited < self.delay {
                if token.is_cancelled() {
                    return Ok(Vec::new());
                }
                thread::sleep(step);
                waited += step;
            }
            Ok(vec![PluginResult::new("stale", "", 1)])
        }
    }

    fn launcher(delay: Duration) -> Launcher {
        let registry = Arc::new(PluginRegistry::new());
        registry
            .register_native(
                PluginDescriptor::native("slow", "Slow", &["*"]),
                Arc::new(Slow { delay }),
            )
            .unwrap();
        Launcher::with_parts(
            Config::default(),
            registry,
            Arc::new(RankingStore::new()),
            Arc::new(NullHost),
        )
        .unwrap()
    }

    #[test]
    fn blank_input_cancels_running_query_and_clears_view() {
        let launcher = Arc::new(launcher(Duration::from_millis(300)));
        let running = {
            let launcher = Arc::clone(&launcher);
            thread::spawn(move || launcher.query("old", |_| {}))
        };
        thread::sleep(Duration::from_millis(50));

        assert!(launcher.query("   ", |_| {}).is_none());
        let first = running.join().unwrap().unwrap();
        assert!(first.is_superseded());
        assert!(launcher.results().is_empty());
        assert_eq!(launcher.view().generation(), 2);
    }

    #[test]
    fn blank_input_clears_finished_results() {
        let launcher = launcher(Duration::ZERO);
        launcher.query("old", |_| {}).unwrap();
        assert_eq!(launcher.results().len(), 1);

        assert!(launcher.query("", |_| {}).is_none());
        assert!(launcher.results().is_empty());
    }
}
