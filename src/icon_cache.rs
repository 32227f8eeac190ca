//! Bounded, expiring icon cache with background population and eviction
use crate::config::IconCacheConfig;
use crate::error::{Result as RflaunchResult, RflaunchError};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, warn};
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Values whose underlying resource must be released when they leave the cache.
pub trait Disposable {
    fn dispose(&self);
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IconKey {
    pub plugin_directory: PathBuf,
    pub icon_path: PathBuf,
}

impl IconKey {
    pub fn new(plugin_directory: impl Into<PathBuf>, icon_path: impl Into<PathBuf>) -> Self {
        Self {
            plugin_directory: plugin_directory.into(),
            icon_path: icon_path.into(),
        }
    }

    /// Icon path made absolute against the plugin directory.
    pub fn resolved_path(&self) -> PathBuf {
        if self.icon_path.is_absolute() {
            self.icon_path.clone()
        } else {
            self.plugin_directory.join(&self.icon_path)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconSource {
    File,
    Default,
    Error,
}

/// Decoded-or-raw icon bytes. Clones share the same buffer, which is released
/// on [`Disposable::dispose`].
#[derive(Debug, Clone)]
pub struct IconImage {
    source: IconSource,
    path: Option<PathBuf>,
    data: Arc<RwLock<Option<Arc<[u8]>>>>,
}

impl IconImage {
    fn with_data(source: IconSource, path: Option<PathBuf>, bytes: Vec<u8>) -> Self {
        Self {
            source,
            path,
            data: Arc::new(RwLock::new(Some(Arc::from(bytes)))),
        }
    }

    pub fn try_load(path: &Path) -> RflaunchResult<Self> {
        let bytes = fs::read(path).map_err(|source| RflaunchError::Icon {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::with_data(IconSource::File, Some(path.to_path_buf()), bytes))
    }

    /// Reads the icon at `path`. Failures give the error image.
    pub fn load(path: &Path) -> Self {
        Self::try_load(path).unwrap_or_else(|e| {
            warn!("{e}");
            Self::error()
        })
    }

    pub fn load_key(key: &IconKey) -> Self {
        Self::load(&key.resolved_path())
    }

    /// Placeholder shown while the real icon loads.
    pub fn default_image() -> Self {
        Self::with_data(IconSource::Default, None, Vec::new())
    }

    /// Shown for icons that could not be loaded.
    pub fn error() -> Self {
        Self::with_data(IconSource::Error, None, Vec::new())
    }

    pub fn source(&self) -> IconSource {
        self.source
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn bytes(&self) -> Option<Arc<[u8]>> {
        self.data.read().clone()
    }

    pub fn len(&self) -> usize {
        self.data.read().as_ref().map_or(0, |b| b.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_disposed(&self) -> bool {
        self.data.read().is_none()
    }
}

impl Disposable for IconImage {
    fn dispose(&self) {
        if self.data.write().take().is_none() {
            warn!("Icon {:?} disposed twice", self.path);
        }
    }
}

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

type Factory<V> = Box<dyn FnOnce() -> V + Send>;
type ReadyCallback<V> = Box<dyn FnOnce(V) + Send>;

enum LoaderMessage<V> {
    Load {
        key: IconKey,
        factory: Factory<V>,
        on_ready: ReadyCallback<V>,
    },
    Flush(Sender<()>),
    Shutdown,
}

enum EvictionMessage {
    Inserted,
    Flush(Sender<()>),
    Shutdown,
}

struct Shared<V> {
    // Most recently used last. Access refreshes expiry with a uniform TTL, so
    // the least recently used entry is always the one closest to expiry.
    entries: Mutex<LruCache<IconKey, CacheEntry<V>>>,
    ttl: Duration,
    capacity: usize,
    eviction_tx: Sender<EvictionMessage>,
}

impl<V: Disposable + Clone> Shared<V> {
    fn lookup(&self, key: &IconKey) -> Option<V> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(key)?;
        entry.expires_at = Instant::now() + self.ttl;
        Some(entry.value.clone())
    }

    /// Stores `value` unless another thread got there first, in which case the
    /// stored value wins and `value` is disposed.
    fn store(&self, key: IconKey, value: V) -> V {
        let stored = {
            let mut entries = self.entries.lock();
            if let Some(existing) = entries.get_mut(&key) {
                existing.expires_at = Instant::now() + self.ttl;
                let existing = existing.value.clone();
                drop(entries);
                value.dispose();
                return existing;
            }
            entries.put(
                key,
                CacheEntry {
                    value: value.clone(),
                    expires_at: Instant::now() + self.ttl,
                },
            );
            value
        };
        let _ = self.eviction_tx.send(EvictionMessage::Inserted);
        stored
    }

    fn enforce_capacity(&self) -> usize {
        let mut evicted = Vec::new();
        {
            let mut entries = self.entries.lock();
            while entries.len() > self.capacity {
                match entries.pop_lru() {
                    Some((_, entry)) => evicted.push(entry.value),
                    None => break,
                }
            }
        }
        for value in &evicted {
            value.dispose();
        }
        evicted.len()
    }

    fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut expired = Vec::new();
        {
            let mut entries = self.entries.lock();
            let keys: Vec<IconKey> = entries
                .iter()
                .filter(|(_, entry)| entry.expires_at <= now)
                .map(|(key, _)| key.clone())
                .collect();
            for key in keys {
                if let Some(entry) = entries.pop(&key) {
                    expired.push(entry.value);
                }
            }
        }
        for value in &expired {
            value.dispose();
        }
        expired.len()
    }
}

/// Icon cache keyed by `(plugin directory, icon path)`.
///
/// Two background threads serve it: one computes icons requested through
/// [`IconCache::get_or_add_async`], the other enforces the capacity after
/// every insert and sweeps expired entries on a timer. Every entry that
/// leaves the cache is disposed exactly once.
pub struct IconCache<V: Disposable + Clone + Send + Sync + 'static = IconImage> {
    shared: Arc<Shared<V>>,
    loader_tx: Sender<LoaderMessage<V>>,
    loader: Option<JoinHandle<()>>,
    evictor: Option<JoinHandle<()>>,
}

impl<V: Disposable + Clone + Send + Sync + 'static> IconCache<V> {
    pub fn new(capacity: usize, ttl: Duration, sweep_interval: Duration) -> RflaunchResult<Self> {
        let (eviction_tx, eviction_rx) = unbounded();
        let (loader_tx, loader_rx) = unbounded();
        let shared = Arc::new(Shared {
            entries: Mutex::new(LruCache::unbounded()),
            ttl,
            capacity,
            eviction_tx,
        });

        let evictor = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("rflaunch-icon-evictor".to_string())
                .spawn(move || eviction_loop(&shared, &eviction_rx, sweep_interval))?
        };
        let loader = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("rflaunch-icon-loader".to_string())
                .spawn(move || loader_loop(&shared, &loader_rx))?
        };

        Ok(Self {
            shared,
            loader_tx,
            loader: Some(loader),
            evictor: Some(evictor),
        })
    }

    pub fn from_config(config: &IconCacheConfig) -> RflaunchResult<Self> {
        Self::new(config.capacity, config.ttl(), config.sweep_interval())
    }

    /// Cached value for `key`, computing it with `factory` on this thread when
    /// absent.
    pub fn get_or_add<F>(&self, key: IconKey, factory: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.shared.lookup(&key) {
            return value;
        }
        let value = factory();
        self.shared.store(key, value)
    }

    /// Cached value for `key`, or `default` right away while `factory` runs on
    /// the loader thread. `on_ready` is called once, from that thread, with the
    /// value that ended up in the cache.
    pub fn get_or_add_async<F, R>(&self, key: IconKey, default: V, factory: F, on_ready: R) -> V
    where
        F: FnOnce() -> V + Send + 'static,
        R: FnOnce(V) + Send + 'static,
    {
        if let Some(value) = self.shared.lookup(&key) {
            return value;
        }
        let message = LoaderMessage::Load {
            key,
            factory: Box::new(factory),
            on_ready: Box::new(on_ready),
        };
        if self.loader_tx.send(message).is_err() {
            warn!("Icon loader is not running");
        }
        default
    }

    /// Cached value without computing anything. Refreshes expiry on a hit.
    pub fn get(&self, key: &IconKey) -> Option<V> {
        self.shared.lookup(key)
    }

    pub fn contains(&self, key: &IconKey) -> bool {
        self.shared.entries.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.shared.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Blocks until both workers have handled everything queued so far.
    pub fn flush(&self) {
        let (done_tx, done_rx) = unbounded();
        if self.loader_tx.send(LoaderMessage::Flush(done_tx)).is_ok() {
            let _ = done_rx.recv();
        }
        let (done_tx, done_rx) = unbounded();
        if self
            .shared
            .eviction_tx
            .send(EvictionMessage::Flush(done_tx))
            .is_ok()
        {
            let _ = done_rx.recv();
        }
    }
}

impl IconCache<IconImage> {
    /// Icon for `key` loaded from disk, synchronously.
    pub fn icon(&self, key: IconKey) -> IconImage {
        let target = key.clone();
        self.get_or_add(key, move || IconImage::load_key(&target))
    }
}

impl<V: Disposable + Clone + Send + Sync + 'static> Drop for IconCache<V> {
    fn drop(&mut self) {
        let _ = self.loader_tx.send(LoaderMessage::Shutdown);
        if let Some(handle) = self.loader.take() {
            let _ = handle.join();
        }
        let _ = self.shared.eviction_tx.send(EvictionMessage::Shutdown);
        if let Some(handle) = self.evictor.take() {
            let _ = handle.join();
        }

        let mut entries = self.shared.entries.lock();
        while let Some((_, entry)) = entries.pop_lru() {
            entry.value.dispose();
        }
    }
}

fn loader_loop<V: Disposable + Clone>(shared: &Shared<V>, rx: &Receiver<LoaderMessage<V>>) {
    while let Ok(message) = rx.recv() {
        match message {
            LoaderMessage::Load {
                key,
                factory,
                on_ready,
            } => {
                let value = match shared.lookup(&key) {
                    Some(value) => value,
                    None => shared.store(key, factory()),
                };
                on_ready(value);
            }
            LoaderMessage::Flush(done) => {
                let _ = done.send(());
            }
            LoaderMessage::Shutdown => break,
        }
    }
    debug!("Icon loader stopped");
}

fn eviction_loop<V: Disposable + Clone>(
    shared: &Shared<V>,
    rx: &Receiver<EvictionMessage>,
    sweep_interval: Duration,
) {
    let mut next_sweep = Instant::now() + sweep_interval;
    loop {
        let wait = next_sweep.saturating_duration_since(Instant::now());
        match rx.recv_timeout(wait) {
            Ok(EvictionMessage::Inserted) => {
                let evicted = shared.enforce_capacity();
                if evicted > 0 {
                    debug!("Evicted {} icon(s) over capacity", evicted);
                }
            }
            Ok(EvictionMessage::Flush(done)) => {
                let _ = done.send(());
            }
            Ok(EvictionMessage::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
        // a steady stream of inserts must not postpone the sweep
        if Instant::now() >= next_sweep {
            let expired = shared.sweep_expired();
            if expired > 0 {
                debug!("Swept {} expired icon(s)", expired);
            }
            next_sweep = Instant::now() + sweep_interval;
        }
    }
    debug!("Icon evictor stopped");
}
