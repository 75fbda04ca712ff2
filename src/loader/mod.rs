//! Category lazy loader.
//!
//! Optimized configs ship only a few preview sites per category; the rest
//! live in `/categories/{index}.json` and are fetched on demand. The loader
//! owns that fetch:
//!
//! - **Single flight.** At most one request per index is in progress. Later
//!   callers subscribe to the leader's result through a `watch` channel
//!   instead of issuing their own request.
//! - **Cache first.** A fresh cache entry is served without touching the
//!   source. Entries expire after [`LoaderSettings::cache_expiry`].
//! - **Bounded.** Each fetch is wrapped in a timeout; dropping the fetch
//!   future aborts the request. Manual retries stop after
//!   [`LoaderSettings::max_retries`] consecutive failures.
//! - **Persistent.** The whole cache is written to a [`CacheStore`] after
//!   every successful load and read back once at construction. Storage
//!   failures are logged and otherwise ignored.
//!
//! State bookkeeping lives in [`state`], persistence in [`cache`], fetching
//! in [`source`] and everything visible in [`view`].
//!
//! ## Locking
//!
//! `cache`, `states` and `in_flight` are `parking_lot` mutexes that are never
//! held across an `.await`. When more than one is needed they are taken in
//! that order: `in_flight`, then `cache`, then `states`.

pub mod cache;
pub mod source;
pub mod state;
pub mod view;

use crate::types::CategoryData;
use crate::validation::validate_category_data;
use cache::{CacheEntries, CacheEntry, CacheStats, CacheStore, NullStore};
use parking_lot::Mutex;
use source::CategorySource;
use state::{CategoryLoadState, LoadPhase};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use view::{CategoryView, NoopView};

pub use cache::{FileStore, MemoryStore};
pub use source::{DirSource, HttpSource};
pub use view::PanelView;

/// Why a category failed to load.
///
/// `Network`, `Status` and `Timeout` are transport failures; `Format` means
/// the chunk arrived but had the wrong shape. All of them count towards the
/// retry limit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("category {index}: network error: {message}")]
    Network { index: u32, message: String },

    #[error("category {index}: HTTP {status} {reason}")]
    Status {
        index: u32,
        status: u16,
        reason: String,
    },

    #[error("category {index}: timed out after {timeout_ms} ms")]
    Timeout { index: u32, timeout_ms: u64 },

    #[error("category {index}: invalid category data: {message}")]
    Format { index: u32, message: String },

    #[error("category {index}: max retries exceeded ({attempts} attempts)")]
    RetriesExhausted { index: u32, attempts: u32 },

    #[error("category {index}: load was cancelled")]
    Cancelled { index: u32 },
}

impl LoadError {
    pub fn index(&self) -> u32 {
        match self {
            LoadError::Network { index, .. }
            | LoadError::Status { index, .. }
            | LoadError::Timeout { index, .. }
            | LoadError::Format { index, .. }
            | LoadError::RetriesExhausted { index, .. }
            | LoadError::Cancelled { index } => *index,
        }
    }

    /// Transport-level failure (as opposed to bad data or loader policy).
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            LoadError::Network { .. } | LoadError::Status { .. } | LoadError::Timeout { .. }
        )
    }
}

/// Loader tuning. Defaults match the published site's behaviour.
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderSettings {
    pub max_retries: u32,
    /// Base delay; retry `n` waits `retry_delay * n`.
    pub retry_delay: Duration,
    pub timeout: Duration,
    pub cache_expiry: Duration,
    /// Load category 0 from [`CategoryLoader::preload_first`].
    pub preload_first: bool,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
            timeout: Duration::from_secs(10),
            cache_expiry: Duration::from_millis(cache::DEFAULT_EXPIRY_MS),
            preload_first: true,
        }
    }
}

/// Source of "now" for cache timestamps, in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }
}

/// A `data-action` trigger from a category container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    LoadCategory,
    RetryLoad,
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            crate::render::ACTION_LOAD_CATEGORY => Ok(Action::LoadCategory),
            crate::render::ACTION_RETRY_LOAD => Ok(Action::RetryLoad),
            other => Err(format!("unknown action '{other}'")),
        }
    }
}

type Shared = Result<Arc<CategoryData>, LoadError>;

enum Role {
    Cached(Arc<CategoryData>, u64),
    Leader(watch::Sender<Option<Shared>>),
    Follower(watch::Receiver<Option<Shared>>),
}

pub struct CategoryLoader<S> {
    source: S,
    settings: LoaderSettings,
    store: Box<dyn CacheStore>,
    view: Arc<dyn CategoryView>,
    clock: Arc<dyn Clock>,
    cache: Mutex<CacheEntries>,
    states: Mutex<HashMap<u32, CategoryLoadState>>,
    in_flight: Mutex<HashMap<u32, watch::Receiver<Option<Shared>>>>,
}

pub struct CategoryLoaderBuilder<S> {
    source: S,
    settings: LoaderSettings,
    store: Box<dyn CacheStore>,
    view: Arc<dyn CategoryView>,
    clock: Arc<dyn Clock>,
}

impl<S: CategorySource> CategoryLoaderBuilder<S> {
    pub fn settings(mut self, settings: LoaderSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn store(mut self, store: impl CacheStore + 'static) -> Self {
        self.store = Box::new(store);
        self
    }

    pub fn view(mut self, view: Arc<dyn CategoryView>) -> Self {
        self.view = view;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build the loader and restore whatever fresh entries the store holds.
    pub fn build(self) -> CategoryLoader<S> {
        let loader = CategoryLoader {
            source: self.source,
            settings: self.settings,
            store: self.store,
            view: self.view,
            clock: self.clock,
            cache: Mutex::new(CacheEntries::new()),
            states: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        };
        loader.restore();
        loader
    }
}

impl<S: CategorySource> CategoryLoader<S> {
    /// Loader with default settings, no persistence and no view.
    pub fn new(source: S) -> Self {
        Self::builder(source).build()
    }

    pub fn builder(source: S) -> CategoryLoaderBuilder<S> {
        CategoryLoaderBuilder {
            source,
            settings: LoaderSettings::default(),
            store: Box::new(NullStore),
            view: Arc::new(NoopView),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn settings(&self) -> &LoaderSettings {
        &self.settings
    }

    fn ttl_ms(&self) -> u64 {
        self.settings.cache_expiry.as_millis() as u64
    }

    fn restore(&self) {
        let blob = match self.store.read() {
            Ok(Some(blob)) => blob,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "could not read category cache, starting empty");
                return;
            }
        };
        let entries = match cache::decode_blob(&blob) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "discarding corrupt category cache");
                return;
            }
        };
        let total = entries.len();
        let fresh = cache::sweep_expired(entries, self.clock.now_ms(), self.ttl_ms());
        debug!(restored = fresh.len(), expired = total - fresh.len(), "restored category cache");
        *self.cache.lock() = fresh;
    }

    fn persist(&self) {
        let blob = cache::encode_blob(&self.cache.lock());
        if let Err(e) = blob.and_then(|blob| self.store.write(&blob)) {
            warn!(error = %e, "could not persist category cache");
        }
    }

    fn update_state(&self, index: u32, f: impl FnOnce(&mut CategoryLoadState)) {
        f(self.states.lock().entry(index).or_default());
    }

    /// Fresh cache entry for `index`. A stale one is dropped on the way.
    fn cached(&self, index: u32) -> Option<(Arc<CategoryData>, u64)> {
        let mut cache = self.cache.lock();
        let entry = cache.get(&index)?;
        if cache::is_fresh(entry, self.clock.now_ms(), self.ttl_ms()) {
            return Some((Arc::clone(&entry.data), entry.timestamp));
        }
        cache.remove(&index);
        drop(cache);
        debug!(index, "cached category expired");
        self.update_state(index, CategoryLoadState::expire);
        None
    }

    /// Load one category: from cache, by joining an in-flight request, or by
    /// fetching it.
    pub async fn load_category(&self, index: u32) -> Result<Arc<CategoryData>, LoadError> {
        let role = {
            let mut in_flight = self.in_flight.lock();
            if let Some(rx) = in_flight.get(&index) {
                Role::Follower(rx.clone())
            } else if let Some((data, stored_at)) = self.cached(index) {
                Role::Cached(data, stored_at)
            } else {
                let (tx, rx) = watch::channel(None);
                in_flight.insert(index, rx);
                Role::Leader(tx)
            }
        };

        match role {
            Role::Cached(data, stored_at) => {
                debug!(index, "serving category from cache");
                self.update_state(index, |s| s.succeed(stored_at));
                self.view.show_loaded(index, &data);
                Ok(data)
            }
            Role::Follower(rx) => {
                debug!(index, "joining in-flight category load");
                wait_for_leader(index, rx).await
            }
            Role::Leader(tx) => {
                let mut guard = InFlightGuard {
                    loader: self,
                    index,
                    completed: false,
                };
                let result = self.fetch_and_store(index).await;
                guard.completed = true;
                tx.send_replace(Some(result.clone()));
                result
            }
        }
    }

    async fn fetch_and_store(&self, index: u32) -> Result<Arc<CategoryData>, LoadError> {
        self.update_state(index, CategoryLoadState::begin);
        self.view.show_loading(index);

        match self.fetch_category(index).await {
            Ok(data) => {
                let now = self.clock.now_ms();
                self.cache.lock().insert(
                    index,
                    CacheEntry {
                        data: Arc::clone(&data),
                        timestamp: now,
                    },
                );
                self.persist();
                self.update_state(index, |s| s.succeed(now));
                self.view.show_loaded(index, &data);
                info!(index, sites = data.sites.len(), "category loaded");
                Ok(data)
            }
            Err(e) => {
                let message = e.to_string();
                warn!(index, error = %message, "category load failed");
                self.update_state(index, |s| s.fail(message.clone()));
                self.view.show_error(index, &message);
                Err(e)
            }
        }
    }

    async fn fetch_category(&self, index: u32) -> Result<Arc<CategoryData>, LoadError> {
        let timeout = self.settings.timeout;
        let body = match tokio::time::timeout(timeout, self.source.fetch(index)).await {
            Ok(body) => body?,
            Err(_) => {
                return Err(LoadError::Timeout {
                    index,
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
        };
        parse_category(index, &body).map(Arc::new)
    }

    /// Manual retry from the error panel.
    ///
    /// Refuses once the retry count reaches `max_retries`; otherwise waits
    /// `retry_delay * retry_count` and loads again.
    pub async fn retry_load(&self, index: u32) -> Result<Arc<CategoryData>, LoadError> {
        let attempts = self.state(index).retry_count;
        if attempts >= self.settings.max_retries {
            warn!(index, attempts, "max retries exceeded, not retrying");
            self.view.show_retries_exhausted(index, attempts);
            return Err(LoadError::RetriesExhausted { index, attempts });
        }

        let delay = self.settings.retry_delay * attempts;
        if !delay.is_zero() {
            debug!(index, delay_ms = delay.as_millis() as u64, "waiting before retry");
            tokio::time::sleep(delay).await;
        }
        self.load_category(index).await
    }

    /// Load, then retry until the retry budget is spent. A 404 is not
    /// retried. On give-up the last fetch error is returned, not
    /// [`LoadError::RetriesExhausted`].
    pub async fn load_with_retries(&self, index: u32) -> Result<Arc<CategoryData>, LoadError> {
        let mut result = self.load_category(index).await;
        while let Err(e) = &result {
            if matches!(e, LoadError::RetriesExhausted { .. } | LoadError::Cancelled { .. })
                || matches!(e, LoadError::Status { status: 404, .. })
            {
                break;
            }
            match self.retry_load(index).await {
                Err(LoadError::RetriesExhausted { .. }) => break,
                retried => result = retried,
            }
        }
        result
    }

    /// Dispatch a `data-action` trigger.
    pub async fn handle_action(
        &self,
        action: Action,
        index: u32,
    ) -> Result<Arc<CategoryData>, LoadError> {
        match action {
            Action::LoadCategory => self.load_category(index).await,
            Action::RetryLoad => self.retry_load(index).await,
        }
    }

    /// Page-ready hook: load category 0 when enabled and its container exists.
    pub async fn preload_first(&self) -> Option<Result<Arc<CategoryData>, LoadError>> {
        if !self.settings.preload_first || !self.view.has_panel(0) {
            return None;
        }
        Some(self.load_category(0).await)
    }

    /// Drop expired entries from memory and storage. Returns how many went.
    pub fn clean_expired_cache(&self) -> usize {
        let now = self.clock.now_ms();
        let ttl = self.ttl_ms();
        let removed: Vec<u32> = {
            let mut cache = self.cache.lock();
            let before: Vec<u32> = cache.keys().copied().collect();
            let fresh = cache::sweep_expired(std::mem::take(&mut *cache), now, ttl);
            *cache = fresh;
            before.into_iter().filter(|i| !cache.contains_key(i)).collect()
        };
        if removed.is_empty() {
            return 0;
        }
        for &index in &removed {
            self.update_state(index, CategoryLoadState::expire);
        }
        self.persist();
        debug!(removed = removed.len(), "swept expired categories");
        removed.len()
    }

    /// Forget everything cached, in memory and in storage.
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "could not clear persisted category cache");
        }
    }

    pub fn state(&self, index: u32) -> CategoryLoadState {
        self.states.lock().get(&index).cloned().unwrap_or_default()
    }

    pub fn cached_indices(&self) -> Vec<u32> {
        self.cache.lock().keys().copied().collect()
    }

    pub fn cache_stats(&self) -> CacheStats {
        let (cached_categories, cache_size) = {
            let cache = self.cache.lock();
            let size = cache
                .values()
                .map(|e| serde_json::to_vec(&*e.data).map_or(0, |v| v.len()))
                .sum();
            (cache.len(), size)
        };
        let states = self.states.lock();
        let count = |phase: LoadPhase| states.values().filter(|s| s.phase == phase).count();
        CacheStats {
            cached_categories,
            loading: count(LoadPhase::Loading),
            failed: count(LoadPhase::Error),
            cache_size,
        }
    }
}

/// Removes the in-flight entry when the leader finishes or is dropped.
struct InFlightGuard<'a, S> {
    loader: &'a CategoryLoader<S>,
    index: u32,
    completed: bool,
}

impl<S> Drop for InFlightGuard<'_, S> {
    fn drop(&mut self) {
        self.loader.in_flight.lock().remove(&self.index);
        if !self.completed {
            debug!(index = self.index, "category load abandoned");
            self.loader
                .states
                .lock()
                .entry(self.index)
                .or_default()
                .cancel();
        }
    }
}

async fn wait_for_leader(index: u32, mut rx: watch::Receiver<Option<Shared>>) -> Shared {
    let outcome = match rx.wait_for(Option::is_some).await {
        Ok(value) => value.clone(),
        Err(_) => None,
    };
    outcome.unwrap_or(Err(LoadError::Cancelled { index }))
}

/// Decode and shape-check a fetched chunk.
pub fn parse_category(index: u32, body: &[u8]) -> Result<CategoryData, LoadError> {
    let format_err = |message: String| LoadError::Format { index, message };

    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| format_err(e.to_string()))?;
    validate_category_data(&value).map_err(|e| format_err(e.to_string()))?;
    let data: CategoryData = serde_json::from_value(value).map_err(|e| format_err(e.to_string()))?;

    if data.category_index != index {
        warn!(
            index,
            declared = data.category_index,
            "category chunk declares a different index"
        );
    }
    Ok(data)
}
