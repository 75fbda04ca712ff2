//! Shared test utilities for the affnav test suite.
//!
//! Provides a sample traditional config, category chunk builders, a scripted
//! in-memory [`CategorySource`] and a hand-driven [`Clock`].
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let source = FakeSource::with_categories(&[(0, 3)])
//!     .delay(Duration::from_millis(50))
//!     .fail_next(1);
//! let loader = CategoryLoader::new(source.clone());
//!
//! assert!(loader.load_category(0).await.is_err());
//! assert_eq!(source.fetches(), 1);
//! ```

use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use crate::loader::source::CategorySource;
use crate::loader::{Clock, LoadError};
use crate::types::{CategoryData, CategoryMetadata, Site, SiteConfig};

// =========================================================================
// Config fixtures
// =========================================================================

/// A small traditional config: one `single` item with four sites and one
/// `tabs` item with two submenus (two sites and one site).
pub fn sample_config_json() -> Value {
    json!({
        "site": {
            "title": "Affiliate导航",
            "description": "联盟营销工具与资源导航",
            "logo": { "text": "AffNav", "href": "/" }
        },
        "categoryMap": {
            "追踪器": "trackers",
            "工具": "tools"
        },
        "menuItems": [
            {
                "name": "追踪器",
                "href": "#trackers",
                "icon": "chart",
                "type": "single",
                "sites": [
                    {
                        "title": "Binom",
                        "description": "Self-hosted tracker",
                        "url": "https://binom.org",
                        "advantages": ["fast", "self-hosted"],
                        "details": { "pricing": "$69/mo" }
                    },
                    { "title": "Voluum", "description": "Cloud tracker", "url": "https://voluum.com" },
                    { "title": "RedTrack", "description": "Attribution", "url": "https://redtrack.io" },
                    { "title": "Keitaro", "description": "Tracker for teams" }
                ]
            },
            {
                "name": "工具",
                "href": "#tools",
                "icon": "tool",
                "type": "tabs",
                "submenu": [
                    {
                        "name": "SPY",
                        "href": "#spy",
                        "icon": "eye",
                        "sites": [
                            { "title": "AdPlexity", "description": "Ad spy", "url": "https://adplexity.com" },
                            { "title": "Anstrex", "description": "Native ad spy" }
                        ]
                    },
                    {
                        "name": "代理",
                        "href": "#proxy",
                        "icon": "globe",
                        "sites": [
                            { "title": "Luminati", "description": "Residential proxies", "url": "https://brightdata.com" }
                        ]
                    }
                ]
            }
        ]
    })
}

pub fn sample_config() -> SiteConfig {
    serde_json::from_value(sample_config_json()).unwrap()
}

/// Sites named `Site {index}-{i}`.
pub fn sites(index: u32, count: usize) -> Vec<Site> {
    (0..count)
        .map(|i| {
            let mut site = Site::new(format!("Site {index}-{i}"), format!("Description {i}"));
            site.url = Some(format!("https://example.com/{index}/{i}"));
            site
        })
        .collect()
}

pub fn category_data(index: u32, count: usize) -> CategoryData {
    CategoryData {
        category_index: index,
        category_name: format!("Category {index}"),
        sites: sites(index, count),
        metadata: CategoryMetadata {
            site_count: count,
            file_size_kb: 0.5,
            last_modified: None,
        },
    }
}

// =========================================================================
// Fake source
// =========================================================================

#[derive(Default)]
struct FakeInner {
    bodies: Mutex<HashMap<u32, Vec<u8>>>,
    fetches: AtomicUsize,
    fail_next: AtomicUsize,
}

/// Scripted [`CategorySource`]. Clones share bodies and counters.
#[derive(Clone, Default)]
pub struct FakeSource {
    inner: Arc<FakeInner>,
    delay: Duration,
}

impl FakeSource {
    /// Source serving `category_data(index, count)` for each pair.
    pub fn with_categories(categories: &[(u32, usize)]) -> Self {
        categories
            .iter()
            .fold(Self::default(), |source, &(index, count)| {
                let body = serde_json::to_vec(&category_data(index, count)).unwrap();
                source.with_body(index, body)
            })
    }

    pub fn with_body(self, index: u32, body: Vec<u8>) -> Self {
        self.inner.bodies.lock().insert(index, body);
        self
    }

    /// Every fetch sleeps this long before answering.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// The next `n` fetches fail with a network error.
    pub fn fail_next(self, n: usize) -> Self {
        self.inner.fail_next.store(n, Ordering::SeqCst);
        self
    }

    pub fn fetches(&self) -> usize {
        self.inner.fetches.load(Ordering::SeqCst)
    }
}

impl CategorySource for FakeSource {
    async fn fetch(&self, index: u32) -> Result<Vec<u8>, LoadError> {
        self.inner.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let failing = self
            .inner
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(LoadError::Network {
                index,
                message: "connection reset".to_string(),
            });
        }

        let body = self.inner.bodies.lock().get(&index).cloned();
        body.ok_or(LoadError::Status {
            index,
            status: 404,
            reason: "Not Found".to_string(),
        })
    }
}

// =========================================================================
// Clock
// =========================================================================

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(now_ms),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now_ms
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}
