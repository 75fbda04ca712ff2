//! Config format detection and normalization.
//!
//! A site is published with either a *traditional* config (every site
//! inlined under its menu item) or an *optimized* one (a few preview sites
//! per item plus a `categoryIndex` pointing at `/categories/{i}.json`).
//! Rendering and the loader only ever see [`UnifiedConfig`], which covers
//! both.
//!
//! ## Detection
//!
//! Three signals are scored:
//!
//! | Signal | Weight |
//! |--------|--------|
//! | `optimization.enabled == true` | 0.5 |
//! | any menu item or submenu has `categoryIndex` | 0.3 |
//! | any menu item or submenu has `previewSites` | 0.2 |
//!
//! A score of 0.5 or more means optimized, with the score as confidence.
//! Below that, a config whose menu items carry `sites` / `submenu` arrays is
//! traditional; confidence is the share of conforming items, discounted by
//! any stray optimization signals. Anything else is unknown with zero
//! confidence. Detection never fails.
//!
//! ## Normalization
//!
//! [`unify`] never fails either. Items that can't be read are dropped with a
//! warning. An unknown config is read the traditional way: nothing is lazy
//! and whatever sites are present are taken as complete.

use crate::types::{MenuType, Optimization, OptimizedMenuItem, Site, SiteInfo};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

pub const TRADITIONAL_CONFIG: &str = "config.json";
pub const OPTIMIZED_CONFIG: &str = "config-optimized.json";

const OPTIMIZATION_WEIGHT: f64 = 0.5;
const CATEGORY_INDEX_WEIGHT: f64 = 0.3;
const PREVIEW_SITES_WEIGHT: f64 = 0.2;
const OPTIMIZED_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigFormat {
    Traditional,
    Optimized,
    Unknown,
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfigFormat::Traditional => "traditional",
            ConfigFormat::Optimized => "optimized",
            ConfigFormat::Unknown => "unknown",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub format: ConfigFormat,
    pub has_optimization_field: bool,
    pub has_category_indexes: bool,
    pub has_preview_sites: bool,
    pub estimated_categories: usize,
    /// In `[0, 1]`.
    pub confidence: f64,
}

impl Detection {
    fn unknown() -> Self {
        Self {
            format: ConfigFormat::Unknown,
            has_optimization_field: false,
            has_category_indexes: false,
            has_preview_sites: false,
            estimated_categories: 0,
            confidence: 0.0,
        }
    }

    pub fn is_optimized(&self) -> bool {
        self.format == ConfigFormat::Optimized
    }
}

/// Menu items followed by their submenus, as JSON objects.
fn menu_entries(items: &[Value]) -> impl Iterator<Item = &serde_json::Map<String, Value>> {
    items.iter().filter_map(Value::as_object).flat_map(|item| {
        let subs = item
            .get("submenu")
            .and_then(Value::as_array)
            .map(|subs| subs.as_slice())
            .unwrap_or_default();
        std::iter::once(item).chain(subs.iter().filter_map(Value::as_object))
    })
}

fn looks_traditional(item: &Value) -> bool {
    let Some(obj) = item.as_object() else {
        return false;
    };
    match obj.get("type").and_then(Value::as_str) {
        Some("tabs") => obj.get("submenu").is_some_and(Value::is_array),
        _ => obj.get("sites").is_some_and(Value::is_array),
    }
}

pub fn detect_format(config: &Value) -> Detection {
    let Some(items) = config.get("menuItems").and_then(Value::as_array) else {
        return Detection::unknown();
    };
    if !config.get("site").is_some_and(Value::is_object) {
        return Detection::unknown();
    }

    let has_optimization_field = config
        .pointer("/optimization/enabled")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let mut indices: Vec<u64> = menu_entries(items)
        .filter_map(|entry| entry.get("categoryIndex").and_then(Value::as_u64))
        .collect();
    indices.sort_unstable();
    indices.dedup();
    let has_category_indexes = !indices.is_empty();
    let has_preview_sites =
        menu_entries(items).any(|entry| entry.get("previewSites").is_some_and(Value::is_array));

    let weight = |on: bool, w: f64| if on { w } else { 0.0 };
    let score = weight(has_optimization_field, OPTIMIZATION_WEIGHT)
        + weight(has_category_indexes, CATEGORY_INDEX_WEIGHT)
        + weight(has_preview_sites, PREVIEW_SITES_WEIGHT);

    let mut detection = Detection {
        format: ConfigFormat::Unknown,
        has_optimization_field,
        has_category_indexes,
        has_preview_sites,
        estimated_categories: 0,
        confidence: 0.0,
    };

    if score >= OPTIMIZED_THRESHOLD {
        detection.format = ConfigFormat::Optimized;
        detection.confidence = round2(score);
        detection.estimated_categories = config
            .pointer("/optimization/totalCategories")
            .and_then(Value::as_u64)
            .map_or(indices.len(), |n| n as usize);
        return detection;
    }

    let conforming = items.iter().filter(|item| looks_traditional(item)).count();
    if items.is_empty() || conforming > 0 {
        let share = if items.is_empty() {
            1.0
        } else {
            conforming as f64 / items.len() as f64
        };
        detection.format = ConfigFormat::Traditional;
        detection.confidence = round2(share * (1.0 - score));
        detection.estimated_categories = menu_entries(items)
            .filter(|entry| entry.get("sites").is_some_and(Value::is_array))
            .count();
    }
    detection
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

// ============================================================================
// Unified view
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedSubMenuItem {
    pub name: String,
    pub href: String,
    pub icon: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sites: Option<Vec<Site>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_sites: Option<Vec<Site>>,
    pub is_lazy_loaded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedMenuItem {
    pub name: String,
    pub href: String,
    pub icon: String,
    #[serde(rename = "type")]
    pub menu_type: MenuType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sites: Option<Vec<Site>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submenu: Option<Vec<UnifiedSubMenuItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_sites: Option<Vec<Site>>,
    pub is_lazy_loaded: bool,
}

/// A category whose full site list lives in a chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct LazyCategory<'a> {
    pub index: u32,
    pub name: &'a str,
    pub preview_sites: &'a [Site],
    pub site_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedConfig {
    pub site: SiteInfo,
    pub menu_items: Vec<UnifiedMenuItem>,
    pub is_optimized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimization: Option<Optimization>,
}

impl UnifiedConfig {
    /// Every lazily loaded menu item and submenu, in menu order.
    pub fn lazy_categories(&self) -> Vec<LazyCategory<'_>> {
        let mut out = Vec::new();
        for item in &self.menu_items {
            if item.is_lazy_loaded
                && let Some(index) = item.category_index
            {
                out.push(LazyCategory {
                    index,
                    name: &item.name,
                    preview_sites: item.preview_sites.as_deref().unwrap_or_default(),
                    site_count: item.site_count.unwrap_or_default(),
                });
            }
            for sub in item.submenu.iter().flatten() {
                if sub.is_lazy_loaded
                    && let Some(index) = sub.category_index
                {
                    out.push(LazyCategory {
                        index,
                        name: &sub.name,
                        preview_sites: sub.preview_sites.as_deref().unwrap_or_default(),
                        site_count: sub.site_count.unwrap_or_default(),
                    });
                }
            }
        }
        out
    }

    /// Sites known without loading anything: inline sites, or previews.
    pub fn visible_site_count(&self) -> usize {
        let count = |sites: &Option<Vec<Site>>, preview: &Option<Vec<Site>>| {
            sites
                .as_ref()
                .or(preview.as_ref())
                .map_or(0, Vec::len)
        };
        self.menu_items
            .iter()
            .map(|item| {
                count(&item.sites, &item.preview_sites)
                    + item
                        .submenu
                        .iter()
                        .flatten()
                        .map(|sub| count(&sub.sites, &sub.preview_sites))
                        .sum::<usize>()
            })
            .sum()
    }
}

/// Sites from a JSON array, skipping entries that aren't sites.
fn lenient_sites(value: Option<&Value>, path: &str) -> Vec<Site> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .enumerate()
        .filter_map(|(i, v)| match serde_json::from_value::<Site>(v.clone()) {
            Ok(site) => Some(site),
            Err(e) => {
                warn!(path = %format!("{path}[{i}]"), error = %e, "dropping unreadable site");
                None
            }
        })
        .collect()
}

fn str_field<'a>(obj: &'a serde_json::Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

fn eager_item(item: &Value, path: &str) -> Option<UnifiedMenuItem> {
    let obj = item.as_object()?;
    let (Some(name), Some(href)) = (str_field(obj, "name"), str_field(obj, "href")) else {
        warn!(path, "dropping menu item without name or href");
        return None;
    };
    let icon = str_field(obj, "icon").unwrap_or_default();

    if str_field(obj, "type") == Some("tabs") {
        let subs = obj.get("submenu").and_then(Value::as_array);
        let submenu: Vec<UnifiedSubMenuItem> = subs
            .into_iter()
            .flatten()
            .enumerate()
            .filter_map(|(i, sub)| {
                let path = format!("{path}.submenu[{i}]");
                let obj = sub.as_object()?;
                let (Some(name), Some(href)) = (str_field(obj, "name"), str_field(obj, "href"))
                else {
                    warn!(path = %path, "dropping submenu without name or href");
                    return None;
                };
                let sites = lenient_sites(obj.get("sites"), &format!("{path}.sites"));
                Some(UnifiedSubMenuItem {
                    name: name.to_string(),
                    href: href.to_string(),
                    icon: str_field(obj, "icon").unwrap_or_default().to_string(),
                    site_count: Some(sites.len()),
                    sites: Some(sites),
                    category_index: None,
                    preview_sites: None,
                    is_lazy_loaded: false,
                })
            })
            .collect();
        return Some(UnifiedMenuItem {
            name: name.to_string(),
            href: href.to_string(),
            icon: icon.to_string(),
            menu_type: MenuType::Tabs,
            site_count: Some(submenu.iter().filter_map(|s| s.site_count).sum()),
            sites: None,
            submenu: Some(submenu),
            category_index: None,
            preview_sites: None,
            is_lazy_loaded: false,
        });
    }

    let sites = lenient_sites(obj.get("sites"), &format!("{path}.sites"));
    Some(UnifiedMenuItem {
        name: name.to_string(),
        href: href.to_string(),
        icon: icon.to_string(),
        menu_type: MenuType::Single,
        site_count: Some(sites.len()),
        sites: Some(sites),
        submenu: None,
        category_index: None,
        preview_sites: None,
        is_lazy_loaded: false,
    })
}

fn lazy_item(item: OptimizedMenuItem) -> UnifiedMenuItem {
    let submenu = item.submenu.map(|subs| {
        subs.into_iter()
            .map(|sub| UnifiedSubMenuItem {
                name: sub.name,
                href: sub.href,
                icon: sub.icon,
                sites: None,
                category_index: Some(sub.category_index),
                site_count: Some(sub.site_count),
                preview_sites: Some(sub.preview_sites),
                is_lazy_loaded: true,
            })
            .collect()
    });
    UnifiedMenuItem {
        name: item.name,
        href: item.href,
        icon: item.icon,
        menu_type: item.menu_type,
        sites: None,
        submenu,
        category_index: Some(item.category_index),
        site_count: Some(item.site_count),
        preview_sites: Some(item.preview_sites),
        is_lazy_loaded: true,
    }
}

fn site_info(config: &Value) -> SiteInfo {
    match config.get("site").map(|v| serde_json::from_value::<SiteInfo>(v.clone())) {
        Some(Ok(site)) => site,
        Some(Err(e)) => {
            warn!(error = %e, "unreadable site info, using defaults");
            SiteInfo::default()
        }
        None => SiteInfo::default(),
    }
}

/// Normalize any config into the unified view.
pub fn unify(config: &Value) -> UnifiedConfig {
    unify_detected(config, &detect_format(config))
}

/// [`unify`] with a detection computed earlier.
pub fn unify_detected(config: &Value, detection: &Detection) -> UnifiedConfig {
    let items = config
        .get("menuItems")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let menu_items: Vec<UnifiedMenuItem> = if detection.is_optimized() {
        items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| {
                match serde_json::from_value::<OptimizedMenuItem>(item.clone()) {
                    Ok(item) => Some(lazy_item(item)),
                    Err(e) => {
                        warn!(index = i, error = %e, "dropping unreadable optimized menu item");
                        None
                    }
                }
            })
            .collect()
    } else {
        items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| eager_item(item, &format!("menuItems[{i}]")))
            .collect()
    };

    let optimization = config
        .get("optimization")
        .filter(|_| detection.is_optimized())
        .and_then(|v| serde_json::from_value::<Optimization>(v.clone()).ok());

    debug!(
        format = %detection.format,
        items = menu_items.len(),
        "unified config"
    );
    UnifiedConfig {
        site: site_info(config),
        menu_items,
        is_optimized: detection.is_optimized(),
        optimization,
    }
}

// ============================================================================
// Loading from a site directory
// ============================================================================

#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("no config-optimized.json or config.json in {0}")]
    NotFound(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("{path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: UnifiedConfig,
    pub detection: Detection,
    pub path: PathBuf,
    pub load_time: Duration,
}

fn read_config(path: &Path) -> Result<Option<Value>, ConfigLoadError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigLoadError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| ConfigLoadError::Json {
            path: path.to_path_buf(),
            source,
        })
}

/// Load a site's config, preferring the optimized file over the traditional
/// one. A broken optimized file falls back to the traditional one.
pub fn load_site_config(dir: &Path) -> Result<LoadedConfig, ConfigLoadError> {
    let started = Instant::now();
    let mut last_error = None;

    for name in [OPTIMIZED_CONFIG, TRADITIONAL_CONFIG] {
        let path = dir.join(name);
        match read_config(&path) {
            Ok(Some(value)) => {
                let detection = detect_format(&value);
                let config = unify_detected(&value, &detection);
                return Ok(LoadedConfig {
                    config,
                    detection,
                    path,
                    load_time: started.elapsed(),
                });
            }
            Ok(None) => continue,
            Err(e) => {
                warn!(error = %e, "skipping config");
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| ConfigLoadError::NotFound(dir.to_path_buf())))
}
