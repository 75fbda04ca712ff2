//! Split a traditional config into an optimized base config plus category
//! chunks.
//!
//! ```text
//! config.json  ──optimize──▶  config-optimized.json     (previews only)
//!                             categories/0.json         (full site lists)
//!                             categories/1.json
//!                             ...
//! ```
//!
//! Category indices follow menu order. A `single` item owns one index. A
//! `tabs` item owns one index whose chunk holds all of its submenus' sites,
//! and each submenu then owns the next index with just its own sites. The
//! base config keeps the first `preview_count` sites of every category.
//!
//! Chunks are serialized in parallel with rayon; anything over the size
//! limit is reported but still written.

use crate::format::format_file_size;
use crate::types::{
    CategoryData, CategoryMetadata, MenuContent, Optimization, OptimizedConfig,
    OptimizedMenuItem, OptimizedSubMenuItem, Site, SiteConfig,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CATEGORIES_DIR: &str = "categories";

#[derive(Error, Debug)]
pub enum OptimizeError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("optimization is disabled (optimization.enabled = false)")]
    Disabled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationOptions {
    pub enabled: bool,
    /// Sites kept inline per category.
    pub preview_count: usize,
    /// Chunks above this many KB are reported.
    pub chunk_size_limit_kb: f64,
}

impl Default for OptimizationOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            preview_count: 3,
            chunk_size_limit_kb: 100.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CategoryFile {
    /// `"{index}.json"`
    pub filename: String,
    pub content: CategoryData,
    pub size_kb: f64,
    bytes: Vec<u8>,
}

impl CategoryFile {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationSummary {
    pub original_size_kb: f64,
    pub optimized_size_kb: f64,
    pub compression_ratio: f64,
    pub total_categories: usize,
    pub total_sites: usize,
    pub preview_count: usize,
    /// Indices of chunks over the size limit.
    pub oversized: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct OptimizedConfigResult {
    pub base_config: OptimizedConfig,
    pub category_files: Vec<CategoryFile>,
    pub summary: OptimizationSummary,
}

fn kb(bytes: usize) -> f64 {
    round2(bytes as f64 / 1024.0)
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn preview(sites: &[Site], count: usize) -> Vec<Site> {
    sites.iter().take(count).cloned().collect()
}

/// Chunk plan: `(index, name, sites)` in index order.
fn plan_chunks(config: &SiteConfig) -> Vec<(u32, String, Vec<Site>)> {
    let mut chunks = Vec::new();
    let mut next = 0u32;
    for item in &config.menu_items {
        let all: Vec<Site> = item.all_sites().into_iter().cloned().collect();
        chunks.push((next, item.name.clone(), all));
        next += 1;
        for sub in item.submenu() {
            chunks.push((next, sub.name.clone(), sub.sites.clone()));
            next += 1;
        }
    }
    chunks
}

fn build_file(
    index: u32,
    name: String,
    sites: Vec<Site>,
    last_modified: &str,
) -> Result<CategoryFile, serde_json::Error> {
    let mut content = CategoryData {
        category_index: index,
        category_name: name,
        metadata: CategoryMetadata {
            site_count: sites.len(),
            file_size_kb: 0.0,
            last_modified: Some(last_modified.to_string()),
        },
        sites,
    };
    content.metadata.file_size_kb = kb(serde_json::to_vec_pretty(&content)?.len());
    let bytes = serde_json::to_vec_pretty(&content)?;
    Ok(CategoryFile {
        filename: format!("{index}.json"),
        size_kb: kb(bytes.len()),
        content,
        bytes,
    })
}

fn base_menu_items(config: &SiteConfig, preview_count: usize) -> Vec<OptimizedMenuItem> {
    let mut next = 0u32;
    let mut items = Vec::with_capacity(config.menu_items.len());
    for item in &config.menu_items {
        let index = next;
        next += 1;
        let (site_count, preview_sites, submenu) = match &item.content {
            MenuContent::Single { sites } => (sites.len(), preview(sites, preview_count), None),
            MenuContent::Tabs { submenu } => {
                let all: Vec<Site> = item.all_sites().into_iter().cloned().collect();
                let subs = submenu
                    .iter()
                    .map(|sub| {
                        let sub_index = next;
                        next += 1;
                        OptimizedSubMenuItem {
                            name: sub.name.clone(),
                            href: sub.href.clone(),
                            icon: sub.icon.clone(),
                            category_index: sub_index,
                            site_count: sub.sites.len(),
                            preview_sites: preview(&sub.sites, preview_count),
                        }
                    })
                    .collect();
                (all.len(), preview(&all, preview_count), Some(subs))
            }
        };
        items.push(OptimizedMenuItem {
            name: item.name.clone(),
            href: item.href.clone(),
            icon: item.icon.clone(),
            menu_type: item.menu_type(),
            category_index: index,
            site_count,
            preview_sites,
            submenu,
        });
    }
    items
}

/// Optimize with the current time as every chunk's `lastModified`.
pub fn optimize(
    config: &SiteConfig,
    options: &OptimizationOptions,
) -> Result<OptimizedConfigResult, OptimizeError> {
    optimize_at(config, options, Utc::now())
}

pub fn optimize_at(
    config: &SiteConfig,
    options: &OptimizationOptions,
    now: DateTime<Utc>,
) -> Result<OptimizedConfigResult, OptimizeError> {
    if !options.enabled {
        return Err(OptimizeError::Disabled);
    }
    let last_modified = now.to_rfc3339_opts(SecondsFormat::Millis, true);
    let original_size_kb = kb(serde_json::to_vec_pretty(config)?.len());

    let category_files = plan_chunks(config)
        .into_par_iter()
        .map(|(index, name, sites)| build_file(index, name, sites, &last_modified))
        .collect::<Result<Vec<_>, _>>()?;

    let oversized: Vec<u32> = category_files
        .iter()
        .filter(|f| f.size_kb > options.chunk_size_limit_kb)
        .map(|f| {
            tracing::warn!(
                index = f.content.category_index,
                category = %f.content.category_name,
                size = %format_file_size(f.bytes.len() as u64),
                limit_kb = options.chunk_size_limit_kb,
                "category chunk exceeds size limit"
            );
            f.content.category_index
        })
        .collect();

    let total_sites: usize = config.menu_items.iter().map(|i| i.all_sites().len()).sum();
    let mut base_config = OptimizedConfig {
        site: config.site.clone(),
        menu_items: base_menu_items(config, options.preview_count),
        optimization: Optimization {
            enabled: true,
            total_categories: category_files.len(),
            total_sites,
            preview_count: options.preview_count,
            file_size_kb: 0.0,
            compression_ratio: 0.0,
        },
    };
    let optimized_size_kb = kb(serde_json::to_vec_pretty(&base_config)?.len());
    let compression_ratio = if original_size_kb > 0.0 {
        round2(optimized_size_kb / original_size_kb)
    } else {
        1.0
    };
    base_config.optimization.file_size_kb = optimized_size_kb;
    base_config.optimization.compression_ratio = compression_ratio;

    tracing::debug!(
        categories = category_files.len(),
        total_sites,
        original_kb = original_size_kb,
        optimized_kb = optimized_size_kb,
        "optimized config"
    );

    Ok(OptimizedConfigResult {
        summary: OptimizationSummary {
            original_size_kb,
            optimized_size_kb,
            compression_ratio,
            total_categories: category_files.len(),
            total_sites,
            preview_count: options.preview_count,
            oversized,
        },
        base_config,
        category_files,
    })
}

/// Write `config-optimized.json`, `config-traditional.json` and
/// `categories/{i}.json` under `out_dir`. Returns the written paths.
pub fn write_optimized(
    result: &OptimizedConfigResult,
    original: &SiteConfig,
    out_dir: &Path,
) -> Result<Vec<PathBuf>, OptimizeError> {
    let categories_dir = out_dir.join(CATEGORIES_DIR);
    fs::create_dir_all(&categories_dir)?;

    let mut written = Vec::with_capacity(result.category_files.len() + 2);

    let base_path = out_dir.join(crate::detect::OPTIMIZED_CONFIG);
    fs::write(&base_path, serde_json::to_string_pretty(&result.base_config)?)?;
    written.push(base_path);

    let traditional_path = out_dir.join(crate::assets::TRADITIONAL_BACKUP);
    fs::write(&traditional_path, serde_json::to_string_pretty(original)?)?;
    written.push(traditional_path);

    for file in &result.category_files {
        let path = categories_dir.join(&file.filename);
        fs::write(&path, &file.bytes)?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{sample_config, sites};
    use crate::types::{MenuItem, MenuType};
    use tempfile::TempDir;

    fn fixed_now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn run(config: &SiteConfig) -> OptimizedConfigResult {
        optimize_at(config, &OptimizationOptions::default(), fixed_now()).unwrap()
    }

    // =========================================================================
    // Index assignment
    // =========================================================================

    #[test]
    fn tabs_item_and_each_submenu_get_indices() {
        let result = run(&sample_config());
        let indices: Vec<(u32, &str, usize)> = result
            .category_files
            .iter()
            .map(|f| {
                (
                    f.content.category_index,
                    f.content.category_name.as_str(),
                    f.content.sites.len(),
                )
            })
            .collect();
        assert_eq!(
            indices,
            [(0, "追踪器", 4), (1, "工具", 3), (2, "SPY", 2), (3, "代理", 1)]
        );

        let items = &result.base_config.menu_items;
        assert_eq!(items[0].category_index, 0);
        assert_eq!(items[1].category_index, 1);
        assert_eq!(items[1].menu_type, MenuType::Tabs);
        let subs = items[1].submenu.as_ref().unwrap();
        assert_eq!(subs[0].category_index, 2);
        assert_eq!(subs[1].category_index, 3);
    }

    #[test]
    fn previews_are_truncated() {
        let result = run(&sample_config());
        let items = &result.base_config.menu_items;
        assert_eq!(items[0].site_count, 4);
        assert_eq!(items[0].preview_sites.len(), 3);
        assert_eq!(items[0].preview_sites[0].title, "Binom");
        assert_eq!(items[1].site_count, 3);
        assert!(items[0].submenu.is_none());
    }

    #[test]
    fn optimization_block_totals() {
        let result = run(&sample_config());
        let opt = &result.base_config.optimization;
        assert!(opt.enabled);
        assert_eq!(opt.total_categories, 4);
        assert_eq!(opt.total_sites, 7);
        assert_eq!(opt.preview_count, 3);
        assert_eq!(opt.compression_ratio, result.summary.compression_ratio);
        assert!(result.summary.oversized.is_empty());
    }

    #[test]
    fn chunk_metadata_is_filled() {
        let result = run(&sample_config());
        let file = &result.category_files[0];
        assert_eq!(file.filename, "0.json");
        assert_eq!(file.content.metadata.site_count, 4);
        assert_eq!(
            file.content.metadata.last_modified.as_deref(),
            Some("2024-06-01T08:00:00.000Z")
        );
        let parsed: CategoryData = serde_json::from_slice(file.bytes()).unwrap();
        assert_eq!(parsed, file.content);
    }

    #[test]
    fn large_category_shrinks_base_config() {
        let mut config = sample_config();
        config.menu_items.push(MenuItem {
            name: "Big".into(),
            href: "#big".into(),
            icon: "b".into(),
            content: MenuContent::Single { sites: sites(9, 200) },
        });
        let result = run(&config);
        assert!(result.summary.compression_ratio < 1.0);
        assert!(result.summary.optimized_size_kb < result.summary.original_size_kb);
    }

    #[test]
    fn disabled_options_produce_nothing() {
        let options = OptimizationOptions {
            enabled: false,
            ..OptimizationOptions::default()
        };
        let err = optimize_at(&sample_config(), &options, fixed_now()).unwrap_err();
        assert!(matches!(err, OptimizeError::Disabled));
    }

    #[test]
    fn oversized_chunks_are_reported() {
        let options = OptimizationOptions {
            chunk_size_limit_kb: 0.1,
            ..OptimizationOptions::default()
        };
        let result = optimize_at(&sample_config(), &options, fixed_now()).unwrap();
        assert_eq!(result.summary.oversized, [0, 1, 2, 3]);
    }

    // =========================================================================
    // write_optimized
    // =========================================================================

    #[test]
    fn writes_base_backup_and_chunks() {
        let tmp = TempDir::new().unwrap();
        let config = sample_config();
        let result = run(&config);
        let written = write_optimized(&result, &config, tmp.path()).unwrap();
        assert_eq!(written.len(), 6);

        for name in ["config-optimized.json", "config-traditional.json", "categories/3.json"] {
            assert!(tmp.path().join(name).exists(), "{name}");
        }
        let backup: SiteConfig = serde_json::from_str(
            &fs::read_to_string(tmp.path().join("config-traditional.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(backup, config);
    }
}
