//! Static asset handling for a site directory.
//!
//! A deployable directory holds up to three config files and the chunk
//! folder:
//!
//! ```text
//! site/
//! ├── config.json               # traditional, fully inlined
//! ├── config-optimized.json     # previews only
//! ├── config-traditional.json   # backup written by the optimizer
//! └── categories/
//!     ├── 0.json
//!     └── 1.json
//! ```
//!
//! [`sync_configs`] copies these from a data directory into a public one.
//! [`verify_site_dir`] checks that what is there is consistent: configs
//! validate, every chunk the optimized config references exists and parses,
//! and no chunk is left over from an older layout.

use crate::detect::{ConfigFormat, OPTIMIZED_CONFIG, TRADITIONAL_CONFIG, detect_format};
use crate::loader::parse_category;
use crate::optimize::CATEGORIES_DIR;
use crate::types::OptimizedConfig;
use crate::validation::check_config;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

pub const TRADITIONAL_BACKUP: &str = "config-traditional.json";

pub const CONFIG_FILES: [&str; 3] = [TRADITIONAL_CONFIG, OPTIMIZED_CONFIG, TRADITIONAL_BACKUP];

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("{path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("no config files found in {0}")]
    NoConfig(PathBuf),
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> AssetError + '_ {
    move |source| AssetError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Chunk files directly under `dir`, as (index, path), sorted by index.
/// Files whose stem is not a number are ignored.
fn chunk_files(dir: &Path) -> Vec<(u32, PathBuf)> {
    let mut files: Vec<(u32, PathBuf)> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
        .filter_map(|e| {
            let index = e.path().file_stem()?.to_str()?.parse().ok()?;
            Some((index, e.into_path()))
        })
        .collect();
    files.sort_by_key(|(index, _)| *index);
    files
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub copied: Vec<PathBuf>,
    /// Chunks in the destination that the source no longer has.
    pub removed: Vec<PathBuf>,
}

/// Copy config files and category chunks from `src` into `dst`.
pub fn sync_configs(src: &Path, dst: &Path) -> Result<SyncReport, AssetError> {
    let mut report = SyncReport::default();
    fs::create_dir_all(dst).map_err(io_err(dst))?;

    for name in CONFIG_FILES {
        let from = src.join(name);
        if !from.is_file() {
            continue;
        }
        let to = dst.join(name);
        fs::copy(&from, &to).map_err(io_err(&from))?;
        report.copied.push(to);
    }

    let src_chunks = src.join(CATEGORIES_DIR);
    if src_chunks.is_dir() {
        let dst_chunks = dst.join(CATEGORIES_DIR);
        fs::create_dir_all(&dst_chunks).map_err(io_err(&dst_chunks))?;

        let mut kept = BTreeSet::new();
        for (index, from) in chunk_files(&src_chunks) {
            let to = dst_chunks.join(format!("{index}.json"));
            fs::copy(&from, &to).map_err(io_err(&from))?;
            kept.insert(index);
            report.copied.push(to);
        }
        for (index, stale) in chunk_files(&dst_chunks) {
            if !kept.contains(&index) {
                fs::remove_file(&stale).map_err(io_err(&stale))?;
                report.removed.push(stale);
            }
        }
    }

    if report.copied.is_empty() {
        return Err(AssetError::NoConfig(src.to_path_buf()));
    }
    tracing::info!(
        copied = report.copied.len(),
        removed = report.removed.len(),
        dst = %dst.display(),
        "synced site configs"
    );
    Ok(report)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Problem {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyReport {
    pub configs_checked: Vec<PathBuf>,
    pub chunks_checked: usize,
    pub problems: Vec<Problem>,
    /// Chunks nothing references.
    pub orphans: Vec<PathBuf>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }

    fn problem(&mut self, path: &Path, message: impl Into<String>) {
        self.problems.push(Problem {
            path: path.to_path_buf(),
            message: message.into(),
        });
    }
}

fn read_json(path: &Path, report: &mut VerifyReport) -> Option<Value> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            report.problem(path, e.to_string());
            return None;
        }
    };
    match serde_json::from_str(&text) {
        Ok(value) => Some(value),
        Err(e) => {
            report.problem(path, format!("invalid JSON: {e}"));
            None
        }
    }
}

fn verify_traditional(path: &Path, report: &mut VerifyReport) {
    let Some(value) = read_json(path, report) else {
        return;
    };
    if let Err(errors) = check_config(&value) {
        for e in errors.0 {
            report.problem(path, e.to_string());
        }
    }
}

/// Returns the chunk indices the optimized config references.
fn verify_optimized(path: &Path, report: &mut VerifyReport) -> BTreeSet<u32> {
    let mut referenced = BTreeSet::new();
    let Some(value) = read_json(path, report) else {
        return referenced;
    };
    let detection = detect_format(&value);
    if detection.format != ConfigFormat::Optimized {
        report.problem(path, format!("detected as {}, not optimized", detection.format));
        return referenced;
    }
    let config: OptimizedConfig = match serde_json::from_value(value) {
        Ok(config) => config,
        Err(e) => {
            report.problem(path, e.to_string());
            return referenced;
        }
    };

    let chunks_dir = path.with_file_name(CATEGORIES_DIR);
    let mut check_chunk = |index: u32, name: &str, site_count: usize, report: &mut VerifyReport| {
        referenced.insert(index);
        let chunk = chunks_dir.join(format!("{index}.json"));
        let bytes = match fs::read(&chunk) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                report.problem(&chunk, format!("missing chunk for {name}"));
                return;
            }
            Err(e) => {
                report.problem(&chunk, e.to_string());
                return;
            }
        };
        report.chunks_checked += 1;
        match parse_category(index, &bytes) {
            Ok(data) if data.sites.len() != site_count => report.problem(
                &chunk,
                format!(
                    "{name} declares {site_count} sites, chunk holds {}",
                    data.sites.len()
                ),
            ),
            Ok(_) => {}
            Err(e) => report.problem(&chunk, e.to_string()),
        }
    };

    for item in &config.menu_items {
        check_chunk(item.category_index, &item.name, item.site_count, report);
        for sub in item.submenu.iter().flatten() {
            check_chunk(sub.category_index, &sub.name, sub.site_count, report);
        }
    }
    referenced
}

/// Check a site directory. Fails only when no config file is present;
/// everything else is reported.
pub fn verify_site_dir(dir: &Path) -> Result<VerifyReport, AssetError> {
    let mut report = VerifyReport::default();

    for name in [TRADITIONAL_CONFIG, TRADITIONAL_BACKUP] {
        let path = dir.join(name);
        if path.is_file() {
            verify_traditional(&path, &mut report);
            report.configs_checked.push(path);
        }
    }

    let optimized = dir.join(OPTIMIZED_CONFIG);
    let referenced = if optimized.is_file() {
        let referenced = verify_optimized(&optimized, &mut report);
        report.configs_checked.push(optimized);
        referenced
    } else {
        BTreeSet::new()
    };

    if report.configs_checked.is_empty() {
        return Err(AssetError::NoConfig(dir.to_path_buf()));
    }

    report.orphans = chunk_files(&dir.join(CATEGORIES_DIR))
        .into_iter()
        .filter(|(index, _)| !referenced.contains(index))
        .map(|(_, path)| path)
        .collect();

    Ok(report)
}
