//! CLI output formatting for every command.
//!
//! Output leads with what the directory contains (categories, sites,
//! chunk indices) and shows file paths as secondary context on indented
//! lines.
//!
//! # Output Format
//!
//! ## Validate
//!
//! ```text
//! config.json: valid
//!     2 categories (1 single, 1 tabs), 7 sites
//! ```
//!
//! ## Optimize
//!
//! ```text
//! 000 追踪器 (4 sites, 1.2 KB)
//! 001 工具 (3 sites, 0.9 KB)
//! 002 SPY (2 sites, 0.6 KB)
//!
//! Optimized 4 categories, 7 sites: 4.1 KB → 1.3 KB (ratio 0.32)
//!     Output: public/
//! ```
//!
//! ## Search
//!
//! ```text
//! 追踪器
//!     Binom
//!         Self-hosted tracker
//!
//! 1 match for "binom"
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::assets::{SyncReport, VerifyReport};
use crate::detect::Detection;
use crate::loader::LoadError;
use crate::loader::cache::CacheStats;
use crate::lookup::ConfigStats;
use crate::optimize::OptimizedConfigResult;
use crate::search::{SearchIndex, Visibility};
use crate::table::RowValidation;
use crate::types::CategoryData;
use crate::validation::ValidationErrors;
use std::path::Path;
use std::sync::Arc;

// ============================================================================
// Shared helpers
// ============================================================================

/// Chunk index as 3-digit zero-padded.
fn format_index(index: u32) -> String {
    format!("{:0>3}", index)
}

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

/// Truncate to `max` characters, appending `...` if truncated.
fn truncate_desc(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max).collect();
        format!("{kept}...")
    }
}

/// `path` relative to `base` when it sits under it.
fn display_path(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn stats_line(stats: &ConfigStats) -> String {
    format!(
        "{} ({} single, {} tabs), {}",
        plural(stats.total_categories, "category", "categories"),
        stats.single_categories,
        stats.tabs_categories,
        plural(stats.total_sites, "site", "sites"),
    )
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

// ============================================================================
// validate / detect
// ============================================================================

pub fn format_validate_output(
    path: &Path,
    result: &Result<ConfigStats, ValidationErrors>,
) -> Vec<String> {
    let name = path.display();
    match result {
        Ok(stats) => vec![format!("{name}: valid"), format!("{}{}", indent(1), stats_line(stats))],
        Err(errors) => {
            let mut lines = vec![format!(
                "{name}: invalid ({})",
                plural(errors.len(), "problem", "problems")
            )];
            lines.extend(errors.0.iter().map(|e| format!("{}{}", indent(1), e)));
            lines
        }
    }
}

pub fn print_validate_output(path: &Path, result: &Result<ConfigStats, ValidationErrors>) {
    print_lines(format_validate_output(path, result));
}

pub fn format_detect_output(path: &Path, detection: &Detection) -> Vec<String> {
    let yes_no = |b: bool| if b { "yes" } else { "no" };
    vec![
        format!(
            "{}: {} (confidence {:.2})",
            path.display(),
            detection.format,
            detection.confidence
        ),
        format!("{}optimization field: {}", indent(1), yes_no(detection.has_optimization_field)),
        format!("{}category indexes: {}", indent(1), yes_no(detection.has_category_indexes)),
        format!("{}preview sites: {}", indent(1), yes_no(detection.has_preview_sites)),
        format!("{}estimated categories: {}", indent(1), detection.estimated_categories),
    ]
}

pub fn print_detect_output(path: &Path, detection: &Detection) {
    print_lines(format_detect_output(path, detection));
}

// ============================================================================
// optimize
// ============================================================================

pub fn format_optimize_output(result: &OptimizedConfigResult, out_dir: &Path) -> Vec<String> {
    let mut lines = Vec::new();
    for file in &result.category_files {
        let data = &file.content;
        let marker = if result.summary.oversized.contains(&data.category_index) {
            " [oversized]"
        } else {
            ""
        };
        lines.push(format!(
            "{} {} ({}, {:.1} KB){}",
            format_index(data.category_index),
            data.category_name,
            plural(data.sites.len(), "site", "sites"),
            file.size_kb,
            marker
        ));
    }

    let s = &result.summary;
    lines.push(String::new());
    lines.push(format!(
        "Optimized {}, {}: {:.1} KB → {:.1} KB (ratio {:.2})",
        plural(s.total_categories, "category", "categories"),
        plural(s.total_sites, "site", "sites"),
        s.original_size_kb,
        s.optimized_size_kb,
        s.compression_ratio
    ));
    lines.push(format!("{}Output: {}", indent(1), out_dir.display()));
    lines
}

pub fn print_optimize_output(result: &OptimizedConfigResult, out_dir: &Path) {
    print_lines(format_optimize_output(result, out_dir));
}

// ============================================================================
// load
// ============================================================================

pub fn format_load_output(data: &CategoryData) -> Vec<String> {
    let mut lines = vec![format!(
        "{} {} ({})",
        format_index(data.category_index),
        data.category_name,
        plural(data.sites.len(), "site", "sites")
    )];
    for site in &data.sites {
        lines.push(format!("{}{}", indent(1), site.title));
        if let Some(url) = &site.url {
            lines.push(format!("{}{}", indent(2), url));
        }
    }
    lines
}

pub fn format_load_error(error: &LoadError) -> Vec<String> {
    vec![format!("{} failed", format_index(error.index())), format!("{}{}", indent(1), error)]
}

pub fn format_cache_stats(stats: &CacheStats) -> Vec<String> {
    vec![format!("Cache: {}", stats)]
}

pub fn print_load_output(results: &[Result<Arc<CategoryData>, LoadError>], stats: &CacheStats) {
    let mut lines = Vec::new();
    for result in results {
        match result {
            Ok(data) => lines.extend(format_load_output(data)),
            Err(e) => lines.extend(format_load_error(e)),
        }
    }
    lines.push(String::new());
    lines.extend(format_cache_stats(stats));
    print_lines(lines);
}

// ============================================================================
// search
// ============================================================================

pub fn format_search_output(query: &str, index: &SearchIndex, visibility: &Visibility) -> Vec<String> {
    let mut lines = Vec::new();
    for (c, name) in index.categories().iter().enumerate() {
        if !visibility.categories.get(c).copied().unwrap_or(false) {
            continue;
        }
        lines.push(name.clone());
        for item in index.visible(visibility).filter(|i| i.category == c) {
            lines.push(format!("{}{}", indent(1), item.title));
            if !item.description.is_empty() {
                lines.push(format!("{}{}", indent(2), truncate_desc(&item.description, 60)));
            }
        }
        lines.push(String::new());
    }
    lines.push(format!(
        "{} for \"{}\"",
        plural(visibility.matched, "match", "matches"),
        query
    ));
    lines
}

pub fn print_search_output(query: &str, index: &SearchIndex, visibility: &Visibility) {
    print_lines(format_search_output(query, index, visibility));
}

// ============================================================================
// import / export
// ============================================================================

pub fn format_row_issues(validation: &RowValidation) -> Vec<String> {
    let issue = |kind: &str, i: &crate::table::RowIssue| {
        format!("Row {} {} {}: {}", i.row, kind, i.field, i.message)
    };
    validation
        .errors
        .iter()
        .map(|i| issue("error", i))
        .chain(validation.warnings.iter().map(|i| issue("warning", i)))
        .collect()
}

pub fn print_row_issues(validation: &RowValidation) {
    print_lines(format_row_issues(validation));
}

pub fn format_import_output(
    validation: &RowValidation,
    stats: &ConfigStats,
    out: &Path,
) -> Vec<String> {
    let mut lines = format_row_issues(validation);
    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!("Imported {}", stats_line(stats)));
    lines.push(format!("{}Output: {}", indent(1), out.display()));
    lines
}

pub fn print_import_output(validation: &RowValidation, stats: &ConfigStats, out: &Path) {
    print_lines(format_import_output(validation, stats, out));
}

pub fn format_export_output(rows: usize, out: &Path) -> Vec<String> {
    vec![
        format!("Exported {}", plural(rows, "row", "rows")),
        format!("{}Output: {}", indent(1), out.display()),
    ]
}

pub fn print_export_output(rows: usize, out: &Path) {
    print_lines(format_export_output(rows, out));
}

// ============================================================================
// sync / verify
// ============================================================================

pub fn format_sync_output(report: &SyncReport, dst: &Path) -> Vec<String> {
    let mut lines: Vec<String> = report
        .copied
        .iter()
        .map(|p| format!("copied {}", display_path(p, dst)))
        .collect();
    lines.extend(
        report
            .removed
            .iter()
            .map(|p| format!("removed {}", display_path(p, dst))),
    );
    lines.push(format!(
        "Synced {} into {}",
        plural(report.copied.len(), "file", "files"),
        dst.display()
    ));
    lines
}

pub fn print_sync_output(report: &SyncReport, dst: &Path) {
    print_lines(format_sync_output(report, dst));
}

pub fn format_verify_output(report: &VerifyReport, dir: &Path) -> Vec<String> {
    let mut lines = Vec::new();
    for path in &report.configs_checked {
        lines.push(display_path(path, dir));
    }
    for problem in &report.problems {
        lines.push(format!(
            "{}{}: {}",
            indent(1),
            display_path(&problem.path, dir),
            problem.message
        ));
    }
    for orphan in &report.orphans {
        lines.push(format!("{}{}: not referenced", indent(1), display_path(orphan, dir)));
    }
    let status = if report.is_ok() { "ok" } else { "FAILED" };
    lines.push(format!(
        "Verified {}, {}: {} ({})",
        plural(report.configs_checked.len(), "config", "configs"),
        plural(report.chunks_checked, "chunk", "chunks"),
        status,
        plural(report.problems.len(), "problem", "problems")
    ));
    lines
}

pub fn print_verify_output(report: &VerifyReport, dir: &Path) {
    print_lines(format_verify_output(report, dir));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{detect_format, unify};
    use crate::lookup::config_stats;
    use crate::optimize::{OptimizationOptions, optimize};
    use crate::test_helpers::{category_data, sample_config, sample_config_json};
    use crate::validation::check_config;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn truncate_desc_counts_chars() {
        assert_eq!(truncate_desc("短文本", 40), "短文本");
        assert_eq!(truncate_desc("联盟营销工具", 2), "联盟...");
    }

    #[test]
    fn plural_forms() {
        assert_eq!(plural(1, "site", "sites"), "1 site");
        assert_eq!(plural(0, "site", "sites"), "0 sites");
    }

    #[test]
    fn display_path_strips_base() {
        let base = Path::new("/srv/public");
        assert_eq!(display_path(Path::new("/srv/public/categories/0.json"), base), "categories/0.json");
        assert_eq!(display_path(Path::new("/tmp/x.json"), base), "/tmp/x.json");
    }

    // =========================================================================
    // Command output
    // =========================================================================

    #[test]
    fn validate_output_valid() {
        let stats = config_stats(&sample_config());
        let lines = format_validate_output(Path::new("config.json"), &Ok(stats));
        assert_eq!(
            lines,
            vec![
                "config.json: valid",
                "    2 categories (1 single, 1 tabs), 7 sites",
            ]
        );
    }

    #[test]
    fn validate_output_lists_problems() {
        let errors = check_config(&json!({"site": {"title": 1}, "menuItems": []})).unwrap_err();
        let lines = format_validate_output(Path::new("config.json"), &Err(errors.clone()));
        assert_eq!(lines[0], format!("config.json: invalid ({})", plural(errors.len(), "problem", "problems")));
        assert_eq!(lines.len(), errors.len() + 1);
        assert!(lines[1].starts_with("    site."));
    }

    #[test]
    fn detect_output() {
        let detection = detect_format(&sample_config_json());
        let lines = format_detect_output(Path::new("config.json"), &detection);
        assert!(lines[0].starts_with("config.json: traditional (confidence"));
        assert!(lines[4].starts_with("    estimated categories: "));
        assert_eq!(lines[1], "    optimization field: no");
    }

    #[test]
    fn optimize_output_lists_chunks() {
        let result = optimize(&sample_config(), &OptimizationOptions::default()).unwrap();
        let lines = format_optimize_output(&result, Path::new("public"));
        assert!(lines[0].starts_with("000 追踪器 (4 sites,"));
        assert!(lines[3].starts_with("003 代理 (1 site,"));
        assert!(lines[5].starts_with("Optimized 4 categories, 7 sites:"));
        assert_eq!(lines[6], "    Output: public");
    }

    #[test]
    fn load_output() {
        let lines = format_load_output(&category_data(2, 1));
        assert_eq!(
            lines,
            vec!["002 Category 2 (1 site)", "    Site 2-0", "        https://example.com/2/0"]
        );
        let err = LoadError::Timeout { index: 4, timeout_ms: 10 };
        assert_eq!(format_load_error(&err)[0], "004 failed");
    }

    #[test]
    fn search_output_groups_by_category() {
        let index = SearchIndex::from_config(&unify(&sample_config_json()));
        let v = index.filter("spy");
        let lines = format_search_output("spy", &index, &v);
        assert_eq!(
            lines,
            vec![
                "工具",
                "    AdPlexity",
                "        Ad spy",
                "    Anstrex",
                "        Native ad spy",
                "",
                "2 matches for \"spy\"",
            ]
        );
    }

    #[test]
    fn search_output_without_matches() {
        let index = SearchIndex::from_config(&unify(&sample_config_json()));
        let v = index.filter("zzz");
        assert_eq!(format_search_output("zzz", &index, &v), vec!["0 matches for \"zzz\""]);
    }

    #[test]
    fn import_output_lists_issues_first() {
        let validation = RowValidation {
            errors: vec![crate::table::RowIssue {
                row: 3,
                field: "title".into(),
                message: "title is required".into(),
            }],
            warnings: Vec::new(),
        };
        let stats = config_stats(&sample_config());
        let lines = format_import_output(&validation, &stats, Path::new("config.json"));
        assert_eq!(lines[0], "Row 3 error title: title is required");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], "Imported 2 categories (1 single, 1 tabs), 7 sites");
    }

    #[test]
    fn verify_output_reports_problems() {
        let dir = Path::new("/site");
        let report = VerifyReport {
            configs_checked: vec![dir.join("config-optimized.json")],
            chunks_checked: 3,
            problems: vec![crate::assets::Problem {
                path: dir.join("categories/2.json"),
                message: "missing chunk for SPY".into(),
            }],
            orphans: vec![dir.join("categories/9.json")],
        };
        let lines = format_verify_output(&report, dir);
        assert_eq!(
            lines,
            vec![
                "config-optimized.json",
                "    categories/2.json: missing chunk for SPY",
                "    categories/9.json: not referenced",
                "Verified 1 config, 3 chunks: FAILED (1 problem)",
            ]
        );
    }
}
