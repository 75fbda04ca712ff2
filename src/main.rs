use affnav::config::{self, Settings};
use affnav::loader::cache::NullStore;
use affnav::loader::source::CategorySource;
use affnav::loader::{CategoryLoader, DirSource, FileStore, HttpSource, LoadError, PanelView};
use affnav::search::{SearchController, SearchEvent, SearchIndex, Visibility};
use affnav::table::{self, Category, TableRow};
use affnav::types::{CategoryData, SiteConfig, SiteInfo};
use affnav::{assets, detect, lookup, optimize, output, validation};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "affnav")]
#[command(about = "Toolkit for categorized site directories")]
#[command(long_about = "\
Toolkit for categorized site directories

A directory is a config of menu items, each holding sites directly
(single) or through submenus (tabs). Large directories are split into a
small optimized config with a few preview sites per category and one
chunk per category that is loaded on demand.

Site layout:

  public/
  ├── config.json                  # Traditional config, every site inline
  ├── config-optimized.json        # Previews + category indices
  ├── config-traditional.json      # Backup written by `optimize`
  └── categories/
      ├── 0.json                   # Full site list of category 0
      └── 1.json

Run 'affnav gen-config' to generate a documented affnav.toml.")]
#[command(version)]
struct Cli {
    /// Settings file
    #[arg(long, default_value = config::SETTINGS_FILE, global = true)]
    settings: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check a traditional config and list every problem
    Validate { config: PathBuf },
    /// Report whether a config is traditional or optimized
    Detect { config: PathBuf },
    /// Split a traditional config into previews and category chunks
    Optimize {
        config: PathBuf,
        /// Directory receiving config-optimized.json and categories/
        #[arg(long, default_value = "public")]
        out: PathBuf,
    },
    /// Load category chunks from a site URL or directory
    Load {
        /// Site origin (http:// or https://) or a local site directory.
        /// Defaults to loader.base_url from the settings.
        #[arg(long)]
        from: Option<String>,
        /// Category indices. Defaults to every lazy category of a local site.
        indices: Vec<u32>,
        /// Print each category panel as HTML
        #[arg(long)]
        html: bool,
        /// Forget cached chunks before loading
        #[arg(long)]
        clear_cache: bool,
    },
    /// Search a site directory's sites by title, description or category.
    /// Without a query, reads one query per line from stdin; an empty line
    /// clears the search.
    Search {
        dir: PathBuf,
        query: Option<String>,
        /// Load lazy categories first so every site is searchable
        #[arg(long)]
        full: bool,
    },
    /// Build a config from table rows (JSON array of records)
    Import {
        rows: PathBuf,
        #[arg(long, default_value = "config.json")]
        out: PathBuf,
        /// Take the site block from this config
        #[arg(long)]
        site: Option<PathBuf>,
        /// Input is the legacy category/nav-item shape
        #[arg(long)]
        legacy: bool,
    },
    /// Flatten a config into table rows
    Export {
        config: PathBuf,
        #[arg(long, default_value = "rows.json")]
        out: PathBuf,
        /// Write the legacy category/nav-item shape
        #[arg(long)]
        legacy: bool,
    },
    /// Lay a partial config over a base config
    Merge {
        base: PathBuf,
        overlay: PathBuf,
        #[arg(long, default_value = "config.json")]
        out: PathBuf,
    },
    /// Copy config files and chunks into a public directory
    Sync { src: PathBuf, dst: PathBuf },
    /// Check that a site directory's configs and chunks agree
    Verify { dir: PathBuf },
    /// Print a stock affnav.toml with all options documented
    GenConfig,
}

fn main() -> CliResult {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
        Command::Validate { config } => {
            let value = read_json(&config)?;
            let result = validation::check_config(&value).map(|c| lookup::config_stats(&c));
            output::print_validate_output(&config, &result);
            result?;
        }
        Command::Detect { config } => {
            let value = read_json(&config)?;
            output::print_detect_output(&config, &detect::detect_format(&value));
        }
        Command::Optimize { config, out } => {
            let settings = config::load_settings(&cli.settings)?;
            let site = read_site_config(&config)?;
            let result = optimize::optimize(&site, &settings.optimization_options())?;
            optimize::write_optimized(&result, &site, &out)?;
            output::print_optimize_output(&result, &out);
        }
        Command::Load {
            from,
            indices,
            html,
            clear_cache,
        } => {
            let settings = config::load_settings(&cli.settings)?;
            let from = from
                .or_else(|| settings.loader.base_url.clone())
                .ok_or("no --from given and loader.base_url is not set")?;
            let runtime = tokio::runtime::Runtime::new()?;
            if from.starts_with("http://") || from.starts_with("https://") {
                let indices = if indices.is_empty() { vec![0] } else { indices };
                let source = HttpSource::new(&from);
                runtime.block_on(run_load(source, &settings, indices, html, clear_cache))?;
            } else {
                let dir = PathBuf::from(&from);
                let indices = if indices.is_empty() {
                    let loaded = detect::load_site_config(&dir)?;
                    loaded.config.lazy_categories().iter().map(|c| c.index).collect()
                } else {
                    indices
                };
                let source = DirSource::new(&dir);
                runtime.block_on(run_load(source, &settings, indices, html, clear_cache))?;
            }
        }
        Command::Search { dir, query, full } => {
            let settings = config::load_settings(&cli.settings)?;
            let loaded = detect::load_site_config(&dir)?;
            let mut index = SearchIndex::from_config(&loaded.config);
            let runtime = tokio::runtime::Runtime::new()?;
            if full {
                let loader = CategoryLoader::builder(DirSource::new(&dir))
                    .settings(settings.loader_settings())
                    .build();
                for (category, item) in loaded.config.menu_items.iter().enumerate() {
                    let Some(chunk) = item.category_index.filter(|_| item.is_lazy_loaded) else {
                        continue;
                    };
                    match runtime.block_on(loader.load_category(chunk)) {
                        Ok(data) => index.extend_category(category, &data.sites),
                        Err(e) => tracing::warn!(chunk, error = %e, "searching previews only"),
                    }
                }
            }
            match query {
                Some(query) => {
                    let visibility = index.filter(&query);
                    output::print_search_output(&query, &index, &visibility);
                }
                None => runtime.block_on(interactive_search(index, settings.search.debounce()))?,
            }
        }
        Command::Import {
            rows,
            out,
            site,
            legacy,
        } => {
            let settings = config::load_settings(&cli.settings)?;
            let site_info = match site {
                Some(path) => read_site_config(&path)?.site,
                None => SiteInfo::default(),
            };
            let text = std::fs::read_to_string(&rows)?;
            let (imported, row_check) = if legacy {
                let categories: Vec<Category> = serde_json::from_str(&text)?;
                (
                    table::convert_navigation(&categories, site_info),
                    table::RowValidation::default(),
                )
            } else {
                let table_rows: Vec<TableRow> = serde_json::from_str(&text)?;
                let row_check = table::validate_rows(&table_rows);
                let rejected = !row_check.is_valid()
                    || (settings.validation.fail_on_warnings && !row_check.warnings.is_empty());
                if rejected {
                    output::print_row_issues(&row_check);
                    return Err(format!("{} rejected, nothing written", rows.display()).into());
                }
                (table::rows_to_config(&table_rows, site_info), row_check)
            };
            validation::check_config(&serde_json::to_value(&imported)?)?;
            write_json(&out, &imported)?;
            output::print_import_output(&row_check, &lookup::config_stats(&imported), &out);
        }
        Command::Export {
            config,
            out,
            legacy,
        } => {
            let site = read_site_config(&config)?;
            let count = if legacy {
                let categories: Vec<Category> =
                    site.menu_items.iter().map(table::menu_item_to_category).collect();
                write_json(&out, &categories)?;
                categories.len()
            } else {
                let rows = table::config_to_rows(&site);
                write_json(&out, &rows)?;
                rows.len()
            };
            output::print_export_output(count, &out);
        }
        Command::Merge { base, overlay, out } => {
            let base_config = read_site_config(&base)?;
            let over: lookup::ConfigOverride = serde_json::from_value(read_json(&overlay)?)?;
            let merged = lookup::merge_configs(&base_config, over);
            validation::check_config(&serde_json::to_value(&merged)?)?;
            write_json(&out, &merged)?;
            output::print_validate_output(&out, &Ok(lookup::config_stats(&merged)));
        }
        Command::Sync { src, dst } => {
            let report = assets::sync_configs(&src, &dst)?;
            output::print_sync_output(&report, &dst);
        }
        Command::Verify { dir } => {
            let settings = config::load_settings(&cli.settings)?;
            let report = assets::verify_site_dir(&dir)?;
            output::print_verify_output(&report, &dir);
            if !report.is_ok() {
                return Err(format!("{} failed verification", dir.display()).into());
            }
            if settings.validation.fail_on_warnings && !report.orphans.is_empty() {
                return Err(format!("{} has unreferenced chunks", dir.display()).into());
            }
        }
    }

    Ok(())
}

/// Log to stderr, filtered by `RUST_LOG` (default `warn`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_json(path: &Path) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("{}: {e}", path.display()))?;
    Ok(serde_json::from_str(&content)?)
}

/// Read and validate a traditional config.
fn read_site_config(path: &Path) -> Result<SiteConfig, Box<dyn std::error::Error>> {
    let value = read_json(path)?;
    Ok(validation::check_config(&value)?)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> CliResult {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

/// Feed stdin lines through the debounced controller and print each result
/// it settles on.
async fn interactive_search(index: SearchIndex, debounce: Duration) -> CliResult {
    let (events_tx, events_rx) = mpsc::channel(16);
    let (results_tx, mut results_rx) = watch::channel(Visibility::default());
    let controller = SearchController::new(index.clone(), debounce);
    let search = tokio::spawn(controller.run(events_rx, results_tx));
    let printer = tokio::spawn(async move {
        while results_rx.changed().await.is_ok() {
            let visibility = results_rx.borrow_and_update().clone();
            output::print_search_output(&visibility.query, &index, &visibility);
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let event = if line.trim().is_empty() {
            SearchEvent::Escape
        } else {
            SearchEvent::Input(line)
        };
        if events_tx.send(event).await.is_err() {
            break;
        }
    }
    // Dropping the sender lets a pending query settle before the loop ends.
    drop(events_tx);
    search.await?;
    printer.await?;
    Ok(())
}

async fn run_load<S: CategorySource>(
    source: S,
    settings: &Settings,
    indices: Vec<u32>,
    html: bool,
    clear_cache: bool,
) -> CliResult {
    let view = Arc::new(PanelView::with_panels(indices.iter().copied()));
    let builder = CategoryLoader::builder(source)
        .settings(settings.loader_settings())
        .view(view.clone());
    let loader = if settings.cache.persist {
        builder.store(FileStore::new(&settings.cache.dir)).build()
    } else {
        builder.store(NullStore).build()
    };
    if clear_cache {
        loader.clear_cache();
    } else {
        loader.clean_expired_cache();
    }

    let mut results: Vec<Result<Arc<CategoryData>, LoadError>> = Vec::with_capacity(indices.len());
    for &index in &indices {
        results.push(loader.load_with_retries(index).await);
    }

    output::print_load_output(&results, &loader.cache_stats());
    if html {
        for &index in &indices {
            if let Some(markup) = view.render(index) {
                println!("{}", markup.into_string());
            }
        }
    }
    if results.iter().any(Result::is_err) {
        return Err("some categories failed to load".into());
    }
    Ok(())
}
