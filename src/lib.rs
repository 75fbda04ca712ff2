//! # affnav
//!
//! Tooling for categorized site directories: a config of menu items, each
//! holding external sites directly (`single`) or through submenus (`tabs`).
//!
//! # Architecture: Two Config Formats, One View
//!
//! A directory is published in one of two shapes:
//!
//! ```text
//! traditional   config.json            every site inline
//! optimized     config-optimized.json  a few preview sites per category
//!               categories/{i}.json    full site list, fetched on demand
//! ```
//!
//! The [`optimize`] module turns the first into the second. The [`detect`]
//! module reads either and normalizes it into one [`detect::UnifiedConfig`],
//! so rendering and search never branch on the format. The [`loader`] fetches
//! the chunks an optimized config points at, one request per category no
//! matter how many callers ask, and caches them with an expiry.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`types`] | Serialized data model shared by both formats and the chunks |
//! | [`validation`] | Shape checks over untrusted JSON with field paths in every error |
//! | [`detect`] | Format detection, the unified view, and loading a site directory's config |
//! | [`optimize`] | Splits a traditional config into previews and category chunks |
//! | [`loader`] | Lazy chunk loading: single-flight, timeout, bounded retries, expiring cache |
//! | [`search`] | Debounced, non-destructive site search |
//! | [`render`] | Maud markup for site cards and category panels |
//! | [`table`] | Flat table rows and the legacy navigation shape, both directions |
//! | [`lookup`] | Queries over a traditional config and override merging |
//! | [`assets`] | Syncing and verifying a published site directory |
//! | [`format`] | String helpers: URLs, slugs, sizes, dates |
//! | [`config`] | `affnav.toml` runtime settings |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Chunk Indices Are Positional
//!
//! Categories have no stable id. The optimizer numbers chunks in menu
//! order: each menu item takes the next index, and a `tabs` item is followed
//! by one index per submenu. Reordering the menu renumbers the chunks, which
//! is why `optimize` always rewrites the whole `categories/` directory and
//! `verify` reports chunks nothing points at.
//!
//! ## Failures Stay Per Category
//!
//! A chunk that fails to load leaves its own panel in an error state with a
//! retry button. Nothing else on the page is affected, and the cache is never
//! a reason to fail: storage errors are logged and the loader carries on with
//! what it has in memory.
//!
//! ## Maud For All Markup
//!
//! Site titles and descriptions come from editors, so every string is
//! interpolated through Maud and escaped. There is no hand-built HTML.

pub mod assets;
pub mod config;
pub mod detect;
pub mod format;
pub mod loader;
pub mod lookup;
pub mod optimize;
pub mod output;
pub mod render;
pub mod search;
pub mod table;
pub mod types;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_helpers;
