//! HTML fragments for category panels.
//!
//! All markup goes through Maud, so every string taken from a config or a
//! fetched chunk is escaped on interpolation. The only `PreEscaped` content
//! is a panel's loaded grid, which was itself rendered by [`sites_grid`].
//!
//! ## DOM contract
//!
//! A lazy category renders as one container carrying `data-category-index`,
//! with the state panels below it addressed by class:
//!
//! ```text
//! div.category-section[data-category-index=N]
//! ├── div.sites-grid.preview        (preview sites, server rendered)
//! ├── div.lazy-content
//! │   ├── div.loading-state
//! │   ├── div.loaded-content        (filled with sites_grid on success)
//! │   └── div.error-state
//! │       ├── p.error-text
//! │       └── button[data-action=retry-load]
//! └── button.load-more-btn[data-action=load-category]
//! ```

use crate::loader::view::Panel;
use crate::types::Site;
use maud::{Markup, PreEscaped, html};

pub const CATEGORY_INDEX_ATTR: &str = "data-category-index";
pub const LAZY_CONTENT: &str = "lazy-content";
pub const LOADING_STATE: &str = "loading-state";
pub const LOADED_CONTENT: &str = "loaded-content";
pub const ERROR_STATE: &str = "error-state";
pub const ERROR_TEXT: &str = "error-text";
pub const LOAD_MORE_BUTTON: &str = "load-more-btn";

pub const ACTION_LOAD_CATEGORY: &str = "load-category";
pub const ACTION_RETRY_LOAD: &str = "retry-load";

fn display(visible: bool) -> &'static str {
    if visible { "display: block" } else { "display: none" }
}

/// One site card.
pub fn site_card(site: &Site) -> Markup {
    let pricing = site.details.as_ref().and_then(|d| d.pricing.as_deref());
    html! {
        div.site-card.loaded {
            div.site-header {
                h4.site-title { (site.title) }
                @if let Some(url) = &site.url {
                    a.site-link href=(url) target="_blank" rel="noopener noreferrer" {
                        i.icon-external-link {}
                    }
                }
            }
            p.site-description { (site.description) }
            @if !site.advantages().is_empty() {
                div.site-tags {
                    @for tag in site.advantages() {
                        span.tag { (tag) }
                    }
                }
            }
            @if let Some(pricing) = pricing {
                div.site-details {
                    span.pricing { (pricing) }
                }
            }
        }
    }
}

/// The grid a loaded category fills its `loaded-content` panel with.
pub fn sites_grid(sites: &[Site]) -> Markup {
    html! {
        div.sites-grid {
            @for site in sites {
                (site_card(site))
            }
        }
    }
}

/// Server-rendered placeholder for a category whose sites load on demand.
pub fn lazy_category(index: u32, name: &str, preview: &[Site], site_count: usize) -> Markup {
    let remaining = site_count.saturating_sub(preview.len());
    html! {
        div.category-section data-category-index=(index) {
            h3.category-title { (name) }
            div.sites-grid.preview {
                @for site in preview {
                    (site_card(site))
                }
            }
            (panel_body(index, &Panel::default()))
            @if remaining > 0 {
                button.load-more-btn type="button"
                    data-action=(ACTION_LOAD_CATEGORY) data-category-index=(index) {
                    "Show " (remaining) " more"
                }
            }
        }
    }
}

/// The `lazy-content` block and load-more button reflecting `panel`.
pub fn category_panel(index: u32, panel: &Panel) -> Markup {
    html! {
        div.category-section data-category-index=(index) {
            (panel_body(index, panel))
            button.load-more-btn.loading[panel.load_more_busy] type="button"
                style=(display(panel.load_more_visible))
                disabled[panel.load_more_disabled]
                data-action=(ACTION_LOAD_CATEGORY) data-category-index=(index) {
                "Load more"
            }
        }
    }
}

fn panel_body(index: u32, panel: &Panel) -> Markup {
    html! {
        div.lazy-content style=(display(panel.lazy_content_visible)) {
            div.loading-state style=(display(panel.loading_visible)) {
                span.spinner {}
                " Loading…"
            }
            div.loaded-content style=(display(panel.loaded_visible)) {
                (PreEscaped(&panel.loaded_html))
            }
            div.error-state style=(display(panel.error_visible)) {
                p.error-text { (panel.error_text) }
                button.retry-btn type="button"
                    disabled[panel.retry_disabled]
                    data-action=(ACTION_RETRY_LOAD) data-category-index=(index) {
                    "Retry"
                }
            }
        }
    }
}
