//! Rendering adapter for the loader.
//!
//! The loader reports transitions through [`CategoryView`]; it never touches
//! markup itself. [`PanelView`] keeps a model of each registered category
//! container (which panels are visible, what the error text says) and can
//! render it through [`crate::render::category_panel`]. A transition for an
//! index with no registered container is ignored, the same way a page
//! without the container simply has nothing to update.

use crate::render;
use crate::types::CategoryData;
use maud::Markup;
use parking_lot::Mutex;
use std::collections::BTreeMap;

pub trait CategoryView: Send + Sync {
    fn show_loading(&self, index: u32);
    fn show_loaded(&self, index: u32, data: &CategoryData);
    fn show_error(&self, index: u32, message: &str);
    /// Retries used up; the retry control stays but does nothing.
    fn show_retries_exhausted(&self, index: u32, attempts: u32);

    /// Whether a container for `index` exists.
    fn has_panel(&self, _index: u32) -> bool {
        true
    }
}

/// View that ignores every transition.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopView;

impl CategoryView for NoopView {
    fn show_loading(&self, _index: u32) {}
    fn show_loaded(&self, _index: u32, _data: &CategoryData) {}
    fn show_error(&self, _index: u32, _message: &str) {}
    fn show_retries_exhausted(&self, _index: u32, _attempts: u32) {}
}

/// Visible state of one category container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Panel {
    pub lazy_content_visible: bool,
    pub loading_visible: bool,
    pub loaded_visible: bool,
    /// Rendered `sites-grid` markup once loaded.
    pub loaded_html: String,
    pub error_visible: bool,
    pub error_text: String,
    pub retry_disabled: bool,
    pub load_more_visible: bool,
    pub load_more_disabled: bool,
    /// `loading` class on the load-more button.
    pub load_more_busy: bool,
}

impl Default for Panel {
    fn default() -> Self {
        Self {
            lazy_content_visible: false,
            loading_visible: false,
            loaded_visible: false,
            loaded_html: String::new(),
            error_visible: false,
            error_text: String::new(),
            retry_disabled: false,
            load_more_visible: true,
            load_more_disabled: false,
            load_more_busy: false,
        }
    }
}

/// In-memory model of the category containers on a page.
#[derive(Debug, Default)]
pub struct PanelView {
    panels: Mutex<BTreeMap<u32, Panel>>,
}

impl PanelView {
    pub fn new() -> Self {
        Self::default()
    }

    /// View with a fresh container for each index.
    pub fn with_panels(indices: impl IntoIterator<Item = u32>) -> Self {
        let view = Self::new();
        for index in indices {
            view.register(index);
        }
        view
    }

    pub fn register(&self, index: u32) {
        self.panels.lock().entry(index).or_default();
    }

    pub fn panel(&self, index: u32) -> Option<Panel> {
        self.panels.lock().get(&index).cloned()
    }

    /// Current markup of the container, if registered.
    pub fn render(&self, index: u32) -> Option<Markup> {
        self.panel(index)
            .map(|panel| render::category_panel(index, &panel))
    }

    fn update(&self, index: u32, f: impl FnOnce(&mut Panel)) {
        if let Some(panel) = self.panels.lock().get_mut(&index) {
            f(panel);
        }
    }
}

impl CategoryView for PanelView {
    fn show_loading(&self, index: u32) {
        self.update(index, |p| {
            p.lazy_content_visible = true;
            p.loading_visible = true;
            p.loaded_visible = false;
            p.error_visible = false;
            p.load_more_busy = true;
            p.load_more_disabled = true;
        });
    }

    fn show_loaded(&self, index: u32, data: &CategoryData) {
        let html = render::sites_grid(&data.sites).into_string();
        self.update(index, |p| {
            p.lazy_content_visible = true;
            p.loading_visible = false;
            p.error_visible = false;
            p.loaded_html = html;
            p.loaded_visible = true;
            p.load_more_visible = false;
            p.load_more_busy = false;
        });
    }

    fn show_error(&self, index: u32, message: &str) {
        self.update(index, |p| {
            p.loading_visible = false;
            p.error_visible = true;
            p.error_text = message.to_string();
            p.retry_disabled = false;
            p.load_more_busy = false;
            p.load_more_disabled = false;
        });
    }

    fn show_retries_exhausted(&self, index: u32, attempts: u32) {
        self.update(index, |p| {
            p.loading_visible = false;
            p.error_visible = true;
            p.error_text = format!("Gave up after {attempts} attempts. Reload the page to try again.");
            p.retry_disabled = true;
        });
    }

    fn has_panel(&self, index: u32) -> bool {
        self.panels.lock().contains_key(&index)
    }
}
