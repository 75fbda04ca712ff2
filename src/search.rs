//! Site search.
//!
//! [`SearchIndex::filter`] is a pure function from a query to visibility
//! flags: nothing is removed, so clearing the query restores everything.
//! A site matches when the lowercased query is a substring of its title,
//! its description or the name of the category it sits in. A category is
//! visible when at least one of its sites is.
//!
//! [`SearchController`] adds input handling on top: keystrokes are debounced
//! (300 ms by default) and Escape clears the query at once.

use crate::detect::UnifiedConfig;
use crate::types::Site;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone)]
pub struct SearchItem {
    pub title: String,
    pub description: String,
    pub category: usize,
    haystack: [String; 2],
    site: Option<Site>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchIndex {
    categories: Vec<String>,
    categories_lc: Vec<String>,
    items: Vec<SearchItem>,
}

/// Result of one filter pass, parallel to the index's items and categories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Visibility {
    /// Query as typed, empty when everything is shown.
    pub query: String,
    pub items: Vec<bool>,
    pub categories: Vec<bool>,
    pub matched: usize,
}

impl Visibility {
    fn all(index: &SearchIndex) -> Self {
        Self {
            query: String::new(),
            items: vec![true; index.items.len()],
            categories: vec![true; index.categories.len()],
            matched: index.items.len(),
        }
    }
}

impl SearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every site visible in a unified config, one category per menu
    /// item. Lazy categories contribute their previews until
    /// [`SearchIndex::extend_category`] adds the rest.
    pub fn from_config(config: &UnifiedConfig) -> Self {
        let mut index = Self::new();
        for item in &config.menu_items {
            let category = index.add_category(&item.name);
            let own = item.sites.as_ref().or(item.preview_sites.as_ref());
            index.extend_category(category, own.into_iter().flatten());
            for sub in item.submenu.iter().flatten() {
                let sites = sub.sites.as_ref().or(sub.preview_sites.as_ref());
                index.extend_category(category, sites.into_iter().flatten());
            }
        }
        index
    }

    pub fn add_category(&mut self, name: &str) -> usize {
        self.categories.push(name.to_string());
        self.categories_lc.push(name.to_lowercase());
        self.categories.len() - 1
    }

    pub fn add_item(&mut self, category: usize, title: &str, description: &str) {
        self.items.push(SearchItem {
            title: title.to_string(),
            description: description.to_string(),
            category,
            haystack: [title.to_lowercase(), description.to_lowercase()],
            site: None,
        });
    }

    /// Add sites to a category, skipping sites it already holds. Only an
    /// identical site counts as held, so previews merged with their full
    /// chunk appear once while distinct sites sharing a title both stay.
    pub fn extend_category<'a>(&mut self, category: usize, sites: impl IntoIterator<Item = &'a Site>) {
        for site in sites {
            let known = self
                .items
                .iter()
                .any(|i| i.category == category && i.site.as_ref() == Some(site));
            if !known {
                self.add_item(category, &site.title, &site.description);
                if let Some(item) = self.items.last_mut() {
                    item.site = Some(site.clone());
                }
            }
        }
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn items(&self) -> &[SearchItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn filter(&self, query: &str) -> Visibility {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Visibility::all(self);
        }

        let mut categories = vec![false; self.categories.len()];
        let items: Vec<bool> = self
            .items
            .iter()
            .map(|item| {
                let hit = item.haystack.iter().any(|h| h.contains(&needle))
                    || self
                        .categories_lc
                        .get(item.category)
                        .is_some_and(|c| c.contains(&needle));
                if hit && let Some(visible) = categories.get_mut(item.category) {
                    *visible = true;
                }
                hit
            })
            .collect();
        let matched = items.iter().filter(|v| **v).count();
        Visibility {
            query: query.to_string(),
            items,
            categories,
            matched,
        }
    }

    /// Items visible under `visibility`, in index order.
    pub fn visible<'a>(&'a self, visibility: &'a Visibility) -> impl Iterator<Item = &'a SearchItem> {
        self.items
            .iter()
            .zip(&visibility.items)
            .filter(|(_, v)| **v)
            .map(|(item, _)| item)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
    Input(String),
    Escape,
}

/// Debounced search state.
///
/// Time is passed in explicitly so the state can be stepped without a
/// runtime; [`SearchController::run`] drives it from an event channel.
#[derive(Debug)]
pub struct SearchController {
    index: SearchIndex,
    debounce: Duration,
    query: String,
    pending: Option<(String, Instant)>,
    visibility: Visibility,
}

impl SearchController {
    pub fn new(index: SearchIndex, debounce: Duration) -> Self {
        let visibility = Visibility::all(&index);
        Self {
            index,
            debounce,
            query: String::new(),
            pending: None,
            visibility,
        }
    }

    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    /// Query currently applied.
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn visibility(&self) -> &Visibility {
        &self.visibility
    }

    /// New input restarts the debounce window.
    pub fn input(&mut self, query: &str, now: Instant) {
        self.pending = Some((query.to_string(), now + self.debounce));
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, at)| *at)
    }

    /// Apply the pending query once its window has passed.
    pub fn poll(&mut self, now: Instant) -> Option<&Visibility> {
        match &self.pending {
            Some((_, at)) if *at <= now => {}
            _ => return None,
        }
        let (query, _) = self.pending.take()?;
        self.visibility = self.index.filter(&query);
        tracing::debug!(query = %query, matched = self.visibility.matched, "search applied");
        self.query = query;
        Some(&self.visibility)
    }

    /// Clear the query and show everything, without waiting.
    pub fn escape(&mut self) -> &Visibility {
        self.pending = None;
        self.query.clear();
        self.visibility = Visibility::all(&self.index);
        &self.visibility
    }

    /// Consume events until the sender goes away, publishing every applied
    /// result. A query still pending at that point is applied once its
    /// window passes.
    pub async fn run(mut self, mut events: mpsc::Receiver<SearchEvent>, results: watch::Sender<Visibility>) {
        loop {
            let deadline = self.deadline();
            tokio::select! {
                event = events.recv() => match event {
                    Some(SearchEvent::Input(query)) => self.input(&query, Instant::now()),
                    Some(SearchEvent::Escape) => {
                        results.send_replace(self.escape().clone());
                    }
                    None => {
                        if let Some(at) = deadline {
                            tokio::time::sleep_until(at).await;
                            if let Some(visibility) = self.poll(at) {
                                results.send_replace(visibility.clone());
                            }
                        }
                        break;
                    }
                },
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if let Some(visibility) = self.poll(Instant::now()) {
                        results.send_replace(visibility.clone());
                    }
                }
            }
        }
    }
}
