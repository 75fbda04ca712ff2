//! Read-only queries over a traditional config, plus override merging.

use crate::types::{Logo, MenuItem, MenuType, Site, SiteConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Every site, submenus flattened, in menu order.
pub fn all_sites(config: &SiteConfig) -> Vec<&Site> {
    config
        .menu_items
        .iter()
        .flat_map(MenuItem::all_sites)
        .collect()
}

pub fn menu_item_by_name<'a>(config: &'a SiteConfig, name: &str) -> Option<&'a MenuItem> {
    config.menu_items.iter().find(|item| item.name == name)
}

/// First site whose `url` is exactly `url`.
pub fn site_by_url<'a>(config: &'a SiteConfig, url: &str) -> Option<&'a Site> {
    config
        .menu_items
        .iter()
        .flat_map(MenuItem::all_sites)
        .find(|site| site.url.as_deref() == Some(url))
}

/// Case-insensitive substring search over title, description and
/// advantages. An empty query matches everything.
pub fn search_sites<'a>(config: &'a SiteConfig, query: &str) -> Vec<&'a Site> {
    let query = query.to_lowercase();
    all_sites(config)
        .into_iter()
        .filter(|site| {
            site.title.to_lowercase().contains(&query)
                || site.description.to_lowercase().contains(&query)
                || site
                    .advantages()
                    .iter()
                    .any(|a| a.to_lowercase().contains(&query))
        })
        .collect()
}

/// Display name for a category id, found by reverse lookup in
/// `categoryMap`. Unknown ids come back unchanged.
pub fn category_name<'a>(config: &'a SiteConfig, id: &'a str) -> &'a str {
    config
        .category_map
        .iter()
        .find(|(_, v)| v.as_str() == id)
        .map_or(id, |(name, _)| name.as_str())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigStats {
    pub total_categories: usize,
    pub total_sites: usize,
    pub categories_with_submenus: usize,
    pub single_categories: usize,
    pub tabs_categories: usize,
}

pub fn config_stats(config: &SiteConfig) -> ConfigStats {
    let items = &config.menu_items;
    let count = |t: MenuType| items.iter().filter(|i| i.menu_type() == t).count();
    ConfigStats {
        total_categories: items.len(),
        total_sites: all_sites(config).len(),
        categories_with_submenus: items.iter().filter(|i| !i.submenu().is_empty()).count(),
        single_categories: count(MenuType::Single),
        tabs_categories: count(MenuType::Tabs),
    }
}

/// Menu item names, each followed by its submenu names.
pub fn all_category_names(config: &SiteConfig) -> Vec<&str> {
    let mut names = Vec::new();
    for item in &config.menu_items {
        names.push(item.name.as_str());
        names.extend(item.submenu().iter().map(|s| s.name.as_str()));
    }
    names
}

pub fn is_config_empty(config: &SiteConfig) -> bool {
    config.menu_items.is_empty()
}

/// Partial `site` block; present fields replace the base's.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SiteInfoOverride {
    pub title: Option<String>,
    pub description: Option<String>,
    pub logo: Option<Logo>,
}

/// A partial config laid over a base by [`merge_configs`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigOverride {
    pub site: Option<SiteInfoOverride>,
    pub menu_items: Option<Vec<MenuItem>>,
    pub category_map: Option<BTreeMap<String, String>>,
}

/// `site` merges field by field, `menuItems` is replaced wholesale and
/// `categoryMap` merges key by key with the override winning.
pub fn merge_configs(base: &SiteConfig, over: ConfigOverride) -> SiteConfig {
    let mut merged = base.clone();
    if let Some(site) = over.site {
        if let Some(title) = site.title {
            merged.site.title = title;
        }
        if let Some(description) = site.description {
            merged.site.description = description;
        }
        if let Some(logo) = site.logo {
            merged.site.logo = logo;
        }
    }
    if let Some(items) = over.menu_items {
        merged.menu_items = items;
    }
    if let Some(map) = over.category_map {
        merged.category_map.extend(map);
    }
    merged
}
