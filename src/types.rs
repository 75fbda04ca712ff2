//! Shared data model for directory configs and category chunks.
//!
//! Everything here is serialized with camelCase field names so the JSON
//! written by the optimizer and read by the loader matches the assets the
//! site serves (`/config.json`, `/config-optimized.json`,
//! `/categories/{index}.json`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One directory entry: an external site with its description and extras.
///
/// There is no stable id. `url` is the closest natural key but is optional
/// and not guaranteed unique.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advantages: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related: Option<Vec<RelatedSite>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<SiteDetails>,
}

impl Site {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    /// Advantages as a slice, empty when absent.
    pub fn advantages(&self) -> &[String] {
        self.advantages.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedSite {
    pub title: String,
    pub description: String,
}

/// Long-form details shown on a site's own page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SiteDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intro: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pros: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cons: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tips: Option<Vec<String>>,
}

impl SiteDetails {
    pub fn is_empty(&self) -> bool {
        self.intro.is_none()
            && self.pricing.is_none()
            && self.pros.is_none()
            && self.cons.is_none()
            && self.tips.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Logo {
    pub text: String,
    pub href: String,
}

impl Default for Logo {
    fn default() -> Self {
        Self {
            text: "Astro Nav".to_string(),
            href: "/".to_string(),
        }
    }
}

/// The `site` block shared by both config formats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteInfo {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub logo: Logo,
}

impl Default for SiteInfo {
    fn default() -> Self {
        Self {
            title: "Astro 导航".to_string(),
            description: "专业的导航网站".to_string(),
            logo: Logo::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MenuType {
    Single,
    Tabs,
}

impl MenuType {
    pub fn as_str(self) -> &'static str {
        match self {
            MenuType::Single => "single",
            MenuType::Tabs => "tabs",
        }
    }
}

/// What a menu item holds. The `type` tag decides which list is present,
/// so a `single` item can never carry a submenu and vice versa.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MenuContent {
    Single { sites: Vec<Site> },
    Tabs { submenu: Vec<SubMenuItem> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub name: String,
    pub href: String,
    pub icon: String,
    #[serde(flatten)]
    pub content: MenuContent,
}

impl MenuItem {
    pub fn menu_type(&self) -> MenuType {
        match self.content {
            MenuContent::Single { .. } => MenuType::Single,
            MenuContent::Tabs { .. } => MenuType::Tabs,
        }
    }

    /// All sites under this item, submenus flattened in order.
    pub fn all_sites(&self) -> Vec<&Site> {
        match &self.content {
            MenuContent::Single { sites } => sites.iter().collect(),
            MenuContent::Tabs { submenu } => submenu.iter().flat_map(|s| s.sites.iter()).collect(),
        }
    }

    pub fn submenu(&self) -> &[SubMenuItem] {
        match &self.content {
            MenuContent::Single { .. } => &[],
            MenuContent::Tabs { submenu } => submenu,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubMenuItem {
    pub name: String,
    pub href: String,
    pub icon: String,
    pub sites: Vec<Site>,
}

/// A traditional, fully inlined directory config (`/config.json`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    pub site: SiteInfo,
    #[serde(default)]
    pub category_map: BTreeMap<String, String>,
    pub menu_items: Vec<MenuItem>,
}

// =============================================================================
// Optimized (chunked) format
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizedMenuItem {
    pub name: String,
    pub href: String,
    pub icon: String,
    #[serde(rename = "type")]
    pub menu_type: MenuType,
    pub category_index: u32,
    pub site_count: usize,
    pub preview_sites: Vec<Site>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submenu: Option<Vec<OptimizedSubMenuItem>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizedSubMenuItem {
    pub name: String,
    pub href: String,
    pub icon: String,
    pub category_index: u32,
    pub site_count: usize,
    pub preview_sites: Vec<Site>,
}

/// Metadata block describing how an optimized config was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Optimization {
    pub enabled: bool,
    pub total_categories: usize,
    pub total_sites: usize,
    pub preview_count: usize,
    #[serde(rename = "fileSizeKB")]
    pub file_size_kb: f64,
    pub compression_ratio: f64,
}

/// A chunked config (`/config-optimized.json`): previews inline, full site
/// lists in `/categories/{categoryIndex}.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizedConfig {
    pub site: SiteInfo,
    pub menu_items: Vec<OptimizedMenuItem>,
    pub optimization: Optimization,
}

/// One lazily fetched category chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryData {
    pub category_index: u32,
    pub category_name: String,
    pub sites: Vec<Site>,
    pub metadata: CategoryMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryMetadata {
    pub site_count: usize,
    #[serde(rename = "fileSizeKB")]
    pub file_size_kb: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_menu_item_parses_sites() {
        let item: MenuItem = serde_json::from_value(json!({
            "name": "Trackers",
            "href": "#trackers",
            "icon": "chart",
            "type": "single",
            "sites": [{"title": "Binom", "description": "fast tracker"}]
        }))
        .unwrap();
        assert_eq!(item.menu_type(), MenuType::Single);
        assert_eq!(item.all_sites().len(), 1);
        assert!(item.submenu().is_empty());
    }

    #[test]
    fn tabs_menu_item_flattens_submenu_sites() {
        let item: MenuItem = serde_json::from_value(json!({
            "name": "Traffic",
            "href": "#traffic",
            "icon": "globe",
            "type": "tabs",
            "submenu": [
                {"name": "Pop", "href": "#pop", "icon": "p", "sites": [
                    {"title": "A", "description": "a"}
                ]},
                {"name": "Push", "href": "#push", "icon": "p", "sites": [
                    {"title": "B", "description": "b"},
                    {"title": "C", "description": "c"}
                ]}
            ]
        }))
        .unwrap();
        assert_eq!(item.menu_type(), MenuType::Tabs);
        let titles: Vec<&str> = item.all_sites().iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, ["A", "B", "C"]);
    }

    #[test]
    fn menu_item_serializes_type_tag() {
        let item = MenuItem {
            name: "X".into(),
            href: "#x".into(),
            icon: "i".into(),
            content: MenuContent::Single { sites: vec![] },
        };
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["type"], "single");
        assert!(value["sites"].is_array());
        assert!(value.get("submenu").is_none());
    }

    #[test]
    fn site_optional_fields_are_omitted() {
        let value = serde_json::to_value(Site::new("GitHub", "code hosting")).unwrap();
        assert_eq!(value, json!({"title": "GitHub", "description": "code hosting"}));
    }

    #[test]
    fn category_data_uses_wire_names() {
        let data: CategoryData = serde_json::from_value(json!({
            "categoryIndex": 2,
            "categoryName": "SPY",
            "sites": [],
            "metadata": {"siteCount": 0, "fileSizeKB": 0.5}
        }))
        .unwrap();
        assert_eq!(data.category_index, 2);
        assert_eq!(data.metadata.file_size_kb, 0.5);
        assert_eq!(data.metadata.last_modified, None);
    }
}
