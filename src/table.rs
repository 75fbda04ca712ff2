//! Flat table import/export and legacy navigation conversion.
//!
//! Editors maintain the directory as a table with one site per row:
//!
//! | category | subcategory | title | description | url | ... | sortOrder |
//! |----------|-------------|-------|-------------|-----|-----|-----------|
//! | 追踪系统 |             | Binom | tracker     | binom.org | | 1 |
//! | 流量平台 | PoP流量     | PropellerAds | ... | ... | | 1 |
//!
//! List cells (`advantages`, `pros`, `relatedTitles`, ...) are `;`
//! separated. Rows arrive as JSON records; reading spreadsheet files is
//! left to whatever produced them.
//!
//! The older `Category` / `NavItem` navigation shape converts both ways
//! through [`convert_navigation`] and [`menu_item_to_category`].

use crate::format::{format_url, generate_slug, join_with_semicolon, split_by_semicolon};
use crate::types::{
    MenuContent, MenuItem, RelatedSite, Site, SiteConfig, SiteDetails, SiteInfo, SubMenuItem,
};
use crate::validation::validate_site_url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Column order of the import template.
pub const TABLE_HEADERS: [&str; 15] = [
    "category",
    "subcategory",
    "title",
    "description",
    "url",
    "logo",
    "advantages",
    "pricing",
    "pros",
    "cons",
    "tips",
    "intro",
    "relatedTitles",
    "relatedDescriptions",
    "sortOrder",
];

pub const REQUIRED_FIELDS: [&str; 3] = ["category", "title", "description"];

pub const MAX_TITLE_LENGTH: usize = 100;
pub const MAX_DESCRIPTION_LENGTH: usize = 500;
pub const MAX_URL_LENGTH: usize = 2000;
pub const MAX_ADVANTAGES: usize = 10;

const DEFAULT_ICON: &str = "folder";

/// One table row. Empty cells are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableRow {
    pub category: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub subcategory: String,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub logo: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub advantages: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub features: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub pricing: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub pros: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cons: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tips: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub intro: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub related_titles: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub related_descriptions: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i64>,
}

impl TableRow {
    fn field(&self, name: &str) -> &str {
        match name {
            "category" => &self.category,
            "title" => &self.title,
            "description" => &self.description,
            _ => "",
        }
    }

    fn is_complete(&self) -> bool {
        REQUIRED_FIELDS.iter().all(|f| !self.field(f).trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowIssue {
    /// 1-based row number.
    pub row: usize,
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RowValidation {
    pub errors: Vec<RowIssue>,
    pub warnings: Vec<RowIssue>,
}

impl RowValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

pub fn validate_rows(rows: &[TableRow]) -> RowValidation {
    let mut result = RowValidation::default();
    for (i, row) in rows.iter().enumerate() {
        let n = i + 1;
        let issue = |field: &str, message: String| RowIssue {
            row: n,
            field: field.to_string(),
            message,
        };

        for field in REQUIRED_FIELDS {
            if row.field(field).trim().is_empty() {
                result
                    .errors
                    .push(issue(field, format!("{field} is required")));
            }
        }

        let url = row.url.trim();
        if !url.is_empty() && !validate_site_url(url) {
            result.warnings.push(issue(
                "url",
                format!("not a full URL, will be saved as {}", format_url(url)),
            ));
        }
        if url.chars().count() > MAX_URL_LENGTH {
            result
                .warnings
                .push(issue("url", format!("longer than {MAX_URL_LENGTH} characters")));
        }
        if row.title.chars().count() > MAX_TITLE_LENGTH {
            result
                .warnings
                .push(issue("title", format!("longer than {MAX_TITLE_LENGTH} characters")));
        }
        if row.description.chars().count() > MAX_DESCRIPTION_LENGTH {
            result.warnings.push(issue(
                "description",
                format!("longer than {MAX_DESCRIPTION_LENGTH} characters"),
            ));
        }
        let advantages = split_by_semicolon(&row.advantages).len();
        if advantages > MAX_ADVANTAGES {
            result.warnings.push(issue(
                "advantages",
                format!("{advantages} entries, at most {MAX_ADVANTAGES} are shown"),
            ));
        }
        let titles = split_by_semicolon(&row.related_titles).len();
        let descriptions = split_by_semicolon(&row.related_descriptions).len();
        if titles != descriptions {
            result.warnings.push(issue(
                "relatedDescriptions",
                format!("{titles} related titles but {descriptions} descriptions"),
            ));
        }
    }
    result
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn non_empty_list(s: &str) -> Option<Vec<String>> {
    let items = split_by_semicolon(s);
    (!items.is_empty()).then_some(items)
}

pub fn row_to_site(row: &TableRow) -> Site {
    let details = SiteDetails {
        intro: non_empty(&row.intro),
        pricing: non_empty(&row.pricing),
        pros: non_empty_list(&row.pros),
        cons: non_empty_list(&row.cons),
        tips: non_empty_list(&row.tips),
    };
    let titles = split_by_semicolon(&row.related_titles);
    let descriptions = split_by_semicolon(&row.related_descriptions);
    let related: Vec<RelatedSite> = titles
        .into_iter()
        .enumerate()
        .map(|(i, title)| RelatedSite {
            title,
            description: descriptions.get(i).cloned().unwrap_or_default(),
        })
        .collect();

    Site {
        title: row.title.trim().to_string(),
        description: row.description.trim().to_string(),
        url: non_empty(&row.url).map(|u| format_url(&u)),
        logo: non_empty(&row.logo),
        advantages: non_empty_list(&row.advantages),
        features: non_empty_list(&row.features),
        related: (!related.is_empty()).then_some(related),
        details: (!details.is_empty()).then_some(details),
    }
}

pub fn site_to_row(site: &Site, category: &str, subcategory: &str, sort_order: i64) -> TableRow {
    let details = site.details.clone().unwrap_or_default();
    let list = |v: &Option<Vec<String>>| v.as_deref().map(join_with_semicolon).unwrap_or_default();
    let related = site.related.as_deref().unwrap_or_default();
    let related_titles: Vec<&str> = related.iter().map(|r| r.title.as_str()).collect();
    let related_descriptions: Vec<&str> = related.iter().map(|r| r.description.as_str()).collect();

    TableRow {
        category: category.to_string(),
        subcategory: subcategory.to_string(),
        title: site.title.clone(),
        description: site.description.clone(),
        url: site.url.clone().unwrap_or_default(),
        logo: site.logo.clone().unwrap_or_default(),
        advantages: list(&site.advantages),
        features: list(&site.features),
        pricing: details.pricing.unwrap_or_default(),
        pros: list(&details.pros),
        cons: list(&details.cons),
        tips: list(&details.tips),
        intro: details.intro.unwrap_or_default(),
        related_titles: join_with_semicolon(&related_titles),
        related_descriptions: join_with_semicolon(&related_descriptions),
        sort_order: Some(sort_order),
    }
}

/// Build a config from rows. Incomplete rows are skipped.
///
/// Categories keep the order they first appear in. A category with any
/// subcategory becomes `tabs`; its rows without one land in a submenu
/// named after the category. Sites are ordered by `sortOrder`, then by row
/// order.
pub fn rows_to_config(rows: &[TableRow], site: SiteInfo) -> SiteConfig {
    // category -> [(subcategory, rows)], both in first-seen order
    let mut groups: Vec<(String, Vec<(String, Vec<&TableRow>)>)> = Vec::new();

    for (i, row) in rows.iter().enumerate() {
        if !row.is_complete() {
            tracing::warn!(row = i + 1, "skipping incomplete table row");
            continue;
        }
        let category = row.category.trim();
        let sub = row.subcategory.trim();
        let pos = match groups.iter().position(|(name, _)| name == category) {
            Some(pos) => pos,
            None => {
                groups.push((category.to_string(), Vec::new()));
                groups.len() - 1
            }
        };
        let subs = &mut groups[pos].1;
        match subs.iter_mut().find(|(name, _)| name == sub) {
            Some((_, bucket)) => bucket.push(row),
            None => subs.push((sub.to_string(), vec![row])),
        }
    }

    let sorted_sites = |mut bucket: Vec<&TableRow>| -> Vec<Site> {
        bucket.sort_by_key(|r| r.sort_order.unwrap_or(i64::MAX));
        bucket.into_iter().map(row_to_site).collect()
    };

    let mut category_map = BTreeMap::new();
    let mut menu_items = Vec::with_capacity(groups.len());
    for (name, subs) in groups {
        let slug = generate_slug(&name);
        let is_tabs = subs.iter().any(|(sub, _)| !sub.is_empty());
        let content = if is_tabs {
            MenuContent::Tabs {
                submenu: subs
                    .into_iter()
                    .map(|(sub, bucket)| {
                        let sub_name = if sub.is_empty() { name.clone() } else { sub };
                        SubMenuItem {
                            href: format!("#{slug}-{}", generate_slug(&sub_name)),
                            name: sub_name,
                            icon: DEFAULT_ICON.to_string(),
                            sites: sorted_sites(bucket),
                        }
                    })
                    .collect(),
            }
        } else {
            let bucket = subs.into_iter().flat_map(|(_, rows)| rows).collect();
            MenuContent::Single {
                sites: sorted_sites(bucket),
            }
        };
        menu_items.push(MenuItem {
            href: format!("#{slug}"),
            icon: DEFAULT_ICON.to_string(),
            name: name.clone(),
            content,
        });
        category_map.insert(name, slug);
    }

    SiteConfig {
        site,
        category_map,
        menu_items,
    }
}

/// Flatten a config back into rows, numbering `sortOrder` per group.
pub fn config_to_rows(config: &SiteConfig) -> Vec<TableRow> {
    let mut rows = Vec::new();
    for item in &config.menu_items {
        match &item.content {
            MenuContent::Single { sites } => {
                rows.extend(
                    sites
                        .iter()
                        .enumerate()
                        .map(|(i, s)| site_to_row(s, &item.name, "", i as i64 + 1)),
                );
            }
            MenuContent::Tabs { submenu } => {
                for sub in submenu {
                    rows.extend(
                        sub.sites
                            .iter()
                            .enumerate()
                            .map(|(i, s)| site_to_row(s, &item.name, &sub.name, i as i64 + 1)),
                    );
                }
            }
        }
    }
    rows
}

// ============================================================================
// Legacy navigation shape
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavItem {
    pub title: String,
    pub url: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<SiteDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubCategory {
    pub name: String,
    pub items: Vec<NavItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub name: String,
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<NavItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_categories: Option<Vec<SubCategory>>,
}

/// Legacy `features` become `advantages`.
pub fn nav_item_to_site(item: &NavItem) -> Site {
    Site {
        url: Some(item.url.clone()),
        advantages: item.features.clone(),
        details: item.details.clone(),
        ..Site::new(item.title.clone(), item.description.clone())
    }
}

pub fn site_to_nav_item(site: &Site) -> NavItem {
    NavItem {
        title: site.title.clone(),
        url: site.url.clone().unwrap_or_else(|| "#".to_string()),
        description: site.description.clone(),
        details: site.details.clone(),
        features: site.advantages.clone(),
    }
}

pub fn category_to_menu_item(category: &Category) -> MenuItem {
    let base = category.name.to_lowercase();
    let content = match &category.sub_categories {
        Some(subs) if !subs.is_empty() => MenuContent::Tabs {
            submenu: subs
                .iter()
                .map(|sub| SubMenuItem {
                    name: sub.name.clone(),
                    href: format!("#{base}-{}", sub.name.to_lowercase()),
                    icon: category.icon.clone(),
                    sites: sub.items.iter().map(nav_item_to_site).collect(),
                })
                .collect(),
        },
        _ => MenuContent::Single {
            sites: category
                .items
                .iter()
                .flatten()
                .map(nav_item_to_site)
                .collect(),
        },
    };
    MenuItem {
        name: category.name.clone(),
        href: format!("#{base}"),
        icon: category.icon.clone(),
        content,
    }
}

pub fn menu_item_to_category(item: &MenuItem) -> Category {
    match &item.content {
        MenuContent::Tabs { submenu } => Category {
            name: item.name.clone(),
            icon: item.icon.clone(),
            items: None,
            sub_categories: Some(
                submenu
                    .iter()
                    .map(|sub| SubCategory {
                        name: sub.name.clone(),
                        items: sub.sites.iter().map(site_to_nav_item).collect(),
                    })
                    .collect(),
            ),
        },
        MenuContent::Single { sites } => Category {
            name: item.name.clone(),
            icon: item.icon.clone(),
            items: Some(sites.iter().map(site_to_nav_item).collect()),
            sub_categories: None,
        },
    }
}

/// Convert legacy navigation data into a traditional config.
pub fn convert_navigation(categories: &[Category], site: SiteInfo) -> SiteConfig {
    let category_map = categories
        .iter()
        .map(|c| {
            let id = c
                .name
                .to_lowercase()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join("-");
            (c.name.clone(), id)
        })
        .collect();
    SiteConfig {
        site,
        category_map,
        menu_items: categories.iter().map(category_to_menu_item).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::sample_config;
    use crate::types::MenuType;
    use pretty_assertions::assert_eq;

    fn row(category: &str, sub: &str, title: &str, sort: Option<i64>) -> TableRow {
        TableRow {
            category: category.into(),
            subcategory: sub.into(),
            title: title.into(),
            description: format!("{title} description"),
            sort_order: sort,
            ..TableRow::default()
        }
    }

    // =========================================================================
    // validate_rows
    // =========================================================================

    #[test]
    fn missing_required_fields_are_errors() {
        let rows = vec![
            row("Trackers", "", "Binom", None),
            TableRow {
                title: "Orphan".into(),
                ..TableRow::default()
            },
        ];
        let v = validate_rows(&rows);
        assert!(!v.is_valid());
        let fields: Vec<(usize, &str)> = v.errors.iter().map(|e| (e.row, e.field.as_str())).collect();
        assert_eq!(fields, [(2, "category"), (2, "description")]);
    }

    #[test]
    fn soft_problems_are_warnings() {
        let mut r = row("Trackers", "", "Binom", None);
        r.url = "binom.org".into();
        r.related_titles = "Voluum; FunnelFlux".into();
        r.related_descriptions = "old tracker".into();
        r.title = "x".repeat(MAX_TITLE_LENGTH + 1);

        let v = validate_rows(&[r]);
        assert!(v.is_valid());
        let fields: Vec<&str> = v.warnings.iter().map(|w| w.field.as_str()).collect();
        assert_eq!(fields, ["url", "title", "relatedDescriptions"]);
        assert!(v.warnings[0].message.contains("https://binom.org"));
    }

    // =========================================================================
    // rows_to_config
    // =========================================================================

    #[test]
    fn groups_by_category_in_first_seen_order() {
        let rows = vec![
            row("Trackers", "", "Binom", Some(2)),
            row("Traffic", "PoP", "PropellerAds", None),
            row("Trackers", "", "Voluum", Some(1)),
            row("Traffic", "Native", "Taboola", None),
            row("Traffic", "", "Generic", None),
        ];
        let config = rows_to_config(&rows, SiteInfo::default());

        let names: Vec<&str> = config.menu_items.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["Trackers", "Traffic"]);

        let trackers = &config.menu_items[0];
        assert_eq!(trackers.menu_type(), MenuType::Single);
        let titles: Vec<&str> = trackers.all_sites().iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, ["Voluum", "Binom"]);

        let traffic = &config.menu_items[1];
        assert_eq!(traffic.menu_type(), MenuType::Tabs);
        let subs: Vec<&str> = traffic.submenu().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(subs, ["PoP", "Native", "Traffic"]);
        assert_eq!(traffic.submenu()[0].href, "#traffic-pop");

        assert_eq!(config.category_map.get("Trackers").map(String::as_str), Some("trackers"));
    }

    #[test]
    fn row_fields_map_onto_site() {
        let mut r = row("Trackers", "", "Binom", None);
        r.url = "binom.org".into();
        r.advantages = "fast; cheap".into();
        r.pricing = "$100/mo".into();
        r.pros = "quick".into();
        r.related_titles = "Voluum;FunnelFlux".into();
        r.related_descriptions = "old".into();

        let site = row_to_site(&r);
        assert_eq!(site.url.as_deref(), Some("https://binom.org"));
        assert_eq!(site.advantages(), ["fast", "cheap"]);
        let details = site.details.unwrap();
        assert_eq!(details.pricing.as_deref(), Some("$100/mo"));
        assert_eq!(details.pros, Some(vec!["quick".to_string()]));
        assert_eq!(details.cons, None);
        let related = site.related.unwrap();
        assert_eq!(related.len(), 2);
        assert_eq!(related[1].description, "");
    }

    #[test]
    fn incomplete_rows_are_skipped() {
        let rows = vec![row("Trackers", "", "Binom", None), row("", "", "Nowhere", None)];
        let config = rows_to_config(&rows, SiteInfo::default());
        assert_eq!(config.menu_items.len(), 1);
    }

    #[test]
    fn export_then_import_preserves_sites() {
        let config = sample_config();
        let rows = config_to_rows(&config);
        assert_eq!(rows.len(), 7);
        assert_eq!(rows[4].subcategory, "SPY");
        assert_eq!(rows[0].advantages, "fast; self-hosted");

        let back = rows_to_config(&rows, config.site.clone());
        for (a, b) in config.menu_items.iter().zip(&back.menu_items) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.menu_type(), b.menu_type());
            assert_eq!(a.all_sites(), b.all_sites());
        }
    }

    // =========================================================================
    // Legacy navigation
    // =========================================================================

    #[test]
    fn legacy_category_with_subcategories_becomes_tabs() {
        let category = Category {
            name: "Traffic Sources".into(),
            icon: "globe".into(),
            items: None,
            sub_categories: Some(vec![SubCategory {
                name: "PoP".into(),
                items: vec![NavItem {
                    title: "PropellerAds".into(),
                    url: "https://propellerads.com".into(),
                    description: "pop traffic".into(),
                    details: None,
                    features: Some(vec!["global".into()]),
                }],
            }]),
        };
        let item = category_to_menu_item(&category);
        assert_eq!(item.href, "#traffic sources");
        assert_eq!(item.submenu()[0].href, "#traffic sources-pop");
        assert_eq!(item.all_sites()[0].advantages(), ["global"]);

        assert_eq!(menu_item_to_category(&item), category);

        let config = convert_navigation(&[category], SiteInfo::default());
        assert_eq!(
            config.category_map.get("Traffic Sources").map(String::as_str),
            Some("traffic-sources")
        );
    }

    #[test]
    fn site_without_url_gets_placeholder() {
        let nav = site_to_nav_item(&Site::new("A", "B"));
        assert_eq!(nav.url, "#");
        let category = menu_item_to_category(&sample_config().menu_items[0]);
        assert_eq!(category.items.as_ref().unwrap().len(), 4);
        assert!(category.sub_categories.is_none());
    }
}
