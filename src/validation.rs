//! Validation of untrusted directory JSON.
//!
//! Configs and category chunks arrive as arbitrary JSON, so nothing here
//! assumes a shape: every check works on [`serde_json::Value`] and reports
//! the offending field together with its index path, e.g.
//! `menuItems[2].sites[0].title`.
//!
//! Two entry points share one traversal:
//!
//! - [`validate_config`] fails fast and returns the first violation.
//! - [`check_config`] collects every violation and, when there are none,
//!   hands back a typed [`SiteConfig`].
//!
//! Both walk fields in the same order, so the first error `check_config`
//! reports is exactly the one `validate_config` raises.

use crate::types::SiteConfig;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// A single violation: where it is and what is wrong.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{path}: {reason}")]
pub struct ConfigInvalid {
    pub path: String,
    pub reason: String,
}

impl ConfigInvalid {
    fn new(path: &str, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Every violation found by [`check_config`], in traversal order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ConfigInvalid>);

impl ValidationErrors {
    pub fn first(&self) -> Option<&ConfigInvalid> {
        self.0.first()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [] => write!(f, "no validation errors"),
            [only] => write!(f, "{only}"),
            [first, rest @ ..] => write!(f, "{first} (and {} more)", rest.len()),
        }
    }
}

impl std::error::Error for ValidationErrors {}

/// Collects violations. In fail-fast mode the first push stops the walk.
struct Checker {
    errors: Vec<ConfigInvalid>,
    fail_fast: bool,
}

impl Checker {
    fn new(fail_fast: bool) -> Self {
        Self {
            errors: Vec::new(),
            fail_fast,
        }
    }

    fn stopped(&self) -> bool {
        self.fail_fast && !self.errors.is_empty()
    }

    fn push(&mut self, path: &str, reason: impl Into<String>) {
        if !self.stopped() {
            self.errors.push(ConfigInvalid::new(path, reason));
        }
    }

    fn into_result(self) -> Result<(), ConfigInvalid> {
        match self.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Field must be a non-empty string.
    fn required_str(&mut self, obj: &serde_json::Map<String, Value>, base: &str, key: &str) {
        let path = join(base, key);
        match obj.get(key) {
            Some(Value::String(s)) if !s.is_empty() => {}
            Some(Value::String(_)) => self.push(&path, "must not be empty"),
            Some(_) => self.push(&path, "must be a string"),
            None => self.push(&path, "is required"),
        }
    }

    /// Field may be absent; when present it must be a string.
    fn optional_str(&mut self, obj: &serde_json::Map<String, Value>, base: &str, key: &str) {
        if let Some(v) = obj.get(key)
            && !v.is_string()
        {
            self.push(&join(base, key), "must be a string");
        }
    }

    /// Field may be absent; when present it must be an array of strings.
    fn optional_str_array(&mut self, obj: &serde_json::Map<String, Value>, base: &str, key: &str) {
        let Some(v) = obj.get(key) else { return };
        let path = join(base, key);
        match v.as_array() {
            None => self.push(&path, "must be an array"),
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    if !item.is_string() {
                        self.push(&format!("{path}[{i}]"), "must be a string");
                    }
                }
            }
        }
    }

    fn config(&mut self, candidate: &Value) {
        let Some(obj) = candidate.as_object() else {
            self.push("config", "must be an object");
            return;
        };

        match obj.get("site") {
            Some(Value::Object(site)) => {
                self.required_str(site, "site", "title");
                self.required_str(site, "site", "description");
            }
            Some(_) => self.push("site", "must be an object"),
            None => self.push("site", "is required"),
        }
        if self.stopped() {
            return;
        }

        match obj.get("menuItems") {
            Some(Value::Array(items)) => {
                for (i, item) in items.iter().enumerate() {
                    self.menu_item(item, &format!("menuItems[{i}]"));
                    if self.stopped() {
                        return;
                    }
                }
            }
            Some(_) => self.push("menuItems", "must be an array"),
            None => self.push("menuItems", "is required"),
        }
    }

    fn menu_item(&mut self, item: &Value, path: &str) {
        let Some(obj) = item.as_object() else {
            self.push(path, "must be an object");
            return;
        };
        self.required_str(obj, path, "name");
        self.required_str(obj, path, "href");
        self.required_str(obj, path, "icon");
        if self.stopped() {
            return;
        }

        match obj.get("type").and_then(Value::as_str) {
            Some("single") => match obj.get("sites") {
                Some(Value::Array(sites)) => self.sites(sites, path),
                _ => self.push(&join(path, "sites"), "single menu items need a sites array"),
            },
            Some("tabs") => match obj.get("submenu") {
                Some(Value::Array(subs)) => {
                    for (i, sub) in subs.iter().enumerate() {
                        self.sub_menu_item(sub, &format!("{path}.submenu[{i}]"));
                        if self.stopped() {
                            return;
                        }
                    }
                }
                _ => self.push(&join(path, "submenu"), "tabs menu items need a submenu array"),
            },
            _ => self.push(&join(path, "type"), "must be 'single' or 'tabs'"),
        }
    }

    fn sub_menu_item(&mut self, item: &Value, path: &str) {
        let Some(obj) = item.as_object() else {
            self.push(path, "must be an object");
            return;
        };
        self.required_str(obj, path, "name");
        self.required_str(obj, path, "href");
        self.required_str(obj, path, "icon");
        if self.stopped() {
            return;
        }
        match obj.get("sites") {
            Some(Value::Array(sites)) => self.sites(sites, path),
            _ => self.push(&join(path, "sites"), "must be an array"),
        }
    }

    fn sites(&mut self, sites: &[Value], parent: &str) {
        let base = join(parent, "sites");
        for (i, site) in sites.iter().enumerate() {
            self.site(site, &format!("{base}[{i}]"));
            if self.stopped() {
                return;
            }
        }
    }

    fn site(&mut self, site: &Value, path: &str) {
        let Some(obj) = site.as_object() else {
            self.push(path, "must be an object");
            return;
        };
        self.required_str(obj, path, "title");
        self.required_str(obj, path, "description");
        self.optional_str(obj, path, "url");
        self.optional_str(obj, path, "logo");
        self.optional_str_array(obj, path, "advantages");
        self.optional_str_array(obj, path, "features");
    }
}

fn join(base: &str, key: &str) -> String {
    if base.is_empty() {
        key.to_string()
    } else {
        format!("{base}.{key}")
    }
}

/// Validate a full traditional config, failing on the first violation.
pub fn validate_config(candidate: &Value) -> Result<(), ConfigInvalid> {
    let mut checker = Checker::new(true);
    checker.config(candidate);
    checker.into_result()
}

/// Validate one menu item. `index` only affects the reported path.
pub fn validate_menu_item(item: &Value, index: Option<usize>) -> Result<(), ConfigInvalid> {
    let path = match index {
        Some(i) => format!("menuItems[{i}]"),
        None => "menuItem".to_string(),
    };
    let mut checker = Checker::new(true);
    checker.menu_item(item, &path);
    checker.into_result()
}

/// Validate one submenu entry; `path` prefixes reported fields.
pub fn validate_sub_menu_item(item: &Value, path: &str) -> Result<(), ConfigInvalid> {
    let mut checker = Checker::new(true);
    checker.sub_menu_item(item, path);
    checker.into_result()
}

/// Validate one site; `path` prefixes reported fields.
pub fn validate_site(site: &Value, path: &str) -> Result<(), ConfigInvalid> {
    let mut checker = Checker::new(true);
    checker.site(site, path);
    checker.into_result()
}

/// Collect every violation, then deserialize into a typed config.
pub fn check_config(candidate: &Value) -> Result<SiteConfig, ValidationErrors> {
    let mut checker = Checker::new(false);
    checker.config(candidate);
    if !checker.errors.is_empty() {
        return Err(ValidationErrors(checker.errors));
    }
    serde_json::from_value(candidate.clone())
        .map_err(|e| ValidationErrors(vec![ConfigInvalid::new("config", e.to_string())]))
}

/// Shape check for a fetched `/categories/{index}.json` chunk.
pub fn validate_category_data(candidate: &Value) -> Result<(), ConfigInvalid> {
    let mut checker = Checker::new(true);
    let Some(obj) = candidate.as_object() else {
        return Err(ConfigInvalid::new("category", "must be an object"));
    };
    if !obj.get("categoryIndex").is_some_and(Value::is_u64) {
        checker.push("categoryIndex", "must be a non-negative integer");
    }
    if !obj.get("categoryName").is_some_and(Value::is_string) {
        checker.push("categoryName", "must be a string");
    }
    match obj.get("sites") {
        Some(Value::Array(sites)) => checker.sites(sites, ""),
        _ => checker.push("sites", "must be an array"),
    }
    if !obj.get("metadata").is_some_and(Value::is_object) {
        checker.push("metadata", "must be an object");
    }
    checker.into_result()
}

/// True if `url` parses as an absolute URL.
pub fn validate_url(url: &str) -> bool {
    reqwest::Url::parse(url).is_ok()
}

/// Looser check for site links: absolute http(s) URLs, absolute paths and
/// in-page anchors are accepted.
pub fn validate_site_url(url: &str) -> bool {
    if url.starts_with("http://") || url.starts_with("https://") {
        return validate_url(url);
    }
    url.starts_with('/') || url.starts_with('#')
}
