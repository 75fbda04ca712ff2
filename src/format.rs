//! Pure string helpers shared by the validator, optimizer, table importer
//! and renderer. No shared state except the id counter.

use chrono::{DateTime, TimeZone};
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};

/// Normalize a user-entered URL.
///
/// Trims whitespace and prefixes `https://` onto bare host-like strings.
/// Absolute paths, protocol-relative URLs (both start with `/`) and URLs
/// that already carry `http://` or `https://` are left alone.
pub fn format_url(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() {
        return String::new();
    }
    if url.starts_with("http://") || url.starts_with("https://") || url.starts_with('/') {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

/// CJK unified ideographs kept by [`generate_slug`].
fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fa5}').contains(&c)
}

/// URL-friendly slug.
///
/// - `"Hello World"` → `"hello-world"`
/// - `"hello_world"` → `"hello-world"`
/// - `"hello@world!test"` → `"helloworldtest"`
/// - `"你好 世界"` → `"你好-世界"`
pub fn generate_slug(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    let mut in_separator = false;

    for c in lowered.chars() {
        if c.is_whitespace() || c == '_' || c == '-' {
            in_separator = true;
            continue;
        }
        if !(c.is_ascii_alphanumeric() || is_cjk(c)) {
            continue;
        }
        if in_separator && !slug.is_empty() {
            slug.push('-');
        }
        in_separator = false;
        slug.push(c);
    }
    slug
}

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Process-unique id of the form `{prefix}-{time}-{seq}`, both parts base36.
pub fn generate_id(prefix: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
    let seq = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{}", to_base36(millis), to_base36(seq + 36 * 36))
}

/// Human-readable byte size using 1024-based units, at most two decimals.
///
/// `0` → `"0 B"`, `1536` → `"1.5 KB"`, `2.5 MiB` → `"2.5 MB"`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}

/// Truncate to `max_chars` characters including `suffix`.
pub fn truncate_text(text: &str, max_chars: usize, suffix: &str) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(suffix.chars().count());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(suffix);
    out
}

/// Escape the five HTML-reserved characters.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Trim and drop angle brackets from free-form input.
pub fn sanitize_input(input: &str) -> String {
    input.trim().chars().filter(|c| !matches!(c, '<' | '>')).collect()
}

/// Split a `;`-delimited cell, trimming segments and dropping empty ones.
pub fn split_by_semicolon(text: &str) -> Vec<String> {
    text.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Inverse of [`split_by_semicolon`]: blank items are skipped.
pub fn join_with_semicolon<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(AsRef::as_ref)
        .filter(|s| !s.trim().is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

/// `2024/01/15`
pub fn format_date<Tz: TimeZone>(date: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    date.format("%Y/%m/%d").to_string()
}

/// `2024/01/15 10:30:00`
pub fn format_date_time<Tz: TimeZone>(date: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    date.format("%Y/%m/%d %H:%M:%S").to_string()
}
