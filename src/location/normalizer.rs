use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationKind {
    Box,
    Shelf,
    /// Free-form key kept verbatim because it matched neither pattern.
    Other,
}

fn shelf_regex() -> &'static Regex {
    static SHELF: OnceLock<Regex> = OnceLock::new();
    SHELF.get_or_init(|| Regex::new(r"^(?:SHELF|S)\s*(\d+)([A-Z]*)$").expect("valid shelf regex"))
}

fn digits_regex() -> &'static Regex {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    DIGITS.get_or_init(|| Regex::new(r"\d+").expect("valid digit-run regex"))
}

/// `"s 2c"`, `"Shelf2C"` -> `"SHELF 2C"`. Input is upper-cased before matching.
pub fn normalize_shelf(text: &str) -> Option<String> {
    let upper = text.trim().to_uppercase();
    let caps = shelf_regex().captures(&upper)?;
    Some(format!("SHELF {}{}", &caps[1], &caps[2]))
}

/// Uses the first run of digits anywhere in the text: `"b42"` -> `"BOX042"`.
pub fn normalize_box(text: &str) -> Option<String> {
    let found = digits_regex().find(text)?;
    Some(box_key(found.as_str()))
}

pub(crate) fn box_key(digits: &str) -> String {
    let trimmed = digits.trim_start_matches('0');
    let number = if trimmed.is_empty() { "0" } else { trimmed };
    format!("BOX{number:0>3}")
}

/// Shelf pattern first, then box number, then the upper-cased input itself.
/// Only blank input yields `None`.
pub fn normalize_location(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    normalize_shelf(trimmed)
        .or_else(|| normalize_box(trimmed))
        .or_else(|| Some(trimmed.to_uppercase()))
}

pub fn is_shelf_key(text: &str) -> bool {
    normalize_shelf(text).is_some()
}

pub fn location_kind(key: &str) -> LocationKind {
    if is_shelf_key(key) {
        LocationKind::Shelf
    } else if normalize_box(key).is_some() {
        LocationKind::Box
    } else {
        LocationKind::Other
    }
}
