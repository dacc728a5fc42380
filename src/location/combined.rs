use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::normalizer::box_key;

/// A location the operator named: a box or shelf, optionally with the shelf
/// the box sits on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationIntent {
    pub primary: String,
    pub secondary: Option<String>,
}

fn shelf_token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| {
        Regex::new(r"\b(?:SHELF|S)\s*(\d+)([A-Z]*)\b").expect("valid shelf token regex")
    })
}

fn box_token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"\b(?:BOX|B)?\s*(\d+)\b").expect("valid box token regex"))
}

/// Parses text such as `"42 shelf 2C"` that may carry a box and a shelf.
///
/// Anything left over once the tokens are removed means the text is an item
/// name rather than a location, and the parse fails.
pub fn parse_combined(text: &str) -> Option<LocationIntent> {
    let mut rest = text.trim().to_uppercase();
    if rest.is_empty() {
        return None;
    }

    let shelf = shelf_token_regex().captures(&rest).map(|caps| {
        let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
        (format!("SHELF {}{}", &caps[1], &caps[2]), whole)
    });
    if let Some((_, range)) = &shelf {
        rest.replace_range(range.clone(), " ");
    }

    let boxed = box_token_regex().captures(&rest).map(|caps| {
        let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
        (box_key(&caps[1]), whole)
    });
    if let Some((_, range)) = &boxed {
        rest.replace_range(range.clone(), " ");
    }

    if !rest.trim().is_empty() {
        return None;
    }

    match (boxed, shelf) {
        (Some((box_key, _)), shelf) => Some(LocationIntent {
            primary: box_key,
            secondary: shelf.map(|(key, _)| key),
        }),
        (None, Some((shelf_key, _))) => Some(LocationIntent {
            primary: shelf_key,
            secondary: None,
        }),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_and_shelf_together() {
        let intent = parse_combined("42 shelf 2C").unwrap();
        assert_eq!(intent.primary, "BOX042");
        assert_eq!(intent.secondary.as_deref(), Some("SHELF 2C"));

        let intent = parse_combined("S3 box 7").unwrap();
        assert_eq!(intent.primary, "BOX007");
        assert_eq!(intent.secondary.as_deref(), Some("SHELF 3"));
    }

    #[test]
    fn single_locations() {
        assert_eq!(
            parse_combined("box 5"),
            Some(LocationIntent {
                primary: "BOX005".into(),
                secondary: None
            })
        );
        assert_eq!(
            parse_combined("shelf 1a"),
            Some(LocationIntent {
                primary: "SHELF 1A".into(),
                secondary: None
            })
        );
    }

    #[test]
    fn leftover_words_mean_an_item_name() {
        assert_eq!(parse_combined("batteries 4"), None);
        assert_eq!(parse_combined("box 4 kitchen"), None);
        assert_eq!(parse_combined("hammer"), None);
        assert_eq!(parse_combined("  "), None);
    }
}
