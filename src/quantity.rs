use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedQuantity {
    pub name: String,
    pub qty: u32,
}

fn times_suffix_regex() -> &'static Regex {
    static SUFFIX: OnceLock<Regex> = OnceLock::new();
    SUFFIX.get_or_init(|| Regex::new(r"^(.*?)\s+[xX](\d+)$").expect("valid x-suffix regex"))
}

fn paren_suffix_regex() -> &'static Regex {
    static SUFFIX: OnceLock<Regex> = OnceLock::new();
    SUFFIX.get_or_init(|| Regex::new(r"^(.*?)\s*\((\d+)\)$").expect("valid paren-suffix regex"))
}

/// Splits a trailing quantity off an item description.
///
/// `"batteries x3"` and `"widget (4)"` carry explicit quantities; anything
/// else is a single item. Never fails.
pub fn parse_quantity(text: &str) -> ParsedQuantity {
    let trimmed = text.trim();

    for regex in [times_suffix_regex(), paren_suffix_regex()] {
        if let Some(caps) = regex.captures(trimmed) {
            let qty = caps[2].parse::<u32>().unwrap_or(1).max(1);
            return ParsedQuantity {
                name: caps[1].trim().to_string(),
                qty,
            };
        }
    }

    ParsedQuantity {
        name: trimmed.to_string(),
        qty: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(name: &str, qty: u32) -> ParsedQuantity {
        ParsedQuantity {
            name: name.into(),
            qty,
        }
    }

    #[test]
    fn trailing_quantities() {
        assert_eq!(parse_quantity("batteries x3"), parsed("batteries", 3));
        assert_eq!(parse_quantity("Batteries X12 "), parsed("Batteries", 12));
        assert_eq!(parse_quantity("widget (4)"), parsed("widget", 4));
        assert_eq!(parse_quantity("widget(4)"), parsed("widget", 4));
    }

    #[test]
    fn plain_names_default_to_one() {
        assert_eq!(parse_quantity("pen"), parsed("pen", 1));
        assert_eq!(parse_quantity("  xbox controller "), parsed("xbox controller", 1));
        assert_eq!(parse_quantity("box x"), parsed("box x", 1));
        assert_eq!(parse_quantity(""), parsed("", 1));
    }

    #[test]
    fn zero_and_overflow_clamp_to_one() {
        assert_eq!(parse_quantity("cups x0"), parsed("cups", 1));
        assert_eq!(parse_quantity("cups (99999999999999)"), parsed("cups", 1));
    }
}
