//! # Command Patterns Module
//!
//! This module contains the regex patterns used by the command parser.
//! Patterns run against lower-cased input.

use lazy_static::lazy_static;
use regex::Regex;

/// Leading "add" verb of an inventory command
pub const ADD_PREFIX_PATTERN: &str = r"^aggiungi\s+";

/// Currency amount, currency before or after the number, with the price
/// connector ("a 3€", "per 2 euro") that introduces it.
/// Group 1 holds the number when the symbol comes first, group 2 otherwise.
pub const CURRENCY_PATTERN: &str = r"(?:\b(?:a|al|per)\s+)?(?:(?:€|\$|euro|dollaro|usd|eur)\s*(\d+(?:[.,]\d+)?)|(\d+(?:[.,]\d+)?)\s*(?:€|\$|euro|dollaro|usd|eur))";

/// Number immediately followed by a unit word (longest words first)
pub const QUANTITY_UNIT_PATTERN: &str = r"(\d+(?:[.,]\d+)?)\s*(kilogrammi|millilitri|confezioni|bottiglie|lattine|grammi|litri|pezzi|pcs|kg|lt|ml|pz|g|l)\b";

/// Bare number at the start of the text
pub const LEADING_NUMBER_PATTERN: &str = r"^(\d+(?:[.,]\d+)?)(?:\s+|$)";

/// Italian articles and partitives, as whole words
pub const ARTICLE_PATTERN: &str = r"\b(?:di|del|della|dei|degli|delle|il|la|lo|gli|le|un|una|uno)\b";

/// Elided articles such as "l'olio" or "dell'acqua"
pub const ELIDED_ARTICLE_PATTERN: &str = r"\b(?:l|dell|dall|nell|all|sull|un)'";

/// Price connector left dangling at the end of the name once the amount is removed
pub const TRAILING_CONNECTOR_PATTERN: &str = r"(?:\s+|^)(?:a|al|per)$";

lazy_static! {
    pub static ref ADD_PREFIX_REGEX: Regex =
        Regex::new(ADD_PREFIX_PATTERN).expect("Add prefix pattern should be valid");
    pub static ref CURRENCY_REGEX: Regex =
        Regex::new(CURRENCY_PATTERN).expect("Currency pattern should be valid");
    pub static ref QUANTITY_UNIT_REGEX: Regex =
        Regex::new(QUANTITY_UNIT_PATTERN).expect("Quantity/unit pattern should be valid");
    pub static ref LEADING_NUMBER_REGEX: Regex =
        Regex::new(LEADING_NUMBER_PATTERN).expect("Leading number pattern should be valid");
    pub static ref ARTICLE_REGEX: Regex =
        Regex::new(ARTICLE_PATTERN).expect("Article pattern should be valid");
    pub static ref ELIDED_ARTICLE_REGEX: Regex =
        Regex::new(ELIDED_ARTICLE_PATTERN).expect("Elided article pattern should be valid");
    pub static ref TRAILING_CONNECTOR_REGEX: Regex =
        Regex::new(TRAILING_CONNECTOR_PATTERN).expect("Trailing connector pattern should be valid");
}
