//! # Command Parser Module
//!
//! Extracts a structured inventory update from a free-text Italian command
//! such as `"Aggiungi 2 kg di pasta a 3€"`.
//!
//! ## Passes
//!
//! The parser runs a fixed sequence of independent passes over the
//! lower-cased text. Order matters: currency amounts are removed before the
//! quantity pass so that a price is never read as a quantity.
//!
//! 1. Strip the leading `aggiungi` verb
//! 2. Currency: the first amount next to `€`, `$`, `euro`, `dollaro`, `usd`
//!    or `eur` becomes the price; every currency mention is removed
//! 3. Quantity: a number followed by a unit word, or else a bare leading number
//! 4. Name: whatever remains, without articles and partitives
//!
//! Parsing never fails. An empty name or a non-positive quantity is rejected
//! by [`validate_command`], which is a separate step.

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::command_patterns::{
    ADD_PREFIX_REGEX, ARTICLE_REGEX, CURRENCY_REGEX, ELIDED_ARTICLE_REGEX, LEADING_NUMBER_REGEX,
    QUANTITY_UNIT_REGEX, TRAILING_CONNECTOR_REGEX,
};
use crate::inventory::InventoryItem;

/// Unit assigned when the command names no unit
pub const DEFAULT_UNIT: &str = "pz";

/// Category given to items added through a text command
pub const CHAT_CATEGORY: &str = "Aggiunto via chat";

/// Result of parsing a text command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedCommand {
    /// Parsed quantity, 0 when none was found
    pub quantity: f64,
    /// Unit word as written (e.g. "kg", "grammi"), "pz" by default
    pub unit: String,
    /// Item name with articles removed, possibly empty
    pub name: String,
    /// First currency amount found, 0 when none
    pub price: f64,
}

/// Reasons a parsed command cannot be applied to the inventory
#[derive(Debug, Clone, PartialEq)]
pub enum CommandError {
    /// Nothing was left to use as an item name
    MissingName,
    /// Quantity is zero or negative
    InvalidQuantity(f64),
}

impl CommandError {
    /// Localization key for the user-facing message
    pub fn message_key(&self) -> &'static str {
        match self {
            CommandError::MissingName => "command-missing-name",
            CommandError::InvalidQuantity(_) => "command-invalid-quantity",
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::MissingName => write!(f, "No item name in command"),
            CommandError::InvalidQuantity(qty) => write!(f, "Invalid quantity: {qty}"),
        }
    }
}

impl std::error::Error for CommandError {}

/// Parse a free-text inventory command.
///
/// # Examples
///
/// ```rust
/// use chefcode::command_parser::parse_command;
///
/// let parsed = parse_command("Aggiungi 2 kg di pasta a 3€");
/// assert_eq!(parsed.quantity, 2.0);
/// assert_eq!(parsed.unit, "kg");
/// assert_eq!(parsed.name, "pasta");
/// assert_eq!(parsed.price, 3.0);
/// ```
pub fn parse_command(text: &str) -> ParsedCommand {
    let lowered = text.trim().to_lowercase();
    let working = ADD_PREFIX_REGEX.replace(&lowered, "").trim().to_string();
    debug!("Parsing command: '{}'", working);

    let (price, working) = extract_price(&working);
    let (quantity, unit, working) = extract_quantity(&working);
    let name = clean_name(&working);

    trace!(
        "Parsed command: quantity={}, unit='{}', name='{}', price={}",
        quantity,
        unit,
        name,
        price
    );

    ParsedCommand {
        quantity,
        unit,
        name,
        price,
    }
}

/// Check a parsed command and turn it into an inventory row.
///
/// # Errors
///
/// - [`CommandError::MissingName`] when the name is empty
/// - [`CommandError::InvalidQuantity`] when the quantity is not positive
pub fn validate_command(parsed: &ParsedCommand) -> Result<InventoryItem, CommandError> {
    if parsed.name.trim().is_empty() {
        return Err(CommandError::MissingName);
    }
    if parsed.quantity.is_nan() || parsed.quantity <= 0.0 {
        return Err(CommandError::InvalidQuantity(parsed.quantity));
    }

    Ok(InventoryItem {
        name: parsed.name.clone(),
        unit: parsed.unit.clone(),
        quantity: parsed.quantity,
        category: CHAT_CATEGORY.to_string(),
        price: parsed.price,
    })
}

/// Parse a number that may use a decimal comma
fn parse_decimal(raw: &str) -> f64 {
    raw.replace(',', ".").parse().unwrap_or(0.0)
}

/// Currency pass: first amount wins, all mentions are removed
fn extract_price(text: &str) -> (f64, String) {
    let price = CURRENCY_REGEX
        .captures(text)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|amount| parse_decimal(amount.as_str()))
        .unwrap_or(0.0);

    if price > 0.0 {
        debug!("Found price {} in '{}'", price, text);
    }

    let remaining = CURRENCY_REGEX.replace_all(text, " ").trim().to_string();
    (price, remaining)
}

/// Quantity pass: number + unit word, falling back to a bare leading number
fn extract_quantity(text: &str) -> (f64, String, String) {
    if let Some(caps) = QUANTITY_UNIT_REGEX.captures(text) {
        let (Some(whole), Some(amount), Some(unit)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            return (0.0, DEFAULT_UNIT.to_string(), text.to_string());
        };
        let remaining = format!("{} {}", &text[..whole.start()], &text[whole.end()..]);
        return (
            parse_decimal(amount.as_str()),
            unit.as_str().to_string(),
            remaining.trim().to_string(),
        );
    }

    if let Some(caps) = LEADING_NUMBER_REGEX.captures(text) {
        if let (Some(whole), Some(amount)) = (caps.get(0), caps.get(1)) {
            debug!("No unit in '{}', using bare quantity", text);
            return (
                parse_decimal(amount.as_str()),
                DEFAULT_UNIT.to_string(),
                text[whole.end()..].trim().to_string(),
            );
        }
    }

    (0.0, DEFAULT_UNIT.to_string(), text.to_string())
}

/// Name pass: drop articles and the dangling price connector
fn clean_name(text: &str) -> String {
    let without_elided = ELIDED_ARTICLE_REGEX.replace_all(text, " ");
    let without_articles = ARTICLE_REGEX.replace_all(&without_elided, " ");
    let collapsed = without_articles
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ");
    TRAILING_CONNECTOR_REGEX
        .replace(&collapsed, "")
        .trim()
        .to_string()
}
