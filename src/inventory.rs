//! # Inventory Module
//!
//! Inventory rows and the reconciler that folds incoming items into them.
//!
//! ## Row identity
//!
//! Two rows describe the same stock when their normalized names and their
//! prices rounded to cents are equal. The same product bought at two prices
//! is two rows.
//!
//! ## Merge policy
//!
//! - No row with the same identity: the incoming item is appended
//! - Same identity, convertible units: the quantity is converted into the
//!   existing row's unit and added; the row keeps its unit and category
//!   (a row without a unit takes the incoming one)
//! - Same identity, incompatible units: a separate row is appended
//!
//! Only the first matching row is ever considered.

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::units::conversion_factor;

/// Category used when neither the incoming item nor its twin row has one
pub const DEFAULT_CATEGORY: &str = "Other";

lazy_static! {
    static ref NON_ALPHANUMERIC_REGEX: Regex =
        Regex::new(r"[^a-z0-9]+").expect("Non-alphanumeric pattern should be valid");
}

/// A stocked product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Display name as entered
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    /// Unit of `quantity` (e.g. "kg", "pz")
    #[serde(default, deserialize_with = "lenient_string")]
    pub unit: String,
    /// Stocked amount, never negative after a deduction
    #[serde(default, deserialize_with = "lenient_number")]
    pub quantity: f64,
    /// Free-form grouping shown in the inventory view
    #[serde(default, deserialize_with = "lenient_string")]
    pub category: String,
    /// Unit price in euro
    #[serde(default, deserialize_with = "lenient_number")]
    pub price: f64,
}

impl InventoryItem {
    pub fn new(name: &str, quantity: f64, unit: &str) -> Self {
        Self {
            name: name.to_string(),
            unit: unit.to_string(),
            quantity,
            category: String::new(),
            price: 0.0,
        }
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }

    /// Stock value of the row (quantity times unit price)
    pub fn value(&self) -> f64 {
        self.quantity * self.price
    }

    fn same_identity(&self, normalized_name: &str, cents: i64) -> bool {
        normalize_name(&self.name) == normalized_name && price_cents(self.price) == cents
    }
}

/// Partial update of the row with a given name; `None` fields stay untouched
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InventoryPatch {
    pub name: String,
    pub unit: Option<String>,
    #[serde(default, deserialize_with = "lenient_optional_number")]
    pub quantity: Option<f64>,
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient_optional_number")]
    pub price: Option<f64>,
}

/// What [`merge_item`] did with the incoming item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No row with the same identity existed; a new row was appended at this index
    Appended(usize),
    /// Quantity was added to the row at this index
    Merged(usize),
    /// A row with the same identity had an incompatible unit; a new row was appended
    AppendedIncompatible(usize),
}

impl MergeOutcome {
    /// Index of the row that now holds the incoming quantity
    pub fn index(&self) -> usize {
        match self {
            MergeOutcome::Appended(i)
            | MergeOutcome::Merged(i)
            | MergeOutcome::AppendedIncompatible(i) => *i,
        }
    }
}

/// Normalize an item name for identity comparisons.
///
/// Lower-cases, strips diacritics, turns every run of non-alphanumeric
/// characters into one space and trims.
///
/// ```rust
/// use chefcode::inventory::normalize_name;
///
/// assert_eq!(normalize_name("  Caffè   Crème!"), "caffe creme");
/// assert_eq!(normalize_name("Olio-Extra_Vergine"), "olio extra vergine");
/// ```
pub fn normalize_name(name: &str) -> String {
    let folded: String = name
        .to_lowercase()
        .nfd()
        .filter(|c| !('\u{0300}'..='\u{036f}').contains(c))
        .collect();
    NON_ALPHANUMERIC_REGEX
        .replace_all(&folded, " ")
        .trim()
        .to_string()
}

/// Price rounded to whole cents
pub fn price_cents(price: f64) -> i64 {
    // NaN and infinities saturate through `as`; NaN becomes 0
    (price * 100.0).round() as i64
}

/// Fold an incoming item into the inventory.
///
/// See the module documentation for the policy. An empty incoming unit is
/// read as the matched row's unit; a matched row without a unit takes the
/// incoming one.
pub fn merge_item(inventory: &mut Vec<InventoryItem>, incoming: InventoryItem) -> MergeOutcome {
    let normalized = normalize_name(&incoming.name);
    let cents = price_cents(incoming.price);

    let Some(index) = inventory
        .iter()
        .position(|row| row.same_identity(&normalized, cents))
    else {
        debug!("Appending new inventory row '{}'", incoming.name);
        inventory.push(incoming);
        return MergeOutcome::Appended(inventory.len() - 1);
    };

    let row = &mut inventory[index];
    let from_unit = if incoming.unit.trim().is_empty() {
        row.unit.clone()
    } else {
        incoming.unit.clone()
    };
    let to_unit = if row.unit.trim().is_empty() {
        from_unit.clone()
    } else {
        row.unit.clone()
    };

    match conversion_factor(&from_unit, &to_unit) {
        Some(factor) => {
            if row.unit.trim().is_empty() {
                row.unit = to_unit;
            }
            row.quantity += incoming.quantity * factor;
            debug!(
                "Merged {} {} into '{}' (now {} {})",
                incoming.quantity, from_unit, row.name, row.quantity, row.unit
            );
            MergeOutcome::Merged(index)
        }
        None => {
            debug!(
                "Units '{}' and '{}' are incompatible, keeping '{}' as a separate row",
                from_unit, to_unit, incoming.name
            );
            let category = if incoming.category.trim().is_empty() {
                if row.category.trim().is_empty() {
                    DEFAULT_CATEGORY.to_string()
                } else {
                    row.category.clone()
                }
            } else {
                incoming.category
            };
            inventory.push(InventoryItem {
                category,
                ..incoming
            });
            MergeOutcome::AppendedIncompatible(inventory.len() - 1)
        }
    }
}

/// Apply a patch to the first row whose name equals `patch.name` exactly.
///
/// Returns `false` when no row has that name.
pub fn update_item(inventory: &mut [InventoryItem], patch: InventoryPatch) -> bool {
    let Some(row) = inventory.iter_mut().find(|row| row.name == patch.name) else {
        return false;
    };

    if let Some(unit) = patch.unit {
        row.unit = unit;
    }
    if let Some(quantity) = patch.quantity {
        row.quantity = quantity.max(0.0);
    }
    if let Some(category) = patch.category {
        row.category = category;
    }
    if let Some(price) = patch.price {
        row.price = price;
    }
    true
}

/// Remove every row whose name equals `name` exactly; returns how many were removed
pub fn remove_items(inventory: &mut Vec<InventoryItem>, name: &str) -> usize {
    let before = inventory.len();
    inventory.retain(|row| row.name != name);
    before - inventory.len()
}

/// Total stock value of the inventory
pub fn total_value(inventory: &[InventoryItem]) -> f64 {
    inventory.iter().map(InventoryItem::value).sum()
}

/// Deserialize a number that the web client may send as a number, a numeric
/// string (decimal comma allowed) or `null`; anything unreadable becomes 0
pub(crate) fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(read_number(value).unwrap_or(0.0))
}

/// Like [`lenient_number`] for patch fields: anything unreadable leaves the field untouched
fn lenient_optional_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(read_number(value))
}

fn read_number(value: Option<serde_json::Value>) -> Option<f64> {
    let number = match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

/// Deserialize a string that may be missing or `null`; numbers are stringified
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}
