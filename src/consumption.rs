//! # Recipe Consumption Module
//!
//! Deducts the ingredients of a produced recipe from the inventory.
//!
//! Ingredients are matched to inventory rows by normalized name only (price
//! plays no part here), first match wins. An ingredient that cannot be
//! deducted is recorded in the report's skip list and the remaining
//! ingredients are still processed. Stock never goes below zero.
//!
//! [`consume`] keeps no record of what it already deducted: calling it twice
//! for the same production deducts twice. Callers that need exactly-once
//! semantics go through [`crate::tasks::TaskBoard`].

use log::{debug, warn};
use std::fmt;

use crate::inventory::{normalize_name, InventoryItem};
use crate::recipes::RecipeBook;
use crate::units::{conversion_factor, normalize_unit};

/// Outcome of a consumption run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsumptionReport {
    /// Ingredients that could not be deducted, with the reason
    pub skipped: Vec<String>,
    /// Number of inventory rows that were decremented
    pub deducted: usize,
}

impl ConsumptionReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConsumptionError {
    /// No recipe with this name; nothing was deducted
    RecipeNotFound(String),
}

impl fmt::Display for ConsumptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsumptionError::RecipeNotFound(name) => write!(f, "Recipe not found: {name}"),
        }
    }
}

impl std::error::Error for ConsumptionError {}

/// Batch count actually applied: anything non-positive or non-finite counts as one batch
pub fn effective_batches(batches: f64) -> f64 {
    if batches.is_finite() && batches > 0.0 {
        batches
    } else {
        1.0
    }
}

/// Deduct `batches` times the ingredients of `recipe_name` from `inventory`.
///
/// # Errors
///
/// Returns [`ConsumptionError::RecipeNotFound`] without touching the
/// inventory when the recipe does not exist. Missing rows and incompatible
/// units are not errors; they end up in [`ConsumptionReport::skipped`].
pub fn consume(
    inventory: &mut [InventoryItem],
    recipes: &RecipeBook,
    recipe_name: &str,
    batches: f64,
) -> Result<ConsumptionReport, ConsumptionError> {
    let recipe = recipes
        .get(recipe_name)
        .ok_or_else(|| ConsumptionError::RecipeNotFound(recipe_name.to_string()))?;

    let batches = effective_batches(batches);
    let mut report = ConsumptionReport::default();

    for ingredient in &recipe.items {
        let wanted = normalize_name(&ingredient.name);
        let Some(row) = inventory
            .iter_mut()
            .find(|row| normalize_name(&row.name) == wanted)
        else {
            report
                .skipped
                .push(format!("{} (not in inventory)", ingredient.name));
            continue;
        };

        let inventory_unit = normalize_unit(&row.unit);
        let ingredient_unit = if ingredient.unit.trim().is_empty() {
            inventory_unit.clone()
        } else {
            normalize_unit(&ingredient.unit)
        };

        let Some(factor) = conversion_factor(&ingredient_unit, &inventory_unit) else {
            report.skipped.push(format!(
                "{} ({}→{} incompatible)",
                ingredient.name, ingredient_unit, inventory_unit
            ));
            continue;
        };

        let amount = ingredient.qty * batches * factor;
        row.quantity = (row.quantity - amount).max(0.0);
        report.deducted += 1;
        debug!(
            "Consumed {} {} of '{}' for {} x '{}'",
            amount, row.unit, row.name, batches, recipe_name
        );
    }

    if !report.skipped.is_empty() {
        warn!(
            "Ingredients not deducted for '{}': {}",
            recipe_name,
            report.skipped.join(", ")
        );
    }

    Ok(report)
}
