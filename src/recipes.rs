//! # Recipe Module
//!
//! Recipes are stored by name. Each one lists the ingredients needed for a
//! single batch.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::inventory::{lenient_number, lenient_string};

/// Maximum length accepted for a recipe name
pub const MAX_RECIPE_NAME_LENGTH: usize = 255;

/// One ingredient line of a recipe, quantity per batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeIngredient {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub qty: f64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub unit: String,
}

impl RecipeIngredient {
    pub fn new(name: &str, qty: f64, unit: &str) -> Self {
        Self {
            name: name.to_string(),
            qty,
            unit: unit.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(default)]
    pub items: Vec<RecipeIngredient>,
}

impl Recipe {
    pub fn new(items: Vec<RecipeIngredient>) -> Self {
        Self { items }
    }
}

/// Recipes keyed by name
pub type RecipeBook = BTreeMap<String, Recipe>;

/// Validation failures for a recipe about to be saved
#[derive(Debug, Clone, PartialEq)]
pub enum RecipeError {
    EmptyName,
    NameTooLong(usize),
    NoIngredients,
    /// Ingredient at a 1-based position is unusable, with the reason
    InvalidIngredient(usize, &'static str),
}

impl fmt::Display for RecipeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecipeError::EmptyName => write!(f, "Recipe name is required"),
            RecipeError::NameTooLong(len) => write!(
                f,
                "Recipe name is too long ({len} > {MAX_RECIPE_NAME_LENGTH})"
            ),
            RecipeError::NoIngredients => write!(f, "Recipe needs at least one ingredient"),
            RecipeError::InvalidIngredient(position, reason) => {
                write!(f, "Ingredient {position}: {reason}")
            }
        }
    }
}

impl std::error::Error for RecipeError {}

/// Validate a recipe before saving it; returns the trimmed name
pub fn validate_recipe(name: &str, recipe: &Recipe) -> Result<String, RecipeError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(RecipeError::EmptyName);
    }
    if trimmed.len() > MAX_RECIPE_NAME_LENGTH {
        return Err(RecipeError::NameTooLong(trimmed.len()));
    }
    if recipe.items.is_empty() {
        return Err(RecipeError::NoIngredients);
    }

    for (i, item) in recipe.items.iter().enumerate() {
        let reason = if item.name.trim().is_empty() {
            Some("name is required")
        } else if item.qty.is_nan() || item.qty <= 0.0 {
            Some("quantity must be greater than 0")
        } else if item.unit.trim().is_empty() {
            Some("unit is required")
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(RecipeError::InvalidIngredient(i + 1, reason));
        }
    }

    Ok(trimmed.to_string())
}

/// Validate and store a recipe, replacing any recipe with the same name
pub fn save_recipe(book: &mut RecipeBook, name: &str, recipe: Recipe) -> Result<String, RecipeError> {
    let name = validate_recipe(name, &recipe)?;
    book.insert(name.clone(), recipe);
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn carbonara() -> Recipe {
        Recipe::new(vec![
            RecipeIngredient::new("Spaghetti", 0.1, "kg"),
            RecipeIngredient::new("Guanciale", 40.0, "g"),
        ])
    }

    #[test]
    fn test_valid_recipe() {
        assert_eq!(validate_recipe("  Carbonara ", &carbonara()), Ok("Carbonara".to_string()));
    }

    #[test]
    fn test_invalid_recipes() {
        assert_eq!(validate_recipe("   ", &carbonara()), Err(RecipeError::EmptyName));
        assert_eq!(
            validate_recipe(&"a".repeat(256), &carbonara()),
            Err(RecipeError::NameTooLong(256))
        );
        assert_eq!(
            validate_recipe("Vuota", &Recipe::default()),
            Err(RecipeError::NoIngredients)
        );

        let mut recipe = carbonara();
        recipe.items[1].qty = 0.0;
        assert_eq!(
            validate_recipe("Carbonara", &recipe),
            Err(RecipeError::InvalidIngredient(2, "quantity must be greater than 0"))
        );
    }

    #[test]
    fn test_save_overwrites() {
        let mut book = RecipeBook::new();
        save_recipe(&mut book, "Carbonara", carbonara()).unwrap();
        save_recipe(
            &mut book,
            "Carbonara ",
            Recipe::new(vec![RecipeIngredient::new("Uova", 2.0, "pz")]),
        )
        .unwrap();
        assert_eq!(book.len(), 1);
        assert_eq!(book["Carbonara"].items.len(), 1);
    }

    #[test]
    fn test_deserialize_frontend_shape() {
        let book: RecipeBook = serde_json::from_str(
            r#"{"Carbonara":{"items":[{"name":"Uova","qty":"2","unit":"pz"}]}}"#,
        )
        .unwrap();
        assert_eq!(book["Carbonara"].items[0].qty, 2.0);
    }
}
