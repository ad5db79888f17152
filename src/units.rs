//! # Unit Conversion Module
//!
//! Normalizes unit tokens to a small canonical set and computes the
//! multiplicative factor between compatible units.
//!
//! ## Canonical units
//!
//! | Canonical | Synonyms |
//! |-----------|----------|
//! | `kg` | chilo, chili, chilogrammi, kilogrammi |
//! | `g`  | gr, grammo, grammi |
//! | `lt` | l, litro, litri |
//! | `ml` | millilitri |
//! | `pz` | pc, pcs, pz., pezzo, pezzi |
//! | `bt` | bottiglia, bottiglie |
//!
//! Tokens outside the table pass through trimmed and lower-cased.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Canonical unit tokens
pub const KILOGRAMS: &str = "kg";
pub const GRAMS: &str = "g";
pub const LITERS: &str = "lt";
pub const MILLILITERS: &str = "ml";
pub const PIECES: &str = "pz";
pub const BOTTLES: &str = "bt";

/// Synonym table mapping unit words to their canonical token
static UNIT_SYNONYMS: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    // Weight
    map.insert("chilo", KILOGRAMS);
    map.insert("chili", KILOGRAMS);
    map.insert("chilogrammi", KILOGRAMS);
    map.insert("kilogrammi", KILOGRAMS);
    map.insert("gr", GRAMS);
    map.insert("grammo", GRAMS);
    map.insert("grammi", GRAMS);

    // Volume
    map.insert("l", LITERS);
    map.insert("litro", LITERS);
    map.insert("litri", LITERS);
    map.insert("millilitri", MILLILITERS);

    // Count
    map.insert("pc", PIECES);
    map.insert("pcs", PIECES);
    map.insert("pz.", PIECES);
    map.insert("pezzo", PIECES);
    map.insert("pezzi", PIECES);
    map.insert("bottiglia", BOTTLES);
    map.insert("bottiglie", BOTTLES);

    map
});

/// Normalize a unit token to its canonical form.
///
/// Matching is case-insensitive and ignores surrounding whitespace.
/// Unrecognized tokens are returned trimmed and lower-cased.
///
/// ```rust
/// use chefcode::units::normalize_unit;
///
/// assert_eq!(normalize_unit(" L "), "lt");
/// assert_eq!(normalize_unit("pcs"), "pz");
/// assert_eq!(normalize_unit("lattine"), "lattine");
/// ```
pub fn normalize_unit(unit: &str) -> String {
    let lowered = unit.trim().to_lowercase();
    match UNIT_SYNONYMS.get(lowered.as_str()) {
        Some(canonical) => (*canonical).to_string(),
        None => lowered,
    }
}

/// Factor converting a quantity expressed in `from` into `to`.
///
/// Returns `None` when the two units cannot be converted into each other.
/// That is a policy signal for the caller, not an error.
///
/// ```rust
/// use chefcode::units::conversion_factor;
///
/// assert_eq!(conversion_factor("kg", "g"), Some(1000.0));
/// assert_eq!(conversion_factor("grammi", "kg"), Some(0.001));
/// assert_eq!(conversion_factor("lt", "pz"), None);
/// ```
pub fn conversion_factor(from: &str, to: &str) -> Option<f64> {
    let from = normalize_unit(from);
    let to = normalize_unit(to);

    if from == to {
        return Some(1.0);
    }

    match (from.as_str(), to.as_str()) {
        (KILOGRAMS, GRAMS) | (LITERS, MILLILITERS) => Some(1000.0),
        (GRAMS, KILOGRAMS) | (MILLILITERS, LITERS) => Some(1.0 / 1000.0),
        // Countable units are interchangeable
        (PIECES, BOTTLES) | (BOTTLES, PIECES) => Some(1.0),
        _ => None,
    }
}
