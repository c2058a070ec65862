use crate::models::{FoodCategory, FreshnessLevel};

/// Upper bound on any shelf life or default expiry, in days.
pub const MAX_SHELF_LIFE_DAYS: u32 = 3650;

/// Typical shelf life in days for a food at peak freshness.
#[must_use]
pub fn base_shelf_life(category: FoodCategory) -> u32 {
    match category {
        FoodCategory::Vegetables | FoodCategory::Dairy => 7,
        FoodCategory::Fruits => 10,
        FoodCategory::Meat => 3,
        FoodCategory::Grains | FoodCategory::Canned => 365,
        FoodCategory::Beverages | FoodCategory::Snacks => 30,
        FoodCategory::Condiments => 180,
        FoodCategory::Frozen => 90,
        FoodCategory::Bakery => 5,
        FoodCategory::Other => 14,
    }
}

#[must_use]
pub fn freshness_multiplier(freshness: FreshnessLevel) -> f64 {
    match freshness {
        FreshnessLevel::Fresh => 1.0,
        FreshnessLevel::Good => 0.7,
        FreshnessLevel::Fair => 0.4,
        FreshnessLevel::Poor => 0.1,
    }
}

#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn predict_shelf_life(category: FoodCategory, freshness: FreshnessLevel) -> u32 {
    let days = f64::from(base_shelf_life(category)) * freshness_multiplier(freshness);
    days.round().max(0.0) as u32
}
