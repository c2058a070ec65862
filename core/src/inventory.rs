use chrono::NaiveDate;
use serde::Serialize;

use crate::dates::{WARNING_DAYS, days_until_expiry, expiry_status, is_within_days};
use crate::models::{ExpiryStatus, Food, FoodCategory};

#[derive(Debug, Clone, Default)]
pub struct FoodFilter {
    /// Case-insensitive match against name and notes.
    pub search: Option<String>,
    pub category: Option<FoodCategory>,
    pub status: Option<ExpiryStatus>,
}

impl FoodFilter {
    #[must_use]
    pub fn matches(&self, food: &Food, today: NaiveDate) -> bool {
        if self.category.is_some_and(|c| c != food.category) {
            return false;
        }
        if self
            .status
            .is_some_and(|s| s != expiry_status(food.expiry_date, today))
        {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let term = term.to_lowercase();
                food.name.to_lowercase().contains(&term)
                    || food
                        .notes
                        .as_deref()
                        .is_some_and(|n| n.to_lowercase().contains(&term))
            }
        }
    }

    /// Matching foods, soonest expiry first.
    #[must_use]
    pub fn apply(&self, foods: Vec<Food>, today: NaiveDate) -> Vec<Food> {
        let mut filtered: Vec<Food> = foods
            .into_iter()
            .filter(|f| self.matches(f, today))
            .collect();
        sort_by_expiry(&mut filtered);
        filtered
    }
}

pub fn sort_by_expiry(foods: &mut [Food]) {
    foods.sort_by_key(|f| f.expiry_date);
}

pub fn refresh_statuses(foods: &mut [Food], today: NaiveDate) {
    for food in foods {
        food.expiry_status = expiry_status(food.expiry_date, today);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExpirySummary {
    pub total: usize,
    pub fresh: usize,
    pub warning: usize,
    pub expired: usize,
}

impl ExpirySummary {
    #[must_use]
    pub fn of(foods: &[Food], today: NaiveDate) -> Self {
        let mut summary = Self {
            total: foods.len(),
            ..Self::default()
        };
        for food in foods {
            match expiry_status(food.expiry_date, today) {
                ExpiryStatus::Fresh => summary.fresh += 1,
                ExpiryStatus::Warning => summary.warning += 1,
                ExpiryStatus::Expired => summary.expired += 1,
            }
        }
        summary
    }
}

/// Foods expiring between today and three days from now, soonest first.
#[must_use]
pub fn expiring_foods(foods: &[Food], today: NaiveDate) -> Vec<Food> {
    let mut expiring: Vec<Food> = foods
        .iter()
        .filter(|f| is_within_days(f.expiry_date, today, WARNING_DAYS))
        .cloned()
        .collect();
    sort_by_expiry(&mut expiring);
    expiring
}

/// Foods already past their expiry date, longest expired first.
#[must_use]
pub fn expired_foods(foods: &[Food], today: NaiveDate) -> Vec<Food> {
    let mut expired: Vec<Food> = foods
        .iter()
        .filter(|f| days_until_expiry(f.expiry_date, today) < 0)
        .cloned()
        .collect();
    sort_by_expiry(&mut expired);
    expired
}
