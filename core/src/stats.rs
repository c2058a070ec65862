use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};

use crate::dates::{add_days, date_range, expiry_status};
use crate::models::{ExpiryStatus, Food, FreshnessDistribution, Statistics, TrendPoint};

/// Kilograms of CO2 credited for each food that did not go to waste.
pub const CARBON_PER_FOOD_KG: f64 = 0.5;
/// Money credited for each food that did not go to waste.
pub const MONEY_PER_FOOD: f64 = 15.0;
pub const TREND_DAYS: i64 = 30;

/// Classifies against `today`; `now` stamps the record.
#[must_use]
pub fn generate_statistics(foods: &[Food], today: NaiveDate, now: DateTime<Utc>) -> Statistics {
    let mut distribution = FreshnessDistribution::default();
    let mut categories: BTreeMap<String, u32> = BTreeMap::new();

    for food in foods {
        match expiry_status(food.expiry_date, today) {
            ExpiryStatus::Fresh => distribution.fresh += 1,
            ExpiryStatus::Warning => distribution.expiring_soon += 1,
            ExpiryStatus::Expired => distribution.expired += 1,
        }
        *categories
            .entry(food.category.as_str().to_string())
            .or_insert(0) += 1;
    }

    let total = u32::try_from(foods.len()).unwrap_or(u32::MAX);
    let saved = f64::from(total - distribution.expired);
    let waste_rate = if total > 0 {
        f64::from(distribution.expired) / f64::from(total) * 100.0
    } else {
        0.0
    };

    Statistics {
        id: uuid::Uuid::new_v4().to_string(),
        total_foods: total,
        fresh_foods: distribution.fresh,
        expiring_soon: distribution.expiring_soon,
        expired: distribution.expired,
        waste_rate,
        carbon_saved: saved * CARBON_PER_FOOD_KG,
        money_saved: saved * MONEY_PER_FOOD,
        category_distribution: categories,
        freshness_distribution: distribution,
        monthly_trends: monthly_trends(foods, today),
        created_at: now,
        updated_at: now,
    }
}

/// One point per day for the last thirty days, oldest first.
fn monthly_trends(foods: &[Food], today: NaiveDate) -> Vec<TrendPoint> {
    date_range(add_days(today, 1 - TREND_DAYS).unwrap_or(NaiveDate::MIN), today)
        .into_iter()
        .map(|day| {
            let added = foods
                .iter()
                .filter(|f| f.created_at.date_naive() == day)
                .count();
            let expired = foods.iter().filter(|f| f.expiry_date == day).count();
            TrendPoint {
                date: day.format("%Y-%m-%d").to_string(),
                added: u32::try_from(added).unwrap_or(u32::MAX),
                expired: u32::try_from(expired).unwrap_or(u32::MAX),
            }
        })
        .collect()
}
