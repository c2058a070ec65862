use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

use crate::assistant::Assistant;
use crate::dates::add_days;
use crate::db::Database;
use crate::inventory::{expired_foods, expiring_foods};
use crate::models::{DEFAULT_LOCATION, DEFAULT_UNIT, DetectedFood, Food, NewFood, Recipe};
use crate::recipes::recommendation_to_recipe;

#[derive(Debug, Clone, Default, Serialize)]
pub struct AcceptOutcome {
    pub added: Vec<Food>,
    /// Detections below the confidence threshold.
    pub skipped: Vec<DetectedFood>,
}

/// The stored food a detection becomes: one piece, bought today, expiring
/// after its estimated shelf life.
#[must_use]
pub fn detection_to_food(detected: &DetectedFood, today: NaiveDate) -> NewFood {
    NewFood {
        name: detected.name.clone(),
        category: detected.category,
        quantity: 1.0,
        unit: DEFAULT_UNIT.to_string(),
        purchase_date: today,
        expiry_date: add_days(today, i64::from(detected.estimated_shelf_life))
            .unwrap_or(NaiveDate::MAX),
        location: Some(DEFAULT_LOCATION.to_string()),
        notes: None,
        description: None,
        image_url: None,
        confidence: Some(detected.confidence),
        freshness: detected.freshness,
    }
}

/// Store recognised foods. Detections under the configured AI confidence
/// threshold are skipped unless `include_low_confidence` is set.
pub fn accept_detections(
    db: &Database,
    detections: &[DetectedFood],
    include_low_confidence: bool,
    today: NaiveDate,
) -> Result<AcceptOutcome> {
    let threshold = db.get_settings()?.ai_confidence_threshold;
    let (keep, skipped): (Vec<&DetectedFood>, Vec<&DetectedFood>) = detections
        .iter()
        .partition(|d| include_low_confidence || d.confidence >= threshold);

    let new_foods: Vec<NewFood> = keep.iter().map(|d| detection_to_food(d, today)).collect();
    let added = if new_foods.is_empty() {
        Vec::new()
    } else {
        db.add_foods(&new_foods)?
    };
    debug!(
        added = added.len(),
        skipped = skipped.len(),
        threshold,
        "accepted detections"
    );
    Ok(AcceptOutcome {
        added,
        skipped: skipped.into_iter().cloned().collect(),
    })
}

/// Names of the foods to cook with: everything, or only what is about to expire.
#[must_use]
pub fn ingredient_names(foods: &[Food], expiring_only: bool, today: NaiveDate) -> Vec<String> {
    if expiring_only {
        expiring_foods(foods, today)
            .into_iter()
            .map(|f| f.name)
            .collect()
    } else {
        foods.iter().map(|f| f.name.clone()).collect()
    }
}

/// Ask the assistant for dish names, dropping blanks.
pub async fn recommend<A: Assistant>(assistant: &A, ingredients: &[String]) -> Vec<String> {
    if ingredients.is_empty() {
        return Vec::new();
    }
    assistant
        .recommend_recipes(ingredients)
        .await
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect()
}

/// Persist recommended dish names as recipes built from `food_names`.
pub fn save_recommendations(
    db: &Database,
    names: &[String],
    food_names: &[String],
) -> Result<Vec<Recipe>> {
    let recipes: Vec<_> = names
        .iter()
        .filter(|n| !n.trim().is_empty())
        .map(|n| recommendation_to_recipe(n, food_names))
        .collect();
    if recipes.is_empty() {
        return Ok(Vec::new());
    }
    db.add_recipes(&recipes)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Reminders {
    pub expired: Vec<Food>,
    pub expiring: Vec<Food>,
}

impl Reminders {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty() && self.expiring.is_empty()
    }
}

/// Foods worth a reminder, or `None` when expiry reminders are switched off.
pub fn due_reminders(db: &Database, today: NaiveDate) -> Result<Option<Reminders>> {
    let settings = db.get_settings()?;
    if !settings.notifications.enabled || !settings.notifications.expiry_reminder {
        return Ok(None);
    }
    let foods = db.get_foods()?;
    Ok(Some(Reminders {
        expired: expired_foods(&foods, today),
        expiring: expiring_foods(&foods, today),
    }))
}

/// Delete long-expired foods when auto-delete is enabled.
pub fn auto_purge(db: &Database) -> Result<Vec<Food>> {
    let settings = db.get_settings()?;
    if !settings.auto_delete_expired {
        return Ok(Vec::new());
    }
    let removed = db.purge_expired(i64::from(settings.auto_delete_days))?;
    if !removed.is_empty() {
        info!(
            count = removed.len(),
            days = settings.auto_delete_days,
            "auto-deleted expired foods"
        );
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::{OfflineAssistant, mock_recognition};
    use crate::dates;
    use crate::models::{FoodCategory, FreshnessLevel};
    use crate::shelf_life::MAX_SHELF_LIFE_DAYS;
    use chrono::Duration;

    fn food(name: &str, expires_in: i64) -> NewFood {
        let today = dates::today();
        NewFood {
            name: name.to_string(),
            category: FoodCategory::Vegetables,
            quantity: 1.0,
            unit: "piece".to_string(),
            purchase_date: today,
            expiry_date: today + Duration::days(expires_in),
            location: None,
            notes: None,
            description: None,
            image_url: None,
            confidence: None,
            freshness: FreshnessLevel::Fresh,
        }
    }

    #[test]
    fn test_detection_to_food() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let apple = &mock_recognition()[0];
        let new = detection_to_food(apple, today);
        assert_eq!(new.name, "Apple");
        assert_eq!(new.unit, "piece");
        assert_eq!(new.location.as_deref(), Some("Refrigerator"));
        assert_eq!(new.expiry_date, NaiveDate::from_ymd_opt(2024, 6, 24).unwrap());
        assert_eq!(new.confidence, Some(0.92));
    }

    #[test]
    fn test_accept_detections_respects_threshold() {
        let db = Database::open_in_memory().unwrap();
        let mut settings = db.get_settings().unwrap();
        settings.ai_confidence_threshold = 0.9;
        db.update_settings(&settings).unwrap();

        let detections = mock_recognition();
        let outcome = accept_detections(&db, &detections, false, dates::today()).unwrap();
        let added: Vec<&str> = outcome.added.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(added, vec!["Apple", "Milk"]);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].name, "Carrot");
        assert_eq!(db.get_foods().unwrap().len(), 2);

        let outcome = accept_detections(&db, &detections, true, dates::today()).unwrap();
        assert_eq!(outcome.added.len(), 3);
        assert!(outcome.skipped.is_empty());
    }

    #[test]
    fn test_accept_detections_with_absurd_shelf_life() {
        let db = Database::open_in_memory().unwrap();
        let today = dates::today();
        let reply = serde_json::json!({
            "candidates": [{"content": {"parts": [{"text":
                concat!(
                    "```json\n",
                    r#"{"foods":[{"name":"Honey","category":"condiments","confidence":0.95,"#,
                    r#""freshness":"fresh","estimatedShelfLife":100000000}]}"#,
                    "\n```"
                )
            }]}}]
        });
        let detections = crate::gemma::interpret_recognition(&reply).unwrap().foods;
        assert_eq!(detections[0].estimated_shelf_life, MAX_SHELF_LIFE_DAYS);

        let outcome = accept_detections(&db, &detections, false, today).unwrap();
        assert_eq!(outcome.added.len(), 1);
        assert_eq!(
            outcome.added[0].expiry_date,
            today + Duration::days(i64::from(MAX_SHELF_LIFE_DAYS))
        );
    }

    #[test]
    fn test_detection_to_food_near_calendar_end() {
        let mut honey = mock_recognition()[0].clone();
        honey.estimated_shelf_life = MAX_SHELF_LIFE_DAYS;
        let new = detection_to_food(&honey, NaiveDate::MAX);
        assert_eq!(new.expiry_date, NaiveDate::MAX);
    }

    #[test]
    fn test_ingredient_names() {
        let today = dates::today();
        let db = Database::open_in_memory().unwrap();
        db.add_food(&food("Kale", 1)).unwrap();
        db.add_food(&food("Rice", 100)).unwrap();
        let foods = db.get_foods().unwrap();
        assert_eq!(ingredient_names(&foods, false, today), vec!["Kale", "Rice"]);
        assert_eq!(ingredient_names(&foods, true, today), vec!["Kale"]);
    }

    #[test]
    fn test_save_recommendations_skips_blanks() {
        let db = Database::open_in_memory().unwrap();
        let names = vec!["Kale Soup".to_string(), "  ".to_string()];
        let saved = save_recommendations(&db, &names, &["Kale".to_string()]).unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].tags, vec!["AI Recommended", "Quick Dish"]);
        assert_eq!(db.get_recipes().unwrap().len(), 3);

        assert!(save_recommendations(&db, &[], &[]).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recommend_with_offline_assistant() {
        let assistant = OfflineAssistant::with_seed(11);
        let names = recommend(&assistant, &["Leek".to_string(), "Tofu".to_string()]).await;
        assert_eq!(names.len(), 2);
        assert!(recommend(&assistant, &[]).await.is_empty());
    }

    #[test]
    fn test_due_reminders() {
        let db = Database::open_in_memory().unwrap();
        db.add_food(&food("Old milk", -2)).unwrap();
        db.add_food(&food("Yogurt", 1)).unwrap();
        db.add_food(&food("Rice", 200)).unwrap();

        let reminders = due_reminders(&db, dates::today()).unwrap().unwrap();
        assert_eq!(reminders.expired.len(), 1);
        assert_eq!(reminders.expiring.len(), 1);
        assert_eq!(reminders.expiring[0].name, "Yogurt");

        let mut settings = db.get_settings().unwrap();
        settings.notifications.expiry_reminder = false;
        db.update_settings(&settings).unwrap();
        assert!(due_reminders(&db, dates::today()).unwrap().is_none());
    }

    #[test]
    fn test_auto_purge_only_when_enabled() {
        let db = Database::open_in_memory().unwrap();
        db.add_food(&food("Ancient", -30)).unwrap();
        db.add_food(&food("Recent", -2)).unwrap();

        assert!(auto_purge(&db).unwrap().is_empty());
        assert_eq!(db.get_foods().unwrap().len(), 2);

        let mut settings = db.get_settings().unwrap();
        settings.auto_delete_expired = true;
        db.update_settings(&settings).unwrap();
        let removed = auto_purge(&db).unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].name, "Ancient");
    }
}
