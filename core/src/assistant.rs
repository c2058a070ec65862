use std::future::Future;
use std::sync::Mutex;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use tracing::warn;

use crate::gemma::{DEFAULT_OVERALL_CONFIDENCE, RecognitionReply};
use crate::models::{BoundingBox, DetectedFood, FoodCategory, FreshnessLevel, RecognitionResult};

const WESTERN_TEMPLATES: [&str; 6] = [
    "{0} Salad",
    "Grilled {0}",
    "{0} Pasta",
    "{0} Sandwich",
    "{0} Soup",
    "Roasted {0}",
];

const EASTERN_TEMPLATES: [&str; 6] = [
    "Stir-fried {0}",
    "{0} Fried Rice",
    "Steamed {0}",
    "{0} Hot Pot",
    "{0} Noodles",
    "{0} Curry",
];

pub const MAX_RECOMMENDATIONS: usize = 5;

/// An encoded image ready to send to a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Something that can recognise food and suggest recipes.
///
/// Neither operation fails: implementations degrade to mock data instead.
pub trait Assistant: Send + Sync {
    fn recognize_food(
        &self,
        image: Option<&ImageInput>,
    ) -> impl Future<Output = RecognitionResult> + Send;

    fn recommend_recipes(&self, ingredients: &[String]) -> impl Future<Output = Vec<String>> + Send;
}

/// Works without a network connection by returning canned results.
pub struct OfflineAssistant {
    rng: Mutex<StdRng>,
}

impl OfflineAssistant {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn names_for(&self, ingredients: &[String]) -> Vec<String> {
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        mock_recipe_names(ingredients, &mut *rng)
    }
}

impl Default for OfflineAssistant {
    fn default() -> Self {
        Self::new()
    }
}

impl Assistant for OfflineAssistant {
    async fn recognize_food(&self, _image: Option<&ImageInput>) -> RecognitionResult {
        let started = Instant::now();
        finish_recognition(None, started)
    }

    async fn recommend_recipes(&self, ingredients: &[String]) -> Vec<String> {
        self.names_for(ingredients)
    }
}

/// Build the final result from an interpreted reply, using mock foods when
/// there is none.
#[must_use]
pub fn finish_recognition(reply: Option<RecognitionReply>, started: Instant) -> RecognitionResult {
    let (foods, confidence) = match reply {
        Some(reply) => (
            reply.foods,
            reply.confidence.unwrap_or(DEFAULT_OVERALL_CONFIDENCE),
        ),
        None => {
            warn!("no usable recognition result, using mock data");
            (mock_recognition(), DEFAULT_OVERALL_CONFIDENCE)
        }
    };
    RecognitionResult {
        foods,
        confidence,
        processing_time: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    }
}

/// Foods reported when no model is available.
#[must_use]
pub fn mock_recognition() -> Vec<DetectedFood> {
    let detected = |name: &str,
                    category,
                    confidence,
                    freshness,
                    days,
                    (x, y, width, height): (f64, f64, f64, f64)| DetectedFood {
        name: name.to_string(),
        category,
        confidence,
        bounding_box: Some(BoundingBox {
            x,
            y,
            width,
            height,
        }),
        freshness,
        estimated_shelf_life: days,
    };
    vec![
        detected(
            "Apple",
            FoodCategory::Fruits,
            0.92,
            FreshnessLevel::Fresh,
            14,
            (100.0, 50.0, 150.0, 120.0),
        ),
        detected(
            "Carrot",
            FoodCategory::Vegetables,
            0.88,
            FreshnessLevel::Good,
            7,
            (300.0, 80.0, 100.0, 200.0),
        ),
        detected(
            "Milk",
            FoodCategory::Dairy,
            0.95,
            FreshnessLevel::Fresh,
            5,
            (450.0, 60.0, 80.0, 180.0),
        ),
    ]
}

/// One templated dish per ingredient, Western or Eastern at random, at most five.
pub fn mock_recipe_names<R: Rng + ?Sized>(ingredients: &[String], rng: &mut R) -> Vec<String> {
    ingredients
        .iter()
        .take(MAX_RECOMMENDATIONS)
        .map(|ingredient| {
            let templates = if rng.random_bool(0.5) {
                &WESTERN_TEMPLATES
            } else {
                &EASTERN_TEMPLATES
            };
            let template = templates.choose(rng).copied().unwrap_or("{0}");
            template.replace("{0}", ingredient)
        })
        .collect()
}

/// Use the interpreted names when present, otherwise mock names.
pub fn finish_recipes<R: Rng + ?Sized>(
    reply: Option<Vec<String>>,
    ingredients: &[String],
    rng: &mut R,
) -> Vec<String> {
    reply.unwrap_or_else(|| {
        warn!("no usable recipe result, using mock recipes");
        mock_recipe_names(ingredients, rng)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemma::unidentified_food;

    fn ingredients(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_mock_recognition_contents() {
        let foods = mock_recognition();
        let names: Vec<&str> = foods.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Apple", "Carrot", "Milk"]);
        assert_eq!(foods[1].freshness, FreshnessLevel::Good);
        assert_eq!(foods[2].estimated_shelf_life, 5);
        assert!(foods.iter().all(|f| f.bounding_box.is_some()));
    }

    #[test]
    fn test_mock_recipe_names_use_templates() {
        let mut rng = StdRng::seed_from_u64(42);
        let names = mock_recipe_names(&ingredients(&["Tofu", "Leek"]), &mut rng);
        assert_eq!(names.len(), 2);
        let all_templates: Vec<&str> = WESTERN_TEMPLATES
            .iter()
            .chain(EASTERN_TEMPLATES.iter())
            .copied()
            .collect();
        for (name, ingredient) in names.iter().zip(["Tofu", "Leek"]) {
            assert!(name.contains(ingredient));
            assert!(
                all_templates
                    .iter()
                    .any(|t| t.replace("{0}", ingredient) == *name)
            );
        }
    }

    #[test]
    fn test_mock_recipe_names_capped_at_five() {
        let mut rng = StdRng::seed_from_u64(1);
        let many = ingredients(&["a", "b", "c", "d", "e", "f", "g"]);
        assert_eq!(mock_recipe_names(&many, &mut rng).len(), 5);
        assert!(mock_recipe_names(&[], &mut rng).is_empty());
    }

    #[test]
    fn test_mock_recipe_names_deterministic_with_seed() {
        let list = ingredients(&["Egg", "Rice", "Kale"]);
        let a = mock_recipe_names(&list, &mut StdRng::seed_from_u64(9));
        let b = mock_recipe_names(&list, &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn test_finish_recognition_defaults_confidence() {
        let reply = RecognitionReply {
            foods: vec![unidentified_food()],
            confidence: None,
        };
        let result = finish_recognition(Some(reply), Instant::now());
        assert_eq!(result.foods.len(), 1);
        assert!((result.confidence - 0.85).abs() < f64::EPSILON);

        let mocked = finish_recognition(None, Instant::now());
        assert_eq!(mocked.foods, mock_recognition());
    }

    #[test]
    fn test_finish_recipes_prefers_reply() {
        let mut rng = StdRng::seed_from_u64(3);
        let reply = Some(vec!["Shakshuka".to_string()]);
        assert_eq!(
            finish_recipes(reply, &ingredients(&["Egg"]), &mut rng),
            vec!["Shakshuka"]
        );
        let fallback = finish_recipes(None, &ingredients(&["Egg"]), &mut rng);
        assert_eq!(fallback.len(), 1);
        assert!(fallback[0].contains("Egg"));
    }

    #[tokio::test]
    async fn test_offline_assistant() {
        let assistant = OfflineAssistant::with_seed(5);
        let result = assistant.recognize_food(None).await;
        assert_eq!(result.foods.len(), 3);
        assert!((result.confidence - 0.85).abs() < f64::EPSILON);

        let names = assistant
            .recommend_recipes(&ingredients(&["Mushroom"]))
            .await;
        assert_eq!(names.len(), 1);
        assert!(names[0].contains("Mushroom"));
    }
}
