//! Wire types, prompts and reply interpretation for the Gemma
//! `generateContent` API.
//!
//! Model replies are free-form text that usually, but not always, contains a
//! JSON object. The interpreter digs that object out, repairs the common
//! breakages, and substitutes placeholder results when nothing usable is
//! left. Transport is left to the caller.

use std::sync::LazyLock;

use rand::Rng;
use rand::seq::IndexedRandom;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::{DetectedFood, FoodCategory, FreshnessLevel};
use crate::shelf_life::{MAX_SHELF_LIFE_DAYS, predict_shelf_life};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemma-3-27b-it";
/// Used when a reply carries no overall confidence of its own.
pub const DEFAULT_OVERALL_CONFIDENCE: f64 = 0.85;
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
pub const PING_PROMPT: &str = "Test connection";

pub const CUISINES: [&str; 5] = ["Western", "Eastern", "Mediterranean", "Asian", "European"];

pub const DEFAULT_RECIPE_NAMES: [&str; 5] = [
    "Simple Stir Fry",
    "Steamed Egg Custard",
    "Vegetable Soup",
    "Fruit Salad",
    "Nutritious Porridge",
];

// --- Request wire types ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

/// One part of a message. Serializes as `{"text": ..}`, `{"inlineData": ..}`
/// or `{"fileData": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Part {
    Text(String),
    InlineData(InlineData),
    FileData(FileData),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    /// Base64 without a data-URL prefix.
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub mime_type: String,
    pub file_uri: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub max_output_tokens: u32,
    pub temperature: f64,
}

impl GenerationConfig {
    pub const STANDARD: Self = Self {
        max_output_tokens: 2000,
        temperature: 0.7,
    };
    pub const PING: Self = Self {
        max_output_tokens: 50,
        temperature: 0.1,
    };
}

impl GenerateRequest {
    #[must_use]
    pub fn text(prompt: &str, config: GenerationConfig) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part::Text(prompt.to_string())],
            }],
            generation_config: config,
        }
    }

    /// Append a part to the single message.
    #[must_use]
    pub fn with_part(mut self, part: Part) -> Self {
        if let Some(content) = self.contents.first_mut() {
            content.parts.push(part);
        }
        self
    }

    #[must_use]
    pub fn ping() -> Self {
        Self::text(PING_PROMPT, GenerationConfig::PING)
    }
}

// --- Prompts ---

#[must_use]
pub fn recognition_prompt(has_image: bool) -> String {
    if has_image {
        r#"As a food recognition expert, please carefully analyze the food in this image. Identify all visible food types in the image, assess their freshness, and estimate shelf life. Please return results strictly in the following JSON format: {"foods": [{"name": "specific food name", "category": "category", "confidence": 0.9, "freshness": "fresh", "estimatedShelfLife": 7}]}.

Categories include: fruits, vegetables, meat, dairy, grains, beverages, snacks, condiments, frozen, canned, bakery, other.

Freshness levels: fresh, good, fair, poor.

Please return only JSON format results without any other text explanations."#
            .to_string()
    } else {
        r#"As a food recognition expert, please identify possible food types based on user description. Please return JSON format: {"foods": [{"name": "food name", "category": "category", "confidence": 0.9, "freshness": "fresh", "estimatedShelfLife": 7}]}. Common foods include: apple, banana, carrot, tomato, milk, egg, bread, etc."#
            .to_string()
    }
}

#[must_use]
pub fn recipe_prompt(ingredients: &[String], cuisine: &str) -> String {
    format!(
        "As a culinary expert, based on the following ingredients: {}, please recommend 5 simple and easy-to-make recipes with a mix of {cuisine} and international cuisine preferences. Include both traditional and fusion dishes. Return JSON format: {{\"recipes\": [\"recipe1\", \"recipe2\", \"recipe3\", \"recipe4\", \"recipe5\"]}}",
        ingredients.join(", ")
    )
}

pub fn pick_cuisine<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    CUISINES.choose(rng).copied().unwrap_or(CUISINES[0])
}

// --- Reply interpretation ---

static FENCE_JSON: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"```json\s*").unwrap());
static FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"```\s*").unwrap());
static OBJECT_SPAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").unwrap());
static ARRAY_SPAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\[.*\]").unwrap());
static TRAILING_COMMA_OBJECT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",\s*\}").unwrap());
static TRAILING_COMMA_ARRAY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",\s*\]").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// The model's text: the first candidate's first part, or the
/// `generated_text` of a text-generation style array reply.
#[must_use]
pub fn response_text(response: &Value) -> Option<String> {
    if let Some(candidate) = response
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
    {
        if candidate.get("finishReason").and_then(Value::as_str) == Some("MAX_TOKENS") {
            warn!("model reply was truncated at the token limit");
        }
        let text = candidate
            .pointer("/content/parts/0/text")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if text.is_empty() {
            warn!("model reply has no text content");
            return None;
        }
        return Some(text.to_string());
    }

    let first = response.as_array().and_then(|a| a.first())?;
    first
        .get("generated_text")
        .or_else(|| first.get("text"))
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
}

/// Extract and parse the JSON embedded in `text`, repairing trailing
/// commas and single quotes. `None` when nothing parses.
#[must_use]
pub fn extract_json(text: &str) -> Option<Value> {
    let unfenced = FENCE_JSON.replace_all(text, "");
    let unfenced = FENCE.replace_all(&unfenced, "");

    let span = OBJECT_SPAN
        .find(&unfenced)
        .or_else(|| ARRAY_SPAN.find(&unfenced))?
        .as_str();

    let cleaned = TRAILING_COMMA_OBJECT.replace_all(span, "}");
    let cleaned = TRAILING_COMMA_ARRAY.replace_all(&cleaned, "]");
    let cleaned = WHITESPACE.replace_all(&cleaned, " ");
    let cleaned = cleaned.trim();

    match serde_json::from_str(cleaned) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(error = %e, "reply JSON did not parse, retrying with double quotes");
            match serde_json::from_str(&cleaned.replace('\'', "\"")) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(error = %e, json = cleaned, "could not repair reply JSON");
                    None
                }
            }
        }
    }
}

/// Foods read from a recognition reply.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionReply {
    pub foods: Vec<DetectedFood>,
    /// Overall confidence, when the reply states one.
    pub confidence: Option<f64>,
}

/// The placeholder substituted for a reply that cannot be read at all.
#[must_use]
pub fn unidentified_food() -> DetectedFood {
    DetectedFood {
        name: "Unidentified Food".to_string(),
        category: FoodCategory::Other,
        confidence: 0.5,
        bounding_box: None,
        freshness: FreshnessLevel::Good,
        estimated_shelf_life: 7,
    }
}

/// Interpret a raw recognition response.
///
/// Unreadable text yields the single unidentified placeholder. JSON that
/// parses but has no `foods` array yields `None` so the caller can fall back
/// to mock data.
#[must_use]
pub fn interpret_recognition(response: &Value) -> Option<RecognitionReply> {
    let Some(parsed) = response_text(response).and_then(|t| extract_json(&t)) else {
        warn!("unable to read recognition reply, using placeholder");
        return Some(RecognitionReply {
            foods: vec![unidentified_food()],
            confidence: None,
        });
    };

    let foods = parsed.get("foods").and_then(Value::as_array)?;
    Some(RecognitionReply {
        foods: foods.iter().filter_map(detected_food_from_value).collect(),
        confidence: parsed.get("confidence").and_then(Value::as_f64),
    })
}

/// Read one detected food leniently. Entries without a name are dropped.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn detected_food_from_value(value: &Value) -> Option<DetectedFood> {
    let name = value.get("name").and_then(Value::as_str)?.trim();
    if name.is_empty() {
        return None;
    }
    let category = value
        .get("category")
        .and_then(Value::as_str)
        .map_or(FoodCategory::Other, FoodCategory::from_loose);
    let freshness = value
        .get("freshness")
        .and_then(Value::as_str)
        .map_or(FreshnessLevel::Good, FreshnessLevel::from_loose);
    let confidence = value
        .get("confidence")
        .and_then(Value::as_f64)
        .map_or(0.5, |c| c.clamp(0.0, 1.0));
    let estimated_shelf_life = value
        .get("estimatedShelfLife")
        .and_then(Value::as_f64)
        .filter(|d| d.is_finite() && *d >= 0.0)
        .map_or_else(
            || predict_shelf_life(category, freshness),
            |d| d.round().min(f64::from(MAX_SHELF_LIFE_DAYS)) as u32,
        );
    let bounding_box = value
        .get("boundingBox")
        .and_then(|b| serde_json::from_value(b.clone()).ok());

    Some(DetectedFood {
        name: name.to_string(),
        category,
        confidence,
        bounding_box,
        freshness,
        estimated_shelf_life,
    })
}

/// Interpret a raw recipe response into dish names.
///
/// `recipes` may hold strings or objects with a `name`; blanks are dropped.
/// Unreadable text yields [`DEFAULT_RECIPE_NAMES`]; JSON without a `recipes`
/// array yields `None`.
#[must_use]
pub fn interpret_recipes(response: &Value) -> Option<Vec<String>> {
    let Some(parsed) = response_text(response).and_then(|t| extract_json(&t)) else {
        warn!("unable to read recipe reply, using default recipes");
        return Some(DEFAULT_RECIPE_NAMES.iter().map(ToString::to_string).collect());
    };

    let recipes = parsed.get("recipes").and_then(Value::as_array)?;
    Some(
        recipes
            .iter()
            .filter_map(|r| match r {
                Value::String(s) => Some(s.as_str()),
                Value::Object(_) => r.get("name").and_then(Value::as_str),
                _ => None,
            })
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect(),
    )
}

// --- Files API ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub uri: String,
    pub mime_type: String,
}

/// Read `file.uri` (or a top-level `uri`) from an upload response.
#[must_use]
pub fn parse_upload_response(response: &Value, fallback_mime: &str) -> Option<UploadedFile> {
    let file = response.get("file");
    let uri = file
        .and_then(|f| f.get("uri"))
        .or_else(|| response.get("uri"))
        .and_then(Value::as_str)
        .filter(|u| !u.is_empty())?;
    let mime_type = file
        .and_then(|f| f.get("mimeType"))
        .or_else(|| response.get("mimeType"))
        .and_then(Value::as_str)
        .unwrap_or(fallback_mime);
    Some(UploadedFile {
        uri: uri.to_string(),
        mime_type: mime_type.to_string(),
    })
}

// --- Model info ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub capabilities: Vec<&'static str>,
}

#[must_use]
pub fn model_info() -> ModelInfo {
    ModelInfo {
        name: "Gemma 3-27b-it",
        version: "3.0.0",
        capabilities: vec![
            "Image Understanding",
            "Multimodal Processing",
            "Food Recognition",
            "Intelligent Text Generation",
            "Food Classification Suggestions",
            "Freshness Assessment",
            "Shelf Life Prediction",
            "Recipe Recommendations",
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::json;

    fn reply(text: &str) -> Value {
        json!({
            "candidates": [{
                "content": {"parts": [{"text": text}], "role": "model"},
                "finishReason": "STOP"
            }]
        })
    }

    #[test]
    fn test_request_serializes_to_wire_shape() {
        let request = GenerateRequest::text("hi", GenerationConfig::STANDARD).with_part(
            Part::InlineData(InlineData {
                mime_type: "image/png".to_string(),
                data: "AAAA".to_string(),
            }),
        );
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "contents": [{"parts": [
                    {"text": "hi"},
                    {"inlineData": {"mimeType": "image/png", "data": "AAAA"}}
                ]}],
                "generationConfig": {"maxOutputTokens": 2000, "temperature": 0.7}
            })
        );
    }

    #[test]
    fn test_file_part_and_ping() {
        let part = Part::FileData(FileData {
            mime_type: "image/jpeg".to_string(),
            file_uri: "https://files/abc".to_string(),
        });
        assert_eq!(
            serde_json::to_value(&part).unwrap(),
            json!({"fileData": {"mimeType": "image/jpeg", "fileUri": "https://files/abc"}})
        );

        let ping = serde_json::to_value(GenerateRequest::ping()).unwrap();
        assert_eq!(ping["contents"][0]["parts"][0]["text"], "Test connection");
        assert_eq!(ping["generationConfig"]["maxOutputTokens"], 50);
    }

    #[test]
    fn test_recognition_from_fenced_reply() {
        let text = "Here you go:\n```json\n{\"foods\": [{\"name\": \"Banana\", \"category\": \"fruits\", \"confidence\": 0.9, \"freshness\": \"good\", \"estimatedShelfLife\": 4}]}\n```";
        let result = interpret_recognition(&reply(text)).unwrap();
        assert_eq!(result.foods.len(), 1);
        let banana = &result.foods[0];
        assert_eq!(banana.name, "Banana");
        assert_eq!(banana.category, FoodCategory::Fruits);
        assert_eq!(banana.freshness, FreshnessLevel::Good);
        assert_eq!(banana.estimated_shelf_life, 4);
        assert_eq!(result.confidence, None);
    }

    #[test]
    fn test_recognition_repairs_trailing_commas() {
        let text = "{\"foods\": [{\"name\": \"Egg\", \"category\": \"dairy\",},], \"confidence\": 0.7,}";
        let result = interpret_recognition(&reply(text)).unwrap();
        assert_eq!(result.foods[0].name, "Egg");
        assert_eq!(result.confidence, Some(0.7));
    }

    #[test]
    fn test_recognition_repairs_single_quotes() {
        let text = "{'foods': [{'name': 'Pear', 'category': 'fruits', 'freshness': 'fresh'}]}";
        let result = interpret_recognition(&reply(text)).unwrap();
        let pear = &result.foods[0];
        assert_eq!(pear.name, "Pear");
        // Missing values fall back to defaults and the shelf-life table
        assert!((pear.confidence - 0.5).abs() < f64::EPSILON);
        assert_eq!(pear.estimated_shelf_life, 10);
    }

    #[test]
    fn test_recognition_lenient_fields() {
        let text = r#"{"foods": [
            {"name": "Mystery", "category": "produce", "freshness": "ripe", "confidence": 1.7},
            {"name": "", "category": "fruits"},
            {"category": "meat"}
        ]}"#;
        let result = interpret_recognition(&reply(text)).unwrap();
        assert_eq!(result.foods.len(), 1);
        let mystery = &result.foods[0];
        assert_eq!(mystery.category, FoodCategory::Other);
        assert_eq!(mystery.freshness, FreshnessLevel::Good);
        assert!((mystery.confidence - 1.0).abs() < f64::EPSILON);
        assert_eq!(mystery.estimated_shelf_life, 10);
    }

    #[test]
    fn test_shelf_life_is_bounded() {
        let food = detected_food_from_value(&json!({"name": "Honey", "estimatedShelfLife": 1e8}))
            .unwrap();
        assert_eq!(food.estimated_shelf_life, MAX_SHELF_LIFE_DAYS);
        let food =
            detected_food_from_value(&json!({"name": "Salt", "estimatedShelfLife": 3650.4}))
                .unwrap();
        assert_eq!(food.estimated_shelf_life, 3650);
    }

    #[test]
    fn test_recognition_unreadable_yields_placeholder() {
        for response in [
            reply("I can see some food, but cannot format it."),
            reply("{this is not json at all}"),
            json!({"candidates": [{"content": {"parts": []}, "finishReason": "MAX_TOKENS"}]}),
            json!({}),
        ] {
            let result = interpret_recognition(&response).unwrap();
            assert_eq!(result.foods, vec![unidentified_food()]);
        }
    }

    #[test]
    fn test_recognition_without_foods_key_is_none() {
        assert!(interpret_recognition(&reply(r#"{"items": []}"#)).is_none());
        assert!(interpret_recognition(&reply("[1, 2, 3]")).is_none());
    }

    #[test]
    fn test_generated_text_array_reply() {
        let response = json!([{"generated_text": "{\"recipes\": [\"Tomato Soup\"]}"}]);
        assert_eq!(
            interpret_recipes(&response).unwrap(),
            vec!["Tomato Soup".to_string()]
        );
    }

    #[test]
    fn test_recipes_from_objects_and_strings() {
        let objects = reply(r#"{"recipes": [{"name": "Fried Rice"}, {"name": "  "}, {"title": "x"}]}"#);
        assert_eq!(interpret_recipes(&objects).unwrap(), vec!["Fried Rice"]);

        let strings = reply(r#"{"recipes": ["Omelette", "", "Pancakes"]}"#);
        assert_eq!(interpret_recipes(&strings).unwrap(), vec!["Omelette", "Pancakes"]);
    }

    #[test]
    fn test_recipes_fallbacks() {
        let defaults = interpret_recipes(&reply("no json here")).unwrap();
        assert_eq!(defaults.len(), 5);
        assert_eq!(defaults[0], "Simple Stir Fry");

        assert!(interpret_recipes(&reply(r#"{"dishes": ["a"]}"#)).is_none());
    }

    #[test]
    fn test_extract_json_takes_outermost_object() {
        let value = extract_json("prefix {\"a\": {\"b\": 1}} suffix").unwrap();
        assert_eq!(value, json!({"a": {"b": 1}}));
        assert!(extract_json("nothing").is_none());
    }

    #[test]
    fn test_parse_upload_response() {
        let nested = json!({"file": {"uri": "https://f/1", "mimeType": "image/png"}});
        assert_eq!(
            parse_upload_response(&nested, "image/jpeg").unwrap(),
            UploadedFile {
                uri: "https://f/1".to_string(),
                mime_type: "image/png".to_string()
            }
        );

        let flat = json!({"uri": "https://f/2"});
        assert_eq!(
            parse_upload_response(&flat, "image/webp").unwrap().mime_type,
            "image/webp"
        );

        assert!(parse_upload_response(&json!({"file": {}}), "image/jpeg").is_none());
    }

    #[test]
    fn test_recipe_prompt_names_cuisine() {
        let prompt = recipe_prompt(&["egg".to_string(), "rice".to_string()], "Asian");
        assert!(prompt.contains("ingredients: egg, rice,"));
        assert!(prompt.contains("a mix of Asian and international"));
        assert!(prompt.contains(r#"{"recipes": ["#));
    }

    #[test]
    fn test_pick_cuisine_is_from_list() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            assert!(CUISINES.contains(&pick_cuisine(&mut rng)));
        }
    }

    #[test]
    fn test_recognition_prompt_variants() {
        assert!(recognition_prompt(true).contains("analyze the food in this image"));
        assert!(recognition_prompt(false).contains("based on user description"));
    }
}
