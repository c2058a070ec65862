use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::dates::lenient_date;
use crate::shelf_life::MAX_SHELF_LIFE_DAYS;

pub const BACKUP_VERSION: &str = "1.0.0";
pub const DEFAULT_UNIT: &str = "piece";
pub const DEFAULT_LOCATION: &str = "Refrigerator";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FoodCategory {
    Vegetables,
    Fruits,
    Meat,
    Dairy,
    Grains,
    Beverages,
    Snacks,
    Condiments,
    Frozen,
    Canned,
    Bakery,
    Other,
}

impl FoodCategory {
    pub const ALL: [FoodCategory; 12] = [
        Self::Vegetables,
        Self::Fruits,
        Self::Meat,
        Self::Dairy,
        Self::Grains,
        Self::Beverages,
        Self::Snacks,
        Self::Condiments,
        Self::Frozen,
        Self::Canned,
        Self::Bakery,
        Self::Other,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vegetables => "vegetables",
            Self::Fruits => "fruits",
            Self::Meat => "meat",
            Self::Dairy => "dairy",
            Self::Grains => "grains",
            Self::Beverages => "beverages",
            Self::Snacks => "snacks",
            Self::Condiments => "condiments",
            Self::Frozen => "frozen",
            Self::Canned => "canned",
            Self::Bakery => "bakery",
            Self::Other => "other",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Vegetables => "Vegetables",
            Self::Fruits => "Fruits",
            Self::Meat => "Meat",
            Self::Dairy => "Dairy",
            Self::Grains => "Grains",
            Self::Beverages => "Beverages",
            Self::Snacks => "Snacks",
            Self::Condiments => "Condiments",
            Self::Frozen => "Frozen Foods",
            Self::Canned => "Canned Foods",
            Self::Bakery => "Bakery",
            Self::Other => "Other",
        }
    }

    #[must_use]
    pub fn icon(self) -> &'static str {
        match self {
            Self::Vegetables => "🥬",
            Self::Fruits => "🍎",
            Self::Meat => "🥩",
            Self::Dairy => "🥛",
            Self::Grains => "🌾",
            Self::Beverages => "🥤",
            Self::Snacks => "🍿",
            Self::Condiments => "🧂",
            Self::Frozen => "🧊",
            Self::Canned => "🥫",
            Self::Bakery => "🍞",
            Self::Other => "📦",
        }
    }

    /// Lenient parse for model output: anything unrecognised is `Other`.
    #[must_use]
    pub fn from_loose(s: &str) -> Self {
        s.parse().unwrap_or(Self::Other)
    }
}

impl FromStr for FoodCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == lower)
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(|c| c.as_str()).collect();
                anyhow::anyhow!("Invalid category '{s}'. Valid: {}", valid.join(", "))
            })
    }
}

impl fmt::Display for FoodCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FreshnessLevel {
    #[default]
    Fresh,
    Good,
    Fair,
    Poor,
}

impl FreshnessLevel {
    pub const ALL: [FreshnessLevel; 4] = [Self::Fresh, Self::Good, Self::Fair, Self::Poor];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
        }
    }

    /// Lenient parse for model output: anything unrecognised is `Good`.
    #[must_use]
    pub fn from_loose(s: &str) -> Self {
        s.parse().unwrap_or(Self::Good)
    }
}

impl FromStr for FreshnessLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == lower)
            .ok_or_else(|| {
                anyhow::anyhow!("Invalid freshness '{s}'. Valid: fresh, good, fair, poor")
            })
    }
}

impl fmt::Display for FreshnessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryStatus {
    /// More than three days left.
    #[default]
    Fresh,
    /// Zero to three days left.
    Warning,
    Expired,
}

impl ExpiryStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Warning => "warning",
            Self::Expired => "expired",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Fresh => "Fresh",
            Self::Warning => "Expiring Soon",
            Self::Expired => "Expired",
        }
    }
}

impl FromStr for ExpiryStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "fresh" => Ok(Self::Fresh),
            "warning" | "expiring" | "expiring_soon" | "expiring-soon" => Ok(Self::Warning),
            "expired" => Ok(Self::Expired),
            _ => bail!("Invalid status '{s}'. Valid: fresh, warning, expired"),
        }
    }
}

impl fmt::Display for ExpiryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Foods ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Food {
    pub id: String,
    pub name: String,
    pub category: FoodCategory,
    pub quantity: f64,
    pub unit: String,
    #[serde(deserialize_with = "lenient_date::deserialize")]
    pub purchase_date: NaiveDate,
    #[serde(deserialize_with = "lenient_date::deserialize")]
    pub expiry_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub freshness: FreshnessLevel,
    #[serde(default)]
    pub expiry_status: ExpiryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFood {
    pub name: String,
    pub category: FoodCategory,
    pub quantity: f64,
    pub unit: String,
    #[serde(deserialize_with = "lenient_date::deserialize")]
    pub purchase_date: NaiveDate,
    #[serde(deserialize_with = "lenient_date::deserialize")]
    pub expiry_date: NaiveDate,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub freshness: FreshnessLevel,
}

fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

fn deserialize_some_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_date::deserialize(deserializer).map(Some)
}

/// Partial update of a food. `Some(None)` on an optional text field clears it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::option_option)]
pub struct FoodUpdate {
    pub name: Option<String>,
    pub category: Option<FoodCategory>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some_date")]
    pub purchase_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_some_date")]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub location: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub notes: Option<Option<String>>,
    pub freshness: Option<FreshnessLevel>,
}

impl FoodUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Food {
    pub fn apply(&mut self, update: &FoodUpdate) {
        if let Some(name) = &update.name {
            self.name.clone_from(name);
        }
        if let Some(category) = update.category {
            self.category = category;
        }
        if let Some(quantity) = update.quantity {
            self.quantity = quantity;
        }
        if let Some(unit) = &update.unit {
            self.unit.clone_from(unit);
        }
        if let Some(date) = update.purchase_date {
            self.purchase_date = date;
        }
        if let Some(date) = update.expiry_date {
            self.expiry_date = date;
        }
        if let Some(location) = &update.location {
            self.location.clone_from(location);
        }
        if let Some(notes) = &update.notes {
            self.notes.clone_from(notes);
        }
        if let Some(freshness) = update.freshness {
            self.freshness = freshness;
        }
    }
}

// --- Recipes ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Easy => "Easy",
            Self::Medium => "Medium",
            Self::Hard => "Hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            _ => bail!("Invalid difficulty '{s}'. Valid: easy, medium, hard"),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeIngredient {
    pub name: String,
    pub amount: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<bool>,
}

impl RecipeIngredient {
    #[must_use]
    pub fn new(name: &str, amount: &str) -> Self {
        Self {
            name: name.to_string(),
            amount: amount.to_string(),
            optional: None,
            available: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Nutrition {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub fiber: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<RecipeIngredient>,
    #[serde(default)]
    pub instructions: Vec<String>,
    /// Minutes.
    pub cooking_time: u32,
    pub servings: u32,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nutrition: Option<Nutrition>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecipe {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<RecipeIngredient>,
    #[serde(default)]
    pub instructions: Vec<String>,
    pub cooking_time: u32,
    pub servings: u32,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub nutrition: Option<Nutrition>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub ingredients: Option<Vec<RecipeIngredient>>,
    pub instructions: Option<Vec<String>>,
    pub cooking_time: Option<u32>,
    pub servings: Option<u32>,
    pub difficulty: Option<Difficulty>,
    pub nutrition: Option<Nutrition>,
    pub tags: Option<Vec<String>>,
}

impl Recipe {
    pub fn apply(&mut self, update: &RecipeUpdate) {
        if let Some(name) = &update.name {
            self.name.clone_from(name);
        }
        if let Some(description) = &update.description {
            self.description.clone_from(description);
        }
        if let Some(ingredients) = &update.ingredients {
            self.ingredients.clone_from(ingredients);
        }
        if let Some(instructions) = &update.instructions {
            self.instructions.clone_from(instructions);
        }
        if let Some(minutes) = update.cooking_time {
            self.cooking_time = minutes;
        }
        if let Some(servings) = update.servings {
            self.servings = servings;
        }
        if let Some(difficulty) = update.difficulty {
            self.difficulty = difficulty;
        }
        if let Some(nutrition) = update.nutrition {
            self.nutrition = Some(nutrition);
        }
        if let Some(tags) = &update.tags {
            self.tags.clone_from(tags);
        }
    }
}

// --- Settings ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "zh-CN")]
    ZhCn,
    #[default]
    #[serde(rename = "en-US")]
    EnUs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NotificationSettings {
    pub enabled: bool,
    pub expiry_reminder: bool,
    pub daily_reminder: bool,
    /// `HH:MM`.
    pub reminder_time: String,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            expiry_reminder: true,
            daily_reminder: true,
            reminder_time: "09:00".to_string(),
        }
    }
}

/// Fields missing from stored JSON take their default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub id: String,
    pub notifications: NotificationSettings,
    pub theme: Theme,
    pub language: Language,
    pub units: Units,
    pub auto_delete_expired: bool,
    pub auto_delete_days: u32,
    pub ai_confidence_threshold: f64,
    pub default_expiry_days: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Settings {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: "default-settings".to_string(),
            notifications: NotificationSettings::default(),
            theme: Theme::Light,
            language: Language::EnUs,
            units: Units::Metric,
            auto_delete_expired: false,
            auto_delete_days: 7,
            ai_confidence_threshold: 0.7,
            default_expiry_days: 7,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Settings {
    /// Set one field from its camelCase (or kebab/snake) key and a string value.
    pub fn set_field(&mut self, key: &str, value: &str) -> Result<()> {
        let normalized: String = key
            .chars()
            .filter(|c| *c != '_' && *c != '-' && *c != '.')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "theme" => {
                self.theme = match value {
                    "light" => Theme::Light,
                    "dark" => Theme::Dark,
                    _ => bail!("Invalid theme '{value}'. Valid: light, dark"),
                };
            }
            "language" => {
                self.language = match value {
                    "zh-CN" | "zh" => Language::ZhCn,
                    "en-US" | "en" => Language::EnUs,
                    _ => bail!("Invalid language '{value}'. Valid: zh-CN, en-US"),
                };
            }
            "units" => {
                self.units = match value {
                    "metric" => Units::Metric,
                    "imperial" => Units::Imperial,
                    _ => bail!("Invalid units '{value}'. Valid: metric, imperial"),
                };
            }
            "autodeleteexpired" => self.auto_delete_expired = parse_bool(value)?,
            "autodeletedays" => self.auto_delete_days = parse_number(key, value)?,
            "aiconfidencethreshold" => {
                self.ai_confidence_threshold = value
                    .parse()
                    .map_err(|_| anyhow::anyhow!("Invalid number for {key}: '{value}'"))?;
            }
            "defaultexpirydays" => self.default_expiry_days = parse_number(key, value)?,
            "notifications" | "notificationsenabled" => {
                self.notifications.enabled = parse_bool(value)?;
            }
            "expiryreminder" | "notificationsexpiryreminder" => {
                self.notifications.expiry_reminder = parse_bool(value)?;
            }
            "dailyreminder" | "notificationsdailyreminder" => {
                self.notifications.daily_reminder = parse_bool(value)?;
            }
            "remindertime" | "notificationsremindertime" => {
                self.notifications.reminder_time = value.to_string();
            }
            _ => bail!("Unknown setting '{key}'"),
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => bail!("Invalid boolean '{value}'. Use true or false"),
    }
}

fn parse_number(key: &str, value: &str) -> Result<u32> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid number for {key}: '{value}'"))
}

// --- Statistics ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FreshnessDistribution {
    pub fresh: u32,
    pub expiring_soon: u32,
    pub expired: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: String,
    pub added: u32,
    pub expired: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub id: String,
    pub total_foods: u32,
    pub fresh_foods: u32,
    pub expiring_soon: u32,
    pub expired: u32,
    /// Percentage of stored foods that are expired.
    pub waste_rate: f64,
    /// Kilograms of CO2.
    pub carbon_saved: f64,
    pub money_saved: f64,
    #[serde(default)]
    pub category_distribution: BTreeMap<String, u32>,
    #[serde(default)]
    pub freshness_distribution: FreshnessDistribution,
    #[serde(default)]
    pub monthly_trends: Vec<TrendPoint>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- AI recognition ---

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedFood {
    pub name: String,
    pub category: FoodCategory,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    pub freshness: FreshnessLevel,
    /// Days.
    pub estimated_shelf_life: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionResult {
    pub foods: Vec<DetectedFood>,
    pub confidence: f64,
    /// Milliseconds.
    pub processing_time: u64,
}

// --- Backup ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foods: Option<Vec<Food>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipes: Option<Vec<Recipe>>,
    #[serde(default, alias = "userSettings", skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Statistics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub foods_imported: usize,
    pub recipes_imported: usize,
    pub settings_imported: bool,
}

// --- Validation ---

pub fn validate_new_food(food: &NewFood) -> Result<()> {
    if food.name.trim().is_empty() {
        bail!("Food name must not be empty");
    }
    validate_quantity(food.quantity)?;
    if food.unit.trim().is_empty() {
        bail!("Unit must not be empty");
    }
    if let Some(confidence) = food.confidence {
        validate_confidence(confidence)?;
    }
    Ok(())
}

pub fn validate_food_update(update: &FoodUpdate) -> Result<()> {
    if let Some(name) = &update.name {
        if name.trim().is_empty() {
            bail!("Food name must not be empty");
        }
    }
    if let Some(quantity) = update.quantity {
        validate_quantity(quantity)?;
    }
    if let Some(unit) = &update.unit {
        if unit.trim().is_empty() {
            bail!("Unit must not be empty");
        }
    }
    Ok(())
}

fn validate_quantity(quantity: f64) -> Result<()> {
    if !quantity.is_finite() || quantity < 0.0 {
        bail!("Quantity must be a non-negative number (got {quantity})");
    }
    Ok(())
}

fn validate_confidence(confidence: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&confidence) {
        bail!("Confidence must be between 0 and 1 (got {confidence})");
    }
    Ok(())
}

pub fn validate_new_recipe(recipe: &NewRecipe) -> Result<()> {
    if recipe.name.trim().is_empty() {
        bail!("Recipe name must not be empty");
    }
    if recipe.servings == 0 {
        bail!("Servings must be at least 1");
    }
    if recipe.ingredients.iter().any(|i| i.name.trim().is_empty()) {
        bail!("Ingredient names must not be empty");
    }
    Ok(())
}

pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_confidence(settings.ai_confidence_threshold)
        .map_err(|_| anyhow::anyhow!("aiConfidenceThreshold must be between 0 and 1"))?;
    if settings.auto_delete_days == 0 {
        bail!("autoDeleteDays must be at least 1");
    }
    if settings.default_expiry_days == 0 || settings.default_expiry_days > MAX_SHELF_LIFE_DAYS {
        bail!("defaultExpiryDays must be between 1 and {MAX_SHELF_LIFE_DAYS}");
    }
    NaiveTime::parse_from_str(&settings.notifications.reminder_time, "%H:%M").map_err(|_| {
        anyhow::anyhow!(
            "Invalid reminderTime '{}'. Use HH:MM",
            settings.notifications.reminder_time
        )
    })?;
    Ok(())
}

pub fn validate_backup(backup: &Backup) -> Result<()> {
    if backup.foods.is_none() && backup.recipes.is_none() && backup.settings.is_none() {
        bail!("Backup contains no foods, recipes or settings");
    }
    if let Some(foods) = &backup.foods {
        let mut seen = HashSet::new();
        for food in foods {
            if food.id.trim().is_empty() {
                bail!("Food '{}' has an empty id", food.name);
            }
            if food.name.trim().is_empty() {
                bail!("Food {} has an empty name", food.id);
            }
            validate_quantity(food.quantity)?;
            if !seen.insert(food.id.as_str()) {
                bail!("Duplicate food id '{}'", food.id);
            }
        }
    }
    if let Some(recipes) = &backup.recipes {
        let mut seen = HashSet::new();
        for recipe in recipes {
            if recipe.name.trim().is_empty() {
                bail!("Recipe {} has an empty name", recipe.id);
            }
            if !seen.insert(recipe.id.as_str()) {
                bail!("Duplicate recipe id '{}'", recipe.id);
            }
        }
    }
    if let Some(settings) = &backup.settings {
        validate_settings(settings)?;
    }
    Ok(())
}
