use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::dates::{self, expiry_status};
use crate::models::{
    BACKUP_VERSION, Backup, Food, FoodUpdate, ImportSummary, NewFood, NewRecipe, Recipe,
    RecipeUpdate, Settings, Statistics, validate_backup, validate_food_update, validate_new_food,
    validate_new_recipe, validate_settings,
};
use crate::inventory::refresh_statuses;
use crate::recipes::default_recipes;
use crate::stats::generate_statistics;

/// The fixed keys under which each collection is stored as one JSON document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKey {
    Foods,
    Recipes,
    Settings,
    Statistics,
}

impl StorageKey {
    pub const ALL: [StorageKey; 4] = [Self::Foods, Self::Recipes, Self::Settings, Self::Statistics];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Foods => "smart_food_foods",
            Self::Recipes => "smart_food_recipes",
            Self::Settings => "smart_food_settings",
            Self::Statistics => "smart_food_statistics",
        }
    }
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS kv (
                    key TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
                );

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Raw key-value access ---

    fn read_raw(&self, key: StorageKey) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM kv WHERE key = ?1",
                params![key.as_str()],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("Failed to read {}", key.as_str()))
    }

    fn write_raw(&self, key: StorageKey, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key.as_str(), value, Utc::now().to_rfc3339()],
            )
            .with_context(|| format!("Failed to write {}", key.as_str()))?;
        Ok(())
    }

    fn remove(&self, key: StorageKey) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key.as_str()])?;
        Ok(())
    }

    /// `None` when the key is absent or its blob does not parse.
    fn read_json<T: DeserializeOwned>(&self, key: StorageKey) -> Result<Option<T>> {
        let Some(raw) = self.read_raw(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key = key.as_str(), error = %e, "stored data is corrupt, using defaults");
                Ok(None)
            }
        }
    }

    fn write_json<T: Serialize + ?Sized>(&self, key: StorageKey, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.write_raw(key, &raw)
    }

    /// Whether a value is stored under `key`, parseable or not.
    pub fn has_key(&self, key: StorageKey) -> Result<bool> {
        Ok(self.read_raw(key)?.is_some())
    }

    // --- Foods ---

    /// All foods with expiry status refreshed against today.
    pub fn get_foods(&self) -> Result<Vec<Food>> {
        let mut foods: Vec<Food> = self.read_json(StorageKey::Foods)?.unwrap_or_default();
        refresh_statuses(&mut foods, dates::today());
        Ok(foods)
    }

    pub fn get_food_by_id(&self, id: &str) -> Result<Option<Food>> {
        Ok(self.get_foods()?.into_iter().find(|f| f.id == id))
    }

    /// Persist the food list and regenerate statistics from it.
    fn save_foods(&self, foods: &[Food]) -> Result<()> {
        self.write_json(StorageKey::Foods, foods)?;
        self.write_json(StorageKey::Statistics, &Self::statistics_for(foods))?;
        Ok(())
    }

    fn statistics_for(foods: &[Food]) -> Statistics {
        generate_statistics(foods, dates::today(), Utc::now())
    }

    pub fn add_food(&self, food: &NewFood) -> Result<Food> {
        Ok(self.add_foods(std::slice::from_ref(food))?.remove(0))
    }

    /// Add several foods with one write.
    pub fn add_foods(&self, new_foods: &[NewFood]) -> Result<Vec<Food>> {
        for food in new_foods {
            validate_new_food(food)?;
        }
        let mut foods = self.get_foods()?;
        let now = Utc::now();
        let today = dates::today();
        let added: Vec<Food> = new_foods
            .iter()
            .map(|new| Food {
                id: Uuid::new_v4().to_string(),
                name: new.name.trim().to_string(),
                category: new.category,
                quantity: new.quantity,
                unit: new.unit.clone(),
                purchase_date: new.purchase_date,
                expiry_date: new.expiry_date,
                location: new.location.clone(),
                notes: new.notes.clone(),
                description: new.description.clone(),
                image_url: new.image_url.clone(),
                confidence: new.confidence,
                freshness: new.freshness,
                expiry_status: expiry_status(new.expiry_date, today),
                created_at: now,
                updated_at: now,
            })
            .collect();
        foods.extend(added.iter().cloned());
        self.save_foods(&foods)?;
        debug!(count = added.len(), "added foods");
        Ok(added)
    }

    /// `None` when no food has the id.
    pub fn update_food(&self, id: &str, update: &FoodUpdate) -> Result<Option<Food>> {
        validate_food_update(update)?;
        let mut foods = self.get_foods()?;
        let Some(food) = foods.iter_mut().find(|f| f.id == id) else {
            return Ok(None);
        };
        food.apply(update);
        food.updated_at = Utc::now();
        food.expiry_status = expiry_status(food.expiry_date, dates::today());
        let updated = food.clone();
        self.save_foods(&foods)?;
        Ok(Some(updated))
    }

    /// Returns whether the food existed.
    pub fn delete_food(&self, id: &str) -> Result<bool> {
        let mut foods = self.get_foods()?;
        let before = foods.len();
        foods.retain(|f| f.id != id);
        if foods.len() == before {
            return Ok(false);
        }
        self.save_foods(&foods)?;
        Ok(true)
    }

    /// Delete foods whose expiry date is more than `older_than_days` in the past.
    pub fn purge_expired(&self, older_than_days: i64) -> Result<Vec<Food>> {
        let today = dates::today();
        let foods = self.get_foods()?;
        let (removed, kept): (Vec<Food>, Vec<Food>) = foods
            .into_iter()
            .partition(|f| dates::days_until_expiry(f.expiry_date, today) < -older_than_days);
        if !removed.is_empty() {
            self.save_foods(&kept)?;
            debug!(count = removed.len(), "purged expired foods");
        }
        Ok(removed)
    }

    // --- Recipes ---

    /// Stored recipes, or the built-in defaults when none have been saved yet.
    pub fn get_recipes(&self) -> Result<Vec<Recipe>> {
        Ok(self
            .read_json(StorageKey::Recipes)?
            .unwrap_or_else(|| default_recipes(Utc::now())))
    }

    pub fn get_recipe_by_id(&self, id: &str) -> Result<Option<Recipe>> {
        Ok(self.get_recipes()?.into_iter().find(|r| r.id == id))
    }

    pub fn add_recipe(&self, recipe: &NewRecipe) -> Result<Recipe> {
        Ok(self.add_recipes(std::slice::from_ref(recipe))?.remove(0))
    }

    pub fn add_recipes(&self, new_recipes: &[NewRecipe]) -> Result<Vec<Recipe>> {
        for recipe in new_recipes {
            validate_new_recipe(recipe)?;
        }
        let mut recipes = self.get_recipes()?;
        let now = Utc::now();
        let added: Vec<Recipe> = new_recipes
            .iter()
            .map(|new| Recipe {
                id: Uuid::new_v4().to_string(),
                name: new.name.trim().to_string(),
                description: new.description.clone(),
                image: new.image.clone(),
                ingredients: new.ingredients.clone(),
                instructions: new.instructions.clone(),
                cooking_time: new.cooking_time,
                servings: new.servings,
                difficulty: new.difficulty,
                nutrition: new.nutrition,
                tags: new.tags.clone(),
                match_score: None,
                created_at: now,
                updated_at: now,
            })
            .collect();
        recipes.extend(added.iter().cloned());
        self.write_json(StorageKey::Recipes, &recipes)?;
        Ok(added)
    }

    pub fn update_recipe(&self, id: &str, update: &RecipeUpdate) -> Result<Option<Recipe>> {
        if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            bail!("Recipe name must not be empty");
        }
        if update.servings == Some(0) {
            bail!("Servings must be at least 1");
        }
        let mut recipes = self.get_recipes()?;
        let Some(recipe) = recipes.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        recipe.apply(update);
        recipe.updated_at = Utc::now();
        let updated = recipe.clone();
        self.write_json(StorageKey::Recipes, &recipes)?;
        Ok(Some(updated))
    }

    pub fn delete_recipe(&self, id: &str) -> Result<bool> {
        let mut recipes = self.get_recipes()?;
        let before = recipes.len();
        recipes.retain(|r| r.id != id);
        if recipes.len() == before {
            return Ok(false);
        }
        self.write_json(StorageKey::Recipes, &recipes)?;
        Ok(true)
    }

    // --- Settings ---

    /// Stored settings merged over the defaults.
    pub fn get_settings(&self) -> Result<Settings> {
        Ok(self.read_json(StorageKey::Settings)?.unwrap_or_default())
    }

    /// Validate and overwrite the stored settings. `createdAt` is preserved.
    pub fn update_settings(&self, settings: &Settings) -> Result<Settings> {
        validate_settings(settings)?;
        let current = self.get_settings()?;
        let mut next = settings.clone();
        next.created_at = current.created_at;
        next.updated_at = Utc::now();
        self.write_json(StorageKey::Settings, &next)?;
        Ok(next)
    }

    pub fn reset_settings(&self) -> Result<Settings> {
        let settings = Settings::default();
        self.write_json(StorageKey::Settings, &settings)?;
        Ok(settings)
    }

    // --- Statistics ---

    /// Stored statistics, generated and stored on first access.
    pub fn get_statistics(&self) -> Result<Statistics> {
        if let Some(stats) = self.read_json(StorageKey::Statistics)? {
            return Ok(stats);
        }
        self.update_statistics()
    }

    pub fn update_statistics(&self) -> Result<Statistics> {
        let stats = Self::statistics_for(&self.get_foods()?);
        self.write_json(StorageKey::Statistics, &stats)?;
        Ok(stats)
    }

    // --- Backup ---

    pub fn export_data(&self) -> Result<Backup> {
        Ok(Backup {
            foods: Some(self.get_foods()?),
            recipes: Some(self.get_recipes()?),
            settings: Some(self.get_settings()?),
            statistics: Some(self.get_statistics()?),
            export_date: Some(Utc::now().to_rfc3339()),
            version: Some(BACKUP_VERSION.to_string()),
        })
    }

    /// Replace each section present in the backup; statistics are regenerated
    /// from the resulting foods.
    pub fn import_data(&self, backup: &Backup) -> Result<ImportSummary> {
        validate_backup(backup)?;
        let tx = self.conn.unchecked_transaction()?;
        let mut summary = ImportSummary::default();

        if let Some(foods) = &backup.foods {
            self.write_json(StorageKey::Foods, foods)?;
            summary.foods_imported = foods.len();
        }
        if let Some(recipes) = &backup.recipes {
            self.write_json(StorageKey::Recipes, recipes)?;
            summary.recipes_imported = recipes.len();
        }
        if let Some(settings) = &backup.settings {
            self.write_json(StorageKey::Settings, settings)?;
            summary.settings_imported = true;
        }
        self.update_statistics()?;
        tx.commit().context("Failed to commit import")?;
        Ok(summary)
    }

    pub fn clear_data(&self, keep_settings: bool) -> Result<()> {
        for key in StorageKey::ALL {
            if keep_settings && key == StorageKey::Settings {
                continue;
            }
            self.remove(key)?;
        }
        Ok(())
    }
}
