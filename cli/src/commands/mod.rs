mod ai;
mod backup;
mod food;
mod helpers;
mod recipe;
mod recognize;
mod remind;
mod settings;
mod stats;

use anyhow::{Result, bail};

use larder_core::db::Database;
use larder_core::models::{Food, Recipe};

pub(crate) use ai::{cmd_ai_info, cmd_ai_ping};
pub(crate) use backup::{cmd_clear, cmd_export, cmd_import};
pub(crate) use food::{
    FoodArgs, cmd_food_add, cmd_food_delete, cmd_food_edit, cmd_food_list, cmd_food_purge,
    cmd_food_show, cmd_shelf_life,
};
pub(crate) use helpers::json_error;
pub(crate) use recipe::{
    RecipeDraft, cmd_recipe_add, cmd_recipe_delete, cmd_recipe_list, cmd_recipe_recommend,
    cmd_recipe_show,
};
pub(crate) use recognize::{RecognizeOptions, cmd_recognize};
pub(crate) use remind::cmd_remind;
pub(crate) use settings::{cmd_settings_reset, cmd_settings_set, cmd_settings_show};
pub(crate) use stats::cmd_stats;

/// Pick the single record whose id equals `query` or starts with it.
fn resolve_by_id<T>(items: Vec<T>, query: &str, id: impl Fn(&T) -> &str, kind: &str) -> Result<T> {
    let query = query.trim();
    if query.is_empty() {
        bail!("No {kind} id given");
    }
    let mut matches: Vec<T> = Vec::new();
    for item in items {
        if id(&item) == query {
            return Ok(item);
        }
        if id(&item).starts_with(query) {
            matches.push(item);
        }
    }
    match matches.len() {
        0 => bail!("No {kind} found with id '{query}'"),
        1 => Ok(matches.remove(0)),
        n => bail!("Id '{query}' matches {n} {kind}s, use more characters"),
    }
}

/// Find a food by full id or unique id prefix.
pub(super) fn resolve_food(db: &Database, query: &str) -> Result<Food> {
    resolve_by_id(db.get_foods()?, query, |f: &Food| f.id.as_str(), "food")
}

/// Find a recipe by full id or unique id prefix.
pub(super) fn resolve_recipe(db: &Database, query: &str) -> Result<Recipe> {
    resolve_by_id(db.get_recipes()?, query, |r: &Recipe| r.id.as_str(), "recipe")
}
