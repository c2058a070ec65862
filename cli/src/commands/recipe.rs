use anyhow::Result;
use serde_json::json;

use larder_core::assistant::Assistant;
use larder_core::dates;
use larder_core::db::Database;
use larder_core::models::{Difficulty, NewRecipe, RecipeIngredient};
use larder_core::recipes::{RecipeFilter, availability, is_ingredient_available, with_availability};
use larder_core::service::{ingredient_names, recommend, save_recommendations};

use super::helpers::{parse_ingredient, print_recipe_table};
use super::resolve_recipe;

pub(crate) struct RecipeDraft {
    pub description: Option<String>,
    pub cooking_time: u32,
    pub servings: u32,
    pub difficulty: Option<String>,
    /// `name:amount` pairs.
    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
    pub tags: Vec<String>,
}

pub(crate) fn cmd_recipe_list(
    db: &Database,
    search: Option<String>,
    difficulty: Option<&str>,
    json: bool,
) -> Result<()> {
    let foods = db.get_foods()?;
    let filter = RecipeFilter {
        search,
        difficulty: difficulty.map(str::parse::<Difficulty>).transpose()?,
    };
    let recipes = filter.apply(db.get_recipes()?, &foods);

    if json {
        let annotated: Vec<_> = recipes.iter().map(|r| with_availability(r, &foods)).collect();
        println!("{}", serde_json::to_string_pretty(&annotated)?);
    } else if recipes.is_empty() {
        eprintln!("No recipes found. Use `larder recipe add` or `larder recipe recommend`.");
    } else {
        print_recipe_table(&recipes, &foods);
    }
    Ok(())
}

pub(crate) fn cmd_recipe_show(db: &Database, id: &str, json: bool) -> Result<()> {
    let recipe = resolve_recipe(db, id)?;
    let foods = db.get_foods()?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&with_availability(&recipe, &foods))?
        );
        return Ok(());
    }

    let report = availability(&recipe, &foods);
    println!("{}", recipe.name);
    if !recipe.description.is_empty() {
        println!("  {}", recipe.description);
    }
    println!(
        "  {} min, serves {}, {}",
        recipe.cooking_time,
        recipe.servings,
        recipe.difficulty.label()
    );
    if !recipe.tags.is_empty() {
        println!("  Tags: {}", recipe.tags.join(", "));
    }
    if let Some(n) = recipe.nutrition {
        println!(
            "  Nutrition: {:.0} kcal, {:.0}g protein, {:.0}g carbs, {:.0}g fat, {:.0}g fiber",
            n.calories, n.protein, n.carbs, n.fat, n.fiber
        );
    }

    println!(
        "\nIngredients ({}/{} on hand, {}):",
        report.available, report.total, report.status
    );
    for ingredient in &recipe.ingredients {
        let mark = if is_ingredient_available(ingredient, &foods) {
            "✓"
        } else {
            " "
        };
        let optional = if ingredient.optional == Some(true) {
            " (optional)"
        } else {
            ""
        };
        if ingredient.amount.is_empty() {
            println!("  [{mark}] {}{optional}", ingredient.name);
        } else {
            println!("  [{mark}] {} - {}{optional}", ingredient.name, ingredient.amount);
        }
    }

    if !recipe.instructions.is_empty() {
        println!("\nSteps:");
        for (i, step) in recipe.instructions.iter().enumerate() {
            println!("  {}. {step}", i + 1);
        }
    }
    Ok(())
}

pub(crate) fn cmd_recipe_add(
    db: &Database,
    name: &str,
    draft: RecipeDraft,
    json: bool,
) -> Result<()> {
    let ingredients = draft
        .ingredients
        .iter()
        .map(|s| parse_ingredient(s).map(|(name, amount)| RecipeIngredient::new(&name, &amount)))
        .collect::<Result<Vec<_>>>()?;

    let recipe = db.add_recipe(&NewRecipe {
        name: name.to_string(),
        description: draft.description.unwrap_or_default(),
        image: None,
        ingredients,
        instructions: draft.steps,
        cooking_time: draft.cooking_time,
        servings: draft.servings,
        difficulty: draft
            .difficulty
            .as_deref()
            .map(str::parse)
            .transpose()?
            .unwrap_or_default(),
        nutrition: None,
        tags: draft.tags,
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
    } else {
        println!(
            "Created recipe '{}' with {} ingredients",
            recipe.name,
            recipe.ingredients.len()
        );
        println!("  ID: {}", recipe.id);
    }
    Ok(())
}

pub(crate) fn cmd_recipe_delete(db: &Database, id: &str, json: bool) -> Result<()> {
    let recipe = resolve_recipe(db, id)?;
    db.delete_recipe(&recipe.id)?;
    if json {
        println!("{}", json!({ "deleted": recipe.id }));
    } else {
        println!("Deleted recipe '{}'", recipe.name);
    }
    Ok(())
}

/// Ask the assistant for dishes that use what is in stock.
pub(crate) async fn cmd_recipe_recommend<A: Assistant>(
    db: &Database,
    assistant: &A,
    expiring_only: bool,
    save: bool,
    json: bool,
) -> Result<()> {
    let foods = db.get_foods()?;
    let ingredients = ingredient_names(&foods, expiring_only, dates::today());
    if ingredients.is_empty() {
        if json {
            println!("{}", json!({ "ingredients": [], "recipes": [] }));
        } else if expiring_only {
            eprintln!("Nothing is expiring in the next three days.");
        } else {
            eprintln!("Your inventory is empty. Add some food first.");
        }
        return Ok(());
    }

    let names = recommend(assistant, &ingredients).await;
    let saved = if save {
        save_recommendations(db, &names, &ingredients)?
    } else {
        Vec::new()
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "ingredients": ingredients,
                "recipes": names,
                "saved": saved,
            }))?
        );
        return Ok(());
    }

    println!("Based on: {}", ingredients.join(", "));
    for name in &names {
        println!("  - {name}");
    }
    if save {
        println!("Saved {} recipes.", saved.len());
    } else if !names.is_empty() {
        eprintln!("Run again with --save to keep these as recipes.");
    }
    Ok(())
}
