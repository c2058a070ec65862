use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Difficulty, Food, NewRecipe, Nutrition, Recipe, RecipeIngredient};

/// How many of a recipe's ingredients are on hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    CanMake,
    MostlyAvailable,
    PartiallyAvailable,
    NeedShopping,
}

impl Availability {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::CanMake => "Can Make",
            Self::MostlyAvailable => "Mostly Available",
            Self::PartiallyAvailable => "Partially Available",
            Self::NeedShopping => "Need Shopping",
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AvailabilityReport {
    pub available: usize,
    pub total: usize,
    pub status: Availability,
}

/// An ingredient is on hand when a food whose name contains it has at least one unit left.
#[must_use]
pub fn is_ingredient_available(ingredient: &RecipeIngredient, foods: &[Food]) -> bool {
    let wanted = ingredient.name.to_lowercase();
    foods
        .iter()
        .any(|f| f.name.to_lowercase().contains(&wanted) && f.quantity >= 1.0)
}

#[must_use]
pub fn available_ingredient_count(recipe: &Recipe, foods: &[Food]) -> usize {
    recipe
        .ingredients
        .iter()
        .filter(|i| is_ingredient_available(i, foods))
        .count()
}

#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn availability(recipe: &Recipe, foods: &[Food]) -> AvailabilityReport {
    let available = available_ingredient_count(recipe, foods);
    let total = recipe.ingredients.len();
    let status = if total == 0 {
        Availability::NeedShopping
    } else {
        let percentage = available as f64 / total as f64 * 100.0;
        if available == total {
            Availability::CanMake
        } else if percentage >= 70.0 {
            Availability::MostlyAvailable
        } else if percentage >= 30.0 {
            Availability::PartiallyAvailable
        } else {
            Availability::NeedShopping
        }
    };
    AvailabilityReport {
        available,
        total,
        status,
    }
}

/// Copy of `recipe` with each ingredient's `available` flag set against `foods`.
#[must_use]
pub fn with_availability(recipe: &Recipe, foods: &[Food]) -> Recipe {
    let mut marked = recipe.clone();
    for ingredient in &mut marked.ingredients {
        ingredient.available = Some(is_ingredient_available(ingredient, foods));
    }
    marked
}

#[derive(Debug, Clone, Default)]
pub struct RecipeFilter {
    pub search: Option<String>,
    pub difficulty: Option<Difficulty>,
}

impl RecipeFilter {
    #[must_use]
    pub fn matches(&self, recipe: &Recipe) -> bool {
        if let Some(difficulty) = self.difficulty {
            if recipe.difficulty != difficulty {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let term = term.to_lowercase();
                recipe.name.to_lowercase().contains(&term)
                    || recipe.description.to_lowercase().contains(&term)
                    || recipe
                        .ingredients
                        .iter()
                        .any(|i| i.name.to_lowercase().contains(&term))
            }
        }
    }

    /// Matching recipes, most available ingredients first.
    #[must_use]
    pub fn apply(&self, recipes: Vec<Recipe>, foods: &[Food]) -> Vec<Recipe> {
        let mut filtered: Vec<Recipe> = recipes.into_iter().filter(|r| self.matches(r)).collect();
        sort_by_availability(&mut filtered, foods);
        filtered
    }
}

pub fn sort_by_availability(recipes: &mut [Recipe], foods: &[Food]) {
    recipes.sort_by_cached_key(|r| std::cmp::Reverse(available_ingredient_count(r, foods)));
}

/// Turn a recommended dish name into a storable recipe built from the first five foods.
#[must_use]
pub fn recommendation_to_recipe(name: &str, food_names: &[String]) -> NewRecipe {
    let name = name.trim();
    NewRecipe {
        name: name.to_string(),
        description: format!("{name} recommended based on available ingredients"),
        image: None,
        ingredients: food_names
            .iter()
            .take(5)
            .map(|n| RecipeIngredient::new(n, "As needed"))
            .collect(),
        instructions: vec![format!("Steps to make {name}")],
        cooking_time: 30,
        servings: 2,
        difficulty: Difficulty::Easy,
        nutrition: None,
        tags: vec!["AI Recommended".to_string(), "Quick Dish".to_string()],
    }
}

/// Recipes shown before the user has saved any of their own.
#[must_use]
pub fn default_recipes(now: DateTime<Utc>) -> Vec<Recipe> {
    let ingredients = |items: &[(&str, &str)]| -> Vec<RecipeIngredient> {
        items
            .iter()
            .map(|(name, amount)| RecipeIngredient {
                available: Some(false),
                ..RecipeIngredient::new(name, amount)
            })
            .collect()
    };
    let steps = |items: &[&str]| -> Vec<String> { items.iter().map(ToString::to_string).collect() };
    let tags = |items: &[&str]| -> Vec<String> { items.iter().map(ToString::to_string).collect() };

    vec![
        Recipe {
            id: "recipe-1".to_string(),
            name: "Tomato Scrambled Eggs".to_string(),
            description: "A classic home-style dish, nutritious and simple to make".to_string(),
            image: None,
            ingredients: ingredients(&[
                ("Eggs", "3"),
                ("Tomatoes", "2"),
                ("Scallion", "1 stalk"),
                ("Salt", "to taste"),
                ("Sugar", "1 tsp"),
                ("Cooking oil", "to taste"),
            ]),
            instructions: steps(&[
                "Beat the eggs with a pinch of salt",
                "Cut the tomatoes into wedges and the scallion into short lengths",
                "Heat oil in a pan, scramble the eggs until just set and set aside",
                "Stir-fry the tomatoes in the remaining oil until they release their juice",
                "Return the eggs to the pan and toss to combine",
                "Season with salt and sugar and finish with the scallion",
            ]),
            cooking_time: 15,
            servings: 2,
            difficulty: Difficulty::Easy,
            nutrition: Some(Nutrition {
                calories: 180.0,
                protein: 12.0,
                carbs: 8.0,
                fat: 11.0,
                fiber: 2.0,
            }),
            tags: tags(&["Home Cooking", "Quick Dish", "Nutritious"]),
            match_score: None,
            created_at: now,
            updated_at: now,
        },
        Recipe {
            id: "recipe-2".to_string(),
            name: "Classic Spaghetti Carbonara".to_string(),
            description: "Traditional Italian pasta dish with eggs, cheese, and pancetta"
                .to_string(),
            image: None,
            ingredients: ingredients(&[
                ("Spaghetti", "200g"),
                ("Pancetta", "100g"),
                ("Eggs", "2 large"),
                ("Parmesan cheese", "50g grated"),
                ("Black pepper", "to taste"),
                ("Salt", "to taste"),
            ]),
            instructions: steps(&[
                "Bring a large pot of salted water to boil and cook spaghetti according to package instructions",
                "Cut pancetta into small cubes and cook in a large pan until crispy",
                "In a bowl, whisk together eggs, grated Parmesan, and black pepper",
                "Drain pasta, reserving 1 cup of pasta water",
                "Add hot pasta to the pan with pancetta and toss",
                "Remove from heat and quickly stir in egg mixture, adding pasta water as needed to create a creamy sauce",
            ]),
            cooking_time: 20,
            servings: 2,
            difficulty: Difficulty::Easy,
            nutrition: Some(Nutrition {
                calories: 520.0,
                protein: 22.0,
                carbs: 45.0,
                fat: 28.0,
                fiber: 3.0,
            }),
            tags: tags(&["Italian", "Pasta", "Classic"]),
            match_score: None,
            created_at: now,
            updated_at: now,
        },
    ]
}
