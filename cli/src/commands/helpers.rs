use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::Serialize;
use std::io::{self, BufRead, Write};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use larder_core::dates::{self, add_days, format_expiry};
use larder_core::models::{Food, Language, Recipe};
use larder_core::recipes::availability;

/// Accepts `YYYY-MM-DD`, full timestamps, or today/yesterday/tomorrow.
pub(crate) fn parse_date(date_str: Option<&str>, today: NaiveDate) -> Result<NaiveDate> {
    match date_str.map(str::trim) {
        None | Some("today") => Ok(today),
        Some("yesterday") => add_days(today, -1).context("Date out of range"),
        Some("tomorrow") => add_days(today, 1).context("Date out of range"),
        Some(s) => dates::parse_date(s).with_context(|| {
            format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
        }),
    }
}

/// Parse `x,y,width,height`.
pub(crate) fn parse_crop(s: &str) -> Result<(u32, u32, u32, u32)> {
    let parts: Vec<u32> = s
        .split(',')
        .map(|p| p.trim().parse::<u32>())
        .collect::<Result<_, _>>()
        .with_context(|| format!("Invalid crop '{s}'. Use x,y,width,height"))?;
    match parts.as_slice() {
        [x, y, w, h] => Ok((*x, *y, *w, *h)),
        _ => bail!("Invalid crop '{s}'. Use x,y,width,height"),
    }
}

/// Parse `name:amount`; the amount is optional.
pub(crate) fn parse_ingredient(s: &str) -> Result<(String, String)> {
    let (name, amount) = s.split_once(':').unwrap_or((s, ""));
    let name = name.trim();
    if name.is_empty() {
        bail!("Invalid ingredient '{s}'. Use name:amount");
    }
    Ok((name.to_string(), amount.trim().to_string()))
}

pub(crate) fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{prompt} [y/N]: ");
    io::stderr().flush()?;
    let stdin = io::stdin();
    let line = stdin.lock().lines().next().context("No input")??;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

pub(crate) fn print_food_table(foods: &[Food], today: NaiveDate, language: Language) {
    #[derive(Tabled)]
    struct FoodRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Category")]
        category: String,
        #[tabled(rename = "Qty")]
        quantity: String,
        #[tabled(rename = "Location")]
        location: String,
        #[tabled(rename = "Expiry")]
        expiry: String,
        #[tabled(rename = "Status")]
        status: String,
    }

    let rows: Vec<FoodRow> = foods
        .iter()
        .map(|f| FoodRow {
            id: short_id(&f.id),
            name: truncate(&f.name, 30),
            category: format!("{} {}", f.category.icon(), f.category.label()),
            quantity: format!("{} {}", no_neg_zero(f.quantity), f.unit),
            location: f
                .location
                .as_deref()
                .map(|l| truncate(l, 16))
                .unwrap_or_default(),
            expiry: format_expiry(f.expiry_date, today, language),
            status: dates::expiry_status(f.expiry_date, today).label().to_string(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(3)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_recipe_table(recipes: &[Recipe], foods: &[Food]) {
    #[derive(Tabled)]
    struct RecipeRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Time")]
        time: String,
        #[tabled(rename = "Serves")]
        servings: u32,
        #[tabled(rename = "Difficulty")]
        difficulty: String,
        #[tabled(rename = "Have")]
        have: String,
        #[tabled(rename = "Status")]
        status: String,
    }

    let rows: Vec<RecipeRow> = recipes
        .iter()
        .map(|r| {
            let report = availability(r, foods);
            RecipeRow {
                id: short_id(&r.id),
                name: truncate(&r.name, 35),
                time: format!("{} min", r.cooking_time),
                servings: r.servings,
                difficulty: r.difficulty.label().to_string(),
                have: format!("{}/{}", report.available, report.total),
                status: report.status.label().to_string(),
            }
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..4)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

/// The first 8 characters of a uuid are enough to pick a record by eye.
pub(crate) fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn test_parse_date_keywords() {
        assert_eq!(parse_date(None, today()).unwrap(), today());
        assert_eq!(parse_date(Some("today"), today()).unwrap(), today());
        assert_eq!(
            parse_date(Some("yesterday"), today()).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert_eq!(
            parse_date(Some("tomorrow"), today()).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()
        );
    }

    #[test]
    fn test_parse_date_keywords_at_calendar_edges() {
        assert!(parse_date(Some("tomorrow"), NaiveDate::MAX).is_err());
        assert!(parse_date(Some("yesterday"), NaiveDate::MIN).is_err());
        assert_eq!(parse_date(Some("today"), NaiveDate::MAX).unwrap(), NaiveDate::MAX);
    }

    #[test]
    fn test_parse_date_iso() {
        let date = parse_date(Some("2024-01-15"), today()).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert!(parse_date(Some("nope"), today()).is_err());
    }

    #[test]
    fn test_parse_crop() {
        assert_eq!(parse_crop("10, 20,300,400").unwrap(), (10, 20, 300, 400));
        assert!(parse_crop("1,2,3").is_err());
        assert!(parse_crop("a,b,c,d").is_err());
    }

    #[test]
    fn test_parse_ingredient() {
        assert_eq!(
            parse_ingredient("Eggs: 3").unwrap(),
            ("Eggs".to_string(), "3".to_string())
        );
        assert_eq!(
            parse_ingredient("Salt").unwrap(),
            ("Salt".to_string(), String::new())
        );
        assert!(parse_ingredient(":2").is_err());
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0f1e2d3c-aaaa-bbbb"), "0f1e2d3c");
        assert_eq!(short_id("recipe"), "recipe");
    }

    #[test]
    fn test_json_error() {
        assert_eq!(json_error("boom"), r#"{"error":"boom"}"#);
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("Crème fraîche", 10), "Crème f...");
        assert_eq!(truncate("西红柿炒鸡蛋加米饭", 8), "西红柿炒鸡...");
    }
}
