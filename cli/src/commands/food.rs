use anyhow::{Context, Result, bail};
use clap::Args;
use serde_json::json;

use larder_core::dates::{self, add_days, format_expiry, format_relative_date, relative_time};
use larder_core::db::Database;
use larder_core::inventory::{ExpirySummary, FoodFilter, expiring_foods};
use larder_core::models::{
    DEFAULT_UNIT, ExpiryStatus, FoodCategory, FoodUpdate, FreshnessLevel, NewFood,
};
use larder_core::shelf_life::{base_shelf_life, freshness_multiplier, predict_shelf_life};

use super::helpers::{no_neg_zero, parse_date, print_food_table};
use super::resolve_food;

/// Fields shared by `food add` and `food edit`.
#[derive(Args, Debug, Default)]
pub(crate) struct FoodArgs {
    /// Category: fruits, vegetables, meat, dairy, grains, beverages, snacks,
    /// condiments, frozen, canned, bakery, other
    #[arg(short, long)]
    pub category: Option<String>,
    /// Quantity (default: 1)
    #[arg(short, long)]
    pub quantity: Option<f64>,
    /// Unit (default: piece)
    #[arg(short, long)]
    pub unit: Option<String>,
    /// Purchase date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
    #[arg(long)]
    pub purchased: Option<String>,
    /// Expiry date (YYYY-MM-DD or today/yesterday/tomorrow)
    #[arg(short, long)]
    pub expires: Option<String>,
    /// Storage location, e.g. Refrigerator. Pass "" to clear when editing
    #[arg(short, long)]
    pub location: Option<String>,
    /// Free-form notes. Pass "" to clear when editing
    #[arg(short, long)]
    pub notes: Option<String>,
    /// Freshness: fresh, good, fair, poor
    #[arg(long)]
    pub freshness: Option<String>,
}

fn parse_category(s: Option<&str>) -> Result<Option<FoodCategory>> {
    s.map(str::parse).transpose()
}

fn parse_freshness(s: Option<&str>) -> Result<Option<FreshnessLevel>> {
    s.map(str::parse).transpose()
}

/// `Some("")` clears the field.
fn clearable(value: Option<&String>) -> Option<Option<String>> {
    value.map(|v| {
        let v = v.trim();
        (!v.is_empty()).then(|| v.to_string())
    })
}

pub(crate) fn cmd_food_add(db: &Database, name: &str, args: &FoodArgs, json: bool) -> Result<()> {
    let today = dates::today();
    let settings = db.get_settings()?;
    let category = parse_category(args.category.as_deref())?.unwrap_or(FoodCategory::Other);
    let freshness = parse_freshness(args.freshness.as_deref())?.unwrap_or_default();
    let purchase_date = parse_date(args.purchased.as_deref(), today)?;
    let expiry_date = match args.expires.as_deref() {
        Some(s) => parse_date(Some(s), today)?,
        None => add_days(purchase_date, i64::from(settings.default_expiry_days))
            .with_context(|| format!("Purchase date {purchase_date} is too far in the future"))?,
    };

    let food = db.add_food(&NewFood {
        name: name.to_string(),
        category,
        quantity: args.quantity.unwrap_or(1.0),
        unit: args
            .unit
            .clone()
            .unwrap_or_else(|| DEFAULT_UNIT.to_string()),
        purchase_date,
        expiry_date,
        location: clearable(args.location.as_ref()).flatten(),
        notes: clearable(args.notes.as_ref()).flatten(),
        description: None,
        image_url: None,
        confidence: None,
        freshness,
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&food)?);
    } else {
        println!(
            "Added {} ({} {}), {}",
            food.name,
            no_neg_zero(food.quantity),
            food.unit,
            format_expiry(food.expiry_date, today, settings.language).to_lowercase()
        );
        println!("  ID: {}", food.id);
    }
    Ok(())
}

pub(crate) fn cmd_food_list(
    db: &Database,
    search: Option<String>,
    category: Option<&str>,
    status: Option<&str>,
    expiring: bool,
    json: bool,
) -> Result<()> {
    let today = dates::today();
    let language = db.get_settings()?.language;
    let all = db.get_foods()?;
    let filter = FoodFilter {
        search,
        category: parse_category(category)?,
        status: status.map(str::parse::<ExpiryStatus>).transpose()?,
    };
    let foods = if expiring {
        filter.apply(expiring_foods(&all, today), today)
    } else {
        filter.apply(all, today)
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&foods)?);
    } else if foods.is_empty() {
        eprintln!("No foods found. Use `larder food add` or `larder recognize` to add some.");
    } else {
        print_food_table(&foods, today, language);
        let summary = ExpirySummary::of(&foods, today);
        println!(
            "{} items: {} fresh, {} expiring soon, {} expired",
            summary.total, summary.fresh, summary.warning, summary.expired
        );
    }
    Ok(())
}

pub(crate) fn cmd_food_show(db: &Database, id: &str, json: bool) -> Result<()> {
    let food = resolve_food(db, id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&food)?);
        return Ok(());
    }

    let today = dates::today();
    let language = db.get_settings()?.language;
    println!("{} {}", food.category.icon(), food.name);
    println!("  ID:        {}", food.id);
    println!("  Category:  {}", food.category.label());
    println!("  Quantity:  {} {}", no_neg_zero(food.quantity), food.unit);
    println!(
        "  Purchased: {}",
        format_relative_date(food.purchase_date, today, language)
    );
    println!(
        "  Expiry:    {} ({})",
        food.expiry_date.format("%Y-%m-%d"),
        format_expiry(food.expiry_date, today, language)
    );
    println!("  Status:    {}", food.expiry_status.label());
    println!("  Freshness: {}", food.freshness);
    if let Some(ref location) = food.location {
        println!("  Location:  {location}");
    }
    if let Some(ref notes) = food.notes {
        println!("  Notes:     {notes}");
    }
    if let Some(confidence) = food.confidence {
        println!("  AI confidence: {:.0}%", confidence * 100.0);
    }
    println!(
        "  Updated:   {}",
        relative_time(food.updated_at, chrono::Utc::now(), language)
    );
    Ok(())
}

pub(crate) fn cmd_food_edit(
    db: &Database,
    id: &str,
    name: Option<String>,
    args: &FoodArgs,
    json: bool,
) -> Result<()> {
    let today = dates::today();
    let food = resolve_food(db, id)?;
    let update = FoodUpdate {
        name,
        category: parse_category(args.category.as_deref())?,
        quantity: args.quantity,
        unit: args.unit.clone(),
        purchase_date: args
            .purchased
            .as_deref()
            .map(|d| parse_date(Some(d), today))
            .transpose()?,
        expiry_date: args
            .expires
            .as_deref()
            .map(|d| parse_date(Some(d), today))
            .transpose()?,
        location: clearable(args.location.as_ref()),
        notes: clearable(args.notes.as_ref()),
        freshness: parse_freshness(args.freshness.as_deref())?,
    };
    if update.is_empty() {
        bail!("Nothing to update. Pass at least one field, e.g. --quantity 2");
    }

    let Some(updated) = db.update_food(&food.id, &update)? else {
        bail!("Food {} not found", food.id);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&updated)?);
    } else {
        println!("Updated {} ({})", updated.name, updated.id);
    }
    Ok(())
}

pub(crate) fn cmd_food_delete(db: &Database, id: &str, json: bool) -> Result<()> {
    let food = resolve_food(db, id)?;
    db.delete_food(&food.id)?;
    if json {
        println!("{}", json!({ "deleted": food.id }));
    } else {
        println!("Deleted {} ({})", food.name, food.id);
    }
    Ok(())
}

/// Remove foods expired for more than `days` days (default: the
/// `autoDeleteDays` setting).
pub(crate) fn cmd_food_purge(db: &Database, days: Option<u32>, json: bool) -> Result<()> {
    let days = match days {
        Some(d) => d,
        None => db.get_settings()?.auto_delete_days,
    };
    let removed = db.purge_expired(i64::from(days))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&removed)?);
    } else if removed.is_empty() {
        println!("Nothing has been expired for more than {days} days.");
    } else {
        println!("Removed {} foods expired for more than {days} days:", removed.len());
        for food in &removed {
            println!("  - {} (expired {})", food.name, food.expiry_date);
        }
    }
    Ok(())
}

pub(crate) fn cmd_shelf_life(category: &str, freshness: Option<&str>, json: bool) -> Result<()> {
    let category: FoodCategory = category.parse()?;
    let freshness = parse_freshness(freshness)?.unwrap_or(FreshnessLevel::Good);
    let base = base_shelf_life(category);
    let multiplier = freshness_multiplier(freshness);
    let days = predict_shelf_life(category, freshness);

    if json {
        println!(
            "{}",
            json!({
                "category": category,
                "freshness": freshness,
                "baseDays": base,
                "multiplier": multiplier,
                "estimatedShelfLife": days,
            })
        );
    } else {
        println!(
            "{} {} ({freshness}): about {days} days (base {base} x {multiplier})",
            category.icon(),
            category.label()
        );
    }
    Ok(())
}
