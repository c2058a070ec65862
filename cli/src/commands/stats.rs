use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use larder_core::db::Database;
use larder_core::models::{FoodCategory, Statistics};

/// Days of trend shown in the table; JSON output has all thirty.
const TREND_ROWS: usize = 7;

pub(crate) fn cmd_stats(db: &Database, json: bool) -> Result<()> {
    // Expiry counts move with the calendar, so recompute rather than read.
    let stats = db.update_statistics()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else if stats.total_foods == 0 {
        eprintln!("No foods tracked yet.");
    } else {
        print_stats(&stats);
    }
    Ok(())
}

fn print_stats(stats: &Statistics) {
    println!(
        "{} foods: {} fresh, {} expiring soon, {} expired",
        stats.total_foods, stats.fresh_foods, stats.expiring_soon, stats.expired
    );
    println!("Waste rate: {:.1}%", stats.waste_rate);
    println!(
        "Saved so far: {:.1} kg CO2, {:.0} in groceries",
        stats.carbon_saved, stats.money_saved
    );

    #[derive(Tabled)]
    struct CategoryRow {
        #[tabled(rename = "Category")]
        category: String,
        #[tabled(rename = "Items")]
        count: u32,
    }
    let mut rows: Vec<CategoryRow> = stats
        .category_distribution
        .iter()
        .map(|(key, count)| CategoryRow {
            category: {
                let category = FoodCategory::from_loose(key);
                format!("{} {}", category.icon(), category.label())
            },
            count: *count,
        })
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count));
    println!(
        "\n{}",
        Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::single(1)).with(Alignment::right()))
    );

    #[derive(Tabled)]
    struct TrendRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Added")]
        added: u32,
        #[tabled(rename = "Expired")]
        expired: u32,
    }
    let start = stats.monthly_trends.len().saturating_sub(TREND_ROWS);
    let trend: Vec<TrendRow> = stats.monthly_trends[start..]
        .iter()
        .map(|p| TrendRow {
            date: p.date.clone(),
            added: p.added,
            expired: p.expired,
        })
        .collect();
    println!(
        "\nLast {TREND_ROWS} days:\n{}",
        Table::new(&trend)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(1..3)).with(Alignment::right()))
    );
}
