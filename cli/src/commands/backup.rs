use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::json;

use larder_core::db::Database;
use larder_core::models::Backup;

use super::helpers::confirm;

/// Write a backup to `output`, or stdout when none is given.
pub(crate) fn cmd_export(db: &Database, output: Option<&Path>, json: bool) -> Result<()> {
    let backup = db.export_data()?;
    let text = serde_json::to_string_pretty(&backup)?;

    let Some(path) = output else {
        println!("{text}");
        return Ok(());
    };
    std::fs::write(path, &text)
        .with_context(|| format!("Failed to write backup to {}", path.display()))?;

    let foods = backup.foods.as_ref().map_or(0, Vec::len);
    let recipes = backup.recipes.as_ref().map_or(0, Vec::len);
    if json {
        println!(
            "{}",
            json!({ "path": path.display().to_string(), "foods": foods, "recipes": recipes })
        );
    } else {
        println!(
            "Exported {foods} foods and {recipes} recipes to {}",
            path.display()
        );
    }
    Ok(())
}

pub(crate) fn cmd_import(db: &Database, file: &Path, json: bool) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let backup: Backup = serde_json::from_str(&text).context("Invalid backup file format")?;
    let summary = db.import_data(&backup)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Imported {} foods and {} recipes{}",
            summary.foods_imported,
            summary.recipes_imported,
            if summary.settings_imported {
                ", settings restored"
            } else {
                ""
            }
        );
    }
    Ok(())
}

pub(crate) fn cmd_clear(db: &Database, keep_settings: bool, yes: bool, json: bool) -> Result<()> {
    if !yes {
        if json {
            bail!("Refusing to clear data without --yes");
        }
        if !confirm("Delete all foods, recipes and statistics?")? {
            eprintln!("Aborted.");
            return Ok(());
        }
    }
    db.clear_data(keep_settings)?;
    if json {
        println!("{}", json!({ "cleared": true, "settingsKept": keep_settings }));
    } else {
        println!("All data cleared.");
    }
    Ok(())
}
