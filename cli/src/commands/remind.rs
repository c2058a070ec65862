use anyhow::Result;
use serde_json::json;

use larder_core::dates::{self, format_expiry};
use larder_core::db::Database;
use larder_core::service::due_reminders;

pub(crate) fn cmd_remind(db: &Database, json: bool) -> Result<()> {
    let today = dates::today();
    let Some(reminders) = due_reminders(db, today)? else {
        if json {
            println!("{}", json!({ "enabled": false }));
        } else {
            eprintln!(
                "Expiry reminders are off. Enable with `larder settings set expiryReminder true`."
            );
        }
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&reminders)?);
        return Ok(());
    }

    if reminders.is_empty() {
        println!("Nothing is expiring soon.");
        return Ok(());
    }
    let language = db.get_settings()?.language;
    if !reminders.expired.is_empty() {
        println!("Expired:");
        for food in &reminders.expired {
            println!(
                "  - {} ({})",
                food.name,
                format_expiry(food.expiry_date, today, language)
            );
        }
    }
    if !reminders.expiring.is_empty() {
        println!("Use soon:");
        for food in &reminders.expiring {
            println!(
                "  - {} ({})",
                food.name,
                format_expiry(food.expiry_date, today, language)
            );
        }
    }
    Ok(())
}
