use anyhow::Result;

use larder_core::db::Database;
use larder_core::models::{Language, Settings, Theme, Units};

fn on_off(b: bool) -> &'static str {
    if b { "on" } else { "off" }
}

fn print_settings(s: &Settings) {
    let language = match s.language {
        Language::ZhCn => "zh-CN",
        Language::EnUs => "en-US",
    };
    let theme = match s.theme {
        Theme::Light => "light",
        Theme::Dark => "dark",
    };
    let units = match s.units {
        Units::Metric => "metric",
        Units::Imperial => "imperial",
    };
    println!("theme                 {theme}");
    println!("language              {language}");
    println!("units                 {units}");
    println!("autoDeleteExpired     {}", on_off(s.auto_delete_expired));
    println!("autoDeleteDays        {}", s.auto_delete_days);
    println!("aiConfidenceThreshold {}", s.ai_confidence_threshold);
    println!("defaultExpiryDays     {}", s.default_expiry_days);
    println!("notifications         {}", on_off(s.notifications.enabled));
    println!(
        "expiryReminder        {}",
        on_off(s.notifications.expiry_reminder)
    );
    println!(
        "dailyReminder         {}",
        on_off(s.notifications.daily_reminder)
    );
    println!("reminderTime          {}", s.notifications.reminder_time);
}

pub(crate) fn cmd_settings_show(db: &Database, json: bool) -> Result<()> {
    let settings = db.get_settings()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&settings)?);
    } else {
        print_settings(&settings);
    }
    Ok(())
}

pub(crate) fn cmd_settings_set(db: &Database, key: &str, value: &str, json: bool) -> Result<()> {
    let mut settings = db.get_settings()?;
    settings.set_field(key, value)?;
    let saved = db.update_settings(&settings)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&saved)?);
    } else {
        println!("Set {key} = {value}");
    }
    Ok(())
}

pub(crate) fn cmd_settings_reset(db: &Database, json: bool) -> Result<()> {
    let settings = db.reset_settings()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&settings)?);
    } else {
        println!("Settings restored to defaults.");
    }
    Ok(())
}
