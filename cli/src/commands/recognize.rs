use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::json;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};
use tracing::debug;

use larder_core::assistant::{Assistant, ImageInput};
use larder_core::dates;
use larder_core::db::Database;
use larder_core::models::DetectedFood;
use larder_core::photo::{self, JPEG_QUALITY, MAX_HEIGHT, MAX_WIDTH};
use larder_core::service::{AcceptOutcome, accept_detections};

use super::helpers::parse_crop;

#[derive(Debug, Default)]
pub(crate) struct RecognizeOptions {
    /// Clockwise degrees, a multiple of 90.
    pub rotate: Option<i32>,
    /// `x,y,width,height`, applied after rotation.
    pub crop: Option<String>,
    pub no_compress: bool,
    pub save: bool,
    pub include_low_confidence: bool,
}

/// Read, check and transform an image the way it will be sent.
pub(crate) fn prepare_image(path: &Path, opts: &RecognizeOptions) -> Result<ImageInput> {
    let mut bytes =
        std::fs::read(path).with_context(|| format!("Failed to read image {}", path.display()))?;
    if bytes.is_empty() {
        bail!("Image file {} is empty", path.display());
    }
    let mut mime_type = photo::detect_mime(&bytes)
        .with_context(|| {
            format!(
                "{} is not a recognised image. Use JPEG, PNG or WebP",
                path.display()
            )
        })?
        .to_string();
    photo::validate_image(&bytes, &mime_type)?;

    if let Some(degrees) = opts.rotate {
        bytes = photo::rotate(&bytes, degrees)?;
    }
    if let Some(ref crop) = opts.crop {
        let (x, y, w, h) = parse_crop(crop)?;
        bytes = photo::crop(&bytes, x, y, w, h)?;
    }
    if !opts.no_compress {
        let before = bytes.len();
        bytes = photo::compress(&bytes, MAX_WIDTH, MAX_HEIGHT, JPEG_QUALITY)?;
        mime_type = photo::DEFAULT_MIME.to_string();
        debug!(
            before = %photo::format_file_size(before as u64),
            after = %photo::format_file_size(bytes.len() as u64),
            "compressed image"
        );
    }
    Ok(ImageInput { bytes, mime_type })
}

fn print_detections(foods: &[DetectedFood]) {
    #[derive(Tabled)]
    struct DetectionRow {
        #[tabled(rename = "#")]
        idx: usize,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Category")]
        category: String,
        #[tabled(rename = "Confidence")]
        confidence: String,
        #[tabled(rename = "Freshness")]
        freshness: String,
        #[tabled(rename = "Shelf life")]
        shelf_life: String,
    }

    let rows: Vec<DetectionRow> = foods
        .iter()
        .enumerate()
        .map(|(i, f)| DetectionRow {
            idx: i + 1,
            name: f.name.clone(),
            category: format!("{} {}", f.category.icon(), f.category.label()),
            confidence: format!("{:.0}%", f.confidence * 100.0),
            freshness: f.freshness.to_string(),
            shelf_life: format!("{} days", f.estimated_shelf_life),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..4)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) async fn cmd_recognize<A: Assistant>(
    db: &Database,
    assistant: &A,
    image: Option<&Path>,
    opts: &RecognizeOptions,
    json: bool,
) -> Result<()> {
    let input = image.map(|p| prepare_image(p, opts)).transpose()?;
    if let Some(ref input) = input {
        eprintln!(
            "Analyzing image ({})...",
            photo::format_file_size(input.bytes.len() as u64)
        );
    }
    let result = assistant.recognize_food(input.as_ref()).await;

    let outcome: Option<AcceptOutcome> = if opts.save {
        Some(accept_detections(
            db,
            &result.foods,
            opts.include_low_confidence,
            dates::today(),
        )?)
    } else {
        None
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "result": result, "saved": outcome }))?
        );
        return Ok(());
    }

    if result.foods.is_empty() {
        println!("No food recognised.");
    } else {
        print_detections(&result.foods);
        println!(
            "Overall confidence {:.0}%, took {} ms",
            result.confidence * 100.0,
            result.processing_time
        );
    }

    match outcome {
        Some(outcome) => {
            for food in &outcome.added {
                println!("Saved {} (expires {})", food.name, food.expiry_date);
            }
            for skipped in &outcome.skipped {
                println!(
                    "Skipped {} ({:.0}% is below the confidence threshold, use --all to keep it)",
                    skipped.name,
                    skipped.confidence * 100.0
                );
            }
        }
        None if !result.foods.is_empty() => {
            eprintln!("Run again with --save to add these to your inventory.");
        }
        None => {}
    }
    Ok(())
}
