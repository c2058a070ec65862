mod commands;
mod config;
mod gemma;
mod logging;
mod server;

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use crate::commands::{
    FoodArgs, RecipeDraft, RecognizeOptions, cmd_ai_info, cmd_ai_ping, cmd_clear, cmd_export,
    cmd_food_add, cmd_food_delete, cmd_food_edit, cmd_food_list, cmd_food_purge, cmd_food_show,
    cmd_import, cmd_recipe_add, cmd_recipe_delete, cmd_recipe_list, cmd_recipe_recommend,
    cmd_recipe_show, cmd_recognize, cmd_remind, cmd_settings_reset, cmd_settings_set,
    cmd_settings_show, cmd_shelf_life, cmd_stats, json_error,
};
use crate::config::Config;
use crate::gemma::{GemmaClient, GemmaSettings};
use larder_core::db::Database;
use larder_core::gemma::{DEFAULT_API_BASE, DEFAULT_MODEL};
use larder_core::service;

#[derive(Parser)]
#[command(
    name = "larder",
    version,
    about = "Track what is in your kitchen before it goes off",
    long_about = "Track what is in your kitchen before it goes off.\n\n\
        Photograph your groceries to add them, get reminded before they expire,\n\
        and ask for recipes that use up what you already have."
)]
struct Cli {
    /// Verbose logging to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
    /// Database file (default: platform data directory)
    #[arg(long, global = true, env = "LARDER_DB", value_name = "PATH")]
    db: Option<PathBuf>,
    #[command(flatten)]
    ai: AiArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct AiArgs {
    /// Google generative-language API key
    #[arg(long, global = true, env = "GOOGLE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    /// Base URL of the generative-language API
    #[arg(long, global = true, env = "LARDER_AI_BASE", default_value = DEFAULT_API_BASE)]
    ai_base: String,
    /// Model id used for recognition and recipes
    #[arg(long, global = true, env = "LARDER_AI_MODEL", default_value = DEFAULT_MODEL)]
    ai_model: String,
    /// URL of a `larder serve` instance to route AI calls through instead of using a key
    #[arg(long, global = true, env = "LARDER_AI_PROXY", value_name = "URL")]
    ai_proxy: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the food inventory
    Food {
        #[command(subcommand)]
        command: FoodCommands,
    },
    /// Recognize foods in a photo (mock data when no AI backend is configured)
    Recognize {
        /// Image file (JPEG, PNG or WebP). Omit for a text-only guess
        image: Option<PathBuf>,
        /// Rotate clockwise by 90, 180 or 270 degrees before sending
        #[arg(long)]
        rotate: Option<i32>,
        /// Crop to "x,y,width,height" pixels (after rotation)
        #[arg(long)]
        crop: Option<String>,
        /// Send the image as-is instead of re-encoding as JPEG
        #[arg(long)]
        no_compress: bool,
        /// Add the detected foods to the inventory
        #[arg(long)]
        save: bool,
        /// With --save, also add detections below the confidence threshold
        #[arg(long)]
        all: bool,
    },
    /// Estimate shelf life for a category and freshness
    ShelfLife {
        /// Food category
        category: String,
        /// Freshness: fresh, good, fair, poor (default: good)
        #[arg(long)]
        freshness: Option<String>,
    },
    /// Manage recipes
    Recipe {
        #[command(subcommand)]
        command: RecipeCommands,
    },
    /// Show inventory statistics
    Stats,
    /// View or change settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
    /// Export all data as a JSON backup
    Export {
        /// Write to a file instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Restore data from a JSON backup
    Import {
        /// Backup file
        file: PathBuf,
    },
    /// Delete all stored data
    Clear {
        /// Keep settings
        #[arg(long)]
        keep_settings: bool,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// List foods that are expired or expiring soon
    Remind,
    /// Check the AI backend
    Ai {
        #[command(subcommand)]
        command: AiCommands,
    },
    /// Start the REST API server and AI proxy
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
enum FoodCommands {
    /// Add a food item
    Add {
        /// Food name
        name: String,
        #[command(flatten)]
        args: FoodArgs,
    },
    /// List foods, soonest expiry first
    List {
        /// Filter by name or notes
        #[arg(short, long)]
        search: Option<String>,
        /// Filter by category
        #[arg(short, long)]
        category: Option<String>,
        /// Filter by status: fresh, expiring, expired
        #[arg(long)]
        status: Option<String>,
        /// Only foods expiring within three days
        #[arg(long)]
        expiring: bool,
    },
    /// Show one food
    Show {
        /// Food id or unique id prefix
        id: String,
    },
    /// Change fields of a food
    Edit {
        /// Food id or unique id prefix
        id: String,
        /// New name
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        args: FoodArgs,
    },
    /// Delete a food
    Delete {
        /// Food id or unique id prefix
        id: String,
    },
    /// Delete foods expired for more than N days
    Purge {
        /// Days past expiry (default: autoDeleteDays setting)
        #[arg(short, long)]
        days: Option<u32>,
    },
}

#[derive(Subcommand)]
enum RecipeCommands {
    /// List saved recipes
    List {
        /// Filter by name, description or ingredient
        #[arg(short, long)]
        search: Option<String>,
        /// Filter by difficulty: easy, medium, hard
        #[arg(long)]
        difficulty: Option<String>,
    },
    /// Show a recipe and what you are missing for it
    Show {
        /// Recipe id or unique id prefix
        id: String,
    },
    /// Add a recipe by hand
    Add {
        /// Recipe name
        name: String,
        /// Short description
        #[arg(short, long)]
        description: Option<String>,
        /// Cooking time in minutes
        #[arg(long, default_value = "30")]
        time: u32,
        /// Servings
        #[arg(long, default_value = "2")]
        servings: u32,
        /// Difficulty: easy, medium, hard (default: easy)
        #[arg(long)]
        difficulty: Option<String>,
        /// Ingredient as "name:amount" (repeatable)
        #[arg(short, long = "ingredient", value_name = "NAME:AMOUNT")]
        ingredients: Vec<String>,
        /// Instruction step (repeatable, in order)
        #[arg(long = "step")]
        steps: Vec<String>,
        /// Tag (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },
    /// Delete a recipe
    Delete {
        /// Recipe id or unique id prefix
        id: String,
    },
    /// Ask for recipe ideas using the current inventory
    Recommend {
        /// Only use ingredients that are expiring soon
        #[arg(long)]
        expiring: bool,
        /// Save the suggestions as recipes
        #[arg(long)]
        save: bool,
    },
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Show current settings
    Show,
    /// Change one setting, e.g. `settings set autoDeleteDays 14`
    Set {
        /// Setting name (camelCase, kebab-case or snake_case)
        key: String,
        /// New value
        value: String,
    },
    /// Restore default settings
    Reset,
}

#[derive(Subcommand)]
enum AiCommands {
    /// Send a minimal request to check connectivity
    Ping,
    /// Describe the recognition model
    Info,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let json = cli.json;

    if let Err(e) = run(cli).await {
        if json {
            println!("{}", json_error(&format!("{e:#}")));
        } else {
            eprintln!("Error: {e:#}");
        }
        process::exit(1);
    }
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<()> {
    let json = cli.json;
    let config = Config::load(cli.db)?;
    let db = Database::open(&config.db_path)?;

    let purged = service::auto_purge(&db)?;
    if !purged.is_empty() {
        info!(count = purged.len(), "auto-deleted expired foods");
    }

    let gemma_settings = GemmaSettings {
        api_key: cli.ai.api_key.clone(),
        proxy_url: cli.ai.ai_proxy.clone(),
        api_base: cli.ai.ai_base.clone(),
        model: cli.ai.ai_model.clone(),
    };

    match cli.command {
        Commands::Food { command } => match command {
            FoodCommands::Add { name, args } => cmd_food_add(&db, &name, &args, json),
            FoodCommands::List {
                search,
                category,
                status,
                expiring,
            } => cmd_food_list(
                &db,
                search,
                category.as_deref(),
                status.as_deref(),
                expiring,
                json,
            ),
            FoodCommands::Show { id } => cmd_food_show(&db, &id, json),
            FoodCommands::Edit { id, name, args } => cmd_food_edit(&db, &id, name, &args, json),
            FoodCommands::Delete { id } => cmd_food_delete(&db, &id, json),
            FoodCommands::Purge { days } => cmd_food_purge(&db, days, json),
        },
        Commands::Recognize {
            image,
            rotate,
            crop,
            no_compress,
            save,
            all,
        } => {
            let client = GemmaClient::new(&gemma_settings)?;
            let opts = RecognizeOptions {
                rotate,
                crop,
                no_compress,
                save,
                include_low_confidence: all,
            };
            cmd_recognize(&db, &client, image.as_deref(), &opts, json).await
        }
        Commands::ShelfLife {
            category,
            freshness,
        } => cmd_shelf_life(&category, freshness.as_deref(), json),
        Commands::Recipe { command } => match command {
            RecipeCommands::List { search, difficulty } => {
                cmd_recipe_list(&db, search, difficulty.as_deref(), json)
            }
            RecipeCommands::Show { id } => cmd_recipe_show(&db, &id, json),
            RecipeCommands::Add {
                name,
                description,
                time,
                servings,
                difficulty,
                ingredients,
                steps,
                tags,
            } => cmd_recipe_add(
                &db,
                &name,
                RecipeDraft {
                    description,
                    cooking_time: time,
                    servings,
                    difficulty,
                    ingredients,
                    steps,
                    tags,
                },
                json,
            ),
            RecipeCommands::Delete { id } => cmd_recipe_delete(&db, &id, json),
            RecipeCommands::Recommend { expiring, save } => {
                let client = GemmaClient::new(&gemma_settings)?;
                cmd_recipe_recommend(&db, &client, expiring, save, json).await
            }
        },
        Commands::Stats => cmd_stats(&db, json),
        Commands::Settings { command } => match command {
            SettingsCommands::Show => cmd_settings_show(&db, json),
            SettingsCommands::Set { key, value } => cmd_settings_set(&db, &key, &value, json),
            SettingsCommands::Reset => cmd_settings_reset(&db, json),
        },
        Commands::Export { output } => cmd_export(&db, output.as_deref(), json),
        Commands::Import { file } => cmd_import(&db, &file, json),
        Commands::Clear { keep_settings, yes } => cmd_clear(&db, keep_settings, yes, json),
        Commands::Remind => cmd_remind(&db, json),
        Commands::Ai { command } => {
            let client = GemmaClient::new(&gemma_settings)?;
            match command {
                AiCommands::Ping => cmd_ai_ping(&client, json).await,
                AiCommands::Info => cmd_ai_info(&client, json),
            }
        }
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let api_key = if no_auth {
                None
            } else {
                Some(config.load_or_create_api_key()?.0)
            };
            let proxy = server::ProxyConfig {
                api_key: cli.ai.api_key,
                api_base: cli.ai.ai_base,
                model: cli.ai.ai_model,
            };
            server::start_server(db, port, &bind, api_key, proxy).await
        }
    }
}
