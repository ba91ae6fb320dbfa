//! `menu-ingest` command line.
//!
//! A thin shim over the library: loads config, opens the database and wires
//! the shipped extractor, parser and store into a run.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use menu_ingest::config::load_config_or_default;
use menu_ingest::model::NewMenuUpload;
use menu_ingest::telemetry::{self, LogFormat};
use menu_ingest::{
    Database, DocumentExtractor, MenuStore, MenuUploadWorker, OpenAiMenuParser, RunCoordinator,
    RunOptions, SqliteStore,
};

#[derive(Parser, Debug)]
#[command(
    name = "menu-ingest",
    version,
    about = "Extract dishes from uploaded menu files into reviewable suggestions"
)]
struct Cli {
    /// Path to the JSON config file (defaults to ~/.menu-ingest/config.json)
    #[arg(long, global = true, env = "MENU_INGEST_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format: pretty or json
    #[arg(long, global = true, default_value = "pretty")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process pending uploads (or a single upload) and print the run summary as JSON
    Run {
        /// Process only this upload, whatever its status
        #[arg(long)]
        upload_id: Option<i64>,

        /// Call the extractor and parser but write nothing
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of pending uploads to pick up
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Queue a new pending upload
    Enqueue {
        /// http(s):// URL, file:// URL or local path of the menu file
        #[arg(long)]
        file_url: String,

        #[arg(long)]
        restaurant_id: i64,

        #[arg(long)]
        menu_id: Option<i64>,

        /// Original file name, used for type detection and as a parser hint
        #[arg(long)]
        file_name: Option<String>,
    },
}

fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".menu-ingest"))
        .unwrap_or_else(|| PathBuf::from(".menu-ingest"))
        .join("config.json")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    telemetry::init(cli.log_format).context("Failed to initialise logging")?;

    let config_path = cli.config.unwrap_or_else(default_config_path);
    let config = load_config_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db = Database::open(&config.database.path).context("Failed to open database")?;
    let store: Arc<dyn MenuStore> = Arc::new(SqliteStore::new(db));

    match cli.command {
        Command::Run {
            upload_id,
            dry_run,
            limit,
        } => {
            let extractor = Arc::new(DocumentExtractor::new(&config.extractor)?);
            let parser = Arc::new(
                OpenAiMenuParser::from_config(&config.ai)
                    .context("Failed to configure the AI parser")?,
            );
            let worker =
                MenuUploadWorker::new(Arc::clone(&store), extractor, parser, config.worker.clone());

            let summary = RunCoordinator::new(store, worker)
                .run(RunOptions {
                    upload_id,
                    dry_run,
                    limit,
                })
                .await?;

            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Enqueue {
            file_url,
            restaurant_id,
            menu_id,
            file_name,
        } => {
            let upload = store
                .insert_menu_upload(NewMenuUpload {
                    restaurant_id: Some(restaurant_id),
                    menu_id,
                    file_url,
                    file_name,
                    ..Default::default()
                })
                .await
                .context("Failed to insert upload")?;

            println!("{}", serde_json::to_string_pretty(&upload)?);
        }
    }

    Ok(())
}
