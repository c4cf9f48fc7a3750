//! Food Sync - Nutrition Data Ingestion & Barcode Lookup
//!
//! Syncs food-product records from USDA FoodData Central into SQLite and
//! serves barcode lookups. Runs continuously with daily sync scheduling.

use clap::Parser;
use food_sync::web::AppState;
use food_sync::{database, init_schema, run_ingestion, FdcClient, IngestConfig, OffClient};
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::interval;

/// Food product sync server - ingests nutrition data and serves barcode lookups
#[derive(Parser, Debug)]
#[command(name = "food_sync")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the SQLite database file
    #[arg(short, long, default_value_t = default_db_path())]
    database: String,

    /// FoodData Central API key
    #[arg(long, env = "FDC_API_KEY", default_value = "DEMO_KEY")]
    api_key: String,

    /// Page size for bulk list requests
    #[arg(long, default_value_t = 100)]
    page_size: u32,

    /// Maximum number of list pages per ingestion run
    #[arg(long, default_value_t = 10)]
    max_pages: u32,

    /// Run one ingestion and exit (default: run continuously with daily schedule)
    #[arg(long, default_value_t = false)]
    once: bool,

    /// Check interval in hours when running continuously
    #[arg(long, default_value_t = 1)]
    interval_hours: u64,

    /// Enable the HTTP API on specified port (default: disabled)
    #[arg(long)]
    web_port: Option<u16>,
}

/// Returns the default database path: ~/.local/share/food_sync/foods.db
fn default_db_path() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("food_sync")
        .join("foods.db")
        .to_string_lossy()
        .to_string()
}

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let db_path = PathBuf::from(&args.database);

    log::info!("Starting food_sync...");
    log::info!("Database path: {}", db_path.display());

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        if !parent.exists() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::error!("Failed to create database directory: {}", e);
                std::process::exit(1);
            }
            log::info!("Created directory: {}", parent.display());
        }
    }

    // Open database connection
    let conn = match Connection::open(&db_path) {
        Ok(conn) => {
            log::info!("Opened database: {}", db_path.display());
            conn
        }
        Err(e) => {
            log::error!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize database schema
    if let Err(e) = init_schema(&conn) {
        log::error!("Failed to initialize database schema: {}", e);
        std::process::exit(1);
    }

    // Wrap connection in Arc<Mutex> for thread-safe sharing
    let db = Arc::new(Mutex::new(conn));

    let fdc = FdcClient::new(args.api_key);
    let off = OffClient::new();
    let config = IngestConfig {
        page_size: args.page_size,
        max_pages: args.max_pages,
    };

    // Spawn API server if --web-port specified
    if let Some(port) = args.web_port {
        let state = AppState {
            db: Arc::clone(&db),
            fdc: fdc.clone(),
            off: off.clone(),
            ingest: config.clone(),
        };
        tokio::spawn(async move {
            if let Err(e) = food_sync::web::serve(state, port).await {
                log::error!("API server error: {}", e);
            }
        });
    }

    if args.once {
        // Run once and exit
        run_sync(&db, &fdc, &config).await;
    } else {
        // Run continuously with interval checks
        log::info!(
            "Running in daemon mode, checking every {} hour(s)",
            args.interval_hours
        );
        run_daemon(&db, &fdc, &config, args.interval_hours).await;
    }
}

/// Run the sync daemon - checks periodically and ingests when needed
async fn run_daemon(
    db: &Arc<Mutex<Connection>>,
    fdc: &FdcClient,
    config: &IngestConfig,
    interval_hours: u64,
) {
    let mut ticker = interval(Duration::from_secs(interval_hours * 3600));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_sync(db, fdc, config).await;
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Shutdown signal received, exiting");
                break;
            }
        }
    }
}

/// Run a single sync operation
async fn run_sync(db: &Arc<Mutex<Connection>>, fdc: &FdcClient, config: &IngestConfig) {
    // Check if ingestion already ran today
    let should_sync = {
        let conn = db.lock().unwrap();
        match database::has_ingest_run_for_today(&conn) {
            Ok(true) => {
                log::info!("Ingestion already ran today, skipping");
                false
            }
            Ok(false) => {
                log::info!("No ingestion run for today, starting...");
                true
            }
            Err(e) => {
                log::error!("Failed to check ingest history: {}", e);
                false
            }
        }
    };

    if !should_sync {
        return;
    }

    match run_ingestion(db, fdc, config).await {
        Ok(summary) => {
            {
                let conn = db.lock().unwrap();
                if let Err(e) = database::record_ingest_run(&conn, &summary) {
                    log::error!("Failed to record ingest run: {}", e);
                }
            }
            log::info!(
                "Sync completed: {} items across {} pages",
                summary.items_ingested,
                summary.pages_scanned
            );
        }
        Err(e) => log::error!("Ingestion failed: {}", e),
    }
}
