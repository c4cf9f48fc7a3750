//! Food Sync - Nutrition Data Ingestion & Barcode Lookup
//!
//! Ingests food-product records from the USDA FoodData Central API and the
//! Open Food Facts catalog into a SQLite database, and resolves barcode
//! lookups through a store -> FDC -> Open Food Facts fallback with
//! write-back.

pub mod database;
pub mod error;
pub mod ingest;
pub mod lookup;
pub mod model;
pub mod providers;
pub mod web;

pub use database::init_schema;
pub use error::{Result, SyncError};
pub use ingest::{run_ingestion, IngestConfig, IngestSummary};
pub use lookup::lookup_barcode;
pub use model::{FoodRecord, Nutrient, Source};
pub use providers::{FdcClient, FetchOutcome, OffClient};
