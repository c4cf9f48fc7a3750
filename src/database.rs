//! Database operations for food_sync
//!
//! Uses parameterized queries exclusively (no SQL string concatenation).
//! Batch writes are transactional: a failing row aborts the whole batch.

use rusqlite::{params, Connection, Transaction};
use serde::Serialize;

use crate::error::Result;
use crate::ingest::IngestSummary;
use crate::model::FoodRecord;

/// Initialize the database schema
///
/// Creates tables if they don't exist:
/// - `foods`: canonical food records keyed by id
/// - `ingest_runs`: one bookkeeping row per calendar day an ingestion ran
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- Canonical food records from both providers
        CREATE TABLE IF NOT EXISTS foods (
            id TEXT PRIMARY KEY CHECK (id <> ''),
            description TEXT NOT NULL,
            brand_owner TEXT NOT NULL,
            barcode TEXT NOT NULL,
            source TEXT NOT NULL,
            ingredients TEXT NOT NULL,
            nutrients TEXT NOT NULL,
            ingested_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Barcode lookups query this non-key column
        CREATE INDEX IF NOT EXISTS idx_foods_barcode ON foods(barcode);

        CREATE TABLE IF NOT EXISTS ingest_runs (
            run_date TEXT PRIMARY KEY,
            pages_scanned INTEGER NOT NULL,
            items_ingested INTEGER NOT NULL,
            completed_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;

    log::info!("Database schema initialized");
    Ok(())
}

/// Check whether a food record with this id exists
pub fn food_exists(conn: &Connection, id: &str) -> Result<bool> {
    let mut stmt = conn.prepare_cached("SELECT 1 FROM foods WHERE id = ?1 LIMIT 1")?;
    Ok(stmt.exists(params![id])?)
}

/// Filter a batch of candidate ids down to the ones not yet in the store.
///
/// Order-preserving, one point lookup per id against the primary key.
/// Idempotent as long as nothing is written between calls.
pub fn filter_new_ids(conn: &Connection, ids: &[String]) -> Result<Vec<String>> {
    let mut stmt = conn.prepare_cached("SELECT 1 FROM foods WHERE id = ?1 LIMIT 1")?;
    let mut new_ids = Vec::new();
    for id in ids {
        if !stmt.exists(params![id])? {
            new_ids.push(id.clone());
        }
    }
    Ok(new_ids)
}

/// Write a batch of food records in a single transaction.
///
/// INSERT OR REPLACE: an existing id is overwritten, not merged. Any row
/// failure rolls the whole batch back. Returns the number of rows written.
pub fn insert_foods_batch(conn: &mut Connection, foods: &[FoodRecord]) -> Result<usize> {
    let tx = conn.transaction()?;
    let count = insert_foods_tx(&tx, foods)?;
    tx.commit()?;
    log::info!("Wrote batch of {} food records", count);
    Ok(count)
}

fn insert_foods_tx(tx: &Transaction<'_>, foods: &[FoodRecord]) -> Result<usize> {
    let mut stmt = tx.prepare_cached(
        "INSERT OR REPLACE INTO foods
         (id, description, brand_owner, barcode, source, ingredients, nutrients)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;

    let mut count = 0;
    for food in foods {
        let nutrients_json = serde_json::to_string(&food.nutrients)?;
        stmt.execute(params![
            &food.id,
            &food.description,
            &food.brand_owner,
            &food.barcode,
            food.source,
            &food.ingredients,
            nutrients_json,
        ])?;
        count += 1;
    }
    Ok(count)
}

/// Upsert a single food record (lookup write-back path)
pub fn upsert_food(conn: &Connection, food: &FoodRecord) -> Result<()> {
    let nutrients_json = serde_json::to_string(&food.nutrients)?;
    let mut stmt = conn.prepare_cached(
        "INSERT OR REPLACE INTO foods
         (id, description, brand_owner, barcode, source, ingredients, nutrients)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    stmt.execute(params![
        &food.id,
        &food.description,
        &food.brand_owner,
        &food.barcode,
        food.source,
        &food.ingredients,
        nutrients_json,
    ])?;
    Ok(())
}

fn row_to_food(row: &rusqlite::Row<'_>) -> rusqlite::Result<FoodRecord> {
    let nutrients_json: String = row.get(6)?;
    let nutrients = serde_json::from_str(&nutrients_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(FoodRecord {
        id: row.get(0)?,
        description: row.get(1)?,
        brand_owner: row.get(2)?,
        barcode: row.get(3)?,
        source: row.get(4)?,
        ingredients: row.get(5)?,
        nutrients,
    })
}

/// Get a food record by its id
pub fn get_food_by_id(conn: &Connection, id: &str) -> Result<Option<FoodRecord>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, description, brand_owner, barcode, source, ingredients, nutrients
         FROM foods WHERE id = ?1",
    )?;
    let mut rows = stmt.query(params![id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_food(row)?)),
        None => Ok(None),
    }
}

/// Find the first food record carrying this barcode (non-key column)
pub fn find_food_by_barcode(conn: &Connection, barcode: &str) -> Result<Option<FoodRecord>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, description, brand_owner, barcode, source, ingredients, nutrients
         FROM foods WHERE barcode = ?1 LIMIT 1",
    )?;
    let mut rows = stmt.query(params![barcode])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_food(row)?)),
        None => Ok(None),
    }
}

/// Get total count of food records in the database
pub fn get_food_count(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM foods", [], |row| row.get(0))?)
}

// ── Ingest run bookkeeping ─────────────────────────────────────────────────

/// One recorded ingestion run (for the stats endpoint)
#[derive(Debug, Clone, Serialize)]
pub struct IngestRunRow {
    pub run_date: String,
    pub pages_scanned: u32,
    pub items_ingested: usize,
    pub completed_at: String,
}

/// Get today's date as a YYYY-MM-DD string (UTC)
pub fn today_date() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

/// Check whether an ingestion run was already recorded for today (UTC)
pub fn has_ingest_run_for_today(conn: &Connection) -> Result<bool> {
    let today = today_date();
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM ingest_runs WHERE run_date = ?1",
        params![&today],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Record a completed ingestion run under today's date
pub fn record_ingest_run(conn: &Connection, summary: &IngestSummary) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO ingest_runs
         (run_date, pages_scanned, items_ingested, completed_at)
         VALUES (?1, ?2, ?3, datetime('now'))",
        params![today_date(), summary.pages_scanned, summary.items_ingested],
    )?;
    Ok(())
}

/// Get the most recent recorded ingestion run
pub fn get_latest_ingest_run(conn: &Connection) -> Result<Option<IngestRunRow>> {
    let mut stmt = conn.prepare(
        "SELECT run_date, pages_scanned, items_ingested, completed_at
         FROM ingest_runs
         ORDER BY run_date DESC
         LIMIT 1",
    )?;
    let mut rows = stmt.query([])?;
    match rows.next()? {
        Some(row) => Ok(Some(IngestRunRow {
            run_date: row.get(0)?,
            pages_scanned: row.get(1)?,
            items_ingested: row.get(2)?,
            completed_at: row.get(3)?,
        })),
        None => Ok(None),
    }
}
