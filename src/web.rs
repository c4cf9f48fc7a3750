//! HTTP API for triggering ingestion runs and looking up barcodes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use rusqlite::Connection;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;

use crate::database;
use crate::ingest::{run_ingestion, IngestConfig, IngestSummary};
use crate::lookup::lookup_barcode;
use crate::model::FoodRecord;
use crate::providers::{FdcClient, OffClient};

/// Shared application state (thread-safe database connection + API clients)
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub fdc: FdcClient,
    pub off: OffClient,
    pub ingest: IngestConfig,
}

/// API response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// POST /api/ingest - run a bounded ingestion and report the totals
async fn ingest_handler(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<IngestSummary>>, StatusCode> {
    match run_ingestion(&state.db, &state.fdc, &state.ingest).await {
        Ok(summary) => {
            let conn = state.db.lock().unwrap();
            if let Err(e) = database::record_ingest_run(&conn, &summary) {
                log::error!("Failed to record ingest run: {}", e);
            }
            Ok(Json(ApiResponse::ok(summary)))
        }
        Err(e) => {
            log::error!("Ingestion failed: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /api/lookup/{barcode} - resolve a barcode through the fallback tiers
async fn lookup_handler(
    State(state): State<AppState>,
    Path(barcode): Path<String>,
) -> (StatusCode, Json<ApiResponse<FoodRecord>>) {
    match lookup_barcode(&state.db, &state.fdc, &state.off, &barcode).await {
        Ok(Some(food)) => (StatusCode::OK, Json(ApiResponse::ok(food))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::err("Food item not found")),
        ),
        Err(e) => {
            log::error!("Lookup failed for {}: {}", barcode, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err("Lookup failed")),
            )
        }
    }
}

/// Store totals and last recorded run
#[derive(Serialize)]
struct Stats {
    foods: i64,
    last_run: Option<database::IngestRunRow>,
}

/// GET /api/stats
async fn stats_handler(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Stats>>, StatusCode> {
    let conn = state.db.lock().unwrap();
    match (
        database::get_food_count(&conn),
        database::get_latest_ingest_run(&conn),
    ) {
        (Ok(foods), Ok(last_run)) => Ok(Json(ApiResponse::ok(Stats { foods, last_run }))),
        (Err(e), _) | (_, Err(e)) => {
            log::error!("Stats query failed: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Build the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/ingest", post(ingest_handler))
        .route("/api/lookup/{barcode}", get(lookup_handler))
        .route("/api/stats", get(stats_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the API server (async)
///
/// Binds to 0.0.0.0 (all interfaces) to work with Docker port mapping.
pub async fn serve(state: AppState, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(state);
    let addr = format!("0.0.0.0:{}", port);

    log::info!("API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
