//! Ingestion orchestrator
//!
//! Pages through the bulk provider's branded food list, bulk-fetches
//! details, filters out ids already in the store, normalizes the survivors
//! and writes them in one batch per page.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use serde::Serialize;

use crate::database;
use crate::error::Result;
use crate::model::FoodRecord;
use crate::providers::{FdcClient, FetchOutcome};

/// Paging bounds for one ingestion run
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub page_size: u32,
    /// Configured ceiling; the provider's true page count is not discovered
    pub max_pages: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_pages: 10,
        }
    }
}

/// Accounting for a completed ingestion run
#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub pages_scanned: u32,
    pub items_ingested: usize,
}

/// Run one bounded ingestion against the bulk provider.
///
/// An empty list page ends the run (end of data); a failed list request also
/// ends it early, with a warning, so a persistently failing provider can
/// never hang the run. A failed details fetch skips that one page. Store
/// errors abort the run and propagate.
pub async fn run_ingestion(
    db: &Arc<Mutex<Connection>>,
    fdc: &FdcClient,
    config: &IngestConfig,
) -> Result<IngestSummary> {
    let mut summary = IngestSummary {
        pages_scanned: 0,
        items_ingested: 0,
    };

    for page in 1..=config.max_pages {
        let items = match fdc.list_page(config.page_size, page).await {
            FetchOutcome::Data(items) => items,
            FetchOutcome::Empty => {
                log::info!("Page {} is empty, ending run", page);
                break;
            }
            FetchOutcome::Failed => {
                log::warn!("List request for page {} failed, ending run early", page);
                break;
            }
        };
        summary.pages_scanned = page;

        let ids: Vec<u64> = items.iter().filter_map(|item| item.fdc_id).collect();
        if ids.is_empty() {
            log::debug!("Page {} carried no usable ids", page);
            continue;
        }

        let details = match fdc.fetch_details(&ids).await {
            FetchOutcome::Data(details) => details,
            FetchOutcome::Empty => continue,
            FetchOutcome::Failed => {
                log::warn!("Details fetch for page {} failed, skipping page", page);
                continue;
            }
        };

        let written = {
            let mut conn = db.lock().unwrap();

            let candidate_ids: Vec<String> = details
                .iter()
                .filter_map(|food| food.fdc_id.map(|id| id.to_string()))
                .collect();
            let new_ids: HashSet<String> = database::filter_new_ids(&conn, &candidate_ids)?
                .into_iter()
                .collect();

            let records: Vec<FoodRecord> = details
                .iter()
                .filter(|food| {
                    food.fdc_id
                        .map(|id| new_ids.contains(&id.to_string()))
                        .unwrap_or(false)
                })
                .map(FoodRecord::from_bulk)
                .collect();

            if records.is_empty() {
                0
            } else {
                database::insert_foods_batch(&mut conn, &records)?
            }
        };

        summary.items_ingested += written;
        log::info!("Page {}: wrote {} new records", page, written);
    }

    log::info!(
        "Ingestion complete: {} items across {} pages",
        summary.items_ingested,
        summary.pages_scanned
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{get_food_by_id, get_food_count, init_schema, upsert_food};
    use crate::model::make_test_food;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_db() -> Arc<Mutex<Connection>> {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        Arc::new(Mutex::new(conn))
    }

    async fn mount_empty_list_fallback(server: &MockServer) {
        // Catch-all for pages the specific mocks don't cover
        Mock::given(method("GET"))
            .and(path("/fdc/v1/foods/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .with_priority(50)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn ingestion_skips_known_ids_and_counts_the_rest() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/fdc/v1/foods/list"))
            .and(query_param("pageNumber", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"fdcId": 1001, "description": "Granola"},
                {"fdcId": 1002, "description": "Oat Bar"}
            ])))
            .with_priority(1)
            .mount(&server)
            .await;
        mount_empty_list_fallback(&server).await;

        Mock::given(method("POST"))
            .and(path("/fdc/v1/foods"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"fdcId": 1001, "description": "Granola", "gtinUpc": "111"},
                {"fdcId": 1002, "description": "Oat Bar", "gtinUpc": "222"}
            ])))
            .mount(&server)
            .await;

        let db = test_db();
        // 1001 is already in the store; only 1002 is new
        upsert_food(&db.lock().unwrap(), &make_test_food("1001", "111")).unwrap();

        let fdc = FdcClient::with_base_url(server.uri(), "test-key");
        let summary = run_ingestion(&db, &fdc, &IngestConfig::default())
            .await
            .unwrap();

        assert_eq!(summary.items_ingested, 1);
        assert_eq!(summary.pages_scanned, 1);

        let conn = db.lock().unwrap();
        assert_eq!(get_food_count(&conn).unwrap(), 2);
        let food = get_food_by_id(&conn, "1002").unwrap().unwrap();
        assert_eq!(food.description, "Oat Bar");
        assert_eq!(food.barcode, "222");
    }

    #[tokio::test]
    async fn ingestion_stops_at_max_pages() {
        let server = MockServer::start().await;

        // Every page returns the same single item; every page after the
        // first dedups to nothing, but the loop must still stop at the cap.
        Mock::given(method("GET"))
            .and(path("/fdc/v1/foods/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"fdcId": 7, "description": "Evergreen"}
            ])))
            .expect(3)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/fdc/v1/foods"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"fdcId": 7, "description": "Evergreen"}
            ])))
            .mount(&server)
            .await;

        let db = test_db();
        let fdc = FdcClient::with_base_url(server.uri(), "test-key");
        let config = IngestConfig {
            page_size: 1,
            max_pages: 3,
        };
        let summary = run_ingestion(&db, &fdc, &config).await.unwrap();

        assert_eq!(summary.pages_scanned, 3);
        assert_eq!(summary.items_ingested, 1);
        assert_eq!(get_food_count(&db.lock().unwrap()).unwrap(), 1);
    }

    #[tokio::test]
    async fn ingestion_ends_run_on_failed_list_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fdc/v1/foods/list"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let db = test_db();
        let fdc = FdcClient::with_base_url(server.uri(), "test-key");
        let summary = run_ingestion(&db, &fdc, &IngestConfig::default())
            .await
            .unwrap();

        assert_eq!(summary.pages_scanned, 0);
        assert_eq!(summary.items_ingested, 0);
    }

    #[tokio::test]
    async fn ingestion_skips_page_on_failed_details() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/fdc/v1/foods/list"))
            .and(query_param("pageNumber", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"fdcId": 1001, "description": "Granola"}
            ])))
            .with_priority(1)
            .mount(&server)
            .await;
        mount_empty_list_fallback(&server).await;

        Mock::given(method("POST"))
            .and(path("/fdc/v1/foods"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let db = test_db();
        let fdc = FdcClient::with_base_url(server.uri(), "test-key");
        let summary = run_ingestion(&db, &fdc, &IngestConfig::default())
            .await
            .unwrap();

        // The failed details page wrote nothing, and the empty page 2 ended
        // the run rather than the failure itself
        assert_eq!(summary.items_ingested, 0);
        assert_eq!(summary.pages_scanned, 1);
        assert_eq!(get_food_count(&db.lock().unwrap()).unwrap(), 0);
    }

    #[tokio::test]
    async fn ingestion_ignores_list_items_without_ids() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/fdc/v1/foods/list"))
            .and(query_param("pageNumber", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"description": "No id here"}
            ])))
            .with_priority(1)
            .mount(&server)
            .await;
        mount_empty_list_fallback(&server).await;

        // No details mock: the orchestrator must not call it for an id-less page
        let db = test_db();
        let fdc = FdcClient::with_base_url(server.uri(), "test-key");
        let summary = run_ingestion(&db, &fdc, &IngestConfig::default())
            .await
            .unwrap();

        assert_eq!(summary.items_ingested, 0);
    }
}
