//! Barcode lookup orchestrator
//!
//! Three tiers, tried in order and short-circuiting on the first hit:
//! the persisted store, the bulk provider's barcode search, then the
//! barcode catalog. Provider hits are written back so the next lookup is
//! served from the store.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::database;
use crate::error::Result;
use crate::model::FoodRecord;
use crate::providers::{FdcClient, OffClient};

/// Resolve a barcode to a canonical food record.
///
/// `Ok(None)` is the expected miss, not an error. Provider failures are
/// treated as tier misses; store failures propagate.
pub async fn lookup_barcode(
    db: &Arc<Mutex<Connection>>,
    fdc: &FdcClient,
    off: &OffClient,
    barcode: &str,
) -> Result<Option<FoodRecord>> {
    // An empty barcode would match every bulk record that lacks one
    if barcode.is_empty() {
        return Ok(None);
    }

    let cached = {
        let conn = db.lock().unwrap();
        database::find_food_by_barcode(&conn, barcode)?
    };
    if let Some(food) = cached {
        log::debug!("Lookup for {} served from the store", barcode);
        return Ok(Some(food));
    }

    if let Some(food) = fdc
        .search_by_barcode(barcode)
        .await
        .into_data()
        .filter(|food| food.fdc_id.is_some())
    {
        let record = FoodRecord::from_bulk(&food);
        let conn = db.lock().unwrap();
        database::upsert_food(&conn, &record)?;
        log::info!(
            "Lookup for {} resolved via FDC search, persisted as {}",
            barcode,
            record.id
        );
        return Ok(Some(record));
    }

    if let Some(product) = off.fetch_by_barcode(barcode).await.into_data() {
        let record = FoodRecord::from_barcode(&product);
        let conn = db.lock().unwrap();
        database::upsert_food(&conn, &record)?;
        log::info!(
            "Lookup for {} resolved via Open Food Facts, persisted as {}",
            barcode,
            record.id
        );
        return Ok(Some(record));
    }

    log::info!("Lookup for {} missed all tiers", barcode);
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{get_food_by_id, get_food_count, init_schema, upsert_food};
    use crate::model::{make_test_food, Source};
    use serde_json::json;
    use wiremock::matchers::{any, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_db() -> Arc<Mutex<Connection>> {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        Arc::new(Mutex::new(conn))
    }

    #[tokio::test]
    async fn store_hit_short_circuits_without_provider_calls() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let db = test_db();
        upsert_food(&db.lock().unwrap(), &make_test_food("1001", "555")).unwrap();

        let fdc = FdcClient::with_base_url(server.uri(), "test-key");
        let off = OffClient::with_base_url(server.uri());
        let found = lookup_barcode(&db, &fdc, &off, "555").await.unwrap();

        assert_eq!(found.unwrap().id, "1001");
        // Still exactly one record; no write-back happened
        assert_eq!(get_food_count(&db.lock().unwrap()).unwrap(), 1);
    }

    #[tokio::test]
    async fn falls_back_to_barcode_provider_and_writes_back() {
        let server = MockServer::start().await;

        // Tier 2 answers, but with a food whose gtinUpc does not match;
        // only an exact match may count as a hit
        Mock::given(method("GET"))
            .and(path("/fdc/v1/foods/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "foods": [{"fdcId": 9, "description": "Other", "gtinUpc": "999"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/product/012345.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": 1,
                "product": {
                    "code": "012345",
                    "product_name": "Test Snack",
                    "brands": "TestCo",
                    "nutriments": {"energy": 100, "brand_tag": "xyz"}
                }
            })))
            .mount(&server)
            .await;

        let db = test_db();
        let fdc = FdcClient::with_base_url(server.uri(), "test-key");
        let off = OffClient::with_base_url(server.uri());
        let found = lookup_barcode(&db, &fdc, &off, "012345")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.id, "OFF_012345");
        assert_eq!(found.description, "Test Snack");
        assert_eq!(found.source, Source::Barcode);
        assert_eq!(found.nutrients.len(), 1);
        assert_eq!(found.nutrients[0].name, "energy");

        // Write-back: the record is now served from the store
        let conn = db.lock().unwrap();
        let persisted = get_food_by_id(&conn, "OFF_012345").unwrap().unwrap();
        assert_eq!(persisted.description, "Test Snack");
    }

    #[tokio::test]
    async fn bulk_search_hit_persists_under_native_id() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/fdc/v1/foods/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "foods": [{
                    "fdcId": 777,
                    "description": "Granola",
                    "brandOwner": "Acme Foods",
                    "gtinUpc": "0123456789"
                }]
            })))
            .mount(&server)
            .await;
        // The barcode catalog must not be consulted after a tier-2 hit
        Mock::given(method("GET"))
            .and(path("/api/v2/product/0123456789.json"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let db = test_db();
        let fdc = FdcClient::with_base_url(server.uri(), "test-key");
        let off = OffClient::with_base_url(server.uri());
        let found = lookup_barcode(&db, &fdc, &off, "0123456789")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.id, "777");
        assert_eq!(found.source, Source::Bulk);

        let conn = db.lock().unwrap();
        assert!(get_food_by_id(&conn, "777").unwrap().is_some());
    }

    #[tokio::test]
    async fn all_tiers_missing_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fdc/v1/foods/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"foods": []})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/product/000.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let db = test_db();
        let fdc = FdcClient::with_base_url(server.uri(), "test-key");
        let off = OffClient::with_base_url(server.uri());
        let found = lookup_barcode(&db, &fdc, &off, "000").await.unwrap();

        assert!(found.is_none());
        assert_eq!(get_food_count(&db.lock().unwrap()).unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_barcode_is_not_found_without_any_calls() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let db = test_db();
        // A bulk record with no barcode must not match the empty string
        upsert_food(&db.lock().unwrap(), &make_test_food("1001", "")).unwrap();

        let fdc = FdcClient::with_base_url(server.uri(), "test-key");
        let off = OffClient::with_base_url(server.uri());
        let found = lookup_barcode(&db, &fdc, &off, "").await.unwrap();
        assert!(found.is_none());
    }
}
