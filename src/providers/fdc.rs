//! USDA FoodData Central API client
//!
//! Covers the three endpoints the pipeline consumes: the paginated branded
//! food list, the bulk details fetch, and the search endpoint used for
//! barcode-keyed lookups.

use serde::Deserialize;

use super::{send_with_retry, FetchOutcome, USER_AGENT};

/// Production API root
const FDC_BASE_URL: &str = "https://api.nal.usda.gov";

/// Partial record from the paginated list endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FdcListItem {
    pub fdc_id: Option<u64>,
    pub description: String,
}

/// Full detail record from the bulk details endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FdcFood {
    pub fdc_id: Option<u64>,
    pub description: String,
    pub brand_owner: String,
    pub gtin_upc: String,
    pub ingredients: String,
    pub food_nutrients: Vec<FdcNutrient>,
}

/// One entry of the structured nutrient list
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FdcNutrient {
    pub amount: f64,
    pub nutrient: FdcNutrientInfo,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FdcNutrientInfo {
    pub name: String,
    pub unit_name: String,
}

/// Search endpoint response envelope
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct FdcSearchResponse {
    foods: Vec<FdcFood>,
}

/// FoodData Central API client
#[derive(Clone)]
pub struct FdcClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl FdcClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(FDC_BASE_URL, api_key)
    }

    /// Client against a non-default API root (used by tests)
    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: super::http_client(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Fetch one page of the branded food list.
    ///
    /// `Empty` means the provider answered with zero items, which the
    /// ingestion loop reads as end-of-data.
    pub async fn list_page(
        &self,
        page_size: u32,
        page_number: u32,
    ) -> FetchOutcome<Vec<FdcListItem>> {
        let url = format!("{}/fdc/v1/foods/list", self.base_url);
        log::debug!("Fetching food list page {} from FDC", page_number);

        let request = self
            .client
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .query(&[("api_key", self.api_key.as_str()), ("dataType", "Branded")])
            .query(&[("pageSize", page_size), ("pageNumber", page_number)]);

        let Some(response) = send_checked(request, "Food list").await else {
            return FetchOutcome::Failed;
        };

        match response.json::<Vec<FdcListItem>>().await {
            Ok(items) if items.is_empty() => FetchOutcome::Empty,
            Ok(items) => FetchOutcome::Data(items),
            Err(e) => {
                log::warn!("Failed to decode food list response: {}", e);
                FetchOutcome::Failed
            }
        }
    }

    /// Fetch full details for a set of fdc ids in one bulk request
    pub async fn fetch_details(&self, ids: &[u64]) -> FetchOutcome<Vec<FdcFood>> {
        let url = format!("{}/fdc/v1/foods", self.base_url);
        log::debug!("Fetching details for {} foods from FDC", ids.len());

        let request = self
            .client
            .post(&url)
            .header("User-Agent", USER_AGENT)
            .query(&[("api_key", self.api_key.as_str())])
            .json(&serde_json::json!({ "fdcIds": ids }));

        let Some(response) = send_checked(request, "Food details").await else {
            return FetchOutcome::Failed;
        };

        match response.json::<Vec<FdcFood>>().await {
            Ok(foods) if foods.is_empty() => FetchOutcome::Empty,
            Ok(foods) => FetchOutcome::Data(foods),
            Err(e) => {
                log::warn!("Failed to decode food details response: {}", e);
                FetchOutcome::Failed
            }
        }
    }

    /// Look up a branded food by its GTIN/UPC barcode via the search
    /// endpoint. Only an exact `gtinUpc` match counts as a hit.
    pub async fn search_by_barcode(&self, barcode: &str) -> FetchOutcome<FdcFood> {
        let url = format!("{}/fdc/v1/foods/search", self.base_url);
        log::debug!("Searching FDC for barcode {}", barcode);

        let request = self
            .client
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("query", barcode),
                ("dataType", "Branded"),
            ]);

        let Some(response) = send_checked(request, "Food search").await else {
            return FetchOutcome::Failed;
        };

        match response.json::<FdcSearchResponse>().await {
            Ok(body) => match body.foods.into_iter().find(|f| f.gtin_upc == barcode) {
                Some(food) => FetchOutcome::Data(food),
                None => FetchOutcome::Empty,
            },
            Err(e) => {
                log::warn!("Failed to decode food search response: {}", e);
                FetchOutcome::Failed
            }
        }
    }
}

/// Send a request and check the status, logging any failure
async fn send_checked(request: reqwest::RequestBuilder, what: &str) -> Option<reqwest::Response> {
    match send_with_retry(request).await {
        Ok(response) if response.status().is_success() => Some(response),
        Ok(response) => {
            log::warn!("{} request returned HTTP {}", what, response.status());
            None
        }
        Err(e) => {
            log::warn!("{} request failed: {}", what, e);
            None
        }
    }
}

#[cfg(test)]
#[path = "fdc_tests.rs"]
mod tests;
