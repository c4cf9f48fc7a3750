//! Open Food Facts API client
//!
//! Single-resource GET keyed by a physical product barcode. The response
//! carries an optional `product` object; a missing or code-less product is
//! treated as not found.

use serde::Deserialize;

use super::{send_with_retry, FetchOutcome, USER_AGENT};

/// Production API root
const OFF_BASE_URL: &str = "https://world.openfoodfacts.org";

/// Product body from the Open Food Facts response.
///
/// The `nutriments` map carries mixed-typed values (numbers, strings, unit
/// tags); normalization keeps only the numeric entries.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OffProduct {
    pub code: String,
    pub product_name: String,
    pub brands: String,
    pub ingredients_text: String,
    pub nutriments: serde_json::Map<String, serde_json::Value>,
}

/// Response envelope with the optional product body
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OffResponse {
    product: Option<OffProduct>,
}

/// Open Food Facts API client
#[derive(Clone)]
pub struct OffClient {
    client: reqwest::Client,
    base_url: String,
}

impl OffClient {
    pub fn new() -> Self {
        Self::with_base_url(OFF_BASE_URL)
    }

    /// Client against a non-default API root (used by tests)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: super::http_client(),
            base_url: base_url.into(),
        }
    }

    /// Fetch a product by barcode.
    ///
    /// `Data` only when the body contains a product with a non-empty code.
    /// The provider answers 404 for unknown barcodes, which maps to `Empty`.
    pub async fn fetch_by_barcode(&self, barcode: &str) -> FetchOutcome<OffProduct> {
        let url = format!(
            "{}/api/v2/product/{}.json",
            self.base_url,
            urlencoding::encode(barcode)
        );
        log::debug!("Fetching product {} from Open Food Facts", barcode);

        let request = self.client.get(&url).header("User-Agent", USER_AGENT);

        let response = match send_with_retry(request).await {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Product request failed: {}", e);
                return FetchOutcome::Failed;
            }
        };

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return FetchOutcome::Empty;
        }
        if !response.status().is_success() {
            log::warn!("Product request returned HTTP {}", response.status());
            return FetchOutcome::Failed;
        }

        match response.json::<OffResponse>().await {
            Ok(body) => match body.product {
                Some(product) if !product.code.is_empty() => FetchOutcome::Data(product),
                _ => FetchOutcome::Empty,
            },
            Err(e) => {
                log::warn!("Failed to decode product response: {}", e);
                FetchOutcome::Failed
            }
        }
    }
}

impl Default for OffClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "off_tests.rs"]
mod tests;
