//! HTTP clients for the external nutrition data providers

pub mod fdc;
pub mod off;

pub use fdc::FdcClient;
pub use off::OffClient;

use std::time::Duration;

pub(crate) const USER_AGENT: &str = "food_sync/1.0";

/// Per-request timeout for all provider calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Backoff before the single retry of a failed request
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Outcome of a provider fetch.
///
/// Transport failures and non-success responses are reported as `Failed`
/// rather than raised, so the orchestrators always receive a result and can
/// still tell a failed request apart from true end-of-data (`Empty`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome<T> {
    /// The provider returned usable data
    Data(T),
    /// The provider answered but had nothing (end of data / not found)
    Empty,
    /// Transport error, non-success status, or undecodable body
    Failed,
}

impl<T> FetchOutcome<T> {
    /// Collapse to the fetched data, treating `Empty` and `Failed` as a miss
    pub fn into_data(self) -> Option<T> {
        match self {
            FetchOutcome::Data(data) => Some(data),
            _ => None,
        }
    }
}

/// Build the shared HTTP client with the request timeout applied
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .expect("HTTP client construction failed")
}

/// Send a request, retrying once after a short backoff on connect/timeout
/// errors. Status errors are not retried.
pub(crate) async fn send_with_retry(
    request: reqwest::RequestBuilder,
) -> reqwest::Result<reqwest::Response> {
    let retry = request.try_clone();
    match request.send().await {
        Err(err) if err.is_connect() || err.is_timeout() => {
            let Some(retry) = retry else {
                return Err(err);
            };
            log::debug!("Request failed ({}), retrying once", err);
            tokio::time::sleep(RETRY_DELAY).await;
            retry.send().await
        }
        result => result,
    }
}
