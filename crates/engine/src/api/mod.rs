//! Upstream market-data clients

pub mod coingecko;
pub mod finnhub;

pub use coingecko::CoinGeckoClient;
pub use finnhub::FinnhubClient;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::warn;

const MAX_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF_MS: u64 = 250;

/// Failure talking to an upstream provider
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("upstream returned no data")]
    NoData,
}

fn is_retryable(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
}

/// GET a JSON document with a bounded retry on 429/5xx.
///
/// Retries apply to GETs only (idempotent); everything the gateway issues is
/// a GET. Non-retryable statuses and transport errors surface immediately.
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
) -> Result<T, UpstreamError> {
    let mut attempt = 1;
    loop {
        let response = client.get(url).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        if is_retryable(status) && attempt < MAX_ATTEMPTS {
            warn!(%status, attempt, "retrying upstream request");
            tokio::time::sleep(std::time::Duration::from_millis(
                RETRY_BACKOFF_MS * attempt as u64,
            ))
            .await;
            attempt += 1;
            continue;
        }

        return Err(UpstreamError::Status {
            status: status.as_u16(),
            body,
        });
    }
}

/// Shared HTTP client with a bounded per-request timeout so a hung upstream
/// surfaces as a fetch failure instead of blocking its symbol forever
pub(crate) fn build_http_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .expect("Failed to build HTTP client")
}
