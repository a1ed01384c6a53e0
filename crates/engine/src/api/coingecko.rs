//! CoinGecko public API client — crypto prices and OHLC (no authentication)

use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use super::{build_http_client, get_json, UpstreamError};
use crate::types::Candle;

const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// OHLC window is a provider constraint, not configurable here
pub const OHLC_DAYS: u32 = 30;

/// CoinGecko market data client
#[derive(Clone)]
pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
}

/// Raw OHLC row: [timestamp_ms, open, high, low, close], no volume
#[derive(Debug, Deserialize)]
struct RawOhlc(i64, Decimal, Decimal, Decimal, Decimal);

impl Default for CoinGeckoClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CoinGeckoClient {
    pub fn new() -> Self {
        Self {
            client: build_http_client(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Current USD price for a coin id, None if the coin is missing from the
    /// response
    pub async fn simple_price(&self, coin: &str) -> Result<Option<Decimal>, UpstreamError> {
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies=usd",
            self.base_url, coin
        );
        debug!(coin, "Fetching CoinGecko price");

        // Shape: { "<coin>": { "usd": <number> } }
        let body: HashMap<String, HashMap<String, Decimal>> =
            get_json(&self.client, &url).await?;

        Ok(body.get(coin).and_then(|m| m.get("usd")).copied())
    }

    /// Trailing 30 days of daily-ish OHLC rows, ascending, millisecond
    /// timestamps as delivered
    pub async fn ohlc(&self, coin: &str) -> Result<Vec<Candle>, UpstreamError> {
        let url = format!(
            "{}/coins/{}/ohlc?vs_currency=usd&days={}",
            self.base_url, coin, OHLC_DAYS
        );
        debug!(coin, "Fetching CoinGecko OHLC");

        let rows: Vec<RawOhlc> = get_json(&self.client, &url).await?;

        let candles = rows
            .into_iter()
            .map(|RawOhlc(t, o, h, l, c)| Candle {
                t,
                o,
                h,
                l,
                c,
                v: None,
            })
            .collect();
        Ok(candles)
    }
}
