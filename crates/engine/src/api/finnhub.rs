//! Finnhub API client — equity/ETF quotes and daily candles (API-key auth)

use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use super::{build_http_client, get_json, UpstreamError};
use crate::types::Candle;

const DEFAULT_BASE_URL: &str = "https://finnhub.io/api/v1";

/// Equity candle window: trailing year of daily bars
pub const CANDLE_WINDOW_DAYS: i64 = 365;

/// Finnhub market data client
#[derive(Clone)]
pub struct FinnhubClient {
    client: Client,
    base_url: String,
    token: String,
}

/// GET /quote response: close, change, change percent
#[derive(Debug, Clone, Deserialize)]
pub struct FinnhubQuote {
    pub c: Option<Decimal>,
    pub d: Option<Decimal>,
    pub dp: Option<Decimal>,
}

/// GET /stock/candle response: parallel arrays indexed by position.
/// `s != "ok"` signals no data, in which case the arrays are absent.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCandles {
    pub s: String,
    #[serde(default)]
    pub t: Vec<i64>,
    #[serde(default)]
    pub o: Vec<Decimal>,
    #[serde(default)]
    pub h: Vec<Decimal>,
    #[serde(default)]
    pub l: Vec<Decimal>,
    #[serde(default)]
    pub c: Vec<Decimal>,
    #[serde(default)]
    pub v: Option<Vec<Decimal>>,
}

/// Zip Finnhub's parallel arrays into candle rows, converting second
/// timestamps to milliseconds. Rows missing from any price array are dropped.
pub fn zip_candles(raw: RawCandles) -> Result<Vec<Candle>, UpstreamError> {
    if raw.s != "ok" {
        return Err(UpstreamError::NoData);
    }

    let candles = raw
        .t
        .iter()
        .enumerate()
        .filter_map(|(i, &t)| {
            Some(Candle {
                t: t * 1000,
                o: *raw.o.get(i)?,
                h: *raw.h.get(i)?,
                l: *raw.l.get(i)?,
                c: *raw.c.get(i)?,
                v: raw.v.as_ref().and_then(|v| v.get(i)).copied(),
            })
        })
        .collect();
    Ok(candles)
}

impl FinnhubClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            client: build_http_client(),
            base_url: DEFAULT_BASE_URL.to_string(),
            token: token.into(),
        }
    }

    /// Current quote for a ticker
    pub async fn quote(&self, symbol: &str) -> Result<FinnhubQuote, UpstreamError> {
        let url = format!(
            "{}/quote?symbol={}&token={}",
            self.base_url, symbol, self.token
        );
        debug!(symbol, "Fetching Finnhub quote");

        get_json(&self.client, &url).await
    }

    /// Daily candles for the trailing year
    pub async fn daily_candles(&self, symbol: &str) -> Result<Vec<Candle>, UpstreamError> {
        let to = Utc::now().timestamp();
        let from = to - CANDLE_WINDOW_DAYS * 24 * 60 * 60;
        let url = format!(
            "{}/stock/candle?symbol={}&resolution=D&from={}&to={}&token={}",
            self.base_url, symbol, from, to, self.token
        );
        debug!(symbol, "Fetching Finnhub candles");

        let raw: RawCandles = get_json(&self.client, &url).await?;
        zip_candles(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn raw(s: &str) -> RawCandles {
        RawCandles {
            s: s.to_string(),
            t: vec![1_700_000_000, 1_700_086_400],
            o: vec![dec!(10), dec!(11)],
            h: vec![dec!(12), dec!(13)],
            l: vec![dec!(9), dec!(10)],
            c: vec![dec!(11), dec!(12)],
            v: Some(vec![dec!(1000), dec!(2000)]),
        }
    }

    #[test]
    fn test_zip_converts_seconds_to_millis() {
        let candles = zip_candles(raw("ok")).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].t, 1_700_000_000_000);
        assert_eq!(candles[0].o, dec!(10));
        assert_eq!(candles[1].c, dec!(12));
        assert_eq!(candles[1].v, Some(dec!(2000)));
    }

    #[test]
    fn test_zip_without_volume() {
        let mut input = raw("ok");
        input.v = None;
        let candles = zip_candles(input).unwrap();
        assert!(candles.iter().all(|c| c.v.is_none()));
    }

    #[test]
    fn test_no_data_status_is_error() {
        let err = zip_candles(raw("no_data")).unwrap_err();
        assert!(matches!(err, UpstreamError::NoData));
    }

    #[test]
    fn test_ragged_arrays_drop_incomplete_rows() {
        let mut input = raw("ok");
        input.c.pop();
        let candles = zip_candles(input).unwrap();
        assert_eq!(candles.len(), 1);
    }
}
