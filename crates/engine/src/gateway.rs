//! Quote Gateway — one uniform quote/candle surface over two upstream shapes
//!
//! Symbols are classified by pattern: `BASE-QUOTE` pairs (e.g. `BTC-USD`) go
//! to CoinGecko via a configurable coin-id lookup, bare tickers go to Finnhub.

use async_trait::async_trait;
use futures_util::future::join_all;
use rust_decimal::Decimal;
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

use crate::api::{CoinGeckoClient, FinnhubClient, UpstreamError};
use crate::types::{CandleSeries, Provider, Quote};

#[derive(Error, Debug)]
pub enum GatewayError {
    /// Crypto symbol with no provider coin id — a hard rejection, not a fallback
    #[error("symbol {0} has no mapped provider id")]
    UnmappedSymbol(String),

    #[error("no candle data for {0}")]
    NoData(String),

    #[error(transparent)]
    Upstream(UpstreamError),
}

impl GatewayError {
    fn from_upstream(symbol: &str, e: UpstreamError) -> Self {
        match e {
            UpstreamError::NoData => GatewayError::NoData(symbol.to_string()),
            other => GatewayError::Upstream(other),
        }
    }
}

/// True for crypto-pair symbols. The separator is the signal; bare
/// alphanumeric tickers are equities/ETFs.
pub fn is_crypto_symbol(symbol: &str) -> bool {
    symbol.contains('-')
}

/// Symbol → provider coin id lookup, injectable so pairs can be added
/// without touching gateway logic
#[derive(Debug, Clone)]
pub struct CoinResolver {
    map: HashMap<String, String>,
}

impl Default for CoinResolver {
    fn default() -> Self {
        Self::with_mapping([("BTC-USD", "bitcoin"), ("ETH-USD", "ethereum")])
    }
}

impl CoinResolver {
    pub fn with_mapping<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            map: pairs
                .into_iter()
                .map(|(sym, coin)| (sym.to_uppercase(), coin.to_string()))
                .collect(),
        }
    }

    pub fn resolve(&self, symbol: &str) -> Option<&str> {
        self.map.get(&symbol.to_uppercase()).map(String::as_str)
    }
}

/// Uniform price source consumed by valuation and alert evaluation.
/// Implemented by the live gateway; tests substitute a stub.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn quote(&self, symbol: &str) -> Result<Quote, GatewayError>;
    async fn candles(&self, symbol: &str, tf: &str) -> Result<CandleSeries, GatewayError>;
}

/// Live gateway over CoinGecko (crypto) and Finnhub (equities)
pub struct QuoteGateway {
    coingecko: CoinGeckoClient,
    finnhub: FinnhubClient,
    resolver: CoinResolver,
}

impl QuoteGateway {
    pub fn new(finnhub_token: impl Into<String>, resolver: CoinResolver) -> Self {
        Self {
            coingecko: CoinGeckoClient::new(),
            finnhub: FinnhubClient::new(finnhub_token),
            resolver,
        }
    }

    fn coin_id(&self, symbol: &str) -> Result<String, GatewayError> {
        self.resolver
            .resolve(symbol)
            .map(str::to_string)
            .ok_or_else(|| GatewayError::UnmappedSymbol(symbol.to_string()))
    }
}

#[async_trait]
impl QuoteSource for QuoteGateway {
    async fn quote(&self, symbol: &str) -> Result<Quote, GatewayError> {
        if is_crypto_symbol(symbol) {
            let coin = self.coin_id(symbol)?;
            let last = self
                .coingecko
                .simple_price(&coin)
                .await
                .map_err(|e| GatewayError::from_upstream(symbol, e))?;
            return Ok(Quote {
                symbol: symbol.to_uppercase(),
                last,
                change: None,
                change_pct: None,
                provider: Provider::Coingecko,
            });
        }

        let q = self
            .finnhub
            .quote(symbol)
            .await
            .map_err(|e| GatewayError::from_upstream(symbol, e))?;
        Ok(Quote {
            symbol: symbol.to_uppercase(),
            // Finnhub reports 0 for unknown symbols
            last: q.c.filter(|c| !c.is_zero()),
            change: q.d,
            change_pct: q.dp,
            provider: Provider::Finnhub,
        })
    }

    async fn candles(&self, symbol: &str, tf: &str) -> Result<CandleSeries, GatewayError> {
        if is_crypto_symbol(symbol) {
            let coin = self.coin_id(symbol)?;
            let candles = self
                .coingecko
                .ohlc(&coin)
                .await
                .map_err(|e| GatewayError::from_upstream(symbol, e))?;
            return Ok(CandleSeries {
                symbol: symbol.to_uppercase(),
                tf: tf.to_string(),
                candles,
                provider: Provider::Coingecko,
            });
        }

        let candles = self
            .finnhub
            .daily_candles(symbol)
            .await
            .map_err(|e| GatewayError::from_upstream(symbol, e))?;
        Ok(CandleSeries {
            symbol: symbol.to_uppercase(),
            tf: tf.to_string(),
            candles,
            provider: Provider::Finnhub,
        })
    }
}

/// Fetch one price per distinct symbol, all requests in flight concurrently,
/// waiting for every fetch to settle. A failed or priceless fetch yields
/// `None` for that symbol and never aborts the others.
pub async fn fetch_price_map(
    source: &dyn QuoteSource,
    symbols: &[String],
) -> HashMap<String, Option<Decimal>> {
    let fetches = symbols.iter().map(|symbol| async move {
        let price = match source.quote(symbol).await {
            Ok(quote) => quote.last,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Quote fetch failed");
                None
            }
        };
        (symbol.clone(), price)
    });

    join_all(fetches).await.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_symbol_classification() {
        assert!(is_crypto_symbol("BTC-USD"));
        assert!(is_crypto_symbol("SOL-EUR"));
        assert!(!is_crypto_symbol("AAPL"));
        assert!(!is_crypto_symbol("BRKB"));
    }

    #[test]
    fn test_default_resolver_mapping() {
        let resolver = CoinResolver::default();
        assert_eq!(resolver.resolve("BTC-USD"), Some("bitcoin"));
        assert_eq!(resolver.resolve("btc-usd"), Some("bitcoin"));
        assert_eq!(resolver.resolve("ETH-USD"), Some("ethereum"));
        assert_eq!(resolver.resolve("DOGE-USD"), None);
    }

    #[test]
    fn test_resolver_is_extendable() {
        let resolver = CoinResolver::with_mapping([("SOL-USD", "solana")]);
        assert_eq!(resolver.resolve("SOL-USD"), Some("solana"));
        assert_eq!(resolver.resolve("BTC-USD"), None);
    }

    struct FixedSource;

    #[async_trait]
    impl QuoteSource for FixedSource {
        async fn quote(&self, symbol: &str) -> Result<Quote, GatewayError> {
            match symbol {
                "FAIL" => Err(GatewayError::UnmappedSymbol(symbol.to_string())),
                "EMPTY" => Ok(Quote {
                    symbol: symbol.to_string(),
                    last: None,
                    change: None,
                    change_pct: None,
                    provider: Provider::Finnhub,
                }),
                _ => Ok(Quote {
                    symbol: symbol.to_string(),
                    last: Some(dec!(42)),
                    change: None,
                    change_pct: None,
                    provider: Provider::Finnhub,
                }),
            }
        }

        async fn candles(&self, symbol: &str, _tf: &str) -> Result<CandleSeries, GatewayError> {
            Err(GatewayError::NoData(symbol.to_string()))
        }
    }

    #[tokio::test]
    async fn test_price_map_settles_all_and_isolates_failures() {
        let symbols = vec!["AAPL".to_string(), "FAIL".to_string(), "EMPTY".to_string()];
        let prices = fetch_price_map(&FixedSource, &symbols).await;

        assert_eq!(prices.len(), 3);
        assert_eq!(prices["AAPL"], Some(dec!(42)));
        assert_eq!(prices["FAIL"], None);
        assert_eq!(prices["EMPTY"], None);
    }
}
