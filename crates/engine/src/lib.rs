//! Marketdesk Engine — quote gateway, portfolio valuation, alert evaluation
//!
//! Provides:
//! - Quote gateway normalizing CoinGecko (crypto) and Finnhub (equities)
//!   into one quote/candle shape
//! - Lot aggregation and portfolio valuation
//! - Price-cross alert evaluation with stateful crossing detection

pub mod alerts;
pub mod api;
pub mod gateway;
pub mod portfolio;
pub mod types;

// Re-exports for convenience
pub use alerts::{crossed, evaluate_alerts};
pub use api::{CoinGeckoClient, FinnhubClient, UpstreamError};
pub use gateway::{
    fetch_price_map, is_crypto_symbol, CoinResolver, GatewayError, QuoteGateway, QuoteSource,
};
pub use portfolio::{aggregate_lots, compute_holdings, value_portfolio};
pub use types::*;
