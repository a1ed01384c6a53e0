//! Core types shared across the engine

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which upstream produced a quote or candle series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Coingecko,
    Finnhub,
}

/// A point-in-time price for a symbol. Never persisted.
///
/// `last = None` means the upstream had no usable price; callers decide
/// whether that degrades to zero (valuation) or skips (alert evaluation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub last: Option<Decimal>,
    pub change: Option<Decimal>,
    pub change_pct: Option<Decimal>,
    pub provider: Provider,
}

/// A single OHLC candle; timestamps in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub t: i64,
    pub o: Decimal,
    pub h: Decimal,
    pub l: Decimal,
    pub c: Decimal,
    pub v: Option<Decimal>,
}

/// Candles for a symbol, ascending by time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandleSeries {
    pub symbol: String,
    pub tf: String,
    pub candles: Vec<Candle>,
    pub provider: Provider,
}

/// A single purchase lot, parsed from its persisted record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lot {
    pub id: i64,
    pub symbol: String,
    pub qty: Decimal,
    pub cost_basis: Decimal,
    pub fee: Decimal,
    pub trade_date: String,
}

impl Lot {
    /// Parse a persisted lot. Decimal columns are TEXT in SQLite; a value
    /// that fails to parse counts as zero rather than poisoning the batch.
    pub fn from_record(record: &persistence::repository::portfolio::LotRecord) -> Self {
        Self {
            id: record.id,
            symbol: record.symbol.clone(),
            qty: record.qty.parse().unwrap_or(Decimal::ZERO),
            cost_basis: record.cost_basis.parse().unwrap_or(Decimal::ZERO),
            fee: record.fee.parse().unwrap_or(Decimal::ZERO),
            trade_date: record.trade_date.clone(),
        }
    }
}

/// Per-symbol aggregate over a portfolio's lots. Derived, never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub qty: Decimal,
    /// Σ qty · cost_basis — average cost is the quantity-weighted mean
    pub total_cost: Decimal,
    pub total_fees: Decimal,
}

/// A valued position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub qty: Decimal,
    pub avg_cost: Decimal,
    pub market_value: Decimal,
    pub unrealized_pl: Decimal,
    pub unrealized_pl_pct: Decimal,
}

/// Portfolio-level totals, recomputed from summed values (not averaged
/// per-symbol percentages)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Totals {
    pub total_value: Decimal,
    pub total_unrealized_pl: Decimal,
    pub total_unrealized_pl_pct: Decimal,
}

/// Result of valuing a portfolio
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Valuation {
    pub holdings: Vec<Holding>,
    pub totals: Totals,
}

/// Outcome of one alert evaluation tick
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EvalSummary {
    pub checked: u32,
    pub triggered: u32,
}
