//! Lot aggregation and portfolio valuation
//!
//! Aggregation and valuation are pure; the async entry point only adds the
//! concurrent quote fan-out. A missing price degrades that symbol to a
//! market price of 0 rather than failing the whole valuation.

use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::gateway::{fetch_price_map, QuoteSource};
use crate::types::{Holding, Lot, Position, Totals, Valuation};

/// Collapse lots into per-symbol positions. Order independent; cost
/// accumulates as Σ qty·cost_basis so average cost is quantity-weighted.
pub fn aggregate_lots(lots: &[Lot]) -> HashMap<String, Position> {
    let mut positions: HashMap<String, Position> = HashMap::new();

    for lot in lots {
        let position = positions
            .entry(lot.symbol.clone())
            .or_insert_with(|| Position {
                symbol: lot.symbol.clone(),
                ..Position::default()
            });
        position.qty += lot.qty;
        position.total_cost += lot.qty * lot.cost_basis;
        position.total_fees += lot.fee;
    }

    positions
}

/// Value positions against a price map. Holdings are sorted by symbol;
/// totals are recomputed from the summed values, never from averaged
/// per-symbol percentages.
pub fn compute_holdings(
    positions: &HashMap<String, Position>,
    prices: &HashMap<String, Option<Decimal>>,
) -> Valuation {
    let hundred = Decimal::from(100);

    let mut holdings: Vec<Holding> = positions
        .values()
        .map(|position| {
            let avg_cost = if position.qty > Decimal::ZERO {
                position.total_cost / position.qty
            } else {
                Decimal::ZERO
            };
            let market_price = prices
                .get(&position.symbol)
                .copied()
                .flatten()
                .unwrap_or(Decimal::ZERO);
            let market_value = position.qty * market_price;
            let unrealized_pl = market_value - position.total_cost;
            let unrealized_pl_pct = if position.total_cost > Decimal::ZERO {
                unrealized_pl / position.total_cost * hundred
            } else {
                Decimal::ZERO
            };

            Holding {
                symbol: position.symbol.clone(),
                qty: position.qty,
                avg_cost,
                market_value,
                unrealized_pl,
                unrealized_pl_pct,
            }
        })
        .collect();
    holdings.sort_by(|a, b| a.symbol.cmp(&b.symbol));

    let total_value: Decimal = holdings.iter().map(|h| h.market_value).sum();
    let total_cost: Decimal = positions.values().map(|p| p.total_cost).sum();
    let total_unrealized_pl = total_value - total_cost;
    let total_unrealized_pl_pct = if total_cost > Decimal::ZERO {
        total_unrealized_pl / total_cost * hundred
    } else {
        Decimal::ZERO
    };

    Valuation {
        holdings,
        totals: Totals {
            total_value,
            total_unrealized_pl,
            total_unrealized_pl_pct,
        },
    }
}

/// Aggregate lots, fan out one quote fetch per distinct symbol, and value
/// the result
pub async fn value_portfolio(source: &dyn QuoteSource, lots: &[Lot]) -> Valuation {
    let positions = aggregate_lots(lots);
    let symbols: Vec<String> = positions.keys().cloned().collect();
    let prices = fetch_price_map(source, &symbols).await;
    compute_holdings(&positions, &prices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn lot(symbol: &str, qty: Decimal, cost: Decimal) -> Lot {
        Lot {
            id: 0,
            symbol: symbol.to_string(),
            qty,
            cost_basis: cost,
            fee: Decimal::ZERO,
            trade_date: "2024-01-15T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_aggregation_weights_average_cost_by_quantity() {
        let lots = vec![
            lot("AAPL", dec!(10), dec!(100)),
            lot("AAPL", dec!(5), dec!(130)),
        ];
        let positions = aggregate_lots(&lots);

        let aapl = &positions["AAPL"];
        assert_eq!(aapl.qty, dec!(15));
        assert_eq!(aapl.total_cost, dec!(1650));
        // (10*100 + 5*130) / 15 = 110, not the simple mean 115
        assert_eq!(aapl.total_cost / aapl.qty, dec!(110));
    }

    #[test]
    fn test_aggregation_is_order_independent() {
        let forward = vec![
            lot("VTI", dec!(3), dec!(200)),
            lot("BTC-USD", dec!(0.5), dec!(60000)),
            lot("VTI", dec!(1), dec!(220)),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();

        let a = aggregate_lots(&forward);
        let b = aggregate_lots(&reversed);
        assert_eq!(a["VTI"].total_cost, b["VTI"].total_cost);
        assert_eq!(a["BTC-USD"].qty, b["BTC-USD"].qty);
    }

    #[test]
    fn test_aggregation_sums_fees() {
        let mut first = lot("SPY", dec!(1), dec!(500));
        first.fee = dec!(1.5);
        let mut second = lot("SPY", dec!(1), dec!(510));
        second.fee = dec!(2);

        let positions = aggregate_lots(&[first, second]);
        assert_eq!(positions["SPY"].total_fees, dec!(3.5));
    }

    #[test]
    fn test_valuation_basic_pl() {
        let positions = aggregate_lots(&[lot("AAPL", dec!(10), dec!(100))]);
        let prices = HashMap::from([("AAPL".to_string(), Some(dec!(120)))]);

        let valuation = compute_holdings(&positions, &prices);
        let h = &valuation.holdings[0];
        assert_eq!(h.market_value, dec!(1200));
        assert_eq!(h.unrealized_pl, dec!(200));
        assert_eq!(h.unrealized_pl_pct, dec!(20));
        assert_eq!(valuation.totals.total_value, dec!(1200));
    }

    #[test]
    fn test_missing_price_degrades_to_zero() {
        let positions = aggregate_lots(&[lot("GME", dec!(4), dec!(25))]);
        let prices = HashMap::new();

        let valuation = compute_holdings(&positions, &prices);
        let h = &valuation.holdings[0];
        assert_eq!(h.market_value, Decimal::ZERO);
        // Valued at zero, the whole cost basis shows as unrealized loss
        assert_eq!(h.unrealized_pl, dec!(-100));
    }

    #[test]
    fn test_totals_recomputed_from_sums() {
        // +100% on a small position and -50% on a large one: averaging the
        // percentages would say +25%, the value-weighted truth is different
        let positions = aggregate_lots(&[
            lot("SMALL", dec!(1), dec!(100)),
            lot("LARGE", dec!(1), dec!(1000)),
        ]);
        let prices = HashMap::from([
            ("SMALL".to_string(), Some(dec!(200))),
            ("LARGE".to_string(), Some(dec!(500))),
        ]);

        let valuation = compute_holdings(&positions, &prices);
        assert_eq!(valuation.totals.total_value, dec!(700));
        assert_eq!(valuation.totals.total_unrealized_pl, dec!(-400));
        let pct = valuation.totals.total_unrealized_pl_pct;
        // -400/1100 ≈ -36.36%
        assert!(pct < dec!(-36) && pct > dec!(-37));
    }

    #[test]
    fn test_zero_quantity_guard() {
        let positions = HashMap::from([(
            "X".to_string(),
            Position {
                symbol: "X".to_string(),
                qty: Decimal::ZERO,
                total_cost: Decimal::ZERO,
                total_fees: Decimal::ZERO,
            },
        )]);
        let valuation = compute_holdings(&positions, &HashMap::new());
        assert_eq!(valuation.holdings[0].avg_cost, Decimal::ZERO);
        assert_eq!(valuation.totals.total_unrealized_pl_pct, Decimal::ZERO);
    }
}
