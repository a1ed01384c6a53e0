//! Alert crossing evaluation
//!
//! One tick: load a user's active price_cross alerts, fetch one quote per
//! distinct symbol (concurrent, all-settle), then evaluate each alert against
//! its prior `last_seen_price`. The state write is a compare-and-swap so two
//! overlapping ticks cannot interleave into a lost update; no lock is held
//! across the network fetch.

use persistence::repository::alerts::{AlertRecord, AlertRepository};
use persistence::SqlitePool;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::gateway::{fetch_price_map, QuoteSource};
use crate::types::EvalSummary;

/// The crossing rule.
///
/// A baseline tick (`last_seen = None`) never fires: there is no "from" state
/// to have crossed from. Otherwise a crossing is a transition across the
/// threshold in either direction, with the threshold itself counted as
/// "above" (`>=`), so a price sitting exactly on the line on both ticks does
/// not re-fire.
pub fn crossed(last_seen: Option<Decimal>, current: Decimal, threshold: Decimal) -> bool {
    let Some(last_seen) = last_seen else {
        return false;
    };

    let was_below = last_seen < threshold;
    let is_above = current >= threshold;
    let was_above = last_seen >= threshold;
    let is_below = current < threshold;

    (was_below && is_above) || (was_above && is_below)
}

/// Evaluate alerts against an already-fetched price map.
///
/// Every alert counts as checked. An alert whose symbol has no usable price
/// is skipped with no state change and retried next tick. Per-alert
/// persistence failures are logged and isolated; sibling alerts still
/// evaluate (each alert's update+event is its own unit of work).
pub async fn evaluate_with_prices(
    pool: &SqlitePool,
    alerts: &[AlertRecord],
    prices: &HashMap<String, Option<Decimal>>,
) -> EvalSummary {
    let repo = AlertRepository::new(pool);
    let mut triggered = 0u32;

    for alert in alerts {
        let Some(current) = prices.get(&alert.symbol).copied().flatten() else {
            debug!(alert_id = alert.id, symbol = %alert.symbol, "No price this tick, skipping");
            continue;
        };

        let threshold: Decimal = match alert.value.parse() {
            Ok(v) => v,
            Err(_) => {
                warn!(alert_id = alert.id, value = %alert.value, "Unparseable threshold");
                continue;
            }
        };
        let last_seen: Option<Decimal> = alert
            .last_seen_price
            .as_deref()
            .and_then(|s| s.parse().ok());

        let fired = crossed(last_seen, current, threshold);

        // last_seen_price advances every tick regardless of outcome; that is
        // what prevents re-firing while the price hovers on one side.
        let applied = match repo
            .update_last_seen(alert.id, alert.last_seen_price.as_deref(), &current.to_string())
            .await
        {
            Ok(applied) => applied,
            Err(e) => {
                warn!(alert_id = alert.id, error = %e, "Failed to update last seen price");
                continue;
            }
        };
        if !applied {
            // A concurrent tick already advanced the state; our comparison
            // is stale, so no event.
            debug!(alert_id = alert.id, "Lost the state race, skipping event");
            continue;
        }

        if fired {
            match repo.insert_event(alert.id, &current.to_string()).await {
                Ok(_) => {
                    info!(
                        alert_id = alert.id,
                        symbol = %alert.symbol,
                        price = %current,
                        threshold = %threshold,
                        "Alert crossing fired"
                    );
                    triggered += 1;
                }
                Err(e) => {
                    warn!(alert_id = alert.id, error = %e, "Failed to record alert event");
                }
            }
        }
    }

    EvalSummary {
        checked: alerts.len() as u32,
        triggered,
    }
}

/// One full evaluation tick for a user: load active alerts, fan out quote
/// fetches for the distinct symbols, evaluate. Designed to be driven by an
/// external scheduler or the on-demand API trigger; no internal timer.
pub async fn evaluate_alerts(
    pool: &SqlitePool,
    source: &dyn QuoteSource,
    user_id: i64,
) -> anyhow::Result<EvalSummary> {
    let repo = AlertRepository::new(pool);
    let alerts = repo.active_price_cross(user_id).await?;

    if alerts.is_empty() {
        return Ok(EvalSummary::default());
    }

    let mut symbols: Vec<String> = alerts.iter().map(|a| a.symbol.clone()).collect();
    symbols.sort();
    symbols.dedup();

    debug!(
        alerts = alerts.len(),
        symbols = symbols.len(),
        "Evaluating alerts"
    );
    let prices = fetch_price_map(source, &symbols).await;

    Ok(evaluate_with_prices(pool, &alerts, &prices).await)
}
