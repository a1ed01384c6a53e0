//! Alert repository
//!
//! Alerts carry the crossing state (`last_seen_price`) between evaluation
//! ticks; alert_events is the append-only trigger log.

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AlertRecord {
    pub id: i64,
    pub user_id: i64,
    pub symbol: String,
    pub rule_type: String,
    pub value: String,
    pub last_seen_price: Option<String>,
    pub is_active: bool,
    pub channel: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AlertEventRecord {
    pub id: i64,
    pub alert_id: i64,
    pub price: String,
    pub triggered_at: i64,
}

pub struct AlertRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AlertRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a price_cross alert; symbol is stored uppercased
    pub async fn create(&self, user_id: i64, symbol: &str, value: &str) -> DbResult<AlertRecord> {
        let result = sqlx::query(
            r#"
            INSERT INTO alerts (user_id, symbol, rule_type, value, channel)
            VALUES (?, ?, 'price_cross', ?, 'inapp')
            "#,
        )
        .bind(user_id)
        .bind(symbol.to_uppercase())
        .bind(value)
        .execute(self.pool)
        .await?;

        let alert = self
            .get(result.last_insert_rowid())
            .await?
            .ok_or(crate::DbError::NotFound { entity: "alert" })?;
        Ok(alert)
    }

    pub async fn get(&self, id: i64) -> DbResult<Option<AlertRecord>> {
        let alert = sqlx::query_as::<_, AlertRecord>(
            r#"
            SELECT id, user_id, symbol, rule_type, value, last_seen_price, is_active, channel
            FROM alerts
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(alert)
    }

    /// Active alerts for display, newest first
    pub async fn list_active(&self, user_id: i64) -> DbResult<Vec<AlertRecord>> {
        let alerts = sqlx::query_as::<_, AlertRecord>(
            r#"
            SELECT id, user_id, symbol, rule_type, value, last_seen_price, is_active, channel
            FROM alerts
            WHERE user_id = ? AND is_active = 1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(alerts)
    }

    /// Active price_cross alerts for one evaluation tick
    pub async fn active_price_cross(&self, user_id: i64) -> DbResult<Vec<AlertRecord>> {
        let alerts = sqlx::query_as::<_, AlertRecord>(
            r#"
            SELECT id, user_id, symbol, rule_type, value, last_seen_price, is_active, channel
            FROM alerts
            WHERE user_id = ? AND is_active = 1 AND rule_type = 'price_cross'
            ORDER BY id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(alerts)
    }

    /// Compare-and-swap the crossing state.
    ///
    /// The update only applies while `last_seen_price` still holds the value
    /// this tick read (`IS ?` so a NULL baseline compares correctly). A false
    /// return means a concurrent tick got there first; the caller must not
    /// record an event based on its stale comparison.
    pub async fn update_last_seen(
        &self,
        alert_id: i64,
        expected: Option<&str>,
        current: &str,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE alerts SET last_seen_price = ? WHERE id = ? AND last_seen_price IS ?",
        )
        .bind(current)
        .bind(alert_id)
        .bind(expected)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Append one immutable trigger event
    pub async fn insert_event(&self, alert_id: i64, price: &str) -> DbResult<i64> {
        let result = sqlx::query("INSERT INTO alert_events (alert_id, price) VALUES (?, ?)")
            .bind(alert_id)
            .bind(price)
            .execute(self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Most recent trigger events for an alert (display shows at most 5)
    pub async fn recent_events(&self, alert_id: i64, limit: i64) -> DbResult<Vec<AlertEventRecord>> {
        let events = sqlx::query_as::<_, AlertEventRecord>(
            r#"
            SELECT id, alert_id, price, triggered_at
            FROM alert_events
            WHERE alert_id = ?
            ORDER BY triggered_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(alert_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(events)
    }

    /// Soft-disable: the alert stops evaluating but keeps its event history
    pub async fn deactivate(&self, id: i64) -> DbResult<bool> {
        let result = sqlx::query("UPDATE alerts SET is_active = 0 WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Hard delete (events cascade)
    pub async fn delete(&self, id: i64) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM alerts WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::repository::UserRepository;

    async fn setup() -> (Database, i64) {
        let db = Database::in_memory().await.unwrap();
        let user = UserRepository::new(db.pool())
            .get_or_create_demo()
            .await
            .unwrap();
        (db, user.id)
    }

    #[tokio::test]
    async fn test_create_defaults() {
        let (db, user_id) = setup().await;
        let repo = AlertRepository::new(db.pool());

        let alert = repo.create(user_id, "aapl", "200").await.unwrap();
        assert_eq!(alert.symbol, "AAPL");
        assert_eq!(alert.rule_type, "price_cross");
        assert_eq!(alert.channel, "inapp");
        assert!(alert.is_active);
        assert!(alert.last_seen_price.is_none());
    }

    #[tokio::test]
    async fn test_cas_from_null_baseline() {
        let (db, user_id) = setup().await;
        let repo = AlertRepository::new(db.pool());
        let alert = repo.create(user_id, "BTC-USD", "100000").await.unwrap();

        // First tick: expected NULL applies
        assert!(repo.update_last_seen(alert.id, None, "95000").await.unwrap());
        // Replaying the same expectation no longer matches
        assert!(!repo.update_last_seen(alert.id, None, "96000").await.unwrap());

        let reloaded = repo.get(alert.id).await.unwrap().unwrap();
        assert_eq!(reloaded.last_seen_price.as_deref(), Some("95000"));
    }

    #[tokio::test]
    async fn test_cas_rejects_stale_expectation() {
        let (db, user_id) = setup().await;
        let repo = AlertRepository::new(db.pool());
        let alert = repo.create(user_id, "ETH-USD", "3000").await.unwrap();

        repo.update_last_seen(alert.id, None, "2900").await.unwrap();
        repo.update_last_seen(alert.id, Some("2900"), "3100")
            .await
            .unwrap();

        // A tick that still believes 2900 lost the race
        assert!(!repo
            .update_last_seen(alert.id, Some("2900"), "3200")
            .await
            .unwrap());
        let reloaded = repo.get(alert.id).await.unwrap().unwrap();
        assert_eq!(reloaded.last_seen_price.as_deref(), Some("3100"));
    }

    #[tokio::test]
    async fn test_recent_events_limited_and_newest_first() {
        let (db, user_id) = setup().await;
        let repo = AlertRepository::new(db.pool());
        let alert = repo.create(user_id, "NVDA", "150").await.unwrap();

        for price in ["151", "149", "152", "148", "153", "147", "154"] {
            repo.insert_event(alert.id, price).await.unwrap();
        }

        let events = repo.recent_events(alert.id, 5).await.unwrap();
        assert_eq!(events.len(), 5);
        assert_eq!(events[0].price, "154");
    }

    #[tokio::test]
    async fn test_deactivate_hides_from_evaluation() {
        let (db, user_id) = setup().await;
        let repo = AlertRepository::new(db.pool());
        let alert = repo.create(user_id, "SPY", "500").await.unwrap();

        assert_eq!(repo.active_price_cross(user_id).await.unwrap().len(), 1);
        assert!(repo.deactivate(alert.id).await.unwrap());
        assert!(repo.active_price_cross(user_id).await.unwrap().is_empty());
        // Still present for history
        assert!(repo.get(alert.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_cascades_events() {
        let (db, user_id) = setup().await;
        let repo = AlertRepository::new(db.pool());
        let alert = repo.create(user_id, "QQQ", "400").await.unwrap();
        repo.insert_event(alert.id, "401").await.unwrap();

        assert!(repo.delete(alert.id).await.unwrap());
        assert!(repo.recent_events(alert.id, 5).await.unwrap().is_empty());
    }
}
