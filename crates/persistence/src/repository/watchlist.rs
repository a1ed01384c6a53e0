//! Watchlist repository
//!
//! Items are display-ordered by `position`; a new item appends at
//! max(position)+1. Symbols are unique per watchlist.

use crate::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WatchlistRecord {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WatchlistItemRecord {
    pub id: i64,
    pub watchlist_id: i64,
    pub symbol: String,
    pub asset_type: String,
    pub position: i64,
}

pub struct WatchlistRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> WatchlistRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user_id: i64, name: &str) -> DbResult<i64> {
        let result = sqlx::query("INSERT INTO watchlists (user_id, name) VALUES (?, ?)")
            .bind(user_id)
            .bind(name)
            .execute(self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get(&self, id: i64) -> DbResult<Option<WatchlistRecord>> {
        let record = sqlx::query_as::<_, WatchlistRecord>(
            "SELECT id, user_id, name FROM watchlists WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(record)
    }

    pub async fn list_for_user(&self, user_id: i64) -> DbResult<Vec<WatchlistRecord>> {
        let records = sqlx::query_as::<_, WatchlistRecord>(
            "SELECT id, user_id, name FROM watchlists WHERE user_id = ? ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(records)
    }

    /// Delete a watchlist (items cascade); returns false if absent
    pub async fn delete(&self, id: i64) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM watchlists WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Items in display order
    pub async fn get_items(&self, watchlist_id: i64) -> DbResult<Vec<WatchlistItemRecord>> {
        let items = sqlx::query_as::<_, WatchlistItemRecord>(
            r#"
            SELECT id, watchlist_id, symbol, asset_type, position
            FROM watchlist_items
            WHERE watchlist_id = ?
            ORDER BY position ASC
            "#,
        )
        .bind(watchlist_id)
        .fetch_all(self.pool)
        .await?;
        Ok(items)
    }

    /// Append an item at the end of the display order.
    ///
    /// Symbols are uppercased on write; a duplicate symbol in the same
    /// watchlist is a `Conflict` (no row created).
    pub async fn add_item(
        &self,
        watchlist_id: i64,
        symbol: &str,
        asset_type: &str,
    ) -> DbResult<WatchlistItemRecord> {
        let symbol = symbol.to_uppercase();

        let existing: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM watchlist_items WHERE watchlist_id = ? AND symbol = ?",
        )
        .bind(watchlist_id)
        .bind(&symbol)
        .fetch_one(self.pool)
        .await?;
        if existing.0 > 0 {
            return Err(DbError::Conflict(format!(
                "{symbol} already in watchlist"
            )));
        }

        // next position = max + 1, starting from 0
        let max_pos: (Option<i64>,) =
            sqlx::query_as("SELECT MAX(position) FROM watchlist_items WHERE watchlist_id = ?")
                .bind(watchlist_id)
                .fetch_one(self.pool)
                .await?;
        let position = max_pos.0.unwrap_or(-1) + 1;

        let result = sqlx::query(
            r#"
            INSERT INTO watchlist_items (watchlist_id, symbol, asset_type, position)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(watchlist_id)
        .bind(&symbol)
        .bind(asset_type)
        .bind(position)
        .execute(self.pool)
        .await?;

        Ok(WatchlistItemRecord {
            id: result.last_insert_rowid(),
            watchlist_id,
            symbol,
            asset_type: asset_type.to_string(),
            position,
        })
    }

    pub async fn get_item(&self, item_id: i64) -> DbResult<Option<WatchlistItemRecord>> {
        let item = sqlx::query_as::<_, WatchlistItemRecord>(
            "SELECT id, watchlist_id, symbol, asset_type, position FROM watchlist_items WHERE id = ?",
        )
        .bind(item_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(item)
    }

    pub async fn delete_item(&self, item_id: i64) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM watchlist_items WHERE id = ?")
            .bind(item_id)
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
        let wl = WatchlistRepository::new(db.pool())
            .create(user.id, "Tech")
            .await
            .unwrap();
        (db, wl)
    }

    #[tokio::test]
    async fn test_items_append_with_increasing_positions() {
        let (db, wl) = setup().await;
        let repo = WatchlistRepository::new(db.pool());

        // Insertion order, not alphabetical order, determines position
        repo.add_item(wl, "ZM", "stock").await.unwrap();
        repo.add_item(wl, "AAPL", "stock").await.unwrap();
        repo.add_item(wl, "MSFT", "stock").await.unwrap();

        let items = repo.get_items(wl).await.unwrap();
        let positions: Vec<i64> = items.iter().map(|i| i.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
        assert_eq!(items[0].symbol, "ZM");
        assert_eq!(items[2].symbol, "MSFT");
    }

    #[tokio::test]
    async fn test_duplicate_symbol_rejected() {
        let (db, wl) = setup().await;
        let repo = WatchlistRepository::new(db.pool());

        repo.add_item(wl, "BTC-USD", "crypto").await.unwrap();
        // Case-insensitive duplicate: symbols uppercased before the check
        let err = repo.add_item(wl, "btc-usd", "crypto").await.unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));

        assert_eq!(repo.get_items(wl).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_item_keeps_positions_of_survivors() {
        let (db, wl) = setup().await;
        let repo = WatchlistRepository::new(db.pool());

        let a = repo.add_item(wl, "SPY", "etf").await.unwrap();
        repo.add_item(wl, "QQQ", "etf").await.unwrap();

        assert!(repo.delete_item(a.id).await.unwrap());
        let items = repo.get_items(wl).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].symbol, "QQQ");

        // Next append still goes after the highest surviving position
        let next = repo.add_item(wl, "IWM", "etf").await.unwrap();
        assert_eq!(next.position, 2);
    }

    #[tokio::test]
    async fn test_watchlist_delete_cascades_to_items() {
        let (db, wl) = setup().await;
        let repo = WatchlistRepository::new(db.pool());
        repo.add_item(wl, "GLD", "commodity").await.unwrap();

        assert!(repo.delete(wl).await.unwrap());
        assert!(repo.get_items(wl).await.unwrap().is_empty());
    }
}
