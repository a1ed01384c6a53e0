//! Portfolio and lot repository
//!
//! Lots are immutable purchase records owned by a portfolio; deleting a
//! portfolio cascades to its lots.

use crate::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PortfolioRecord {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
}

/// A single purchase lot. Decimal columns are TEXT in SQLite; callers parse
/// them into `rust_decimal::Decimal` at the edge.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LotRecord {
    pub id: i64,
    pub portfolio_id: i64,
    pub symbol: String,
    pub qty: String,
    pub cost_basis: String,
    pub fee: String,
    pub trade_date: String,
}

/// Fields for inserting a new lot
#[derive(Debug, Clone)]
pub struct NewLot {
    pub symbol: String,
    pub qty: String,
    pub cost_basis: String,
    pub fee: String,
    pub trade_date: String,
}

pub struct PortfolioRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> PortfolioRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user_id: i64, name: &str) -> DbResult<i64> {
        let result = sqlx::query("INSERT INTO portfolios (user_id, name) VALUES (?, ?)")
            .bind(user_id)
            .bind(name)
            .execute(self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get(&self, id: i64) -> DbResult<Option<PortfolioRecord>> {
        let record = sqlx::query_as::<_, PortfolioRecord>(
            "SELECT id, user_id, name FROM portfolios WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(record)
    }

    /// All lots for a portfolio, oldest trade first
    pub async fn get_lots(&self, portfolio_id: i64) -> DbResult<Vec<LotRecord>> {
        let lots = sqlx::query_as::<_, LotRecord>(
            r#"
            SELECT id, portfolio_id, symbol, qty, cost_basis, fee, trade_date
            FROM lots
            WHERE portfolio_id = ?
            ORDER BY trade_date ASC, id ASC
            "#,
        )
        .bind(portfolio_id)
        .fetch_all(self.pool)
        .await?;
        Ok(lots)
    }

    /// Insert a lot; symbol is stored uppercased
    pub async fn add_lot(&self, portfolio_id: i64, lot: &NewLot) -> DbResult<LotRecord> {
        let result = sqlx::query(
            r#"
            INSERT INTO lots (portfolio_id, symbol, qty, cost_basis, fee, trade_date)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(portfolio_id)
        .bind(lot.symbol.to_uppercase())
        .bind(&lot.qty)
        .bind(&lot.cost_basis)
        .bind(&lot.fee)
        .bind(&lot.trade_date)
        .execute(self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.get_lot(id)
            .await?
            .ok_or(DbError::NotFound { entity: "lot" })
    }

    pub async fn get_lot(&self, lot_id: i64) -> DbResult<Option<LotRecord>> {
        let lot = sqlx::query_as::<_, LotRecord>(
            "SELECT id, portfolio_id, symbol, qty, cost_basis, fee, trade_date FROM lots WHERE id = ?",
        )
        .bind(lot_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(lot)
    }

    /// Delete a lot; returns false if it did not exist
    pub async fn delete_lot(&self, lot_id: i64) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM lots WHERE id = ?")
            .bind(lot_id)
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

    fn lot(symbol: &str, qty: &str, cost: &str) -> NewLot {
        NewLot {
            symbol: symbol.to_string(),
            qty: qty.to_string(),
            cost_basis: cost.to_string(),
            fee: "0".to_string(),
            trade_date: "2024-01-15T00:00:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn test_add_and_list_lots() {
        let (db, user_id) = setup().await;
        let repo = PortfolioRepository::new(db.pool());
        let pf = repo.create(user_id, "My Portfolio").await.unwrap();

        repo.add_lot(pf, &lot("aapl", "10", "100")).await.unwrap();
        repo.add_lot(pf, &lot("AAPL", "5", "130")).await.unwrap();

        let lots = repo.get_lots(pf).await.unwrap();
        assert_eq!(lots.len(), 2);
        // Symbols uppercased on write
        assert!(lots.iter().all(|l| l.symbol == "AAPL"));
    }

    #[tokio::test]
    async fn test_delete_lot() {
        let (db, user_id) = setup().await;
        let repo = PortfolioRepository::new(db.pool());
        let pf = repo.create(user_id, "My Portfolio").await.unwrap();
        let inserted = repo.add_lot(pf, &lot("MSFT", "1", "400")).await.unwrap();

        assert!(repo.delete_lot(inserted.id).await.unwrap());
        assert!(!repo.delete_lot(inserted.id).await.unwrap());
        assert!(repo.get_lots(pf).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_portfolio_delete_cascades_to_lots() {
        let (db, user_id) = setup().await;
        let repo = PortfolioRepository::new(db.pool());
        let pf = repo.create(user_id, "My Portfolio").await.unwrap();
        repo.add_lot(pf, &lot("VTI", "2", "250")).await.unwrap();

        sqlx::query("DELETE FROM portfolios WHERE id = ?")
            .bind(pf)
            .execute(db.pool())
            .await
            .unwrap();

        assert!(repo.get_lots(pf).await.unwrap().is_empty());
    }
}
