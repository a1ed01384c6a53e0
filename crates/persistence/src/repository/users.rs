//! Users repository — lazily-created demo user
//!
//! There is no authentication boundary: every request operates as the demo
//! user, created on first touch.

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

const DEMO_USER_EMAIL: &str = "demo@marketdesk.local";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
}

pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetch the demo user, creating it on first access
    pub async fn get_or_create_demo(&self) -> DbResult<UserRecord> {
        if let Some(user) = self.get_by_email(DEMO_USER_EMAIL).await? {
            return Ok(user);
        }

        // INSERT OR IGNORE so two racing first requests both succeed
        sqlx::query("INSERT OR IGNORE INTO users (email) VALUES (?)")
            .bind(DEMO_USER_EMAIL)
            .execute(self.pool)
            .await?;

        let user = self
            .get_by_email(DEMO_USER_EMAIL)
            .await?
            .ok_or(crate::DbError::NotFound { entity: "user" })?;
        Ok(user)
    }

    async fn get_by_email(&self, email: &str) -> DbResult<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>("SELECT id, email FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(self.pool)
            .await?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    #[tokio::test]
    async fn test_demo_user_created_once() {
        let db = Database::in_memory().await.unwrap();
        let repo = UserRepository::new(db.pool());

        let first = repo.get_or_create_demo().await.unwrap();
        let second = repo.get_or_create_demo().await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.email, DEMO_USER_EMAIL);
    }
}
