//! Order action repository.

use anyhow::Result;
use fight_exposure_core::OrderAction;
use sqlx::PgPool;

/// Repository for `order_actions`.
#[derive(Debug, Clone)]
pub struct OrderActionRepository {
    pool: PgPool,
}

impl OrderActionRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts an order action and returns the generated ID.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn insert(&self, action: &OrderAction) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            r"
            INSERT INTO order_actions (fight_id, user_id, symbol, action_type, success, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            ",
        )
        .bind(&action.fight_id)
        .bind(&action.user_id)
        .bind(&action.symbol)
        .bind(&action.action_type)
        .bind(action.success)
        .bind(action.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    /// Distinct symbols a participant touched during a fight: successful
    /// order actions plus any symbol with a recorded fill.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn traded_symbols(&self, fight_id: &str, user_id: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r"
            SELECT UPPER(symbol) FROM order_actions
            WHERE fight_id = $1 AND user_id = $2 AND success
            UNION
            SELECT UPPER(symbol) FROM fight_fills
            WHERE fight_id = $1 AND user_id = $2
            ",
        )
        .bind(fight_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(s,)| s).collect())
    }
}
