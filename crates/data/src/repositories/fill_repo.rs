//! Fill ledger repository.
//!
//! The ledger is append-only. Inserts are idempotent on `history_id`.

use anyhow::Result;
use fight_exposure_core::NewFill;
use sqlx::PgPool;

use crate::models::FillRow;

const FILL_COLUMNS: &str = "id, history_id, order_id, fight_id, user_id, symbol, side, \
     amount, price, fee, pnl, leverage, executed_at, recorded_at";

/// Repository for `fight_fills`.
#[derive(Debug, Clone)]
pub struct FillRepository {
    pool: PgPool,
}

impl FillRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a fill unless its `history_id` is already present.
    ///
    /// Returns the new row, or `None` when the insert hit the unique key.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn insert_if_absent(&self, fill: &NewFill) -> Result<Option<FillRow>> {
        let row = sqlx::query_as::<_, FillRow>(&format!(
            r"
            INSERT INTO fight_fills
                (history_id, order_id, fight_id, user_id, symbol, side, amount, price, fee,
                 pnl, leverage, executed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (history_id) DO NOTHING
            RETURNING {FILL_COLUMNS}
            "
        ))
        .bind(&fill.history_id)
        .bind(&fill.order_id)
        .bind(&fill.fight_id)
        .bind(&fill.user_id)
        .bind(&fill.symbol)
        .bind(fill.side.as_str())
        .bind(fill.amount)
        .bind(fill.price)
        .bind(fill.fee)
        .bind(fill.pnl)
        .bind(fill.leverage)
        .bind(fill.executed_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Gets a fill by its exchange execution id.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn get_by_history_id(&self, history_id: &str) -> Result<Option<FillRow>> {
        let row = sqlx::query_as::<_, FillRow>(&format!(
            "SELECT {FILL_COLUMNS} FROM fight_fills WHERE history_id = $1"
        ))
        .bind(history_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Gets every fill for a participant in insertion order.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn get_for_participant(&self, fight_id: &str, user_id: &str) -> Result<Vec<FillRow>> {
        let rows = sqlx::query_as::<_, FillRow>(&format!(
            r"
            SELECT {FILL_COLUMNS}
            FROM fight_fills
            WHERE fight_id = $1 AND user_id = $2
            ORDER BY id ASC
            "
        ))
        .bind(fight_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
