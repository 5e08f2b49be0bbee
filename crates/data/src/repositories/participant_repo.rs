//! Participant repository.
//!
//! Owns the two writes the exposure engine makes to `fight_participants`:
//! the monotonic watermark raise and the one-shot blocked symbol snapshot.

use anyhow::Result;
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::models::ParticipantRow;

/// Repository for `fight_participants`.
#[derive(Debug, Clone)]
pub struct ParticipantRepository {
    pool: PgPool,
}

impl ParticipantRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a participant row.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn get(&self, fight_id: &str, user_id: &str) -> Result<Option<ParticipantRow>> {
        let row = sqlx::query_as::<_, ParticipantRow>(
            r"
            SELECT fight_id, user_id, max_exposure_used, blocked_symbols, blocked_symbols_set_at
            FROM fight_participants
            WHERE fight_id = $1 AND user_id = $2
            ",
        )
        .bind(fight_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Raises the watermark to `value` if it is higher than the stored one.
    ///
    /// Single-statement compare-and-raise; concurrent callers can never move
    /// the value down. Returns the stored value afterwards, or `None` if the
    /// participant does not exist.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn raise_watermark(
        &self,
        fight_id: &str,
        user_id: &str,
        value: Decimal,
    ) -> Result<Option<Decimal>> {
        let row: Option<(Decimal,)> = sqlx::query_as(
            r"
            UPDATE fight_participants
            SET max_exposure_used = GREATEST(max_exposure_used, $3)
            WHERE fight_id = $1 AND user_id = $2
            RETURNING max_exposure_used
            ",
        )
        .bind(fight_id)
        .bind(user_id)
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(v,)| v))
    }

    /// Stores the blocked symbol snapshot if none was stored yet.
    ///
    /// Returns true if this call wrote the snapshot.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn init_blocked_symbols(
        &self,
        fight_id: &str,
        user_id: &str,
        symbols: &[String],
    ) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE fight_participants
            SET blocked_symbols = $3, blocked_symbols_set_at = NOW()
            WHERE fight_id = $1 AND user_id = $2 AND blocked_symbols_set_at IS NULL
            ",
        )
        .bind(fight_id)
        .bind(user_id)
        .bind(symbols)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Every participant of every LIVE fight as `(fight_id, user_id)`.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn list_live(&self) -> Result<Vec<(String, String)>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r"
            SELECT p.fight_id, p.user_id
            FROM fight_participants p
            JOIN fights f ON f.id = p.fight_id
            WHERE f.status = 'LIVE'
            ORDER BY p.fight_id, p.user_id
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
