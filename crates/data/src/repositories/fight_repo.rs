//! Fight repository. Fights are written by the lifecycle service; this side
//! only reads them.

use anyhow::Result;
use sqlx::PgPool;

use crate::models::{FightRow, LiveParticipationRow};

/// Repository for `fights`.
#[derive(Debug, Clone)]
pub struct FightRepository {
    pool: PgPool,
}

impl FightRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a fight by ID.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<FightRow>> {
        let row = sqlx::query_as::<_, FightRow>(
            r"
            SELECT id, stake, status, duration_minutes, winner_id, is_draw, started_at
            FROM fights
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// The most recently started LIVE fight the user participates in.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn get_live_for_user(&self, user_id: &str) -> Result<Option<LiveParticipationRow>> {
        let row = sqlx::query_as::<_, LiveParticipationRow>(
            r"
            SELECT f.id, f.stake, f.status, f.duration_minutes, f.winner_id, f.is_draw,
                   f.started_at, p.user_id, p.max_exposure_used, p.blocked_symbols,
                   p.blocked_symbols_set_at
            FROM fight_participants p
            JOIN fights f ON f.id = p.fight_id
            WHERE p.user_id = $1 AND f.status = 'LIVE'
            ORDER BY f.started_at DESC NULLS LAST
            LIMIT 1
            ",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}
