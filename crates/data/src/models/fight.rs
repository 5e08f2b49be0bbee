//! Fight, participant and user rows.

use chrono::{DateTime, Utc};
use fight_exposure_core::{
    normalize_symbol, ExposureError, Fight, FightParticipant, FightStatus, User,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A row of `fights`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FightRow {
    pub id: String,
    pub stake: Decimal,
    pub status: String,
    pub duration_minutes: i32,
    pub winner_id: Option<String>,
    pub is_draw: bool,
    pub started_at: Option<DateTime<Utc>>,
}

impl TryFrom<FightRow> for Fight {
    type Error = ExposureError;

    fn try_from(row: FightRow) -> Result<Self, Self::Error> {
        let status = FightStatus::parse(&row.status).ok_or_else(|| {
            ExposureError::storage(format!(
                "fight {} has unrecognized status '{}'",
                row.id, row.status
            ))
        })?;

        Ok(Self {
            id: row.id,
            stake: row.stake,
            status,
            duration_minutes: row.duration_minutes,
            winner_id: row.winner_id,
            is_draw: row.is_draw,
            started_at: row.started_at,
        })
    }
}

/// A row of `fight_participants`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ParticipantRow {
    pub fight_id: String,
    pub user_id: String,
    pub max_exposure_used: Decimal,
    pub blocked_symbols: Vec<String>,
    pub blocked_symbols_set_at: Option<DateTime<Utc>>,
}

impl From<ParticipantRow> for FightParticipant {
    fn from(row: ParticipantRow) -> Self {
        let mut blocked: Vec<String> = row
            .blocked_symbols
            .iter()
            .map(|s| normalize_symbol(s))
            .collect();
        blocked.sort();
        blocked.dedup();

        Self {
            fight_id: row.fight_id,
            user_id: row.user_id,
            max_exposure_used: row.max_exposure_used,
            blocked_symbols: blocked,
            blocked_symbols_initialized: row.blocked_symbols_set_at.is_some(),
        }
    }
}

/// A participant joined with its LIVE fight.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct LiveParticipationRow {
    #[sqlx(flatten)]
    pub fight: FightRow,
    pub user_id: String,
    pub max_exposure_used: Decimal,
    pub blocked_symbols: Vec<String>,
    pub blocked_symbols_set_at: Option<DateTime<Utc>>,
}

impl TryFrom<LiveParticipationRow> for (Fight, FightParticipant) {
    type Error = ExposureError;

    fn try_from(row: LiveParticipationRow) -> Result<Self, Self::Error> {
        let participant = FightParticipant::from(ParticipantRow {
            fight_id: row.fight.id.clone(),
            user_id: row.user_id,
            max_exposure_used: row.max_exposure_used,
            blocked_symbols: row.blocked_symbols,
            blocked_symbols_set_at: row.blocked_symbols_set_at,
        });
        Ok((Fight::try_from(row.fight)?, participant))
    }
}

/// A row of `users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub account: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            account: row.account,
        }
    }
}
