//! `PostgreSQL` implementation of the engine storage traits.

use async_trait::async_trait;
use fight_exposure_core::{
    normalize_symbol, ExposureError, Fight, FightParticipant, FightStore, FillRecord, FillStore,
    InsertOutcome, NewFill, OrderAction, OrderActionStore, ParticipantKey, Result, User,
};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::collections::BTreeSet;

use crate::repositories::Repositories;

/// Storage backend over a shared `PgPool`.
#[derive(Debug, Clone)]
pub struct PgStore {
    repos: Repositories,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            repos: Repositories::new(pool),
        }
    }

    #[must_use]
    pub fn repositories(&self) -> &Repositories {
        &self.repos
    }
}

#[async_trait]
impl FillStore for PgStore {
    async fn insert_fill(&self, fill: &NewFill) -> Result<InsertOutcome> {
        if let Some(row) = self
            .repos
            .fills
            .insert_if_absent(fill)
            .await
            .map_err(ExposureError::storage)?
        {
            return Ok(InsertOutcome::Inserted(FillRecord::try_from(row)?));
        }

        let existing = self
            .repos
            .fills
            .get_by_history_id(&fill.history_id)
            .await
            .map_err(ExposureError::storage)?
            .ok_or_else(|| {
                ExposureError::storage(format!(
                    "insert of {} conflicted but no row was found",
                    fill.history_id
                ))
            })?;

        Ok(InsertOutcome::AlreadyExists(FillRecord::try_from(existing)?))
    }

    async fn fills_for(&self, key: &ParticipantKey) -> Result<Vec<FillRecord>> {
        self.repos
            .fills
            .get_for_participant(&key.fight_id, &key.user_id)
            .await
            .map_err(ExposureError::storage)?
            .into_iter()
            .map(FillRecord::try_from)
            .collect()
    }
}

#[async_trait]
impl OrderActionStore for PgStore {
    async fn record_order_action(&self, action: &OrderAction) -> Result<()> {
        self.repos
            .order_actions
            .insert(action)
            .await
            .map_err(ExposureError::storage)?;
        Ok(())
    }

    async fn traded_symbols(&self, key: &ParticipantKey) -> Result<BTreeSet<String>> {
        let symbols = self
            .repos
            .order_actions
            .traded_symbols(&key.fight_id, &key.user_id)
            .await
            .map_err(ExposureError::storage)?;
        Ok(symbols.iter().map(|s| normalize_symbol(s)).collect())
    }
}

#[async_trait]
impl FightStore for PgStore {
    async fn user_by_account(&self, account: &str) -> Result<Option<User>> {
        let row = self
            .repos
            .users
            .get_by_account(account)
            .await
            .map_err(ExposureError::storage)?;
        Ok(row.map(User::from))
    }

    async fn user_by_id(&self, user_id: &str) -> Result<Option<User>> {
        let row = self
            .repos
            .users
            .get_by_id(user_id)
            .await
            .map_err(ExposureError::storage)?;
        Ok(row.map(User::from))
    }

    async fn fight(&self, fight_id: &str) -> Result<Option<Fight>> {
        self.repos
            .fights
            .get_by_id(fight_id)
            .await
            .map_err(ExposureError::storage)?
            .map(Fight::try_from)
            .transpose()
    }

    async fn participant(&self, key: &ParticipantKey) -> Result<Option<FightParticipant>> {
        let row = self
            .repos
            .participants
            .get(&key.fight_id, &key.user_id)
            .await
            .map_err(ExposureError::storage)?;
        Ok(row.map(FightParticipant::from))
    }

    async fn live_participation(
        &self,
        user_id: &str,
    ) -> Result<Option<(Fight, FightParticipant)>> {
        self.repos
            .fights
            .get_live_for_user(user_id)
            .await
            .map_err(ExposureError::storage)?
            .map(<(Fight, FightParticipant)>::try_from)
            .transpose()
    }

    async fn live_participants(&self) -> Result<Vec<ParticipantKey>> {
        let rows = self
            .repos
            .participants
            .list_live()
            .await
            .map_err(ExposureError::storage)?;
        Ok(rows
            .into_iter()
            .map(|(fight_id, user_id)| ParticipantKey::new(fight_id, user_id))
            .collect())
    }

    async fn raise_watermark(&self, key: &ParticipantKey, value: Decimal) -> Result<Decimal> {
        self.repos
            .participants
            .raise_watermark(&key.fight_id, &key.user_id, value)
            .await
            .map_err(|e| ExposureError::WatermarkUpdate {
                participant: key.to_string(),
                message: e.to_string(),
            })?
            .ok_or_else(|| ExposureError::not_participant(&key.fight_id, &key.user_id))
    }

    async fn init_blocked_symbols(
        &self,
        key: &ParticipantKey,
        symbols: &[String],
    ) -> Result<FightParticipant> {
        let mut normalized: Vec<String> = symbols.iter().map(|s| normalize_symbol(s)).collect();
        normalized.sort();
        normalized.dedup();

        let written = self
            .repos
            .participants
            .init_blocked_symbols(&key.fight_id, &key.user_id, &normalized)
            .await
            .map_err(ExposureError::storage)?;
        if !written {
            tracing::debug!(participant = %key, "blocked symbols already initialized");
        }

        self.participant(key)
            .await?
            .ok_or_else(|| ExposureError::not_participant(&key.fight_id, &key.user_id))
    }
}
