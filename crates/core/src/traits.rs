use crate::error::Result;
use crate::types::{
    Fight, FightParticipant, FillRecord, InsertOutcome, LivePosition, NewFill, OrderAction,
    ParticipantKey, User,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::BTreeSet;

/// Append-only fill ledger with insert-conflict idempotency.
#[async_trait]
pub trait FillStore: Send + Sync {
    /// Appends a fill, or returns the existing row if the execution id is known.
    async fn insert_fill(&self, fill: &NewFill) -> Result<InsertOutcome>;

    /// All fills recorded for a participant, in insertion order.
    async fn fills_for(&self, key: &ParticipantKey) -> Result<Vec<FillRecord>>;
}

/// Order actions logged by the order path. Feeds the fight-symbol set.
#[async_trait]
pub trait OrderActionStore: Send + Sync {
    async fn record_order_action(&self, action: &OrderAction) -> Result<()>;

    /// Distinct symbols with a successful order action or a recorded fill.
    async fn traded_symbols(&self, key: &ParticipantKey) -> Result<BTreeSet<String>>;
}

/// Read access to fights and users plus the participant-scoped writes the
/// engine owns.
#[async_trait]
pub trait FightStore: Send + Sync {
    async fn user_by_account(&self, account: &str) -> Result<Option<User>>;

    async fn user_by_id(&self, user_id: &str) -> Result<Option<User>>;

    async fn fight(&self, fight_id: &str) -> Result<Option<Fight>>;

    async fn participant(&self, key: &ParticipantKey) -> Result<Option<FightParticipant>>;

    /// The LIVE fight the user participates in, if any.
    async fn live_participation(&self, user_id: &str)
        -> Result<Option<(Fight, FightParticipant)>>;

    /// Every participant of every LIVE fight.
    async fn live_participants(&self) -> Result<Vec<ParticipantKey>>;

    /// Atomically sets `max_exposure_used = max(max_exposure_used, value)` and
    /// returns the stored value afterwards.
    async fn raise_watermark(&self, key: &ParticipantKey, value: Decimal) -> Result<Decimal>;

    /// Stores blocked symbols unless they were already initialized. Returns the
    /// participant as stored.
    async fn init_blocked_symbols(
        &self,
        key: &ParticipantKey,
        symbols: &[String],
    ) -> Result<FightParticipant>;
}

/// Source of live exchange positions.
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn positions(&self, account: &str) -> Result<Vec<LivePosition>>;
}
