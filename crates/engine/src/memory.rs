//! In-process implementations of the storage and exchange traits.
//!
//! Used by tests across the workspace and for running the engine without a
//! database. Semantics mirror the `PostgreSQL` store: `history_id` is a
//! unique key and watermark raises are an atomic max.

use async_trait::async_trait;
use chrono::Utc;
use fight_exposure_core::{
    normalize_symbol, ExposureError, Fight, FightParticipant, FightStatus, FightStore, FillRecord,
    FillStore, InsertOutcome, LivePosition, NewFill, OrderAction, OrderActionStore,
    ParticipantKey, PositionSource, Result, User,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

#[derive(Default)]
struct State {
    users: HashMap<String, User>,
    fights: HashMap<String, Fight>,
    participants: BTreeMap<ParticipantKey, FightParticipant>,
    fills: Vec<FillRecord>,
    fills_by_history: HashMap<String, usize>,
    actions: Vec<OrderAction>,
}

/// Thread-safe in-memory store.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    failing_watermark_writes: AtomicU32,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, id: &str, account: &str) {
        self.state.lock().users.insert(
            id.to_string(),
            User {
                id: id.to_string(),
                account: account.to_string(),
            },
        );
    }

    pub fn add_fight(&self, id: &str, stake: Decimal, status: FightStatus) {
        self.state.lock().fights.insert(
            id.to_string(),
            Fight {
                id: id.to_string(),
                stake,
                status,
                duration_minutes: 30,
                winner_id: None,
                is_draw: false,
                started_at: (status == FightStatus::Live).then(Utc::now),
            },
        );
    }

    pub fn add_participant(&self, fight_id: &str, user_id: &str) {
        let participant = FightParticipant::new(fight_id, user_id);
        self.state
            .lock()
            .participants
            .insert(participant.key(), participant);
    }

    pub fn set_fight_status(&self, fight_id: &str, status: FightStatus) {
        if let Some(fight) = self.state.lock().fights.get_mut(fight_id) {
            fight.status = status;
        }
    }

    /// Makes the next `n` watermark raises fail with a retryable error.
    pub fn fail_watermark_writes(&self, n: u32) {
        self.failing_watermark_writes.store(n, Ordering::SeqCst);
    }

    #[must_use]
    pub fn fill_count(&self) -> usize {
        self.state.lock().fills.len()
    }

    #[must_use]
    pub fn watermark(&self, key: &ParticipantKey) -> Option<Decimal> {
        self.state
            .lock()
            .participants
            .get(key)
            .map(|p| p.max_exposure_used)
    }

    fn take_watermark_failure(&self) -> bool {
        self.failing_watermark_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl FillStore for InMemoryStore {
    async fn insert_fill(&self, fill: &NewFill) -> Result<InsertOutcome> {
        let mut state = self.state.lock();
        if let Some(&idx) = state.fills_by_history.get(&fill.history_id) {
            return Ok(InsertOutcome::AlreadyExists(state.fills[idx].clone()));
        }

        let record = FillRecord {
            id: i64::try_from(state.fills.len()).map_err(ExposureError::storage)? + 1,
            fill: fill.clone(),
            recorded_at: Utc::now(),
        };
        let idx = state.fills.len();
        state.fills.push(record.clone());
        state.fills_by_history.insert(fill.history_id.clone(), idx);
        Ok(InsertOutcome::Inserted(record))
    }

    async fn fills_for(&self, key: &ParticipantKey) -> Result<Vec<FillRecord>> {
        let state = self.state.lock();
        Ok(state
            .fills
            .iter()
            .filter(|r| r.fill.fight_id == key.fight_id && r.fill.user_id == key.user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OrderActionStore for InMemoryStore {
    async fn record_order_action(&self, action: &OrderAction) -> Result<()> {
        self.state.lock().actions.push(action.clone());
        Ok(())
    }

    async fn traded_symbols(&self, key: &ParticipantKey) -> Result<BTreeSet<String>> {
        let state = self.state.lock();
        let from_actions = state
            .actions
            .iter()
            .filter(|a| a.success && a.fight_id == key.fight_id && a.user_id == key.user_id)
            .map(|a| normalize_symbol(&a.symbol));
        let from_fills = state
            .fills
            .iter()
            .filter(|r| r.fill.fight_id == key.fight_id && r.fill.user_id == key.user_id)
            .map(|r| normalize_symbol(&r.fill.symbol));
        Ok(from_actions.chain(from_fills).collect())
    }
}

#[async_trait]
impl FightStore for InMemoryStore {
    async fn user_by_account(&self, account: &str) -> Result<Option<User>> {
        let state = self.state.lock();
        Ok(state.users.values().find(|u| u.account == account).cloned())
    }

    async fn user_by_id(&self, user_id: &str) -> Result<Option<User>> {
        Ok(self.state.lock().users.get(user_id).cloned())
    }

    async fn fight(&self, fight_id: &str) -> Result<Option<Fight>> {
        Ok(self.state.lock().fights.get(fight_id).cloned())
    }

    async fn participant(&self, key: &ParticipantKey) -> Result<Option<FightParticipant>> {
        Ok(self.state.lock().participants.get(key).cloned())
    }

    async fn live_participation(
        &self,
        user_id: &str,
    ) -> Result<Option<(Fight, FightParticipant)>> {
        let state = self.state.lock();
        let found = state
            .participants
            .values()
            .filter(|p| p.user_id == user_id)
            .filter_map(|p| {
                state
                    .fights
                    .get(&p.fight_id)
                    .filter(|f| f.is_live())
                    .map(|f| (f.clone(), p.clone()))
            })
            .max_by_key(|(f, _)| f.started_at);
        Ok(found)
    }

    async fn live_participants(&self) -> Result<Vec<ParticipantKey>> {
        let state = self.state.lock();
        Ok(state
            .participants
            .keys()
            .filter(|k| state.fights.get(&k.fight_id).is_some_and(Fight::is_live))
            .cloned()
            .collect())
    }

    async fn raise_watermark(&self, key: &ParticipantKey, value: Decimal) -> Result<Decimal> {
        if self.take_watermark_failure() {
            return Err(ExposureError::WatermarkUpdate {
                participant: key.to_string(),
                message: "injected write failure".to_string(),
            });
        }

        let mut state = self.state.lock();
        let participant = state
            .participants
            .get_mut(key)
            .ok_or_else(|| ExposureError::not_participant(&key.fight_id, &key.user_id))?;
        participant.max_exposure_used = participant.max_exposure_used.max(value);
        Ok(participant.max_exposure_used)
    }

    async fn init_blocked_symbols(
        &self,
        key: &ParticipantKey,
        symbols: &[String],
    ) -> Result<FightParticipant> {
        let mut state = self.state.lock();
        let participant = state
            .participants
            .get_mut(key)
            .ok_or_else(|| ExposureError::not_participant(&key.fight_id, &key.user_id))?;

        if !participant.blocked_symbols_initialized {
            let mut blocked: Vec<String> = symbols.iter().map(|s| normalize_symbol(s)).collect();
            blocked.sort();
            blocked.dedup();
            participant.blocked_symbols = blocked;
            participant.blocked_symbols_initialized = true;
        }
        Ok(participant.clone())
    }
}

// =============================================================================
// Position sources
// =============================================================================

/// Serves positions from a mutable map, optionally after a delay.
#[derive(Default)]
pub struct StaticPositionSource {
    positions: Mutex<HashMap<String, Vec<LivePosition>>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicU64,
}

impl StaticPositionSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_positions(&self, account: &str, positions: Vec<LivePosition>) {
        self.positions.lock().insert(account.to_string(), positions);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Number of fetches served so far.
    #[must_use]
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PositionSource for StaticPositionSource {
    async fn positions(&self, account: &str) -> Result<Vec<LivePosition>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .positions
            .lock()
            .get(account)
            .cloned()
            .unwrap_or_default())
    }
}

/// Always reports the exchange as unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailablePositionSource;

#[async_trait]
impl PositionSource for UnavailablePositionSource {
    async fn positions(&self, _account: &str) -> Result<Vec<LivePosition>> {
        Err(ExposureError::ExchangeUnavailable(
            "connection refused".to_string(),
        ))
    }
}
