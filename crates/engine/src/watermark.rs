//! Monotonic exposure watermark.
//!
//! A refresh measures current exposure as `max(ledger, live)` and raises the
//! stored watermark with a single atomic compare-and-raise when it is higher.
//! Raises that keep failing are queued for the sweeper rather than dropped.

use crate::exposure::ExposureCalculator;
use crate::reconciler::LiveReconciler;
use fight_exposure_core::{
    merge_exposure, ExposureConfig, ExposureError, FightParticipant, FightStore, ParticipantKey,
    Result, WatermarkRefresh,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Retry schedule for the atomic watermark raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Delay before retry `n` is `backoff * n`.
    pub backoff: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &ExposureConfig) -> Self {
        Self {
            attempts: config.watermark_retry_attempts.max(1),
            backoff: Duration::from_millis(config.watermark_retry_backoff_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ExposureConfig::default())
    }
}

/// Participants whose watermark raise is still owed.
#[derive(Debug, Default)]
pub struct PendingRefreshes {
    keys: Mutex<BTreeSet<ParticipantKey>>,
}

impl PendingRefreshes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, key: ParticipantKey) {
        self.keys.lock().insert(key);
    }

    /// Removes and returns every queued participant.
    pub fn drain(&self) -> Vec<ParticipantKey> {
        std::mem::take(&mut *self.keys.lock()).into_iter().collect()
    }

    /// Queued participants, left in the queue.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ParticipantKey> {
        self.keys.lock().iter().cloned().collect()
    }

    #[must_use]
    pub fn contains(&self, key: &ParticipantKey) -> bool {
        self.keys.lock().contains(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.lock().is_empty()
    }
}

struct Measurement {
    participant: FightParticipant,
    ledger: Decimal,
    live: Decimal,
    current: Decimal,
}

/// Keeps `max_exposure_used` at the highest exposure ever observed.
pub struct WatermarkTracker {
    fights: Arc<dyn FightStore>,
    calculator: Arc<ExposureCalculator>,
    reconciler: Arc<LiveReconciler>,
    retry: RetryPolicy,
    pending: Arc<PendingRefreshes>,
}

impl WatermarkTracker {
    #[must_use]
    pub fn new(
        fights: Arc<dyn FightStore>,
        calculator: Arc<ExposureCalculator>,
        reconciler: Arc<LiveReconciler>,
        retry: RetryPolicy,
        pending: Arc<PendingRefreshes>,
    ) -> Self {
        Self {
            fights,
            calculator,
            reconciler,
            retry,
            pending,
        }
    }

    #[must_use]
    pub fn pending(&self) -> &Arc<PendingRefreshes> {
        &self.pending
    }

    async fn measure(&self, key: &ParticipantKey) -> Result<Measurement> {
        let participant = self
            .fights
            .participant(key)
            .await?
            .ok_or_else(|| ExposureError::not_participant(&key.fight_id, &key.user_id))?;
        let user = self.fights.user_by_id(&key.user_id).await?.ok_or_else(|| {
            ExposureError::storage(format!("user {} has no account record", key.user_id))
        })?;

        let ledger = self.calculator.ledger_exposure(key).await?;
        let live = self
            .reconciler
            .live_exposure(key, &user.account, &participant.blocked_symbols)
            .await;

        Ok(Measurement {
            participant,
            ledger,
            live,
            current: merge_exposure(ledger, live),
        })
    }

    async fn raise_with_retry(&self, key: &ParticipantKey, value: Decimal) -> Result<Decimal> {
        let mut attempt = 1;
        loop {
            match self.fights.raise_watermark(key, value).await {
                Ok(stored) => return Ok(stored),
                Err(e) if e.is_retryable() && attempt < self.retry.attempts => {
                    warn!(
                        participant = %key,
                        attempt,
                        error = %e,
                        "watermark raise failed, retrying"
                    );
                    tokio::time::sleep(self.retry.backoff * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn persist(&self, key: &ParticipantKey, m: &Measurement) -> Result<WatermarkRefresh> {
        let stored = m.participant.max_exposure_used;
        let mut refresh = WatermarkRefresh {
            ledger_exposure: m.ledger,
            live_exposure: m.live,
            current_exposure: m.current,
            max_exposure_used: stored,
            updated: false,
            pending: false,
        };
        if m.current <= stored {
            return Ok(refresh);
        }

        let raised = self.raise_with_retry(key, m.current).await?;
        refresh.max_exposure_used = raised;
        refresh.updated = raised > stored;
        if refresh.updated {
            info!(
                participant = %key,
                previous = %stored,
                watermark = %raised,
                ledger = %m.ledger,
                live = %m.live,
                "exposure watermark raised"
            );
        }
        Ok(refresh)
    }

    /// Measures exposure and raises the watermark, returning any failure.
    ///
    /// # Errors
    ///
    /// Returns `NotParticipant` for unknown participants, storage errors from
    /// the ledger, or the last error of the raise once retries are exhausted.
    pub async fn try_refresh(&self, key: &ParticipantKey) -> Result<WatermarkRefresh> {
        let m = self.measure(key).await?;
        self.persist(key, &m).await
    }

    /// Measures exposure and raises the watermark.
    ///
    /// If the raise still fails after retries the participant is queued for the
    /// sweeper and the result reports `pending` with the effective watermark
    /// `max(stored, current)`.
    ///
    /// # Errors
    ///
    /// Returns `NotParticipant` for unknown participants, storage errors from
    /// measuring, or non-retryable errors from the raise.
    pub async fn refresh(&self, key: &ParticipantKey) -> Result<WatermarkRefresh> {
        let m = self.measure(key).await?;
        match self.persist(key, &m).await {
            Ok(refresh) => Ok(refresh),
            Err(e) if e.is_retryable() => {
                error!(
                    participant = %key,
                    current = %m.current,
                    error = %e,
                    "watermark raise failed, queued for sweep"
                );
                self.pending.push(key.clone());
                Ok(WatermarkRefresh {
                    ledger_exposure: m.ledger,
                    live_exposure: m.live,
                    current_exposure: m.current,
                    max_exposure_used: m.participant.max_exposure_used.max(m.current),
                    updated: false,
                    pending: true,
                })
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryStore, StaticPositionSource};
    use chrono::Utc;
    use fight_exposure_core::{
        FightStatus, FillStore, LivePosition, NettingPolicy, NewFill, OrderActionStore, Side,
    };
    use rust_decimal_macros::dec;

    struct Harness {
        store: Arc<InMemoryStore>,
        source: Arc<StaticPositionSource>,
        calculator: Arc<ExposureCalculator>,
        tracker: WatermarkTracker,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryStore::new());
        store.add_user("user-1", "acct1");
        store.add_fight("fight-1", dec!(1000), FightStatus::Live);
        store.add_participant("fight-1", "user-1");

        let source = Arc::new(StaticPositionSource::new());
        let calculator = Arc::new(ExposureCalculator::new(
            store.clone(),
            NettingPolicy::SignedNet,
        ));
        let reconciler = Arc::new(LiveReconciler::new(
            store.clone(),
            source.clone(),
            Duration::from_secs(1),
        ));
        let tracker = WatermarkTracker::new(
            store.clone(),
            calculator.clone(),
            reconciler,
            RetryPolicy {
                attempts: 3,
                backoff: Duration::from_millis(1),
            },
            Arc::new(PendingRefreshes::new()),
        );
        Harness {
            store,
            source,
            calculator,
            tracker,
        }
    }

    fn key() -> ParticipantKey {
        ParticipantKey::new("fight-1", "user-1")
    }

    async fn buy(h: &Harness, history_id: &str, symbol: &str, amount: Decimal, price: Decimal) {
        let outcome = h
            .store
            .insert_fill(&NewFill {
                history_id: history_id.to_string(),
                order_id: format!("o-{history_id}"),
                fight_id: "fight-1".to_string(),
                user_id: "user-1".to_string(),
                symbol: symbol.to_string(),
                side: Side::Buy,
                amount,
                price,
                fee: Decimal::ZERO,
                pnl: None,
                leverage: None,
                executed_at: Utc::now(),
            })
            .await
            .unwrap();
        h.calculator.apply(outcome.record()).await.unwrap();
    }

    #[tokio::test]
    async fn test_raise_when_current_exceeds_stored() {
        let h = harness();
        buy(&h, "h-1", "BTC", dec!(0.005), dec!(50000)).await;

        let refresh = h.tracker.refresh(&key()).await.unwrap();
        assert_eq!(refresh.current_exposure, dec!(250));
        assert_eq!(refresh.max_exposure_used, dec!(250));
        assert!(refresh.updated);
        assert_eq!(h.store.watermark(&key()), Some(dec!(250)));

        let again = h.tracker.refresh(&key()).await.unwrap();
        assert!(!again.updated);
        assert_eq!(again.max_exposure_used, dec!(250));
    }

    #[tokio::test]
    async fn test_live_exposure_wins_when_larger() {
        let h = harness();
        buy(&h, "h-1", "BTC", dec!(0.005), dec!(50000)).await;
        h.source.set_positions(
            "acct1",
            vec![LivePosition {
                symbol: "BTC".to_string(),
                side: Some(Side::Buy),
                amount: dec!(0.006),
                entry_price: dec!(50000),
            }],
        );

        let refresh = h.tracker.refresh(&key()).await.unwrap();
        assert_eq!(refresh.ledger_exposure, dec!(250));
        assert_eq!(refresh.live_exposure, dec!(300));
        assert_eq!(refresh.current_exposure, dec!(300));
        assert_eq!(h.store.watermark(&key()), Some(dec!(300)));
    }

    #[tokio::test]
    async fn test_watermark_never_decreases() {
        let h = harness();
        buy(&h, "h-1", "ETH", dec!(1), dec!(400)).await;
        h.tracker.refresh(&key()).await.unwrap();

        // Closing the position drops current exposure to zero.
        let close = h
            .store
            .insert_fill(&NewFill {
                history_id: "h-2".to_string(),
                order_id: "o-2".to_string(),
                fight_id: "fight-1".to_string(),
                user_id: "user-1".to_string(),
                symbol: "ETH".to_string(),
                side: Side::Sell,
                amount: dec!(1),
                price: dec!(410),
                fee: Decimal::ZERO,
                pnl: Some(dec!(10)),
                leverage: None,
                executed_at: Utc::now(),
            })
            .await
            .unwrap();
        h.calculator.apply(close.record()).await.unwrap();

        let refresh = h.tracker.refresh(&key()).await.unwrap();
        assert_eq!(refresh.current_exposure, Decimal::ZERO);
        assert_eq!(refresh.max_exposure_used, dec!(400));
        assert!(!refresh.updated);
    }

    #[tokio::test]
    async fn test_transient_write_failure_is_retried() {
        let h = harness();
        buy(&h, "h-1", "BTC", dec!(0.01), dec!(50000)).await;
        h.store.fail_watermark_writes(2);

        let refresh = h.tracker.refresh(&key()).await.unwrap();
        assert!(refresh.updated);
        assert!(!refresh.pending);
        assert_eq!(h.store.watermark(&key()), Some(dec!(500)));
    }

    #[tokio::test]
    async fn test_exhausted_retries_queue_for_sweep() {
        let h = harness();
        buy(&h, "h-1", "BTC", dec!(0.01), dec!(50000)).await;
        h.store.fail_watermark_writes(3);

        let refresh = h.tracker.refresh(&key()).await.unwrap();
        assert!(refresh.pending);
        assert_eq!(refresh.max_exposure_used, dec!(500));
        assert_eq!(h.store.watermark(&key()), Some(Decimal::ZERO));
        assert!(h.tracker.pending().contains(&key()));
    }

    #[tokio::test]
    async fn test_try_refresh_surfaces_failure() {
        let h = harness();
        buy(&h, "h-1", "BTC", dec!(0.01), dec!(50000)).await;
        h.store.fail_watermark_writes(3);

        let err = h.tracker.try_refresh(&key()).await.unwrap_err();
        assert!(matches!(err, ExposureError::WatermarkUpdate { .. }));
        assert!(h.tracker.pending().is_empty());
    }

    #[tokio::test]
    async fn test_blocked_symbol_positions_do_not_count_live() {
        let h = harness();
        h.store
            .init_blocked_symbols(&key(), &["ETH".to_string()])
            .await
            .unwrap();
        h.store
            .record_order_action(&fight_exposure_core::OrderAction {
                fight_id: "fight-1".to_string(),
                user_id: "user-1".to_string(),
                symbol: "ETH".to_string(),
                action_type: "market".to_string(),
                success: true,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        h.source.set_positions(
            "acct1",
            vec![LivePosition {
                symbol: "ETH".to_string(),
                side: Some(Side::Buy),
                amount: dec!(2),
                entry_price: dec!(3000),
            }],
        );

        let refresh = h.tracker.refresh(&key()).await.unwrap();
        assert_eq!(refresh.live_exposure, Decimal::ZERO);
        assert_eq!(h.source.calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_participant() {
        let h = harness();
        let err = h
            .tracker
            .refresh(&ParticipantKey::new("fight-1", "user-9"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
