//! Fight-start initialization of blocked symbols.

use crate::reconciler::LiveReconciler;
use fight_exposure_core::{
    ExposureError, FightParticipant, FightStore, LivePosition, ParticipantKey, Result,
};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

/// Symbols with a non-zero position in a pre-fight snapshot.
#[must_use]
pub fn held_symbols(positions: &[LivePosition]) -> Vec<String> {
    positions
        .iter()
        .filter(|p| p.amount != Decimal::ZERO)
        .map(|p| fight_exposure_core::normalize_symbol(&p.symbol))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Computes each participant's blocked symbols exactly once.
pub struct FightStartInitializer {
    fights: Arc<dyn FightStore>,
    reconciler: Arc<LiveReconciler>,
}

impl FightStartInitializer {
    #[must_use]
    pub fn new(fights: Arc<dyn FightStore>, reconciler: Arc<LiveReconciler>) -> Self {
        Self { fights, reconciler }
    }

    /// Initializes blocked symbols from `snapshot`, or from a live fetch when
    /// no snapshot is given. An already-initialized participant is returned
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns `NotParticipant` for unknown participants and
    /// `ExchangeUnavailable` if the live fetch fails; the lifecycle service is
    /// expected to retry.
    pub async fn initialize(
        &self,
        key: &ParticipantKey,
        snapshot: Option<Vec<LivePosition>>,
    ) -> Result<FightParticipant> {
        let participant = self
            .fights
            .participant(key)
            .await?
            .ok_or_else(|| ExposureError::not_participant(&key.fight_id, &key.user_id))?;
        if participant.blocked_symbols_initialized {
            return Ok(participant);
        }

        let positions = match snapshot {
            Some(positions) => positions,
            None => {
                let user = self.fights.user_by_id(&key.user_id).await?.ok_or_else(|| {
                    ExposureError::storage(format!("user {} has no account record", key.user_id))
                })?;
                self.reconciler.fetch_positions(&user.account).await?
            }
        };

        let blocked = held_symbols(&positions);
        let stored = self.fights.init_blocked_symbols(key, &blocked).await?;
        info!(
            participant = %key,
            blocked = ?stored.blocked_symbols,
            "blocked symbols initialized"
        );
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryStore, StaticPositionSource, UnavailablePositionSource};
    use fight_exposure_core::{FightStatus, PositionSource, Side};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn position(symbol: &str, amount: Decimal) -> LivePosition {
        LivePosition {
            symbol: symbol.to_string(),
            side: Some(Side::Buy),
            amount,
            entry_price: dec!(100),
        }
    }

    fn setup(source: Arc<dyn PositionSource>) -> (FightStartInitializer, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        store.add_user("user-1", "acct1");
        store.add_fight("fight-1", dec!(1000), FightStatus::Waiting);
        store.add_participant("fight-1", "user-1");
        let reconciler = Arc::new(LiveReconciler::new(
            store.clone(),
            source,
            Duration::from_secs(1),
        ));
        (FightStartInitializer::new(store.clone(), reconciler), store)
    }

    fn key() -> ParticipantKey {
        ParticipantKey::new("fight-1", "user-1")
    }

    #[test]
    fn test_held_symbols_skips_flat_and_dedups() {
        let held = held_symbols(&[
            position("eth", dec!(1)),
            position("BTC", dec!(0)),
            position("ETH", dec!(-2)),
            position("SOL", dec!(3)),
        ]);
        assert_eq!(held, vec!["ETH", "SOL"]);
    }

    #[tokio::test]
    async fn test_initialize_from_snapshot() {
        let (init, _) = setup(Arc::new(UnavailablePositionSource));
        let p = init
            .initialize(&key(), Some(vec![position("ETH", dec!(1))]))
            .await
            .unwrap();
        assert_eq!(p.blocked_symbols, vec!["ETH"]);
        assert!(p.blocked_symbols_initialized);
    }

    #[tokio::test]
    async fn test_initialize_fetches_when_no_snapshot() {
        let source = Arc::new(StaticPositionSource::new());
        source.set_positions("acct1", vec![position("DOGE", dec!(100))]);
        let (init, _) = setup(source);

        let p = init.initialize(&key(), None).await.unwrap();
        assert_eq!(p.blocked_symbols, vec!["DOGE"]);
    }

    #[tokio::test]
    async fn test_second_initialize_keeps_first_set() {
        let (init, _) = setup(Arc::new(UnavailablePositionSource));
        init.initialize(&key(), Some(vec![position("ETH", dec!(1))]))
            .await
            .unwrap();
        let p = init
            .initialize(&key(), Some(vec![position("BTC", dec!(1))]))
            .await
            .unwrap();
        assert_eq!(p.blocked_symbols, vec!["ETH"]);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_hard() {
        let (init, store) = setup(Arc::new(UnavailablePositionSource));
        let err = init.initialize(&key(), None).await.unwrap_err();
        assert!(matches!(err, ExposureError::ExchangeUnavailable(_)));

        let p = store.participant(&key()).await.unwrap().unwrap();
        assert!(!p.blocked_symbols_initialized);
    }
}
