//! Live position reconciliation against the exchange.

use fight_exposure_core::{
    live_exposure, ExposureError, LivePosition, OrderActionStore, ParticipantKey, PositionSource,
    Result,
};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Computes exposure from live exchange positions, scoped to the symbols a
/// participant traded during the fight.
pub struct LiveReconciler {
    actions: Arc<dyn OrderActionStore>,
    source: Arc<dyn PositionSource>,
    timeout: Duration,
}

impl LiveReconciler {
    #[must_use]
    pub fn new(
        actions: Arc<dyn OrderActionStore>,
        source: Arc<dyn PositionSource>,
        timeout: Duration,
    ) -> Self {
        Self {
            actions,
            source,
            timeout,
        }
    }

    /// Symbols traded during the fight, minus blocked symbols.
    ///
    /// # Errors
    ///
    /// Returns a storage error if order actions cannot be read.
    pub async fn fight_symbols(
        &self,
        key: &ParticipantKey,
        blocked: &[String],
    ) -> Result<BTreeSet<String>> {
        let mut symbols = self.actions.traded_symbols(key).await?;
        symbols.retain(|s| !blocked.contains(s));
        Ok(symbols)
    }

    /// Fetches live positions, bounded by the reconcile timeout.
    ///
    /// # Errors
    ///
    /// Returns `ExchangeUnavailable` on timeout or any exchange failure.
    pub async fn fetch_positions(&self, account: &str) -> Result<Vec<LivePosition>> {
        tokio::time::timeout(self.timeout, self.source.positions(account))
            .await
            .map_err(|_| {
                ExposureError::ExchangeUnavailable(format!(
                    "position fetch timed out after {}ms",
                    self.timeout.as_millis()
                ))
            })?
    }

    /// Live exposure for a participant. Never fails: any error is logged and
    /// reported as zero so the ledger estimate stands alone.
    pub async fn live_exposure(
        &self,
        key: &ParticipantKey,
        account: &str,
        blocked: &[String],
    ) -> Decimal {
        let symbols = match self.fight_symbols(key, blocked).await {
            Ok(symbols) => symbols,
            Err(e) => {
                warn!(participant = %key, error = %e, "failed to load fight symbols");
                return Decimal::ZERO;
            }
        };
        if symbols.is_empty() {
            debug!(participant = %key, "no fight symbols, skipping position fetch");
            return Decimal::ZERO;
        }

        match self.fetch_positions(account).await {
            Ok(positions) => live_exposure(&positions, &symbols),
            Err(e) => {
                warn!(participant = %key, error = %e, "live position fetch failed, using ledger only");
                Decimal::ZERO
            }
        }
    }
}
