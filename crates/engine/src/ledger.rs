//! Append-only, idempotent fill ledger.

use fight_exposure_core::{
    normalize_symbol, ExposureError, FillStore, InsertOutcome, NewFill, Result,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

/// Validates fills and appends them through a `FillStore`.
pub struct FillLedger {
    store: Arc<dyn FillStore>,
}

impl FillLedger {
    #[must_use]
    pub fn new(store: Arc<dyn FillStore>) -> Self {
        Self { store }
    }

    /// Records one execution.
    ///
    /// A repeated `history_id` for the same participant and symbol is reported
    /// as `AlreadyExists` without writing. A repeated `history_id` that belongs
    /// to someone else is a conflict.
    ///
    /// # Errors
    ///
    /// Returns `Validation` before any write if the fill is malformed,
    /// `FillConflict` on a foreign duplicate, or a storage error.
    pub async fn record(&self, fill: NewFill) -> Result<InsertOutcome> {
        let fill = normalize(fill);
        validate_fill(&fill)?;

        let outcome = self.store.insert_fill(&fill).await?;
        match &outcome {
            InsertOutcome::Inserted(record) => {
                info!(
                    participant = %fill.key(),
                    history_id = %fill.history_id,
                    symbol = %fill.symbol,
                    side = %fill.side,
                    amount = %fill.amount,
                    price = %fill.price,
                    id = record.id,
                    "fill recorded"
                );
            }
            InsertOutcome::AlreadyExists(existing) => {
                if !existing.matches(&fill) {
                    warn!(
                        history_id = %fill.history_id,
                        existing = %existing.fill.key(),
                        incoming = %fill.key(),
                        "history id already recorded for another participant"
                    );
                    return Err(ExposureError::FillConflict {
                        history_id: fill.history_id,
                    });
                }
                warn!(
                    participant = %fill.key(),
                    history_id = %fill.history_id,
                    "duplicate fill ignored"
                );
            }
        }

        Ok(outcome)
    }
}

fn normalize(mut fill: NewFill) -> NewFill {
    fill.symbol = normalize_symbol(&fill.symbol);
    fill.history_id = fill.history_id.trim().to_string();
    fill.order_id = fill.order_id.trim().to_string();
    fill
}

/// Checks every field a fill must carry before it may touch storage.
///
/// # Errors
///
/// Returns `Validation` naming the first offending field.
pub fn validate_fill(fill: &NewFill) -> Result<()> {
    if fill.fight_id.trim().is_empty() {
        return Err(ExposureError::validation("fightId is required"));
    }
    if fill.user_id.trim().is_empty() {
        return Err(ExposureError::validation("userId is required"));
    }
    if fill.history_id.is_empty() {
        return Err(ExposureError::validation("historyId is required"));
    }
    if fill.order_id.is_empty() {
        return Err(ExposureError::validation("orderId is required"));
    }
    if fill.symbol.is_empty() {
        return Err(ExposureError::validation("symbol is required"));
    }
    if !fill
        .symbol
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/'))
    {
        return Err(ExposureError::validation(format!(
            "symbol contains invalid characters: {}",
            fill.symbol
        )));
    }
    if fill.amount <= Decimal::ZERO {
        return Err(ExposureError::validation("amount must be positive"));
    }
    if fill.price <= Decimal::ZERO {
        return Err(ExposureError::validation("price must be positive"));
    }
    if let Some(leverage) = fill.leverage {
        if leverage <= 0 {
            return Err(ExposureError::validation("leverage must be positive"));
        }
    }
    Ok(())
}
