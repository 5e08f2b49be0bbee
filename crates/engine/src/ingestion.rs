//! Fill ingestion boundary and the stake-info read path.
//!
//! Writes go ledger first, then the running book, then the watermark. The
//! ledger insert and the watermark raise are independent: a failed refresh
//! never fails an accepted fill.

use crate::exposure::ExposureCalculator;
use crate::ledger::FillLedger;
use crate::limiter::available_capital;
use crate::watermark::WatermarkTracker;
use chrono::{DateTime, Utc};
use fight_exposure_core::{
    ExposureError, Fight, FightParticipant, FightStore, InsertOutcome, NewFill, Result, Side,
    StakeInfo, WatermarkRefresh,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// A fill notification as sent by the trading client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillNotification {
    pub account: String,
    #[serde(default)]
    pub fight_id: Option<String>,
    pub symbol: String,
    pub side: String,
    pub amount: Decimal,
    pub order_id: String,
    pub history_id: String,
    pub price: Decimal,
    #[serde(default)]
    pub fee: Option<Decimal>,
    #[serde(default)]
    pub pnl: Option<Decimal>,
    #[serde(default)]
    pub leverage: Option<i32>,
    #[serde(default)]
    pub executed_at: Option<DateTime<Utc>>,
}

/// Result of ingesting one fill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordFillOutcome {
    /// False when the account had no fight to attribute the fill to.
    pub recorded: bool,
    pub duplicate: bool,
    pub fill_id: Option<i64>,
    pub stake_info: StakeInfo,
}

/// Finds the participation a request refers to.
///
/// With an explicit fight id the fight and participant must exist. Without
/// one, the user's LIVE fight is used, if any.
pub(crate) async fn resolve_participation(
    fights: &dyn FightStore,
    user_id: &str,
    fight_id: Option<&str>,
) -> Result<Option<(Fight, FightParticipant)>> {
    match fight_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(fight_id) => {
            let fight = fights
                .fight(fight_id)
                .await?
                .ok_or_else(|| ExposureError::fight_not_found(fight_id))?;
            let key = fight_exposure_core::ParticipantKey::new(fight_id, user_id);
            let participant = fights
                .participant(&key)
                .await?
                .ok_or_else(|| ExposureError::not_participant(fight_id, user_id))?;
            Ok(Some((fight, participant)))
        }
        None => fights.live_participation(user_id).await,
    }
}

/// Snapshot for a LIVE fight after a refresh.
fn live_snapshot(fight: &Fight, participant: &FightParticipant, r: &WatermarkRefresh) -> StakeInfo {
    StakeInfo {
        in_fight: true,
        fight_id: Some(fight.id.clone()),
        stake: Some(fight.stake),
        current_exposure: Some(r.current_exposure),
        max_exposure_used: Some(r.max_exposure_used),
        available: Some(available_capital(
            fight.stake,
            r.max_exposure_used,
            r.current_exposure,
        )),
        blocked_symbols: participant.blocked_symbols.clone(),
    }
}

/// Snapshot from stored values only, without measuring current exposure.
fn stored_snapshot(fight: &Fight, participant: &FightParticipant) -> StakeInfo {
    StakeInfo {
        in_fight: fight.is_live(),
        fight_id: Some(fight.id.clone()),
        stake: Some(fight.stake),
        current_exposure: None,
        max_exposure_used: Some(participant.max_exposure_used),
        available: Some(available_capital(
            fight.stake,
            participant.max_exposure_used,
            Decimal::ZERO,
        )),
        blocked_symbols: participant.blocked_symbols.clone(),
    }
}

/// Drives ledger, exposure and watermark for incoming fills, and serves the
/// self-healing stake-info read.
pub struct FillIngestion {
    fights: Arc<dyn FightStore>,
    ledger: FillLedger,
    calculator: Arc<ExposureCalculator>,
    tracker: Arc<WatermarkTracker>,
}

impl FillIngestion {
    #[must_use]
    pub fn new(
        fights: Arc<dyn FightStore>,
        ledger: FillLedger,
        calculator: Arc<ExposureCalculator>,
        tracker: Arc<WatermarkTracker>,
    ) -> Self {
        Self {
            fights,
            ledger,
            calculator,
            tracker,
        }
    }

    /// Records a fill and refreshes the participant's watermark.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for malformed requests, `UnknownAccount`,
    /// `FightNotFound`/`NotParticipant` for a bad explicit fight id,
    /// `FillConflict`, or a storage error from the ledger insert.
    pub async fn record_fill(&self, notification: FillNotification) -> Result<RecordFillOutcome> {
        let account = notification.account.trim();
        if account.is_empty() {
            return Err(ExposureError::validation("account is required"));
        }
        let side = Side::parse(&notification.side).ok_or_else(|| {
            ExposureError::validation(format!("invalid side: {}", notification.side))
        })?;

        let user = self
            .fights
            .user_by_account(account)
            .await?
            .ok_or_else(|| ExposureError::unknown_account(account))?;

        let Some((fight, participant)) = resolve_participation(
            self.fights.as_ref(),
            &user.id,
            notification.fight_id.as_deref(),
        )
        .await?
        else {
            info!(
                account,
                history_id = %notification.history_id,
                "fill outside any live fight ignored"
            );
            return Ok(RecordFillOutcome {
                recorded: false,
                duplicate: false,
                fill_id: None,
                stake_info: StakeInfo::not_in_fight(),
            });
        };

        let fill = NewFill {
            history_id: notification.history_id,
            order_id: notification.order_id,
            fight_id: fight.id.clone(),
            user_id: user.id.clone(),
            symbol: notification.symbol,
            side,
            amount: notification.amount,
            price: notification.price,
            fee: notification.fee.unwrap_or(Decimal::ZERO),
            pnl: notification.pnl,
            leverage: notification.leverage,
            executed_at: notification.executed_at.unwrap_or_else(Utc::now),
        };

        let outcome = self.ledger.record(fill).await?;
        let record = outcome.record();
        let key = record.fill.key();

        if matches!(outcome, InsertOutcome::Inserted(_))
            && participant.is_blocked(&record.fill.symbol)
        {
            warn!(
                participant = %key,
                symbol = %record.fill.symbol,
                "fill on blocked symbol recorded"
            );
        }
        // A duplicate may be a retry of an attempt that was dropped after the
        // insert committed. The book skips ids it has already applied.
        if let Err(e) = self.calculator.apply(record).await {
            warn!(participant = %key, error = %e, "failed to update running exposure");
        }

        let stake_info = if fight.is_live() {
            match self.tracker.refresh(&key).await {
                Ok(refresh) => live_snapshot(&fight, &participant, &refresh),
                Err(e) => {
                    warn!(participant = %key, error = %e, "watermark refresh after fill failed");
                    self.tracker.pending().push(key.clone());
                    stored_snapshot(&fight, &participant)
                }
            }
        } else {
            info!(
                participant = %key,
                status = %fight.status,
                history_id = %record.fill.history_id,
                "late fill recorded after fight left LIVE"
            );
            stored_snapshot(&fight, &participant)
        };

        Ok(RecordFillOutcome {
            recorded: true,
            duplicate: outcome.is_duplicate(),
            fill_id: Some(record.id),
            stake_info,
        })
    }

    /// Exposure snapshot for an account, refreshing the watermark on the way
    /// when the fight is LIVE.
    ///
    /// # Errors
    ///
    /// Returns `FightNotFound`/`NotParticipant` for a bad explicit fight id,
    /// or storage errors while measuring.
    pub async fn stake_info(&self, account: &str, fight_id: Option<&str>) -> Result<StakeInfo> {
        let Some(user) = self.fights.user_by_account(account.trim()).await? else {
            return Ok(StakeInfo::not_in_fight());
        };
        let Some((fight, participant)) =
            resolve_participation(self.fights.as_ref(), &user.id, fight_id).await?
        else {
            return Ok(StakeInfo::not_in_fight());
        };

        if !fight.is_live() {
            return Ok(stored_snapshot(&fight, &participant));
        }
        let refresh = self.tracker.refresh(&participant.key()).await?;
        Ok(live_snapshot(&fight, &participant, &refresh))
    }
}
