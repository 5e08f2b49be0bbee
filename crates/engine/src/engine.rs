//! `ExposureEngine` wires the components together and is the single entry
//! point used by the HTTP boundary and the CLI.

use crate::exposure::{ExposureCalculator, LedgerAudit};
use crate::fight_start::FightStartInitializer;
use crate::ingestion::{resolve_participation, FillIngestion, FillNotification, RecordFillOutcome};
use crate::ledger::FillLedger;
use crate::limiter::{available_capital, evaluate_order, OrderCheck, OrderDecision};
use crate::reconciler::LiveReconciler;
use crate::sweeper::WatermarkSweeper;
use crate::watermark::{PendingRefreshes, RetryPolicy, WatermarkTracker};
use chrono::{DateTime, Utc};
use fight_exposure_core::{
    ledger_exposure, ExposureConfig, ExposureError, FightParticipant, FightStore, FillRecord,
    FillStore, LivePosition, NettingPolicy, OrderAction, OrderActionStore, ParticipantKey,
    PositionSource, Result, StakeInfo, WatermarkRefresh,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// An order placement attempt reported by the order path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderActionNotification {
    pub account: String,
    #[serde(default)]
    pub fight_id: Option<String>,
    pub symbol: String,
    pub action_type: String,
    pub success: bool,
}

/// A prospective order to check before it is routed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCheckRequest {
    pub account: String,
    #[serde(default)]
    pub fight_id: Option<String>,
    pub symbol: String,
    pub notional: Decimal,
    #[serde(default)]
    pub reduce_only: bool,
}

/// Read-only settlement view of one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementReport {
    pub fight_id: String,
    pub user_id: String,
    pub status: String,
    pub stake: Decimal,
    pub max_exposure_used: Decimal,
    pub available: Decimal,
    /// Ledger exposure rebuilt from the full fill history.
    pub ledger_exposure: Decimal,
    pub netting_policy: NettingPolicy,
    pub blocked_symbols: Vec<String>,
    pub total_fees: Decimal,
    pub realized_pnl: Decimal,
    pub fills: Vec<FillRecord>,
    pub generated_at: DateTime<Utc>,
}

/// Fight exposure accounting and reconciliation engine.
pub struct ExposureEngine {
    fights: Arc<dyn FightStore>,
    fills: Arc<dyn FillStore>,
    actions: Arc<dyn OrderActionStore>,
    calculator: Arc<ExposureCalculator>,
    tracker: Arc<WatermarkTracker>,
    ingestion: FillIngestion,
    initializer: FightStartInitializer,
    sweeper: Arc<WatermarkSweeper>,
}

impl ExposureEngine {
    /// Builds the engine over one store implementing every storage trait.
    #[must_use]
    pub fn new<S>(store: Arc<S>, positions: Arc<dyn PositionSource>, config: &ExposureConfig) -> Self
    where
        S: FillStore + OrderActionStore + FightStore + 'static,
    {
        let fights: Arc<dyn FightStore> = store.clone();
        let fills: Arc<dyn FillStore> = store.clone();
        let actions: Arc<dyn OrderActionStore> = store;

        let calculator = Arc::new(ExposureCalculator::new(
            fills.clone(),
            config.netting_policy,
        ));
        let reconciler = Arc::new(LiveReconciler::new(
            actions.clone(),
            positions,
            Duration::from_millis(config.reconcile_timeout_ms),
        ));
        let tracker = Arc::new(WatermarkTracker::new(
            fights.clone(),
            calculator.clone(),
            reconciler.clone(),
            RetryPolicy::from_config(config),
            Arc::new(PendingRefreshes::new()),
        ));
        let ingestion = FillIngestion::new(
            fights.clone(),
            FillLedger::new(fills.clone()),
            calculator.clone(),
            tracker.clone(),
        );
        let initializer = FightStartInitializer::new(fights.clone(), reconciler);
        let sweeper = Arc::new(WatermarkSweeper::new(
            fights.clone(),
            tracker.clone(),
            calculator.clone(),
            Duration::from_secs(config.sweep_interval_secs.max(1)),
        ));

        info!(
            netting_policy = config.netting_policy.as_str(),
            reconcile_timeout_ms = config.reconcile_timeout_ms,
            "exposure engine initialized"
        );

        Self {
            fights,
            fills,
            actions,
            calculator,
            tracker,
            ingestion,
            initializer,
            sweeper,
        }
    }

    #[must_use]
    pub fn sweeper(&self) -> Arc<WatermarkSweeper> {
        self.sweeper.clone()
    }

    #[must_use]
    pub fn pending_refreshes(&self) -> &Arc<PendingRefreshes> {
        self.tracker.pending()
    }

    // =========================================================================
    // Fills and stake info
    // =========================================================================

    /// See [`FillIngestion::record_fill`].
    ///
    /// # Errors
    ///
    /// Propagates ingestion errors.
    pub async fn record_fill(&self, notification: FillNotification) -> Result<RecordFillOutcome> {
        self.ingestion.record_fill(notification).await
    }

    /// See [`FillIngestion::stake_info`].
    ///
    /// # Errors
    ///
    /// Propagates read path errors.
    pub async fn stake_info(&self, account: &str, fight_id: Option<&str>) -> Result<StakeInfo> {
        self.ingestion.stake_info(account, fight_id).await
    }

    // =========================================================================
    // Watermark
    // =========================================================================

    /// Refreshes the watermark of a participant of a LIVE fight.
    ///
    /// # Errors
    ///
    /// Returns `FightNotFound`, `FightNotLive`, `NotParticipant`, or refresh
    /// errors.
    pub async fn refresh(&self, key: &ParticipantKey) -> Result<WatermarkRefresh> {
        let fight = self
            .fights
            .fight(&key.fight_id)
            .await?
            .ok_or_else(|| ExposureError::fight_not_found(&key.fight_id))?;
        if !fight.is_live() {
            return Err(ExposureError::FightNotLive {
                fight_id: fight.id,
                status: fight.status.to_string(),
            });
        }
        self.tracker.refresh(key).await
    }

    /// Rebuilds ledger exposure from scratch and replaces the running book.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the ledger cannot be read.
    pub async fn audit(&self, key: &ParticipantKey) -> Result<LedgerAudit> {
        self.calculator.audit(key).await
    }

    // =========================================================================
    // Fight start
    // =========================================================================

    /// See [`FightStartInitializer::initialize`].
    ///
    /// # Errors
    ///
    /// Returns `FightNotFound`, `NotParticipant`, or `ExchangeUnavailable`.
    pub async fn initialize_participant(
        &self,
        key: &ParticipantKey,
        snapshot: Option<Vec<LivePosition>>,
    ) -> Result<FightParticipant> {
        if self.fights.fight(&key.fight_id).await?.is_none() {
            return Err(ExposureError::fight_not_found(&key.fight_id));
        }
        self.initializer.initialize(key, snapshot).await
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Logs an order action for the fight-symbol set. Returns false if the
    /// account is not in a fight.
    ///
    /// # Errors
    ///
    /// Returns `Validation`, `UnknownAccount`, or storage errors.
    pub async fn record_order_action(&self, notification: OrderActionNotification) -> Result<bool> {
        if notification.symbol.trim().is_empty() {
            return Err(ExposureError::validation("symbol is required"));
        }
        if notification.action_type.trim().is_empty() {
            return Err(ExposureError::validation("actionType is required"));
        }
        let user = self
            .fights
            .user_by_account(notification.account.trim())
            .await?
            .ok_or_else(|| ExposureError::unknown_account(notification.account.trim()))?;

        let Some((fight, _)) = resolve_participation(
            self.fights.as_ref(),
            &user.id,
            notification.fight_id.as_deref(),
        )
        .await?
        else {
            return Ok(false);
        };

        let action = OrderAction {
            fight_id: fight.id,
            user_id: user.id,
            symbol: fight_exposure_core::normalize_symbol(&notification.symbol),
            action_type: notification.action_type.trim().to_lowercase(),
            success: notification.success,
            created_at: Utc::now(),
        };
        self.actions.record_order_action(&action).await?;
        Ok(true)
    }

    /// Checks an order against the capital limiter.
    ///
    /// # Errors
    ///
    /// Returns `Validation`, `UnknownAccount`, `FightNotFound`,
    /// `NotParticipant`, or refresh errors.
    pub async fn check_order(&self, request: OrderCheckRequest) -> Result<OrderDecision> {
        if request.notional < Decimal::ZERO {
            return Err(ExposureError::validation("notional must not be negative"));
        }
        let user = self
            .fights
            .user_by_account(request.account.trim())
            .await?
            .ok_or_else(|| ExposureError::unknown_account(request.account.trim()))?;

        let Some((fight, participant)) = resolve_participation(
            self.fights.as_ref(),
            &user.id,
            request.fight_id.as_deref(),
        )
        .await?
        else {
            return Ok(OrderDecision::NotInFight);
        };

        let watermark = if fight.is_live() {
            self.tracker
                .refresh(&participant.key())
                .await?
                .max_exposure_used
        } else {
            participant.max_exposure_used
        };

        let check = OrderCheck {
            symbol: &request.symbol,
            notional: request.notional,
            reduce_only: request.reduce_only,
        };
        Ok(evaluate_order(&fight, &participant, watermark, &check))
    }

    // =========================================================================
    // Settlement
    // =========================================================================

    /// Read-only settlement snapshot: final watermark and trade history.
    ///
    /// # Errors
    ///
    /// Returns `FightNotFound`, `NotParticipant`, or storage errors.
    pub async fn report(&self, key: &ParticipantKey) -> Result<SettlementReport> {
        let fight = self
            .fights
            .fight(&key.fight_id)
            .await?
            .ok_or_else(|| ExposureError::fight_not_found(&key.fight_id))?;
        let participant = self
            .fights
            .participant(key)
            .await?
            .ok_or_else(|| ExposureError::not_participant(&key.fight_id, &key.user_id))?;
        let fills = self.fills.fills_for(key).await?;

        let policy = self.calculator.policy();
        Ok(SettlementReport {
            fight_id: fight.id,
            user_id: participant.user_id.clone(),
            status: fight.status.to_string(),
            stake: fight.stake,
            max_exposure_used: participant.max_exposure_used,
            available: available_capital(
                fight.stake,
                participant.max_exposure_used,
                Decimal::ZERO,
            ),
            ledger_exposure: ledger_exposure(&fills, policy),
            netting_policy: policy,
            blocked_symbols: participant.blocked_symbols,
            total_fees: fills.iter().map(|r| r.fill.fee).sum(),
            realized_pnl: fills.iter().filter_map(|r| r.fill.pnl).sum(),
            fills,
            generated_at: Utc::now(),
        })
    }
}
