use crate::error::ApiError;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use fight_exposure_core::{
    FightParticipant, LivePosition, ParticipantKey, StakeInfo, WatermarkRefresh,
};
use fight_exposure_engine::{
    ExposureEngine, FillNotification, LedgerAudit, OrderActionNotification, OrderCheckRequest,
    OrderDecision, SettlementReport,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordFillResponse {
    pub success: bool,
    pub duplicate: bool,
    pub recorded: bool,
    pub stake_info: StakeInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeInfoQuery {
    pub account: String,
    pub fight_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InitializeRequest {
    #[serde(default)]
    pub positions: Option<Vec<LivePosition>>,
}

#[derive(Debug, Serialize)]
pub struct OrderActionResponse {
    pub recorded: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub pending_refreshes: usize,
}

/// Records a fill notification.
///
/// # Errors
/// Returns 400 for malformed fills or conflicts, 404 for unknown accounts or
/// fights, and 500 for storage failures.
pub async fn record_fill(
    State(engine): State<Arc<ExposureEngine>>,
    Json(req): Json<FillNotification>,
) -> ApiResult<RecordFillResponse> {
    let outcome = engine.record_fill(req).await?;
    Ok(Json(RecordFillResponse {
        success: true,
        duplicate: outcome.duplicate,
        recorded: outcome.recorded,
        stake_info: outcome.stake_info,
    }))
}

/// Gets the exposure snapshot of an account.
///
/// # Errors
/// Returns 404 for an unknown explicit fight and 500 for storage failures.
pub async fn get_stake_info(
    State(engine): State<Arc<ExposureEngine>>,
    Query(query): Query<StakeInfoQuery>,
) -> ApiResult<StakeInfo> {
    let info = engine
        .stake_info(&query.account, query.fight_id.as_deref())
        .await?;
    Ok(Json(info))
}

/// Refreshes a participant's watermark.
///
/// # Errors
/// Returns 404 for unknown fights or participants and 409 if the fight is not LIVE.
pub async fn refresh_watermark(
    State(engine): State<Arc<ExposureEngine>>,
    Path((fight_id, user_id)): Path<(String, String)>,
) -> ApiResult<WatermarkRefresh> {
    let refresh = engine
        .refresh(&ParticipantKey::new(fight_id, user_id))
        .await?;
    Ok(Json(refresh))
}

/// Initializes blocked symbols at fight start.
///
/// # Errors
/// Returns 404 for unknown fights or participants and 500 if the exchange
/// cannot be reached without a snapshot.
pub async fn initialize_participant(
    State(engine): State<Arc<ExposureEngine>>,
    Path((fight_id, user_id)): Path<(String, String)>,
    body: Option<Json<InitializeRequest>>,
) -> ApiResult<FightParticipant> {
    let snapshot = body.and_then(|Json(req)| req.positions);
    let participant = engine
        .initialize_participant(&ParticipantKey::new(fight_id, user_id), snapshot)
        .await?;
    Ok(Json(participant))
}

/// Rebuilds ledger exposure from scratch.
///
/// # Errors
/// Returns 500 if the ledger cannot be read.
pub async fn audit_exposure(
    State(engine): State<Arc<ExposureEngine>>,
    Path((fight_id, user_id)): Path<(String, String)>,
) -> ApiResult<LedgerAudit> {
    let audit = engine.audit(&ParticipantKey::new(fight_id, user_id)).await?;
    Ok(Json(audit))
}

/// Gets the settlement snapshot of a participant.
///
/// # Errors
/// Returns 404 for unknown fights or participants.
pub async fn get_report(
    State(engine): State<Arc<ExposureEngine>>,
    Path((fight_id, user_id)): Path<(String, String)>,
) -> ApiResult<SettlementReport> {
    let report = engine.report(&ParticipantKey::new(fight_id, user_id)).await?;
    Ok(Json(report))
}

/// Records an order action.
///
/// # Errors
/// Returns 400 for malformed requests and 404 for unknown accounts.
pub async fn record_order_action(
    State(engine): State<Arc<ExposureEngine>>,
    Json(req): Json<OrderActionNotification>,
) -> ApiResult<OrderActionResponse> {
    let recorded = engine.record_order_action(req).await?;
    Ok(Json(OrderActionResponse { recorded }))
}

/// Checks an order against the capital limiter.
///
/// # Errors
/// Returns 404 for unknown accounts or fights.
pub async fn check_order(
    State(engine): State<Arc<ExposureEngine>>,
    Json(req): Json<OrderCheckRequest>,
) -> ApiResult<OrderDecision> {
    let decision = engine.check_order(req).await?;
    Ok(Json(decision))
}

pub async fn health(State(engine): State<Arc<ExposureEngine>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        pending_refreshes: engine.pending_refreshes().len(),
    })
}
