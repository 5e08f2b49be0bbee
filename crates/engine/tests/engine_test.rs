use chrono::Utc;
use fight_exposure_core::{
    ExposureConfig, ExposureError, FightStatus, FillStore, LivePosition, NettingPolicy, NewFill,
    ParticipantKey, PositionSource, Side,
};
use fight_exposure_engine::{
    ExposureEngine, FillNotification, InMemoryStore, OrderActionNotification, OrderCheckRequest,
    OrderDecision, StaticPositionSource, UnavailablePositionSource,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

const ACCOUNT: &str = "acct1";

fn config() -> ExposureConfig {
    ExposureConfig {
        netting_policy: NettingPolicy::SignedNet,
        reconcile_timeout_ms: 500,
        watermark_retry_attempts: 2,
        watermark_retry_backoff_ms: 1,
        sweep_interval_secs: 1,
    }
}

fn store() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    store.add_user("user-1", ACCOUNT);
    store.add_user("user-2", "acct2");
    store.add_fight("fight-1", dec!(1000), FightStatus::Live);
    store.add_participant("fight-1", "user-1");
    store.add_participant("fight-1", "user-2");
    store
}

fn engine_with(store: Arc<InMemoryStore>, positions: Arc<dyn PositionSource>) -> ExposureEngine {
    ExposureEngine::new(store, positions, &config())
}

fn key() -> ParticipantKey {
    ParticipantKey::new("fight-1", "user-1")
}

fn fill(
    history_id: &str,
    symbol: &str,
    side: &str,
    amount: Decimal,
    price: Decimal,
) -> FillNotification {
    FillNotification {
        account: ACCOUNT.to_string(),
        fight_id: None,
        symbol: symbol.to_string(),
        side: side.to_string(),
        amount,
        order_id: format!("o-{history_id}"),
        history_id: history_id.to_string(),
        price,
        fee: Some(dec!(0.1)),
        pnl: None,
        leverage: Some(5),
        executed_at: None,
    }
}

fn position(symbol: &str, amount: Decimal, entry_price: Decimal) -> LivePosition {
    LivePosition {
        symbol: symbol.to_string(),
        side: Some(Side::Buy),
        amount,
        entry_price,
    }
}

#[tokio::test]
async fn test_duplicate_fill_is_idempotent() {
    let store = store();
    let engine = engine_with(store.clone(), Arc::new(StaticPositionSource::new()));

    let first = engine
        .record_fill(fill("h-1", "BTC", "bid", dec!(0.004), dec!(50000)))
        .await
        .unwrap();
    let second = engine
        .record_fill(fill("h-1", "BTC", "bid", dec!(0.004), dec!(50000)))
        .await
        .unwrap();

    assert!(first.recorded && !first.duplicate);
    assert!(second.recorded && second.duplicate);
    assert_eq!(first.fill_id, second.fill_id);
    assert_eq!(store.fill_count(), 1);
    assert_eq!(second.stake_info.max_exposure_used, Some(dec!(200)));
    assert_eq!(second.stake_info.current_exposure, Some(dec!(200)));
}

#[tokio::test]
async fn test_capital_conservation_after_close() {
    let store = store();
    let engine = engine_with(store.clone(), Arc::new(StaticPositionSource::new()));

    engine
        .record_fill(fill("h-1", "ETH", "buy", dec!(0.2), dec!(2000)))
        .await
        .unwrap();
    let closed = engine
        .record_fill(fill("h-2", "ETH", "sell", dec!(0.2), dec!(2100)))
        .await
        .unwrap();

    let info = closed.stake_info;
    assert!(info.in_fight);
    assert_eq!(info.stake, Some(dec!(1000)));
    assert_eq!(info.current_exposure, Some(Decimal::ZERO));
    assert_eq!(info.max_exposure_used, Some(dec!(400)));
    assert_eq!(info.available, Some(dec!(600)));
}

#[tokio::test]
async fn test_reconciliation_takes_larger_estimate() {
    let store = store();
    let source = Arc::new(StaticPositionSource::new());
    source.set_positions(ACCOUNT, vec![position("BTC", dec!(0.006), dec!(50000))]);
    let engine = engine_with(store.clone(), source);

    let outcome = engine
        .record_fill(fill("h-1", "BTC", "buy", dec!(0.005), dec!(50000)))
        .await
        .unwrap();

    assert_eq!(outcome.stake_info.current_exposure, Some(dec!(300)));
    assert_eq!(outcome.stake_info.max_exposure_used, Some(dec!(300)));
    assert_eq!(store.watermark(&key()), Some(dec!(300)));
}

#[tokio::test]
async fn test_account_without_fight() {
    let store = store();
    store.add_user("user-3", "acct3");
    let engine = engine_with(store, Arc::new(StaticPositionSource::new()));

    let info = engine.stake_info("acct3", None).await.unwrap();
    assert!(!info.in_fight);
    assert_eq!(info.stake, None);
    assert_eq!(info.current_exposure, None);
    assert_eq!(info.available, None);

    let json = serde_json::to_value(&info).unwrap();
    assert_eq!(json["inFight"], false);
    assert!(json["stake"].is_null());
    assert!(json["currentExposure"].is_null());
    assert!(json["available"].is_null());

    let unknown = engine.stake_info("nobody", None).await.unwrap();
    assert!(!unknown.in_fight);
}

#[tokio::test]
async fn test_exchange_down_refresh_uses_ledger() {
    let store = store();
    let engine = engine_with(store.clone(), Arc::new(UnavailablePositionSource));

    engine
        .record_fill(fill("h-1", "SOL", "buy", dec!(2), dec!(150)))
        .await
        .unwrap();
    let refresh = engine.refresh(&key()).await.unwrap();

    assert_eq!(refresh.live_exposure, Decimal::ZERO);
    assert_eq!(refresh.current_exposure, dec!(300));
    assert_eq!(store.watermark(&key()), Some(dec!(300)));
}

#[tokio::test]
async fn test_blocked_symbol_excluded_and_rejected() {
    let store = store();
    let source = Arc::new(StaticPositionSource::new());
    source.set_positions(
        ACCOUNT,
        vec![
            position("ETH", dec!(1), dec!(3000)),
            position("BTC", dec!(0.002), dec!(50000)),
        ],
    );
    let engine = engine_with(store.clone(), source);

    let participant = engine
        .initialize_participant(&key(), Some(vec![position("ETH", dec!(1), dec!(2900))]))
        .await
        .unwrap();
    assert_eq!(participant.blocked_symbols, vec!["ETH"]);

    for symbol in ["ETH", "BTC"] {
        engine
            .record_order_action(OrderActionNotification {
                account: ACCOUNT.to_string(),
                fight_id: None,
                symbol: symbol.to_string(),
                action_type: "market".to_string(),
                success: true,
            })
            .await
            .unwrap();
    }

    let info = engine.stake_info(ACCOUNT, None).await.unwrap();
    assert_eq!(info.current_exposure, Some(dec!(100)));
    assert_eq!(info.blocked_symbols, vec!["ETH"]);

    let decision = engine
        .check_order(OrderCheckRequest {
            account: ACCOUNT.to_string(),
            fight_id: None,
            symbol: "eth".to_string(),
            notional: dec!(10),
            reduce_only: false,
        })
        .await
        .unwrap();
    assert_eq!(
        decision,
        OrderDecision::BlockedSymbol {
            symbol: "ETH".to_string()
        }
    );
}

#[tokio::test]
async fn test_check_order_against_available() {
    let store = store();
    let engine = engine_with(store, Arc::new(StaticPositionSource::new()));
    engine
        .record_fill(fill("h-1", "BTC", "buy", dec!(0.01), dec!(40000)))
        .await
        .unwrap();

    let request = |notional| OrderCheckRequest {
        account: ACCOUNT.to_string(),
        fight_id: Some("fight-1".to_string()),
        symbol: "BTC".to_string(),
        notional,
        reduce_only: false,
    };

    let ok = engine.check_order(request(dec!(600))).await.unwrap();
    assert_eq!(ok, OrderDecision::Allowed { available: dec!(600) });

    let too_big = engine.check_order(request(dec!(601))).await.unwrap();
    assert!(matches!(too_big, OrderDecision::ExceedsAvailable { .. }));
}

#[tokio::test]
async fn test_late_fill_recorded_without_refresh() {
    let store = store();
    let engine = engine_with(store.clone(), Arc::new(StaticPositionSource::new()));
    engine
        .record_fill(fill("h-1", "BTC", "buy", dec!(0.002), dec!(50000)))
        .await
        .unwrap();
    store.set_fight_status("fight-1", FightStatus::Finished);

    let mut late = fill("h-2", "BTC", "buy", dec!(0.01), dec!(50000));
    late.fight_id = Some("fight-1".to_string());
    let outcome = engine.record_fill(late).await.unwrap();

    assert!(outcome.recorded);
    assert!(!outcome.stake_info.in_fight);
    assert_eq!(store.fill_count(), 2);
    assert_eq!(store.watermark(&key()), Some(dec!(100)));

    let err = engine.refresh(&key()).await.unwrap_err();
    assert!(matches!(err, ExposureError::FightNotLive { .. }));

    let report = engine.report(&key()).await.unwrap();
    assert_eq!(report.status, "FINISHED");
    assert_eq!(report.max_exposure_used, dec!(100));
    assert_eq!(report.ledger_exposure, dec!(600));
    assert_eq!(report.fills.len(), 2);
    assert_eq!(report.total_fees, dec!(0.2));
}

#[tokio::test]
async fn test_fill_without_live_fight_is_not_recorded() {
    let store = store();
    store.set_fight_status("fight-1", FightStatus::Waiting);
    let engine = engine_with(store.clone(), Arc::new(StaticPositionSource::new()));

    let outcome = engine
        .record_fill(fill("h-1", "BTC", "buy", dec!(1), dec!(1)))
        .await
        .unwrap();
    assert!(!outcome.recorded);
    assert_eq!(store.fill_count(), 0);
}

#[tokio::test]
async fn test_request_errors() {
    let store = store();
    let engine = engine_with(store.clone(), Arc::new(StaticPositionSource::new()));

    let mut bad_side = fill("h-1", "BTC", "up", dec!(1), dec!(1));
    let err = engine.record_fill(bad_side.clone()).await.unwrap_err();
    assert!(err.is_client_error());

    bad_side.side = "buy".to_string();
    bad_side.account = "unknown".to_string();
    let err = engine.record_fill(bad_side).await.unwrap_err();
    assert!(matches!(err, ExposureError::UnknownAccount { .. }));

    let mut wrong_fight = fill("h-1", "BTC", "buy", dec!(1), dec!(1));
    wrong_fight.fight_id = Some("fight-9".to_string());
    let err = engine.record_fill(wrong_fight).await.unwrap_err();
    assert!(matches!(err, ExposureError::FightNotFound { .. }));

    let err = engine
        .record_fill(fill("h-1", "BTC", "buy", dec!(-1), dec!(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, ExposureError::Validation(_)));
    assert_eq!(store.fill_count(), 0);
}

#[tokio::test]
async fn test_failed_raise_is_swept_later() {
    let store = store();
    let engine = engine_with(store.clone(), Arc::new(StaticPositionSource::new()));
    store.fail_watermark_writes(2);

    let outcome = engine
        .record_fill(fill("h-1", "BTC", "buy", dec!(0.01), dec!(50000)))
        .await
        .unwrap();
    assert_eq!(outcome.stake_info.max_exposure_used, Some(dec!(500)));
    assert_eq!(outcome.stake_info.available, Some(dec!(500)));
    assert_eq!(store.watermark(&key()), Some(Decimal::ZERO));
    assert_eq!(engine.pending_refreshes().len(), 1);

    let report = engine.sweeper().sweep_once().await.unwrap();
    assert_eq!(report.queued, 1);
    assert_eq!(report.failed, 0);
    assert!(report.raised >= 1);
    assert_eq!(store.watermark(&key()), Some(dec!(500)));
    assert!(engine.pending_refreshes().is_empty());
}

#[tokio::test]
async fn test_audit_matches_running_book() {
    let store = store();
    let engine = engine_with(store, Arc::new(StaticPositionSource::new()));
    engine
        .record_fill(fill("h-1", "BTC", "buy", dec!(0.01), dec!(50000)))
        .await
        .unwrap();
    engine
        .record_fill(fill("h-2", "BTC", "sell", dec!(0.004), dec!(52000)))
        .await
        .unwrap();

    let audit = engine.audit(&key()).await.unwrap();
    assert!(!audit.drifted());
    assert_eq!(audit.rebuilt, dec!(300));
    assert_eq!(audit.fills, 2);
}

/// The first attempt committed its ledger row and was then dropped before the
/// running book saw the fill. The caller's retry must still count it.
#[tokio::test]
async fn test_retry_after_committed_insert_counts_fill() {
    let store = store();
    let engine = engine_with(store.clone(), Arc::new(UnavailablePositionSource));

    let warm = engine.refresh(&key()).await.unwrap();
    assert_eq!(warm.current_exposure, Decimal::ZERO);

    let committed = NewFill {
        history_id: "h-1".to_string(),
        order_id: "o-h-1".to_string(),
        fight_id: "fight-1".to_string(),
        user_id: "user-1".to_string(),
        symbol: "BTC".to_string(),
        side: Side::Buy,
        amount: dec!(0.01),
        price: dec!(50000),
        fee: dec!(0.1),
        pnl: None,
        leverage: Some(5),
        executed_at: Utc::now(),
    };
    store.insert_fill(&committed).await.unwrap();

    let retry = engine
        .record_fill(fill("h-1", "BTC", "buy", dec!(0.01), dec!(50000)))
        .await
        .unwrap();
    assert!(retry.duplicate);
    assert_eq!(retry.stake_info.current_exposure, Some(dec!(500)));
    assert_eq!(retry.stake_info.max_exposure_used, Some(dec!(500)));
    assert_eq!(store.watermark(&key()), Some(dec!(500)));
    assert_eq!(store.fill_count(), 1);

    // A second retry must not count the fill twice.
    let again = engine
        .record_fill(fill("h-1", "BTC", "buy", dec!(0.01), dec!(50000)))
        .await
        .unwrap();
    assert_eq!(again.stake_info.current_exposure, Some(dec!(500)));

    let audit = engine.audit(&key()).await.unwrap();
    assert!(!audit.drifted());
    assert_eq!(audit.rebuilt, dec!(500));
}
