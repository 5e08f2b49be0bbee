//! Capital exposure accounting for fights.
//!
//! Components, leaves first:
//! - [`ledger`]: append-only, idempotent fill ledger
//! - [`exposure`]: ledger exposure with a running per-participant book
//! - [`reconciler`]: live exchange positions scoped to fight symbols
//! - [`watermark`]: monotonic `max_exposure_used` with retry and sweep queue
//! - [`limiter`]: available capital and order eligibility
//! - [`ingestion`]: fill ingestion and the stake-info read path
//! - [`fight_start`]: one-shot blocked symbol initialization
//! - [`sweeper`]: periodic self-healing refresh
//! - [`engine`]: wiring

pub mod engine;
pub mod exposure;
pub mod fight_start;
pub mod ingestion;
pub mod ledger;
pub mod limiter;
pub mod memory;
pub mod reconciler;
pub mod sweeper;
pub mod watermark;

pub use engine::{ExposureEngine, OrderActionNotification, OrderCheckRequest, SettlementReport};
pub use exposure::{ExposureCalculator, LedgerAudit};
pub use fight_start::{held_symbols, FightStartInitializer};
pub use ingestion::{FillIngestion, FillNotification, RecordFillOutcome};
pub use ledger::{validate_fill, FillLedger};
pub use limiter::{available_capital, evaluate_order, is_tradeable, OrderCheck, OrderDecision};
pub use memory::{InMemoryStore, StaticPositionSource, UnavailablePositionSource};
pub use reconciler::LiveReconciler;
pub use sweeper::{SweepReport, WatermarkSweeper};
pub use watermark::{PendingRefreshes, RetryPolicy, WatermarkTracker};
