//! Background watermark sweep.
//!
//! Re-runs refresh for participants whose raise is still owed and for every
//! participant of a LIVE fight, so polling gaps and failed writes heal. Each
//! running book is rebuilt from the ledger first, which picks up fills this
//! process never applied (dropped requests, other replicas).

use crate::exposure::ExposureCalculator;
use crate::watermark::WatermarkTracker;
use fight_exposure_core::{FightStore, ParticipantKey, Result};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Counters from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub queued: usize,
    pub live: usize,
    pub refreshed: usize,
    pub raised: usize,
    /// Running books that disagreed with a full ledger rebuild.
    pub drifted: usize,
    pub failed: usize,
}

pub struct WatermarkSweeper {
    fights: Arc<dyn FightStore>,
    tracker: Arc<WatermarkTracker>,
    calculator: Arc<ExposureCalculator>,
    interval: Duration,
    scan_live: bool,
}

impl WatermarkSweeper {
    #[must_use]
    pub fn new(
        fights: Arc<dyn FightStore>,
        tracker: Arc<WatermarkTracker>,
        calculator: Arc<ExposureCalculator>,
        interval: Duration,
    ) -> Self {
        Self {
            fights,
            tracker,
            calculator,
            interval,
            scan_live: true,
        }
    }

    /// A sweeper over the same components that only retries queued raises and
    /// skips the scan of LIVE participants.
    #[must_use]
    pub fn queue_only(&self) -> Self {
        Self {
            fights: self.fights.clone(),
            tracker: self.tracker.clone(),
            calculator: self.calculator.clone(),
            interval: self.interval,
            scan_live: false,
        }
    }

    /// Runs one sweep over queued and (unless queue-only) LIVE participants.
    ///
    /// Participants that fail again are re-queued.
    ///
    /// # Errors
    ///
    /// Returns a storage error if LIVE participants cannot be listed; the
    /// queue is left intact in that case.
    pub async fn sweep_once(&self) -> Result<SweepReport> {
        let queued = self.tracker.pending().drain();
        let live = if self.scan_live {
            match self.fights.live_participants().await {
                Ok(live) => live,
                Err(e) => {
                    for key in queued {
                        self.tracker.pending().push(key);
                    }
                    return Err(e);
                }
            }
        } else {
            Vec::new()
        };

        let mut report = SweepReport {
            queued: queued.len(),
            live: live.len(),
            ..SweepReport::default()
        };

        let targets: BTreeSet<ParticipantKey> =
            queued.into_iter().chain(live.iter().cloned()).collect();
        for key in targets {
            match self.calculator.audit(&key).await {
                Ok(audit) if audit.drifted() => report.drifted += 1,
                Ok(_) => {}
                Err(e) => warn!(participant = %key, error = %e, "ledger rebuild failed"),
            }
            match self.tracker.try_refresh(&key).await {
                Ok(refresh) => {
                    report.refreshed += 1;
                    if refresh.updated {
                        report.raised += 1;
                    }
                }
                Err(e) if e.is_not_found() => {
                    warn!(participant = %key, error = %e, "dropping sweep for unknown participant");
                }
                Err(e) => {
                    report.failed += 1;
                    error!(participant = %key, error = %e, "sweep refresh failed, re-queued");
                    self.tracker.pending().push(key);
                }
            }
        }

        let mut keep: HashSet<ParticipantKey> = live.into_iter().collect();
        keep.extend(self.tracker.pending().snapshot());
        self.calculator.retain(&keep);

        Ok(report)
    }

    /// Spawns the periodic sweep. Stops when `shutdown` flips to true or its
    /// sender is dropped.
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                interval_secs = self.interval.as_secs(),
                scan_live = self.scan_live,
                "watermark sweeper started"
            );
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match self.sweep_once().await {
                            Ok(r) if r.raised > 0 || r.failed > 0 || r.drifted > 0 => info!(
                                queued = r.queued,
                                live = r.live,
                                raised = r.raised,
                                drifted = r.drifted,
                                failed = r.failed,
                                "watermark sweep complete"
                            ),
                            Ok(r) => debug!(live = r.live, "watermark sweep complete"),
                            Err(e) => error!(error = %e, "watermark sweep failed"),
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("watermark sweeper stopping");
                            break;
                        }
                    }
                }
            }
        })
    }
}
