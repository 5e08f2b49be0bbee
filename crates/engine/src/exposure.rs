//! Ledger-derived exposure with a running per-participant position book.
//!
//! Each participant's book is loaded from the full ledger on first use and
//! then updated incrementally for every newly inserted fill. Loading and
//! applying are serialized per participant; participants never share a lock.

use fight_exposure_core::{
    FillRecord, FillStore, NettingPolicy, ParticipantKey, PositionBook, Result, SymbolPosition,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

struct CachedBook {
    book: PositionBook,
    applied: HashSet<i64>,
}

impl CachedBook {
    fn from_records(records: &[FillRecord]) -> Self {
        Self {
            book: PositionBook::from_fills(records),
            applied: records.iter().map(|r| r.id).collect(),
        }
    }

    fn apply(&mut self, record: &FillRecord) {
        if self.applied.insert(record.id) {
            self.book.apply_fill(&record.fill);
        }
    }
}

type BookSlot = Arc<AsyncMutex<Option<CachedBook>>>;

/// Result of comparing the running book against a full ledger rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerAudit {
    /// Exposure of the running book before the audit, if one was cached.
    pub running: Option<Decimal>,
    pub rebuilt: Decimal,
    pub fills: usize,
}

impl LedgerAudit {
    #[must_use]
    pub fn drifted(&self) -> bool {
        self.running.is_some_and(|r| r != self.rebuilt)
    }
}

/// Computes ledger exposure under a fixed netting policy.
pub struct ExposureCalculator {
    fills: Arc<dyn FillStore>,
    policy: NettingPolicy,
    books: Mutex<HashMap<ParticipantKey, BookSlot>>,
}

impl ExposureCalculator {
    #[must_use]
    pub fn new(fills: Arc<dyn FillStore>, policy: NettingPolicy) -> Self {
        Self {
            fills,
            policy,
            books: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub const fn policy(&self) -> NettingPolicy {
        self.policy
    }

    fn slot(&self, key: &ParticipantKey) -> BookSlot {
        self.books.lock().entry(key.clone()).or_default().clone()
    }

    async fn load(&self, key: &ParticipantKey) -> Result<CachedBook> {
        let records = self.fills.fills_for(key).await?;
        debug!(participant = %key, fills = records.len(), "loaded position book from ledger");
        Ok(CachedBook::from_records(&records))
    }

    /// Current ledger exposure for a participant.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the ledger must be loaded and cannot be read.
    pub async fn ledger_exposure(&self, key: &ParticipantKey) -> Result<Decimal> {
        let slot = self.slot(key);
        let mut guard = slot.lock().await;
        if guard.is_none() {
            *guard = Some(self.load(key).await?);
        }
        Ok(guard
            .as_ref()
            .map_or(Decimal::ZERO, |c| c.book.exposure(self.policy)))
    }

    /// Folds a recorded fill into the participant's running book.
    ///
    /// A fill already reflected in the book is ignored.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the book is cold and the ledger cannot be read.
    pub async fn apply(&self, record: &FillRecord) -> Result<()> {
        let key = record.fill.key();
        let slot = self.slot(&key);
        let mut guard = slot.lock().await;
        match guard.as_mut() {
            Some(cached) => cached.apply(record),
            None => {
                let mut cached = self.load(&key).await?;
                cached.apply(record);
                *guard = Some(cached);
            }
        }
        Ok(())
    }

    /// Open positions in the running book.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the ledger must be loaded and cannot be read.
    pub async fn positions(&self, key: &ParticipantKey) -> Result<Vec<SymbolPosition>> {
        let slot = self.slot(key);
        let mut guard = slot.lock().await;
        if guard.is_none() {
            *guard = Some(self.load(key).await?);
        }
        let mut positions: Vec<SymbolPosition> = guard
            .as_ref()
            .map(|c| c.book.all_positions().values().cloned().collect())
            .unwrap_or_default();
        positions.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(positions)
    }

    /// Rebuilds the book from the full ledger and replaces the running one.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the ledger cannot be read.
    pub async fn audit(&self, key: &ParticipantKey) -> Result<LedgerAudit> {
        let slot = self.slot(key);
        let mut guard = slot.lock().await;

        let records = self.fills.fills_for(key).await?;
        let rebuilt = CachedBook::from_records(&records);
        let audit = LedgerAudit {
            running: guard.as_ref().map(|c| c.book.exposure(self.policy)),
            rebuilt: rebuilt.book.exposure(self.policy),
            fills: records.len(),
        };

        if audit.drifted() {
            warn!(
                participant = %key,
                running = ?audit.running,
                rebuilt = %audit.rebuilt,
                "running exposure drifted from ledger rebuild"
            );
        }
        *guard = Some(rebuilt);
        Ok(audit)
    }

    /// Drops cached books for participants not in `keep`.
    pub fn retain(&self, keep: &HashSet<ParticipantKey>) {
        self.books.lock().retain(|k, _| keep.contains(k));
    }

    #[must_use]
    pub fn cached_participants(&self) -> usize {
        self.books.lock().len()
    }
}
