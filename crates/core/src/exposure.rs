//! Pure exposure math. Nothing here performs I/O.

use crate::position::PositionBook;
use crate::types::{normalize_symbol, FillRecord, LivePosition};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How ledger fills on the same symbol are combined into exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NettingPolicy {
    /// Opens and closes net against each other; exposure is the open quantity
    /// at its average entry price.
    #[default]
    SignedNet,
    /// Every fill adds `amount * price`; closes never reduce exposure.
    GrossNotional,
}

impl NettingPolicy {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SignedNet => "signed_net",
            Self::GrossNotional => "gross_notional",
        }
    }
}

/// Ledger-derived exposure, recomputed from the full fill history.
#[must_use]
pub fn ledger_exposure(fills: &[FillRecord], policy: NettingPolicy) -> Decimal {
    PositionBook::from_fills(fills).exposure(policy)
}

/// Live exposure: `sum(|amount| * entry_price)` over positions whose symbol is
/// in `fight_symbols`.
#[must_use]
pub fn live_exposure(positions: &[LivePosition], fight_symbols: &BTreeSet<String>) -> Decimal {
    positions
        .iter()
        .filter(|p| fight_symbols.contains(&normalize_symbol(&p.symbol)))
        .map(LivePosition::notional)
        .sum()
}

/// Merges the two eventually-consistent exposure estimates.
///
/// The larger value wins so a lagging source can never hide committed capital.
#[must_use]
pub fn merge_exposure(ledger: Decimal, live: Decimal) -> Decimal {
    ledger.max(live)
}
