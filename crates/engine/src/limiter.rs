//! Capital limiter. Stateless: every value is derived on read.

use fight_exposure_core::{normalize_symbol, Fight, FightParticipant};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Capital still available to a participant.
///
/// `max(0, stake - max_exposure_used)`. Current exposure is deliberately not
/// an input to the result: closing positions never frees stake.
#[must_use]
pub fn available_capital(
    stake: Decimal,
    max_exposure_used: Decimal,
    _current_exposure: Decimal,
) -> Decimal {
    (stake - max_exposure_used).max(Decimal::ZERO)
}

/// Returns true if `symbol` may be traded by the participant.
#[must_use]
pub fn is_tradeable(participant: &FightParticipant, symbol: &str) -> bool {
    !participant.is_blocked(symbol)
}

/// Outcome of an order eligibility check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum OrderDecision {
    /// The account is not in a LIVE fight; no fight limits apply.
    NotInFight,
    Allowed {
        available: Decimal,
    },
    BlockedSymbol {
        symbol: String,
    },
    FightNotLive {
        status: String,
    },
    ExceedsAvailable {
        available: Decimal,
        requested: Decimal,
    },
}

impl OrderDecision {
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. } | Self::NotInFight)
    }
}

/// A prospective order to check against the limiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderCheck<'a> {
    pub symbol: &'a str,
    pub notional: Decimal,
    /// Orders that can only shrink a position skip the capital check.
    pub reduce_only: bool,
}

/// Evaluates an order against fight status, blocked symbols and the
/// participant's available capital.
#[must_use]
pub fn evaluate_order(
    fight: &Fight,
    participant: &FightParticipant,
    max_exposure_used: Decimal,
    order: &OrderCheck<'_>,
) -> OrderDecision {
    if !fight.is_live() {
        return OrderDecision::FightNotLive {
            status: fight.status.to_string(),
        };
    }
    if !is_tradeable(participant, order.symbol) {
        return OrderDecision::BlockedSymbol {
            symbol: normalize_symbol(order.symbol),
        };
    }

    let available = available_capital(fight.stake, max_exposure_used, Decimal::ZERO);
    if !order.reduce_only && order.notional > available {
        return OrderDecision::ExceedsAvailable {
            available,
            requested: order.notional,
        };
    }
    OrderDecision::Allowed { available }
}
