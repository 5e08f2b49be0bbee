//! Domain types shared by the ledger, the reconciler and the HTTP boundary.
//!
//! All money and quantity values use `rust_decimal::Decimal`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Fight
// =============================================================================

/// Lifecycle status of a fight. Owned by the fight lifecycle service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FightStatus {
    Waiting,
    Live,
    Finished,
    Cancelled,
    NoContest,
}

impl FightStatus {
    /// Returns the string representation used in storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::Live => "LIVE",
            Self::Finished => "FINISHED",
            Self::Cancelled => "CANCELLED",
            Self::NoContest => "NO_CONTEST",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "WAITING" => Some(Self::Waiting),
            "LIVE" => Some(Self::Live),
            "FINISHED" => Some(Self::Finished),
            "CANCELLED" => Some(Self::Cancelled),
            "NO_CONTEST" => Some(Self::NoContest),
            _ => None,
        }
    }

    /// Returns true once the fight can no longer change state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled | Self::NoContest)
    }
}

impl fmt::Display for FightStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A time-boxed head-to-head trading competition with a fixed stake ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fight {
    pub id: String,
    /// Maximum notional each participant may commit during the fight.
    pub stake: Decimal,
    pub status: FightStatus,
    pub duration_minutes: i32,
    pub winner_id: Option<String>,
    pub is_draw: bool,
    pub started_at: Option<DateTime<Utc>>,
}

impl Fight {
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.status == FightStatus::Live
    }
}

/// Participant-scoped state the exposure engine owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FightParticipant {
    pub fight_id: String,
    pub user_id: String,
    /// Highest exposure ever observed. Never decreases.
    pub max_exposure_used: Decimal,
    /// Symbols held before the fight started. Sorted, upper-case.
    pub blocked_symbols: Vec<String>,
    /// Set once blocked symbols have been computed at fight start.
    pub blocked_symbols_initialized: bool,
}

impl FightParticipant {
    /// Creates a participant with a zero watermark and no blocked symbols.
    #[must_use]
    pub fn new(fight_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            fight_id: fight_id.into(),
            user_id: user_id.into(),
            max_exposure_used: Decimal::ZERO,
            blocked_symbols: Vec::new(),
            blocked_symbols_initialized: false,
        }
    }

    #[must_use]
    pub fn key(&self) -> ParticipantKey {
        ParticipantKey::new(&self.fight_id, &self.user_id)
    }

    /// Returns true if `symbol` may not be traded during this fight.
    #[must_use]
    pub fn is_blocked(&self, symbol: &str) -> bool {
        let symbol = normalize_symbol(symbol);
        self.blocked_symbols.iter().any(|s| *s == symbol)
    }
}

/// A platform user and the exchange account they trade with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub account: String,
}

/// Identifies one (fight, user) pair. All engine state is scoped to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantKey {
    pub fight_id: String,
    pub user_id: String,
}

impl ParticipantKey {
    #[must_use]
    pub fn new(fight_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            fight_id: fight_id.into(),
            user_id: user_id.into(),
        }
    }
}

impl fmt::Display for ParticipantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.fight_id, self.user_id)
    }
}

// =============================================================================
// Fills
// =============================================================================

/// Side of an execution. Accepts exchange spellings (`bid`/`ask`, `long`/`short`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[serde(alias = "bid", alias = "long", alias = "BUY", alias = "Buy")]
    Buy,
    #[serde(alias = "ask", alias = "short", alias = "SELL", alias = "Sell")]
    Sell,
}

impl Side {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }

    /// Parses from string representation, including exchange aliases.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "buy" | "bid" | "long" => Some(Self::Buy),
            "sell" | "ask" | "short" => Some(Self::Sell),
            _ => None,
        }
    }

    /// +1 for buys, -1 for sells.
    #[must_use]
    pub const fn sign(&self) -> Decimal {
        match self {
            Self::Buy => Decimal::ONE,
            Self::Sell => Decimal::NEGATIVE_ONE,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated fill ready to be appended to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFill {
    /// Exchange execution identifier. Unique across the ledger.
    pub history_id: String,
    pub order_id: String,
    pub fight_id: String,
    pub user_id: String,
    pub symbol: String,
    pub side: Side,
    /// Unsigned executed quantity; direction comes from `side`.
    pub amount: Decimal,
    pub price: Decimal,
    pub fee: Decimal,
    pub pnl: Option<Decimal>,
    pub leverage: Option<i32>,
    pub executed_at: DateTime<Utc>,
}

impl NewFill {
    /// Quantity signed by side (buys positive).
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        self.side.sign() * self.amount
    }

    #[must_use]
    pub fn notional(&self) -> Decimal {
        self.amount * self.price
    }

    #[must_use]
    pub fn key(&self) -> ParticipantKey {
        ParticipantKey::new(&self.fight_id, &self.user_id)
    }
}

/// A fill as stored in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillRecord {
    pub id: i64,
    #[serde(flatten)]
    pub fill: NewFill,
    pub recorded_at: DateTime<Utc>,
}

impl FillRecord {
    /// True when `other` describes the same execution for the same participant.
    #[must_use]
    pub fn matches(&self, other: &NewFill) -> bool {
        self.fill.history_id == other.history_id
            && self.fill.fight_id == other.fight_id
            && self.fill.user_id == other.user_id
            && self.fill.symbol == other.symbol
    }
}

/// Result of an idempotent ledger insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new row was appended.
    Inserted(FillRecord),
    /// A row with the same execution id already existed; nothing was written.
    AlreadyExists(FillRecord),
}

impl InsertOutcome {
    #[must_use]
    pub const fn record(&self) -> &FillRecord {
        match self {
            Self::Inserted(r) | Self::AlreadyExists(r) => r,
        }
    }

    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}

/// An order placement attempt, logged by the order path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAction {
    pub fight_id: String,
    pub user_id: String,
    pub symbol: String,
    /// e.g. "market", "limit", "stop", "cancel".
    pub action_type: String,
    pub success: bool,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Exchange
// =============================================================================

/// A live position as reported by the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LivePosition {
    pub symbol: String,
    pub side: Option<Side>,
    pub amount: Decimal,
    pub entry_price: Decimal,
}

impl LivePosition {
    /// Open notional at entry: `|amount| * entry_price`.
    #[must_use]
    pub fn notional(&self) -> Decimal {
        self.amount.abs() * self.entry_price
    }
}

// =============================================================================
// Engine outputs
// =============================================================================

/// Outcome of a watermark refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatermarkRefresh {
    pub ledger_exposure: Decimal,
    pub live_exposure: Decimal,
    /// `max(ledger_exposure, live_exposure)`.
    pub current_exposure: Decimal,
    /// Stored watermark after the refresh.
    pub max_exposure_used: Decimal,
    /// True if this refresh raised the stored watermark.
    pub updated: bool,
    /// True if the raise could not be persisted and is queued for retry.
    /// `max_exposure_used` then reports the effective value.
    pub pending: bool,
}

/// Exposure snapshot returned to callers and UI polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeInfo {
    pub in_fight: bool,
    pub fight_id: Option<String>,
    pub stake: Option<Decimal>,
    pub current_exposure: Option<Decimal>,
    pub max_exposure_used: Option<Decimal>,
    pub available: Option<Decimal>,
    pub blocked_symbols: Vec<String>,
}

impl StakeInfo {
    /// Snapshot for an account with no LIVE fight participation.
    #[must_use]
    pub const fn not_in_fight() -> Self {
        Self {
            in_fight: false,
            fight_id: None,
            stake: None,
            current_exposure: None,
            max_exposure_used: None,
            available: None,
            blocked_symbols: Vec::new(),
        }
    }
}

/// Upper-cases and trims a trading symbol.
#[must_use]
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_fill(side: Side) -> NewFill {
        NewFill {
            history_id: "h-1".to_string(),
            order_id: "o-1".to_string(),
            fight_id: "fight-1".to_string(),
            user_id: "user-1".to_string(),
            symbol: "BTC".to_string(),
            side,
            amount: dec!(0.5),
            price: dec!(60000),
            fee: dec!(1.5),
            pnl: None,
            leverage: Some(5),
            executed_at: Utc::now(),
        }
    }

    #[test]
    fn test_fight_status_round_trip() {
        for status in [
            FightStatus::Waiting,
            FightStatus::Live,
            FightStatus::Finished,
            FightStatus::Cancelled,
            FightStatus::NoContest,
        ] {
            assert_eq!(FightStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(FightStatus::parse("live"), Some(FightStatus::Live));
        assert_eq!(FightStatus::parse("paused"), None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!FightStatus::Waiting.is_terminal());
        assert!(!FightStatus::Live.is_terminal());
        assert!(FightStatus::Finished.is_terminal());
        assert!(FightStatus::NoContest.is_terminal());
    }

    #[test]
    fn test_side_aliases() {
        assert_eq!(Side::parse("bid"), Some(Side::Buy));
        assert_eq!(Side::parse("ASK"), Some(Side::Sell));
        assert_eq!(Side::parse("long"), Some(Side::Buy));
        assert_eq!(Side::parse("flat"), None);

        let side: Side = serde_json::from_str("\"ask\"").unwrap();
        assert_eq!(side, Side::Sell);
    }

    #[test]
    fn test_signed_amount_and_notional() {
        let buy = sample_fill(Side::Buy);
        let sell = sample_fill(Side::Sell);

        assert_eq!(buy.signed_amount(), dec!(0.5));
        assert_eq!(sell.signed_amount(), dec!(-0.5));
        assert_eq!(buy.notional(), dec!(30000));
    }

    #[test]
    fn test_fill_record_matches_same_execution_only() {
        let fill = sample_fill(Side::Buy);
        let record = FillRecord {
            id: 1,
            fill: fill.clone(),
            recorded_at: Utc::now(),
        };

        assert!(record.matches(&fill));

        let mut other_user = fill;
        other_user.user_id = "user-2".to_string();
        assert!(!record.matches(&other_user));
    }

    #[test]
    fn test_participant_blocked_symbols_case_insensitive() {
        let mut participant = FightParticipant::new("fight-1", "user-1");
        participant.blocked_symbols = vec!["ETH".to_string()];

        assert!(participant.is_blocked("eth"));
        assert!(participant.is_blocked(" ETH "));
        assert!(!participant.is_blocked("BTC"));
    }

    #[test]
    fn test_live_position_notional_uses_abs_amount() {
        let short = LivePosition {
            symbol: "SOL".to_string(),
            side: Some(Side::Sell),
            amount: dec!(-10),
            entry_price: dec!(150),
        };
        assert_eq!(short.notional(), dec!(1500));
    }

    #[test]
    fn test_not_in_fight_serializes_nulls() {
        let json = serde_json::to_value(StakeInfo::not_in_fight()).unwrap();
        assert_eq!(json["inFight"], false);
        assert!(json["stake"].is_null());
        assert!(json["currentExposure"].is_null());
        assert!(json["available"].is_null());
    }
}
