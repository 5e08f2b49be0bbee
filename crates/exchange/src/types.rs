//! Wire types for the exchange REST API.

use fight_exposure_core::{normalize_symbol, LivePosition, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::str::FromStr;

/// Response envelope shared by every endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Position entry as returned by `GET /api/v1/positions`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawPosition {
    pub symbol: String,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(deserialize_with = "decimal_from_str_or_number")]
    pub amount: Decimal,
    #[serde(deserialize_with = "decimal_from_str_or_number")]
    pub entry_price: Decimal,
}

impl From<RawPosition> for LivePosition {
    fn from(raw: RawPosition) -> Self {
        Self {
            symbol: normalize_symbol(&raw.symbol),
            side: raw.side.as_deref().and_then(Side::parse),
            amount: raw.amount,
            entry_price: raw.entry_price,
        }
    }
}

/// Numeric fields arrive either as JSON strings or JSON numbers.
fn decimal_from_str_or_number<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        other => {
            return Err(serde::de::Error::custom(format!(
                "expected decimal string or number, got {other}"
            )))
        }
    };

    let trimmed = raw.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|e| serde::de::Error::custom(format!("invalid decimal '{trimmed}': {e}")))
}
