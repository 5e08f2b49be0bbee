//! Ledger fill row.

use chrono::{DateTime, Utc};
use fight_exposure_core::{ExposureError, FillRecord, NewFill, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A row of `fight_fills`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FillRow {
    pub id: i64,
    pub history_id: String,
    pub order_id: String,
    pub fight_id: String,
    pub user_id: String,
    pub symbol: String,
    pub side: String,
    pub amount: Decimal,
    pub price: Decimal,
    pub fee: Decimal,
    pub pnl: Option<Decimal>,
    pub leverage: Option<i32>,
    pub executed_at: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
}

impl TryFrom<FillRow> for FillRecord {
    type Error = ExposureError;

    fn try_from(row: FillRow) -> Result<Self, Self::Error> {
        let side = Side::parse(&row.side).ok_or_else(|| {
            ExposureError::storage(format!(
                "fill {} has unrecognized side '{}'",
                row.history_id, row.side
            ))
        })?;

        Ok(Self {
            id: row.id,
            fill: NewFill {
                history_id: row.history_id,
                order_id: row.order_id,
                fight_id: row.fight_id,
                user_id: row.user_id,
                symbol: row.symbol,
                side,
                amount: row.amount,
                price: row.price,
                fee: row.fee,
                pnl: row.pnl,
                leverage: row.leverage,
                executed_at: row.executed_at,
            },
            recorded_at: row.recorded_at,
        })
    }
}
