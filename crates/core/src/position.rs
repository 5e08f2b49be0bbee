use crate::exposure::NettingPolicy;
use crate::types::{FillRecord, NewFill, Side};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Net position and gross traded notional for one symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolPosition {
    pub symbol: String,
    /// Signed quantity (long positive).
    pub quantity: Decimal,
    /// Average entry price of the open quantity.
    pub avg_price: Decimal,
    /// Sum of `amount * price` over every fill, never reduced.
    pub gross_notional: Decimal,
}

impl SymbolPosition {
    #[allow(clippy::missing_const_for_fn)] // String cannot be used in const fn
    fn new(symbol: String) -> Self {
        Self {
            symbol,
            ..Self::default()
        }
    }

    /// Open notional at average entry: `|quantity| * avg_price`.
    #[must_use]
    pub fn open_notional(&self) -> Decimal {
        self.quantity.abs() * self.avg_price
    }

    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.quantity == Decimal::ZERO
    }

    fn apply(&mut self, side: Side, amount: Decimal, price: Decimal) {
        if amount <= Decimal::ZERO {
            return;
        }
        self.gross_notional += amount * price;

        let sign = side.sign();
        let same_direction = self.quantity == Decimal::ZERO
            || (self.quantity > Decimal::ZERO) == (sign > Decimal::ZERO);

        if same_direction {
            // Opening or adding: weighted average entry
            let total_cost = self.avg_price * self.quantity.abs() + price * amount;
            self.quantity += sign * amount;
            self.avg_price = total_cost / self.quantity.abs();
            return;
        }

        // Reducing, possibly crossing through zero
        let close_quantity = amount.min(self.quantity.abs());
        self.quantity += sign * close_quantity;

        let remainder = amount - close_quantity;
        if self.quantity == Decimal::ZERO {
            if remainder > Decimal::ZERO {
                self.quantity = sign * remainder;
                self.avg_price = price;
            } else {
                self.avg_price = Decimal::ZERO;
            }
        }
    }
}

/// Running per-symbol positions for one participant, folded from ledger fills.
#[derive(Debug, Clone, Default)]
pub struct PositionBook {
    positions: HashMap<String, SymbolPosition>,
    fills_applied: u64,
}

impl PositionBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a book from the full fill history in execution order.
    #[must_use]
    pub fn from_fills(fills: &[FillRecord]) -> Self {
        let mut ordered: Vec<&FillRecord> = fills.iter().collect();
        ordered.sort_by(|a, b| {
            a.fill
                .executed_at
                .cmp(&b.fill.executed_at)
                .then(a.id.cmp(&b.id))
        });

        let mut book = Self::new();
        for record in ordered {
            book.apply_fill(&record.fill);
        }
        book
    }

    /// Folds one fill into the book.
    pub fn apply_fill(&mut self, fill: &NewFill) {
        self.positions
            .entry(fill.symbol.clone())
            .or_insert_with(|| SymbolPosition::new(fill.symbol.clone()))
            .apply(fill.side, fill.amount, fill.price);
        self.fills_applied += 1;
    }

    /// Current exposure under `policy`, summed across symbols.
    #[must_use]
    pub fn exposure(&self, policy: NettingPolicy) -> Decimal {
        self.positions
            .values()
            .map(|p| match policy {
                NettingPolicy::SignedNet => p.open_notional(),
                NettingPolicy::GrossNotional => p.gross_notional,
            })
            .sum()
    }

    #[must_use]
    pub fn get_position(&self, symbol: &str) -> Option<&SymbolPosition> {
        self.positions.get(symbol)
    }

    #[must_use]
    pub const fn all_positions(&self) -> &HashMap<String, SymbolPosition> {
        &self.positions
    }

    #[must_use]
    pub const fn fills_applied(&self) -> u64 {
        self.fills_applied
    }
}
