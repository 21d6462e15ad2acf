use crate::engine::types::{Price, Quantity};

/// Top-of-book state for one symbol. No depth is retained.
///
/// Updated in place by the strategy thread; all four fields are replaced
/// together from a single ticker. A populated book normally satisfies
/// `best_bid_price < best_ask_price`, but stale snapshots may
/// momentarily cross and callers must tolerate that.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TopOfBook {
    best_bid_price: Price,
    best_bid_qty: Quantity,
    best_ask_price: Price,
    best_ask_qty: Quantity,
}

impl TopOfBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(
        &mut self,
        best_bid_price: Price,
        best_bid_qty: Quantity,
        best_ask_price: Price,
        best_ask_qty: Quantity,
    ) {
        self.best_bid_price = best_bid_price;
        self.best_bid_qty = best_bid_qty;
        self.best_ask_price = best_ask_price;
        self.best_ask_qty = best_ask_qty;
    }

    pub fn best_bid_price(&self) -> Price {
        self.best_bid_price
    }

    pub fn best_bid_qty(&self) -> Quantity {
        self.best_bid_qty
    }

    pub fn best_ask_price(&self) -> Price {
        self.best_ask_price
    }

    pub fn best_ask_qty(&self) -> Quantity {
        self.best_ask_qty
    }

    /// Midpoint of the spread, or 0 while either side is absent.
    pub fn mid_price(&self) -> Price {
        if self.best_bid_price == 0.0 || self.best_ask_price == 0.0 {
            return 0.0;
        }
        (self.best_bid_price + self.best_ask_price) / 2.0
    }
}
