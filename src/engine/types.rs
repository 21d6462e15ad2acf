use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonic order identifier, assigned by the order manager starting at 1.
pub type OrderId = i64;

/// Compact integer id for an interned symbol string.
///
/// Integer comparisons on the hot path beat string comparisons; ids are
/// assigned in first-seen order and stay stable for the process lifetime.
pub type SymbolId = u32;

pub type Price = f64;
pub type Quantity = f64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// +1 for Buy, -1 for Sell; used when projecting position.
    pub fn sign(&self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    ImmediateOrCancel,
    FillOrKill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderState {
    PendingNew,
    New,
    Filled,
    Canceled,
    Rejected,
}

impl OrderState {
    /// Terminal states absorb all further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderState::Filled | OrderState::Canceled | OrderState::Rejected
        )
    }
}

/// Execution-report event kind, FIX-style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecType {
    New,
    PartialFill,
    Fill,
    Canceled,
    Rejected,
    PendingCancel,
    PendingNew,
}

/// One top-of-book snapshot as delivered by the feed.
///
/// The symbol travels as wire text; the consumer resolves it to a
/// [`SymbolId`] on arrival. Value-typed: copied through the ring and
/// consumed exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookTicker {
    pub symbol: String,
    pub best_bid_price: Price,
    pub best_bid_qty: Quantity,
    pub best_ask_price: Price,
    pub best_ask_qty: Quantity,
    pub update_id: i64,
}

/// Tracked trade intent. Storage is owned by the order pool; the order
/// manager indexes live orders by `order_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub symbol_id: SymbolId,
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
    pub filled_quantity: Quantity,
    pub state: OrderState,
}

impl Order {
    pub fn new(order_id: OrderId, symbol_id: SymbolId, side: Side, price: Price, quantity: Quantity) -> Self {
        Self {
            order_id,
            symbol_id,
            side,
            price,
            quantity,
            filled_quantity: 0.0,
            state: OrderState::PendingNew,
        }
    }

    pub fn remaining_quantity(&self) -> Quantity {
        (self.quantity - self.filled_quantity).max(0.0)
    }
}

/// Asynchronous order-lifecycle event delivered by the gateway.
///
/// `cum_qty` is monotonically non-decreasing per order on arrival; the
/// order manager applies reports in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub order_id: OrderId,
    pub exec_type: ExecType,
    pub order_state: OrderState,
    pub last_qty: Quantity,
    pub last_price: Price,
    pub leaves_qty: Quantity,
    pub cum_qty: Quantity,
    pub avg_price: Price,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_display_and_sign() {
        assert_eq!(Side::Buy.to_string(), "BUY");
        assert_eq!(Side::Sell.to_string(), "SELL");
        assert_eq!(Side::Buy.sign(), 1.0);
        assert_eq!(Side::Sell.sign(), -1.0);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!OrderState::PendingNew.is_terminal());
        assert!(!OrderState::New.is_terminal());
        assert!(OrderState::Filled.is_terminal());
        assert!(OrderState::Canceled.is_terminal());
        assert!(OrderState::Rejected.is_terminal());
    }

    #[test]
    fn test_new_order() {
        let order = Order::new(1, 0, Side::Buy, 50_000.0, 0.5);
        assert_eq!(order.state, OrderState::PendingNew);
        assert_eq!(order.filled_quantity, 0.0);
        assert_eq!(order.remaining_quantity(), 0.5);
    }
}
