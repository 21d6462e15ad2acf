use serde::Serialize;
use std::env;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::warn;

use crate::engine::types::{Price, Quantity, Side, SymbolId};

/// Closed set of pre-trade rejection reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum RiskReason {
    #[error("order size exceeds limit")]
    OrderSizeExceeded,
    #[error("projected position exceeds limit")]
    ProjectedPositionExceeded,
    #[error("price outside band")]
    PriceBandExceeded,
    #[error("order rate exceeds limit")]
    RateLimitExceeded,
}

/// Pre-trade limits. Environment variables override the defaults:
/// `MAX_ORDER_SIZE`, `MAX_POSITION`, `MAX_PRICE_DEVIATION`,
/// `MAX_ORDER_RATE`.
#[derive(Debug, Clone)]
pub struct RiskLimits {
    pub max_order_size: Quantity,
    pub max_position: Quantity,
    pub max_price_deviation: f64,
    pub max_order_rate: u32,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_order_size: 10.0,
            max_position: 100.0,
            max_price_deviation: 0.05,
            max_order_rate: 10,
        }
    }
}

impl RiskLimits {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_order_size: env_or("MAX_ORDER_SIZE", defaults.max_order_size),
            max_position: env_or("MAX_POSITION", defaults.max_position),
            max_price_deviation: env_or("MAX_PRICE_DEVIATION", defaults.max_price_deviation),
            max_order_rate: env_or("MAX_ORDER_RATE", defaults.max_order_rate),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

const RATE_WINDOW: Duration = Duration::from_secs(1);

/// Four-check pre-trade gate. Checks run in order and the first failure
/// short-circuits:
///
/// 1. fat-finger (order size),
/// 2. projected position,
/// 3. price band against a reference price (skipped when the reference
///    is zero/unknown),
/// 4. fixed one-second rate window.
///
/// The rate window is measured on the monotonic clock; the system clock
/// must not be used here or NTP steps would poison the window.
///
/// `update_position` is the only position mutator and is called by the
/// strategy after a send is authorized (conservative pre-fill debit).
/// Single-writer: the strategy thread owns the filter.
#[derive(Debug)]
pub struct RiskFilter {
    limits: RiskLimits,
    position: f64,
    window_start: Instant,
    orders_in_window: u32,
}

impl RiskFilter {
    pub fn new(limits: RiskLimits) -> Self {
        Self {
            limits,
            position: 0.0,
            window_start: Instant::now(),
            orders_in_window: 0,
        }
    }

    /// Decide whether an order is safe to send. Accepting consumes one
    /// slot of the rate window; rejecting has no side effects.
    pub fn check(
        &mut self,
        symbol_id: SymbolId,
        side: Side,
        price: Price,
        quantity: Quantity,
        reference_market_price: Price,
    ) -> Result<(), RiskReason> {
        self.check_at(
            symbol_id,
            side,
            price,
            quantity,
            reference_market_price,
            Instant::now(),
        )
    }

    fn check_at(
        &mut self,
        symbol_id: SymbolId,
        side: Side,
        price: Price,
        quantity: Quantity,
        reference_market_price: Price,
        now: Instant,
    ) -> Result<(), RiskReason> {
        if quantity > self.limits.max_order_size {
            return self.reject(symbol_id, RiskReason::OrderSizeExceeded);
        }

        let projected = self.position + side.sign() * quantity;
        if projected.abs() > self.limits.max_position {
            return self.reject(symbol_id, RiskReason::ProjectedPositionExceeded);
        }

        if reference_market_price > 0.0 {
            let deviation = (price - reference_market_price).abs() / reference_market_price;
            if deviation > self.limits.max_price_deviation {
                return self.reject(symbol_id, RiskReason::PriceBandExceeded);
            }
        }

        if now.duration_since(self.window_start) >= RATE_WINDOW {
            self.window_start = now;
            self.orders_in_window = 0;
        }
        if self.orders_in_window >= self.limits.max_order_rate {
            return self.reject(symbol_id, RiskReason::RateLimitExceeded);
        }
        self.orders_in_window += 1;
        Ok(())
    }

    fn reject(&self, symbol_id: SymbolId, reason: RiskReason) -> Result<(), RiskReason> {
        warn!(symbol_id, %reason, "pre-trade risk reject");
        Err(reason)
    }

    /// Debit the tracked position for an authorized send.
    pub fn update_position(&mut self, side: Side, quantity: Quantity) {
        self.position += side.sign() * quantity;
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }
}
