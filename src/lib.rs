//! Low-Latency Crypto Execution Engine
//!
//! A tick-to-trade pipeline for algorithmic trading against a crypto
//! exchange: a live book-ticker feed feeds a wait-free SPSC ring, a
//! pinned strategy thread evaluates triangular-arbitrage and order-book
//! imbalance signals, and orders flow through a four-check pre-trade
//! risk gate into an asynchronous gateway that reports fills back
//! through a dispatcher.
//!
//! # Features
//!
//! - **Wait-free handoff**: bounded SPSC ring with cache-line-separated
//!   indices; overflow drops the tick instead of blocking the feed
//! - **Zero-allocation order storage**: pre-allocated pool with a LIFO
//!   free list behind the order manager
//! - **Pre-trade risk**: fat-finger, projected position, price band,
//!   and rate-limit checks, first failure short-circuits
//! - **Asynchronous order lifecycle**: execution reports applied from
//!   any thread, terminal states absorb
//! - **Latency accounting**: fixed-bucket nanosecond histogram around
//!   the hot path
//!
//! # Quick Start
//!
//! ```rust
//! use execution_engine::engine::{ring, BookTicker};
//!
//! let (mut producer, mut consumer) = ring::<BookTicker>(1024);
//!
//! producer.push(BookTicker {
//!     symbol: "BTCUSDT".to_string(),
//!     best_bid_price: 49_990.0,
//!     best_bid_qty: 2.0,
//!     best_ask_price: 50_000.0,
//!     best_ask_qty: 1.0,
//!     update_id: 1,
//! }).ok();
//!
//! let tick = consumer.pop().unwrap();
//! assert_eq!(tick.symbol, "BTCUSDT");
//! ```
//!
//! # Architecture
//!
//! Three thread roles move a tick to a trade:
//!
//! 1. **Producer** — the market-data thread fills a `BookTicker` and
//!    pushes it into the ring; it never blocks
//! 2. **Consumer** — the strategy thread drains the ring, updates the
//!    per-symbol top-of-book, and runs the signal logic
//! 3. **Gateway workers** — one short-lived thread per send simulates
//!    venue latency and emits the execution report into a channel; a
//!    dispatcher thread applies reports to the order manager
//!
//! The order-manager mutex is the only lock in the pipeline.

pub mod config;
pub mod engine;
pub mod execution;
pub mod marketdata;
pub mod metrics;
pub mod recorder;
pub mod utils;

// Re-export commonly used types
pub use engine::{
    ring, BookTicker, EngineError, EngineResult, ObjectPool, Order, OrderId, OrderState,
    StrategyEngine, SymbolRegistry, TopOfBook,
};
pub use execution::{OrderGateway, OrderManager, RiskFilter, RiskLimits, RiskReason};
pub use metrics::{EngineMetrics, LatencyHistogram};

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::engine::types::Side;
    use crate::execution::spawn_report_dispatcher;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    fn ticker(symbol: &str, bid: f64, bid_qty: f64, ask: f64, ask_qty: f64) -> BookTicker {
        BookTicker {
            symbol: symbol.to_string(),
            best_bid_price: bid,
            best_bid_qty: bid_qty,
            best_ask_price: ask,
            best_ask_qty: ask_qty,
            update_id: 0,
        }
    }

    #[test]
    fn test_tick_to_trade_pipeline() {
        let registry = Arc::new(SymbolRegistry::new());
        let (mut producer, consumer_ring) = ring::<BookTicker>(1024);
        let (report_tx, report_rx) = crossbeam_channel::unbounded();
        let gateway = Arc::new(OrderGateway::new(report_tx));
        let orders = Arc::new(OrderManager::with_capacity(1024));
        let dispatcher = spawn_report_dispatcher(report_rx, Arc::clone(&orders), None);
        let metrics = Arc::new(EngineMetrics::new());
        let stop = Arc::new(AtomicBool::new(false));

        let mut engine = StrategyEngine::new(
            consumer_ring,
            Arc::clone(&registry),
            Arc::clone(&gateway),
            Arc::clone(&orders),
            RiskFilter::new(RiskLimits::default()),
            Arc::clone(&metrics),
            None,
            Arc::clone(&stop),
        );
        let consumer = thread::spawn(move || {
            engine.run();
            engine
        });

        // Producer side: a profitable triangle arrives across three
        // symbols.
        for tick in [
            ticker("ETHBTC", 0.049, 1.0, 0.05, 1.0),
            ticker("ETHUSDT", 2_600.0, 1.0, 2_601.0, 1.0),
            ticker("BTCUSDT", 49_990.0, 1.0, 50_000.0, 1.0),
        ] {
            while producer.push(tick.clone()).is_err() {
                thread::yield_now();
            }
        }

        // The leg-1 order must reach Filled via the gateway worker and
        // the report dispatcher.
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            if let Some(order) = orders.get(1) {
                if order.state == OrderState::Filled {
                    assert_eq!(order.side, Side::Buy);
                    assert_eq!(order.filled_quantity, 0.001);
                    break;
                }
            }
            assert!(Instant::now() < deadline, "order never filled");
            thread::sleep(Duration::from_millis(5));
        }

        stop.store(true, Ordering::Release);
        let engine = consumer.join().unwrap();
        assert!((engine.position() - 0.001).abs() < 1e-12);
        assert_eq!(metrics.ticks(), 3);

        assert!(gateway.wait_idle(Duration::from_secs(1)));
        drop(engine);
        drop(gateway);
        dispatcher.join().unwrap();
    }
}
