use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

use crate::engine::book::TopOfBook;
use crate::engine::spsc::RingConsumer;
use crate::engine::symbols::SymbolRegistry;
use crate::engine::types::{BookTicker, OrderId, OrderType, Price, Quantity, Side, SymbolId};
use crate::execution::gateway::OrderGateway;
use crate::execution::manager::OrderManager;
use crate::execution::risk::RiskFilter;
use crate::metrics::{EngineMetrics, LatencyHistogram};
use crate::recorder::EngineEvent;

/// Notional the arbitrage simulation starts from, in USDT.
const ARB_NOTIONAL_USDT: f64 = 100.0;
/// Minimum simulated profit, in USDT, before the arbitrage fires.
const ARB_PROFIT_THRESHOLD: f64 = 0.3;
/// Quantity of the first arbitrage leg (BTC).
const ARB_LEG_QTY: Quantity = 0.001;
/// Imbalance past which the buy-pressure signal fires.
const IMBALANCE_THRESHOLD: f64 = 0.8;
/// Fixed quantity of the imbalance order (BTC).
const IMBALANCE_ORDER_QTY: Quantity = 0.01;

/// Single-threaded consumer of the tick-to-trade pipeline.
///
/// Drains the SPSC ring on a dedicated thread, keeps the per-symbol
/// top-of-book, and evaluates two signals per tick:
///
/// - **Triangular arbitrage** over USDT → BTC → ETH → USDT, simulated
///   from the three live books; fires when the round trip clears the
///   profit threshold.
/// - **Order-book imbalance** on the BTCUSDT book: strong resting bid
///   pressure crosses the spread with a small marketable buy.
///
/// Every emission runs the same sequence: risk check (with the touched
/// side's best price as reference) → create in the order manager → hand
/// to the gateway → debit the projected position. Rejections abort the
/// signal, never the loop.
pub struct StrategyEngine {
    ring: RingConsumer<BookTicker>,
    registry: Arc<SymbolRegistry>,
    gateway: Arc<OrderGateway>,
    orders: Arc<OrderManager>,
    risk: RiskFilter,
    metrics: Arc<EngineMetrics>,
    events: Option<crossbeam_channel::Sender<EngineEvent>>,
    books: HashMap<SymbolId, TopOfBook>,
    btc_usdt: SymbolId,
    eth_btc: SymbolId,
    eth_usdt: SymbolId,
    stop: Arc<AtomicBool>,
    latency: LatencyHistogram,
}

impl StrategyEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ring: RingConsumer<BookTicker>,
        registry: Arc<SymbolRegistry>,
        gateway: Arc<OrderGateway>,
        orders: Arc<OrderManager>,
        risk: RiskFilter,
        metrics: Arc<EngineMetrics>,
        events: Option<crossbeam_channel::Sender<EngineEvent>>,
        stop: Arc<AtomicBool>,
    ) -> Self {
        let btc_usdt = registry.get_id("BTCUSDT");
        let eth_btc = registry.get_id("ETHBTC");
        let eth_usdt = registry.get_id("ETHUSDT");

        let mut books = HashMap::new();
        books.insert(btc_usdt, TopOfBook::new());
        books.insert(eth_btc, TopOfBook::new());
        books.insert(eth_usdt, TopOfBook::new());

        Self {
            ring,
            registry,
            gateway,
            orders,
            risk,
            metrics,
            events,
            books,
            btc_usdt,
            eth_btc,
            eth_usdt,
            stop,
            latency: LatencyHistogram::new("tick_to_trade"),
        }
    }

    /// Consumer loop. Spins on the ring, yields to the scheduler when
    /// empty, exits once the stop flag is observed between batches.
    pub fn run(&mut self) {
        info!("strategy engine started");
        loop {
            self.drain();
            if self.stop.load(Ordering::Acquire) {
                // Ticks pushed before the flag flipped are still
                // processed.
                self.drain();
                break;
            }
            // Production would burn the core instead of yielding.
            thread::yield_now();
        }
        self.latency.report();
        info!(position = self.risk.position(), "strategy engine stopped");
    }

    fn drain(&mut self) {
        while let Some(ticker) = self.ring.pop() {
            self.latency.start();
            self.on_tick(&ticker);
            self.latency.stop();
        }
    }

    /// Hot path, run once per ticker.
    fn on_tick(&mut self, ticker: &BookTicker) {
        self.metrics.increment_ticks();

        let symbol_id = self.registry.get_id(&ticker.symbol);
        let Some(book) = self.books.get_mut(&symbol_id) else {
            debug!(symbol = %ticker.symbol, "tick for untracked symbol ignored");
            return;
        };
        book.update(
            ticker.best_bid_price,
            ticker.best_bid_qty,
            ticker.best_ask_price,
            ticker.best_ask_qty,
        );
        if symbol_id == self.btc_usdt {
            self.metrics
                .set_signal_book(ticker.best_bid_price, ticker.best_ask_price);
        }

        self.check_arbitrage();
        if symbol_id == self.btc_usdt {
            self.check_imbalance();
        }
    }

    /// Simulate the USDT → BTC → ETH → USDT round trip off the current
    /// books and fire when it clears the threshold. Inactive markets
    /// (any leg priced at zero) disable the branch for this tick.
    fn check_arbitrage(&mut self) {
        let btc_usdt_ask = self.books[&self.btc_usdt].best_ask_price();
        let eth_btc_ask = self.books[&self.eth_btc].best_ask_price();
        let eth_usdt_bid = self.books[&self.eth_usdt].best_bid_price();

        if btc_usdt_ask <= 0.0 || eth_btc_ask <= 0.0 || eth_usdt_bid <= 0.0 {
            return;
        }

        let btc_amount = ARB_NOTIONAL_USDT / btc_usdt_ask;
        let eth_amount = btc_amount / eth_btc_ask;
        let end_usdt = eth_amount * eth_usdt_bid;
        let profit = end_usdt - ARB_NOTIONAL_USDT;

        if profit > ARB_PROFIT_THRESHOLD {
            info!(profit, btc_usdt_ask, eth_btc_ask, eth_usdt_bid, "arbitrage opportunity");
            self.execute_arbitrage(btc_usdt_ask, eth_btc_ask, eth_usdt_bid);
        }
    }

    fn execute_arbitrage(&mut self, btc_usdt_ask: Price, eth_btc_ask: Price, eth_usdt_bid: Price) {
        debug!(btc_usdt_ask, eth_btc_ask, eth_usdt_bid, "executing arbitrage");
        // Leg 1 only: buy BTC against the ask. Legs 2 and 3 (ETHBTC,
        // ETHUSDT) need per-leg fill tracking before they can be sent.
        self.try_send(
            self.btc_usdt,
            Side::Buy,
            btc_usdt_ask,
            ARB_LEG_QTY,
            btc_usdt_ask,
        );
    }

    /// Order-book imbalance on the signal book:
    /// `(bid_qty - ask_qty) / (bid_qty + ask_qty)`, in [-1, +1].
    fn check_imbalance(&mut self) {
        let book = self.books[&self.btc_usdt];
        let bid_qty = book.best_bid_qty();
        let ask_qty = book.best_ask_qty();
        let total = bid_qty + ask_qty;
        if total <= 0.0 {
            return;
        }

        let imbalance = (bid_qty - ask_qty) / total;
        if imbalance > IMBALANCE_THRESHOLD {
            let price = book.best_ask_price(); // crossing the spread
            info!(imbalance, price, "strong buy pressure on signal book");
            self.try_send(
                self.btc_usdt,
                Side::Buy,
                price,
                IMBALANCE_ORDER_QTY,
                price,
            );
        }
    }

    /// The one emission sequence: risk check, create, send, debit
    /// projected position. Returns the order id on success.
    fn try_send(
        &mut self,
        symbol_id: SymbolId,
        side: Side,
        price: Price,
        quantity: Quantity,
        reference_price: Price,
    ) -> Option<OrderId> {
        if let Err(reason) = self
            .risk
            .check(symbol_id, side, price, quantity, reference_price)
        {
            self.metrics.increment_risk_rejected();
            self.record(EngineEvent::risk_reject(
                &self.registry.get_symbol(symbol_id),
                side,
                price,
                quantity,
                reason,
            ));
            return None;
        }

        let order_id = match self.orders.create(symbol_id, side, price, quantity) {
            Ok(id) => id,
            Err(err) => {
                warn!(%err, "send aborted");
                self.metrics.increment_pool_exhausted();
                return None;
            }
        };

        let symbol = self.registry.get_symbol(symbol_id);
        self.gateway
            .send_order(&symbol, side, price, quantity, OrderType::Market, order_id);
        self.risk.update_position(side, quantity);
        self.metrics.increment_orders_sent();
        self.record(EngineEvent::order_created(
            order_id, &symbol, side, price, quantity,
        ));
        Some(order_id)
    }

    fn record(&self, event: EngineEvent) {
        if let Some(events) = &self.events {
            let _ = events.try_send(event);
        }
    }

    /// Projected position after all accepted sends.
    pub fn position(&self) -> f64 {
        self.risk.position()
    }

    /// Samples recorded around the hot path so far.
    pub fn latency_samples(&self) -> u64 {
        self.latency.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::spsc::ring;
    use crate::execution::risk::RiskLimits;
    use crossbeam_channel::unbounded;
    use std::time::{Duration, Instant};

    struct Harness {
        engine: StrategyEngine,
        reports: crossbeam_channel::Receiver<crate::engine::types::ExecutionReport>,
        orders: Arc<OrderManager>,
    }

    fn harness() -> Harness {
        let (_tx, rx) = ring::<BookTicker>(64);
        let registry = Arc::new(SymbolRegistry::new());
        let (report_tx, report_rx) = unbounded();
        let gateway = Arc::new(OrderGateway::new(report_tx));
        let orders = Arc::new(OrderManager::with_capacity(64));
        let risk = RiskFilter::new(RiskLimits::default());
        let metrics = Arc::new(EngineMetrics::new());
        let stop = Arc::new(AtomicBool::new(false));

        let engine = StrategyEngine::new(
            rx,
            registry,
            gateway,
            Arc::clone(&orders),
            risk,
            metrics,
            None,
            stop,
        );
        Harness {
            engine,
            reports: report_rx,
            orders,
        }
    }

    fn tick(symbol: &str, bid: f64, bid_qty: f64, ask: f64, ask_qty: f64) -> BookTicker {
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
    fn test_arbitrage_triggers_single_leg_order() {
        let mut h = harness();
        // Populate the ETH legs first; BTC ask is still zero so the
        // arbitrage branch stays quiet.
        h.engine.on_tick(&tick("ETHBTC", 0.049, 1.0, 0.05, 1.0));
        h.engine.on_tick(&tick("ETHUSDT", 2_600.0, 1.0, 2_601.0, 1.0));
        assert_eq!(h.orders.tracked_orders(), 0);

        // (100 / 50_000) / 0.05 * 2_600 = 104.0 → profit 4.0 > 0.3.
        h.engine
            .on_tick(&tick("BTCUSDT", 49_990.0, 1.0, 50_000.0, 1.0));

        assert_eq!(h.orders.tracked_orders(), 1);
        let order = h.orders.get(1).expect("leg-1 order created");
        assert_eq!(order.side, Side::Buy);
        assert_eq!(order.price, 50_000.0);
        assert_eq!(order.quantity, ARB_LEG_QTY);
        assert!((h.engine.position() - ARB_LEG_QTY).abs() < 1e-12);

        // The gateway saw exactly this order.
        let report = h.reports.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(report.order_id, 1);
        assert_eq!(report.cum_qty, ARB_LEG_QTY);
    }

    #[test]
    fn test_arbitrage_below_threshold_stays_flat() {
        let mut h = harness();
        h.engine.on_tick(&tick("ETHBTC", 0.049, 1.0, 0.05, 1.0));
        // 2_500 closes the loop at exactly 100.0: zero profit.
        h.engine.on_tick(&tick("ETHUSDT", 2_500.0, 1.0, 2_501.0, 1.0));
        h.engine
            .on_tick(&tick("BTCUSDT", 49_990.0, 1.0, 50_000.0, 1.0));

        assert_eq!(h.orders.tracked_orders(), 0);
        assert_eq!(h.engine.position(), 0.0);
        assert!(h
            .reports
            .recv_timeout(Duration::from_millis(100))
            .is_err());
    }

    #[test]
    fn test_imbalance_boundary() {
        let mut h = harness();
        // 9 vs 1 is exactly 0.8: not strictly greater, no send.
        h.engine
            .on_tick(&tick("BTCUSDT", 49_990.0, 9.0, 50_000.0, 1.0));
        assert_eq!(h.orders.tracked_orders(), 0);

        // 10 vs 1 ≈ 0.818: fires a marketable buy at the ask.
        h.engine
            .on_tick(&tick("BTCUSDT", 49_990.0, 10.0, 50_000.0, 1.0));
        assert_eq!(h.orders.tracked_orders(), 1);
        let order = h.orders.get(1).unwrap();
        assert_eq!(order.quantity, IMBALANCE_ORDER_QTY);
        assert_eq!(order.price, 50_000.0);
        assert_eq!(order.side, Side::Buy);
    }

    #[test]
    fn test_unknown_symbol_ignored() {
        let mut h = harness();
        h.engine
            .on_tick(&tick("DOGEUSDT", 0.1, 100.0, 0.11, 100.0));
        assert_eq!(h.orders.tracked_orders(), 0);
    }

    #[test]
    fn test_zero_quantities_disable_imbalance() {
        let mut h = harness();
        h.engine
            .on_tick(&tick("BTCUSDT", 49_990.0, 0.0, 50_000.0, 0.0));
        assert_eq!(h.orders.tracked_orders(), 0);
    }

    #[test]
    fn test_run_drains_ring_and_stops() {
        let (mut tx, rx) = ring::<BookTicker>(64);
        let registry = Arc::new(SymbolRegistry::new());
        let (report_tx, _report_rx) = unbounded();
        let gateway = Arc::new(OrderGateway::new(report_tx));
        let orders = Arc::new(OrderManager::with_capacity(64));
        let risk = RiskFilter::new(RiskLimits::default());
        let metrics = Arc::new(EngineMetrics::new());
        let stop = Arc::new(AtomicBool::new(false));

        let mut engine = StrategyEngine::new(
            rx,
            Arc::clone(&registry),
            gateway,
            orders,
            risk,
            Arc::clone(&metrics),
            None,
            Arc::clone(&stop),
        );
        let consumer = thread::spawn(move || {
            engine.run();
            engine
        });

        for i in 0..10 {
            let mut t = tick("BTCUSDT", 49_990.0, 1.0, 50_000.0, 1.0);
            t.update_id = i;
            while tx.push(t.clone()).is_err() {
                thread::yield_now();
            }
        }

        let deadline = Instant::now() + Duration::from_secs(2);
        while metrics.ticks() < 10 {
            assert!(Instant::now() < deadline, "consumer never drained the ring");
            thread::yield_now();
        }

        stop.store(true, Ordering::Release);
        let engine = consumer.join().unwrap();
        assert_eq!(engine.latency_samples(), 10);
    }
}
