use metrics::{counter, describe_counter, describe_gauge, gauge};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::info;

pub mod histogram;

pub use histogram::{HistogramStats, LatencyHistogram};

/// Register metric descriptions with the installed recorder. Call once
/// at startup.
pub fn describe_metrics() {
    describe_counter!("engine_ticks_total", "Book tickers consumed by the strategy");
    describe_counter!(
        "engine_ring_dropped_total",
        "Tickers dropped because the market-data ring was full"
    );
    describe_counter!("engine_orders_sent_total", "Orders handed to the gateway");
    describe_counter!(
        "engine_risk_rejects_total",
        "Signals rejected by the pre-trade risk filter"
    );
    describe_counter!(
        "engine_reports_applied_total",
        "Execution reports applied to the order manager"
    );
    describe_counter!(
        "engine_reports_unknown_total",
        "Execution reports referencing an untracked order id"
    );
    describe_counter!(
        "engine_pool_exhausted_total",
        "Order creations aborted because the pool was empty"
    );
    describe_gauge!("engine_best_bid", "Best bid on the signal book");
    describe_gauge!("engine_best_ask", "Best ask on the signal book");
}

/// Pipeline counters, mirrored into the `metrics` facade so the
/// Prometheus exporter sees them while the reporter thread can read the
/// raw atomics without touching the recorder.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    ticks: AtomicU64,
    ring_dropped: AtomicU64,
    orders_sent: AtomicU64,
    risk_rejected: AtomicU64,
    pool_exhausted: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_ticks(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        counter!("engine_ticks_total").increment(1);
    }

    pub fn increment_ring_dropped(&self) {
        self.ring_dropped.fetch_add(1, Ordering::Relaxed);
        counter!("engine_ring_dropped_total").increment(1);
    }

    pub fn increment_risk_rejected(&self) {
        self.risk_rejected.fetch_add(1, Ordering::Relaxed);
        counter!("engine_risk_rejects_total").increment(1);
    }

    pub fn increment_orders_sent(&self) {
        self.orders_sent.fetch_add(1, Ordering::Relaxed);
        // engine_orders_sent_total is incremented by the gateway itself.
    }

    pub fn increment_pool_exhausted(&self) {
        self.pool_exhausted.fetch_add(1, Ordering::Relaxed);
        counter!("engine_pool_exhausted_total").increment(1);
    }

    pub fn set_signal_book(&self, best_bid: f64, best_ask: f64) {
        gauge!("engine_best_bid").set(best_bid);
        gauge!("engine_best_ask").set(best_ask);
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn ring_dropped(&self) -> u64 {
        self.ring_dropped.load(Ordering::Relaxed)
    }

    pub fn orders_sent(&self) -> u64 {
        self.orders_sent.load(Ordering::Relaxed)
    }

    pub fn risk_rejected(&self) -> u64 {
        self.risk_rejected.load(Ordering::Relaxed)
    }

    pub fn pool_exhausted(&self) -> u64 {
        self.pool_exhausted.load(Ordering::Relaxed)
    }
}

/// Background reporter: logs a one-line pipeline summary on a fixed
/// interval until the stop flag flips.
pub struct MetricsReporter {
    metrics: Arc<EngineMetrics>,
    interval: Duration,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<EngineMetrics>, interval: Duration) -> Self {
        Self { metrics, interval }
    }

    pub fn spawn(self, stop: Arc<AtomicBool>) -> JoinHandle<()> {
        thread::Builder::new()
            .name("metrics".to_string())
            .spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    thread::sleep(self.interval);
                    info!(
                        ticks = self.metrics.ticks(),
                        dropped = self.metrics.ring_dropped(),
                        orders = self.metrics.orders_sent(),
                        risk_rejects = self.metrics.risk_rejected(),
                        pool_exhausted = self.metrics.pool_exhausted(),
                        "pipeline summary"
                    );
                }
            })
            .expect("failed to spawn metrics reporter")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = EngineMetrics::new();
        metrics.increment_ticks();
        metrics.increment_ticks();
        metrics.increment_ring_dropped();
        metrics.increment_orders_sent();
        metrics.increment_risk_rejected();
        metrics.increment_pool_exhausted();

        assert_eq!(metrics.ticks(), 2);
        assert_eq!(metrics.ring_dropped(), 1);
        assert_eq!(metrics.orders_sent(), 1);
        assert_eq!(metrics.risk_rejected(), 1);
        assert_eq!(metrics.pool_exhausted(), 1);
    }

    #[test]
    fn test_reporter_stops_on_flag() {
        let metrics = Arc::new(EngineMetrics::new());
        let stop = Arc::new(AtomicBool::new(false));
        let handle =
            MetricsReporter::new(metrics, Duration::from_millis(5)).spawn(Arc::clone(&stop));
        stop.store(true, Ordering::Relaxed);
        handle.join().unwrap();
    }
}
