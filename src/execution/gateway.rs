use crossbeam_channel::{Receiver, Sender};
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::engine::types::{
    ExecType, ExecutionReport, OrderId, OrderState, OrderType, Price, Quantity, Side,
};
use crate::execution::manager::OrderManager;
use crate::recorder::EngineEvent;

/// Simulated matching-engine latency bounds.
const SIM_LATENCY_MS_MIN: u64 = 5;
const SIM_LATENCY_MS_MAX: u64 = 50;

/// Asynchronous order-entry gateway against a simulated venue.
///
/// `send_order` returns immediately; each send runs on its own
/// short-lived worker thread, which sleeps a uniform 5–50 ms to model
/// network plus matching-engine latency and then emits exactly one
/// `Fill` execution report into the report channel. A real venue would
/// emit the sequence PendingNew → New → (PartialFill…) →
/// Fill/Canceled/Rejected on the same channel.
///
/// The gateway knows nothing about the order manager: reports flow
/// through the channel to a dispatcher (see [`spawn_report_dispatcher`])
/// which applies them. Workers cannot be canceled once scheduled;
/// [`wait_idle`](OrderGateway::wait_idle) gives shutdown a bounded wait
/// for the stragglers.
pub struct OrderGateway {
    report_tx: Sender<ExecutionReport>,
    in_flight: Arc<AtomicUsize>,
}

impl OrderGateway {
    pub fn new(report_tx: Sender<ExecutionReport>) -> Self {
        Self {
            report_tx,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Submit a new order. Non-blocking; the execution report arrives
    /// asynchronously on the report channel.
    pub fn send_order(
        &self,
        symbol: &str,
        side: Side,
        price: Price,
        quantity: Quantity,
        order_type: OrderType,
        order_id: OrderId,
    ) {
        debug!(order_id, %symbol, %side, price, quantity, ?order_type, "sending order");
        metrics::counter!("engine_orders_sent_total").increment(1);

        let tx = self.report_tx.clone();
        let in_flight = Arc::clone(&self.in_flight);
        in_flight.fetch_add(1, Ordering::SeqCst);

        thread::spawn(move || {
            let delay = rand::thread_rng().gen_range(SIM_LATENCY_MS_MIN..=SIM_LATENCY_MS_MAX);
            thread::sleep(Duration::from_millis(delay));

            let report = ExecutionReport {
                order_id,
                exec_type: ExecType::Fill,
                order_state: OrderState::Filled,
                last_qty: quantity,
                last_price: price,
                leaves_qty: 0.0,
                cum_qty: quantity,
                avg_price: price,
                text: "simulated fill".to_string(),
            };
            if tx.send(report).is_err() {
                warn!(order_id, "report channel closed, dropping execution report");
            }
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });
    }

    /// Best-effort cancel. The simulated venue fills everything, so this
    /// only logs the request.
    pub fn cancel_order(&self, order_id: OrderId) {
        info!(order_id, "cancel requested");
    }

    /// Worker threads still holding an unsent report.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Wait up to `timeout` for outstanding workers to finish. Returns
    /// whether the gateway went idle in time.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.in_flight() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        true
    }
}

/// Drain execution reports into the order manager on a dedicated
/// thread, mirroring each into the event log when recording is on.
/// Runs until every gateway (sender) is dropped.
pub fn spawn_report_dispatcher(
    report_rx: Receiver<ExecutionReport>,
    manager: Arc<OrderManager>,
    events: Option<Sender<EngineEvent>>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("exec-reports".to_string())
        .spawn(move || {
            for report in report_rx.iter() {
                manager.apply(&report);
                if let Some(events) = &events {
                    let _ = events.try_send(EngineEvent::exec_report(&report));
                }
            }
            debug!("report channel closed, dispatcher stopping");
        })
        .expect("failed to spawn report dispatcher")
}
