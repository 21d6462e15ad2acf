use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::engine::error::EngineError;
use crate::engine::pool::{ObjectPool, SlotId};
use crate::engine::types::{
    ExecType, ExecutionReport, Order, OrderId, OrderState, Price, Quantity, Side, SymbolId,
};

/// Default pool size: enough orders for a busy trading day.
pub const DEFAULT_POOL_CAPACITY: usize = 100_000;

struct ManagerState {
    next_order_id: OrderId,
    /// order_id → pool slot. The pool owns the storage; this index is
    /// non-owning.
    index: HashMap<OrderId, SlotId>,
    pool: ObjectPool<Order>,
}

/// Tracks the lifecycle of every order.
///
/// All state lives behind a single mutex, so `apply` is callable from
/// any thread (gateway workers deliver reports off the strategy
/// thread). Critical sections are short; this is the only lock in the
/// pipeline. Reads hand out copy-on-read snapshots rather than pool
/// pointers, so nothing aliases pool storage outside the lock.
///
/// Terminal orders are retained in the index until an explicit
/// [`purge_terminal`](OrderManager::purge_terminal).
pub struct OrderManager {
    state: Mutex<ManagerState>,
}

impl OrderManager {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_POOL_CAPACITY)
    }

    pub fn with_capacity(pool_capacity: usize) -> Self {
        Self {
            state: Mutex::new(ManagerState {
                next_order_id: 1,
                index: HashMap::new(),
                pool: ObjectPool::new(pool_capacity),
            }),
        }
    }

    /// Reserve the next order id, acquire a pool slot, and index the
    /// order in state `PendingNew`. The id is only consumed on success.
    pub fn create(
        &self,
        symbol_id: SymbolId,
        side: Side,
        price: Price,
        quantity: Quantity,
    ) -> Result<OrderId, EngineError> {
        let mut state = self.state.lock();
        let id = state.next_order_id;
        let order = Order::new(id, symbol_id, side, price, quantity);
        let Some(slot) = state.pool.acquire(order) else {
            warn!(order_pool = state.pool.capacity(), "order pool exhausted");
            return Err(EngineError::PoolExhausted);
        };
        state.next_order_id += 1;
        state.index.insert(id, slot);
        Ok(id)
    }

    /// Copy-on-read snapshot of a tracked order.
    pub fn get(&self, order_id: OrderId) -> Option<Order> {
        let state = self.state.lock();
        let slot = *state.index.get(&order_id)?;
        state.pool.get(slot).cloned()
    }

    /// Apply an execution report. Unknown order ids are logged and
    /// dropped; terminal orders absorb all further transitions.
    pub fn apply(&self, report: &ExecutionReport) {
        let mut state = self.state.lock();
        let Some(&slot) = state.index.get(&report.order_id) else {
            warn!(order_id = report.order_id, "execution report for unknown order");
            metrics::counter!("engine_reports_unknown_total").increment(1);
            return;
        };
        let Some(order) = state.pool.get_mut(slot) else {
            return;
        };

        if order.state.is_terminal() {
            debug!(
                order_id = order.order_id,
                state = ?order.state,
                "report ignored, order already terminal"
            );
            return;
        }

        match report.exec_type {
            ExecType::New => {
                order.state = OrderState::New;
                debug!(order_id = order.order_id, "order confirmed new");
            }
            ExecType::PartialFill => {
                order.filled_quantity = report.cum_qty;
                order.state = report.order_state;
                info!(
                    order_id = order.order_id,
                    cum_qty = report.cum_qty,
                    last_price = report.last_price,
                    "partial fill"
                );
            }
            ExecType::Fill => {
                order.filled_quantity = report.cum_qty;
                order.state = OrderState::Filled;
                info!(
                    order_id = order.order_id,
                    cum_qty = report.cum_qty,
                    avg_price = report.avg_price,
                    "order filled"
                );
            }
            ExecType::Canceled => {
                order.state = OrderState::Canceled;
                info!(order_id = order.order_id, "order canceled");
            }
            ExecType::Rejected => {
                order.state = OrderState::Rejected;
                warn!(
                    order_id = order.order_id,
                    reason = %report.text,
                    "order rejected"
                );
            }
            ExecType::PendingCancel | ExecType::PendingNew => {}
        }
        metrics::counter!("engine_reports_applied_total").increment(1);
    }

    /// Legacy manual fill path: adds to the filled quantity and promotes
    /// to `Filled` once the full quantity is done.
    pub fn on_fill(&self, order_id: OrderId, fill_qty: Quantity, fill_price: Price) {
        let mut state = self.state.lock();
        let Some(&slot) = state.index.get(&order_id) else {
            warn!(order_id, "fill for unknown order");
            return;
        };
        if let Some(order) = state.pool.get_mut(slot) {
            order.filled_quantity += fill_qty;
            if order.filled_quantity >= order.quantity {
                order.state = OrderState::Filled;
            }
            info!(order_id, fill_qty, fill_price, "manual fill applied");
        }
    }

    /// Release terminal orders back to the pool. Returns how many were
    /// purged.
    pub fn purge_terminal(&self) -> usize {
        let mut state = self.state.lock();
        let terminal: Vec<(OrderId, SlotId)> = state
            .index
            .iter()
            .filter(|&(_, &slot)| {
                state
                    .pool
                    .get(slot)
                    .is_some_and(|order| order.state.is_terminal())
            })
            .map(|(&id, &slot)| (id, slot))
            .collect();
        for (id, slot) in &terminal {
            state.index.remove(id);
            state.pool.release(*slot);
        }
        terminal.len()
    }

    /// Orders currently tracked (including terminal, pre-purge).
    pub fn tracked_orders(&self) -> usize {
        self.state.lock().index.len()
    }

    /// Tracked orders that have not reached a terminal state.
    pub fn open_orders(&self) -> usize {
        let state = self.state.lock();
        state
            .index
            .values()
            .filter(|&&slot| {
                state
                    .pool
                    .get(slot)
                    .is_some_and(|order| !order.state.is_terminal())
            })
            .count()
    }
}

impl Default for OrderManager {
    fn default() -> Self {
        Self::new()
    }
}
