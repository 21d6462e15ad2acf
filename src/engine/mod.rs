//! Core tick-to-trade pipeline
//!
//! The wait-free handoff, the pre-allocated order storage, the symbol
//! interner, the per-symbol top-of-book, and the strategy loop that
//! consumes it all.

pub mod book;
pub mod error;
pub mod pool;
pub mod spsc;
pub mod strategy;
pub mod symbols;
pub mod types;

// Re-export main types for convenience
pub use book::TopOfBook;
pub use error::{EngineError, EngineResult};
pub use pool::{ObjectPool, SlotId};
pub use spsc::{ring, RingConsumer, RingProducer};
pub use strategy::StrategyEngine;
pub use symbols::SymbolRegistry;
pub use types::{
    BookTicker, ExecType, ExecutionReport, Order, OrderId, OrderState, OrderType, Price, Quantity,
    Side, SymbolId,
};
