use thiserror::Error;

use crate::execution::risk::RiskReason;

/// Closed error taxonomy for the pipeline.
///
/// None of these terminate the process after initialization: capacity
/// errors drop the sample or abort the send, validation and protocol
/// errors are logged and counted, transport errors are the feed's
/// concern.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Ring full on push; the producer drops the sample and counts it.
    #[error("market-data ring full")]
    RingFull,

    /// Order pool exhausted; the send path aborts.
    #[error("order pool exhausted")]
    PoolExhausted,

    /// Pre-trade risk check failed.
    #[error("risk rejected: {0}")]
    RiskRejected(RiskReason),

    /// Inbound message could not be decoded.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// Update references a symbol the engine does not track.
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    /// Execution report references an untracked order id.
    #[error("unknown order id: {0}")]
    UnknownOrder(i64),

    /// Market-data connect/handshake/read failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Stop was requested.
    #[error("shutting down")]
    ShuttingDown,
}

pub type EngineResult<T> = Result<T, EngineError>;
