use clap::Parser;
use std::env;
use std::path::PathBuf;

use crate::marketdata::binance::DEFAULT_WS_BASE;

/// Command-line surface. Risk limits come from the environment (see
/// [`RiskLimits::from_env`](crate::execution::risk::RiskLimits::from_env)),
/// the WebSocket endpoint from `BINANCE_WS_URL`.
#[derive(Parser, Debug)]
#[command(
    name = "execution-engine",
    about = "Low-latency crypto execution engine: book-ticker feed, signal evaluation, risk-checked order flow"
)]
pub struct Args {
    /// Replay book tickers from a CSV capture instead of the live feed
    #[arg(long, value_name = "PATH")]
    pub replay: Option<PathBuf>,

    /// Symbols to subscribe on the bookTicker stream
    #[arg(long, value_delimiter = ',', default_value = "btcusdt,ethbtc,ethusdt")]
    pub symbols: Vec<String>,

    /// Pin the strategy thread to this logical CPU
    #[arg(long, value_name = "CORE")]
    pub core: Option<usize>,

    /// Append engine events to this JSONL file
    #[arg(long, value_name = "PATH")]
    pub record: Option<PathBuf>,

    /// Market-data ring capacity (rounded up to a power of two)
    #[arg(long, default_value_t = 1024)]
    pub ring_capacity: usize,
}

impl Args {
    pub fn ws_base(&self) -> String {
        env::var("BINANCE_WS_URL").unwrap_or_else(|_| DEFAULT_WS_BASE.to_string())
    }

    /// Combined-stream spec for the configured symbols, e.g.
    /// `btcusdt@bookTicker/ethbtc@bookTicker/ethusdt@bookTicker`.
    pub fn stream_spec(&self) -> String {
        self.symbols
            .iter()
            .map(|symbol| format!("{}@bookTicker", symbol.to_lowercase()))
            .collect::<Vec<_>>()
            .join("/")
    }
}
