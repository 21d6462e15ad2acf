use crate::engine::error::EngineResult;
use crate::engine::types::BookTicker;

pub mod binance;
pub mod replay;

pub use binance::BinanceMarketData;
pub use replay::MarketDataReplay;

/// Delivered once per inbound book-ticker, on the producer thread. The
/// callback must never block: fill the ticker, push to the ring, return.
pub type TickerCallback = Box<dyn FnMut(BookTicker) + Send>;

/// Pluggable market-data source: the live WebSocket feed or the CSV
/// replay. `run` blocks the calling thread until the feed ends or stop
/// is requested, so the bootstrap gives each source its own thread.
pub trait MarketDataSource: Send {
    /// Prepare the connection for a stream spec such as
    /// `btcusdt@bookTicker/ethbtc@bookTicker`. Fails fast on an invalid
    /// endpoint so startup can abort before threads launch.
    fn connect(&mut self, stream_spec: &str) -> EngineResult<()>;

    /// Add one symbol subscription (used when no combined stream spec
    /// was given to `connect`).
    fn subscribe(&mut self, symbol: &str);

    /// Install the ticker sink. Must be set before `run`.
    fn set_callback(&mut self, callback: TickerCallback);

    /// Drive the feed until it ends. Transport errors inside the loop
    /// are logged and retried; only setup errors surface here.
    fn run(&mut self) -> EngineResult<()>;
}
