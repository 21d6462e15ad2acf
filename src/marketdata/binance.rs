use futures_util::StreamExt;
use rand::Rng;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use tracing::{error, info, warn};

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::BookTicker;
use crate::marketdata::{MarketDataSource, TickerCallback};

pub const DEFAULT_WS_BASE: &str = "wss://stream.binance.com:9443";

/// Raw bookTicker payload:
/// `{"u":400900217,"s":"BNBUSDT","b":"25.35","B":"31.21","a":"25.36","A":"40.66"}`
#[derive(Debug, Deserialize)]
struct BookTickerMsg {
    #[serde(rename = "u")]
    update_id: i64,
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "b")]
    bid_price: String,
    #[serde(rename = "B")]
    bid_qty: String,
    #[serde(rename = "a")]
    ask_price: String,
    #[serde(rename = "A")]
    ask_qty: String,
}

/// Combined-stream envelope; the payload sits under `data`.
#[derive(Debug, Deserialize)]
struct CombinedStreamMsg {
    data: BookTickerMsg,
}

impl BookTickerMsg {
    fn into_ticker(self) -> EngineResult<BookTicker> {
        let parse = |field: &str, value: &str| {
            value.parse::<f64>().map_err(|_| {
                EngineError::MalformedMessage(format!("bad decimal in {field}: {value}"))
            })
        };
        Ok(BookTicker {
            best_bid_price: parse("b", &self.bid_price)?,
            best_bid_qty: parse("B", &self.bid_qty)?,
            best_ask_price: parse("a", &self.ask_price)?,
            best_ask_qty: parse("A", &self.ask_qty)?,
            symbol: self.symbol,
            update_id: self.update_id,
        })
    }
}

/// Decode one text frame into a ticker. Accepts both the raw stream
/// shape and the combined-stream envelope.
pub fn parse_book_ticker(text: &str) -> EngineResult<BookTicker> {
    if let Ok(msg) = serde_json::from_str::<CombinedStreamMsg>(text) {
        return msg.data.into_ticker();
    }
    serde_json::from_str::<BookTickerMsg>(text)
        .map_err(|err| EngineError::MalformedMessage(err.to_string()))?
        .into_ticker()
}

/// Live bookTicker feed over the exchange WebSocket.
///
/// `run` drives a current-thread tokio runtime on the caller's thread
/// (the producer thread); the callback fires inline with each frame.
/// Disconnects reconnect with exponential backoff plus jitter; malformed
/// frames are logged and skipped, never fatal.
pub struct BinanceMarketData {
    ws_base: String,
    stream_spec: Option<String>,
    streams: Vec<String>,
    callback: Option<TickerCallback>,
    stop: Arc<AtomicBool>,
}

impl BinanceMarketData {
    pub fn new(ws_base: impl Into<String>, stop: Arc<AtomicBool>) -> Self {
        Self {
            ws_base: ws_base.into(),
            stream_spec: None,
            streams: Vec::new(),
            callback: None,
            stop,
        }
    }

    fn stream_url(&self) -> EngineResult<String> {
        let spec = match &self.stream_spec {
            Some(spec) => spec.clone(),
            None => self.streams.join("/"),
        };
        if spec.is_empty() {
            return Err(EngineError::Transport("no streams configured".to_string()));
        }
        let url = format!(
            "{}/stream?streams={}",
            self.ws_base.trim_end_matches('/'),
            spec
        );
        Url::parse(&url).map_err(|err| EngineError::Transport(err.to_string()))?;
        Ok(url)
    }

    async fn event_loop(&mut self, ws_url: String) {
        let mut attempt: u32 = 0;
        while !self.stop.load(Ordering::Relaxed) {
            info!(%ws_url, "connecting bookTicker stream");
            match tokio_tungstenite::connect_async(ws_url.as_str()).await {
                Ok((mut ws, _response)) => {
                    info!("bookTicker stream connected");
                    attempt = 0;

                    while let Some(frame) = ws.next().await {
                        if self.stop.load(Ordering::Relaxed) {
                            return;
                        }
                        match frame {
                            Ok(msg) if msg.is_text() => {
                                let text = match msg.into_text() {
                                    Ok(text) => text,
                                    Err(err) => {
                                        warn!(%err, "unreadable text frame");
                                        continue;
                                    }
                                };
                                match parse_book_ticker(&text) {
                                    Ok(ticker) => {
                                        if let Some(callback) = self.callback.as_mut() {
                                            callback(ticker);
                                        }
                                    }
                                    Err(err) => warn!(%err, "frame skipped"),
                                }
                            }
                            Ok(_) => {} // ping/pong/binary ignored
                            Err(err) => {
                                error!(%err, "websocket read error");
                                break;
                            }
                        }
                    }
                    info!("bookTicker stream disconnected, reconnecting");
                }
                Err(err) => error!(%err, "websocket connect failed"),
            }

            // Exponential backoff with jitter: 0.5s .. 32s.
            attempt = attempt.saturating_add(1);
            let base_ms = 500u64.saturating_mul(1 << attempt.min(6));
            let jitter = rand::thread_rng().gen_range(0..=250);
            tokio::time::sleep(Duration::from_millis(base_ms + jitter)).await;
        }
    }
}

impl MarketDataSource for BinanceMarketData {
    fn connect(&mut self, stream_spec: &str) -> EngineResult<()> {
        self.stream_spec = Some(stream_spec.to_string());
        // Validate eagerly so a bad endpoint aborts startup.
        self.stream_url().map(|_| ())
    }

    fn subscribe(&mut self, symbol: &str) {
        self.streams
            .push(format!("{}@bookTicker", symbol.to_lowercase()));
    }

    fn set_callback(&mut self, callback: TickerCallback) {
        self.callback = Some(callback);
    }

    fn run(&mut self) -> EngineResult<()> {
        let ws_url = self.stream_url()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| EngineError::Transport(err.to_string()))?;
        runtime.block_on(self.event_loop(ws_url));
        Ok(())
    }
}
