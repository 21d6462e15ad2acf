use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::BookTicker;
use crate::marketdata::{MarketDataSource, TickerCallback};

/// CSV replay source.
///
/// Record format: `timestamp,symbol,bid_price,bid_qty,ask_price,ask_qty`
/// with a header line. The timestamp is ignored and the capture replays
/// at maximum speed; `update_id` is synthesized from the record number.
pub struct MarketDataReplay {
    path: PathBuf,
    callback: Option<TickerCallback>,
}

impl MarketDataReplay {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            callback: None,
        }
    }
}

/// Parse one CSV record. `seq` becomes the synthetic `update_id`.
fn parse_line(line: &str, seq: i64) -> EngineResult<BookTicker> {
    let parts: Vec<&str> = line.split(',').collect();
    if parts.len() < 6 {
        return Err(EngineError::MalformedMessage(format!(
            "expected 6 fields, got {}",
            parts.len()
        )));
    }
    let field = |index: usize| {
        parts[index].trim().parse::<f64>().map_err(|_| {
            EngineError::MalformedMessage(format!("bad decimal in field {index}: {}", parts[index]))
        })
    };
    Ok(BookTicker {
        symbol: parts[1].trim().to_string(),
        best_bid_price: field(2)?,
        best_bid_qty: field(3)?,
        best_ask_price: field(4)?,
        best_ask_qty: field(5)?,
        update_id: seq,
    })
}

fn open(path: &Path) -> EngineResult<File> {
    File::open(path).map_err(|err| {
        EngineError::Transport(format!("cannot open {}: {err}", path.display()))
    })
}

impl MarketDataSource for MarketDataReplay {
    fn connect(&mut self, _stream_spec: &str) -> EngineResult<()> {
        // Fail fast if the capture is missing; the real read happens in
        // run.
        open(&self.path).map(|_| ())
    }

    fn subscribe(&mut self, _symbol: &str) {}

    fn set_callback(&mut self, callback: TickerCallback) {
        self.callback = Some(callback);
    }

    fn run(&mut self) -> EngineResult<()> {
        let reader = BufReader::new(open(&self.path)?);
        let mut lines = reader.lines();

        // Header line.
        let _ = lines.next();

        let mut delivered: i64 = 0;
        for line in lines {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    warn!(%err, "replay: read error, stopping");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(&line, delivered + 1) {
                Ok(ticker) => {
                    if let Some(callback) = self.callback.as_mut() {
                        callback(ticker);
                    }
                    delivered += 1;
                }
                Err(err) => warn!(%err, line, "replay: record skipped"),
            }
        }

        info!(
            path = %self.path.display(),
            ticks = delivered,
            "replay finished"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_line() {
        let ticker =
            parse_line("1700000000,BTCUSDT,49990.5,2.0,50000.0,1.5", 7).unwrap();
        assert_eq!(ticker.symbol, "BTCUSDT");
        assert_eq!(ticker.best_bid_price, 49_990.5);
        assert_eq!(ticker.best_bid_qty, 2.0);
        assert_eq!(ticker.best_ask_price, 50_000.0);
        assert_eq!(ticker.best_ask_qty, 1.5);
        assert_eq!(ticker.update_id, 7);
    }

    #[test]
    fn test_parse_line_rejects_short_and_bad_records() {
        assert!(parse_line("1700000000,BTCUSDT,49990.5", 1).is_err());
        assert!(parse_line("ts,BTCUSDT,oops,2.0,50000.0,1.5", 1).is_err());
    }

    #[test]
    fn test_replay_skips_header_and_bad_records() {
        let path = std::env::temp_dir().join(format!(
            "engine-replay-test-{}.csv",
            std::process::id()
        ));
        {
            let mut file = File::create(&path).unwrap();
            writeln!(file, "timestamp,symbol,bid_price,bid_qty,ask_price,ask_qty").unwrap();
            writeln!(file, "1,BTCUSDT,49990.0,2.0,50000.0,1.0").unwrap();
            writeln!(file, "garbage line").unwrap();
            writeln!(file, "2,ETHUSDT,2600.0,5.0,2601.0,4.0").unwrap();
        }

        let mut source = MarketDataReplay::new(&path);
        let collected = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = std::sync::Arc::clone(&collected);
        source.set_callback(Box::new(move |ticker| sink.lock().push(ticker)));
        source.run().unwrap();

        let tickers = collected.lock();
        assert_eq!(tickers.len(), 2);
        assert_eq!(tickers[0].symbol, "BTCUSDT");
        assert_eq!(tickers[0].update_id, 1);
        assert_eq!(tickers[1].symbol, "ETHUSDT");
        assert_eq!(tickers[1].update_id, 2);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_fails_connect() {
        let mut source = MarketDataReplay::new("/nonexistent/capture.csv");
        assert!(source.connect("").is_err());
    }
}
