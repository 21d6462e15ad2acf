use chrono::{DateTime, Utc};
use crossbeam_channel::Receiver;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::thread::{self, JoinHandle};
use tracing::{error, info};

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::{ExecType, ExecutionReport, OrderId, OrderState, Price, Quantity, Side};
use crate::execution::risk::RiskReason;

/// Events worth persisting to the append-only trade log. Ring drops are
/// counted in metrics but not recorded; everything order-shaped is.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    OrderCreated {
        ts: DateTime<Utc>,
        order_id: OrderId,
        symbol: String,
        side: Side,
        price: Price,
        quantity: Quantity,
    },
    RiskReject {
        ts: DateTime<Utc>,
        symbol: String,
        side: Side,
        price: Price,
        quantity: Quantity,
        reason: RiskReason,
    },
    ExecReport {
        ts: DateTime<Utc>,
        order_id: OrderId,
        exec_type: ExecType,
        state: OrderState,
        last_qty: Quantity,
        last_price: Price,
        cum_qty: Quantity,
    },
}

impl EngineEvent {
    pub fn order_created(
        order_id: OrderId,
        symbol: &str,
        side: Side,
        price: Price,
        quantity: Quantity,
    ) -> Self {
        Self::OrderCreated {
            ts: Utc::now(),
            order_id,
            symbol: symbol.to_string(),
            side,
            price,
            quantity,
        }
    }

    pub fn risk_reject(
        symbol: &str,
        side: Side,
        price: Price,
        quantity: Quantity,
        reason: RiskReason,
    ) -> Self {
        Self::RiskReject {
            ts: Utc::now(),
            symbol: symbol.to_string(),
            side,
            price,
            quantity,
            reason,
        }
    }

    pub fn exec_report(report: &ExecutionReport) -> Self {
        Self::ExecReport {
            ts: Utc::now(),
            order_id: report.order_id,
            exec_type: report.exec_type,
            state: report.order_state,
            last_qty: report.last_qty,
            last_price: report.last_price,
            cum_qty: report.cum_qty,
        }
    }
}

const FLUSH_EVERY_N_EVENTS: u32 = 1_000;

/// Append-only JSONL event recorder.
///
/// Serialization and disk I/O happen on a dedicated low-priority
/// thread; the hot path only pays for a channel send. The writer
/// flushes every [`FLUSH_EVERY_N_EVENTS`] events and once more when the
/// channel closes.
pub struct Recorder;

impl Recorder {
    pub fn spawn(path: &Path, events: Receiver<EngineEvent>) -> EngineResult<JoinHandle<()>> {
        let file = open_append(path)?;
        let path = path.display().to_string();
        thread::Builder::new()
            .name("recorder".to_string())
            .spawn(move || {
                info!(%path, "recorder started");
                let mut writer = BufWriter::new(file);
                let mut since_flush: u32 = 0;
                let mut written: u64 = 0;

                for event in events.iter() {
                    let line = match serde_json::to_string(&event) {
                        Ok(line) => line,
                        Err(err) => {
                            error!(%err, "recorder: serialize failed, event dropped");
                            continue;
                        }
                    };
                    if let Err(err) = writeln!(writer, "{line}") {
                        error!(%err, "recorder: write failed, event dropped");
                        continue;
                    }
                    written += 1;
                    since_flush += 1;
                    if since_flush >= FLUSH_EVERY_N_EVENTS {
                        let _ = writer.flush();
                        since_flush = 0;
                    }
                }

                let _ = writer.flush();
                info!(%path, events = written, "recorder stopped");
            })
            .map_err(|err| EngineError::Transport(err.to_string()))
    }
}

fn open_append(path: &Path) -> EngineResult<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|err| EngineError::Transport(err.to_string()))?;
        }
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| EngineError::Transport(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_events_written_as_jsonl() {
        let path = std::env::temp_dir().join(format!(
            "engine-recorder-test-{}.jsonl",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);

        let (tx, rx) = unbounded();
        let handle = Recorder::spawn(&path, rx).unwrap();

        tx.send(EngineEvent::order_created(1, "BTCUSDT", Side::Buy, 50_000.0, 0.01))
            .unwrap();
        tx.send(EngineEvent::risk_reject(
            "BTCUSDT",
            Side::Buy,
            50_000.0,
            11.0,
            RiskReason::OrderSizeExceeded,
        ))
        .unwrap();
        drop(tx);
        handle.join().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["type"], "order_created");
        assert_eq!(first["order_id"], 1);
        assert_eq!(first["symbol"], "BTCUSDT");

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["type"], "risk_reject");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_unwritable_path_fails_at_spawn() {
        let (_tx, rx) = unbounded::<EngineEvent>();
        let result = Recorder::spawn(Path::new("/proc/nonexistent/events.jsonl"), rx);
        assert!(result.is_err());
    }
}
