use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

use execution_engine::config::Args;
use execution_engine::engine::{ring, BookTicker, EngineResult, StrategyEngine, SymbolRegistry};
use execution_engine::execution::{spawn_report_dispatcher, OrderGateway, OrderManager, RiskFilter, RiskLimits};
use execution_engine::marketdata::{BinanceMarketData, MarketDataReplay, MarketDataSource, TickerCallback};
use execution_engine::metrics::{describe_metrics, EngineMetrics, MetricsReporter};
use execution_engine::recorder::{EngineEvent, Recorder};
use execution_engine::utils::affinity;

fn main() {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args = Args::parse();
    describe_metrics();

    if let Err(err) = run(args) {
        error!(%err, "initialization failed");
        std::process::exit(1);
    }
}

fn run(args: Args) -> EngineResult<()> {
    info!(
        replay = ?args.replay,
        symbols = ?args.symbols,
        ring_capacity = args.ring_capacity,
        "starting execution engine"
    );

    // Known symbols are interned before the consumer launches, so the
    // hot path never takes the registry's assignment lock.
    let registry = Arc::new(SymbolRegistry::new());
    for symbol in &args.symbols {
        registry.get_id(&symbol.to_uppercase());
    }

    let (mut producer, consumer_ring) = ring::<BookTicker>(args.ring_capacity);
    let metrics = Arc::new(EngineMetrics::new());
    let stop = Arc::new(AtomicBool::new(false));

    // Event recorder (optional).
    let (events_tx, recorder_handle) = match &args.record {
        Some(path) => {
            let (tx, rx) = crossbeam_channel::unbounded::<EngineEvent>();
            let handle = Recorder::spawn(path, rx)?;
            (Some(tx), Some(handle))
        }
        None => (None, None),
    };

    // Order flow: gateway workers → report channel → dispatcher →
    // manager.
    let (report_tx, report_rx) = crossbeam_channel::unbounded();
    let gateway = Arc::new(OrderGateway::new(report_tx));
    let orders = Arc::new(OrderManager::new());
    let dispatcher = spawn_report_dispatcher(report_rx, Arc::clone(&orders), events_tx.clone());

    // Consumer: the strategy thread, pinned when a core is configured.
    let mut engine = StrategyEngine::new(
        consumer_ring,
        Arc::clone(&registry),
        Arc::clone(&gateway),
        Arc::clone(&orders),
        RiskFilter::new(RiskLimits::from_env()),
        Arc::clone(&metrics),
        events_tx.clone(),
        Arc::clone(&stop),
    );
    let core = args.core;
    let consumer = thread::Builder::new()
        .name("strategy".to_string())
        .spawn(move || {
            if let Some(core) = core {
                affinity::pin_to_core(core);
            }
            engine.run();
            engine
        })
        .expect("failed to spawn strategy thread");

    // Producer callback: fill the ticker, push, count the overflow.
    // Never blocks.
    let producer_metrics = Arc::clone(&metrics);
    let callback: TickerCallback = Box::new(move |ticker| {
        if producer.push(ticker).is_err() {
            producer_metrics.increment_ring_dropped();
        }
    });

    if let Some(path) = &args.replay {
        let mut source = MarketDataReplay::new(path);
        source.connect("")?;
        source.set_callback(callback);
        // Replay runs on this thread at max speed; the consumer drains
        // whatever survives the ring.
        source.run()?;
        stop.store(true, Ordering::Release);
    } else {
        if let Err(err) = PrometheusBuilder::new().install() {
            warn!(%err, "prometheus exporter unavailable");
        }
        let reporter =
            MetricsReporter::new(Arc::clone(&metrics), Duration::from_secs(5)).spawn(Arc::clone(&stop));

        let mut source = BinanceMarketData::new(args.ws_base(), Arc::clone(&stop));
        source.connect(&args.stream_spec())?;
        source.set_callback(callback);
        let network = thread::Builder::new()
            .name("market-data".to_string())
            .spawn(move || {
                if let Err(err) = source.run() {
                    error!(%err, "market-data source failed");
                }
            })
            .expect("failed to spawn market-data thread");

        info!("engine running, press Enter to stop");
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
        stop.store(true, Ordering::Release);

        // The network thread wakes on its next frame or reconnect tick;
        // don't stall shutdown waiting for it.
        drop(network);
        drop(reporter);
    }

    let engine = match consumer.join() {
        Ok(engine) => engine,
        Err(_) => {
            error!("strategy thread panicked");
            std::process::exit(1);
        }
    };

    if !gateway.wait_idle(Duration::from_secs(2)) {
        warn!(
            in_flight = gateway.in_flight(),
            "gateway workers still in flight, dropping their reports"
        );
    }

    info!(
        ticks = metrics.ticks(),
        dropped = metrics.ring_dropped(),
        orders = orders.tracked_orders(),
        position = engine.position(),
        "shutdown complete"
    );

    // Closing every report sender lets the dispatcher drain and exit;
    // same for the recorder.
    drop(engine);
    drop(gateway);
    let _ = dispatcher.join();
    drop(events_tx);
    if let Some(handle) = recorder_handle {
        let _ = handle.join();
    }
    Ok(())
}
