use std::sync::Arc;

use copybot::broker::{BridgeClient, ExecutionPlatform, PaperPlatform, ServerClock};
use copybot::channel;
use copybot::commands::CommandDispatcher;
use copybot::config::Settings;
use copybot::monitor::{BreakEvenMonitor, MonitorConfig};
use copybot::orchestrator::Orchestrator;
use copybot::parser::SignalParser;
use copybot::symbols::SymbolMapper;
use copybot::Result;
use tokio::sync::mpsc;
use tokio::time::Duration;

const CHANNEL_BUFFER: usize = 64;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    tracing::info!("🚀 CopyBot starting - Signal Copier");

    let settings = Settings::load()?;

    tracing::info!("\n📊 Configuration:");
    tracing::info!("  Broker: {}", settings.bridge.broker_name);
    tracing::info!("  Tolerance: {:?}", settings.trading.tolerance);
    tracing::info!("  Order expiry: {}s", settings.trading.expiry.default_secs);
    tracing::info!("  Monitor interval: {}s", settings.monitor.poll_interval_secs);
    tracing::info!("  Traded symbols: {}", settings.trading.traded_symbols.len());

    // Execution platform: REST bridge, or the in-memory paper platform
    // when no bridge is configured
    let platform: Arc<dyn ExecutionPlatform> = if settings.bridge.base_url.is_empty() {
        tracing::warn!("No bridge URL configured - running in dry-run (paper) mode");
        Arc::new(PaperPlatform::new())
    } else {
        tracing::info!("  Bridge: {}", settings.bridge.base_url);
        Arc::new(BridgeClient::new(settings.bridge.base_url.clone()))
    };

    // Measure the server clock offset once per session; the monitor
    // refreshes it periodically
    let clock = Arc::new(ServerClock::new());
    match clock.sync(platform.as_ref()).await {
        Ok(()) => tracing::info!("✅ Server clock synchronized"),
        Err(e) => tracing::warn!("Initial clock sync failed ({}), assuming zero offset", e),
    }

    let mapper = SymbolMapper::new(settings.symbols.clone());
    let orchestrator = Arc::new(Orchestrator::new(
        platform.clone(),
        clock.clone(),
        mapper,
        settings.bridge.broker_name.clone(),
        settings.trading.tolerance,
        settings.trading.expiry.clone(),
    ));

    let parser = SignalParser::new(
        &settings.trading.traded_symbols,
        (settings.trading.icm_min_entry, settings.trading.icm_max_entry),
    );

    // Messaging channel plumbing: stdin in, acknowledgements out
    let message_rx = channel::stdin_source(CHANNEL_BUFFER);
    let (ack_tx, ack_rx) = mpsc::channel(CHANNEL_BUFFER);
    channel::ack_printer(ack_rx);

    let dispatcher = CommandDispatcher::new(orchestrator.clone(), ack_tx.clone());

    tracing::info!("\n🔄 Spawning independent loops...");

    // Loop 1: signal ingestion (reacts to messages as they arrive)
    let ingestion_task = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            channel::ingestion_loop(message_rx, parser, orchestrator, dispatcher, ack_tx).await;
        })
    };

    // Loop 2: break-even / expiry monitoring (fixed-interval polling)
    let monitor_task = {
        let monitor = BreakEvenMonitor::new(
            orchestrator.clone(),
            platform.clone(),
            clock.clone(),
            MonitorConfig {
                poll_interval: Duration::from_secs(settings.monitor.poll_interval_secs),
                clock_resync_cycles: settings.monitor.clock_resync_cycles,
                break_even_target_index: settings.monitor.break_even_target_index,
            },
        );
        tokio::spawn(monitor.run())
    };

    tracing::info!("✅ All loops spawned successfully");
    tracing::info!("Press Ctrl+C to stop...\n");

    // Wait for Ctrl+C or task failure; in-flight platform calls finish
    // inside their group locks before loops are torn down
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("\n⚠️  Received Ctrl+C, shutting down...");
        }
        result = ingestion_task => {
            tracing::error!("Ingestion loop exited: {:?}", result);
        }
        result = monitor_task => {
            tracing::error!("Monitor loop exited: {:?}", result);
        }
    }

    tracing::info!("👋 CopyBot stopped");
    Ok(())
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "copybot=info".into()),
        )
        .init();
}
