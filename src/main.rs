use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use tick_stream::{
    TickStreamCoordinator,
    cli::Args,
    config::Config,
    events::ChannelObserver,
    monitoring::setup_metrics,
    tracing_setup::setup_tracing,
    ui::{UIController, UIOptions},
};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup tracing/logging
    setup_tracing(&args.log_level, args.json_logs)?;

    info!("Starting tick stream client v{}", env!("CARGO_PKG_VERSION"));

    // TLS for wss:// endpoints; a provider may already be installed
    let _ = rustls::crypto::ring::default_provider().install_default();

    // Load configuration
    let config = Config::from_args(&args)?;

    // Setup metrics server if enabled
    if config.metrics.enabled {
        setup_metrics(config.metrics.port).await?;
        info!("Metrics server started on port {}", config.metrics.port);
    }

    let coordinator =
        TickStreamCoordinator::websocket(config.stream.clone(), config.display.clone());
    let (observer, receiver) = ChannelObserver::channel();
    coordinator.subscribe(observer);

    let mut ui = UIController::new(
        receiver,
        config.output.format,
        UIOptions {
            colored: config.output.colored,
            quiet: config.output.quiet,
            max_ticks: config.output.max_ticks,
        },
    );

    coordinator.start();
    info!("Client started. Press Ctrl+C to shutdown...");

    let shutdown = CancellationToken::new();
    tokio::select! {
        _ = ui.run() => {}
        _ = health_loop(&coordinator, config.health.check_interval, shutdown.clone()) => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
        }
    }

    shutdown.cancel();
    coordinator.stop();

    info!("Client stopped successfully");
    Ok(())
}

async fn health_loop(
    coordinator: &TickStreamCoordinator,
    check_interval: Option<Duration>,
    shutdown: CancellationToken,
) {
    let Some(check_interval) = check_interval else {
        shutdown.cancelled().await;
        return;
    };

    let mut ticker = tokio::time::interval(check_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // First tick fires immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = ticker.tick() => {
                let report = coordinator.health();
                if report.is_healthy {
                    info!(health = %report.to_json(), "Health check");
                } else {
                    warn!(health = %report.to_json(), "Health check");
                }
            }
        }
    }
}
