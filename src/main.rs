use std::path::Path;

use reconcile_engine::start_server;
use reconcile_engine::ChannelEventSource;
use reconcile_engine::ConfigMap;
use reconcile_engine::Controller;
use reconcile_engine::EngineConfig;
use reconcile_engine::Error;
use reconcile_engine::LoggingReconciler;
use reconcile_engine::Result;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let settings = EngineConfig::new()?.validate()?;

    // Initializing Logs
    let _guard = init_observability(settings.controller.log_dir.as_deref())?;
    info!("Loaded configuration: {:?}", settings);

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());

    if settings.monitoring.prometheus_enabled {
        tokio::spawn(start_server(settings.monitoring.prometheus_port, graceful_rx.clone()));
    }

    let (source, _handle) = ChannelEventSource::new(
        vec![ConfigMap::new("default", "myConfigMap")],
        settings.source.resync_period(),
    );
    let controller: Controller<ConfigMap, _, _> =
        Controller::new(&settings, source, LoggingReconciler);

    info!("Application started. Waiting for CTRL+C signal...");
    tokio::spawn(async {
        if let Err(e) = graceful_shutdown(graceful_tx).await {
            error!("Failed to shutdown: {:?}", e);
        }
    });

    if let Err(e) = controller.run(settings.controller.workers, graceful_rx).await {
        error!("controller stops: {:?}", e);
        return Err(e);
    }

    info!("Exiting program.");
    Ok(())
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    graceful_tx.send(()).map_err(|e| {
        error!("Failed to send shutdown signal: {}", e);
        Error::SignalSenderClosed(format!("Failed to send shutdown signal: {}", e))
    })?;

    info!("Shutdown signal sent");
    Ok(())
}

/// Logs to stdout, or to `<log_dir>/controller.log` when a directory is set.
fn init_observability(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let Some(log_dir) = log_dir else {
        let stdout_layer = tracing_subscriber::fmt::layer().with_filter(default_filter());
        tracing_subscriber::registry().with(stdout_layer).init();
        return Ok(None);
    };

    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::never(log_dir, "controller.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(default_filter());
    tracing_subscriber::registry().with(file_layer).init();

    Ok(Some(guard))
}

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
