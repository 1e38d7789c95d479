use std::sync::Arc;

use ambient_watch::register_custom_metrics;
use ambient_watch::watch::resume_watch;
use ambient_watch::ChangeNotification;
use ambient_watch::Error;
use ambient_watch::Result;
use ambient_watch::WatchClient;
use ambient_watch::WatchClientConfig;
use ambient_watch::WatchOptions;
use futures::StreamExt;
use prometheus::Registry;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let settings = WatchClientConfig::new()?.validate()?;

    // Initializing Logs
    let _guard = init_observability();

    let registry = Registry::new();
    register_custom_metrics(&registry).map_err(|e| Error::Fatal(format!("metrics registration failed: {e}")))?;

    // Initializing Shutdown Signal
    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = graceful_shutdown(shutdown).await {
                error!("Failed to shutdown: {:?}", e);
            }
        }
    });

    info!(?settings, "Watching collection. Waiting for CTRL+C signal...");
    let policy = settings.retry;
    let client = Arc::new(WatchClient::from_config(settings)?);

    let options = WatchOptions::default().cancellation(shutdown.clone());
    let mut events = Box::pin(resume_watch(client.clone(), options, policy));

    let mut exit = Ok(());
    while let Some(event) = events.next().await {
        match event {
            Ok(change) => print_change(&change),
            Err(e) => {
                error!("watch stopped: {}", e);
                exit = Err(e.into());
            }
        }
    }

    client.close();
    if let Ok(text) = ambient_watch::encode_metrics(&registry) {
        debug!("final metrics:\n{}", text);
    }

    println!("Exiting program.");
    exit
}

fn print_change(change: &ChangeNotification) {
    match &change.resource {
        Some(session) => println!(
            "{:<8} {} name={} phase={}",
            change.kind, change.resource_id, session.name, session.phase
        ),
        None => println!("{:<8} {}", change.kind, change.resource_id),
    }
}

async fn graceful_shutdown(shutdown: CancellationToken) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt()).map_err(|e| Error::Fatal(e.to_string()))?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(|e| Error::Fatal(e.to_string()))?;
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

    shutdown.cancel();
    info!("Shutdown completed");
    Ok(())
}

pub fn init_observability() -> WorkerGuard {
    let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stderr());
    let base_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(base_subscriber).init();

    guard
}
