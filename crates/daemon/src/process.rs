//! Process startup: logging, service state and the HTTP server lifecycle

use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::http_server::{self, HttpServerError};
use crate::service_config::Config;
use crate::service_state::{State, StateSetupError};

const LOG_FILE_PREFIX: &str = "drivefs.log";

/// Install the global subscriber.
///
/// Logs go to stdout, filtered by `RUST_LOG` (default `info`). With a log
/// directory they are also written to daily rotated files; keep the returned
/// guard alive to flush them.
pub fn init_logging(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_filter(filter()))
        .with(file_layer)
        .init();

    guard
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("state setup failed: {0}")]
    State(#[from] StateSetupError),
    #[error("http server failed: {0}")]
    Http(#[from] HttpServerError),
}

/// Run the volume plugin service until `shutdown` fires, then unmount every
/// volume
pub async fn start_service(config: &Config, shutdown: CancellationToken) -> Result<(), ServiceError> {
    let state = State::from_config(config).await?;
    tracing::info!(
        volume_root = %config.volume_root.display(),
        remote = ?config.remote.kind,
        "service state ready"
    );

    let result = http_server::run(
        config.listen_addr,
        config.plugin_socket(),
        state.clone(),
        shutdown,
    )
    .await;

    tracing::info!("shutting down, unmounting volumes");
    state.mount_manager().unmount_all().await;
    result?;
    Ok(())
}

/// Cancel the returned token on ctrl-c or SIGTERM
pub fn shutdown_on_signal() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("shutdown signal received");
        cancel.cancel();
    });
    token
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
