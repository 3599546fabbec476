//! HTTP server: the container engine's volume plugin API plus health probes

use std::net::SocketAddr;
use std::path::Path;

use axum::Router;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use tokio::net::UnixListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::ServiceState;

pub mod api;
pub mod health;

/// Build the full application router
pub fn router(state: ServiceState) -> Router {
    Router::new()
        .merge(api::plugin::router(state.clone()))
        .nest("/_status", health::router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve the API until `shutdown` is cancelled, on TCP and on the plugin
/// socket when one is configured
pub async fn run(
    listen_addr: SocketAddr,
    socket: Option<&Path>,
    state: ServiceState,
    shutdown: CancellationToken,
) -> Result<(), HttpServerError> {
    let app = router(state);
    let tcp = serve_tcp(listen_addr, app.clone(), shutdown.clone());
    match socket {
        Some(path) => {
            tokio::try_join!(tcp, serve_unix(path, app, shutdown))?;
        }
        None => tcp.await?,
    }

    tracing::info!("volume plugin API stopped");
    Ok(())
}

async fn serve_tcp(
    listen_addr: SocketAddr,
    app: Router,
    shutdown: CancellationToken,
) -> Result<(), HttpServerError> {
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .map_err(HttpServerError::Bind)?;
    tracing::info!(addr = %listen_addr, "volume plugin API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(HttpServerError::Serve)
}

/// Serve `app` on a unix socket at `path` until `shutdown` is cancelled.
///
/// Docker discovers plugins through sockets under `/run/docker/plugins`.
/// A stale socket file from an earlier run is replaced, and the file is
/// removed again on shutdown.
pub async fn serve_unix(
    path: &Path,
    app: Router,
    shutdown: CancellationToken,
) -> Result<(), HttpServerError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(HttpServerError::Bind)?;
    }
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(socket = %path.display(), "removed stale plugin socket"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(HttpServerError::Bind(e)),
    }

    let listener = UnixListener::bind(path).map_err(HttpServerError::Bind)?;
    tracing::info!(socket = %path.display(), "volume plugin API listening");

    loop {
        let stream = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => stream,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to accept plugin socket connection");
                    continue;
                }
            },
        };

        let service = TowerToHyperService::new(app.clone());
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
            tokio::pin!(conn);

            let mut draining = false;
            loop {
                tokio::select! {
                    result = conn.as_mut() => {
                        if let Err(e) = result {
                            tracing::debug!(error = %e, "plugin socket connection ended with error");
                        }
                        break;
                    }
                    _ = shutdown.cancelled(), if !draining => {
                        draining = true;
                        conn.as_mut().graceful_shutdown();
                    }
                }
            }
        });
    }

    if let Err(e) = std::fs::remove_file(path) {
        tracing::debug!(error = %e, socket = %path.display(), "failed to remove plugin socket");
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    #[error("failed to bind listener: {0}")]
    Bind(std::io::Error),
    #[error("server error: {0}")]
    Serve(std::io::Error),
}
