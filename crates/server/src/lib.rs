//! # ck-server
//!
//! HTTP surface of cockpit, built on axum.
//!
//! All routes live under `/api/v1`:
//!
//! | Method | Path | |
//! |---|---|---|
//! | POST | `/command/new` | submit a command |
//! | GET | `/command/list` | page through history |
//! | GET | `/command/stream` | SSE of status changes |
//! | GET | `/command/{id}` | one command |
//! | POST | `/command/{id}/stop` | stop a running command |
//! | GET | `/command/{id}/log` | page through a command's log |
//! | GET | `/command/{id}/log/stream` | SSE of a running command's log |

pub mod error;
pub mod handlers;
pub mod sse;
pub mod state;

pub use error::{ApiError, ServerError, ServerResult};
pub use state::AppState;

use std::future::Future;

use axum::routing::{get, post};
use axum::Router;
use ck_core::config::models::AppConfig;
use tokio::net::TcpListener;
use tracing::info;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/command/new", post(handlers::new_command))
        .route("/command/list", get(handlers::list_commands))
        .route("/command/stream", get(handlers::status_stream))
        .route("/command/{id}", get(handlers::get_command))
        .route("/command/{id}/stop", post(handlers::stop_command))
        .route("/command/{id}/log", get(handlers::get_logs))
        .route("/command/{id}/log/stream", get(handlers::log_stream));

    Router::new().nest("/api/v1", api).with_state(state)
}

/// Open the database, bind the configured address and serve until Ctrl-C.
///
/// # Errors
///
/// Returns [`ServerError`] if the store cannot be opened, the address
/// cannot be bound, or the listener fails.
pub async fn run_server(config: AppConfig) -> ServerResult<()> {
    let state = AppState::open(&config)?;
    let listener = TcpListener::bind(&config.server.bind)
        .await
        .map_err(|source| ServerError::Bind {
            addr: config.server.bind.clone(),
            source,
        })?;

    serve(listener, state, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves.
///
/// On shutdown every live command is stopped and all event streams are
/// ended before in-flight connections are drained.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> ServerResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!(addr = %listener.local_addr()?, "listening");
    let runner = state.runner.clone();

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("shutting down");
            runner.shutdown().await;
        })
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
