mod routes;
mod schemas;
mod state;

use std::sync::Arc;
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;
use crate::backend::routes::api_routes;

pub use schemas::{HistoryEntry, JobCreateResponse};
pub use state::GenState;

pub fn router(state: Arc<GenState>) -> Router {
    Router::new().merge(api_routes()).with_state(state)
}

/// Serves the API until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: Arc<GenState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    info!("Starting backend server on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
