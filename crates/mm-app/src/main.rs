use std::sync::Arc;
use meshmind::backend::{self, GenState};
use meshmind::{ArtifactStore, Config, GenerationWorker, Pipeline, logging};
use mm_core::SessionHistory;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };
    info!("Loaded configuration: {:?}", config);

    let store = ArtifactStore::new(config.output_dir.clone(), SessionHistory::new());

    let worker = {
        let config = config.clone();
        let store = store.clone();
        tokio::task::spawn_blocking(move || {
            GenerationWorker::spawn(move || Pipeline::from_config(&config, store))
        })
        .await??
    };

    let state = Arc::new(GenState::new(worker, store));
    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;

    backend::serve(listener, state, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutting down");
    })
    .await
}
