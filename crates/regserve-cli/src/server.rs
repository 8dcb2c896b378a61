use std::sync::Arc;

use anyhow::{Context, Result};
use warp::Filter;

use regserve_models::{ModelRegistry, ModelStore};

use crate::api::{api_routes, handle_rejection, SharedRegistry};
use crate::config::ServerConfig;

/// Open the model directory and build the shared registry for `config`.
pub fn build_registry(config: &ServerConfig) -> Result<SharedRegistry> {
    let store = ModelStore::open(&config.model_dir, &config.model_extension).with_context(|| {
        format!(
            "Failed to open model directory: {}",
            config.model_dir.display()
        )
    })?;

    match store.persisted_ids() {
        Ok(ids) if !ids.is_empty() => log::info!(
            "{} persisted model(s) available for loading: {}",
            ids.len(),
            ids.join(", ")
        ),
        Ok(_) => log::info!("No persisted models in {}", store.dir().display()),
        Err(e) => log::warn!("Could not list persisted models: {}", e),
    }

    let registry = ModelRegistry::new(store).with_fit_delay(config.fit_delay());
    Ok(Arc::new(registry))
}

/// Serve the API until Ctrl-C.
pub async fn serve(config: &ServerConfig) -> Result<()> {
    let addr = config.socket_addr()?;
    let registry = build_registry(config)?;
    let routes = api_routes(registry).recover(handle_rejection);

    let (bound, server) = warp::serve(routes)
        .try_bind_with_graceful_shutdown(addr, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .with_context(|| format!("Failed to bind {}", addr))?;

    log::info!(
        "Serving models from {} on http://{} (fit delay {}s)",
        config.model_dir.display(),
        bound,
        config.fit_delay_secs
    );
    server.await;
    log::info!("Server stopped");
    Ok(())
}
