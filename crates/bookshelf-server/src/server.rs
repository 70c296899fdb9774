use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use bookshelf_actors::ActorSystem;
use bookshelf_store::{BackendFactory, FileBackendFactory, MemoryBackendFactory};

use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;

/// Bookshelf HTTP server.
pub struct BookshelfServer {
    config: ServerConfig,
}

impl BookshelfServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Pick the storage backend the configuration asks for.
    pub fn backend_factory(&self) -> ServerResult<Arc<dyn BackendFactory>> {
        match &self.config.data_dir {
            Some(dir) => {
                info!(data_dir = %dir.display(), "using file-backed storage");
                Ok(Arc::new(FileBackendFactory::new(dir.clone())?))
            }
            None => {
                info!("using in-memory storage");
                Ok(Arc::new(MemoryBackendFactory))
            }
        }
    }

    /// Start the actors and build the router (useful for testing).
    ///
    /// Must be called from within a Tokio runtime.
    pub fn router(&self) -> ServerResult<axum::Router> {
        let system = ActorSystem::new(self.backend_factory()?, self.config.actor_config())?;
        let dispatcher = Dispatcher::new(Arc::new(system));
        Ok(build_router(dispatcher, self.config.cors_max_age_secs))
    }

    /// Serve requests until Ctrl-C.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router()?;
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("Bookshelf server listening on {}", self.config.bind_addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(e) => {
            tracing::warn!(error = %e, "cannot listen for Ctrl-C; running until killed");
            std::future::pending::<()>().await;
        }
    }
}
