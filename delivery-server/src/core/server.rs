//! HTTP server lifecycle

use std::net::SocketAddr;
use std::time::Duration;

use crate::core::{BackgroundTasks, Config, Result, ServerState};

/// Grace period for background tasks on shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

pub struct Server {
    config: Config,
    state: Option<ServerState>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: None,
        }
    }

    /// Serve an already wired state
    pub fn with_state(config: Config, state: ServerState) -> Self {
        Self {
            config,
            state: Some(state),
        }
    }

    /// Serve until Ctrl-C, then stop background tasks
    pub async fn run(&self) -> Result<()> {
        let state = match &self.state {
            Some(s) => s.clone(),
            None => ServerState::initialize(&self.config).await?,
        };

        let mut tasks = BackgroundTasks::new();
        state.start_background_tasks(&mut tasks);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(%addr, environment = %self.config.environment, "Delivery server listening");

        let app = crate::api::router(state);
        let shutdown = tasks.shutdown_token();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => tracing::info!("Shutdown signal received"),
                    _ = shutdown.cancelled() => {}
                }
            })
            .await?;

        tasks.shutdown(SHUTDOWN_GRACE).await;
        Ok(())
    }
}
