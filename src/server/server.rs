use std::error::Error;
use std::time::Duration;
use tokio::net::TcpListener;
use axum::{Router, routing::{get, post}};
use tracing::info;

use crate::manager::SessionManager;
use super::routes::{self, AppState};

/// API server exposing the session manager over HTTP
pub struct ApiServer {
    state: AppState,
    host: String,
    port: u16,
}

impl ApiServer {
    /// `request_timeout_secs` of 0 disables the inference deadline.
    pub fn new(manager: SessionManager, host: String, port: u16, request_timeout_secs: u64) -> Self {
        info!("Creating new API server on {}:{}", host, port);
        let request_timeout = (request_timeout_secs > 0).then(|| Duration::from_secs(request_timeout_secs));
        Self {
            state: AppState { manager, request_timeout },
            host,
            port,
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(routes::health_check))
            .route("/api/v1/init", post(routes::init_model))
            .route("/api/v1/infer", post(routes::run_inference))
            .route("/api/v1/status", get(routes::get_status))
            .with_state(self.state.clone())
    }

    pub async fn start(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let app = self.router();

        info!("Starting server on {}:{}", self.host, self.port);
        let listener = TcpListener::bind((self.host.as_str(), self.port)).await?;

        info!("Server started successfully");
        axum::serve(listener, app).await?;
        Ok(())
    }
}
