//! API module for the Video Quiz API
//!
//! REST endpoints for accounts and quizzes.

use anyhow::Result;
use tracing::info;

use crate::config::Config;
use crate::processing::QuizPipeline;
use crate::store::Store;

pub mod handlers;
pub mod models;
pub mod server;
pub mod session;

pub use server::{build_router, AppState};

/// API server owning the shared application state
pub struct ApiServer {
    state: AppState,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(store: Store, pipeline: QuizPipeline, config: Config) -> Self {
        Self {
            state: AppState::new(store, pipeline, config),
        }
    }

    /// Start the API server
    pub async fn start(self) -> Result<()> {
        info!("🚀 Starting API server on port {}", self.state.config.server.port);
        server::start_http_server(self.state).await
    }
}
