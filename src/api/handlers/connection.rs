use axum::{extract::State, Json};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::api::middleware::AppError;
use crate::config::Config;
use crate::services::remote::mask_credentials;
use crate::services::MirrorService;

/// Application state
#[derive(Clone)]
pub struct AppState {
    /// One service per process; the mutex keeps mirror, query and edit calls from overlapping
    pub service: Arc<Mutex<MirrorService>>,
    pub config: Config,
}

impl AppState {
    pub fn new(service: MirrorService, config: Config) -> Self {
        Self {
            service: Arc::new(Mutex::new(service)),
            config,
        }
    }
}

/// Open the remote connection (no-op when already open)
pub async fn connect_remote(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut service = state.service.lock().await;
    let descriptor = mask_credentials(service.connections().descriptor());
    tracing::info!("Connecting to remote source: {}", descriptor);

    service.open_remote().await?;

    Ok(Json(serde_json::json!({
        "connected": service.is_remote_open(),
        "remote": descriptor,
    })))
}
