/// `GET /health` (public)
///
/// Always answers 200. A storage backend that fails its ping turns the
/// report into `{"status": "degraded", "database": "disconnected"}`.

use crate::app::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageStatus {
    Connected,
    Disconnected,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ServiceStatus,

    pub version: String,

    pub database: StorageStatus,
}

impl HealthResponse {
    fn from_storage(database: StorageStatus) -> Self {
        let status = match database {
            StorageStatus::Connected => ServiceStatus::Healthy,
            StorageStatus::Disconnected => ServiceStatus::Degraded,
        };

        Self {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            database,
        }
    }
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.store.ping().await {
        Ok(()) => StorageStatus::Connected,
        Err(e) => {
            tracing::warn!(error = %e, "Storage ping failed");
            StorageStatus::Disconnected
        }
    };

    Json(HealthResponse::from_storage(database))
}
