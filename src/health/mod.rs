/*!
 * # Health Check Module
 *
 * - Liveness (`/health`) - the process is up and serving requests
 * - Readiness (`/health/ready`) - the database answers a ping and the image
 *   storage directory is present
 */

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, error};
use utoipa::ToSchema;

/// Basic health status
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Down,
}

/// Health report returned by both endpoints
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
    /// Per dependency status, readiness only
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    #[schema(value_type = Object)]
    pub checks: BTreeMap<String, HealthStatus>,
}

/// Health check state
#[derive(Clone)]
pub struct HealthState {
    pub db_pool: Arc<DatabaseConnection>,
    pub upload_dir: PathBuf,
    pub start_time: SystemTime,
}

impl HealthState {
    pub fn new(db_pool: Arc<DatabaseConnection>, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            db_pool,
            upload_dir: upload_dir.into(),
            start_time: SystemTime::now(),
        }
    }

    /// Calculate system uptime
    pub fn uptime(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.start_time)
            .unwrap_or(Duration::from_secs(0))
            .as_secs()
    }

    fn report(&self, status: HealthStatus, checks: BTreeMap<String, HealthStatus>) -> HealthResponse {
        HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.uptime(),
            timestamp: Utc::now(),
            checks,
        }
    }
}

/// Liveness check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse)),
    tag = "health"
)]
pub async fn health_check(State(state): State<Arc<HealthState>>) -> Json<HealthResponse> {
    debug!("Health check endpoint called");
    Json(state.report(HealthStatus::Up, BTreeMap::new()))
}

/// Readiness check endpoint
#[utoipa::path(
    get,
    path = "/health/ready",
    responses(
        (status = 200, description = "Dependencies reachable", body = HealthResponse),
        (status = 503, description = "A dependency is down", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn readiness_check(
    State(state): State<Arc<HealthState>>,
) -> (StatusCode, Json<HealthResponse>) {
    debug!("Readiness check endpoint called");
    let mut checks = BTreeMap::new();

    let database = match state.db_pool.ping().await {
        Ok(()) => HealthStatus::Up,
        Err(e) => {
            error!("Database health check failed: {}", e);
            HealthStatus::Down
        }
    };
    checks.insert("database".to_string(), database);

    let storage = if tokio::fs::metadata(&state.upload_dir)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
    {
        HealthStatus::Up
    } else {
        error!(dir = %state.upload_dir.display(), "Image storage directory unavailable");
        HealthStatus::Down
    };
    checks.insert("storage".to_string(), storage);

    let overall = if checks.values().all(|s| *s == HealthStatus::Up) {
        HealthStatus::Up
    } else {
        HealthStatus::Down
    };
    let code = match overall {
        HealthStatus::Up => StatusCode::OK,
        HealthStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
    };

    (code, Json(state.report(overall, checks)))
}

/// Creates router with health check endpoints, to be nested under `/health`
pub fn health_routes<S>(state: Arc<HealthState>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(readiness_check))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{establish_connection_with_config, DbConfig};
    use tempfile::TempDir;

    async fn state(upload_dir: PathBuf) -> Arc<HealthState> {
        let db = establish_connection_with_config(&DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        })
        .await
        .unwrap();
        Arc::new(HealthState::new(Arc::new(db), upload_dir))
    }

    #[tokio::test]
    async fn ready_when_database_and_storage_are_available() {
        let dir = TempDir::new().unwrap();
        let (code, Json(report)) = readiness_check(State(state(dir.path().to_path_buf()).await)).await;

        assert_eq!(code, StatusCode::OK);
        assert_eq!(report.status, HealthStatus::Up);
        assert_eq!(report.checks["database"], HealthStatus::Up);
    }

    #[tokio::test]
    async fn not_ready_without_storage_directory() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing");
        let (code, Json(report)) = readiness_check(State(state(missing).await)).await;

        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(report.checks["storage"], HealthStatus::Down);
    }
}
