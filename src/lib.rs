//! Restaurant Coupons API Library
//!
//! Discount coupons with optional images for a restaurant: public reads of the
//! currently active coupons, admin management behind a bearer token, and image
//! uploads stored on the local filesystem.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod dto;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod health;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod repositories;
pub mod services;
pub mod storage;
pub mod tracing;

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    middleware::Next,
    response::Response,
    routing::get,
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use utoipa::ToSchema;

use crate::auth::{AuthConfig, AuthService};
use crate::config::AppConfig;
use crate::repositories::{SeaOrmAdminRepository, SeaOrmCouponRepository, SeaOrmImageRepository};
use crate::services::{AdminService, CouponService, ImageService};
use crate::storage::LocalImageStorage;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub auth: Arc<AuthService>,
    pub coupons: CouponService,
    pub images: ImageService,
    pub admins: AdminService,
}

impl AppState {
    /// Wires the sea-orm repositories and the image storage into the services.
    pub fn new(db: Arc<DatabaseConnection>, config: AppConfig, storage: LocalImageStorage) -> Self {
        let coupon_repo = Arc::new(SeaOrmCouponRepository::new(db.clone()));
        let image_repo = Arc::new(SeaOrmImageRepository::new(db.clone()));
        let admin_repo = Arc::new(SeaOrmAdminRepository::new(db.clone()));
        let auth = Arc::new(AuthService::new(AuthConfig::from(&config)));

        Self {
            coupons: CouponService::new(coupon_repo),
            images: ImageService::new(image_repo, storage),
            admins: AdminService::new(admin_repo),
            auth,
            config: Arc::new(config),
            db,
        }
    }
}

// Common response wrapper
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Envelope without a payload, returned by deletes.
#[derive(Serialize, ToSchema)]
#[allow(dead_code)]
pub struct MessageResponse {
    success: bool,
    #[schema(example = "Coupon deleted successfully")]
    message: String,
    meta: ResponseMeta,
}

impl<T> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            meta: ResponseMeta::capture(),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            meta: ResponseMeta::capture(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            meta: ResponseMeta::capture(),
        }
    }

    pub fn failure_with(message: impl Into<String>, data: T) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: Some(data),
            meta: ResponseMeta::capture(),
        }
    }
}

/// Makes the token service reachable from `auth_middleware` on every request.
async fn inject_auth_service(
    State(auth): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    request.extensions_mut().insert(auth);
    next.run(request).await
}

/// Full application router: `/api`, `/health`, Swagger UI and the shared layers.
///
/// CORS is left to the caller since it depends on the deployment environment.
pub fn app_router(state: AppState) -> Router {
    let health_state = Arc::new(health::HealthState::new(
        state.db.clone(),
        state.config.upload_dir.clone(),
    ));

    Router::<AppState>::new()
        .route("/", get(|| async { "restaurant-coupons up" }))
        .nest("/api", handlers::api_routes())
        .nest("/health", health::health_routes(health_state))
        .merge(openapi::swagger_ui())
        // Uploads are the largest bodies accepted anywhere
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(crate::tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(axum::middleware::from_fn_with_state(
            state.auth.clone(),
            inject_auth_service,
        ))
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("Coupon retrieved successfully", 7)
            })
            .await;

        assert!(response.success);
        assert_eq!(response.data, Some(7));
        assert_eq!(response.meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&response.meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn failure_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-err"), async {
                ApiResponse::<()>::failure("oops")
            })
            .await;

        assert!(!response.success);
        assert_eq!(response.meta.request_id.as_deref(), Some("meta-err"));
        assert!(!response.meta.timestamp.is_empty());
    }

    #[test]
    fn message_only_response_omits_data() {
        let json = serde_json::to_value(ApiResponse::<()>::message("Coupon deleted successfully"))
            .unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Coupon deleted successfully");
        assert!(json.get("data").is_none());
        assert!(json["meta"].get("requestId").is_none());
    }
}
