#![allow(dead_code)]

use std::path::PathBuf;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use restaurant_coupons::{app_router, auth::ADMIN_ROLE, config::AppConfig, db, storage::LocalImageStorage, AppState};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "kitchen-secret-42";

const MULTIPART_BOUNDARY: &str = "coupon-test-boundary";

/// Helper harness running the full router against a migrated SQLite file in a temp dir.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    token: String,
    pub upload_dir: PathBuf,
    _dir: TempDir,
}

impl TestApp {
    /// Construct a new test application with fresh database state and an admin account.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Like [`TestApp::new`], letting the caller adjust the configuration first.
    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let dir = TempDir::new().expect("temp dir for test app");
        let db_file = dir.path().join("coupons_test.db");
        let upload_dir = dir.path().join("uploads");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_file.display()),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.upload_dir = upload_dir.to_string_lossy().into_owned();
        adjust(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let storage = LocalImageStorage::init(&upload_dir)
            .await
            .expect("image storage for tests");
        let state = AppState::new(std::sync::Arc::new(pool), cfg, storage);

        state
            .admins
            .ensure_admin(ADMIN_USERNAME, "admin@restaurant.com", ADMIN_PASSWORD)
            .await
            .expect("bootstrap admin for tests");
        let token = state
            .auth
            .issue_token(ADMIN_USERNAME, ADMIN_ROLE)
            .expect("admin token for tests");

        Self {
            router: app_router(state.clone()),
            state,
            token,
            upload_dir,
            _dir: dir,
        }
    }

    /// Bearer token of the bootstrapped admin.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        self.send(builder.body(body).expect("failed to build request"))
            .await
    }

    /// Convenience helper for admin JSON requests.
    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response {
        self.request(method, uri, body, Some(self.token())).await
    }

    /// Multipart upload of one file part plus an optional description part.
    pub async fn upload_image(
        &self,
        file_name: &str,
        content_type: &str,
        content: &[u8],
        description: Option<&str>,
        token: Option<&str>,
    ) -> Response {
        let mut payload = Vec::new();
        payload.extend_from_slice(
            format!(
                "--{MULTIPART_BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        payload.extend_from_slice(content);
        payload.extend_from_slice(b"\r\n");
        if let Some(text) = description {
            payload.extend_from_slice(
                format!(
                    "--{MULTIPART_BOUNDARY}\r\nContent-Disposition: form-data; name=\"description\"\r\n\r\n{text}\r\n"
                )
                .as_bytes(),
            );
        }
        payload.extend_from_slice(format!("--{MULTIPART_BOUNDARY}--\r\n").as_bytes());

        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/images")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
            );
        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        self.send(builder.body(Body::from(payload)).expect("failed to build upload request"))
            .await
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

pub async fn response_bytes(response: Response) -> Vec<u8> {
    body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes")
        .to_vec()
}
