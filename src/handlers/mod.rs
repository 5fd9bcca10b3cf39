pub mod common;
pub mod coupons;
pub mod images;

use axum::Router;

use crate::auth::{self, AuthRouterExt, ADMIN_ROLE};
use crate::AppState;

/// Every `/api` route: public coupon reads, images, login, and the ADMIN-only coupon writes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(coupons::public_routes())
        .merge(images::routes())
        .nest("/admin", coupons::admin_routes().with_role(ADMIN_ROLE))
        .nest("/auth", auth::auth_routes())
}
