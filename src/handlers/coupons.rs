use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::info;

use super::common::{EntityId, JsonBody, PageParams, Pagination, ValidatedJson};
use crate::{
    auth::AuthUser,
    dto::{BaseUrl, CouponDetail, CouponSummary, CreateCouponRequest, UpdateCouponRequest},
    errors::{ErrorResponse, ServiceError},
    repositories::Page,
    ApiResponse, AppState, MessageResponse,
};

/// Public read-only coupon routes
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/coupons", get(list_active_coupons))
        .route("/coupons/active", get(list_all_active_coupons))
        .route("/coupons/:id", get(get_active_coupon))
}

/// Admin coupon routes; the caller wraps them with the ADMIN role check
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/coupons", get(list_all_coupons).post(create_coupon))
        .route(
            "/coupons/:id",
            get(get_coupon).put(update_coupon).delete(delete_coupon),
        )
}

#[utoipa::path(
    get,
    path = "/api/coupons",
    summary = "List active coupons",
    description = "Coupons that are switched on and whose validity window contains the current time",
    params(PageParams),
    responses(
        (status = 200, description = "Coupons retrieved successfully", body = ApiResponse<Page<CouponSummary>>),
        (status = 400, description = "Invalid pagination or sort parameters", body = ErrorResponse)
    ),
    tag = "coupons"
)]
pub async fn list_active_coupons(
    State(state): State<AppState>,
    Pagination(page): Pagination,
    base: BaseUrl,
) -> Result<Json<ApiResponse<Page<CouponSummary>>>, ServiceError> {
    let coupons = state.coupons.list_active(page, &base).await?;
    Ok(Json(ApiResponse::success(
        "Coupons retrieved successfully",
        coupons,
    )))
}

#[utoipa::path(
    get,
    path = "/api/coupons/active",
    summary = "List every active coupon",
    description = "All currently active coupons as one unpaged list ordered by id",
    responses(
        (status = 200, description = "Coupons retrieved successfully", body = ApiResponse<Vec<CouponSummary>>)
    ),
    tag = "coupons"
)]
pub async fn list_all_active_coupons(
    State(state): State<AppState>,
    base: BaseUrl,
) -> Result<Json<ApiResponse<Vec<CouponSummary>>>, ServiceError> {
    let coupons = state.coupons.list_all_active(&base).await?;
    Ok(Json(ApiResponse::success(
        "Coupons retrieved successfully",
        coupons,
    )))
}

#[utoipa::path(
    get,
    path = "/api/coupons/{id}",
    summary = "Get active coupon",
    params(("id" = i64, Path, description = "Coupon id")),
    responses(
        (status = 200, description = "Coupon retrieved successfully", body = ApiResponse<CouponDetail>),
        (status = 404, description = "No currently active coupon with this id", body = ErrorResponse)
    ),
    tag = "coupons"
)]
pub async fn get_active_coupon(
    State(state): State<AppState>,
    EntityId(id): EntityId,
    base: BaseUrl,
) -> Result<Json<ApiResponse<CouponDetail>>, ServiceError> {
    let coupon = state.coupons.get_active_by_id(id, &base).await?;
    Ok(Json(ApiResponse::success(
        "Coupon retrieved successfully",
        coupon,
    )))
}

#[utoipa::path(
    get,
    path = "/api/admin/coupons",
    summary = "List all coupons",
    description = "Every coupon regardless of its active flag or validity window",
    params(PageParams),
    responses(
        (status = 200, description = "Coupons retrieved successfully", body = ApiResponse<Page<CouponSummary>>),
        (status = 400, description = "Invalid pagination or sort parameters", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "admin-coupons"
)]
pub async fn list_all_coupons(
    State(state): State<AppState>,
    Pagination(page): Pagination,
    base: BaseUrl,
) -> Result<Json<ApiResponse<Page<CouponSummary>>>, ServiceError> {
    let coupons = state.coupons.list_all(page, &base).await?;
    Ok(Json(ApiResponse::success(
        "Coupons retrieved successfully",
        coupons,
    )))
}

#[utoipa::path(
    get,
    path = "/api/admin/coupons/{id}",
    summary = "Get coupon",
    description = "Returns the coupon even when it is inactive or outside its validity window",
    params(("id" = i64, Path, description = "Coupon id")),
    responses(
        (status = 200, description = "Coupon retrieved successfully", body = ApiResponse<CouponDetail>),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Coupon not found", body = ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "admin-coupons"
)]
pub async fn get_coupon(
    State(state): State<AppState>,
    EntityId(id): EntityId,
    base: BaseUrl,
) -> Result<Json<ApiResponse<CouponDetail>>, ServiceError> {
    let coupon = state.coupons.get_by_id(id, &base).await?;
    Ok(Json(ApiResponse::success(
        "Coupon retrieved successfully",
        coupon,
    )))
}

#[utoipa::path(
    post,
    path = "/api/admin/coupons",
    summary = "Create coupon",
    request_body = CreateCouponRequest,
    responses(
        (status = 201, description = "Coupon created successfully", body = ApiResponse<CouponDetail>),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Referenced image not found", body = ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "admin-coupons"
)]
pub async fn create_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    base: BaseUrl,
    // Validated by the service so missing fields are reported with the rest.
    JsonBody(request): JsonBody<CreateCouponRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CouponDetail>>), ServiceError> {
    let coupon = state.coupons.create(request, &base).await?;
    info!(coupon_id = coupon.id, admin = %user.username, "Coupon created via API");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Coupon created successfully", coupon)),
    ))
}

#[utoipa::path(
    put,
    path = "/api/admin/coupons/{id}",
    summary = "Update coupon",
    description = "Partial update: only fields present and non-null in the body are changed",
    params(("id" = i64, Path, description = "Coupon id")),
    request_body = UpdateCouponRequest,
    responses(
        (status = 200, description = "Coupon updated successfully", body = ApiResponse<CouponDetail>),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Coupon or referenced image not found", body = ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "admin-coupons"
)]
pub async fn update_coupon(
    State(state): State<AppState>,
    EntityId(id): EntityId,
    user: AuthUser,
    base: BaseUrl,
    ValidatedJson(request): ValidatedJson<UpdateCouponRequest>,
) -> Result<Json<ApiResponse<CouponDetail>>, ServiceError> {
    let coupon = state.coupons.update(id, request, &base).await?;
    info!(coupon_id = id, admin = %user.username, "Coupon updated via API");
    Ok(Json(ApiResponse::success(
        "Coupon updated successfully",
        coupon,
    )))
}

#[utoipa::path(
    delete,
    path = "/api/admin/coupons/{id}",
    summary = "Delete coupon",
    params(("id" = i64, Path, description = "Coupon id")),
    responses(
        (status = 200, description = "Coupon deleted successfully", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Coupon not found", body = ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "admin-coupons"
)]
pub async fn delete_coupon(
    State(state): State<AppState>,
    EntityId(id): EntityId,
    user: AuthUser,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state.coupons.delete(id).await?;
    info!(coupon_id = id, admin = %user.username, "Coupon deleted via API");
    Ok(Json(ApiResponse::message("Coupon deleted successfully")))
}
