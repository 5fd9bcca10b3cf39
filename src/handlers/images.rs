use axum::{
    body::Body,
    extract::{Multipart, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use tracing::{debug, info};
use utoipa::ToSchema;

use super::common::EntityId;
use crate::{
    auth::{AuthRouterExt, AuthUser, ADMIN_ROLE},
    dto::{BaseUrl, ImageSummary},
    errors::{ErrorResponse, ServiceError},
    services::UploadedFile,
    ApiResponse, AppState, MessageResponse,
};

/// Image routes: reads are public, upload and delete need the ADMIN role
pub fn routes() -> Router<AppState> {
    let public = Router::new()
        .route("/images", get(list_images))
        .route("/images/:id", get(get_image))
        .route("/images/:id/content", get(get_image_content));

    let admin = Router::new()
        .route("/images", post(upload_image))
        .route("/images/:id", delete(delete_image))
        .with_role(ADMIN_ROLE);

    public.merge(admin)
}

/// Multipart form accepted by the upload endpoint
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct ImageUploadForm {
    /// Image binary
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
    /// Optional free-text description
    description: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/images",
    summary = "List images",
    responses(
        (status = 200, description = "Images retrieved successfully", body = ApiResponse<Vec<ImageSummary>>)
    ),
    tag = "images"
)]
pub async fn list_images(
    State(state): State<AppState>,
    base: BaseUrl,
) -> Result<Json<ApiResponse<Vec<ImageSummary>>>, ServiceError> {
    let images = state.images.list(&base).await?;
    Ok(Json(ApiResponse::success(
        "Images retrieved successfully",
        images,
    )))
}

#[utoipa::path(
    get,
    path = "/api/images/{id}",
    summary = "Get image metadata",
    params(("id" = i64, Path, description = "Image id")),
    responses(
        (status = 200, description = "Image retrieved successfully", body = ApiResponse<ImageSummary>),
        (status = 404, description = "Image not found", body = ErrorResponse)
    ),
    tag = "images"
)]
pub async fn get_image(
    State(state): State<AppState>,
    EntityId(id): EntityId,
    base: BaseUrl,
) -> Result<Json<ApiResponse<ImageSummary>>, ServiceError> {
    let image = state.images.get_metadata(id, &base).await?;
    Ok(Json(ApiResponse::success(
        "Image retrieved successfully",
        image,
    )))
}

#[utoipa::path(
    get,
    path = "/api/images/{id}/content",
    summary = "Get image content",
    params(("id" = i64, Path, description = "Image id")),
    responses(
        (status = 200, description = "Image binary", content_type = "application/octet-stream", body = Vec<u8>),
        (status = 404, description = "Image or its file not found", body = ErrorResponse)
    ),
    tag = "images"
)]
pub async fn get_image_content(
    State(state): State<AppState>,
    EntityId(id): EntityId,
) -> Result<Response, ServiceError> {
    let content = state.images.load_content(id).await?;
    let disposition = HeaderValue::from_str(&format!(
        "inline; filename=\"{}\"",
        content.storage_key
    ))
    .map_err(|e| ServiceError::InternalError(format!("Invalid content disposition: {}", e)))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content.content_type)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from(content.bytes),
    )
        .into_response())
}

#[utoipa::path(
    post,
    path = "/api/images",
    summary = "Upload image",
    request_body(content = ImageUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Image uploaded successfully", body = ApiResponse<ImageSummary>),
        (status = 400, description = "Missing file or invalid file name", body = ErrorResponse),
        (status = 413, description = "Upload exceeds the maximum allowed size", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "images"
)]
pub async fn upload_image(
    State(state): State<AppState>,
    user: AuthUser,
    base: BaseUrl,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<ImageSummary>>), ServiceError> {
    let mut upload: Option<UploadedFile> = None;
    let mut description: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("file") => {
                let original_filename = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let content = field.bytes().await.map_err(multipart_error)?;
                upload = Some(UploadedFile {
                    content,
                    original_filename,
                    content_type,
                });
            }
            Some("description") => {
                description = Some(field.text().await.map_err(multipart_error)?);
            }
            other => debug!(field = ?other, "Ignoring unexpected multipart field"),
        }
    }

    let upload = upload.ok_or_else(|| ServiceError::BadRequest("File is required".to_string()))?;
    let image = state.images.store(upload, description, &base).await?;
    info!(image_id = image.id, admin = %user.username, "Image uploaded via API");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Image uploaded successfully", image)),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/images/{id}",
    summary = "Delete image",
    description = "Removes the file (tolerating its absence) and the metadata. Coupons referencing the image keep their imageId.",
    params(("id" = i64, Path, description = "Image id")),
    responses(
        (status = 200, description = "Image deleted successfully", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Image not found", body = ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "images"
)]
pub async fn delete_image(
    State(state): State<AppState>,
    EntityId(id): EntityId,
    user: AuthUser,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state.images.delete(id).await?;
    info!(image_id = id, admin = %user.username, "Image deleted via API");
    Ok(Json(ApiResponse::message("Image deleted successfully")))
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ServiceError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ServiceError::PayloadTooLarge("Upload exceeds the maximum allowed size".to_string());
    }
    ServiceError::BadRequest(format!("Invalid multipart request: {}", err.body_text()))
}
