use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

pub const OPENAPI_JSON_PATH: &str = "/api-docs/openapi.json";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Restaurant Coupons API",
        version = "0.1.0",
        description = r#"
# Restaurant Coupons API

Discount coupons and their images for a restaurant.

## Access

Reads are public. Coupon writes under `/api/admin` and image upload/delete need an
admin bearer token obtained from `POST /api/auth/login`:

```
Authorization: Bearer <token>
```

## Responses

Every JSON response uses one envelope:

```json
{
  "success": true,
  "message": "Coupons retrieved successfully",
  "data": { },
  "meta": { "requestId": "...", "timestamp": "2024-01-01T00:00:00Z" }
}
```

Validation failures return `"message": "Validation error"` with `data` mapping
each offending field to its message.

## Pagination

Coupon listings take `page` (zero-based), `size` (default 10, max 100),
`sortBy` and `direction` (`asc`/`desc`).
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "coupons", description = "Public coupon reads, active coupons only"),
        (name = "admin-coupons", description = "Coupon management for admins"),
        (name = "images", description = "Coupon images"),
        (name = "auth", description = "Admin login"),
        (name = "health", description = "Health check endpoints")
    ),
    paths(
        // Public coupons
        crate::handlers::coupons::list_active_coupons,
        crate::handlers::coupons::list_all_active_coupons,
        crate::handlers::coupons::get_active_coupon,

        // Admin coupons
        crate::handlers::coupons::list_all_coupons,
        crate::handlers::coupons::get_coupon,
        crate::handlers::coupons::create_coupon,
        crate::handlers::coupons::update_coupon,
        crate::handlers::coupons::delete_coupon,

        // Images
        crate::handlers::images::list_images,
        crate::handlers::images::get_image,
        crate::handlers::images::get_image_content,
        crate::handlers::images::upload_image,
        crate::handlers::images::delete_image,

        // Auth
        crate::auth::login_handler,

        // Health
        crate::health::health_check,
        crate::health::readiness_check,
    ),
    components(
        schemas(
            crate::dto::CouponSummary,
            crate::dto::CouponDetail,
            crate::dto::CreateCouponRequest,
            crate::dto::UpdateCouponRequest,
            crate::dto::ImageSummary,
            crate::dto::LoginRequest,
            crate::dto::LoginResponse,
            crate::handlers::images::ImageUploadForm,
            crate::health::HealthResponse,
            crate::ResponseMeta,
            crate::MessageResponse,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;

/// Registers the `Bearer` JWT scheme referenced by admin endpoints.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "Bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url(OPENAPI_JSON_PATH, ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from(OPENAPI_JSON_PATH).try_it_out_enabled(true))
}
