//! Request and response records exchanged over HTTP, plus the derived views
//! the services hand back.

pub mod auth;
pub mod coupon;
pub mod image;

pub use auth::{LoginRequest, LoginResponse};
pub use coupon::{CouponDetail, CouponSummary, CreateCouponRequest, UpdateCouponRequest};
pub use image::ImageSummary;

/// Scheme and authority that public URLs are built from, e.g. `https://coupons.example.com`.
///
/// Never stored; handlers derive it from configuration or the serving request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(String);

impl BaseUrl {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self(base.trim_end_matches('/').to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Public URL serving the binary content of image `image_id`.
    pub fn image_content_url(&self, image_id: i64) -> String {
        format!("{}/api/images/{}/content", self.0, image_id)
    }
}
