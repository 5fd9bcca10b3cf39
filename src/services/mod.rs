// Coupon lifecycle: public read path and admin write path
pub mod coupons;

// Image metadata plus binary content on the local filesystem
pub mod images;

// Admin principals: credential checks and startup bootstrap
pub mod admins;

pub use admins::AdminService;
pub use coupons::CouponService;
pub use images::{ImageContent, ImageService, UploadedFile};
