pub mod admin;
pub mod coupon;
pub mod image;
