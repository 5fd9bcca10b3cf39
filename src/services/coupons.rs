use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::{
    dto::{
        coupon::ensure_window_order, BaseUrl, CouponDetail, CouponSummary, CreateCouponRequest,
        UpdateCouponRequest,
    },
    errors::ServiceError,
    entities::coupon,
    repositories::{CouponPatch, CouponRepository, Page, PageRequest},
};
use validator::Validate;

/// Coupon use cases for both the public read path and the admin write path.
#[derive(Clone)]
pub struct CouponService {
    coupons: Arc<dyn CouponRepository>,
}

impl CouponService {
    pub fn new(coupons: Arc<dyn CouponRepository>) -> Self {
        Self { coupons }
    }

    /// Lists coupons a customer may redeem right now.
    #[instrument(skip(self, base))]
    pub async fn list_active(
        &self,
        page: PageRequest,
        base: &BaseUrl,
    ) -> Result<Page<CouponSummary>, ServiceError> {
        let found = self.coupons.find_active(Utc::now(), page).await?;
        Ok(found.map(|c| CouponSummary::from_model(c, base)))
    }

    /// Every currently active coupon, unpaged, ordered by id.
    #[instrument(skip(self, base))]
    pub async fn list_all_active(&self, base: &BaseUrl) -> Result<Vec<CouponSummary>, ServiceError> {
        let found = self.coupons.find_all_active(Utc::now()).await?;
        Ok(found
            .into_iter()
            .map(|c| CouponSummary::from_model(c, base))
            .collect())
    }

    /// Admin listing: every coupon regardless of flag or window.
    #[instrument(skip(self, base))]
    pub async fn list_all(
        &self,
        page: PageRequest,
        base: &BaseUrl,
    ) -> Result<Page<CouponSummary>, ServiceError> {
        let found = self.coupons.find_all(page).await?;
        Ok(found.map(|c| CouponSummary::from_model(c, base)))
    }

    /// Public detail. Inactive, expired and not-yet-valid coupons read as missing.
    #[instrument(skip(self, base))]
    pub async fn get_active_by_id(
        &self,
        id: i64,
        base: &BaseUrl,
    ) -> Result<CouponDetail, ServiceError> {
        self.coupons
            .find_active_by_id(id, Utc::now())
            .await?
            .map(|c| CouponDetail::from_model(c, base))
            .ok_or_else(|| ServiceError::not_found("Coupon", id))
    }

    #[instrument(skip(self, base))]
    pub async fn get_by_id(&self, id: i64, base: &BaseUrl) -> Result<CouponDetail, ServiceError> {
        self.coupons
            .find_by_id(id)
            .await?
            .map(|c| CouponDetail::from_model(c, base))
            .ok_or_else(|| ServiceError::not_found("Coupon", id))
    }

    /// Stores a new coupon. A referenced image must exist when the row is written.
    #[instrument(skip(self, request, base))]
    pub async fn create(
        &self,
        request: CreateCouponRequest,
        base: &BaseUrl,
    ) -> Result<CouponDetail, ServiceError> {
        let new_coupon = request.into_new_coupon(Utc::now())?;
        let created = self.coupons.insert(new_coupon).await?;
        info!(coupon_id = created.id, name = %created.name, "Coupon created");
        Ok(CouponDetail::from_model(created, base))
    }

    /// Applies a partial update. Only non-null request fields overwrite stored values.
    #[instrument(skip(self, request, base))]
    pub async fn update(
        &self,
        id: i64,
        request: UpdateCouponRequest,
        base: &BaseUrl,
    ) -> Result<CouponDetail, ServiceError> {
        request.validate()?;

        let referenced_image = request.image_id;
        let patch: CouponPatch = Box::new(move |existing| apply_update(request, existing));
        let updated = self
            .coupons
            .update_with(id, referenced_image, patch)
            .await?;
        info!(coupon_id = updated.id, "Coupon updated");
        Ok(CouponDetail::from_model(updated, base))
    }

    /// The delete itself also fails with `NotFound` if the row vanished after the check.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        if !self.coupons.exists_by_id(id).await? {
            return Err(ServiceError::not_found("Coupon", id));
        }
        self.coupons.delete_by_id(id).await?;
        info!(coupon_id = id, "Coupon deleted");
        Ok(())
    }
}

/// Merges the patch and re-checks the window on the merged result.
fn apply_update(
    request: UpdateCouponRequest,
    existing: coupon::Model,
) -> Result<coupon::Model, ServiceError> {
    let merged = request.merge_into(existing, Utc::now());
    ensure_window_order(merged.valid_from, merged.valid_to)?;
    Ok(merged)
}
