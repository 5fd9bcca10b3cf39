use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use super::BaseUrl;
use crate::entities::coupon;
use crate::errors::{field_errors, ServiceError};
use crate::repositories::NewCoupon;

/// Largest value a `DECIMAL(10, 2)` column holds.
const MAX_DISCOUNT_VALUE: Decimal = dec!(99999999.99);

fn validate_name_not_blank(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Name is required".into());
        return Err(err);
    }
    Ok(())
}

fn validate_discount_value(value: &Decimal) -> Result<(), ValidationError> {
    let mut err = ValidationError::new("discount_value");
    if *value <= Decimal::ZERO {
        err.message = Some("Discount value must be positive".into());
        return Err(err);
    }
    if value.normalize().scale() > 2 {
        err.message = Some("Discount value cannot have more than 2 decimal places".into());
        return Err(err);
    }
    if *value > MAX_DISCOUNT_VALUE {
        err.message = Some("Discount value cannot exceed 99999999.99".into());
        return Err(err);
    }
    Ok(())
}

/// Body of `POST /api/admin/coupons`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCouponRequest {
    #[validate(
        custom = "validate_name_not_blank",
        length(max = 100, message = "Name cannot exceed 100 characters")
    )]
    #[schema(example = "10% Off")]
    pub name: Option<String>,

    #[validate(length(max = 500, message = "Description cannot exceed 500 characters"))]
    pub description: Option<String>,

    #[validate(custom = "validate_discount_value")]
    #[schema(value_type = String, example = "10.00")]
    pub discount_value: Option<Decimal>,

    pub valid_from: Option<DateTime<Utc>>,

    pub valid_to: Option<DateTime<Utc>>,

    #[validate(length(
        max = 1000,
        message = "Terms and conditions cannot exceed 1000 characters"
    ))]
    pub terms_and_conditions: Option<String>,

    /// Defaults to `true` when omitted.
    pub is_active: Option<bool>,

    /// Existing image to attach; must refer to a stored image.
    pub image_id: Option<i64>,
}

impl CreateCouponRequest {
    /// Validates the request and turns it into a row to insert, stamped with `now`.
    ///
    /// Missing mandatory fields are reported together with any other field errors.
    pub fn into_new_coupon(self, now: DateTime<Utc>) -> Result<NewCoupon, ServiceError> {
        let mut errors = self
            .validate()
            .err()
            .map(|e| field_errors(&e))
            .unwrap_or_default();
        let missing = [
            ("name", "Name is required", self.name.is_none()),
            ("discountValue", "Discount value is required", self.discount_value.is_none()),
            ("validFrom", "Valid from date is required", self.valid_from.is_none()),
            ("validTo", "Valid to date is required", self.valid_to.is_none()),
        ];
        for (field, message, absent) in missing {
            if absent {
                errors.insert(field.to_string(), message.to_string());
            }
        }
        let (Some(name), Some(discount_value), Some(valid_from), Some(valid_to)) =
            (self.name, self.discount_value, self.valid_from, self.valid_to)
        else {
            return Err(ServiceError::ValidationError(errors));
        };
        if !errors.is_empty() {
            return Err(ServiceError::ValidationError(errors));
        }
        ensure_window_order(valid_from, valid_to)?;

        Ok(NewCoupon {
            name: name.trim().to_string(),
            description: self.description,
            discount_value: discount_value.round_dp(2),
            valid_from,
            valid_to,
            terms_and_conditions: self.terms_and_conditions,
            is_active: self.is_active.unwrap_or(true),
            image_id: self.image_id,
            created_at: now,
        })
    }
}

/// Body of `PUT /api/admin/coupons/{id}`.
///
/// Every field is optional: absent or `null` fields leave the stored value untouched.
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCouponRequest {
    #[validate(
        custom = "validate_name_not_blank",
        length(max = 100, message = "Name cannot exceed 100 characters")
    )]
    pub name: Option<String>,

    #[validate(length(max = 500, message = "Description cannot exceed 500 characters"))]
    pub description: Option<String>,

    #[validate(custom = "validate_discount_value")]
    #[schema(value_type = Option<String>, example = "12.50")]
    pub discount_value: Option<Decimal>,

    pub valid_from: Option<DateTime<Utc>>,

    pub valid_to: Option<DateTime<Utc>>,

    #[validate(length(
        max = 1000,
        message = "Terms and conditions cannot exceed 1000 characters"
    ))]
    pub terms_and_conditions: Option<String>,

    pub is_active: Option<bool>,

    pub image_id: Option<i64>,
}

impl UpdateCouponRequest {
    /// Overlays the supplied fields onto `existing` and refreshes `updated_at`.
    ///
    /// This is the complete list of patchable fields; `id` and `created_at` never change.
    pub fn merge_into(self, existing: coupon::Model, now: DateTime<Utc>) -> coupon::Model {
        let mut merged = existing;
        if let Some(name) = self.name {
            merged.name = name.trim().to_string();
        }
        if let Some(description) = self.description {
            merged.description = Some(description);
        }
        if let Some(discount_value) = self.discount_value {
            merged.discount_value = discount_value.round_dp(2);
        }
        if let Some(valid_from) = self.valid_from {
            merged.valid_from = valid_from;
        }
        if let Some(valid_to) = self.valid_to {
            merged.valid_to = valid_to;
        }
        if let Some(terms) = self.terms_and_conditions {
            merged.terms_and_conditions = Some(terms);
        }
        if let Some(is_active) = self.is_active {
            merged.is_active = is_active;
        }
        if let Some(image_id) = self.image_id {
            merged.image_id = Some(image_id);
        }
        merged.updated_at = now;
        merged
    }
}

/// Rejects a validity window that ends before it starts. Equal instants are allowed.
pub fn ensure_window_order(
    valid_from: DateTime<Utc>,
    valid_to: DateTime<Utc>,
) -> Result<(), ServiceError> {
    if valid_to < valid_from {
        return Err(ServiceError::invalid_field(
            "validTo",
            "Valid to date must not be before valid from date",
        ));
    }
    Ok(())
}

/// Listing view of a coupon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CouponSummary {
    pub id: i64,
    pub name: String,
    #[schema(value_type = String, example = "10.00")]
    pub discount_value: Decimal,
    pub image_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl CouponSummary {
    pub fn from_model(model: coupon::Model, base: &BaseUrl) -> Self {
        Self {
            id: model.id,
            name: model.name,
            discount_value: money(model.discount_value),
            image_url: model.image_id.map(|id| base.image_content_url(id)),
            image_id: model.image_id,
        }
    }
}

/// Full view of a coupon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CouponDetail {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    #[schema(value_type = String, example = "10.00")]
    pub discount_value: Decimal,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub terms_and_conditions: Option<String>,
    pub is_active: bool,
    pub image_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CouponDetail {
    pub fn from_model(model: coupon::Model, base: &BaseUrl) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            discount_value: money(model.discount_value),
            valid_from: model.valid_from,
            valid_to: model.valid_to,
            terms_and_conditions: model.terms_and_conditions,
            is_active: model.is_active,
            image_url: model.image_id.map(|id| base.image_content_url(id)),
            image_id: model.image_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Normalizes a stored amount to two decimal places for display.
fn money(value: Decimal) -> Decimal {
    let mut value = value.round_dp(2);
    value.rescale(2);
    value
}
