use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set,
    TransactionTrait,
};
use std::sync::Arc;

use super::{BaseRepository, CouponSortField, Page, PageRequest, Repository, SortDirection};
use crate::entities::coupon::{self, Column, Entity as Coupon};
use crate::entities::image::Entity as Image;
use crate::errors::ServiceError;

/// Change applied to a stored coupon inside the update transaction.
pub type CouponPatch =
    Box<dyn FnOnce(coupon::Model) -> Result<coupon::Model, ServiceError> + Send>;

/// Field values for a coupon that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCoupon {
    pub name: String,
    pub description: Option<String>,
    pub discount_value: Decimal,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub terms_and_conditions: Option<String>,
    pub is_active: bool,
    pub image_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CouponRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<coupon::Model>, ServiceError>;

    async fn find_all(&self, page: PageRequest) -> Result<Page<coupon::Model>, ServiceError>;

    /// Coupons active at `now`, one page at a time.
    async fn find_active(
        &self,
        now: DateTime<Utc>,
        page: PageRequest,
    ) -> Result<Page<coupon::Model>, ServiceError>;

    /// Every coupon active at `now`, ordered by id.
    async fn find_all_active(&self, now: DateTime<Utc>)
        -> Result<Vec<coupon::Model>, ServiceError>;

    async fn find_active_by_id(
        &self,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<coupon::Model>, ServiceError>;

    async fn exists_by_id(&self, id: i64) -> Result<bool, ServiceError>;

    /// Stores a new coupon. A referenced image is checked in the same transaction
    /// and its absence fails with `ReferenceNotFound`.
    async fn insert(&self, coupon: NewCoupon) -> Result<coupon::Model, ServiceError>;

    /// Loads the coupon, checks `referenced_image` and writes `patch`'s result
    /// in one transaction. Fails with `NotFound` if the coupon does not exist.
    async fn update_with(
        &self,
        id: i64,
        referenced_image: Option<i64>,
        patch: CouponPatch,
    ) -> Result<coupon::Model, ServiceError>;

    /// Removes the row. Fails with `NotFound` if nothing was deleted.
    async fn delete_by_id(&self, id: i64) -> Result<(), ServiceError>;
}

/// Repository for coupon operations
#[derive(Debug, Clone)]
pub struct SeaOrmCouponRepository {
    base: BaseRepository,
}

impl SeaOrmCouponRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    fn active_at(now: DateTime<Utc>) -> Condition {
        Condition::all()
            .add(Column::IsActive.eq(true))
            .add(Column::ValidFrom.lte(now))
            .add(Column::ValidTo.gte(now))
    }

    fn sorted(select: Select<Coupon>, request: &PageRequest) -> Select<Coupon> {
        let column = match request.sort_by {
            CouponSortField::Id => Column::Id,
            CouponSortField::Name => Column::Name,
            CouponSortField::DiscountValue => Column::DiscountValue,
            CouponSortField::ValidFrom => Column::ValidFrom,
            CouponSortField::ValidTo => Column::ValidTo,
            CouponSortField::CreatedAt => Column::CreatedAt,
            CouponSortField::UpdatedAt => Column::UpdatedAt,
        };
        let order = match request.direction {
            SortDirection::Asc => Order::Asc,
            SortDirection::Desc => Order::Desc,
        };

        let select = select.order_by(column, order);
        // Tie-break on id so pages are stable.
        if request.sort_by == CouponSortField::Id {
            select
        } else {
            select.order_by_asc(Column::Id)
        }
    }
}

#[async_trait]
impl CouponRepository for SeaOrmCouponRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<coupon::Model>, ServiceError> {
        Ok(Coupon::find_by_id(id).one(self.base.get_db()).await?)
    }

    async fn find_all(&self, page: PageRequest) -> Result<Page<coupon::Model>, ServiceError> {
        let select = Self::sorted(Coupon::find(), &page);
        self.base.fetch_page(select, &page).await
    }

    async fn find_active(
        &self,
        now: DateTime<Utc>,
        page: PageRequest,
    ) -> Result<Page<coupon::Model>, ServiceError> {
        let select = Self::sorted(Coupon::find().filter(Self::active_at(now)), &page);
        self.base.fetch_page(select, &page).await
    }

    async fn find_all_active(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<coupon::Model>, ServiceError> {
        Ok(Coupon::find()
            .filter(Self::active_at(now))
            .order_by_asc(Column::Id)
            .all(self.base.get_db())
            .await?)
    }

    async fn find_active_by_id(
        &self,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<coupon::Model>, ServiceError> {
        Ok(Coupon::find_by_id(id)
            .filter(Self::active_at(now))
            .one(self.base.get_db())
            .await?)
    }

    async fn exists_by_id(&self, id: i64) -> Result<bool, ServiceError> {
        let count = Coupon::find_by_id(id).count(self.base.get_db()).await?;
        Ok(count > 0)
    }

    async fn insert(&self, coupon: NewCoupon) -> Result<coupon::Model, ServiceError> {
        let txn = self.base.get_db().begin().await?;
        if let Some(image_id) = coupon.image_id {
            ensure_image_exists(&txn, image_id).await?;
        }

        let active = coupon::ActiveModel {
            name: Set(coupon.name),
            description: Set(coupon.description),
            discount_value: Set(coupon.discount_value),
            valid_from: Set(coupon.valid_from),
            valid_to: Set(coupon.valid_to),
            terms_and_conditions: Set(coupon.terms_and_conditions),
            is_active: Set(coupon.is_active),
            image_id: Set(coupon.image_id),
            created_at: Set(coupon.created_at),
            updated_at: Set(coupon.created_at),
            ..Default::default()
        };
        let created = active.insert(&txn).await?;
        txn.commit().await?;
        Ok(created)
    }

    async fn update_with(
        &self,
        id: i64,
        referenced_image: Option<i64>,
        patch: CouponPatch,
    ) -> Result<coupon::Model, ServiceError> {
        let txn = self.base.get_db().begin().await?;
        let existing = Coupon::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Coupon", id))?;
        if let Some(image_id) = referenced_image {
            ensure_image_exists(&txn, image_id).await?;
        }

        let active: coupon::ActiveModel = patch(existing)?.into();
        let updated = match active.reset_all().update(&txn).await {
            Ok(updated) => updated,
            Err(DbErr::RecordNotUpdated) => return Err(ServiceError::not_found("Coupon", id)),
            Err(e) => return Err(e.into()),
        };
        txn.commit().await?;
        Ok(updated)
    }

    async fn delete_by_id(&self, id: i64) -> Result<(), ServiceError> {
        let result = Coupon::delete_by_id(id).exec(self.base.get_db()).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::not_found("Coupon", id));
        }
        Ok(())
    }
}

/// Holds a shared lock on the image row until the surrounding transaction ends.
async fn ensure_image_exists<C>(conn: &C, image_id: i64) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let found = Image::find_by_id(image_id).lock_shared().one(conn).await?;
    if found.is_none() {
        return Err(ServiceError::ReferenceNotFound(format!(
            "Image not found with id: {}",
            image_id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::{migrated_sqlite, ImageRepository, NewImage, SeaOrmImageRepository};
    use assert_matches::assert_matches;
    use chrono::{Duration, SubsecRound};
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn new_coupon(
        name: &str,
        is_active: bool,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> NewCoupon {
        NewCoupon {
            name: name.into(),
            description: None,
            discount_value: dec!(5.00),
            valid_from: from,
            valid_to: to,
            terms_and_conditions: None,
            is_active,
            image_id: None,
            created_at: from,
        }
    }

    fn rename_to_dinner(mut model: coupon::Model) -> Result<coupon::Model, ServiceError> {
        model.name = "Dinner".into();
        Ok(model)
    }

    async fn stored_image(db: Arc<DatabaseConnection>) -> i64 {
        SeaOrmImageRepository::new(db)
            .insert(NewImage {
                file_name: "soup.png".into(),
                file_path: "6f1c.png".into(),
                file_type: Some("image/png".into()),
                file_size: Some(4),
                description: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn active_query_agrees_with_model_predicate() {
        let dir = TempDir::new().unwrap();
        let repo = SeaOrmCouponRepository::new(migrated_sqlite(&dir).await);
        let now = Utc::now().trunc_subsecs(0);
        let day = Duration::days(1);

        for coupon in [
            new_coupon("current", true, now - day, now + day),
            new_coupon("switched off", false, now - day, now + day),
            new_coupon("expired on", true, now - day * 3, now - day),
            new_coupon("expired off", false, now - day * 3, now - day),
            new_coupon("upcoming", true, now + day, now + day * 3),
            new_coupon("starts now", true, now, now + day),
            new_coupon("ends now", true, now - day, now),
        ] {
            repo.insert(coupon).await.unwrap();
        }

        let everything = repo.find_all(PageRequest::new(0, 100)).await.unwrap();
        let expected: Vec<i64> = everything
            .content
            .iter()
            .filter(|c| c.is_active_at(now))
            .map(|c| c.id)
            .collect();
        let active: Vec<i64> = repo
            .find_all_active(now)
            .await
            .unwrap()
            .iter()
            .map(|c| c.id)
            .collect();

        assert_eq!(everything.total_elements, 7);
        assert_eq!(expected.len(), 3);
        assert_eq!(active, expected);

        let paged = repo.find_active(now, PageRequest::new(0, 2)).await.unwrap();
        assert_eq!(paged.total_elements, 3);
        assert_eq!(paged.total_pages, 2);
    }

    #[tokio::test]
    async fn insert_with_unknown_image_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let db = migrated_sqlite(&dir).await;
        let repo = SeaOrmCouponRepository::new(db.clone());
        let now = Utc::now();

        let mut coupon = new_coupon("with image", true, now, now + Duration::days(1));
        coupon.image_id = Some(41);
        let err = repo.insert(coupon.clone()).await.unwrap_err();
        assert_matches!(err, ServiceError::ReferenceNotFound(msg) if msg == "Image not found with id: 41");
        assert_eq!(repo.find_all(PageRequest::new(0, 10)).await.unwrap().total_elements, 0);

        let image_id = stored_image(db).await;
        coupon.image_id = Some(image_id);
        let created = repo.insert(coupon).await.unwrap();
        assert_eq!(created.image_id, Some(image_id));
    }

    #[tokio::test]
    async fn update_with_rolls_back_on_rejected_patch_or_missing_image() {
        let dir = TempDir::new().unwrap();
        let repo = SeaOrmCouponRepository::new(migrated_sqlite(&dir).await);
        let now = Utc::now();
        let created = repo
            .insert(new_coupon("Lunch", true, now, now + Duration::days(1)))
            .await
            .unwrap();

        let err = repo
            .update_with(
                created.id,
                None,
                Box::new(|_: coupon::Model| -> Result<coupon::Model, ServiceError> {
                    Err(ServiceError::invalid_field("validTo", "rejected"))
                }),
            )
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));

        let err = repo
            .update_with(
                created.id,
                Some(99),
                Box::new(rename_to_dinner),
            )
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ReferenceNotFound(_));
        assert_eq!(repo.find_by_id(created.id).await.unwrap(), Some(created.clone()));

        let updated = repo
            .update_with(
                created.id,
                None,
                Box::new(rename_to_dinner),
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Dinner");
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn writes_to_missing_coupon_are_not_found() {
        let dir = TempDir::new().unwrap();
        let repo = SeaOrmCouponRepository::new(migrated_sqlite(&dir).await);

        let err = repo
            .update_with(5, None, Box::new(rename_to_dinner))
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::NotFound(msg) if msg == "Coupon not found with id: 5");

        assert!(!repo.exists_by_id(5).await.unwrap());
        let err = repo.delete_by_id(5).await.unwrap_err();
        assert_matches!(err, ServiceError::NotFound(_));
    }
}
