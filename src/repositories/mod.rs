//! Storage port for coupons, images and admin principals.
//!
//! Each concern is a trait so services can be exercised against mocks; the
//! `SeaOrm*` types are the relational adapters used in production.

use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait, Select};
use serde::Serialize;
use std::sync::Arc;
use strum::{Display, EnumString};
use utoipa::ToSchema;

use crate::errors::ServiceError;

pub mod admin_repository;
pub mod coupon_repository;
pub mod image_repository;

pub use admin_repository::{AdminRepository, NewAdmin, SeaOrmAdminRepository};
pub use coupon_repository::{CouponPatch, CouponRepository, NewCoupon, SeaOrmCouponRepository};
pub use image_repository::{ImageRepository, NewImage, SeaOrmImageRepository};

/// Repository trait for common database operations
pub trait Repository {
    fn get_db(&self) -> &DatabaseConnection;
}

#[derive(Debug, Clone)]
pub struct BaseRepository {
    db: Arc<DatabaseConnection>,
}

impl BaseRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Runs `select` as one page described by `request`, counting the full result set.
    pub async fn fetch_page<E>(
        &self,
        select: Select<E>,
        request: &PageRequest,
    ) -> Result<Page<E::Model>, ServiceError>
    where
        E: EntityTrait,
        E::Model: Send + Sync,
    {
        let paginator = select.paginate(self.get_db(), request.size);
        let total = paginator.num_items().await?;
        let content = paginator.fetch_page(request.page).await?;
        Ok(Page::new(content, request.page, request.size, total))
    }
}

impl Repository for BaseRepository {
    fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Coupon columns a listing may be ordered by, named as they appear in JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "camelCase")]
pub enum CouponSortField {
    #[default]
    Id,
    Name,
    DiscountValue,
    ValidFrom,
    ValidTo,
    CreatedAt,
    UpdatedAt,
}

/// Zero-based page request with an explicit sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub size: u64,
    pub sort_by: CouponSortField,
    pub direction: SortDirection,
}

impl PageRequest {
    pub fn new(page: u64, size: u64) -> Self {
        Self {
            page,
            size,
            sort_by: CouponSortField::default(),
            direction: SortDirection::default(),
        }
    }

    pub fn sorted(mut self, sort_by: CouponSortField, direction: SortDirection) -> Self {
        self.sort_by = sort_by;
        self.direction = direction;
        self
    }
}

/// One page of results plus totals for the whole query.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: u64,
    pub size: u64,
    pub total_elements: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, page: u64, size: u64, total_elements: u64) -> Self {
        let total_pages = if size == 0 {
            0
        } else {
            total_elements.div_ceil(size)
        };
        Self {
            content,
            page,
            size,
            total_elements,
            total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
        }
    }
}

/// Fresh migrated SQLite file inside `dir`, on a single connection.
#[cfg(test)]
pub(crate) async fn migrated_sqlite(dir: &tempfile::TempDir) -> Arc<DatabaseConnection> {
    let config = crate::db::DbConfig {
        url: format!("sqlite://{}?mode=rwc", dir.path().join("repo.db").display()),
        max_connections: 1,
        min_connections: 1,
        ..Default::default()
    };
    let db = crate::db::establish_connection_with_config(&config)
        .await
        .expect("sqlite connection");
    crate::db::run_migrations(&db).await.expect("migrations");
    Arc::new(db)
}
