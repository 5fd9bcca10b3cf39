use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use std::sync::Arc;

use super::{BaseRepository, Repository};
use crate::entities::image::{self, Column, Entity as Image};
use crate::errors::ServiceError;

/// Metadata for an image whose bytes are already on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewImage {
    pub file_name: String,
    pub file_path: String,
    pub file_type: Option<String>,
    pub file_size: Option<i64>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageRepository: Send + Sync {
    async fn find_all(&self) -> Result<Vec<image::Model>, ServiceError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<image::Model>, ServiceError>;

    async fn insert(&self, image: NewImage) -> Result<image::Model, ServiceError>;

    /// Removes the row in one transaction and returns what was stored.
    /// Fails with `NotFound` if the image does not exist.
    async fn delete_by_id(&self, id: i64) -> Result<image::Model, ServiceError>;
}

#[derive(Debug, Clone)]
pub struct SeaOrmImageRepository {
    base: BaseRepository,
}

impl SeaOrmImageRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }
}

#[async_trait]
impl ImageRepository for SeaOrmImageRepository {
    async fn find_all(&self) -> Result<Vec<image::Model>, ServiceError> {
        Ok(Image::find()
            .order_by_asc(Column::Id)
            .all(self.base.get_db())
            .await?)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<image::Model>, ServiceError> {
        Ok(Image::find_by_id(id).one(self.base.get_db()).await?)
    }

    async fn insert(&self, image: NewImage) -> Result<image::Model, ServiceError> {
        let active = image::ActiveModel {
            file_name: Set(image.file_name),
            file_path: Set(image.file_path),
            file_type: Set(image.file_type),
            file_size: Set(image.file_size),
            description: Set(image.description),
            created_at: Set(image.created_at),
            updated_at: Set(image.created_at),
            ..Default::default()
        };
        Ok(active.insert(self.base.get_db()).await?)
    }

    async fn delete_by_id(&self, id: i64) -> Result<image::Model, ServiceError> {
        let txn = self.base.get_db().begin().await?;
        let image = Image::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Image", id))?;
        let result = image.clone().delete(&txn).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::not_found("Image", id));
        }
        txn.commit().await?;
        Ok(image)
    }
}
