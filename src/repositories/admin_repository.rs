use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::sync::Arc;

use super::{BaseRepository, Repository};
use crate::entities::admin::{self, Column, Entity as Admin};
use crate::errors::ServiceError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAdmin {
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub role: String,
}

#[async_trait]
pub trait AdminRepository: Send + Sync {
    async fn find_by_username(&self, username: &str)
        -> Result<Option<admin::Model>, ServiceError>;

    async fn insert(&self, admin: NewAdmin) -> Result<admin::Model, ServiceError>;
}

#[derive(Debug, Clone)]
pub struct SeaOrmAdminRepository {
    base: BaseRepository,
}

impl SeaOrmAdminRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }
}

#[async_trait]
impl AdminRepository for SeaOrmAdminRepository {
    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<admin::Model>, ServiceError> {
        Ok(Admin::find()
            .filter(Column::Username.eq(username))
            .one(self.base.get_db())
            .await?)
    }

    async fn insert(&self, admin: NewAdmin) -> Result<admin::Model, ServiceError> {
        let active = admin::ActiveModel {
            username: Set(admin.username),
            password_hash: Set(admin.password_hash),
            email: Set(admin.email),
            role: Set(admin.role),
            ..Default::default()
        };
        Ok(active.insert(self.base.get_db()).await?)
    }
}
