use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::{
    auth::{hash_password, verify_password, ADMIN_ROLE},
    entities::admin,
    errors::ServiceError,
    repositories::{AdminRepository, NewAdmin},
};

const INVALID_CREDENTIALS: &str = "Invalid username or password";

/// Admin principals backing the login endpoint.
#[derive(Clone)]
pub struct AdminService {
    repo: Arc<dyn AdminRepository>,
}

impl AdminService {
    pub fn new(repo: Arc<dyn AdminRepository>) -> Self {
        Self { repo }
    }

    /// Creates the admin `username` unless it already exists. Safe to call on every boot.
    ///
    /// Returns `true` when a new admin was created.
    #[instrument(skip(self, password))]
    pub async fn ensure_admin(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<bool, ServiceError> {
        if self.repo.find_by_username(username).await?.is_some() {
            info!(username, "Admin account already present");
            return Ok(false);
        }

        let password_hash = hash_password(password)?;
        self.repo
            .insert(NewAdmin {
                username: username.to_string(),
                password_hash,
                email: email.to_string(),
                role: ADMIN_ROLE.to_string(),
            })
            .await?;
        info!(username, "Admin account created");
        Ok(true)
    }

    /// Checks a username and password pair. Unknown users and wrong passwords fail alike.
    #[instrument(skip(self, password))]
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<admin::Model, ServiceError> {
        let Some(admin) = self.repo.find_by_username(username).await? else {
            warn!(username, "Login attempt for unknown admin");
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        };

        if !verify_password(password, &admin.password_hash)? {
            warn!(username, "Login attempt with wrong password");
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }
        Ok(admin)
    }
}
