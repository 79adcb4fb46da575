use async_trait::async_trait;

use crate::user::model::User;
use crate::utils::error::CustomError;

/// One place a user snapshot can be read from.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get_user_by_id(&self, id: i64) -> Result<User, CustomError>;

    /// Whether this source can be written back to after a fallback hit.
    fn accepts_repair(&self) -> bool {
        false
    }

    async fn save_user(&self, _user: &User) -> Result<(), CustomError> {
        Err(CustomError::InternalServerError(format!(
            "{} is read-only",
            self.name()
        )))
    }
}
