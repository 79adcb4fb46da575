use async_trait::async_trait;

use crate::comment::model::{Comment, Filter, PaginationMetadata};
use crate::utils::error::CustomError;

/// Comment persistence. Implementations translate store-native failures into
/// `InvalidIdError`, `CommentNotFoundError` or `InternalServerError`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn get_comment(&self, id: &str) -> Result<Comment, CustomError>;

    async fn list_post_comments(
        &self,
        post_id: &str,
        filter: Filter,
    ) -> Result<(Vec<Comment>, PaginationMetadata), CustomError>;

    /// Persists a new comment and returns it with its store-assigned id.
    async fn create_comment(&self, comment: Comment) -> Result<Comment, CustomError>;

    async fn update_comment(&self, comment: Comment) -> Result<Comment, CustomError>;

    async fn delete_comment(&self, id: &str) -> Result<(), CustomError>;
}
