use std::sync::Arc;

use chrono::{DateTime, Duration, DurationRound, Utc};

use crate::comment::model::{Comment, CreateComment, Filter, PaginationMetadata, UpdateComment};
use crate::database::store::CommentStore;
use crate::user::service::UserResolver;
use crate::utils::error::CustomError;

/// Owns comment lifecycle rules: authorship, timestamps, and who may change
/// what. Storage goes through `CommentStore`.
pub struct CommentService {
    store: Arc<dyn CommentStore>,
    users: Arc<dyn UserResolver>,
}

impl CommentService {
    pub fn new(store: Arc<dyn CommentStore>, users: Arc<dyn UserResolver>) -> Self {
        CommentService { store, users }
    }

    /// Create a comment authored by `user_id`, embedding their current profile.
    pub async fn create(&self, request: CreateComment) -> Result<Comment, CustomError> {
        let post_id = request.post_id.trim();
        if post_id.is_empty() {
            return Err(CustomError::ValidationError("post id is required".to_string()));
        }
        let body = validate_body(request.body)?;

        let user = self.users.get_user(request.user_id).await.map_err(|e| {
            if e.is_not_found() {
                log::warn!("comment author {} could not be resolved", request.user_id);
            }
            e
        })?;

        let now = now();
        let created = self
            .store
            .create_comment(Comment {
                id: String::new(),
                post_id: post_id.to_string(),
                user,
                body,
                created_at: now,
                updated_at: now,
            })
            .await?;

        log::info!(
            "comment {} created on post {} by user {}",
            created.id,
            created.post_id,
            created.user.id
        );
        Ok(created)
    }

    /// Replace the body of a comment. Only its author may do this.
    pub async fn update(&self, request: UpdateComment) -> Result<Comment, CustomError> {
        let body = validate_body(request.body)?;
        let mut comment = self
            .load_owned(&request.comment_id, request.user_id)
            .await?;

        comment.body = body;
        comment.updated_at = next_update(comment.updated_at);

        let updated = self.store.update_comment(comment).await?;
        log::info!("comment {} updated by user {}", updated.id, request.user_id);
        Ok(updated)
    }

    /// Delete a comment. Only its author may do this. Returns the removed
    /// comment so callers know which post it belonged to.
    pub async fn delete(&self, comment_id: &str, actor_id: i64) -> Result<Comment, CustomError> {
        let comment = self.load_owned(comment_id, actor_id).await?;

        self.store.delete_comment(&comment.id).await?;
        log::info!("comment {} deleted by user {}", comment.id, actor_id);
        Ok(comment)
    }

    pub async fn get_by_id(&self, comment_id: &str) -> Result<Comment, CustomError> {
        self.store.get_comment(comment_id).await
    }

    pub async fn list_by_post_id(
        &self,
        post_id: &str,
        filter: Filter,
    ) -> Result<(Vec<Comment>, PaginationMetadata), CustomError> {
        if post_id.trim().is_empty() {
            return Err(CustomError::ValidationError("post id is required".to_string()));
        }
        self.store.list_post_comments(post_id, filter).await
    }

    async fn load_owned(&self, comment_id: &str, actor_id: i64) -> Result<Comment, CustomError> {
        let comment = self.store.get_comment(comment_id).await?;

        if comment.user.id != actor_id {
            log::warn!(
                "user {} tried to modify comment {} owned by {}",
                actor_id,
                comment.id,
                comment.user.id
            );
            return Err(CustomError::UnauthorizedError(
                "only the author can modify this comment".to_string(),
            ));
        }

        Ok(comment)
    }
}

fn validate_body(body: String) -> Result<String, CustomError> {
    if body.trim().is_empty() {
        return Err(CustomError::ValidationError(
            "comment body cannot be empty".to_string(),
        ));
    }
    Ok(body)
}

// Stored timestamps have millisecond precision.
fn now() -> DateTime<Utc> {
    let now = Utc::now();
    now.duration_trunc(Duration::milliseconds(1)).unwrap_or(now)
}

fn next_update(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = now();
    if now > previous {
        now
    } else {
        previous + Duration::milliseconds(1)
    }
}
