use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;

use crate::comment::model::{Comment, Filter, PaginationMetadata, SortBy, SortOrder};
use crate::database::store::CommentStore;
use crate::user::model::User;
use crate::user::source::UserSource;
use crate::utils::error::CustomError;

/// In-process store with the same id and error semantics as `MongoStorage`.
#[derive(Default)]
pub struct MemoryStore {
    comments: Mutex<HashMap<String, Comment>>,
    users: Mutex<HashMap<i64, User>>,
    writes: Mutex<usize>,
}

impl MemoryStore {
    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let store = MemoryStore::default();
        store
            .users
            .lock()
            .unwrap()
            .extend(users.into_iter().map(|u| (u.id, u)));
        store
    }

    /// Number of successful comment mutations.
    pub fn writes(&self) -> usize {
        *self.writes.lock().unwrap()
    }

    pub fn user(&self, id: i64) -> Option<User> {
        self.users.lock().unwrap().get(&id).cloned()
    }

    fn bump(&self) {
        *self.writes.lock().unwrap() += 1;
    }
}

fn check_id(id: &str) -> Result<(), CustomError> {
    ObjectId::parse_str(id)
        .map(|_| ())
        .map_err(|_| CustomError::InvalidIdError(id.to_string()))
}

#[async_trait]
impl CommentStore for MemoryStore {
    async fn get_comment(&self, id: &str) -> Result<Comment, CustomError> {
        check_id(id)?;
        self.comments
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or(CustomError::CommentNotFoundError)
    }

    async fn list_post_comments(
        &self,
        post_id: &str,
        filter: Filter,
    ) -> Result<(Vec<Comment>, PaginationMetadata), CustomError> {
        let mut matching: Vec<Comment> = self
            .comments
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();

        matching.sort_by_key(|c| match filter.sort_by {
            SortBy::CreatedAt => c.created_at,
            SortBy::UpdatedAt => c.updated_at,
        });
        if filter.sort_order == SortOrder::Desc {
            matching.reverse();
        }

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit() as usize)
            .collect();

        Ok((
            page,
            PaginationMetadata::calculate(total, filter.page, filter.page_size),
        ))
    }

    async fn create_comment(&self, mut comment: Comment) -> Result<Comment, CustomError> {
        comment.id = ObjectId::new().to_hex();
        self.comments
            .lock()
            .unwrap()
            .insert(comment.id.clone(), comment.clone());
        self.bump();
        Ok(comment)
    }

    async fn update_comment(&self, comment: Comment) -> Result<Comment, CustomError> {
        check_id(&comment.id)?;
        let mut comments = self.comments.lock().unwrap();
        let stored = comments
            .get_mut(&comment.id)
            .ok_or(CustomError::CommentNotFoundError)?;
        stored.body = comment.body.clone();
        stored.updated_at = comment.updated_at;
        drop(comments);
        self.bump();
        Ok(comment)
    }

    async fn delete_comment(&self, id: &str) -> Result<(), CustomError> {
        check_id(id)?;
        self.comments
            .lock()
            .unwrap()
            .remove(id)
            .ok_or(CustomError::CommentNotFoundError)?;
        self.bump();
        Ok(())
    }
}

#[async_trait]
impl UserSource for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get_user_by_id(&self, id: i64) -> Result<User, CustomError> {
        self.user(id).ok_or(CustomError::UserNotFoundError)
    }

    fn accepts_repair(&self) -> bool {
        true
    }

    async fn save_user(&self, user: &User) -> Result<(), CustomError> {
        self.users.lock().unwrap().insert(user.id, user.clone());
        Ok(())
    }
}
