use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::{Document, doc, oid::ObjectId};
use mongodb::{Client, Collection};

use crate::comment::model::{
    Comment, CommentDocument, Filter, PaginationMetadata, to_bson_datetime,
};
use crate::database::store::CommentStore;
use crate::user::model::{User, UserDocument};
use crate::user::source::UserSource;
use crate::utils::error::CustomError;

/// MongoDB-backed storage for comments and the local user cache.
#[derive(Clone)]
pub struct MongoStorage {
    comments: Collection<CommentDocument>,
    users: Collection<UserDocument>,
}

impl MongoStorage {
    pub fn new(client: &Client, database_name: &str) -> Self {
        let db = client.database(database_name);
        MongoStorage {
            comments: db.collection::<CommentDocument>("comments"),
            users: db.collection::<UserDocument>("users"),
        }
    }
}

fn parse_id(id: &str) -> Result<ObjectId, CustomError> {
    ObjectId::parse_str(id)
        .map_err(|_| CustomError::InvalidIdError(format!("{id:?} is not a valid comment id")))
}

fn internal(op: &str, err: mongodb::error::Error) -> CustomError {
    CustomError::InternalServerError(format!("storage.mongodb.{op}: {err}"))
}

#[async_trait]
impl CommentStore for MongoStorage {
    async fn get_comment(&self, id: &str) -> Result<Comment, CustomError> {
        let object_id = parse_id(id)?;

        self.comments
            .find_one(doc! { "_id": object_id })
            .await
            .map_err(|e| internal("get_comment", e))?
            .map(CommentDocument::into_comment)
            .ok_or(CustomError::CommentNotFoundError)
    }

    async fn list_post_comments(
        &self,
        post_id: &str,
        filter: Filter,
    ) -> Result<(Vec<Comment>, PaginationMetadata), CustomError> {
        let total = self
            .comments
            .count_documents(doc! { "post_id": post_id })
            .await
            .map_err(|e| internal("count_post_comments", e))?;

        let mut sort = Document::new();
        sort.insert(filter.sort_by.field(), filter.sort_order.mongo());

        let cursor = self
            .comments
            .find(doc! { "post_id": post_id })
            .sort(sort)
            .skip(filter.offset())
            .limit(filter.limit())
            .await
            .map_err(|e| internal("list_post_comments", e))?;

        let documents: Vec<CommentDocument> = cursor
            .try_collect()
            .await
            .map_err(|e| internal("list_post_comments", e))?;

        let metadata =
            PaginationMetadata::calculate(total as i64, filter.page, filter.page_size);

        Ok((
            documents
                .into_iter()
                .map(CommentDocument::into_comment)
                .collect(),
            metadata,
        ))
    }

    async fn create_comment(&self, comment: Comment) -> Result<Comment, CustomError> {
        let document = CommentDocument::from_comment(ObjectId::new(), &comment);

        self.comments
            .insert_one(&document)
            .await
            .map_err(|e| internal("create_comment", e))?;

        Ok(document.into_comment())
    }

    async fn update_comment(&self, comment: Comment) -> Result<Comment, CustomError> {
        let object_id = parse_id(&comment.id)?;

        let result = self
            .comments
            .update_one(
                doc! { "_id": object_id },
                doc! {
                    "$set": {
                        "body": comment.body.as_str(),
                        "updated_at": to_bson_datetime(comment.updated_at),
                    }
                },
            )
            .await
            .map_err(|e| internal("update_comment", e))?;

        if result.matched_count == 0 {
            return Err(CustomError::CommentNotFoundError);
        }

        Ok(comment)
    }

    async fn delete_comment(&self, id: &str) -> Result<(), CustomError> {
        let object_id = parse_id(id)?;

        let result = self
            .comments
            .delete_one(doc! { "_id": object_id })
            .await
            .map_err(|e| internal("delete_comment", e))?;

        if result.deleted_count == 0 {
            return Err(CustomError::CommentNotFoundError);
        }

        Ok(())
    }
}

#[async_trait]
impl UserSource for MongoStorage {
    fn name(&self) -> &'static str {
        "mongodb"
    }

    async fn get_user_by_id(&self, id: i64) -> Result<User, CustomError> {
        self.users
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| internal("get_user_by_id", e))?
            .map(User::from)
            .ok_or(CustomError::UserNotFoundError)
    }

    fn accepts_repair(&self) -> bool {
        true
    }

    async fn save_user(&self, user: &User) -> Result<(), CustomError> {
        self.users
            .replace_one(doc! { "_id": user.id }, UserDocument::from(user))
            .upsert(true)
            .await
            .map_err(|e| internal("save_user", e))?;

        Ok(())
    }
}
