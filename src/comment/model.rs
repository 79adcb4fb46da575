use chrono::{DateTime, Utc};
use mongodb::bson::{self, oid::ObjectId};
use serde::{Deserialize, Serialize};

use crate::user::model::{User, UserDocument};

pub const DEFAULT_PAGE_SIZE: i64 = 10;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Comment {
    /// Assigned by the store on create, empty before that.
    pub id: String,
    pub post_id: String,
    pub user: User,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored shape in the `comments` collection.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CommentDocument {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub post_id: String,
    pub user: UserDocument,
    pub body: String,
    pub created_at: bson::DateTime,
    pub updated_at: bson::DateTime,
}

impl CommentDocument {
    pub fn from_comment(id: ObjectId, comment: &Comment) -> Self {
        CommentDocument {
            id,
            post_id: comment.post_id.clone(),
            user: UserDocument::from(&comment.user),
            body: comment.body.clone(),
            created_at: to_bson_datetime(comment.created_at),
            updated_at: to_bson_datetime(comment.updated_at),
        }
    }

    pub fn into_comment(self) -> Comment {
        Comment {
            id: self.id.to_hex(),
            post_id: self.post_id,
            user: self.user.into(),
            body: self.body,
            created_at: from_bson_datetime(self.created_at),
            updated_at: from_bson_datetime(self.updated_at),
        }
    }
}

pub fn to_bson_datetime(at: DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_millis(at.timestamp_millis())
}

fn from_bson_datetime(at: bson::DateTime) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(at.timestamp_millis()).unwrap_or_default()
}

#[derive(Debug, Deserialize)]
pub struct CreateComment {
    pub post_id: String,
    pub user_id: i64,
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateComment {
    pub comment_id: String,
    pub user_id: i64,
    pub body: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl SortBy {
    pub fn field(self) -> &'static str {
        match self {
            SortBy::CreatedAt => "created_at",
            SortBy::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Direction value for a Mongo sort document.
    pub fn mongo(self) -> i32 {
        match self {
            SortOrder::Asc => 1,
            SortOrder::Desc => -1,
        }
    }
}

/// Page selection for the read path. Always normalized: page and
/// page_size are at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Filter {
    pub page: i64,
    pub page_size: i64,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
}

impl Default for Filter {
    fn default() -> Self {
        Filter {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            sort_by: SortBy::default(),
            sort_order: SortOrder::default(),
        }
    }
}

impl Filter {
    pub fn new(page: i64, page_size: i64, sort_by: SortBy, sort_order: SortOrder) -> Self {
        Filter {
            page: page.max(1),
            page_size: if page_size <= 0 {
                DEFAULT_PAGE_SIZE
            } else {
                page_size
            },
            sort_by,
            sort_order,
        }
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    /// Documents to skip, `None` when the page lies beyond any real collection.
    pub fn checked_offset(&self) -> Option<u64> {
        (self.page - 1)
            .checked_mul(self.page_size)
            .map(|offset| offset as u64)
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.page_size) as u64
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaginationMetadata {
    pub current_page: i64,
    pub page_size: i64,
    pub first_page: i64,
    pub last_page: i64,
    pub total_records: i64,
}

impl PaginationMetadata {
    pub fn calculate(total_records: i64, page: i64, page_size: i64) -> Self {
        if total_records == 0 {
            return PaginationMetadata::default();
        }

        PaginationMetadata {
            current_page: page,
            page_size,
            first_page: 1,
            last_page: (total_records - 1) / page_size + 1,
            total_records,
        }
    }
}
