use serde::{Deserialize, Serialize};

/// Display snapshot of a user. Embedded by value in every comment.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub avatar_url: String,
}

/// Stored shape in the local `users` collection, keyed by the user id.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UserDocument {
    #[serde(rename = "_id")]
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub avatar_url: String,
}

impl From<&User> for UserDocument {
    fn from(user: &User) -> Self {
        UserDocument {
            id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            avatar_url: user.avatar_url.clone(),
        }
    }
}

impl From<UserDocument> for User {
    fn from(doc: UserDocument) -> Self {
        User {
            id: doc.id,
            first_name: doc.first_name,
            last_name: doc.last_name,
            avatar_url: doc.avatar_url,
        }
    }
}
