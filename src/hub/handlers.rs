use std::sync::Arc;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::comment::model::{Comment, CreateComment, UpdateComment};
use crate::comment::service::CommentService;
use crate::hub::broadcaster::Broadcaster;
use crate::hub::model::{Channel, Event, EventType};
use crate::utils::error::CustomError;

/// Who sent an inbound event, and on which channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Caller {
    pub user_id: i64,
    pub channel: Channel,
}

/// An outbound event that was published.
#[derive(Debug, Clone, PartialEq)]
pub struct Emitted {
    pub channel: Channel,
    pub offset: u64,
    pub event: Event,
}

#[derive(Debug, Deserialize)]
struct CreatePayload {
    #[serde(default)]
    post_id: Option<String>,
    body: String,
}

#[derive(Debug, Deserialize)]
struct UpdatePayload {
    comment_id: String,
    body: String,
}

#[derive(Debug, Deserialize)]
struct DeletePayload {
    comment_id: String,
}

/// Decode, execute, emit. Nothing is published unless the mutation
/// succeeded.
pub struct MutationHandlers {
    comments: Arc<CommentService>,
    publisher: Arc<dyn Broadcaster>,
}

impl MutationHandlers {
    pub fn new(comments: Arc<CommentService>, publisher: Arc<dyn Broadcaster>) -> Self {
        MutationHandlers {
            comments,
            publisher,
        }
    }

    pub async fn create(&self, payload: Value, caller: &Caller) -> Result<Emitted, CustomError> {
        let payload: CreatePayload = decode(payload)?;

        let Channel::Post(channel_post) = &caller.channel else {
            return Err(CustomError::ValidationError(
                "comments can only be created on a post channel".to_string(),
            ));
        };
        let post_id = match payload.post_id {
            Some(post_id) if post_id != *channel_post => {
                return Err(CustomError::ValidationError(format!(
                    "post id {post_id:?} does not match channel {channel_post:?}"
                )));
            }
            Some(post_id) => post_id,
            None => channel_post.clone(),
        };

        let comment = self
            .comments
            .create(CreateComment {
                post_id,
                user_id: caller.user_id,
                body: payload.body,
            })
            .await?;

        self.emit(EventType::NewComment, &comment.post_id, comment_payload(&comment)?)
            .await
    }

    pub async fn update(&self, payload: Value, caller: &Caller) -> Result<Emitted, CustomError> {
        let payload: UpdatePayload = decode(payload)?;

        let comment = self
            .comments
            .update(UpdateComment {
                comment_id: payload.comment_id,
                user_id: caller.user_id,
                body: payload.body,
            })
            .await?;

        self.emit(EventType::EditComment, &comment.post_id, comment_payload(&comment)?)
            .await
    }

    pub async fn delete(&self, payload: Value, caller: &Caller) -> Result<Emitted, CustomError> {
        let payload: DeletePayload = decode(payload)?;

        let removed = self
            .comments
            .delete(&payload.comment_id, caller.user_id)
            .await?;

        self.emit(
            EventType::RemoveComment,
            &removed.post_id,
            json!({ "id": removed.id }),
        )
        .await
    }

    async fn emit(
        &self,
        kind: EventType,
        post_id: &str,
        payload: Value,
    ) -> Result<Emitted, CustomError> {
        let channel = Channel::Post(post_id.to_string());
        let event = Event::new(kind, payload);

        let offset = self
            .publisher
            .publish(channel.clone(), event.clone())
            .await?;

        Ok(Emitted {
            channel,
            offset,
            event,
        })
    }
}

fn decode<T: DeserializeOwned>(payload: Value) -> Result<T, CustomError> {
    serde_json::from_value(payload)
        .map_err(|e| CustomError::ValidationError(format!("malformed payload: {e}")))
}

fn comment_payload(comment: &Comment) -> Result<Value, CustomError> {
    serde_json::to_value(comment)
        .map_err(|e| CustomError::InternalServerError(format!("failed to encode comment: {e}")))
}
