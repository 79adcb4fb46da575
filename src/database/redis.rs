use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use redis::{Client, RedisResult};

use crate::user::model::User;
use crate::user::service::UserService;
use crate::utils::error::CustomError;

/// Pause before subscribing again after the connection drops.
const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(5);

/// Keeps the local user cache current from user-updated messages.
pub struct UserUpdatedConsumer {
    client: Client,
    channel: String,
    users: Arc<UserService>,
}

impl UserUpdatedConsumer {
    pub fn new(redis_url: &str, channel: &str, users: Arc<UserService>) -> Result<Self, CustomError> {
        let client = Client::open(redis_url).map_err(|e| {
            CustomError::InternalServerError(format!("failed to create redis client: {e}"))
        })?;

        Ok(UserUpdatedConsumer {
            client,
            channel: channel.to_string(),
            users,
        })
    }

    /// Consumes until the process exits. A lost subscription is logged and
    /// re-established.
    pub async fn run(self) {
        loop {
            match self.consume().await {
                Ok(()) => log::warn!("redis subscription to {} ended", self.channel),
                Err(e) => log::error!("redis subscription to {} failed: {}", self.channel, e),
            }
            tokio::time::sleep(RESUBSCRIBE_DELAY).await;
        }
    }

    async fn consume(&self) -> RedisResult<()> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&self.channel).await?;
        log::info!("listening for user updates on {}", self.channel);

        let mut messages = pubsub.on_message();
        while let Some(msg) = messages.next().await {
            let payload = match msg.get_payload::<String>() {
                Ok(payload) => payload,
                Err(e) => {
                    log::warn!("unreadable user update on {}: {}", self.channel, e);
                    continue;
                }
            };

            if let Err(e) = self.handle(&payload).await {
                log::warn!("dropped user update: {}", e);
            }
        }

        Ok(())
    }

    pub async fn handle(&self, payload: &str) -> Result<(), CustomError> {
        let user = decode_user(payload)?;
        let id = user.id;

        self.users.update(user).await?;
        log::debug!("cached user {} from update", id);
        Ok(())
    }
}

fn decode_user(payload: &str) -> Result<User, CustomError> {
    serde_json::from_str(payload)
        .map_err(|e| CustomError::ValidationError(format!("malformed user update: {e}")))
}
