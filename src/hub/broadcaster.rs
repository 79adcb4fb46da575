use actix::Addr;
use async_trait::async_trait;

use crate::hub::model::{Channel, Event};
use crate::hub::server::{HubServer, Publish};
use crate::utils::error::CustomError;

/// Publishing side of the hub, as seen by the mutation handlers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Records the event in the channel history and delivers it to current
    /// subscribers. Returns the event's offset in that history.
    async fn publish(&self, channel: Channel, event: Event) -> Result<u64, CustomError>;
}

#[async_trait]
impl Broadcaster for Addr<HubServer> {
    async fn publish(&self, channel: Channel, event: Event) -> Result<u64, CustomError> {
        self.send(Publish { channel, event })
            .await
            .map_err(|e| CustomError::InternalServerError(format!("hub unavailable: {e}")))
    }
}
