use std::collections::HashSet;

use crate::hub::model::Channel;
use crate::utils::error::Rejection;

/// Channels every session joins at connect time.
pub fn auto_subscriptions(user_id: i64) -> Vec<Channel> {
    vec![Channel::private(user_id)]
}

/// Private channels belong to their user; post channels are open to any
/// admitted subject.
pub fn can_subscribe(user_id: i64, channel: &Channel) -> Result<(), Rejection> {
    match channel {
        Channel::Private(owner) if *owner == user_id => Ok(()),
        Channel::Private(_) => Err(Rejection::permission_denied(
            "private channels are only open to their owner",
        )),
        Channel::Post(_) => Ok(()),
    }
}

/// Publishing requires a prior subscription. Private channels are written
/// by the server only.
pub fn can_publish(subscribed: &HashSet<String>, channel: &Channel) -> Result<(), Rejection> {
    match channel {
        Channel::Private(_) => Err(Rejection::permission_denied(
            "private channels are server-pushed",
        )),
        Channel::Post(_) if subscribed.contains(&channel.name()) => Ok(()),
        Channel::Post(_) => Err(Rejection::permission_denied(
            "subscribe to the channel before publishing",
        )),
    }
}
