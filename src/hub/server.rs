use actix::prelude::*;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use crate::hub::authority;
use crate::hub::history::HistoryRing;
use crate::hub::model::{Channel, Event, Publication, RecoverFrom, ServerMessage};
use crate::utils::config::HistoryConfig;
use crate::utils::error::Rejection;

/// How often expired history is swept.
const SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Serialized frame pushed to a session.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Deliver(pub String);

/// Registers a session. Replies with the channels it was auto-subscribed to.
#[derive(Message)]
#[rtype(result = "Vec<String>")]
pub struct Connect {
    pub session_id: String,
    pub user_id: i64,
    pub addr: Recipient<Deliver>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub session_id: String,
}

#[derive(Message)]
#[rtype(result = "Result<Subscription, Rejection>")]
pub struct Subscribe {
    pub session_id: String,
    pub channel: Channel,
    pub recover: Option<RecoverFrom>,
}

/// Stream position handed to a new subscriber, plus anything it missed.
#[derive(Debug)]
pub struct Subscription {
    pub epoch: String,
    pub offset: u64,
    pub recovered: bool,
    pub publications: Vec<Publication>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Unsubscribe {
    pub session_id: String,
    pub channel: Channel,
}

/// Appends to the channel history and fans out. Replies with the offset.
#[derive(Message)]
#[rtype(result = "u64")]
pub struct Publish {
    pub channel: Channel,
    pub event: Event,
}

struct SessionInfo {
    user_id: i64,
    addr: Recipient<Deliver>,
}

/// Hub actor. Owns the channel registry and the history rings; everything
/// else reaches them through messages.
pub struct HubServer {
    /// session_id -> session
    sessions: HashMap<String, SessionInfo>,
    /// channel name -> subscribed session ids
    channels: HashMap<String, HashSet<String>>,
    /// channel name -> recent publications
    history: HashMap<String, HistoryRing>,
    config: HistoryConfig,
}

impl HubServer {
    pub fn new(config: HistoryConfig) -> Self {
        HubServer {
            sessions: HashMap::new(),
            channels: HashMap::new(),
            history: HashMap::new(),
            config,
        }
    }

    fn ring(&mut self, channel: &str) -> &mut HistoryRing {
        let config = self.config;
        self.history
            .entry(channel.to_string())
            .or_insert_with(|| HistoryRing::new(config))
    }

    fn join(&mut self, session_id: &str, channel: &str) {
        self.channels
            .entry(channel.to_string())
            .or_default()
            .insert(session_id.to_string());
    }

    fn leave(&mut self, session_id: &str, channel: &str) {
        if let Some(members) = self.channels.get_mut(channel) {
            members.remove(session_id);
            if members.is_empty() {
                self.channels.remove(channel);
            }
        }
    }

    fn send_to_channel(&self, channel: &str, frame: &str) {
        if let Some(members) = self.channels.get(channel) {
            for session_id in members {
                if let Some(session) = self.sessions.get(session_id) {
                    session.addr.do_send(Deliver(frame.to_string()));
                }
            }
        }
    }

    fn sweep(&mut self, now: Instant) {
        for ring in self.history.values_mut() {
            ring.evict(now);
        }

        let channels = &self.channels;
        self.history
            .retain(|name, ring| !ring.is_empty() || channels.contains_key(name));
    }
}

impl Default for HubServer {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl Actor for HubServer {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Context<Self>) {
        ctx.run_interval(SWEEP_INTERVAL, |act, _| act.sweep(Instant::now()));
    }
}

impl Handler<Connect> for HubServer {
    type Result = Vec<String>;

    fn handle(&mut self, msg: Connect, _: &mut Context<Self>) -> Self::Result {
        log::info!(
            "user {} connected with session {}",
            msg.user_id,
            msg.session_id
        );

        self.sessions.insert(
            msg.session_id.clone(),
            SessionInfo {
                user_id: msg.user_id,
                addr: msg.addr,
            },
        );

        authority::auto_subscriptions(msg.user_id)
            .into_iter()
            .map(|channel| {
                let name = channel.name();
                self.join(&msg.session_id, &name);
                name
            })
            .collect()
    }
}

impl Handler<Disconnect> for HubServer {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, _: &mut Context<Self>) {
        if self.sessions.remove(&msg.session_id).is_none() {
            return;
        }

        for members in self.channels.values_mut() {
            members.remove(&msg.session_id);
        }
        self.channels.retain(|_, members| !members.is_empty());

        log::info!("session {} disconnected", msg.session_id);
    }
}

impl Handler<Subscribe> for HubServer {
    type Result = Result<Subscription, Rejection>;

    fn handle(&mut self, msg: Subscribe, _: &mut Context<Self>) -> Self::Result {
        let user_id = self
            .sessions
            .get(&msg.session_id)
            .map(|session| session.user_id)
            .ok_or_else(|| Rejection::permission_denied("session is not connected"))?;

        authority::can_subscribe(user_id, &msg.channel)?;

        let name = msg.channel.name();
        self.join(&msg.session_id, &name);

        let ring = self.ring(&name);
        let (publications, recovered) = match &msg.recover {
            Some(from) => {
                let recovery = ring.since(from, Instant::now());
                (recovery.publications, recovery.recovered)
            }
            None => (Vec::new(), false),
        };

        log::debug!(
            "session {} subscribed to {} (replayed {})",
            msg.session_id,
            name,
            publications.len()
        );

        Ok(Subscription {
            epoch: ring.epoch().to_string(),
            offset: ring.top(),
            recovered,
            publications,
        })
    }
}

impl Handler<Unsubscribe> for HubServer {
    type Result = ();

    fn handle(&mut self, msg: Unsubscribe, _: &mut Context<Self>) {
        self.leave(&msg.session_id, &msg.channel.name());
    }
}

impl Handler<Publish> for HubServer {
    type Result = u64;

    fn handle(&mut self, msg: Publish, _: &mut Context<Self>) -> u64 {
        let name = msg.channel.name();
        let offset = self.ring(&name).push(msg.event.clone(), Instant::now());

        let frame = ServerMessage::Publication {
            channel: name.clone(),
            offset,
            data: msg.event,
        };
        match serde_json::to_string(&frame) {
            Ok(frame) => self.send_to_channel(&name, &frame),
            Err(e) => log::error!("failed to encode publication for {}: {}", name, e),
        }

        offset
    }
}
