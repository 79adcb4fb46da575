use actix::{
    Actor, ActorContext, ActorFutureExt, Addr, AsyncContext, ContextFutureSpawner, Handler,
    Running, StreamHandler, WrapFuture, fut,
};
use actix_web_actors::ws;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::hub::authority;
use crate::hub::handlers::Caller;
use crate::hub::model::{Channel, ClientCommand, Command, Event, RecoverFrom, ServerMessage};
use crate::hub::router::EventRouter;
use crate::hub::server::{Connect, Deliver, Disconnect, HubServer, Subscribe, Unsubscribe};
use crate::middleware::auth::{Identity, IdentityGate};
use crate::utils::error::{CustomError, Rejection};

/// How often heartbeat pings are sent
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
/// How long before lack of client response causes a timeout
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// One admitted connection. Commands are handled one at a time: the next
/// frame is not read until the current command has replied.
pub struct WsSession {
    session_id: String,
    identity: Identity,
    /// Channels this connection is subscribed to.
    channels: HashSet<String>,
    hub: Addr<HubServer>,
    router: Arc<EventRouter>,
    gate: Arc<IdentityGate>,
    last_heartbeat: Instant,
}

impl WsSession {
    pub fn new(
        identity: Identity,
        hub: Addr<HubServer>,
        router: Arc<EventRouter>,
        gate: Arc<IdentityGate>,
    ) -> Self {
        WsSession {
            session_id: Uuid::new_v4().to_string(),
            identity,
            channels: HashSet::new(),
            hub,
            router,
            gate,
            last_heartbeat: Instant::now(),
        }
    }

    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > CLIENT_TIMEOUT {
                log::warn!("session {} heartbeat timeout, disconnecting", act.session_id);
                ctx.stop();
                return;
            }

            if is_expired(&act.identity, chrono::Utc::now().timestamp()) {
                act.disconnect("token expired", ctx);
                return;
            }

            ctx.ping(b"");
        });
    }

    fn register(&self, ctx: &mut ws::WebsocketContext<Self>) {
        let connect = Connect {
            session_id: self.session_id.clone(),
            user_id: self.identity.user_id,
            addr: ctx.address().recipient(),
        };

        self.hub
            .send(connect)
            .into_actor(self)
            .then(|res, act, ctx| {
                match res {
                    Ok(channels) => {
                        act.channels.extend(channels.iter().cloned());
                        act.send_message(
                            &ServerMessage::Connected {
                                session_id: act.session_id.clone(),
                                user_id: act.identity.user_id,
                                expires_at: act.identity.expires_at,
                                channels,
                            },
                            ctx,
                        );
                    }
                    Err(e) => {
                        log::error!("session {} could not register: {}", act.session_id, e);
                        ctx.stop();
                    }
                }
                fut::ready(())
            })
            .wait(ctx);
    }

    fn handle_command(&mut self, msg: ClientCommand, ctx: &mut ws::WebsocketContext<Self>) {
        let id = msg.id;
        match msg.command {
            Command::Subscribe { channel, recover } => self.subscribe(id, &channel, recover, ctx),
            Command::Unsubscribe { channel } => match Channel::parse(&channel) {
                Ok(channel) => {
                    let name = channel.name();
                    self.channels.remove(&name);
                    self.hub.do_send(Unsubscribe {
                        session_id: self.session_id.clone(),
                        channel,
                    });
                    self.send_message(&ServerMessage::Unsubscribed { id, channel: name }, ctx);
                }
                Err(rejection) => self.reject(id, rejection, ctx),
            },
            Command::Publish { channel, data } => self.publish(id, &channel, data, ctx),
            Command::Refresh { token } => self.refresh(id, &token, ctx),
            Command::Ping => self.send_message(&ServerMessage::Pong { id }, ctx),
        }
    }

    fn subscribe(
        &mut self,
        id: Option<u64>,
        channel: &str,
        recover: Option<RecoverFrom>,
        ctx: &mut ws::WebsocketContext<Self>,
    ) {
        let channel = match Channel::parse(channel) {
            Ok(channel) => channel,
            Err(rejection) => return self.reject(id, rejection, ctx),
        };
        let name = channel.name();

        self.hub
            .send(Subscribe {
                session_id: self.session_id.clone(),
                channel,
                recover,
            })
            .into_actor(self)
            .then(move |res, act, ctx| {
                match res {
                    Ok(Ok(subscription)) => {
                        act.channels.insert(name.clone());
                        act.send_message(
                            &ServerMessage::Subscribed {
                                id,
                                channel: name,
                                epoch: subscription.epoch,
                                offset: subscription.offset,
                                recovered: subscription.recovered,
                                publications: subscription.publications,
                            },
                            ctx,
                        );
                    }
                    Ok(Err(rejection)) => act.reject(id, rejection, ctx),
                    Err(e) => act.reject(
                        id,
                        CustomError::InternalServerError(format!("hub unavailable: {e}")).into(),
                        ctx,
                    ),
                }
                fut::ready(())
            })
            .wait(ctx);
    }

    fn publish(
        &mut self,
        id: Option<u64>,
        channel: &str,
        event: Event,
        ctx: &mut ws::WebsocketContext<Self>,
    ) {
        let channel = match Channel::parse(channel)
            .and_then(|channel| authority::can_publish(&self.channels, &channel).map(|_| channel))
        {
            Ok(channel) => channel,
            Err(rejection) => return self.reject(id, rejection, ctx),
        };

        let router = self.router.clone();
        let caller = Caller {
            user_id: self.identity.user_id,
            channel,
        };

        async move { router.route(event, &caller).await }
            .into_actor(self)
            .then(move |res, act, ctx| {
                match res {
                    Ok(emitted) => act.send_message(
                        &ServerMessage::Published {
                            id,
                            channel: emitted.channel.name(),
                            offset: emitted.offset,
                        },
                        ctx,
                    ),
                    Err(e) => {
                        log::info!(
                            "session {} publish rejected: {}",
                            act.session_id,
                            e
                        );
                        act.reject(id, e.into(), ctx);
                    }
                }
                fut::ready(())
            })
            .wait(ctx);
    }

    fn refresh(&mut self, id: Option<u64>, token: &str, ctx: &mut ws::WebsocketContext<Self>) {
        match refreshed_identity(&self.identity, self.gate.verify(token)) {
            Ok(identity) => {
                self.identity = identity;
                self.send_message(
                    &ServerMessage::Refreshed {
                        id,
                        expires_at: identity.expires_at,
                    },
                    ctx,
                );
            }
            Err(reason) => {
                log::info!("session {} refresh failed: {}", self.session_id, reason);
                self.disconnect(&reason, ctx);
            }
        }
    }

    fn disconnect(&self, reason: &str, ctx: &mut ws::WebsocketContext<Self>) {
        log::info!("disconnecting session {}: {}", self.session_id, reason);
        self.send_message(
            &ServerMessage::Disconnect {
                reason: reason.to_string(),
            },
            ctx,
        );
        ctx.close(Some(ws::CloseReason {
            code: ws::CloseCode::Policy,
            description: Some(reason.to_string()),
        }));
        ctx.stop();
    }

    fn reject(&self, id: Option<u64>, rejection: Rejection, ctx: &mut ws::WebsocketContext<Self>) {
        if rejection.code.is_retryable() {
            log::warn!("session {} got a retryable error: {}", self.session_id, rejection.message);
        }
        self.send_message(&ServerMessage::rejected(id, rejection), ctx);
    }

    fn send_message(&self, msg: &ServerMessage, ctx: &mut ws::WebsocketContext<Self>) {
        match serde_json::to_string(msg) {
            Ok(json) => ctx.text(json),
            Err(e) => log::error!("failed to encode frame for {}: {}", self.session_id, e),
        }
    }
}

fn is_expired(identity: &Identity, now: i64) -> bool {
    now > identity.expires_at
}

/// A new credential must name the same subject. The error is the reason the
/// session is ended.
fn refreshed_identity(
    current: &Identity,
    verified: Result<Identity, CustomError>,
) -> Result<Identity, String> {
    match verified {
        Ok(identity) if identity.user_id == current.user_id => Ok(identity),
        Ok(identity) => Err(format!(
            "refresh token names user {} instead of {}",
            identity.user_id, current.user_id
        )),
        Err(e) => Err(e.to_string()),
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.start_heartbeat(ctx);
        self.register(ctx);
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        self.hub.do_send(Disconnect {
            session_id: self.session_id.clone(),
        });
        Running::Stop
    }
}

impl Handler<Deliver> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: Deliver, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.last_heartbeat = Instant::now();

                match ClientCommand::parse(&text) {
                    Ok(command) => self.handle_command(command, ctx),
                    Err(invalid) => {
                        log::debug!(
                            "session {} sent a bad frame: {}",
                            self.session_id,
                            invalid.rejection.message
                        );
                        self.reject(invalid.id, invalid.rejection, ctx);
                    }
                }
            }
            Ok(ws::Message::Binary(_)) => {
                self.reject(None, Rejection::bad_request("binary frames are not supported"), ctx);
            }
            Ok(ws::Message::Close(reason)) => {
                log::info!("session {} closed: {:?}", self.session_id, reason);
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) => {
                ctx.stop();
            }
            Ok(ws::Message::Nop) => {}
            Err(e) => {
                log::warn!("session {} protocol error: {}", self.session_id, e);
                ctx.stop();
            }
        }
    }
}
