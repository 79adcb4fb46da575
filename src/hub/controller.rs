use actix::Addr;
use actix_web::{HttpRequest, HttpResponse, web};
use actix_web_actors::ws;
use serde::Deserialize;

use crate::hub::router::EventRouter;
use crate::hub::server::HubServer;
use crate::hub::session::WsSession;
use crate::middleware::auth::{Identity, IdentityGate, identity_from_request};
use crate::utils::error::CustomError;

/// WebSocket connection, authenticated by the bearer middleware
/// GET /ws/connect
pub async fn ws_connect(
    req: HttpRequest,
    stream: web::Payload,
    hub: web::Data<Addr<HubServer>>,
    router: web::Data<EventRouter>,
    gate: web::Data<IdentityGate>,
) -> Result<HttpResponse, actix_web::Error> {
    let identity = identity_from_request(&req)
        .ok_or_else(|| CustomError::UnauthenticatedError("missing credentials".to_string()))?;

    start_session(identity, req, stream, hub, router, gate)
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    #[serde(default)]
    pub token: Option<String>,
}

/// WebSocket connection with the token in the query string, for clients
/// that cannot set headers
/// GET /ws/connect/token?token=<jwt>
pub async fn ws_connect_with_token(
    req: HttpRequest,
    stream: web::Payload,
    query: web::Query<TokenQuery>,
    hub: web::Data<Addr<HubServer>>,
    router: web::Data<EventRouter>,
    gate: web::Data<IdentityGate>,
) -> Result<HttpResponse, actix_web::Error> {
    let token = query
        .token
        .as_deref()
        .filter(|token| !token.is_empty())
        .ok_or_else(|| CustomError::UnauthenticatedError("missing token".to_string()))?;

    let identity = gate.verify(token).map_err(|e| {
        log::info!("refused connection: {}", e);
        e
    })?;

    start_session(identity, req, stream, hub, router, gate)
}

fn start_session(
    identity: Identity,
    req: HttpRequest,
    stream: web::Payload,
    hub: web::Data<Addr<HubServer>>,
    router: web::Data<EventRouter>,
    gate: web::Data<IdentityGate>,
) -> Result<HttpResponse, actix_web::Error> {
    log::info!("websocket connection from user {}", identity.user_id);

    let session = WsSession::new(
        identity,
        hub.get_ref().clone(),
        router.into_inner(),
        gate.into_inner(),
    );

    ws::start(session, &req, stream)
}
