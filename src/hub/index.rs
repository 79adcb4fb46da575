use super::controller::{ws_connect, ws_connect_with_token};
use crate::middleware::auth::verify_token;
use actix_web::web;
use actix_web_httpauth::middleware::HttpAuthentication;

pub fn hub_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/ws")
            .service(
                web::resource("/connect")
                    .wrap(HttpAuthentication::bearer(verify_token))
                    .route(web::get().to(ws_connect)),
            )
            .route("/connect/token", web::get().to(ws_connect_with_token)),
    );
}
