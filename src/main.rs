use std::io;
use std::sync::Arc;

use actix::Actor;
use actix_web::http::StatusCode;
use actix_web::middleware::{ErrorHandlers, Logger};
use actix_web::{App, HttpResponse, HttpServer, Responder, get, web};
use dotenv::dotenv;
use env_logger::Env;
use log::info;
use serde_json::json;

mod comment;
mod database;
mod hub;
mod middleware;
mod router;
mod user;
mod utils;

use comment::service::CommentService;
use database::mongo::MongoStorage;
use database::redis::UserUpdatedConsumer;
use hub::handlers::MutationHandlers;
use hub::router::EventRouter;
use hub::server::HubServer;
use middleware::auth::IdentityGate;
use middleware::error_handler::handle_error;
use middleware::not_found::not_found;
use router::index::routes;
use user::directory::UserDirectoryClient;
use user::service::{FallbackPolicy, UserService};
use user::source::UserSource;
use utils::config::AppConfig;

#[get("/")]
async fn default() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Comment hub is running",
        "httpStatusCode": StatusCode::OK.as_u16(),
        "service": std::env::var("SERVICE_NAME").unwrap_or_else(|_| "Unknown".to_string()),
    }))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env();

    let mongo_client = database::connect_to_mongo(&config.mongo)
        .await
        .map_err(|e| io::Error::other(format!("failed to connect to MongoDB: {e}")))?;
    let storage = Arc::new(MongoStorage::new(&mongo_client, &config.mongo.database_name));
    let directory = UserDirectoryClient::new(&config.user_directory).map_err(io::Error::other)?;

    // Local cache first, then the directory.
    let users = Arc::new(UserService::new(
        vec![
            storage.clone() as Arc<dyn UserSource>,
            Arc::new(directory) as Arc<dyn UserSource>,
        ],
        FallbackPolicy::default(),
        config.cache_repair_timeout,
    ));
    let comments = Arc::new(CommentService::new(storage, users.clone()));

    let hub = HubServer::new(config.history).start();
    let handlers = MutationHandlers::new(comments.clone(), Arc::new(hub.clone()));
    let event_router = web::Data::new(EventRouter::new(Arc::new(handlers)));
    let gate = web::Data::new(IdentityGate::new(&config.jwt_secret));
    let comments = web::Data::from(comments);
    let hub = web::Data::new(hub);

    match &config.redis_url {
        Some(url) => match UserUpdatedConsumer::new(url, &config.user_events_channel, users) {
            Ok(consumer) => {
                actix_web::rt::spawn(consumer.run());
            }
            Err(e) => log::error!("user update consumer disabled: {}", e),
        },
        None => log::info!("REDIS_URL is not set, user updates will not be consumed"),
    }

    info!(
        "Starting {} on http://{}:{}",
        config.service_name, config.http_host, config.http_port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(gate.clone())
            .app_data(comments.clone())
            .app_data(event_router.clone())
            .app_data(hub.clone())
            .configure(routes)
            .wrap(
                ErrorHandlers::new()
                    .handler(StatusCode::NOT_FOUND, not_found)
                    .default_handler(handle_error),
            )
            .service(default)
    })
    .bind((config.http_host.clone(), config.http_port))?
    .run()
    .await?;

    info!("Server has stopped");

    Ok(())
}
