use mongodb::bson::doc;
use mongodb::{Client, options::ClientOptions};
use std::error::Error;

use crate::utils::config::MongoConfig;

pub struct Database {
    pub client: Client,
}

impl Database {
    pub async fn init(config: &MongoConfig) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let mut client_options = ClientOptions::parse(&config.uri).await?;
        client_options.app_name = Some("comment-hub".to_string());

        let client = Client::with_options(client_options)?;

        // Ping the server to see if you can connect to the cluster
        client
            .database("admin")
            .run_command(doc! {"ping": 1})
            .await?;

        log::info!("Connected successfully to MongoDB");

        Ok(Self { client })
    }
}

pub async fn connect_to_mongo(config: &MongoConfig) -> Result<Client, Box<dyn Error + Send + Sync>> {
    let database = Database::init(config).await.map_err(|e| {
        log::error!("Failed to initialize database: {:?}", e);
        e
    })?;
    Ok(database.client)
}
