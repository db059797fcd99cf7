use tracing_subscriber::fmt::init;

use marsim_api::{
    config::Config,
    services::{expiry_worker::ExpiryWorker, session_service::SessionService, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();

    let config = Config::load().expect("Failed to load configuration");

    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .expect("Failed to connect to MongoDB");

    let redis_client =
        redis::Client::open(config.redis_uri.clone()).expect("Failed to create Redis client");

    let app_state = AppState::new(config, mongo_client, redis_client)
        .await
        .expect("Failed to initialize app state");

    let session_service = SessionService::new(app_state.mongo.clone(), app_state.redis.clone());
    let worker = ExpiryWorker::new(session_service);

    worker.run().await?;

    Ok(())
}
