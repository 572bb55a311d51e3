use actix_cors::Cors;
use actix_files::Files;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::sync::Arc;
use std::time::Duration;

mod config;
mod controllers;
mod db;
mod middleware;
mod models;
mod webhook;

use config::Config;
use db::Database;
use webhook::automation::AutomationForwarder;
use webhook::media::{LocalMediaStorage, MediaRehoster};
use webhook::provider::ProviderClient;
use webhook::WebhookProcessor;

pub struct AppState {
    pub db: Arc<Database>,
    pub config: Config,
    pub webhook: Arc<WebhookProcessor>,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    let port = config.port;

    log::info!("Initializing database at {}", config.database_url);
    let db = match Database::new(&config.database_url) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            log::error!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    log::info!("Media storage at {:?}", config.media_dir);
    std::fs::create_dir_all(&config.media_dir)?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .build()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    let storage = Arc::new(LocalMediaStorage::new(&config.media_dir, &config.public_base_url));
    let provider = match &config.provider_api {
        Some(provider_api) => {
            log::info!("Provider API configured at {}", provider_api.base_url);
            Some(ProviderClient::new(http.clone(), provider_api.clone()))
        }
        None => {
            log::info!("EVOLUTION_API_URL not set - profile pictures will not be fetched");
            None
        }
    };
    let webhook = Arc::new(WebhookProcessor::new(
        db.clone(),
        MediaRehoster::new(http.clone(), storage.clone(), config.max_media_bytes),
        AutomationForwarder::new(http),
        provider,
    ));

    log::info!("Starting engage-backend on port {}", port);
    log::info!("Provider webhook available at POST /webhook/evolution");

    let media_root = storage.root().to_path_buf();

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(AppState {
                db: Arc::clone(&db),
                config: config.clone(),
                webhook: Arc::clone(&webhook),
            }))
            .wrap(Logger::default())
            .wrap(cors)
            .configure(controllers::health::config)
            .configure(controllers::webhook::config(config.max_media_bytes))
            .configure(controllers::companies::config)
            .configure(controllers::contacts::config)
            .configure(controllers::conversations::config)
            .configure(controllers::ai_settings::config)
            .configure(controllers::blocklist::config)
            .configure(controllers::campaigns::config)
            .service(Files::new("/media", media_root.clone()))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
