mod config;
mod engine;
mod services;
mod session;

use crate::config::ServerConfig;
use crate::engine::Engine;
use crate::session::SessionStore;
use actix_web::{web, App, HttpServer};
use env_logger::Env;
use log::{error, info};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Could not load .env file: {}", e);
        }
    }
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = ServerConfig::from_env().map_err(|e| {
        error!("Invalid configuration: {}", e);
        std::io::Error::other(e.to_string())
    })?;
    let engine = Engine::from_config(&config).map_err(|e| {
        error!("Cannot start grid engine: {}", e);
        std::io::Error::other(e.to_string())
    })?;
    let sessions = SessionStore::new(config.session_ttl, config.max_sessions);

    info!("Server running at http://{}:{}", config.host, config.port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::JsonConfig::default().limit(10 * 1024 * 1024)) // 10 MB
            .app_data(web::Data::new(engine.clone()))
            .app_data(web::Data::new(sessions.clone()))
            .service(services::grid::configure_routes())
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
