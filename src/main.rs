// src/main.rs - Lab seating grid and device assignment service
use actix_web::{
    middleware::{Logger, DefaultHeaders},
    web, App, HttpServer,
};
use actix_web::http::header;
use actix_cors::Cors;
use anyhow::Context;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    migrate::MigrateDatabase, Sqlite, SqlitePool,
};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Module declarations
mod config;
mod db;
mod error;
mod handlers;
mod inventory_handlers;
mod lab_handlers;
pub mod layout;
mod models;
pub mod repositories;
mod sessions;
pub mod validator;

use config::{load_config, Config};
use error::ApiError;
use repositories::{LabStore, SqliteLabStore};
use sessions::LabSessions;

pub struct AppState {
    pub store: Arc<dyn LabStore>,
    pub sessions: LabSessions,
    pub config: Config,
}

// ==================== ROUTES ====================

pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(handlers::health_check))
            .route("/device-types", web::get().to(inventory_handlers::get_device_types))
            .service(
                web::scope("/inventory")
                    .route("", web::get().to(inventory_handlers::search_inventory))
                    .route("", web::post().to(inventory_handlers::register_procurement)),
            )
            .service(
                web::scope("/labs")
                    .route("", web::get().to(lab_handlers::list_labs))
                    .route("", web::post().to(lab_handlers::create_lab))
                    .route("/{lab}", web::get().to(lab_handlers::get_lab))
                    .route("/{lab}/open", web::post().to(lab_handlers::open_lab))
                    .route("/{lab}/details", web::put().to(lab_handlers::update_details))
                    .route("/{lab}/save", web::post().to(lab_handlers::save_lab))
                    .route("/{lab}/session", web::delete().to(lab_handlers::close_session))
                    .route("/{lab}/resize", web::post().to(lab_handlers::resize_grid))
                    // Cells
                    .route("/{lab}/cells/place", web::post().to(lab_handlers::place_cell))
                    .route("/{lab}/cells/fill", web::post().to(lab_handlers::fill_rectangle))
                    .route("/{lab}/cells/clear", web::post().to(lab_handlers::clear_cells))
                    .route("/{lab}/cells/{row}/{col}", web::delete().to(lab_handlers::remove_cell))
                    .route("/{lab}/cells/{row}/{col}/devices", web::get().to(lab_handlers::cell_devices))
                    .route("/{lab}/cells/{row}/{col}/os", web::post().to(lab_handlers::toggle_cell_os))
                    // OS tags
                    .route("/{lab}/os/bulk", web::post().to(lab_handlers::bulk_os))
                    // Linked groups
                    .route("/{lab}/links", web::post().to(lab_handlers::create_link))
                    .route("/{lab}/links/{index}", web::delete().to(lab_handlers::remove_link))
                    // Equipment pool
                    .route("/{lab}/equipment", web::post().to(lab_handlers::add_equipment))
                    .route("/{lab}/equipment", web::delete().to(lab_handlers::remove_equipment))
                    .route("/{lab}/equipment/search", web::get().to(lab_handlers::search_equipment)),
            ),
    );
}

// ==================== MAIN ====================

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (this calls load_env_file internally)
    let config = load_config()?;

    setup_logging(&config)?;
    config.print_startup_info();

    setup_database(&config.database.url).await?;
    let pool = create_database_pool(&config.database).await?;
    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let app_state = Arc::new(AppState {
        store: Arc::new(SqliteLabStore::new(pool)),
        sessions: LabSessions::new(),
        config: config.clone(),
    });

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(bind = %bind_address, workers = ?config.server.workers, "Starting server");

    let server_config = config.clone();
    let mut server = HttpServer::new(move || {
        let cors = setup_cors(&server_config.security.allowed_origins);
        let json_config = web::JsonConfig::default()
            .limit(server_config.security.max_request_size)
            .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into());

        App::new()
            .wrap(cors)
            .wrap(setup_security_headers())
            .wrap(Logger::default())
            .app_data(web::Data::new(app_state.clone()))
            .app_data(json_config)
            .configure(configure_api)
    })
    .keep_alive(Duration::from_secs(config.server.keep_alive))
    .client_request_timeout(Duration::from_secs(config.server.client_timeout));

    if let Some(workers) = config.server.workers {
        server = server.workers(workers);
    }

    server
        .bind(&bind_address)
        .with_context(|| format!("Failed to bind {}", bind_address))?
        .run()
        .await?;

    Ok(())
}

pub fn setup_cors(allowed_origins: &[String]) -> Cors {
    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            header::CONTENT_TYPE,
            header::ACCEPT,
        ])
        .expose_headers(vec![header::CONTENT_LENGTH])
        .max_age(3600);

    if allowed_origins.iter().any(|origin| origin == "*") {
        log::warn!("⚠️ Using wildcard CORS (*)");
        cors = cors.allow_any_origin();
    } else {
        for origin in allowed_origins.iter().filter(|o| !o.is_empty()) {
            cors = cors.allowed_origin(origin);
        }
    }

    cors
}

fn setup_logging(config: &Config) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            let level = config.logging.level.as_str();
            tracing_subscriber::EnvFilter::new(level)
        });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("Failed to initialise logging")?;

    Ok(())
}

async fn setup_database(database_url: &str) -> anyhow::Result<()> {
    if database_url.contains(":memory:") {
        return Ok(());
    }
    if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
        log::info!("Creating database: {}", database_url);
        Sqlite::create_database(database_url).await?;
    }
    Ok(())
}

async fn create_database_pool(db_config: &config::DatabaseConfig) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&db_config.url)
        .with_context(|| format!("Invalid database URL: {}", db_config.url))?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(db_config.max_connections)
        .min_connections(db_config.min_connections)
        .acquire_timeout(Duration::from_secs(db_config.connect_timeout))
        .connect_with(options)
        .await
        .context("Failed to connect to database")?;
    Ok(pool)
}

fn setup_security_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("X-Frame-Options", "DENY"))
        .add(("Referrer-Policy", "strict-origin-when-cross-origin"))
}
