mod audit;
mod config;
mod db;
mod dtos;
mod error;
mod handler;
mod media;
mod middleware;
mod models;
mod moderation;
mod policy;
mod redisdb;
mod routes;
mod tracing_config;
mod utils;

use axum::http::{
    HeaderValue, Method,
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
};
use axum_client_ip::ClientIpSource;
use config::Config;
use db::{DBClient, IdentityExt};
use dotenv::dotenv;
use redisdb::RedisClient;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::audit::AuditLog;
use crate::media::MediaResolver;
use crate::moderation::ModerationWorkflow;

#[derive(Clone)]
pub struct AppState {
    pub env: Arc<Config>,
    pub db_client: DBClient,
    pub redis_client: RedisClient,
    pub workflow: ModerationWorkflow<DBClient>,
    pub audit_log: AuditLog,
    pub media: MediaResolver,
    pub ip_extraction: ClientIpSource,
}

fn exit_on<T, E: std::fmt::Display>(result: Result<T, E>, context: &str) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            tracing::error!("{}: {}", context, e);
            std::process::exit(1);
        }
    }
}

/// Create the configured admin account unless it already exists
async fn seed_admin(db_client: &DBClient, config: &Config) {
    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        return;
    };

    match db_client.get_admin_by_email(email).await {
        Ok(Some(_)) => tracing::debug!("Seed admin already present"),
        Ok(None) => {
            let hashed = exit_on(utils::password::hash(password.as_str()), "Invalid ADMIN_PASSWORD");
            match db_client.save_admin(email, &hashed).await {
                Ok(admin) => tracing::info!(admin_id = %admin.id, "Seed admin created"),
                Err(e) => tracing::error!("Failed to create seed admin: {}", e),
            }
        }
        Err(e) => tracing::error!("Failed to look up seed admin: {}", e),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() {
    let _guard = tracing_config::init_tracing();

    dotenv().ok();

    let config = exit_on(Config::init(), "Invalid configuration");

    let ip_source = if cfg!(debug_assertions) {
        ClientIpSource::ConnectInfo
    } else {
        ClientIpSource::CfConnectingIp
    };

    let pool = exit_on(
        PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await,
        "Failed to connect to the database",
    );
    tracing::info!("Connection to the database is successful");

    let db_client = DBClient::new(pool);
    exit_on(db_client.migrate().await, "Failed to run migrations");
    seed_admin(&db_client, &config).await;

    let cors = CorsLayer::new()
        .allow_origin(exit_on(
            config.frontend_url.parse::<HeaderValue>(),
            "Invalid FRONTEND_URL",
        ))
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ]);

    let redis = exit_on(redis::Client::open(config.redis_url.clone()), "Invalid REDIS_URL");
    let manager = exit_on(
        redis.get_connection_manager().await,
        "Failed to connect to redis",
    );
    let redis_client = RedisClient::new(manager);

    let media = match &config.media_host {
        Some(host) => MediaResolver::Hosted {
            client: reqwest::Client::new(),
            upload_url: host.upload_url.clone(),
            upload_preset: host.upload_preset.clone(),
            folder: host.folder.clone(),
        },
        None => MediaResolver::Local {
            dir: config.upload_dir.clone(),
        },
    };

    let (audit_log, _audit_writer) = AuditLog::spawn(db_client.clone());
    let workflow = ModerationWorkflow::new(db_client.clone(), audit_log.clone());

    let app_state = AppState {
        env: Arc::new(config.clone()),
        db_client,
        redis_client,
        workflow,
        audit_log: audit_log.clone(),
        media,
        ip_extraction: ip_source,
    };

    let app = routes::create_router(app_state).layer(cors);

    let listener = exit_on(
        tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await,
        "Failed to bind listener",
    );
    tracing::info!("Server is running on http://localhost:{}", config.port);

    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    {
        tracing::error!("Server error: {}", e);
    }

    // Drain queued audit entries before exit
    audit_log.flush().await;
    tracing::info!("Server stopped");
}
