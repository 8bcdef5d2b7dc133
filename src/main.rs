use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use pairmatch::auth::Authenticator;
use pairmatch::config::{LoggingSettings, Settings, StoreBackend};
use pairmatch::core::Matcher;
use pairmatch::routes::{self, AppState};
use pairmatch::services::{
    CachedPool, CandidatePool, InMemoryStore, MatchService, PairingStore, PostgresClient,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(section: &LoggingSettings) {
    let logging = section.with_overrides(
        std::env::var("LOG_LEVEL").ok(),
        std::env::var("LOG_FORMAT").ok(),
    );

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if logging.is_pretty() {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

fn io_error(message: String) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, message)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let loaded = Settings::load();

    // A broken config still gets logged, with the default logging section
    let logging = loaded.as_ref().map(|s| s.logging.clone()).unwrap_or_default();
    init_logging(&logging);

    info!("Starting pairmatch service...");

    let settings = loaded.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        io_error(format!("Configuration error: {}", e))
    })?;

    info!("Configuration loaded successfully");

    if settings.auth.jwt_secret.is_empty() {
        warn!("auth.jwt_secret is empty; every request will be rejected");
    }

    let (pool, store): (Arc<dyn CandidatePool>, Arc<dyn PairingStore>) = match settings.database.backend {
        StoreBackend::Postgres => {
            let postgres = Arc::new(
                PostgresClient::from_settings(
                    &settings.database.url,
                    settings.database.max_connections,
                    settings.database.min_connections,
                    settings.database.acquire_timeout_secs,
                    settings.database.idle_timeout_secs,
                    settings.matching.commit_retries,
                )
                .await
                .map_err(|e| {
                    error!("Failed to connect to PostgreSQL: {}", e);
                    io_error(format!("PostgreSQL connection error: {}", e))
                })?,
            );
            info!("PostgreSQL store initialized");
            (postgres.clone() as Arc<dyn CandidatePool>, postgres as Arc<dyn PairingStore>)
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory store; sessions are lost on restart");
            let memory = Arc::new(InMemoryStore::new());
            (memory.clone() as Arc<dyn CandidatePool>, memory as Arc<dyn PairingStore>)
        }
    };

    let pool: Arc<dyn CandidatePool> = if settings.cache.pool_ttl_secs > 0 {
        info!(
            "Pool snapshot cache enabled (capacity: {}, TTL: {}s)",
            settings.cache.pool_capacity, settings.cache.pool_ttl_secs
        );
        Arc::new(CachedPool::new(pool, settings.cache.pool_capacity, settings.cache.pool_ttl_secs))
    } else {
        pool
    };

    let weights = settings.scoring.weights.to_weights();
    let matcher = Matcher::new(weights);

    info!("Matcher initialized with weights: {:?}", weights);

    let service = MatchService::new(pool, store, matcher, settings.matching.policy());

    let app_state = AppState {
        service: Arc::new(service),
        authenticator: Authenticator::new(
            &settings.auth.jwt_secret,
            settings.auth.issuer.as_deref(),
            settings.auth.leeway_secs,
        ),
    };

    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(routes::handle_json_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
