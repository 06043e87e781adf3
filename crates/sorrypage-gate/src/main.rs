use actix_web::{middleware::Logger, web, App, HttpServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sorrypage::{config::ServerConfig, metrics::register_metrics, proxy, routes, state::AppState};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e)
    })?;
    let port = config.port;

    tracing::info!("Starting sorrypage-gate on port {}", port);
    tracing::info!("Origin: {}", config.origin_url);
    tracing::info!(
        "Sorrypage mode: {}",
        if config.sorrypage.enabled {
            "enabled"
        } else {
            "disabled"
        }
    );

    register_metrics();

    let state = AppState::new(config).map_err(|e| {
        tracing::error!("Refusing to install sorrypage gate: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e)
    })?;
    let gate = state.gate.clone();
    let state_data = web::Data::new(state);

    HttpServer::new(move || {
        App::new()
            .app_data(state_data.clone())
            .app_data(web::PayloadConfig::new(proxy::MAX_REQUEST_BODY_SIZE))
            .wrap(Logger::default())
            .configure(routes::configure(gate.clone()))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
