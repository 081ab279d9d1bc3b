use actix_web::HttpServer;
use ecotrack_api::{
    AppConfig, AppState, LoggingConfig, StartupError, build_cache, create_app,
    logging::init_tracing,
};
use tracing::info;

#[actix_web::main]
async fn main() -> Result<(), StartupError> {
    dotenvy::dotenv().ok();

    init_tracing(&LoggingConfig::from_env()).map_err(|e| StartupError::Logging(e.to_string()))?;

    let config = AppConfig::from_env()?;
    let cache = build_cache(&config.cache);
    let state = AppState::from_config(&config, cache)?;

    info!(
        bind_address = %config.bind_address,
        provider_mode = %config.provider_mode,
        cache = state.service.cache_backend(),
        "Starting EcoTrack API"
    );

    HttpServer::new(move || create_app(state.clone()))
        .bind(&config.bind_address)?
        .run()
        .await?;

    Ok(())
}
