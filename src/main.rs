use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    middleware,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use video_curator::{
    config::{Config, CurationSettings},
    db::{create_pool, create_redis_client, run_migrations, Cache, PgRecordStore},
    middleware::{make_span_with_request_id, request_id_middleware, USER_ID_HEADER},
    routes::{create_router, AppState},
    services::{Curator, OpenAiOracle, YouTubeProvider},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("video_curator=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let upstream_timeout = Duration::from_secs(config.upstream_timeout_secs);

    let pool = create_pool(&config.database_url).await?;
    run_migrations(&pool).await?;

    let redis_client = create_redis_client(&config.redis_url)?;
    let (cache, cache_writer) = Cache::new(redis_client).await;

    let catalogs = YouTubeProvider::new(cache, config.youtube_api_url.clone(), upstream_timeout)?;
    let oracle = OpenAiOracle::new(
        config.openai_api_key.clone(),
        config.openai_api_url.clone(),
        config.openai_model.clone(),
        upstream_timeout,
    )?;

    let curator = Curator::new(
        Arc::new(PgRecordStore::new(pool)),
        Arc::new(oracle),
        CurationSettings::from(&config),
    );
    let state = AppState::new(curator, Arc::new(catalogs));

    let mut app = create_router(state)
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(middleware::from_fn(request_id_middleware));

    if let Some(origin) = &config.cors_origin {
        let origin: HeaderValue = origin.parse()?;
        let cors = CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::PUT])
            .allow_headers([
                AUTHORIZATION,
                CONTENT_TYPE,
                HeaderName::from_static(USER_ID_HEADER),
            ])
            .allow_credentials(true);
        app = app.layer(cors);
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, max_daily_refreshes = config.max_daily_refreshes, "Video curator listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Flushing pending cache writes");
    cache_writer.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
