use crate::{
    cli::telemetry,
    flows::{BlockCache, BlockStore, DisabledBlockCache, FlowRegistry, PgBlockStore, RedisBlockCache},
    APP_USER_AGENT,
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    Extension, Router,
};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;

pub mod handlers;
mod openapi;

pub use handlers::FlowState;
pub use openapi::openapi;

const REQUEST_ID: &str = "x-request-id";

/// Server settings resolved by the CLI.
#[derive(Debug)]
pub struct Config {
    pub port: u16,
    pub dsn: SecretString,
    pub redis_url: Option<SecretString>,
    pub db_max_connections: u32,
    pub registry: FlowRegistry,
}

/// Connect backends, run migrations and serve until a shutdown signal.
///
/// # Errors
/// Returns an error if the database or Redis cannot be reached at startup,
/// migrations fail, or the listener cannot be bound.
pub async fn new(config: Config) -> Result<()> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(config.db_max_connections)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(config.dsn.expose_secret())
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    let cache: Arc<dyn BlockCache> = match &config.redis_url {
        Some(url) => Arc::new(
            RedisBlockCache::connect(url.expose_secret())
                .await
                .context("Failed to connect to Redis")?,
        ),
        None => {
            info!("No Redis URL configured, block cache disabled");
            Arc::new(DisabledBlockCache)
        }
    };

    let state = FlowState::with_backends(
        config.registry,
        |kind| -> Arc<dyn BlockStore> { Arc::new(PgBlockStore::new(pool.clone(), kind)) },
        cache,
    );

    let listener = TcpListener::bind(format!("::0:{}", config.port)).await?;

    info!("{APP_USER_AGENT} listening on [::]:{}", config.port);

    axum::serve(listener, app(Arc::new(state)).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    telemetry::shutdown_tracer();

    Ok(())
}

/// Routes plus request-id and tracing layers over `state`.
pub fn app(state: Arc<FlowState>) -> Router {
    let (router, _openapi) = openapi::api_router().split_for_parts();
    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static(REQUEST_ID),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                REQUEST_ID,
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(Extension(state)),
    )
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}
