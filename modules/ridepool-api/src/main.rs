use std::sync::Arc;

use anyhow::Result;
use axum::{
    http::{header, HeaderValue},
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ridepool_common::Config;

mod auth;
mod jwt;
mod notify;
mod rest;
mod service;
mod store;

use jwt::JwtService;
use notify::{LogSink, NotificationSink, WebhookSink};
use store::{PgRideStore, RideStore};

pub struct AppState {
    pub store: Arc<dyn RideStore>,
    pub sink: Arc<dyn NotificationSink>,
    pub jwt: JwtService,
    pub config: Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("ridepool=info".parse()?))
        .init();

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    let store = PgRideStore::new(pool);
    store.migrate().await?;

    let sink: Arc<dyn NotificationSink> = match &config.notify_webhook_url {
        Some(url) => Arc::new(WebhookSink::new(url.clone())),
        None => Arc::new(LogSink),
    };

    let addr = format!("{}:{}", config.web_host, config.web_port);

    let state = Arc::new(AppState {
        store: Arc::new(store),
        sink,
        jwt: JwtService::new(&config.jwt_secret, config.jwt_issuer.clone()),
        config,
    });

    let app = Router::new()
        // Health check
        .route("/", get(|| async { "ok" }))
        // Auth
        .route("/api/auth/token", post(rest::api_mint_token))
        // Rides
        .route("/api/rides", post(rest::api_create_ride).get(rest::api_list_rides))
        .route("/api/rides/{id}", get(rest::api_ride_detail))
        .route("/api/rides/{id}/progress", get(rest::api_ride_progress))
        .route("/api/rides/{id}/status", post(rest::transition::api_update_status))
        .with_state(state)
        // CORS
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        // Ride state is live data; never cache it
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        // Logging layer: method + path + status + latency only
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        );

    info!("Ridepool API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
