pub mod handlers;
pub mod types;

use crate::{Result, bridge::QueryBridge, config::Config, transport::create_transport};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{Method, header},
    routing::{get, post},
};
use handlers::AppState;
use std::net::SocketAddr;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

const BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(handlers::status))
        .route(handlers::QUERY_PATH, post(handlers::query))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(config: Config) -> Result<()> {
    // Transport resolution (interpreter lookup included) happens once, here.
    let transport = create_transport(&config)?;
    let bridge = QueryBridge::new(transport, &config.bridge);

    info!(
        "Query bridge ready: transport={}, deadline={:?}",
        bridge.transport_name(),
        bridge.deadline()
    );

    let app = router(AppState::new(bridge));

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
