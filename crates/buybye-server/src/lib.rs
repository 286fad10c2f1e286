//! HTTP boundary for the synchronization engine.
//!
//! Every concept operation answers at `POST {base}/{Concept}/{op}`; the
//! passthrough table decides whether a call goes straight to the concept or
//! through `Requesting.request` and the rules.

pub mod error;
pub mod routes;
pub mod state;

use axum::routing::post;
use axum::Router;
use buybye_core::Config;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the axum Router with the concept routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: state::AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let catch_all = format!("{}/{{*path}}", app_state.routes.base_url());

    Router::new()
        .route(&catch_all, post(routes::concepts::call_concept))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the server on `config.server.port`.
pub async fn serve(config: &Config) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(config, listener).await
}

/// Start the server on a pre-bound listener.
///
/// Unlike `serve`, this accepts a `TcpListener` that was already bound so the
/// caller can read the actual port before starting (useful when `port = 0` and
/// the OS picks a free port).
pub async fn serve_on(config: &Config, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let app = build_router(state::AppState::from_config(config)?);

    tracing::info!(
        base_url = %config.server.base_url,
        "buybye server listening on http://localhost:{actual_port}"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
