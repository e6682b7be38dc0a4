use std::net::SocketAddr;

use axum::{
    error_handling::HandleErrorLayer,
    http::{header, HeaderName, HeaderValue, Uri},
    routing::get,
    BoxError, Json, Router,
};
use serde_json::{json, Value};
use tower::{timeout::TimeoutLayer, ServiceBuilder};
use tower_http::{
    cors::CorsLayer, sensitive_headers::SetSensitiveRequestHeadersLayer,
    set_header::SetResponseHeaderLayer, trace::TraceLayer,
};

use crate::auth::middleware::TOKEN_HEADER;
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::state::AppState;
use crate::users;

const JSON_UTF8: &str = "application/json; charset=utf-8";

pub fn build_app(state: AppState) -> Router {
    let timeout = state.config.request_timeout;

    Router::new()
        .merge(users::router(&state))
        .route("/health", get(health))
        .fallback(route_not_found)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(|e: BoxError| async move { ApiError::from(e) }))
                .layer(TimeoutLayer::new(timeout)),
        )
        .layer(CorsLayer::permissive())
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_TYPE,
            HeaderValue::from_static(JSON_UTF8),
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, ?latency, "response");
                        } else {
                            tracing::info!(%status, ?latency, "response");
                        }
                    },
                ),
        )
        .layer(sensitive_headers())
}

/// Keeps bearer credentials out of trace output.
fn sensitive_headers() -> SetSensitiveRequestHeadersLayer {
    SetSensitiveRequestHeadersLayer::new([
        header::AUTHORIZATION,
        HeaderName::from_static(TOKEN_HEADER),
    ])
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn route_not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("route {}", uri.path()))
}

pub async fn serve(app: Router, config: &AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
