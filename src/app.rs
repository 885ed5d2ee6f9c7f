use std::{net::SocketAddr, time::Duration};

use axum::{routing::get, Router};
use axum_extra::extract::cookie::CookieJar;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{self, cookie::SESSION_COOKIE};
use crate::state::AppState;

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest("/api/users", auth::router())
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let has_session = CookieJar::from_headers(req.headers())
                        .get(SESSION_COOKIE)
                        .is_some();
                    tracing::info_span!(
                        "account_request",
                        method = %req.method(),
                        path = %req.uri().path(),
                        has_session,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", status.as_u16());
                        span.record("latency_ms", latency.as_millis() as u64);
                        if status.is_server_error() {
                            tracing::error!(%status, "request failed");
                        } else if status.is_client_error() {
                            tracing::warn!(%status, "request rejected");
                        } else {
                            tracing::debug!(%status, "request served");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
