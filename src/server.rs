use crate::{
    config::{canonical_root, Config, RouteShape},
    errors::{into_response, AppError},
    files,
    security::SafeFileResolver,
};
use axum::{
    extract::{Path as RoutePath, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::{sync::Arc, time::Instant};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub resolver: Arc<SafeFileResolver>,
}

impl AppState {
    /// Pins the root to its canonical absolute form before any request is served.
    pub fn new(cfg: Config) -> anyhow::Result<Self> {
        let root = canonical_root(&cfg.root.root_dir)?;
        let resolver = SafeFileResolver::new(root)?;
        Ok(Self { cfg: Arc::new(cfg), resolver: Arc::new(resolver) })
    }
}

pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr: std::net::SocketAddr =
        format!("{}:{}", state.cfg.server.bind_addr, state.cfg.server.port).parse()?;
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(shared: AppState) -> Router {
    let base = shared.cfg.server.base_path.clone();
    let files_route = match shared.cfg.server.route_shape {
        RouteShape::Remainder => format!("{base}/*path"),
        RouteShape::Segment => format!("{base}/:name"),
    };
    Router::new()
        .route("/healthz", get(health))
        .route(&files_route, get(fetch))
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status":"ok"})))
}

async fn fetch(State(state): State<AppState>, RoutePath(fragment): RoutePath<String>) -> Response {
    let started = Instant::now();
    let request_id = uuid::Uuid::new_v4().to_string();

    let path = match state.resolver.resolve(&fragment) {
        Ok(p) => p,
        Err(denial) => {
            tracing::warn!(
                request_id = %request_id,
                fragment = %fragment.escape_debug(),
                reason = denial.code(),
                "request denied"
            );
            let err = AppError::from(denial);
            audit(&request_id, &fragment, "deny", err.code(), started.elapsed().as_millis() as u64, 0);
            return into_response(&err).into_response();
        }
    };

    match files::open_within_root(&state.resolver, &path, state.cfg.root.confine_symlinks).await {
        Ok(file) => {
            audit(&request_id, &fragment, "allow", "OK", started.elapsed().as_millis() as u64, file.len);
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, file.content_type.to_string()),
                    (header::CONTENT_LENGTH, file.len.to_string()),
                ],
                file.body,
            )
                .into_response()
        }
        Err(e) => {
            let decision = match &e {
                AppError::Denied(denial) => {
                    tracing::warn!(
                        request_id = %request_id,
                        fragment = %fragment.escape_debug(),
                        reason = denial.code(),
                        "symlink leads outside root"
                    );
                    "deny"
                }
                AppError::NotFound => "miss",
                AppError::Internal(msg) => {
                    tracing::error!(
                        request_id = %request_id,
                        path = %path.display(),
                        error = %msg,
                        "file read failed"
                    );
                    "error"
                }
            };
            audit(&request_id, &fragment, decision, e.code(), started.elapsed().as_millis() as u64, 0);
            into_response(&e).into_response()
        }
    }
}

fn audit(request_id: &str, fragment: &str, decision: &str, code: &str, duration_ms: u64, bytes_out: u64) {
    tracing::info!(
        request_id = request_id,
        fragment = %fragment.escape_debug(),
        decision = decision,
        code = code,
        duration_ms = duration_ms,
        bytes_out = bytes_out,
        "audit"
    );
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutting down");
}
