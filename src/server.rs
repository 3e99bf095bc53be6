use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::{AppConfig, LoggingMode};
use crate::models::{RpcErrorReply, RpcExceptionReply};
use crate::services::rpc_service::{RpcError, RpcRegistry, RpcReply};
use crate::services::{graph_service, time_service};

#[derive(Clone)]
struct AppState {
    registry: Arc<RpcRegistry>,
    logging_mode: LoggingMode,
}

/// Registry holding every built-in RPC, with the named ones switched off
pub fn default_registry(disabled: &[String]) -> Result<RpcRegistry, RpcError> {
    let mut registry = RpcRegistry::new();
    registry.register_all(graph_service::rpcs())?;
    for name in disabled {
        registry.disable(name)?;
        info!("RPC '{}' disabled by configuration", name);
    }
    Ok(registry)
}

/// Build the HTTP routes: `/api/get_time`, `/api/rpcs` and, when configured, the static client
pub fn router(config: &AppConfig, registry: RpcRegistry) -> Router {
    let state = AppState {
        registry: Arc::new(registry),
        logging_mode: config.logging_mode,
    };

    let api = Router::new()
        .route("/get_time", get(get_time_handler))
        .route("/rpcs", post(rpc_handler))
        .with_state(state);

    let mut app = Router::new().nest("/api", api);
    if let Some(dir) = &config.client_dir {
        info!("Serving client files from {}", dir.display());
        app = app.fallback_service(ServeDir::new(dir));
    }

    // Keep browsers from caching any response
    app.layer(SetResponseHeaderLayer::overriding(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    ))
    .layer(SetResponseHeaderLayer::overriding(
        header::EXPIRES,
        HeaderValue::from_static("0"),
    ))
    .layer(TraceLayer::new_for_http())
}

/// Bind the configured port and serve until the process is stopped
pub async fn serve(config: &AppConfig, registry: RpcRegistry) -> std::io::Result<()> {
    if registry.is_empty() {
        warn!("No RPCs registered; every call to /api/rpcs will be rejected");
    }
    let rpc_count = registry.len();
    let app = router(config, registry);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = TcpListener::bind(addr).await?;
    info!("🚀 HTTP API listening on {} with {} RPC(s)", listener.local_addr()?, rpc_count);

    axum::serve(listener, app).await
}

async fn get_time_handler() -> impl IntoResponse {
    Json(time_service::current_time())
}

async fn rpc_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let request: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            warn!("Malformed RPC request: {}", e);
            let reply = RpcErrorReply { error: format!("Malformed RPC request: {}", e) };
            return (StatusCode::BAD_REQUEST, Json(reply)).into_response();
        }
    };

    match state.registry.dispatch(&request, state.logging_mode).await {
        RpcReply::Json(value) => (StatusCode::OK, Json(value)).into_response(),
        RpcReply::Empty => StatusCode::OK.into_response(),
        RpcReply::Error(error) => (StatusCode::OK, Json(RpcErrorReply { error })).into_response(),
        RpcReply::Exception(exception) => {
            (StatusCode::INTERNAL_SERVER_ERROR, Json(RpcExceptionReply { exception })).into_response()
        }
        RpcReply::Forbidden => StatusCode::FORBIDDEN.into_response(),
    }
}
