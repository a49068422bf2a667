//! HTTP surface of the relay.
//!
//! Everything is served from `/`. The origin check runs first and its 403
//! carries no CORS headers; every other answer except 405 does.

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN,
};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use engify_core::RelaySuccessBody;
use engify_logging::{engify_debug, engify_error, engify_info, engify_warn};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;

use crate::error::RelayError;
use crate::fallback::FallbackEngine;
use crate::validate::{check_origin, parse_payload};

const ALLOWED_METHODS: &str = "POST, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type";

#[derive(Clone)]
pub struct RelayState {
    engine: Arc<FallbackEngine>,
}

impl RelayState {
    pub fn new(engine: FallbackEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}

#[derive(Debug, Serialize)]
struct Liveness {
    status: &'static str,
}

fn request_origin(headers: &HeaderMap) -> Option<&str> {
    headers.get(ORIGIN).and_then(|value| value.to_str().ok())
}

pub fn router(state: RelayState) -> Router {
    Router::new()
        .route("/", any(handle_root))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn_with_state(state.clone(), apply_cors))
        .with_state(state)
}

async fn handle_root(
    State(state): State<RelayState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let config = state.engine.config();
    if let Err(err) = check_origin(request_origin(&headers), &config.allowed_origin_prefixes) {
        engify_warn!("Rejected {} from origin {:?}", method, request_origin(&headers));
        return err.into_response();
    }

    match method {
        Method::OPTIONS => StatusCode::OK.into_response(),
        Method::GET => Json(Liveness { status: "ok" }).into_response(),
        Method::POST => match handle_post(&state, &body).await {
            Ok(enhanced_text) => Json(RelaySuccessBody {
                success: true,
                enhanced_text,
            })
            .into_response(),
            Err(err) => {
                engify_debug!("Request failed with {}: {}", err.status(), err);
                err.into_response()
            }
        },
        _ => RelayError::MethodNotAllowed.into_response(),
    }
}

async fn handle_post(state: &RelayState, body: &[u8]) -> Result<String, RelayError> {
    let request = parse_payload(body, state.engine.config())?;
    engify_info!(
        "Relay request: mode={} text_len={} context_len={} caller_key={}",
        request.mode,
        request.text.chars().count(),
        request
            .context
            .as_deref()
            .map_or(0, |context| context.chars().count()),
        request.api_key.is_some()
    );
    state.engine.handle(&request).await
}

/// Adds CORS headers for allowed origins. 403 and 405 stay bare.
async fn apply_cors(State(state): State<RelayState>, request: Request, next: Next) -> Response {
    let origin = request_origin(request.headers()).map(str::to_string);
    let mut response = next.run(request).await;

    let status = response.status();
    if status == StatusCode::FORBIDDEN || status == StatusCode::METHOD_NOT_ALLOWED {
        return response;
    }
    let allowed_prefixes = &state.engine.config().allowed_origin_prefixes;
    let Some(origin) =
        origin.filter(|origin| check_origin(Some(origin.as_str()), allowed_prefixes).is_ok())
    else {
        return response;
    };
    let Ok(origin) = HeaderValue::from_str(&origin) else {
        return response;
    };

    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    response
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    engify_error!("Relay handler panicked: {}", detail);
    RelayError::Internal.into_response()
}

/// Binds `addr` and serves until Ctrl+C.
pub async fn run(addr: SocketAddr, state: RelayState) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    engify_info!("Relay listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    engify_info!("Relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        engify_error!("Failed to listen for Ctrl+C: {}", err);
        std::future::pending::<()>().await;
    }
    engify_info!("Shutdown requested");
}
