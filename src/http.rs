//! HTTP-facing status and control API.
//!
//! `GET /api/status?tab={id}` returns the cached reading (or `null`),
//! `GET /api/status/stream` pushes one server-sent event per cache update,
//! and `POST /api/status` turns a command request into a frame and publishes
//! it. A static shared secret in the `Authorization` header gates every
//! request unless reads are explicitly opened up.

use crate::config::{HttpConfig, TlsConfig};
use crate::mqtt::{self, StatusEvent};
use anyhow::{Context, Result};
use axum::{
    extract::{Query, Request, State},
    http::{header::AUTHORIZATION, Method, StatusCode},
    middleware::{self, Next},
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use coilbridge_lib::{cache::StateCache, command, profile::Device, protocol::Reading};
use futures::stream::{Stream, StreamExt};
use log::*;
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

/// Shared resources for the API handlers.
pub struct AppState {
    pub cache: Arc<StateCache>,
    pub client: paho_mqtt::AsyncClient,
    pub events: broadcast::Sender<StatusEvent>,
    pub token: Option<String>,
    pub open_reads: bool,
}

#[derive(Debug, Deserialize)]
struct StatusQuery {
    tab: Option<String>,
}

/// An external request to change coil state. Transient, never persisted.
#[derive(Debug, Deserialize)]
struct CommandRequest {
    tab: String,
    coils: Vec<u8>,
    #[serde(default)]
    status: u16,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/status", get(get_status).post(post_status))
        .route("/api/status/stream", get(stream_status))
        .layer(middleware::from_fn_with_state(state.clone(), require_token))
        .with_state(state)
}

/// Serves the API, with TLS when certificate material is configured.
pub async fn serve(config: &HttpConfig, state: Arc<AppState>) -> Result<()> {
    let app = router(state);
    match &config.tls {
        Some(TlsConfig { cert, key }) => {
            let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert, key)
                .await
                .with_context(|| format!("Cannot load TLS material from {cert:?}/{key:?}"))?;
            info!("Serving https on {}", config.listen);
            axum_server::bind_rustls(config.listen, tls)
                .serve(app.into_make_service())
                .await
                .with_context(|| "Https server failed")
        }
        None => {
            let listener = tokio::net::TcpListener::bind(config.listen)
                .await
                .with_context(|| format!("Cannot bind {}", config.listen))?;
            info!("Serving http on {}", config.listen);
            axum::serve(listener, app)
                .await
                .with_context(|| "Http server failed")
        }
    }
}

async fn require_token(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(token) = &state.token {
        let exempt = state.open_reads && request.method() == Method::GET;
        if !exempt {
            let presented = request
                .headers()
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok());
            if presented != Some(token.as_str()) {
                return StatusCode::UNAUTHORIZED.into_response();
            }
        }
    }
    next.run(request).await
}

/// Latest cached reading for one device, `null` while none has arrived.
async fn get_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatusQuery>,
) -> Json<Option<Reading>> {
    let reading = query
        .tab
        .as_deref()
        .and_then(Device::from_tab)
        .and_then(|device| state.cache.get(device));
    Json(reading)
}

/// Long-lived push variant: one named event per cache update.
async fn stream_status(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let updates = BroadcastStream::new(state.events.subscribe()).filter_map(|item| async move {
        match item {
            Ok((device, reading)) => Event::default()
                .event(device.as_str())
                .json_data(&reading)
                .map(Ok)
                .ok(),
            // A lagging subscriber only misses intermediate updates; the
            // next event carries the current state again.
            Err(BroadcastStreamRecvError::Lagged(_)) => None,
        }
    });
    Sse::new(updates).keep_alive(KeepAlive::default())
}

/// Builds and publishes a command frame; nothing is published on failure.
async fn post_status(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CommandRequest>,
) -> Response {
    let Some(device) = Device::from_tab(&request.tab) else {
        return client_error(format!("unknown tab '{}'", request.tab));
    };

    let frame = match command::build_command(device, &request.coils, request.status) {
        Ok(frame) => frame,
        Err(err) => {
            debug!("Rejected command for {device}: {err}");
            return client_error(err.to_string());
        }
    };

    match mqtt::publish_command(&state.client, device, frame).await {
        Ok(()) => Json(json!({ "ok": true })).into_response(),
        Err(err) => {
            error!("{err:#}");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "publish failed" })),
            )
                .into_response()
        }
    }
}

fn client_error(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}
