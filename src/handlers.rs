use crate::clustering::ClusterService;
use crate::config::Config;
use crate::consultation::{ConsultationController, StagePacing};
use crate::errors::{AppError, ConsultationError};
use crate::models::*;
use crate::notifier::{ChannelNotifier, CycleEvent, TracingNotifier};
use crate::webhook_client::{ProfileGateway, WebhookClient};
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::Instrument;
use uuid::Uuid;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Consultation flows (`opcion` "1" and "3").
    pub controller: ConsultationController,
    /// Cluster upload flow (`opcion` "2").
    pub clusters: ClusterService,
}

impl AppState {
    /// Builds the state around the real webhook client.
    pub fn new(config: Config) -> Result<Self, AppError> {
        let client = WebhookClient::new(config.webhook_url.clone(), config.webhook_timeout)?;
        Ok(Self::with_gateway(config, Arc::new(client)))
    }

    /// Builds the state around any gateway implementation.
    pub fn with_gateway(config: Config, gateway: Arc<dyn ProfileGateway>) -> Self {
        let pacing = if config.stage_pacing {
            StagePacing::standard()
        } else {
            StagePacing::immediate()
        };

        Self {
            controller: ConsultationController::new(gateway.clone(), pacing),
            clusters: ClusterService::with_default_tick(gateway),
            config,
        }
    }
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "rust-sales-hub",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// GET /api/v1/archetypes
///
/// Archetypes accepted by the consult-by-archetype flow.
pub async fn list_archetypes() -> Json<serde_json::Value> {
    Json(json!({ "archetypes": ARCHETYPES }))
}

/// POST /api/v1/consultations/client
///
/// Runs a consult-by-identifier cycle and answers once it has finished.
///
/// # Returns
///
/// * `Result<Json<ConsultationResponse>, AppError>` - The normalized profile or the error shown to the user.
pub async fn consult_client(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ConsultQuery>, JsonRejection>,
) -> Result<Json<ConsultationResponse>, AppError> {
    let Json(query) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let consultation_id = Uuid::new_v4();
    let echo = QueryEcho::from(&query);

    let profile = state
        .controller
        .consult_client(query, &TracingNotifier)
        .instrument(tracing::info_span!("consultation", %consultation_id, mode = "client"))
        .await?;

    Ok(Json(completed(consultation_id, profile, echo)))
}

/// POST /api/v1/consultations/archetype
///
/// Answers with the archetype sales strategy (or a plain profile when that is
/// what the webhook produced).
pub async fn consult_archetype(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ArchetypeQuery>, JsonRejection>,
) -> Result<Json<ConsultationResponse<ArchetypeReport>>, AppError> {
    let Json(query) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let consultation_id = Uuid::new_v4();
    let echo = QueryEcho::from(&query);

    let profile = state
        .controller
        .consult_archetype(query, &TracingNotifier)
        .instrument(tracing::info_span!("consultation", %consultation_id, mode = "archetype"))
        .await?;

    Ok(Json(completed(consultation_id, profile, echo)))
}

/// POST /api/v1/consultations/client/stream
///
/// Same cycle as [`consult_client`], streamed as Server-Sent Events:
/// `progress`, `notice` and a final `result` or `error` event.
pub async fn consult_client_stream(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ConsultQuery>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(query) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let consultation_id = Uuid::new_v4();
    let echo = QueryEcho::from(&query);
    let controller = state.controller.clone();

    Ok(stream_cycle(consultation_id, "client", move |notifier| async move {
        controller
            .consult_client(query, &notifier)
            .await
            .map(|profile| completed(consultation_id, profile, echo))
    }))
}

/// POST /api/v1/consultations/archetype/stream
pub async fn consult_archetype_stream(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ArchetypeQuery>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(query) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let consultation_id = Uuid::new_v4();
    let echo = QueryEcho::from(&query);
    let controller = state.controller.clone();

    Ok(stream_cycle(consultation_id, "archetype", move |notifier| async move {
        controller
            .consult_archetype(query, &notifier)
            .await
            .map(|profile| completed(consultation_id, profile, echo))
    }))
}

/// POST /api/v1/clusters
///
/// Forwards the multipart `file` part to the clustering flow.
pub async fn upload_clusters(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ClusterResponse>, AppError> {
    let mut upload = ClusterUpload {
        file_name: String::new(),
        content_type: None,
        bytes: Vec::new(),
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Could not read uploaded file: {}", e)))?;

        upload = ClusterUpload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        };
    }

    let upload_id = Uuid::new_v4();
    let message = state
        .clusters
        .upload(upload, &TracingNotifier)
        .instrument(tracing::info_span!("cluster_upload", %upload_id))
        .await?;

    Ok(Json(ClusterResponse {
        success: true,
        message,
    }))
}

fn completed<T>(consultation_id: Uuid, profile: T, query: QueryEcho) -> ConsultationResponse<T> {
    ConsultationResponse {
        consultation_id,
        profile,
        query,
        completed_at: Utc::now(),
    }
}

/// Runs one cycle in the background and streams its events.
///
/// The cycle keeps running if the browser goes away, so the tracker is still
/// cleared and the outcome logged.
fn stream_cycle<T, F, Fut>(consultation_id: Uuid, mode: &'static str, run: F) -> Response
where
    T: Serialize + Send + 'static,
    F: FnOnce(ChannelNotifier) -> Fut + Send + 'static,
    Fut: Future<Output = Result<ConsultationResponse<T>, ConsultationError>> + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (done_tx, done_rx) = oneshot::channel();

    tokio::spawn(
        async move {
            let outcome = run(ChannelNotifier::new(tx)).await;
            if done_tx.send(outcome).is_err() {
                tracing::debug!("Stream closed before the outcome was delivered");
            }
        }
        .instrument(tracing::info_span!("consultation", %consultation_id, mode)),
    );

    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            yield cycle_event(&event);
        }

        let terminal = match done_rx.await {
            Ok(Ok(response)) => Event::default().event("result").json_data(&response),
            Ok(Err(err)) => Event::default()
                .event("error")
                .json_data(json!({ "error": err.to_string(), "kind": err.kind() })),
            Err(_) => Event::default()
                .event("error")
                .json_data(json!({ "error": "Internal server error", "kind": "internal" })),
        };
        yield terminal;
    };

    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn cycle_event(event: &CycleEvent) -> Result<Event, axum::Error> {
    let name = match event {
        CycleEvent::Progress { .. } => "progress",
        CycleEvent::Upload { .. } => "upload",
        CycleEvent::Notice { .. } => "notice",
    };
    Event::default().event(name).json_data(event)
}

/// API routes, without state or outer layers.
pub fn api_routes(max_upload_bytes: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/archetypes", get(list_archetypes))
        .route("/api/v1/consultations/client", post(consult_client))
        .route("/api/v1/consultations/archetype", post(consult_archetype))
        .route(
            "/api/v1/consultations/client/stream",
            post(consult_client_stream),
        )
        .route(
            "/api/v1/consultations/archetype/stream",
            post(consult_archetype_stream),
        )
        .route("/api/v1/clusters", post(upload_clusters))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
}

/// Full application: health check, the given API routes, tracing and CORS.
pub fn router(state: Arc<AppState>, api: Router<Arc<AppState>>) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
