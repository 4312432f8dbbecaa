//! HTTP server for the ldifgen API.
//!
//! # API Endpoints
//!
//! | Method | Path                          | Description                         |
//! |--------|-------------------------------|-------------------------------------|
//! | GET    | `/health`                     | Health check                        |
//! | GET    | `/api/schemas`                | Registered schemas                  |
//! | POST   | `/api/parse`                  | Validate an uploaded file           |
//! | POST   | `/api/generate`               | Create and process a job at once    |
//! | POST   | `/api/jobs`                   | Create a pending job (JSON body)    |
//! | GET    | `/api/jobs`                   | List jobs, `?status=` filter        |
//! | POST   | `/api/upload/{format}`        | Create a pending job from a file    |
//! | GET    | `/api/jobs/{id}`              | Job snapshot                        |
//! | POST   | `/api/jobs/{id}/process`      | Run a pending job                   |
//! | POST   | `/api/jobs/{id}/cancel`       | Cancel a pending job                |
//! | GET    | `/api/jobs/{id}/result`       | Output JSON, file on `?download`    |
//! | GET    | `/api/logs`                   | SSE stream of job activity          |

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::{AllowOrigin, CorsLayer};

use super::logs::{log_info, LOG_BROADCASTER};
use super::types::{AppState, JobRequest, ListJobsQuery, ParseQuery, ResultQuery, UploadQuery};
use crate::config::Settings;
use crate::error::{ServerError, ServerResult};
use crate::jobs::{GenerationJob, JobInput, JobManager};
use crate::models::{DataFormat, ParsingResult};
use crate::schema::SchemaSummary;

/// Largest accepted upload.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Build the router. Exposed separately from [`start_server`] for tests.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings.allowed_origins);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/schemas", get(list_schemas))
        .route("/api/parse", post(parse_upload))
        .route("/api/generate", post(generate_now))
        .route("/api/jobs", post(create_job).get(list_jobs))
        .route("/api/upload/{format}", post(upload_job))
        .route("/api/jobs/{id}", get(get_job))
        .route("/api/jobs/{id}/process", post(process_job))
        .route("/api/jobs/{id}/cancel", post(cancel_job))
        .route("/api/jobs/{id}/result", get(job_result))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(settings: Settings, manager: Arc<JobManager>) -> Result<(), Box<dyn std::error::Error>> {
    let port = settings.port;
    let app = router(AppState::new(manager, settings));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log_info(format!("ldifgen server listening on http://{}", addr));

    axum::serve(listener, app).await?;
    Ok(())
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    if allowed_origins.is_empty() {
        return layer.allow_origin(tower_http::cors::Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

// =============================================================================
// Handlers
// =============================================================================

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "ldifgen",
        "version": env!("CARGO_PKG_VERSION"),
        "schemas": state.manager.list_schemas().len(),
        "jobs": state.manager.list(None).len(),
    }))
}

async fn list_schemas(State(state): State<AppState>) -> Json<Vec<SchemaSummary>> {
    Json(state.manager.list_schemas())
}

async fn parse_upload(
    State(state): State<AppState>,
    Query(query): Query<ParseQuery>,
    multipart: Multipart,
) -> ServerResult<Json<ParsingResult>> {
    let upload = read_upload(multipart).await?;
    let format = query
        .format
        .or_else(|| upload.inferred_format())
        .unwrap_or_default();
    let options = query.options(&state.settings);

    let manager = Arc::clone(&state.manager);
    let result = blocking(move || manager.parse(&upload.bytes, format, &query.schema, &options)).await??;
    Ok(Json(result))
}

async fn generate_now(
    State(state): State<AppState>,
    Json(request): Json<JobRequest>,
) -> ServerResult<Json<GenerationJob>> {
    let options = request.options(&state.settings);
    let manager = Arc::clone(&state.manager);
    let job = blocking(move || manager.generate_now(request.input(), &request.schema, options)).await??;
    Ok(Json(job))
}

async fn create_job(
    State(state): State<AppState>,
    Json(request): Json<JobRequest>,
) -> ServerResult<(StatusCode, Json<GenerationJob>)> {
    let options = request.options(&state.settings);
    let manager = Arc::clone(&state.manager);
    let job = blocking(move || manager.create(request.input(), &request.schema, options)).await??;
    Ok((StatusCode::CREATED, Json(job)))
}

async fn upload_job(
    State(state): State<AppState>,
    Path(format): Path<String>,
    Query(query): Query<UploadQuery>,
    multipart: Multipart,
) -> ServerResult<(StatusCode, Json<GenerationJob>)> {
    let format: DataFormat = format.parse().map_err(ServerError::BadRequest)?;
    let upload = read_upload(multipart).await?;
    tracing::info!(
        "Upload '{}' ({} bytes) for schema '{}'",
        upload.file_name.as_deref().unwrap_or("unnamed"),
        upload.bytes.len(),
        query.schema
    );

    let options = query.options(&state.settings);
    let manager = Arc::clone(&state.manager);
    let input = JobInput::new(upload.bytes, format);
    let job = blocking(move || manager.create(input, &query.schema, options)).await??;
    Ok((StatusCode::CREATED, Json(job)))
}

async fn list_jobs(State(state): State<AppState>, Query(query): Query<ListJobsQuery>) -> Json<Vec<GenerationJob>> {
    let jobs = state
        .manager
        .list(query.status)
        .iter()
        .map(GenerationJob::without_output)
        .collect();
    Json(jobs)
}

async fn get_job(State(state): State<AppState>, Path(id): Path<String>) -> ServerResult<Json<GenerationJob>> {
    Ok(Json(state.manager.get(&id)?))
}

async fn process_job(State(state): State<AppState>, Path(id): Path<String>) -> ServerResult<Json<GenerationJob>> {
    let manager = Arc::clone(&state.manager);
    let job = blocking(move || manager.process(&id)).await??;
    Ok(Json(job))
}

async fn cancel_job(State(state): State<AppState>, Path(id): Path<String>) -> ServerResult<Json<GenerationJob>> {
    Ok(Json(state.manager.cancel(&id)?))
}

async fn job_result(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ResultQuery>,
) -> ServerResult<Response> {
    let result = state.manager.result(&id)?;
    if !query.download {
        return Ok(Json(result).into_response());
    }

    let format = result.output_format;
    let disposition = format!("attachment; filename=\"{}.{}\"", result.job_id, format.extension());
    let value = HeaderValue::from_str(&disposition).map_err(|e| ServerError::Internal(e.to_string()))?;
    let mut response = ([(header::CONTENT_TYPE, format.content_type())], result.output).into_response();
    response.headers_mut().insert(header::CONTENT_DISPOSITION, value);
    Ok(response)
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // Lagged receivers skip what they missed.
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

// =============================================================================
// Helpers
// =============================================================================

struct Upload {
    bytes: Vec<u8>,
    file_name: Option<String>,
}

impl Upload {
    fn inferred_format(&self) -> Option<DataFormat> {
        self.file_name
            .as_deref()
            .and_then(|name| DataFormat::from_path(std::path::Path::new(name)))
    }
}

/// Read the `file` part of a multipart body.
async fn read_upload(mut multipart: Multipart) -> ServerResult<Upload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
        return Ok(Upload {
            bytes: bytes.to_vec(),
            file_name,
        });
    }

    Err(ServerError::BadRequest("No file provided".into()))
}

/// Run CPU-bound pipeline work off the async workers.
async fn blocking<F, T>(work: F) -> ServerResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ServerError::Internal(format!("worker failed: {}", e)))
}
