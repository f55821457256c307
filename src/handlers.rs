use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use gitdigest_ingest_types::{IngestDigest, IngestError, IngestRequest, IngestResponse};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use crate::format::{ResponseShape, negotiate_from_headers};
use crate::server::AppState;
use crate::sweeper::marker_path;
use crate::templates::{self, GitPage};
use crate::utils::size::{DEFAULT_SLIDER_POSITION, MAX_SLIDER_POSITION, log_slider_to_size};

const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error("template error: {0}")]
    Template(#[from] tera::Error),
    #[error("digest not found")]
    NotFound,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Ingest(IngestError::InvalidSource(_)) => StatusCode::BAD_REQUEST,
            AppError::Ingest(IngestError::Failed { .. }) => StatusCode::BAD_GATEWAY,
            AppError::Ingest(IngestError::TimedOut(_)) => StatusCode::GATEWAY_TIMEOUT,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Ingest(_) | AppError::Template(_) | AppError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, AppError>;

pub async fn index(State(state): State<AppState>) -> ApiResult<Html<String>> {
    Ok(Html(templates::render_index(&state.templates, "")?))
}

#[derive(Debug, Default, Deserialize)]
pub struct IngestQuery {
    format: Option<String>,
    /// Slider position in `0..=500`, mapped to bytes.
    max_file_size: Option<u32>,
    pattern_type: Option<String>,
    pattern: Option<String>,
}

impl IngestQuery {
    fn max_file_size_bytes(&self) -> u64 {
        let position = self
            .max_file_size
            .unwrap_or(DEFAULT_SLIDER_POSITION)
            .min(MAX_SLIDER_POSITION);
        log_slider_to_size(position)
    }
}

pub async fn ingest(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>,
    Query(query): Query<IngestQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let shape = negotiate_from_headers(&headers, query.format.as_deref());
    let source = format!("{owner}/{repo}");

    let request = IngestRequest {
        source: source.clone(),
        max_file_size: query.max_file_size_bytes(),
        pattern_type: query
            .pattern_type
            .as_deref()
            .and_then(|value| value.parse().ok())
            .unwrap_or_default(),
        pattern: query.pattern.unwrap_or_default(),
        response_format: shape.ingest_format(),
        ingest_id: Uuid::new_v4().to_string(),
    };

    let result = state.ingestor.process_query(request).await;

    match shape {
        ResponseShape::Html => render_page(&state, &source, result),
        ResponseShape::Text | ResponseShape::Json => Ok(forward(result?)),
    }
}

fn render_page(
    state: &AppState,
    source: &str,
    result: Result<IngestResponse, IngestError>,
) -> ApiResult<Response> {
    let page = match result {
        Ok(response) if response.status_code < 400 => {
            match serde_json::from_slice::<IngestDigest>(&response.body) {
                Ok(digest) => GitPage::from_digest(source, digest),
                Err(err) => GitPage::error(source, format!("unreadable digest: {err}")),
            }
        }
        Ok(response) => GitPage::error(source, String::from_utf8_lossy(&response.body)),
        Err(err) => {
            warn!(source, error = %err, "ingestion failed for browser request");
            GitPage::error(source, err.to_string())
        }
    };
    Ok(Html(templates::render_git(&state.templates, &page)?).into_response())
}

/// Passes the ingestor's status and body through, normalising the content type.
fn forward(response: IngestResponse) -> Response {
    let status = StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::OK);
    let content_type = if response.is_json() {
        HeaderValue::from_static(gitdigest_ingest_types::MEDIA_TYPE_JSON)
    } else {
        HeaderValue::from_static(TEXT_CONTENT_TYPE)
    };
    (status, [(header::CONTENT_TYPE, content_type)], response.body).into_response()
}

pub async fn download(
    State(state): State<AppState>,
    Path(ingest_id): Path<String>,
) -> ApiResult<Response> {
    if !is_valid_ingest_id(&ingest_id) {
        return Err(AppError::NotFound);
    }

    let folder = state.tmp_base_path.join(&ingest_id);
    let marker = match marker_path(&folder).await {
        Ok(Some(path)) => path,
        Ok(None) => return Err(AppError::NotFound),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Err(AppError::NotFound),
        Err(err) => return Err(err.into()),
    };

    let body = tokio::fs::read(&marker).await?;
    let file_name = marker
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("digest.txt");
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(TEXT_CONTENT_TYPE)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

/// Ingest ids are generated as UUIDs; anything else cannot name a folder we created.
fn is_valid_ingest_id(ingest_id: &str) -> bool {
    !ingest_id.is_empty()
        && ingest_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
}

pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let database = match state.log_store.health_check().await {
        Ok(()) => "ok",
        Err(err) => {
            warn!(error = %err, "request log store unavailable");
            "unavailable"
        }
    };
    Json(json!({ "status": "ok", "database": database }))
}
