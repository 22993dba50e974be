use axum::{
    Json, Router,
    extract::{Query, State},
    response::Html,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::catalog::{DOWNLOADS_PREFIX, VideoRecord, file_name_from_local_path};
use crate::downloader::DownloadState;
use crate::error::{AppError, AppResult};
use crate::state::{AppState, INDEX_TEMPLATE};

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct ProgressQuery {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DownloadState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    #[serde(default)]
    pub local_path: Option<String>,
}

pub async fn home(State(state): State<AppState>) -> AppResult<Html<String>> {
    let videos = state.catalog.load().await;
    let mut context = tera::Context::new();
    context.insert("videos", &videos);
    let page = state.templates.render(INDEX_TEMPLATE, &context)?;
    Ok(Html(page))
}

pub async fn start_download(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> Json<MessageResponse> {
    state
        .queue
        .start_download_in_background(state.orchestrator.clone(), request.url);
    MessageResponse::new("Download started")
}

pub async fn get_progress(
    State(state): State<AppState>,
    Query(query): Query<ProgressQuery>,
) -> Json<ProgressResponse> {
    let response = match state.progress.entry(&query.url) {
        Some(entry) => ProgressResponse {
            progress: entry.percent,
            status: Some(entry.state),
            error: entry.error,
        },
        None => ProgressResponse {
            progress: state.progress.read(&query.url),
            status: None,
            error: None,
        },
    };
    Json(response)
}

pub async fn video_list(State(state): State<AppState>) -> Json<Vec<VideoRecord>> {
    Json(state.catalog.load().await)
}

pub async fn delete_video(
    State(state): State<AppState>,
    Json(request): Json<DeleteRequest>,
) -> AppResult<Json<MessageResponse>> {
    let local_path = request
        .local_path
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::BadRequest("Invalid request".to_string()))?;

    if local_path.split(['/', '\\']).any(|component| component == "..") {
        return Err(AppError::BadRequest("Invalid request".to_string()));
    }

    match file_name_from_local_path(&local_path) {
        Some(file_name) => {
            let file_path = state.download_dir.join(file_name);
            match tokio::fs::remove_file(&file_path).await {
                Ok(()) => tracing::info!("Deleted video file: {}", file_path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!("Video file already gone: {}", file_path.display());
                }
                Err(e) => return Err(e.into()),
            }
        }
        None => {
            tracing::warn!(
                "Path {} is outside {}, only removing the catalog entry",
                local_path,
                DOWNLOADS_PREFIX
            );
        }
    }

    state.catalog.remove(&local_path).await?;
    Ok(MessageResponse::new("Video deleted"))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/download", post(start_download))
        .route("/progress", get(get_progress))
        .route("/video-list", get(video_list))
        .route("/delete", post(delete_video))
        .nest_service(DOWNLOADS_PREFIX, ServeDir::new(&state.download_dir))
        .nest_service("/static", ServeDir::new(&state.static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
