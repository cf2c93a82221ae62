//! HTTP server
//!
//! REST API over the study document collections.
//!
//! ## Endpoints
//! - GET/POST /api/mindmaps, /api/summaries - list and create
//! - GET/PUT/DELETE /api/{kind}/:id - fetch, overwrite, delete
//! - PUT /api/{kind}/:id/title - rename
//! - POST/DELETE /api/{kind}/:id/tags - tag management
//! - POST /api/generate/mindmap, /api/summarize - generation service
//! - GET /api/testpapers, attempts, grades, stats - test mode

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::error::Error;
use crate::gateway::Gateway;
use crate::generate::{GenerationClient, SummaryStyle};
use crate::grading::{paper_stats, GradeSheet, PaperStats};
use crate::session::Session;
use crate::types::{AttemptDoc, MindMapDoc, StudyDocument, SummaryDoc, TestPaperDoc};

/// Server state shared by every handler.
pub struct AppState {
    pub gateway: Gateway,
    pub session: Session,
    pub generator: GenerationClient,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::AuthRequired => StatusCode::UNAUTHORIZED,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::AlreadyGraded => StatusCode::CONFLICT,
            Error::Remote(_) => StatusCode::BAD_GATEWAY,
            Error::Storage(_) | Error::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (
            status,
            Json(ErrorBody {
                detail: self.to_string(),
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, Error>;

#[derive(Debug, Serialize)]
struct CreatedResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RenameRequest {
    title: String,
}

#[derive(Debug, Deserialize)]
struct TagRequest {
    tag: String,
}

#[derive(Debug, Deserialize)]
struct SummarizeRequest {
    text: String,
    #[serde(default)]
    style: Option<String>,
}

#[derive(Debug, Serialize)]
struct SummarizeResponse {
    summary: String,
}

#[derive(Debug, Deserialize)]
struct GenerateMindMapRequest {
    text: String,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GradeRequest {
    scores: std::collections::BTreeMap<String, f64>,
}

/// Create the router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    let api = Router::new()
        .route("/health", get(health_handler))
        .route("/mindmaps", get(list_handler::<MindMapDoc>).post(create_handler::<MindMapDoc>))
        .route(
            "/mindmaps/:id",
            get(get_handler::<MindMapDoc>)
                .put(update_handler::<MindMapDoc>)
                .delete(delete_handler::<MindMapDoc>),
        )
        .route("/mindmaps/:id/title", put(rename_handler::<MindMapDoc>))
        .route(
            "/mindmaps/:id/tags",
            post(add_tag_handler::<MindMapDoc>).delete(remove_tag_handler::<MindMapDoc>),
        )
        .route("/summaries", get(list_handler::<SummaryDoc>).post(create_handler::<SummaryDoc>))
        .route(
            "/summaries/:id",
            get(get_handler::<SummaryDoc>)
                .put(update_handler::<SummaryDoc>)
                .delete(delete_handler::<SummaryDoc>),
        )
        .route("/summaries/:id/title", put(rename_handler::<SummaryDoc>))
        .route(
            "/summaries/:id/tags",
            post(add_tag_handler::<SummaryDoc>).delete(remove_tag_handler::<SummaryDoc>),
        )
        .route("/generate/mindmap", post(generate_mindmap_handler))
        .route("/summarize", post(summarize_handler))
        .route(
            "/testpapers",
            get(list_handler::<TestPaperDoc>).post(create_handler::<TestPaperDoc>),
        )
        .route(
            "/testpapers/:id",
            get(get_handler::<TestPaperDoc>).delete(delete_paper_handler),
        )
        .route("/testpapers/:id/title", put(rename_handler::<TestPaperDoc>))
        .route(
            "/testpapers/:id/tags",
            post(add_tag_handler::<TestPaperDoc>).delete(remove_tag_handler::<TestPaperDoc>),
        )
        .route(
            "/testpapers/:id/attempts",
            get(list_attempts_handler).post(create_attempt_handler),
        )
        .route("/testpapers/:id/attempts/:attempt_id", get(get_attempt_handler))
        .route("/testpapers/:id/attempts/:attempt_id/grades", post(grade_handler))
        .route("/testpapers/:id/stats", get(stats_handler));

    Router::new().nest("/api", api).layer(cors).with_state(state)
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn owner(state: &AppState) -> Result<String, Error> {
    Ok(state.session.require_user().await?.uid)
}

async fn list_handler<T: StudyDocument>(State(state): State<Arc<AppState>>) -> ApiResult<Vec<T>> {
    let owner = owner(&state).await?;
    Ok(Json(state.gateway.list(&owner).await?))
}

async fn create_handler<T: StudyDocument>(
    State(state): State<Arc<AppState>>,
    Json(doc): Json<T>,
) -> ApiResult<CreatedResponse> {
    let owner = owner(&state).await?;
    if doc.title().trim().is_empty() {
        return Err(Error::Validation("title must not be blank".to_string()));
    }
    let id = state.gateway.create(&owner, doc).await?;
    Ok(Json(CreatedResponse { id }))
}

async fn get_handler<T: StudyDocument>(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<T> {
    let owner = owner(&state).await?;
    Ok(Json(state.gateway.get(&owner, &id).await?))
}

async fn update_handler<T: StudyDocument>(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(mut doc): Json<T>,
) -> ApiResult<CreatedResponse> {
    let owner = owner(&state).await?;
    // The document must already exist; the path id wins over the body id.
    state.gateway.get::<T>(&owner, &id).await?;
    doc.set_id(id.clone());
    state.gateway.save(&owner, &doc).await?;
    Ok(Json(CreatedResponse { id }))
}

async fn delete_handler<T: StudyDocument>(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, Error> {
    let owner = owner(&state).await?;
    state.gateway.delete::<T>(&owner, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn rename_handler<T: StudyDocument>(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<RenameRequest>,
) -> Result<StatusCode, Error> {
    let owner = owner(&state).await?;
    state.gateway.rename::<T>(&owner, &id, &req.title).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_tag_handler<T: StudyDocument>(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<TagRequest>,
) -> Result<StatusCode, Error> {
    let owner = owner(&state).await?;
    state.gateway.add_tag::<T>(&owner, &id, &req.tag).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_tag_handler<T: StudyDocument>(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<TagRequest>,
) -> Result<StatusCode, Error> {
    let owner = owner(&state).await?;
    state.gateway.remove_tag::<T>(&owner, &id, &req.tag).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn generate_mindmap_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateMindMapRequest>,
) -> ApiResult<MindMapDoc> {
    owner(&state).await?;
    let client = state.generator.clone();
    let response = tokio::task::spawn_blocking(move || client.generate_mindmap(&req.text))
        .await
        .map_err(|e| Error::Remote(format!("generation task failed: {}", e)))??;
    let title = req.title.as_deref().unwrap_or("Generated Mind Map");
    Ok(Json(response.into_mindmap(title)))
}

async fn summarize_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SummarizeRequest>,
) -> ApiResult<SummarizeResponse> {
    owner(&state).await?;
    let style = match req.style.as_deref() {
        None | Some("short") => SummaryStyle::Short,
        Some("long") => SummaryStyle::Long,
        Some("bullet") => SummaryStyle::Bullet,
        Some(other) => {
            return Err(Error::Validation(format!("unknown summary style: {}", other)))
        }
    };
    let client = state.generator.clone();
    let summary = tokio::task::spawn_blocking(move || client.summarize(&req.text, style))
        .await
        .map_err(|e| Error::Remote(format!("generation task failed: {}", e)))??;
    Ok(Json(SummarizeResponse { summary }))
}

async fn delete_paper_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, Error> {
    let owner = owner(&state).await?;
    state.gateway.delete_test_paper(&owner, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_attempts_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Vec<AttemptDoc>> {
    let owner = owner(&state).await?;
    Ok(Json(state.gateway.list_attempts(&owner, &id).await?))
}

async fn create_attempt_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(attempt): Json<AttemptDoc>,
) -> ApiResult<CreatedResponse> {
    let owner = owner(&state).await?;
    // Attempts only exist under a real paper.
    state.gateway.get::<TestPaperDoc>(&owner, &id).await?;
    let attempt_id = state.gateway.create_attempt(&owner, &id, attempt).await?;
    Ok(Json(CreatedResponse { id: attempt_id }))
}

async fn get_attempt_handler(
    State(state): State<Arc<AppState>>,
    Path((id, attempt_id)): Path<(String, String)>,
) -> ApiResult<AttemptDoc> {
    let owner = owner(&state).await?;
    Ok(Json(state.gateway.get_attempt(&owner, &id, &attempt_id).await?))
}

async fn grade_handler(
    State(state): State<Arc<AppState>>,
    Path((id, attempt_id)): Path<(String, String)>,
    Json(req): Json<GradeRequest>,
) -> Result<StatusCode, Error> {
    let owner = owner(&state).await?;
    let paper: TestPaperDoc = state.gateway.get(&owner, &id).await?;

    let mut sheet = GradeSheet::new();
    for (question_id, score) in &req.scores {
        let question = paper
            .questions()
            .find(|q| &q.id == question_id)
            .ok_or_else(|| Error::NotFound(format!("question {}", question_id)))?;
        sheet.set_score(question, *score)?;
    }

    state
        .gateway
        .save_grades(&owner, &id, &attempt_id, &sheet)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn stats_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<PaperStats> {
    let owner = owner(&state).await?;
    let paper: TestPaperDoc = state.gateway.get(&owner, &id).await?;
    let attempts = state.gateway.list_attempts(&owner, &id).await?;
    Ok(Json(paper_stats(&paper, &attempts)))
}

/// Start the server.
pub async fn start_server(
    host: &str,
    port: u16,
    state: Arc<AppState>,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("{}:{}", host, port);
    tracing::info!("studygraph server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
