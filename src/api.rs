// src/api.rs
//! HTTP surface: news, reports (with a streamed analysis run), chat and dashboard.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{header, HeaderName, StatusCode},
    response::{sse::Sse, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::analyze::Analyzer;
use crate::chat::{ChatService, DEFAULT_SESSION};
use crate::classify::Classifier;
use crate::config::AppConfig;
use crate::ingest::{hupu::HupuSource, NewsItem, Retriever};
use crate::jobs;
use crate::llm::{build_client_from_config, DynLlm};
use crate::progress::{self, StreamOptions};
use crate::store::{DashboardStats, MemoryStore, Report, StoredNews};

const DEFAULT_PAGE_LIMIT: usize = 20;
const DEFAULT_HOT_CATEGORY: &str = "nba";
const DEFAULT_HOT_LIMIT: usize = 10;

#[derive(Clone)]
pub struct AppState {
    pub retriever: Arc<Retriever>,
    pub analyzer: Arc<Analyzer>,
    pub chat: Arc<ChatService>,
    pub store: Arc<MemoryStore>,
    pub stream: StreamOptions,
}

impl AppState {
    /// Wire every service from config, with a fresh in-memory store.
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let source = Arc::new(HupuSource::new(cfg.source.clone())?);
        let classifier = Arc::new(Classifier::load_default());
        let retriever = Retriever::new(source, classifier, cfg.retriever.clone());
        let llm = build_client_from_config(&cfg.llm)?;
        Ok(Self::assemble(retriever, llm, cfg))
    }

    /// Same wiring around an already-built retriever and LLM client.
    pub fn assemble(retriever: Retriever, llm: DynLlm, cfg: &AppConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            retriever: Arc::new(retriever),
            analyzer: Arc::new(Analyzer::new(llm.clone(), cfg.analyzer.clone())),
            chat: Arc::new(ChatService::new(llm, store.clone(), cfg.chat.clone())),
            store,
            stream: cfg.stream.options(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/news/generate-daily", post(generate_daily))
        .route("/api/news/list", get(list_news))
        .route("/api/news/hot", get(hot_news))
        .route("/api/news/{id}", get(get_news).delete(delete_news))
        .route("/api/report/analyze", post(analyze_report))
        .route("/api/report/list", get(list_reports))
        .route("/api/report/{id}", get(get_report).delete(delete_report))
        .route("/api/report/{id}/download-md", get(download_report))
        .route("/api/chat/message", post(chat_message))
        .route("/api/chat/reset", post(chat_reset))
        .route("/api/dashboard/stats", get(dashboard_stats))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

// ---------------- errors ----------------

#[derive(Debug)]
pub enum ApiError {
    NotFound(&'static str),
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::NotFound(d) => (StatusCode::NOT_FOUND, d.to_string()),
            ApiError::BadRequest(d) => (StatusCode::BAD_REQUEST, d),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

impl From<QueryRejection> for ApiError {
    fn from(r: QueryRejection) -> Self {
        ApiError::BadRequest(r.body_text())
    }
}

fn parse_id(raw: &str) -> Result<u64, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid id: {raw}")))
}

// ---------------- news ----------------

#[derive(Deserialize)]
struct PageQuery {
    skip: Option<usize>,
    limit: Option<usize>,
}

impl PageQuery {
    fn bounds(&self) -> (usize, usize) {
        (self.skip.unwrap_or(0), self.limit.unwrap_or(DEFAULT_PAGE_LIMIT))
    }
}

async fn generate_daily(State(state): State<AppState>) -> Json<Vec<StoredNews>> {
    Json(jobs::collect_daily(&state.retriever, &state.store).await)
}

async fn list_news(
    State(state): State<AppState>,
    q: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<Vec<StoredNews>>, ApiError> {
    let (skip, limit) = q?.bounds();
    Ok(Json(state.store.list_news(skip, limit)))
}

#[derive(Deserialize)]
struct HotQuery {
    category: Option<String>,
    limit: Option<usize>,
}

async fn hot_news(
    State(state): State<AppState>,
    q: Result<Query<HotQuery>, QueryRejection>,
) -> Result<Json<Vec<NewsItem>>, ApiError> {
    let Query(q) = q?;
    let category = q
        .category
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_HOT_CATEGORY.to_string());
    let limit = q.limit.unwrap_or(DEFAULT_HOT_LIMIT);
    Ok(Json(state.retriever.hot_topics(&category, limit).await))
}

async fn get_news(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StoredNews>, ApiError> {
    state
        .store
        .get_news(parse_id(&id)?)
        .map(Json)
        .ok_or(ApiError::NotFound("新闻不存在"))
}

async fn delete_news(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;
    if !state.store.delete_news(id) {
        return Err(ApiError::NotFound("新闻不存在"));
    }
    Ok(Json(json!({ "message": "新闻删除成功", "id": id })))
}

// ---------------- reports ----------------

async fn analyze_report(State(state): State<AppState>) -> impl IntoResponse {
    let opts = state.stream;
    let events = progress::run(opts, move |sink| async move {
        jobs::generate_report(&state.analyzer, &state.store, sink.as_ref()).await
    });
    let frames = events.map(|ev| ev.to_sse());
    (
        [(HeaderName::from_static("x-accel-buffering"), "no")],
        Sse::new(frames),
    )
}

async fn list_reports(
    State(state): State<AppState>,
    q: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<Vec<Report>>, ApiError> {
    let (skip, limit) = q?.bounds();
    Ok(Json(state.store.list_reports(skip, limit)))
}

async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Report>, ApiError> {
    state
        .store
        .get_report(parse_id(&id)?)
        .map(Json)
        .ok_or(ApiError::NotFound("报告不存在"))
}

async fn delete_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;
    if !state.store.delete_report(id) {
        return Err(ApiError::NotFound("报告不存在"));
    }
    Ok(Json(json!({ "message": "报告删除成功", "id": id })))
}

async fn download_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let report = state
        .store
        .get_report(id)
        .ok_or(ApiError::NotFound("报告不存在"))?;

    let body = markdown_body(&report);
    let disposition = format!(
        "attachment; filename*=UTF-8''{}",
        rfc5987_encode(&download_filename(&report))
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

fn markdown_body(report: &Report) -> String {
    [report.content.as_str(), report.summary.as_str()]
        .into_iter()
        .find(|s| !s.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            let title = if report.title.trim().is_empty() { "分析报告" } else { report.title.as_str() };
            format!("# {title}\n\n（报告内容为空）\n")
        })
}

fn download_filename(report: &Report) -> String {
    let title = report.title.replace(['/', '\\'], "-");
    let title = title.trim();
    if title.is_empty() {
        format!("report-{}.md", report.id)
    } else {
        format!("{title}.md")
    }
}

/// RFC 5987 `attr-char`: everything outside it is percent-encoded.
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// Percent-encode UTF-8 bytes for an RFC 5987 `ext-value`.
pub fn rfc5987_encode(s: &str) -> String {
    utf8_percent_encode(s, ATTR_CHAR).to_string()
}

// ---------------- chat ----------------

#[derive(Deserialize)]
struct ChatMessageReq {
    message: String,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    preferences: Option<Value>,
}

#[derive(Deserialize, Default)]
struct ChatResetReq {
    #[serde(default)]
    session_id: Option<String>,
}

fn session_or_default(s: Option<String>) -> String {
    s.filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SESSION.to_string())
}

async fn chat_message(
    State(state): State<AppState>,
    Json(req): Json<ChatMessageReq>,
) -> Result<Json<Value>, ApiError> {
    if req.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".into()));
    }
    let session = session_or_default(req.session_id);
    let response = state
        .chat
        .reply(&session, &req.message, req.preferences.as_ref())
        .await;
    Ok(Json(json!({ "response": response })))
}

// Body is optional: an empty POST resets the default session.
async fn chat_reset(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>, ApiError> {
    let req: ChatResetReq = if body.iter().all(u8::is_ascii_whitespace) {
        ChatResetReq::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            warn!(error = %e, "bad chat reset body");
            ApiError::BadRequest(format!("invalid JSON body: {e}"))
        })?
    };
    let session = session_or_default(req.session_id);
    state.chat.reset(&session);
    Ok(Json(json!({ "message": "对话已重置", "session_id": session })))
}

// ---------------- dashboard ----------------

async fn dashboard_stats(State(state): State<AppState>) -> Json<DashboardStats> {
    Json(state.store.dashboard_stats())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc5987_keeps_unreserved_and_escapes_rest() {
        assert_eq!(rfc5987_encode("a-b_c.md"), "a-b_c.md");
        assert_eq!(rfc5987_encode("a b"), "a%20b");
        assert_eq!(rfc5987_encode("报"), "%E6%8A%A5");
        assert_eq!(rfc5987_encode("a+b!~.md"), "a+b!~.md");
        assert_eq!(rfc5987_encode("it's (1)*"), "it%27s%20%281%29%2A");
    }

    #[test]
    fn filenames_are_sanitized() {
        let mut r = Report {
            id: 3,
            title: "a/b\\c".into(),
            summary: String::new(),
            content: String::new(),
            analysis_type: "daily".into(),
            news_ids: vec![],
            statistics: Default::default(),
            sentiment: crate::analyze::SentimentScorer::default().score(""),
            report_date: chrono::Utc::now(),
            created_at: chrono::Utc::now(),
        };
        assert_eq!(download_filename(&r), "a-b-c.md");
        assert_eq!(markdown_body(&r), "# a/b\\c\n\n（报告内容为空）\n");
        r.title = "  ".into();
        assert_eq!(download_filename(&r), "report-3.md");
        r.summary = "摘要".into();
        assert_eq!(markdown_body(&r), "摘要");
    }
}
