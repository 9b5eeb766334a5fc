// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - news collection, listing, detail, delete
// - POST /api/report/analyze (SSE progress) and the report endpoints
// - chat message / reset
// - dashboard counts and JSON error bodies

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt as _; // for `oneshot`

use sports_news_analyzer::classify::Classifier;
use sports_news_analyzer::config::AppConfig;
use sports_news_analyzer::error::SourceError;
use sports_news_analyzer::ingest::{NewsItem, NewsSource, Retriever};
use sports_news_analyzer::llm::{MockLlm, MOCK_REPORT};
use sports_news_analyzer::{router, AppState};

const BODY_LIMIT: usize = 1024 * 1024;

/// Source that is always down, so collection falls back to the built-in sample.
struct OfflineSource;

#[async_trait]
impl NewsSource for OfflineSource {
    async fn fetch_api(&self, _: &str, _: usize) -> Result<Vec<NewsItem>, SourceError> {
        Err(SourceError::Connect("offline".into()))
    }
    async fn fetch_list_page(&self, _: &str, _: usize) -> Result<Vec<NewsItem>, SourceError> {
        Err(SourceError::Connect("offline".into()))
    }
    async fn fetch_hot(&self, _: &str, _: usize) -> Result<Vec<NewsItem>, SourceError> {
        Err(SourceError::Connect("offline".into()))
    }
    fn name(&self) -> &'static str {
        "offline"
    }
}

fn test_state() -> AppState {
    let mut cfg = AppConfig::default();
    cfg.retriever.fallback_delay_ms = 0;
    let retriever = Retriever::new(
        Arc::new(OfflineSource),
        Arc::new(Classifier::default_seed()),
        cfg.retriever.clone(),
    );
    AppState::assemble(retriever, Arc::new(MockLlm), &cfg)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = app
        .clone()
        .oneshot(req.body(body).expect("build request"))
        .await
        .expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes)
}

async fn send_json(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, method, uri, body).await;
    let v = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, v)
}

/// JSON objects carried on `data:` lines of an SSE body.
fn sse_events(bytes: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(bytes)
        .lines()
        .filter_map(|l| l.strip_prefix("data:"))
        .map(|d| serde_json::from_str(d.trim()).expect("event json"))
        .collect()
}

#[tokio::test]
async fn health_returns_ok() {
    let app = router(test_state());
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(body).unwrap(), "ok");
}

#[tokio::test]
async fn analyze_without_news_streams_an_error() {
    let app = router(test_state());
    let (status, body) = send(&app, "POST", "/api/report/analyze", None).await;
    assert_eq!(status, StatusCode::OK);

    let events = sse_events(&body);
    assert_eq!(events[0]["status"], "start");
    assert_eq!(events[0]["progress"], 0);
    let last = events.last().unwrap();
    assert_eq!(last["status"], "error");
    assert_eq!(last["message"], "没有需要分析的新闻");
    assert_eq!(last["error"], "没有需要分析的新闻");
}

#[tokio::test]
async fn collect_analyze_and_download_flow() {
    let state = test_state();
    let app = router(state.clone());

    // collection falls back to the sample batch
    let (status, news) = send_json(&app, "POST", "/api/news/generate-daily", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(news.as_array().unwrap().len(), 5);
    assert_eq!(news[0]["id"], 1);
    assert_eq!(news[0]["processed"], false);

    // streamed analysis
    let (status, body) = send(&app, "POST", "/api/report/analyze", None).await;
    assert_eq!(status, StatusCode::OK);
    let events = sse_events(&body);
    let pcts: Vec<u64> = events.iter().map(|e| e["progress"].as_u64().unwrap()).collect();
    assert!(pcts.windows(2).all(|w| w[0] <= w[1]), "progress regressed: {pcts:?}");
    for expected in [10, 20, 30, 90, 95] {
        assert!(pcts.contains(&expected), "missing {expected}% in {pcts:?}");
    }
    let last = events.last().unwrap();
    assert_eq!(last["status"], "success");
    assert_eq!(last["progress"], 100);
    assert_eq!(last["message"], "报告生成完成！");
    assert_eq!(last["report"]["id"], 1);
    let title = last["report"]["title"].as_str().unwrap().to_string();
    assert!(title.starts_with("今日体育新闻分析报告 - "));

    // everything is processed now
    assert!(state.store.unprocessed_news().is_empty());

    // report endpoints
    let (status, list) = send_json(&app, "GET", "/api/report/list", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["news_ids"], json!([1, 2, 3, 4, 5]));
    assert_eq!(list[0]["statistics"]["total_count"], 5);

    let (status, detail) = send_json(&app, "GET", "/api/report/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["content"], MOCK_REPORT);
    assert!(detail["summary"].as_str().unwrap().starts_with("今日体育新闻以篮球和足球为主"));

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/report/1/download-md")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let cd = resp.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
    // "今" is E4 BB 8A in UTF-8
    assert!(cd.starts_with("attachment; filename*=UTF-8''%E4%BB%8A"), "{cd}");
    assert!(cd.ends_with(".md"));
    let ct = resp.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(ct.starts_with("text/markdown"));
    let md = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    assert_eq!(String::from_utf8(md.to_vec()).unwrap(), MOCK_REPORT);

    // dashboard
    let (_, stats) = send_json(&app, "GET", "/api/dashboard/stats", None).await;
    assert_eq!(stats["total_news_count"], 5);
    assert_eq!(stats["today_news_count"], 5);
    assert_eq!(stats["total_reports_count"], 1);

    // delete report
    let (status, _) = send_json(&app, "DELETE", "/api/report/1", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, err) = send_json(&app, "GET", "/api/report/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["detail"], "报告不存在");
}

#[tokio::test]
async fn news_listing_detail_and_delete() {
    let app = router(test_state());
    send_json(&app, "POST", "/api/news/generate-daily", None).await;

    let (status, page) = send_json(&app, "GET", "/api/news/list?skip=1&limit=2", None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<u64> = page
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![4, 3]);

    let (status, one) = send_json(&app, "GET", "/api/news/2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(one["id"], 2);

    let (status, msg) = send_json(&app, "DELETE", "/api/news/2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(msg["id"], 2);

    let (status, err) = send_json(&app, "GET", "/api/news/2", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["detail"], "新闻不存在");

    let (status, err) = send_json(&app, "GET", "/api/news/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(err["detail"].as_str().unwrap().contains("abc"));

    let (status, err) = send_json(&app, "GET", "/api/news/list?limit=many", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(err.get("detail").is_some());
}

#[tokio::test]
async fn hot_topics_degrade_to_empty_list() {
    let app = router(test_state());
    let (status, hot) = send_json(&app, "GET", "/api/news/hot", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hot, json!([]));
}

#[tokio::test]
async fn chat_message_and_reset() {
    let state = test_state();
    let app = router(state.clone());

    let (status, v) = send_json(
        &app,
        "POST",
        "/api/chat/message",
        Some(json!({"message": "湖人今天赢了吗", "session_id": "s1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(v["response"].as_str().unwrap().contains("湖人今天赢了吗"));
    assert_eq!(state.chat.history_len("s1"), 2);
    assert_eq!(state.store.chat_records("s1").len(), 1);

    let (status, _) = send_json(&app, "POST", "/api/chat/reset", Some(json!({"session_id": "s1"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state.chat.history_len("s1"), 0);

    // empty body resets the default session
    let (status, v) = send_json(&app, "POST", "/api/chat/reset", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["session_id"], "default");

    let (status, _) = send_json(&app, "POST", "/api/chat/message", Some(json!({"message": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
