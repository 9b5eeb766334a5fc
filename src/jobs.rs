// src/jobs.rs
//! Scheduled-style jobs: daily collection and report generation.

use chrono::Local;
use serde_json::{json, Map};
use tracing::{info, instrument};

use crate::analyze::Analyzer;
use crate::ingest::Retriever;
use crate::progress::{Completion, ProgressSink};
use crate::store::{MemoryStore, StoredNews};

pub const REPORT_DONE_MESSAGE: &str = "报告生成完成！";

pub fn report_title(date: chrono::NaiveDate) -> String {
    format!("今日体育新闻分析报告 - {}", date.format("%Y-%m-%d"))
}

/// Collect the configured daily batch and store it as unprocessed news.
#[instrument(level = "info", skip_all)]
pub async fn collect_daily(retriever: &Retriever, store: &MemoryStore) -> Vec<StoredNews> {
    let cfg = retriever.config();
    let items = retriever.fetch(&cfg.daily_category, cfg.limit).await;
    let rows = store.insert_news(items);
    info!(count = rows.len(), category = %cfg.daily_category, "daily news stored");
    rows
}

/// Analyze every unprocessed item and store the report.
/// Errors carry the user-facing message.
#[instrument(level = "info", skip_all)]
pub async fn generate_report(
    analyzer: &Analyzer,
    store: &MemoryStore,
    sink: &dyn ProgressSink,
) -> Result<Completion, String> {
    sink.emit(10, "正在获取新闻数据...");
    let pending = store.unprocessed_news();
    if pending.is_empty() {
        return Err(crate::error::AnalysisError::NoNews.user_message());
    }
    sink.emit(20, &format!("已获取 {} 条新闻，开始分析...", pending.len()));

    let ids: Vec<u64> = pending.iter().map(|n| n.id).collect();
    let items: Vec<_> = pending.into_iter().map(|n| n.item).collect();

    let result = analyzer
        .analyze(&items, sink)
        .await
        .map_err(|e| e.user_message())?;

    sink.emit(95, "分析完成，正在保存报告...");
    let title = report_title(Local::now().date_naive());
    let report = store.insert_report(title, ids.clone(), result);
    store.mark_processed(&ids);
    info!(report_id = report.id, news = ids.len(), "report stored");

    let mut payload = Map::new();
    payload.insert("report".into(), json!({"id": report.id, "title": report.title}));
    Ok(Completion {
        message: REPORT_DONE_MESSAGE.to_string(),
        payload,
    })
}
