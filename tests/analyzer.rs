// tests/analyzer.rs
//
// Analyzer end-to-end against a scripted LLM.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::{json, Map};

use sports_news_analyzer::analyze::{Analyzer, SentimentLabel};
use sports_news_analyzer::classify::Category;
use sports_news_analyzer::config::app::AnalyzerConfig;
use sports_news_analyzer::error::{AnalysisError, LlmError};
use sports_news_analyzer::ingest::NewsItem;
use sports_news_analyzer::llm::{Role, ScriptedLlm};
use sports_news_analyzer::progress::ProgressSink;

#[derive(Default)]
struct Recorder(Mutex<Vec<(u8, String)>>);

impl ProgressSink for Recorder {
    fn emit(&self, percent: u8, message: &str) {
        self.0.lock().unwrap().push((percent, message.to_string()));
    }
}

impl Recorder {
    fn percents(&self) -> Vec<u8> {
        self.0.lock().unwrap().iter().map(|(p, _)| *p).collect()
    }
}

fn nba_item(i: usize) -> NewsItem {
    let mut metadata = Map::new();
    metadata.insert("teams".into(), json!(["湖人", "勇士"]));
    metadata.insert("players".into(), json!(["詹姆斯"]));
    NewsItem {
        title: format!("湖人第{i}场比赛"),
        body: "球".repeat(1200),
        source: "虎扑".into(),
        url: String::new(),
        category: Category::Nba,
        publish_time: Utc::now(),
        metadata,
    }
}

fn long_report(summary: &str) -> String {
    let filler = "本场比赛双方你来我往，攻防转换节奏极快。".repeat(120);
    format!("## 今日体育新闻分析报告\n\n综述: {summary}\n\n### 二、新闻关键内容提取与点评\n\n{filler}")
}

#[tokio::test]
async fn five_item_batch_produces_report() {
    let summary = format!("今日{}", "湖人延续连胜势头，核心球员表现出色。".repeat(8));
    let report = long_report(&summary);
    assert!(report.chars().count() > 2500);

    let llm = Arc::new(ScriptedLlm::always(report.clone()));
    let analyzer = Analyzer::new(llm.clone(), AnalyzerConfig::default());
    let items: Vec<_> = (1..=5).map(nba_item).collect();
    let sink = Recorder::default();

    let r = analyzer.analyze(&items, &sink).await.expect("analysis ok");
    assert_eq!(r.summary, summary);
    assert_eq!(r.full_report, report);
    assert_eq!(r.news_count, 5);
    assert_eq!(r.statistics.total_count, 5);
    assert_eq!(r.statistics.categories.len(), 1);
    assert_eq!(r.statistics.categories[&Category::Nba], 5);
    assert_eq!(r.statistics.teams_count, 2);
    assert_eq!(r.statistics.players_count, 1);
    assert_eq!(r.analysis_type, "daily");

    // one primary call; system prompt plus the formatted batch
    let calls = llm.calls();
    assert_eq!(calls.len(), 1);
    let req = &calls[0];
    assert!(req.enable_search);
    assert_eq!(req.messages[0].role, Role::System);
    let user = &req.messages[1].content;
    assert!(user.contains("=== 今日体育新闻（共5条）==="));
    assert!(user.contains("【新闻5】"));
    assert!(user.contains("来源：虎扑 | 类别：NBA"));
    assert!(!user.contains(&"球".repeat(1001)));

    let p = sink.percents();
    assert!(p.windows(2).all(|w| w[0] <= w[1]), "progress regressed: {p:?}");
    assert_eq!(p.first(), Some(&30));
    assert_eq!(p.last(), Some(&90));
}

#[tokio::test]
async fn primary_failure_then_fallback_success() {
    let report = long_report(&"足球".repeat(80));
    let llm = Arc::new(ScriptedLlm::new(vec![
        Err(LlmError::Transport("connection reset".into())),
        Ok(report),
    ]));
    let analyzer = Analyzer::new(llm.clone(), AnalyzerConfig::default());
    let sink = Recorder::default();
    let r = analyzer.analyze(&[nba_item(1)], &sink).await.expect("fallback ok");
    assert_eq!(r.news_count, 1);

    let calls = llm.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].messages, calls[1].messages);
    assert!(!calls[1].enable_search);

    let p = sink.percents();
    assert!(p.windows(2).all(|w| w[0] <= w[1]), "progress regressed: {p:?}");
}

#[tokio::test]
async fn quota_failure_is_reported_with_actionable_message() {
    let llm = Arc::new(ScriptedLlm::new(vec![
        Err(LlmError::Timeout),
        Err(LlmError::Status {
            status: 403,
            body: "AllocationQuota.FreeTierOnly".into(),
        }),
    ]));
    let analyzer = Analyzer::new(llm, AnalyzerConfig::default());
    let err = analyzer
        .analyze(&[nba_item(1)], &Recorder::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::QuotaExceeded(_)));
    assert!(err.user_message().starts_with("API免费额度已用完"));
}

#[tokio::test]
async fn output_under_minimum_is_an_error() {
    let llm = Arc::new(ScriptedLlm::always("x".repeat(99)));
    let analyzer = Analyzer::new(llm, AnalyzerConfig::default());
    let err = analyzer
        .analyze(&[nba_item(1)], &Recorder::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::OutputTooShort { len: 99 }));
}

#[tokio::test]
async fn sentiment_is_deterministic_for_same_output() {
    let report = long_report(&"精彩胜利，球队领先优势明显，但伤病仍是问题。".repeat(6));
    let llm = Arc::new(ScriptedLlm::always(report));
    let analyzer = Analyzer::new(llm, AnalyzerConfig::default());
    let items = vec![nba_item(1)];
    let a = analyzer.analyze(&items, &Recorder::default()).await.unwrap();
    let b = analyzer.analyze(&items, &Recorder::default()).await.unwrap();
    assert_eq!(a.sentiment, b.sentiment);
    // 精彩 胜利 领先 优势 vs 伤病 问题
    assert_eq!(a.sentiment.positive_score, 4);
    assert_eq!(a.sentiment.negative_score, 2);
    assert_eq!(a.sentiment.label, SentimentLabel::Positive);
}
