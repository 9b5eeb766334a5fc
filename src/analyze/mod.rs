// src/analyze/mod.rs
//! Analysis pipeline: format the batch, ask the LLM for a Markdown report
//! (search-enabled first, plain completion as fallback), then derive the
//! summary, statistics and sentiment from it.

pub mod prompt;
pub mod sentiment;
pub mod stats;
pub mod summary;

use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, instrument, warn};

use crate::config::app::AnalyzerConfig;
use crate::error::{AnalysisError, LlmError};
use crate::ingest::NewsItem;
use crate::llm::{ChatMessage, ChatRequest, DynLlm};
use crate::progress::ProgressSink;

pub use sentiment::{Sentiment, SentimentLabel, SentimentScorer};
pub use stats::{compute_statistics, Statistics};
pub use summary::extract_summary;

pub const ANALYSIS_TYPE_DAILY: &str = "daily";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub summary: String,
    pub full_report: String,
    pub statistics: Statistics,
    pub sentiment: Sentiment,
    pub news_count: usize,
    pub analysis_type: String,
}

/// Stateless between calls; cheap to share behind an `Arc`.
pub struct Analyzer {
    llm: DynLlm,
    cfg: AnalyzerConfig,
    scorer: SentimentScorer,
}

impl Analyzer {
    pub fn new(llm: DynLlm, cfg: AnalyzerConfig) -> Self {
        Self {
            llm,
            cfg,
            scorer: SentimentScorer::default(),
        }
    }

    pub fn with_scorer(mut self, scorer: SentimentScorer) -> Self {
        self.scorer = scorer;
        self
    }

    fn request(&self, instruction: &str, enable_search: bool) -> ChatRequest {
        ChatRequest {
            messages: vec![
                ChatMessage::system(prompt::SYSTEM_PROMPT),
                ChatMessage::user(instruction),
            ],
            temperature: self.cfg.temperature,
            enable_search,
        }
    }

    async fn call(&self, attempt: &'static str, req: &ChatRequest) -> Result<String, LlmError> {
        let res = self.llm.complete(req).await;
        let outcome = if res.is_ok() { "ok" } else { "error" };
        counter!("llm_requests_total", "attempt" => attempt, "outcome" => outcome).increment(1);
        res
    }

    /// Produce a report for `items`, reporting progress 30..=90 to `sink`.
    #[instrument(level = "info", skip_all, fields(items = items.len(), provider = self.llm.provider_name()))]
    pub async fn analyze(
        &self,
        items: &[NewsItem],
        sink: &dyn ProgressSink,
    ) -> Result<AnalysisResult, AnalysisError> {
        crate::metrics::ensure_described();
        let started = Instant::now();
        let res = self.run(items, sink).await;
        histogram!("analysis_duration_ms").record(started.elapsed().as_millis() as f64);
        match &res {
            Ok(r) => {
                counter!("analysis_runs_total", "outcome" => "ok").increment(1);
                info!(report_chars = r.full_report.chars().count(), "analysis finished");
            }
            Err(e) => {
                counter!("analysis_runs_total", "outcome" => e.kind()).increment(1);
                warn!(kind = e.kind(), error = %e, "analysis failed");
            }
        }
        res
    }

    async fn run(
        &self,
        items: &[NewsItem],
        sink: &dyn ProgressSink,
    ) -> Result<AnalysisResult, AnalysisError> {
        if items.is_empty() {
            return Err(AnalysisError::NoNews);
        }

        sink.emit(30, "正在格式化新闻内容...");
        let block = prompt::format_news(items, self.cfg.item_max_chars);
        let instruction = prompt::build_instruction(&block);

        sink.emit(40, "正在调用AI模型生成分析报告...");
        sink.emit(50, "AI模型正在分析新闻内容，请稍候...");
        let output = match self.call("primary", &self.request(&instruction, true)).await {
            Ok(text) => {
                sink.emit(70, "AI分析完成，正在处理结果...");
                text
            }
            Err(primary) => {
                warn!(error = %primary, "primary completion failed; retrying without search");
                sink.emit(50, "生成分析报告中...");
                match self.call("fallback", &self.request(&instruction, false)).await {
                    Ok(text) => {
                        sink.emit(70, "分析完成，正在处理结果...");
                        text
                    }
                    Err(e) => return Err(AnalysisError::from_llm(&e)),
                }
            }
        };

        let len = output.trim().chars().count();
        if len < self.cfg.min_output_chars {
            return Err(AnalysisError::OutputTooShort { len });
        }
        info!(output_chars = output.chars().count(), "llm report received");

        sink.emit(75, "正在解析分析结果...");
        let summary = extract_summary(&output);
        let sentiment = self.scorer.score(&output);

        sink.emit(80, "正在提取统计信息...");
        let statistics = compute_statistics(items);

        sink.emit(90, "分析报告生成完成！");
        Ok(AnalysisResult {
            summary,
            full_report: output,
            statistics,
            sentiment,
            news_count: items.len(),
            analysis_type: ANALYSIS_TYPE_DAILY.to_string(),
        })
    }
}
