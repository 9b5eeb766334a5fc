//! Typed errors for the retrieval, LLM and analysis layers.

use thiserror::Error;

/// A single retrieval path failed. Never escapes the `Retriever`.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SourceError::Timeout(e.to_string())
        } else if e.is_connect() {
            SourceError::Connect(e.to_string())
        } else if e.is_decode() {
            SourceError::Decode(e.to_string())
        } else {
            SourceError::Transport(e.to_string())
        }
    }
}

/// Failure of one LLM completion call.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM client is disabled")]
    Disabled,

    #[error("LLM API key is not configured")]
    MissingKey,

    #[error("LLM returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("LLM request timeout")]
    Timeout,

    #[error("LLM transport error: {0}")]
    Transport(String),

    #[error("LLM returned empty content")]
    EmptyContent,
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Transport(e.to_string())
        }
    }
}

/// Analysis run failure, surfaced to the caller with a classified cause.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("no news to analyze")]
    NoNews,

    #[error("API quota exhausted: {0}")]
    QuotaExceeded(String),

    #[error("API authentication failed: {0}")]
    AuthFailed(String),

    #[error("LLM request timeout: {0}")]
    Timeout(String),

    #[error("LLM call failed: {0}")]
    Llm(String),

    #[error("LLM output too short ({len} chars)")]
    OutputTooShort { len: usize },
}

impl AnalysisError {
    /// Classify a failure by its message text (quota, then auth, then timeout).
    pub fn classify(text: &str) -> Self {
        let lower = text.to_lowercase();
        if text.contains("AllocationQuota") || lower.contains("free tier") || lower.contains("quota")
        {
            AnalysisError::QuotaExceeded(text.to_string())
        } else if text.contains("401") || text.contains("403") {
            AnalysisError::AuthFailed(text.to_string())
        } else if lower.contains("timeout") {
            AnalysisError::Timeout(text.to_string())
        } else {
            AnalysisError::Llm(text.to_string())
        }
    }

    /// Same as `classify`, but honours the structured status/timeout of the LLM error.
    /// Quota markers win over the status code: quota rejections arrive as 403.
    pub fn from_llm(err: &LlmError) -> Self {
        let text = err.to_string();
        match Self::classify(&text) {
            q @ AnalysisError::QuotaExceeded(_) => q,
            _ => match err {
                LlmError::Status {
                    status: 401 | 403, ..
                } => AnalysisError::AuthFailed(text),
                LlmError::Timeout => AnalysisError::Timeout(text),
                _ => Self::classify(&text),
            },
        }
    }

    /// Short machine label, used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::NoNews => "no_news",
            AnalysisError::QuotaExceeded(_) => "quota",
            AnalysisError::AuthFailed(_) => "auth",
            AnalysisError::Timeout(_) => "timeout",
            AnalysisError::Llm(_) => "llm",
            AnalysisError::OutputTooShort { .. } => "too_short",
        }
    }

    /// Actionable text shown to end users.
    pub fn user_message(&self) -> String {
        match self {
            AnalysisError::NoNews => "没有需要分析的新闻".to_string(),
            AnalysisError::QuotaExceeded(_) => {
                "API免费额度已用完。请在DashScope管理控制台关闭'仅使用免费额度'模式，或充值后继续使用。"
                    .to_string()
            }
            AnalysisError::AuthFailed(_) => "API认证失败，请检查API密钥是否正确。".to_string(),
            AnalysisError::Timeout(_) => "请求超时，请稍后重试。".to_string(),
            AnalysisError::Llm(msg) => format!("生成分析报告失败: {msg}"),
            AnalysisError::OutputTooShort { .. } => {
                "生成分析报告失败: LLM返回内容为空或过短".to_string()
            }
        }
    }
}
