//! LLM adapter: client abstraction, OpenAI-compatible provider, and test doubles.
//!
//! The LLM is an opaque text-completion service: a role-tagged message list plus a
//! temperature and a search flag go in, Markdown text comes out.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::config::app::LlmConfig;
use crate::error::LlmError;

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    /// Let the provider use its built-in web search.
    pub enable_search: bool,
}

/// Trait object used by the analyzer, chat service and tests.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, req: &ChatRequest) -> Result<String, LlmError>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynLlm = Arc<dyn LlmClient>;

/// Factory: build a client according to config and environment variables.
///
/// * If `AI_TEST_MODE=mock`, returns a deterministic mock client.
/// * Else if `config.enabled == false`, returns a disabled client.
/// * Else builds the OpenAI-compatible provider.
pub fn build_client_from_config(config: &LlmConfig) -> anyhow::Result<DynLlm> {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Ok(Arc::new(MockLlm));
    }
    if !config.enabled {
        return Ok(Arc::new(DisabledClient));
    }
    Ok(Arc::new(OpenAiCompatProvider::new(config)?))
}

// ------------------------------------------------------------
// OpenAI-compatible provider (DashScope compatible mode by default)
// ------------------------------------------------------------

pub struct OpenAiCompatProvider {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatProvider {
    pub fn new(config: &LlmConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("sports-news-analyzer/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("build LLM http client")?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.api_url.trim_end_matches('/')),
            api_key: config.api_key.trim().to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatProvider {
    async fn complete(&self, req: &ChatRequest) -> Result<String, LlmError> {
        if self.api_key.is_empty() {
            return Err(LlmError::MissingKey);
        }

        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: &'a [ChatMessage],
            temperature: f32,
            enable_search: bool,
        }
        #[derive(Deserialize)]
        struct Resp {
            #[serde(default)]
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            #[serde(default)]
            content: Option<String>,
        }

        let body = Req {
            model: &self.model,
            messages: &req.messages,
            temperature: req.temperature,
            enable_search: req.enable_search,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: text.chars().take(300).collect(),
            });
        }

        let parsed: Resp = resp
            .json()
            .await
            .map_err(|e| LlmError::Transport(format!("decode completion: {e}")))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(LlmError::EmptyContent);
        }
        Ok(content)
    }

    fn provider_name(&self) -> &'static str {
        "openai-compatible"
    }
}

// ------------------------------------------------------------
// Disabled + mock clients
// ------------------------------------------------------------

/// Always fails with `LlmError::Disabled`.
pub struct DisabledClient;

#[async_trait]
impl LlmClient for DisabledClient {
    async fn complete(&self, _req: &ChatRequest) -> Result<String, LlmError> {
        Err(LlmError::Disabled)
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Deterministic offline client for local runs (`AI_TEST_MODE=mock`).
/// Report prompts get a canned Markdown report; anything else gets an echo.
pub struct MockLlm;

pub const MOCK_REPORT: &str = "## 今日体育新闻分析报告\n\n\
今日新闻综述：今日体育新闻以篮球和足球为主，多场焦点战上演精彩对决，球星表现出色，球队在积分榜上的竞争愈发激烈。\
整体来看，赛场内外既有突破与成功，也有伤病与争议，值得持续关注后续发展与各队的调整策略，尤其是季后赛席位的争夺。\n\n\
### 二、新闻关键内容提取与点评\n\n\
1. 焦点战役：强队延续领先优势，核心球员发挥出色。\n\n\
### 三、综合分析\n\n\
**整体评价：** 正面。\n";

#[async_trait]
impl LlmClient for MockLlm {
    async fn complete(&self, req: &ChatRequest) -> Result<String, LlmError> {
        let last_user = req
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("");
        if last_user.contains("【新闻") {
            Ok(MOCK_REPORT.to_string())
        } else {
            Ok(format!("（模拟回复）您的问题是：{last_user}"))
        }
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(any(test, feature = "test-util"))]
pub use scripted::ScriptedLlm;

#[cfg(any(test, feature = "test-util"))]
mod scripted {
    use std::collections::VecDeque;
    use std::sync::{Mutex, PoisonError};

    use async_trait::async_trait;
    use tracing::warn;

    use super::{ChatRequest, LlmClient};
    use crate::error::LlmError;

    /// Replays queued outcomes in order and records every request. Once the queue is
    /// drained, the fallback outcome (if any) is repeated; otherwise calls fail.
    #[derive(Default)]
    pub struct ScriptedLlm {
        queue: Mutex<VecDeque<Result<String, LlmError>>>,
        repeat: Option<String>,
        calls: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedLlm {
        pub fn new(outcomes: Vec<Result<String, LlmError>>) -> Self {
            Self {
                queue: Mutex::new(outcomes.into()),
                ..Default::default()
            }
        }

        /// Answers every call with `text`.
        pub fn always(text: impl Into<String>) -> Self {
            Self {
                repeat: Some(text.into()),
                ..Default::default()
            }
        }

        pub fn calls(&self) -> Vec<ChatRequest> {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, req: &ChatRequest) -> Result<String, LlmError> {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(req.clone());
            let next = self
                .queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            match (next, &self.repeat) {
                (Some(outcome), _) => outcome,
                (None, Some(text)) => Ok(text.clone()),
                (None, None) => {
                    warn!("scripted LLM exhausted");
                    Err(LlmError::Transport("script exhausted".into()))
                }
            }
        }
        fn provider_name(&self) -> &'static str {
            "scripted"
        }
    }
}
