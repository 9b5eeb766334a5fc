// src/config/app.rs
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

use crate::progress::{CancelPolicy, StreamOptions};

pub const DEFAULT_APP_CONFIG_PATH: &str = "config/app.toml";
pub const ENV_APP_CONFIG_PATH: &str = "APP_CONFIG_PATH";

/// Whole-service configuration (`config/app.toml`). Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub source: SourceConfig,
    pub retriever: RetrieverConfig,
    pub analyzer: AnalyzerConfig,
    pub stream: StreamConfig,
    pub chat: ChatConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub enabled: bool,
    /// OpenAI-compatible base URL (`/chat/completions` is appended).
    pub api_url: String,
    /// Usually empty in the file and provided via `LLM_API_KEY`.
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: "https://dashscope.aliyuncs.com/compatible-mode/v1".into(),
            api_key: String::new(),
            model: "qwen3-max".into(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    pub api_base_url: String,
    pub mobile_base_url: String,
    pub api_timeout_secs: u64,
    pub html_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.hupu.com".into(),
            api_base_url: "https://bbs.hupu.com/v1".into(),
            mobile_base_url: "https://m.hupu.com".into(),
            api_timeout_secs: 15,
            html_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    /// Batch size for the daily collection.
    pub limit: usize,
    /// Category code collected by the daily job.
    pub daily_category: String,
    /// Walked after the requested category during HTML fallback.
    pub fallback_categories: Vec<String>,
    /// Share of `limit` the API must deliver to skip HTML fallback.
    pub api_accept_ratio: f64,
    pub fallback_delay_ms: u64,
    pub use_api: bool,
    pub use_sample: bool,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            limit: 5,
            daily_category: "nba".into(),
            fallback_categories: ["nba", "soccer", "cba", "news"]
                .into_iter()
                .map(String::from)
                .collect(),
            api_accept_ratio: 0.6,
            fallback_delay_ms: 500,
            use_api: true,
            use_sample: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub temperature: f32,
    pub item_max_chars: usize,
    pub min_output_chars: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            temperature: 0.5,
            item_max_chars: 1000,
            min_output_chars: 100,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Delay after each forwarded event; 0 disables pacing.
    pub pacing_ms: u64,
    pub cancel: CancelPolicy,
}

impl StreamConfig {
    pub fn options(&self) -> StreamOptions {
        StreamOptions {
            pacing: (self.pacing_ms > 0).then(|| std::time::Duration::from_millis(self.pacing_ms)),
            cancel: self.cancel,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub temperature: f32,
    /// Messages kept per session (user + assistant).
    pub max_history: usize,
    /// Sessions held in memory; the least recently used is dropped beyond this.
    pub max_sessions: usize,
    pub enable_search: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_history: 20,
            max_sessions: 1000,
            enable_search: true,
        }
    }
}

fn env_flag(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn env_nonempty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(s).context("parse app config TOML")?;
        Ok(cfg)
    }

    /// Read a TOML file. A missing file yields defaults; an invalid one is an error.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)
            .with_context(|| format!("read app config {}", path.display()))?;
        Self::from_toml_str(&data).with_context(|| format!("load app config {}", path.display()))
    }

    /// Load from `APP_CONFIG_PATH` (or `config/app.toml`) and apply env overrides.
    pub fn load() -> anyhow::Result<Self> {
        let path =
            env::var(ENV_APP_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_APP_CONFIG_PATH.to_string());
        let mut cfg = Self::load_from_file(&path)?;
        cfg.apply_env_overrides();
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_nonempty("LLM_API_URL") {
            self.llm.api_url = v;
        }
        if let Some(v) = env_nonempty("LLM_API_KEY") {
            self.llm.api_key = v;
        }
        if let Some(v) = env_nonempty("LLM_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = env_nonempty("LLM_ENABLED") {
            self.llm.enabled = env_flag(&v);
        }
        if let Some(v) = env_nonempty("HUPU_BASE_URL") {
            self.source.base_url = v;
        }
        if let Some(v) = env_nonempty("HUPU_API_BASE_URL") {
            self.source.api_base_url = v;
        }
        if let Some(v) = env_nonempty("HUPU_MOBILE_BASE_URL") {
            self.source.mobile_base_url = v;
        }
    }

    /// Clamp out-of-range values back to defaults.
    pub fn sanitize(&mut self) {
        let d = RetrieverConfig::default();
        if self.retriever.limit == 0 {
            self.retriever.limit = d.limit;
        }
        if !(0.0..=1.0).contains(&self.retriever.api_accept_ratio) {
            self.retriever.api_accept_ratio = d.api_accept_ratio;
        }
        if self.chat.max_history == 0 {
            self.chat.max_history = ChatConfig::default().max_history;
        }
        if self.chat.max_sessions == 0 {
            self.chat.max_sessions = ChatConfig::default().max_sessions;
        }
        if self.analyzer.item_max_chars == 0 {
            self.analyzer.item_max_chars = AnalyzerConfig::default().item_max_chars;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_deployed_service() {
        let c = AppConfig::default();
        assert!(c.llm.enabled);
        assert_eq!(c.llm.model, "qwen3-max");
        assert_eq!(c.source.api_timeout_secs, 15);
        assert_eq!(c.source.html_timeout_secs, 10);
        assert_eq!(c.retriever.limit, 5);
        assert_eq!(c.retriever.fallback_categories, vec!["nba", "soccer", "cba", "news"]);
        assert_eq!(c.stream.cancel, CancelPolicy::Detach);
        assert_eq!(c.chat.max_history, 20);
        assert_eq!(c.chat.max_sessions, 1000);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let c = AppConfig::from_toml_str(
            r#"
[retriever]
limit = 8
fallback_delay_ms = 0

[stream]
cancel = "abort_on_disconnect"
"#,
        )
        .unwrap();
        assert_eq!(c.retriever.limit, 8);
        assert_eq!(c.retriever.fallback_delay_ms, 0);
        assert_eq!(c.retriever.api_accept_ratio, 0.6);
        assert_eq!(c.stream.cancel, CancelPolicy::AbortOnDisconnect);
        assert_eq!(c.llm.timeout_secs, 120);
    }

    #[test]
    fn sanitize_restores_invalid_values() {
        let mut c = AppConfig::default();
        c.retriever.limit = 0;
        c.retriever.api_accept_ratio = 3.0;
        c.sanitize();
        assert_eq!(c.retriever.limit, 5);
        assert_eq!(c.retriever.api_accept_ratio, 0.6);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(AppConfig::from_toml_str("[retriever]\nlimit = \"many\"").is_err());
    }
}
