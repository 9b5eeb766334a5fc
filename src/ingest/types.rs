// src/ingest/types.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::classify::Category;
use crate::error::SourceError;

/// One collected news item. Immutable once accepted into a batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsItem {
    pub title: String,
    pub body: String,
    pub source: String,
    pub url: String,
    pub category: Category,
    pub publish_time: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl NewsItem {
    /// String list stored under `key` in metadata (e.g. "teams", "players").
    pub fn metadata_list(&self, key: &str) -> Vec<String> {
        match self.metadata.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn teams(&self) -> Vec<String> {
        self.metadata_list("teams")
    }

    pub fn players(&self) -> Vec<String> {
        self.metadata_list("players")
    }
}

/// A news site reachable over several paths. Each call is one attempt;
/// errors are reported, not retried.
#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Structured JSON API for a category code.
    async fn fetch_api(&self, code: &str, limit: usize) -> Result<Vec<NewsItem>, SourceError>;

    /// HTML list page for a category code.
    async fn fetch_list_page(&self, code: &str, limit: usize)
        -> Result<Vec<NewsItem>, SourceError>;

    /// Community hot topics.
    async fn fetch_hot(&self, code: &str, limit: usize) -> Result<Vec<NewsItem>, SourceError>;

    fn name(&self) -> &'static str;
}
