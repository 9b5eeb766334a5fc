// src/ingest/hupu.rs
//! Hupu news source: JSON API, HTML list pages (desktop then mobile) and hot topics.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, ORIGIN, REFERER};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::classify::Category;
use crate::config::app::SourceConfig;
use crate::error::SourceError;
use crate::ingest::html::{self, ListEntry};
use crate::ingest::payload::{
    first_text, first_u64, first_value, probe_list, HOT_LIST_ACCESSORS, NEWS_LIST_ACCESSORS,
};
use crate::ingest::time::{parse_api_time, parse_page_time};
use crate::ingest::types::{NewsItem, NewsSource};

pub const SITE_NAME: &str = "虎扑";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub struct HupuSource {
    http: reqwest::Client,
    cfg: SourceConfig,
}

impl HupuSource {
    pub fn new(cfg: SourceConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "application/json, text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.8"));
        if let Ok(v) = HeaderValue::from_str(&format!("{}/", cfg.base_url.trim_end_matches('/'))) {
            headers.insert(REFERER, v);
        }
        if let Ok(v) = HeaderValue::from_str(cfg.base_url.trim_end_matches('/')) {
            headers.insert(ORIGIN, v);
        }

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self { http, cfg })
    }

    fn api_base(&self) -> &str {
        self.cfg.api_base_url.trim_end_matches('/')
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, SourceError> {
        let resp = self
            .http
            .get(url)
            .query(query)
            .timeout(Duration::from_secs(self.cfg.api_timeout_secs))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let text = resp.text().await?;
        serde_json::from_str(&text).map_err(|e| SourceError::Decode(e.to_string()))
    }

    async fn get_html(&self, url: &str) -> Result<String, SourceError> {
        let resp = self
            .http
            .get(url)
            .timeout(Duration::from_secs(self.cfg.html_timeout_secs))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(resp.text().await?)
    }
}

fn base_metadata(code: &str, source_type: &str) -> Map<String, Value> {
    let mut m = Map::new();
    m.insert("source_site".into(), json!(SITE_NAME));
    m.insert("source_type".into(), json!(source_type));
    m.insert("category_code".into(), json!(code));
    m
}

/// Map one API item. Items without a title are skipped.
pub fn item_from_api(raw: &Value, code: &str, now: DateTime<Utc>) -> Option<NewsItem> {
    let title = first_text(raw, &["title", "headline", "name"])?;
    let body = first_text(raw, &["content", "summary", "description", "title"]).unwrap_or_default();
    let mut metadata = base_metadata(code, "API");
    metadata.insert("api_data".into(), raw.clone());

    Some(NewsItem {
        title,
        body,
        source: first_text(raw, &["source", "author"]).unwrap_or_else(|| SITE_NAME.to_string()),
        url: first_text(raw, &["url", "link", "href"]).unwrap_or_default(),
        category: Category::from_code(code),
        publish_time: parse_api_time(first_value(raw, &["time", "publish_time", "date"]), now),
        metadata,
    })
}

/// Map one scraped list entry.
pub fn item_from_entry(entry: ListEntry, code: &str, now: DateTime<Utc>) -> NewsItem {
    let publish_time = entry
        .time_text
        .as_deref()
        .map(|t| parse_page_time(t, now))
        .unwrap_or(now);
    let body = if entry.snippet.is_empty() {
        entry.title.clone()
    } else {
        entry.snippet
    };
    NewsItem {
        title: entry.title,
        body,
        source: entry.source.unwrap_or_else(|| SITE_NAME.to_string()),
        url: entry.url,
        category: Category::from_code(code),
        publish_time,
        metadata: base_metadata(code, "HTML"),
    }
}

/// Map one hot-topic item.
pub fn item_from_hot(raw: &Value, code: &str, now: DateTime<Utc>) -> Option<NewsItem> {
    let title = first_text(raw, &["title", "subject"])?;
    let mut metadata = base_metadata(code, "热门话题");
    metadata.insert("reply_count".into(), json!(first_u64(raw, &["reply_count"])));
    metadata.insert("view_count".into(), json!(first_u64(raw, &["view_count"])));

    Some(NewsItem {
        title,
        body: first_text(raw, &["content", "summary"]).unwrap_or_default(),
        source: format!("{SITE_NAME}社区"),
        url: first_text(raw, &["url", "link"]).unwrap_or_default(),
        category: Category::from_code(code),
        publish_time: parse_api_time(first_value(raw, &["time", "publish_time"]), now),
        metadata,
    })
}

#[async_trait]
impl NewsSource for HupuSource {
    #[instrument(level = "debug", skip(self))]
    async fn fetch_api(&self, code: &str, limit: usize) -> Result<Vec<NewsItem>, SourceError> {
        let url = format!("{}/news/{code}", self.api_base());
        let doc = self
            .get_json(&url, &[("page", "1".into()), ("limit", limit.to_string())])
            .await?;

        let now = Utc::now();
        let items = probe_list(&doc, NEWS_LIST_ACCESSORS)
            .map(|list| {
                list.iter()
                    .take(limit)
                    .filter_map(|raw| item_from_api(raw, code, now))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        debug!(%url, count = items.len(), "api items parsed");
        Ok(items)
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch_list_page(
        &self,
        code: &str,
        limit: usize,
    ) -> Result<Vec<NewsItem>, SourceError> {
        let base = self.cfg.base_url.trim_end_matches('/');
        let primary = format!("{base}/{code}");
        let body = match self.get_html(&primary).await {
            Ok(body) => body,
            Err(SourceError::Status { status, .. }) => {
                let mobile = format!("{}/{code}", self.cfg.mobile_base_url.trim_end_matches('/'));
                debug!(status, %mobile, "primary list page failed; trying mobile");
                self.get_html(&mobile).await?
            }
            Err(e) => return Err(e),
        };

        let now = Utc::now();
        let items = html::parse_list_page(&body, base, limit)
            .into_iter()
            .map(|e| item_from_entry(e, code, now))
            .collect::<Vec<_>>();
        debug!(%primary, count = items.len(), "list page parsed");
        Ok(items)
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch_hot(&self, code: &str, limit: usize) -> Result<Vec<NewsItem>, SourceError> {
        let url = format!("{}/bbs/hot", self.api_base());
        let doc = self
            .get_json(&url, &[("category", code.to_string()), ("limit", limit.to_string())])
            .await?;

        let now = Utc::now();
        Ok(probe_list(&doc, HOT_LIST_ACCESSORS)
            .map(|list| {
                list.iter()
                    .take(limit)
                    .filter_map(|raw| item_from_hot(raw, code, now))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "hupu"
    }
}
