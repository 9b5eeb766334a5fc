// src/ingest/mod.rs
//! News retrieval: API first, HTML list pages as fallback, across fallback
//! categories, with de-duplication, re-classification and a fixed sample as
//! the last resort. `Retriever::fetch` never fails.

pub mod html;
pub mod hupu;
pub mod payload;
pub mod sample;
pub mod time;
pub mod types;

use chrono::Utc;
use metrics::counter;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::classify::Classifier;
use crate::config::app::RetrieverConfig;
use crate::text::{clean_text, extract_entities};
pub use types::{NewsItem, NewsSource};

const PATH_API: &str = "api";
const PATH_HTML: &str = "html";

pub struct Retriever {
    source: Arc<dyn NewsSource>,
    classifier: Arc<Classifier>,
    cfg: RetrieverConfig,
}

impl Retriever {
    pub fn new(source: Arc<dyn NewsSource>, classifier: Arc<Classifier>, cfg: RetrieverConfig) -> Self {
        Self {
            source,
            classifier,
            cfg,
        }
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.cfg
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    /// Clean, re-classify and annotate one raw item. `None` when the title is empty after cleanup.
    fn finalize(&self, mut item: NewsItem) -> Option<NewsItem> {
        item.title = clean_text(&item.title);
        if item.title.is_empty() {
            return None;
        }
        item.body = clean_text(&item.body);
        if item.body.is_empty() {
            item.body = item.title.clone();
        }

        let original = item.category;
        let detected = self.classifier.classify(&item.title, &item.body);
        if !detected.is_generic() {
            item.category = detected;
        }
        item.metadata
            .insert("detected_category".into(), json!(detected));
        item.metadata
            .insert("original_category".into(), json!(original));

        let entities = extract_entities(&format!("{} {}", item.title, item.body));
        merge_list(&mut item, "teams", entities.teams);
        merge_list(&mut item, "players", entities.players);
        Some(item)
    }

    /// Append unseen, finalized items until `limit` is reached. Returns how many were added.
    fn accumulate(
        &self,
        acc: &mut Vec<NewsItem>,
        seen: &mut HashSet<String>,
        items: Vec<NewsItem>,
        limit: usize,
    ) -> usize {
        let before = acc.len();
        for item in items.into_iter().filter_map(|i| self.finalize(i)) {
            if acc.len() >= limit {
                break;
            }
            if seen.insert(item.title.clone()) {
                acc.push(item);
            }
        }
        acc.len() - before
    }

    fn api_is_enough(&self, got: usize, limit: usize) -> bool {
        got > 0 && got as f64 + 1e-9 >= limit as f64 * self.cfg.api_accept_ratio
    }

    /// Fetch at most `limit` items for a category code. Never fails; never returns duplicate titles.
    #[instrument(level = "info", skip(self), fields(source = self.source.name()))]
    pub async fn fetch(&self, category: &str, limit: usize) -> Vec<NewsItem> {
        crate::metrics::ensure_described();
        if limit == 0 {
            return Vec::new();
        }

        let mut acc: Vec<NewsItem> = Vec::with_capacity(limit);
        let mut seen: HashSet<String> = HashSet::new();

        // 1) structured API
        if self.cfg.use_api {
            match self.source.fetch_api(category, limit).await {
                Ok(items) => {
                    let added = self.accumulate(&mut acc, &mut seen, items, limit);
                    counter!("retriever_items_total", "path" => PATH_API).increment(added as u64);
                    if self.api_is_enough(added, limit) {
                        info!(category, path = PATH_API, count = added, "api batch accepted");
                        return acc;
                    }
                    if added == 0 {
                        counter!("retriever_path_failures_total", "path" => PATH_API).increment(1);
                    }
                    warn!(category, path = PATH_API, count = added, "api batch insufficient; falling back to html");
                }
                Err(e) => {
                    counter!("retriever_path_failures_total", "path" => PATH_API).increment(1);
                    warn!(category, path = PATH_API, error = %e, "api path failed; falling back to html");
                }
            }
        }

        // 2) HTML list pages: requested category, then the fallback list
        let mut codes: Vec<&str> = vec![category];
        for c in &self.cfg.fallback_categories {
            if !codes.contains(&c.as_str()) {
                codes.push(c.as_str());
            }
        }

        for (i, code) in codes.iter().enumerate() {
            if acc.len() >= limit {
                break;
            }
            if i > 0 && self.cfg.fallback_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.cfg.fallback_delay_ms)).await;
            }
            match self.source.fetch_list_page(code, limit).await {
                Ok(items) => {
                    let added = self.accumulate(&mut acc, &mut seen, items, limit);
                    counter!("retriever_items_total", "path" => PATH_HTML).increment(added as u64);
                    if added == 0 {
                        counter!("retriever_path_failures_total", "path" => PATH_HTML).increment(1);
                    }
                    info!(category = *code, path = PATH_HTML, count = added, total = acc.len(), "list page collected");
                }
                Err(e) => {
                    counter!("retriever_path_failures_total", "path" => PATH_HTML).increment(1);
                    warn!(category = *code, path = PATH_HTML, error = %e, "list page failed");
                }
            }
        }

        // 3) fixed sample
        if acc.is_empty() && self.cfg.use_sample {
            counter!("retriever_fallback_sample_total").increment(1);
            warn!(category, "all retrieval paths empty; using sample news");
            return sample::sample_news(limit, Utc::now());
        }

        acc.truncate(limit);
        acc
    }

    /// Live hot topics for a category code. Failures yield an empty list.
    #[instrument(level = "info", skip(self))]
    pub async fn hot_topics(&self, category: &str, limit: usize) -> Vec<NewsItem> {
        match self.source.fetch_hot(category, limit).await {
            Ok(items) => items
                .into_iter()
                .filter_map(|i| self.finalize(i))
                .take(limit)
                .collect(),
            Err(e) => {
                warn!(category, error = %e, "hot topics unavailable");
                Vec::new()
            }
        }
    }
}

// Union of existing metadata strings and newly found ones, order kept.
fn merge_list(item: &mut NewsItem, key: &str, found: Vec<String>) {
    let mut list = item.metadata_list(key);
    for f in found {
        if !list.contains(&f) {
            list.push(f);
        }
    }
    item.metadata.insert(key.to_string(), Value::from(list));
}

