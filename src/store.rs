//! In-memory persistence for collected news, reports and chat records.
//!
//! Ids are assigned sequentially per table and never reused. Listing is newest first.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::analyze::{AnalysisResult, Sentiment, Statistics};
use crate::ingest::NewsItem;
use crate::text::truncate_chars;

/// Stored bodies are capped at this many chars.
pub const STORED_BODY_MAX_CHARS: usize = 5000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredNews {
    pub id: u64,
    #[serde(flatten)]
    pub item: NewsItem,
    pub processed: bool,
    pub collected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: u64,
    pub title: String,
    pub summary: String,
    pub content: String,
    pub analysis_type: String,
    pub news_ids: Vec<u64>,
    pub statistics: Statistics,
    pub sentiment: Sentiment,
    pub report_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRecord {
    pub id: u64,
    pub session_id: String,
    pub message: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub today_news_count: usize,
    pub total_news_count: usize,
    pub today_reports_count: usize,
    pub total_reports_count: usize,
}

#[derive(Default)]
struct Tables {
    news: BTreeMap<u64, StoredNews>,
    reports: BTreeMap<u64, Report>,
    chats: Vec<ChatRecord>,
    next_news: u64,
    next_report: u64,
    next_chat: u64,
}

fn bump(counter: &mut u64) -> u64 {
    *counter += 1;
    *counter
}

// Newest first; ids break ties between identical timestamps.
fn page<T: Clone>(
    rows: impl DoubleEndedIterator<Item = T>,
    key: impl Fn(&T) -> DateTime<Utc>,
    skip: usize,
    limit: usize,
) -> Vec<T> {
    let mut all: Vec<T> = rows.rev().collect();
    all.sort_by(|a, b| key(b).cmp(&key(a)));
    all.into_iter().skip(skip).take(limit).collect()
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ---------------- news ----------------

    /// Store items as unprocessed news; returns the stored rows in input order.
    pub fn insert_news(&self, items: Vec<NewsItem>) -> Vec<StoredNews> {
        let now = Utc::now();
        let mut t = self.tables();
        items
            .into_iter()
            .map(|mut item| {
                item.body = truncate_chars(&item.body, STORED_BODY_MAX_CHARS);
                let id = bump(&mut t.next_news);
                let row = StoredNews {
                    id,
                    item,
                    processed: false,
                    collected_at: now,
                };
                t.news.insert(id, row.clone());
                row
            })
            .collect()
    }

    pub fn list_news(&self, skip: usize, limit: usize) -> Vec<StoredNews> {
        let t = self.tables();
        page(t.news.values().cloned(), |n| n.collected_at, skip, limit)
    }

    pub fn get_news(&self, id: u64) -> Option<StoredNews> {
        self.tables().news.get(&id).cloned()
    }

    pub fn delete_news(&self, id: u64) -> bool {
        self.tables().news.remove(&id).is_some()
    }

    /// Unprocessed news in collection order.
    pub fn unprocessed_news(&self) -> Vec<StoredNews> {
        self.tables()
            .news
            .values()
            .filter(|n| !n.processed)
            .cloned()
            .collect()
    }

    pub fn mark_processed(&self, ids: &[u64]) {
        let mut t = self.tables();
        for id in ids {
            if let Some(n) = t.news.get_mut(id) {
                n.processed = true;
            }
        }
    }

    // ---------------- reports ----------------

    pub fn insert_report(&self, title: String, news_ids: Vec<u64>, result: AnalysisResult) -> Report {
        let now = Utc::now();
        let mut t = self.tables();
        let id = bump(&mut t.next_report);
        let report = Report {
            id,
            title,
            summary: result.summary,
            content: result.full_report,
            analysis_type: result.analysis_type,
            news_ids,
            statistics: result.statistics,
            sentiment: result.sentiment,
            report_date: now,
            created_at: now,
        };
        t.reports.insert(id, report.clone());
        report
    }

    pub fn list_reports(&self, skip: usize, limit: usize) -> Vec<Report> {
        let t = self.tables();
        page(t.reports.values().cloned(), |r| r.created_at, skip, limit)
    }

    pub fn get_report(&self, id: u64) -> Option<Report> {
        self.tables().reports.get(&id).cloned()
    }

    pub fn delete_report(&self, id: u64) -> bool {
        self.tables().reports.remove(&id).is_some()
    }

    // ---------------- chat ----------------

    pub fn record_chat(&self, session_id: &str, message: &str, response: &str) -> ChatRecord {
        let mut t = self.tables();
        let id = bump(&mut t.next_chat);
        let rec = ChatRecord {
            id,
            session_id: session_id.to_string(),
            message: message.to_string(),
            response: response.to_string(),
            created_at: Utc::now(),
        };
        t.chats.push(rec.clone());
        rec
    }

    pub fn chat_records(&self, session_id: &str) -> Vec<ChatRecord> {
        self.tables()
            .chats
            .iter()
            .filter(|c| c.session_id == session_id)
            .cloned()
            .collect()
    }

    // ---------------- dashboard ----------------

    pub fn dashboard_stats(&self) -> DashboardStats {
        self.dashboard_stats_at(Local::now())
    }

    /// Counts with "today" meaning the local calendar day of `now`.
    pub fn dashboard_stats_at(&self, now: DateTime<Local>) -> DashboardStats {
        let today = now.date_naive();
        let is_today = |ts: &DateTime<Utc>| ts.with_timezone(&Local).date_naive() == today;
        let t = self.tables();
        DashboardStats {
            today_news_count: t.news.values().filter(|n| is_today(&n.collected_at)).count(),
            total_news_count: t.news.len(),
            today_reports_count: t.reports.values().filter(|r| is_today(&r.created_at)).count(),
            total_reports_count: t.reports.len(),
        }
    }
}
