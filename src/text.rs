// src/text.rs
//! Text cleanup and lightweight entity extraction for scraped news.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const AD_PHRASES: &[&str] = &["广告", "推广", "点击查看", "立即购买", "立即下载", "免费领取"];

const KNOWN_TEAMS: &[&str] = &[
    "湖人", "勇士", "凯尔特人", "热火", "篮网", "皇马", "巴萨", "曼联", "利物浦", "切尔西",
];

const KNOWN_PLAYERS: &[&str] = &["詹姆斯", "库里", "杜兰特", "梅西", "C罗", "内马尔"];

fn re_tags() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"))
}

fn re_ws() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"))
}

fn re_dates() -> &'static [Regex] {
    static RE: OnceCell<Vec<Regex>> = OnceCell::new();
    RE.get_or_init(|| {
        [
            r"\d{4}年\d{1,2}月\d{1,2}日",
            r"\d{4}-\d{1,2}-\d{1,2}",
            r"\d{1,2}月\d{1,2}日",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("date regex"))
        .collect()
    })
}

fn re_score() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(\d+)[:：](\d+)").expect("score regex"))
}

/// Decode entities, strip tags and ad phrases, collapse whitespace.
pub fn clean_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();
    out = re_tags().replace_all(&out, "").to_string();
    for ad in AD_PHRASES {
        out = out.replace(ad, "");
    }
    out = re_ws().replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// Entities found in a piece of news text. All lists are sorted and unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entities {
    pub teams: Vec<String>,
    pub players: Vec<String>,
    pub dates: Vec<String>,
    pub scores: Vec<String>,
}

pub fn extract_entities(text: &str) -> Entities {
    if text.is_empty() {
        return Entities::default();
    }

    let known = |list: &[&str]| -> Vec<String> {
        list.iter()
            .filter(|name| text.contains(**name))
            .map(|s| s.to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    };

    let dates: BTreeSet<String> = re_dates()
        .iter()
        .flat_map(|re| re.find_iter(text).map(|m| m.as_str().to_string()))
        .collect();

    // keep order of appearance for scores, like a match log
    let scores = re_score()
        .captures_iter(text)
        .map(|c| format!("{}:{}", &c[1], &c[2]))
        .collect();

    Entities {
        teams: known(KNOWN_TEAMS),
        players: known(KNOWN_PLAYERS),
        dates: dates.into_iter().collect(),
        scores,
    }
}

/// Take at most `max` chars; append `...` when cut.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push_str("...");
    out
}
