// src/analyze/summary.rs
//! Summary extraction from a free-text Markdown report.
//!
//! Chain of fallbacks:
//! 1. a labelled section (`今日新闻综述：`, `综述：`, `新闻综述：`), kept if longer than 100 chars;
//! 2. the first non-heading paragraphs (among the first five) that fit in 800 chars;
//! 3. the first non-heading paragraph cut to 500 chars (the whole text when there is none).
//!
//! Outputs never start with a heading unless the text has nothing else, and never exceed 800 chars,
//! so running the extraction on its own output returns it unchanged.

use once_cell::sync::OnceCell;
use regex::Regex;

pub const SUMMARY_MAX_CHARS: usize = 800;
pub const PREFIX_MAX_CHARS: usize = 500;
const LABEL_MIN_CHARS: usize = 100;
const PARAGRAPH_WINDOW: usize = 5;
const ELLIPSIS: &str = "...";

fn label_patterns() -> &'static [Regex] {
    static RE: OnceCell<Vec<Regex>> = OnceCell::new();
    RE.get_or_init(|| {
        ["今日新闻综述", "综述", "新闻综述"]
            .iter()
            .map(|l| Regex::new(&format!(r"(?i){l}[：:]\s*")).expect("label regex"))
            .collect()
    })
}

// end of a labelled section: blank line or a numbered list item
fn section_end() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\n\n|\n\d+\.").expect("section end regex"))
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Cut to `max` chars total, ellipsis included.
fn clip(s: &str, max: usize) -> String {
    if char_len(s) <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(ELLIPSIS.len());
    let mut out: String = s.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

fn is_heading(s: &str) -> bool {
    s.trim_start().starts_with('#')
}

// a section written as `综述：\n## 概览\n...` keeps only what follows the heading lines
fn strip_leading_headings(s: &str) -> &str {
    let mut rest = s.trim_start();
    while is_heading(rest) {
        rest = rest.split_once('\n').map_or("", |(_, tail)| tail).trim_start();
    }
    rest.trim_end()
}

fn labelled_section(text: &str) -> Option<String> {
    for re in label_patterns() {
        // first occurrence only, as a non-greedy capture would see it
        let Some(m) = re.find(text) else { continue };
        let rest = &text[m.end()..];
        let end = section_end().find(rest).map_or(rest.len(), |e| e.start());
        let captured = strip_leading_headings(&rest[..end]);
        if char_len(captured) > LABEL_MIN_CHARS {
            return Some(clip(captured, SUMMARY_MAX_CHARS));
        }
    }
    None
}

fn leading_paragraphs(text: &str) -> Option<String> {
    let mut picked: Vec<&str> = Vec::new();
    let mut total = 0usize;
    for para in text.split("\n\n").take(PARAGRAPH_WINDOW) {
        let para = para.trim();
        if para.is_empty() || is_heading(para) {
            continue;
        }
        let sep = if picked.is_empty() { 0 } else { 2 };
        let len = char_len(para) + sep;
        if total + len > SUMMARY_MAX_CHARS {
            break;
        }
        picked.push(para);
        total += len;
    }
    (!picked.is_empty()).then(|| picked.join("\n\n"))
}

fn prefix(text: &str) -> String {
    let first = text
        .split("\n\n")
        .map(str::trim)
        .find(|p| !p.is_empty() && !is_heading(p));
    clip(first.unwrap_or(text.trim()), PREFIX_MAX_CHARS)
}

/// Extract a summary from a report. Total: always returns something for non-empty input.
pub fn extract_summary(text: &str) -> String {
    labelled_section(text)
        .or_else(|| leading_paragraphs(text))
        .unwrap_or_else(|| prefix(text))
}
