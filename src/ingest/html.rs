// src/ingest/html.rs
//! List-page scraping by CSS-selector probing.
//!
//! Selectors are tried from most to least specific; the first one that matches
//! anything wins. When none match, any anchor whose href looks like a news,
//! article or bbs link is used. Each element is then parsed best-effort.
//!
//! Everything here is synchronous: `scraper::Html` is not `Send` and must not
//! live across an `.await`.

use once_cell::sync::OnceCell;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

pub const LIST_SELECTORS: &[&str] = &[
    "div.news-list-item",
    "div.list-item",
    "a.news-item",
    "div.news-item",
    "li.news-item",
    r#"div[class*="news"]"#,
    r#"a[href*="/news/"]"#,
    r#"a[href*="/article/"]"#,
];

/// One raw entry from a list page, before cleanup and classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListEntry {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub time_text: Option<String>,
    pub source: Option<String>,
}

struct Probes {
    list: Vec<Selector>,
    any_anchor: Selector,
    anchor: Selector,
    title: Selector,
    snippet: Selector,
    time: Selector,
    source: Selector,
    re_link: Regex,
    re_title: Regex,
    re_snippet: Regex,
    re_time: Regex,
    re_source: Regex,
}

fn probes() -> &'static Probes {
    static P: OnceCell<Probes> = OnceCell::new();
    P.get_or_init(|| {
        let sel = |s: &str| Selector::parse(s).expect("static selector");
        let re = |s: &str| Regex::new(s).expect("static regex");
        Probes {
            list: LIST_SELECTORS.iter().map(|s| sel(s)).collect(),
            any_anchor: sel("a[href]"),
            anchor: sel("a"),
            title: sel("h3, h2, h1, a, span"),
            snippet: sel("p, div, span"),
            time: sel("span, div, time"),
            source: sel("span, div"),
            re_link: re(r"/(news|article|bbs)/"),
            re_title: re(r"title|headline"),
            re_snippet: re(r"content|summary|desc|intro"),
            re_time: re(r"time|date|publish"),
            re_source: re(r"source|author|from"),
        }
    })
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().map(str::trim).filter(|s| !s.is_empty()).collect()
}

fn is_anchor(el: ElementRef<'_>) -> bool {
    el.value().name() == "a"
}

/// First strict descendant matching `sel` whose class attribute matches `class_re`.
fn find_classed<'a>(el: ElementRef<'a>, sel: &Selector, class_re: &Regex) -> Option<ElementRef<'a>> {
    el.select(sel).filter(|d| d.id() != el.id()).find(|d| {
        d.value()
            .attr("class")
            .is_some_and(|c| class_re.is_match(c))
    })
}

fn first_anchor(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.select(&probes().anchor).find(|d| d.id() != el.id())
}

/// Resolve a relative href against the site base.
pub fn absolutize(base: &str, href: &str) -> String {
    if href.is_empty() || href.starts_with("http") {
        return href.to_string();
    }
    Url::parse(base)
        .and_then(|b| b.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| format!("{}{}", base.trim_end_matches('/'), href))
}

fn parse_entry(el: ElementRef<'_>, base: &str) -> Option<ListEntry> {
    let p = probes();

    let title_el = find_classed(el, &p.title, &p.re_title).or_else(|| first_anchor(el));
    let mut title = title_el.map(text_of).unwrap_or_default();
    if title.is_empty() && is_anchor(el) {
        title = text_of(el);
    }
    if title.is_empty() {
        return None;
    }

    let link_el = if is_anchor(el) { Some(el) } else { first_anchor(el) };
    let href = link_el
        .and_then(|a| a.value().attr("href"))
        .unwrap_or_default();

    let non_empty = |s: String| (!s.is_empty()).then_some(s);

    Some(ListEntry {
        title,
        url: absolutize(base, href.trim()),
        snippet: find_classed(el, &p.snippet, &p.re_snippet)
            .map(text_of)
            .unwrap_or_default(),
        time_text: find_classed(el, &p.time, &p.re_time)
            .map(text_of)
            .and_then(non_empty),
        source: find_classed(el, &p.source, &p.re_source)
            .map(text_of)
            .and_then(non_empty),
    })
}

/// Parse up to `limit` entries from a list page. Entries without a title are dropped.
pub fn parse_list_page(html: &str, base: &str, limit: usize) -> Vec<ListEntry> {
    let doc = Html::parse_document(html);
    let p = probes();

    let mut elements: Vec<ElementRef<'_>> = Vec::new();
    for (raw, sel) in LIST_SELECTORS.iter().zip(&p.list) {
        elements = doc.select(sel).collect();
        if !elements.is_empty() {
            tracing::debug!(selector = raw, count = elements.len(), "list selector matched");
            break;
        }
    }

    if elements.is_empty() {
        elements = doc
            .select(&p.any_anchor)
            .filter(|a| {
                a.value()
                    .attr("href")
                    .is_some_and(|h| p.re_link.is_match(h))
            })
            .collect();
    }

    elements
        .into_iter()
        .take(limit)
        .filter_map(|el| parse_entry(el, base))
        .collect()
}
