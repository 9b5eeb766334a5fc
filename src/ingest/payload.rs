// src/ingest/payload.rs
//! Defensive access to loosely-shaped JSON payloads.
//!
//! The source API nests its results under varying field names and uses
//! varying names inside each item. Each lookup is an ordered list of
//! accessors; the first one yielding a non-empty value wins.

use serde_json::Value;

/// Accessor over a generic JSON document.
pub type Accessor = for<'a> fn(&'a Value) -> Option<&'a Value>;

/// Result-list accessors for the news endpoint, most common shape first.
pub const NEWS_LIST_ACCESSORS: &[Accessor] = &[
    |v| v.get("data"),
    |v| v.get("list"),
    |v| v.get("news"),
    |v| v.get("result"),
    |v| v.get("data").and_then(|d| d.get("list")),
    |v| v.get("data").and_then(|d| d.get("news")),
    |v| v.get("data").and_then(|d| d.get("items")),
];

/// Result-list accessors for the hot-topics endpoint.
pub const HOT_LIST_ACCESSORS: &[Accessor] = &[
    |v| v.get("data"),
    |v| v.get("list"),
    |v| v.get("topics"),
    |v| v.get("data").and_then(|d| d.get("list")),
];

// Python-style truthiness: null, "", [], {} count as absent.
fn is_present(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

/// First accessor returning a non-empty array. A bare top-level array is accepted as-is.
pub fn probe_list<'a>(doc: &'a Value, accessors: &[Accessor]) -> Option<&'a Vec<Value>> {
    if let Value::Array(items) = doc {
        return (!items.is_empty()).then_some(items);
    }
    accessors
        .iter()
        .filter_map(|acc| acc(doc))
        .find_map(|v| match v {
            Value::Array(items) if !items.is_empty() => Some(items),
            _ => None,
        })
}

/// First present value among `keys`.
pub fn first_value<'a>(item: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| item.get(*k))
        .find(|v| is_present(v))
}

/// First present value among `keys`, rendered as trimmed text.
pub fn first_text(item: &Value, keys: &[&str]) -> Option<String> {
    first_value(item, keys).and_then(|v| match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

pub fn first_u64(item: &Value, keys: &[&str]) -> u64 {
    first_value(item, keys)
        .and_then(|v| match v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .unwrap_or(0)
}
