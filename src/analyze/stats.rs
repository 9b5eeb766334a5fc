use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::classify::Category;
use crate::ingest::NewsItem;

/// Batch-level tallies attached to every analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_count: usize,
    pub categories: BTreeMap<Category, usize>,
    pub teams_count: usize,
    pub players_count: usize,
    pub teams: Vec<String>,
    pub players: Vec<String>,
}

/// Category histogram plus the union of teams and players found in item metadata.
pub fn compute_statistics(items: &[NewsItem]) -> Statistics {
    let mut categories = BTreeMap::new();
    let mut teams = BTreeSet::new();
    let mut players = BTreeSet::new();

    for item in items {
        *categories.entry(item.category).or_insert(0) += 1;
        teams.extend(item.teams());
        players.extend(item.players());
    }

    Statistics {
        total_count: items.len(),
        categories,
        teams_count: teams.len(),
        players_count: players.len(),
        teams: teams.into_iter().collect(),
        players: players.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::{json, Map};

    fn item(cat: Category, teams: &[&str], players: &[&str]) -> NewsItem {
        let mut metadata = Map::new();
        metadata.insert("teams".into(), json!(teams));
        metadata.insert("players".into(), json!(players));
        NewsItem {
            title: "t".into(),
            body: "b".into(),
            source: "s".into(),
            url: String::new(),
            category: cat,
            publish_time: Utc::now(),
            metadata,
        }
    }

    #[test]
    fn tallies_and_unions() {
        let items = vec![
            item(Category::Nba, &["湖人", "勇士"], &["詹姆斯"]),
            item(Category::Nba, &["湖人"], &["库里"]),
            item(Category::Soccer, &["皇马"], &[]),
        ];
        let s = compute_statistics(&items);
        assert_eq!(s.total_count, 3);
        assert_eq!(s.categories[&Category::Nba], 2);
        assert_eq!(s.categories[&Category::Soccer], 1);
        assert_eq!(s.teams_count, 3);
        assert_eq!(s.players, vec!["库里".to_string(), "詹姆斯".to_string()]);
    }

    #[test]
    fn empty_batch() {
        let s = compute_statistics(&[]);
        assert_eq!(s, Statistics::default());
    }

    #[test]
    fn categories_serialize_by_slug() {
        let s = compute_statistics(&[item(Category::Cba, &[], &[])]);
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["categories"]["cba"], 1);
    }
}
