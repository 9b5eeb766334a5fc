// src/classify.rs
//! Keyword-based category classifier for sports news.
//!
//! - Each category carries a keyword list (lowercased, matched as substrings).
//! - A keyword found in the title scores 2, and 1 more if found in the scored text
//!   (title twice + body), so a title hit is worth 3 and a body-only hit is worth 1.
//! - The best category must reach the threshold (default 2), otherwise the generic
//!   `Category::Sports` is returned.
//! - Ties resolve to the category listed first (fixed priority order).
//!
//! Keyword sets are plain data: load them from `config/keywords.toml` or use the
//! built-in `default_seed()`. Several classifiers with distinct sets can coexist.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_KEYWORDS_PATH: &str = "config/keywords.toml";
pub const ENV_KEYWORDS_PATH: &str = "KEYWORDS_CONFIG_PATH";
pub const DEFAULT_THRESHOLD: u32 = 2;

/// Closed set of news categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Nba,
    Cba,
    Soccer,
    Esports,
    /// Generic fallback; never null.
    Sports,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Nba,
        Category::Cba,
        Category::Soccer,
        Category::Esports,
        Category::Sports,
    ];

    /// Stable machine name (also the serde representation).
    pub fn slug(self) -> &'static str {
        match self {
            Category::Nba => "nba",
            Category::Cba => "cba",
            Category::Soccer => "soccer",
            Category::Esports => "esports",
            Category::Sports => "sports",
        }
    }

    /// Display label used in prompts and reports.
    pub fn label(self) -> &'static str {
        match self {
            Category::Nba => "NBA",
            Category::Cba => "CBA",
            Category::Soccer => "足球",
            Category::Esports => "电竞",
            Category::Sports => "体育",
        }
    }

    /// Map a source category code (URL segment) to the category it implies.
    pub fn from_code(code: &str) -> Category {
        match code.trim().to_ascii_lowercase().as_str() {
            "nba" => Category::Nba,
            "cba" => Category::Cba,
            "soccer" | "football" => Category::Soccer,
            "lol" | "esports" | "kog" => Category::Esports,
            _ => Category::Sports,
        }
    }

    pub fn is_generic(self) -> bool {
        self == Category::Sports
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    /// Accepts either the slug or the display label.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.slug().eq_ignore_ascii_case(t) || c.label() == t)
            .ok_or_else(|| anyhow::anyhow!("unknown category `{t}`"))
    }
}

/* ----------------------------
Config schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
struct KeywordsRoot {
    #[serde(default = "default_threshold")]
    threshold: u32,
    #[serde(default)]
    categories: Vec<KeywordSet>,
}

fn default_threshold() -> u32 {
    DEFAULT_THRESHOLD
}

/// Keywords for one category. Order of sets is the tie-break priority.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KeywordSet {
    pub category: Category,
    pub keywords: Vec<String>,
}

impl KeywordSet {
    pub fn new<I, S>(category: Category, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            category,
            keywords: clean_keywords(keywords),
        }
    }
}

// lowercase, trim, drop empties (an empty needle would match everything)
fn clean_keywords<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for it in items {
        let k = it.as_ref().trim().to_lowercase();
        if !k.is_empty() && !out.contains(&k) {
            out.push(k);
        }
    }
    out
}

/// Immutable classifier; cheap to share behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Classifier {
    sets: Vec<KeywordSet>,
    threshold: u32,
}

impl Classifier {
    pub fn new(sets: Vec<KeywordSet>) -> Self {
        let sets = sets
            .into_iter()
            .filter(|s| !s.category.is_generic())
            .map(|s| KeywordSet::new(s.category, s.keywords))
            .collect();
        Self {
            sets,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn keyword_sets(&self) -> &[KeywordSet] {
        &self.sets
    }

    /// Parse a TOML document:
    /// ```toml
    /// threshold = 2
    /// [[categories]]
    /// category = "esports"
    /// keywords = ["lol", "kpl"]
    /// ```
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let root: KeywordsRoot = toml::from_str(s)?;
        if root.categories.is_empty() {
            anyhow::bail!("keywords config has no categories");
        }
        Ok(Self::new(root.categories).with_threshold(root.threshold))
    }

    /// Load from a TOML file. Falls back to `default_seed()` when missing or invalid.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(s) => Self::from_toml_str(&s).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "invalid keywords config; using built-in seed");
                Self::default_seed()
            }),
            Err(_) => Self::default_seed(),
        }
    }

    /// Load using `KEYWORDS_CONFIG_PATH` or `config/keywords.toml`.
    pub fn load_default() -> Self {
        let path = std::env::var(ENV_KEYWORDS_PATH)
            .unwrap_or_else(|_| DEFAULT_KEYWORDS_PATH.to_string());
        Self::load_from_file(path)
    }

    /// Per-category scores in priority order.
    pub fn scores(&self, title: &str, body: &str) -> Vec<(Category, u32)> {
        let title_l = title.to_lowercase();
        let text = format!("{title} {title} {body}").to_lowercase();

        self.sets
            .iter()
            .map(|set| {
                let score = set
                    .keywords
                    .iter()
                    .map(|kw| {
                        let mut s = 0;
                        if title_l.contains(kw.as_str()) {
                            s += 2;
                        }
                        if text.contains(kw.as_str()) {
                            s += 1;
                        }
                        s
                    })
                    .sum();
                (set.category, score)
            })
            .collect()
    }

    /// Highest-scoring category, or `Category::Sports` below the threshold.
    pub fn classify(&self, title: &str, body: &str) -> Category {
        let mut best: Option<(Category, u32)> = None;
        for (cat, score) in self.scores(title, body) {
            // strict `>` keeps the earlier (higher-priority) category on ties
            if best.map_or(true, |(_, b)| score > b) {
                best = Some((cat, score));
            }
        }
        match best {
            Some((cat, score)) if score >= self.threshold => cat,
            _ => Category::Sports,
        }
    }

    /// Built-in keyword lists. Priority: esports, soccer, nba, cba.
    pub fn default_seed() -> Self {
        Self::new(vec![
            KeywordSet::new(
                Category::Esports,
                [
                    "lol", "英雄联盟", "王者荣耀", "kpl", "lpl", "dota", "csgo", "pubg", "和平精英",
                    "穿越火线", "cf", "valorant", "无畏契约", "apex", "gala", "tes", "jdg", "rng",
                    "edg", "fpx", "ig", "we", "omg", "blg", "电竞", "职业联赛", "moba", "fps", "rts",
                    "moba游戏", "女枪", "bo3", "流言板", "一图流", "jrs", "神评", "wcba", "wcba今日",
                    "wcba常规赛",
                ],
            ),
            KeywordSet::new(
                Category::Soccer,
                [
                    "足球", "英超", "西甲", "意甲", "德甲", "法甲", "中超", "世界杯", "欧洲杯", "欧冠",
                    "亚冠", "国足", "男足", "女足", "梅西", "c罗", "内马尔", "姆巴佩", "哈兰德", "皇马",
                    "巴萨", "曼联", "利物浦", "切尔西", "曼城", "阿森纳", "拜仁", "多特", "尤文",
                    "ac米兰", "国际米兰", "巴黎", "大巴黎", "fifa", "u23", "u20", "u17", "亚洲杯",
                    "世预赛", "预选赛", "门将", "进球", "助攻", "点球", "任意球",
                ],
            ),
            KeywordSet::new(
                Category::Nba,
                [
                    "nba", "湖人", "勇士", "凯尔特人", "热火", "篮网", "76人", "雄鹿", "太阳", "独行侠",
                    "快船", "掘金", "灰熊", "爵士", "詹姆斯", "库里", "杜兰特", "字母哥", "东契奇",
                    "约基奇", "恩比德", "塔图姆", "布克", "莫兰特", "季后赛", "常规赛", "总决赛", "mvp",
                    "得分王", "篮板王", "助攻王", "三分", "扣篮", "nba常规赛", "nba季后赛", "nba总决赛",
                ],
            ),
            KeywordSet::new(
                Category::Cba,
                [
                    "cba", "cba联赛", "中国男篮", "中国女篮", "wcba", "易建联", "郭艾伦", "周琦", "王哲林",
                    "赵继伟", "广东宏远", "辽宁", "北京首钢", "新疆", "广厦", "上海", "浙江", "深圳", "山东",
                    "cba常规赛", "cba季后赛", "杨珂菁", "准绝杀", "女篮",
                ],
            ),
        ])
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::default_seed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> Classifier {
        Classifier::new(vec![
            KeywordSet::new(Category::Esports, ["lpl", "电竞"]),
            KeywordSet::new(Category::Soccer, ["英超", "梅西"]),
            KeywordSet::new(Category::Nba, ["nba", "湖人"]),
        ])
    }

    #[test]
    fn title_hit_wins_over_body_mention() {
        let c = tiny();
        // "湖人" in title (3) vs "梅西" only in body (1)
        assert_eq!(c.classify("湖人险胜", "赛后梅西发文祝贺"), Category::Nba);
    }

    #[test]
    fn body_only_single_keyword_is_below_threshold() {
        let c = tiny();
        assert_eq!(c.classify("今日快讯", "英超第五轮"), Category::Sports);
        // two distinct body keywords reach the threshold
        assert_eq!(c.classify("今日快讯", "英超第五轮，梅西缺阵"), Category::Soccer);
    }

    #[test]
    fn no_keywords_falls_back_to_generic() {
        let c = tiny();
        assert_eq!(c.classify("网球公开赛", "决赛今晚进行"), Category::Sports);
        assert_eq!(c.classify("", ""), Category::Sports);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let c = tiny();
        assert_eq!(c.classify("NBA Finals tonight", ""), Category::Nba);
        assert_eq!(c.classify("LPL 春季赛", ""), Category::Esports);
    }

    #[test]
    fn ties_resolve_to_priority_order() {
        let c = tiny();
        // esports and nba both score 3; esports is listed first
        assert_eq!(c.classify("电竞 湖人", ""), Category::Esports);

        let reversed = Classifier::new(vec![
            KeywordSet::new(Category::Nba, ["nba", "湖人"]),
            KeywordSet::new(Category::Esports, ["lpl", "电竞"]),
        ]);
        assert_eq!(reversed.classify("电竞 湖人", ""), Category::Nba);
    }

    #[test]
    fn empty_keywords_are_dropped() {
        let set = KeywordSet::new(Category::Nba, ["", "  ", "NBA", "nba"]);
        assert_eq!(set.keywords, vec!["nba".to_string()]);
    }

    #[test]
    fn toml_config_roundtrip_and_threshold() {
        let toml = r#"
threshold = 4
[[categories]]
category = "soccer"
keywords = ["英超"]
[[categories]]
category = "nba"
keywords = ["湖人", "詹姆斯"]
"#;
        let c = Classifier::from_toml_str(toml).expect("parse keywords toml");
        assert_eq!(c.threshold(), 4);
        assert_eq!(c.keyword_sets().len(), 2);
        // single title hit = 3 < 4
        assert_eq!(c.classify("英超开赛", ""), Category::Sports);
        // two title hits = 6
        assert_eq!(c.classify("湖人詹姆斯", ""), Category::Nba);
    }

    #[test]
    fn missing_file_uses_seed() {
        let c = Classifier::load_from_file("does/not/exist.toml");
        assert_eq!(c.keyword_sets().len(), 4);
        assert_eq!(c.classify("湖人主场大胜勇士", ""), Category::Nba);
        assert_eq!(c.classify("梅西梅开二度，巴萨3-1击败皇马", ""), Category::Soccer);
    }

    #[test]
    fn category_codes_and_labels() {
        assert_eq!(Category::from_code("NBA"), Category::Nba);
        assert_eq!(Category::from_code("football"), Category::Soccer);
        assert_eq!(Category::from_code("kog"), Category::Esports);
        assert_eq!(Category::from_code("news"), Category::Sports);
        assert_eq!("足球".parse::<Category>().unwrap(), Category::Soccer);
        assert_eq!("cba".parse::<Category>().unwrap(), Category::Cba);
        assert!("tennis".parse::<Category>().is_err());
    }
}
