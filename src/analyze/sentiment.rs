use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
struct Lexicon {
    positive: Vec<String>,
    negative: Vec<String>,
}

static LEXICON: Lazy<Lexicon> = Lazy::new(|| {
    let raw = include_str!("../../config/sentiment_lexicon.json");
    serde_json::from_str::<Lexicon>(raw).expect("valid sentiment lexicon")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentiment {
    pub label: SentimentLabel,
    pub positive_score: u32,
    pub negative_score: u32,
}

/// Word-presence sentiment over a report text.
#[derive(Debug, Clone)]
pub struct SentimentScorer {
    positive: Vec<String>,
    negative: Vec<String>,
}

impl Default for SentimentScorer {
    fn default() -> Self {
        Self::new(LEXICON.positive.clone(), LEXICON.negative.clone())
    }
}

impl SentimentScorer {
    pub fn new(positive: Vec<String>, negative: Vec<String>) -> Self {
        let clean = |v: Vec<String>| v.into_iter().filter(|w| !w.is_empty()).collect();
        Self {
            positive: clean(positive),
            negative: clean(negative),
        }
    }

    /// Each listed word counts once if it appears anywhere in `text`.
    /// Majority wins; ties are neutral.
    pub fn score(&self, text: &str) -> Sentiment {
        let count = |words: &[String]| words.iter().filter(|w| text.contains(w.as_str())).count() as u32;
        let positive_score = count(&self.positive);
        let negative_score = count(&self.negative);

        let label = match positive_score.cmp(&negative_score) {
            std::cmp::Ordering::Greater => SentimentLabel::Positive,
            std::cmp::Ordering::Less => SentimentLabel::Negative,
            std::cmp::Ordering::Equal => SentimentLabel::Neutral,
        };
        Sentiment {
            label,
            positive_score,
            negative_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presence_not_frequency() {
        let s = SentimentScorer::default();
        let r = s.score("胜利胜利胜利，出色");
        assert_eq!(r.positive_score, 2);
        assert_eq!(r.negative_score, 0);
        assert_eq!(r.label, SentimentLabel::Positive);
    }

    #[test]
    fn majority_and_ties() {
        let s = SentimentScorer::default();
        assert_eq!(s.score("伤病与争议").label, SentimentLabel::Negative);
        assert_eq!(s.score("胜利但有遗憾").label, SentimentLabel::Neutral);
        assert_eq!(s.score("平淡的一天").label, SentimentLabel::Neutral);
    }

    #[test]
    fn custom_word_lists() {
        let s = SentimentScorer::new(vec!["good".into(), "".into()], vec!["bad".into()]);
        let r = s.score("good good bad");
        assert_eq!((r.positive_score, r.negative_score), (1, 1));
        assert_eq!(r.label, SentimentLabel::Neutral);
    }
}
