use crate::models::Sentiment;

/// Interface to the sentiment capability. The classifier itself is an
/// external collaborator; implementations here only need to be synchronous
/// and side-effect free.
pub trait SentimentClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Sentiment;
}

/// Word-list scorer used when no external classifier is wired up.
pub struct LexiconClassifier;

const POSITIVE_WORDS: &[&str] = &[
    "beat", "beats", "record", "growth", "gain", "gains", "surge", "surged",
    "rally", "upgrade", "upgraded", "strong", "profit", "profits", "exceed",
    "exceeds", "exceeded", "expand", "expands", "outperform", "bullish",
];

const NEGATIVE_WORDS: &[&str] = &[
    "miss", "misses", "missed", "loss", "losses", "drop", "drops", "fell",
    "fall", "falls", "plunge", "plunged", "downgrade", "downgraded", "weak",
    "lawsuit", "recall", "layoff", "layoffs", "bearish", "warning", "cuts",
];

impl SentimentClassifier for LexiconClassifier {
    fn classify(&self, text: &str) -> Sentiment {
        let mut score = 0i32;
        for word in text.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
            if POSITIVE_WORDS.contains(&word) {
                score += 1;
            } else if NEGATIVE_WORDS.contains(&word) {
                score -= 1;
            }
        }

        if score > 0 {
            Sentiment::Positive
        } else if score < 0 {
            Sentiment::Negative
        } else {
            Sentiment::Neutral
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_headline() {
        let c = LexiconClassifier;
        assert_eq!(
            c.classify("Apple reports record quarterly revenue, beats expectations"),
            Sentiment::Positive
        );
    }

    #[test]
    fn negative_headline() {
        let c = LexiconClassifier;
        assert_eq!(
            c.classify("Tesla misses delivery targets as shares drop"),
            Sentiment::Negative
        );
    }

    #[test]
    fn mixed_or_plain_text_is_neutral() {
        let c = LexiconClassifier;
        assert_eq!(c.classify("Quarterly filing published"), Sentiment::Neutral);
        assert_eq!(
            c.classify("Strong quarter but lawsuit looms"),
            Sentiment::Neutral
        );
    }
}
