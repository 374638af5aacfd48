//! Offline keyword classifier for demos and tests

use crate::Classifier;
use async_trait::async_trait;
use ixen_core::{Category, IxenError, Result};

const PURCHASE_WORDS: &[&str] = &[
    "buy", "order", "cart", "price", "how much", "purchase", "checkout", "link", "want one",
    "sold", "ship",
];

const QUESTION_STARTS: &[&str] = &[
    "what", "where", "when", "who", "why", "how", "is ", "are ", "does", "do ", "can", "will",
];

/// Keyword rules; no network
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicClassifier;

impl HeuristicClassifier {
    pub fn categorize(comment: &str) -> Category {
        let lowered = comment.trim().to_lowercase();

        if PURCHASE_WORDS.iter().any(|w| lowered.contains(w)) {
            Category::PurchaseIntent
        } else if lowered.ends_with('?') || QUESTION_STARTS.iter().any(|q| lowered.starts_with(q))
        {
            Category::Question
        } else {
            Category::General
        }
    }
}

#[async_trait]
impl Classifier for HeuristicClassifier {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    async fn classify(&self, comment: &str) -> Result<Category> {
        if comment.trim().is_empty() {
            return Err(IxenError::Validation("Comment is required".to_string()));
        }
        Ok(Self::categorize(comment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purchase_beats_question() {
        assert_eq!(
            HeuristicClassifier::categorize("Where can I order this?"),
            Category::PurchaseIntent
        );
        assert_eq!(
            HeuristicClassifier::categorize("I want to BUY the blue one!"),
            Category::PurchaseIntent
        );
    }

    #[test]
    fn test_questions() {
        assert_eq!(HeuristicClassifier::categorize("Is this waterproof?"), Category::Question);
        assert_eq!(
            HeuristicClassifier::categorize("what size is the model wearing"),
            Category::Question
        );
    }

    #[test]
    fn test_general() {
        assert_eq!(HeuristicClassifier::categorize("Love this stream!"), Category::General);
        assert_eq!(HeuristicClassifier::categorize("Hello from Brazil"), Category::General);
    }

    #[tokio::test]
    async fn test_blank_comment_is_error() {
        assert!(HeuristicClassifier.classify("  ").await.is_err());
    }
}
