//! # ixen-agent
//!
//! Classification client for live chat comments.
//!
//! Every comment is sorted into exactly one [`Category`]. Classification is a
//! network round trip and may fail; callers treat failures as local and
//! never let them reach the relay.

mod auth;
mod client;
mod heuristic;
mod types;

pub use auth::get_api_key;
pub use client::{parse_category, AnthropicClassifier};
pub use heuristic::HeuristicClassifier;
pub use types::{ClassifyRequest, ClassifyResponse};

use async_trait::async_trait;
use ixen_core::config::{ClassifierBackend, ClassifierConfig};
use ixen_core::{Category, Result};
use std::sync::Arc;

/// Sorts one comment into a category
#[async_trait]
pub trait Classifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn classify(&self, comment: &str) -> Result<Category>;
}

/// Build the classifier selected in the configuration
pub fn build_classifier(config: &ClassifierConfig) -> Arc<dyn Classifier> {
    match config.backend {
        ClassifierBackend::Anthropic => Arc::new(AnthropicClassifier::new(config.clone())),
        ClassifierBackend::Heuristic => Arc::new(HeuristicClassifier),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_classifier_follows_config() {
        let mut config = ClassifierConfig::default();
        assert_eq!(build_classifier(&config).name(), "anthropic");

        config.backend = ClassifierBackend::Heuristic;
        assert_eq!(build_classifier(&config).name(), "heuristic");
    }
}
