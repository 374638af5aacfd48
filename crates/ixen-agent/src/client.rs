//! Anthropic Messages API classifier
//!
//! One stateless request per comment. Rate limits and server errors are
//! retried with exponential backoff; anything else fails the comment.

use crate::auth;
use crate::types::{AnthropicMessage, AnthropicRequest, AnthropicResponse};
use crate::Classifier;
use async_trait::async_trait;
use ixen_core::config::ClassifierConfig;
use ixen_core::{Category, IxenError, Result};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";

const INITIAL_BACKOFF_MS: u64 = 500;
const MAX_BACKOFF_MS: u64 = 8_000;

const SYSTEM_PROMPT: &str = "You are an AI assistant that classifies live stream comments into \
exactly one of the following categories: \"Purchase Intent\", \"Question\", or \"General\". \
Reply with the category name only.";

fn user_prompt(comment: &str) -> String {
    format!("Comment: {}\n\nCategory:", comment)
}

/// Pick the category named in a model reply
///
/// An exact label wins; otherwise the label mentioned first in the text.
pub fn parse_category(reply: &str) -> Result<Category> {
    let trimmed = reply.trim().trim_matches(|c: char| c == '"' || c == '.' || c == '\'');
    if let Some(category) = Category::from_label(trimmed) {
        return Ok(category);
    }

    let lowered = reply.to_lowercase();
    Category::ALL
        .iter()
        .filter_map(|c| lowered.find(&c.label().to_lowercase()).map(|pos| (pos, *c)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, category)| category)
        .ok_or_else(|| {
            IxenError::Classification(format!("Reply named no category: {:?}", reply.trim()))
        })
}

/// Delay before retrying a rate-limited request, capped at the max backoff
///
/// `retry-after` is whole seconds from the server and may be arbitrarily large.
fn retry_wait_ms(headers: &reqwest::header::HeaderMap, backoff_ms: u64) -> u64 {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(|secs| secs.saturating_mul(1000))
        .unwrap_or(backoff_ms)
        .min(MAX_BACKOFF_MS)
}

/// Classifier backed by the Anthropic Messages API
#[derive(Debug, Clone)]
pub struct AnthropicClassifier {
    config: ClassifierConfig,
    http: reqwest::Client,
}

impl AnthropicClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn request(&self, comment: &str) -> AnthropicRequest {
        AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            system: SYSTEM_PROMPT,
            messages: vec![AnthropicMessage {
                role: "user",
                content: user_prompt(comment),
            }],
        }
    }

    async fn complete(&self, api_key: &str, request: &AnthropicRequest) -> Result<String> {
        let max_retries = self.config.max_retries;
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            tracing::debug!("Sending classification request (attempt {})", retries + 1);

            let response = self
                .http
                .post(&self.config.api_url)
                .header("x-api-key", api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(request)
                .send()
                .await
                .map_err(|e| IxenError::Api(format!("Failed to send request: {}", e)))?;

            let status = response.status();

            if status.as_u16() == 429 {
                retries += 1;
                if retries > max_retries {
                    return Err(IxenError::ApiLimit(format!(
                        "Rate limit exceeded after {} retries",
                        max_retries
                    )));
                }

                let wait_ms = retry_wait_ms(response.headers(), backoff_ms);

                tracing::warn!(
                    "Rate limited (429). Waiting {}ms before retry {}/{}",
                    wait_ms,
                    retries,
                    max_retries
                );
                tokio::time::sleep(Duration::from_millis(wait_ms)).await;
                backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
                continue;
            }

            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown".to_string());

                if status.is_server_error() && retries < max_retries {
                    retries += 1;
                    tracing::warn!(
                        "Server error ({}). Waiting {}ms before retry {}/{}",
                        status,
                        backoff_ms,
                        retries,
                        max_retries
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
                    continue;
                }

                return Err(IxenError::Api(format!(
                    "Anthropic API error {}: {}",
                    status, error_text
                )));
            }

            let parsed: AnthropicResponse = response
                .json()
                .await
                .map_err(|e| IxenError::Api(format!("Failed to parse response: {}", e)))?;

            if let Some(usage) = &parsed.usage {
                tracing::debug!(
                    "Classification used {} input / {} output tokens",
                    usage.input_tokens,
                    usage.output_tokens
                );
            }

            return parsed
                .content
                .into_iter()
                .find(|block| block.content_type == "text")
                .map(|block| block.text)
                .ok_or_else(|| IxenError::Classification("No text in response".to_string()));
        }
    }
}

#[async_trait]
impl Classifier for AnthropicClassifier {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn classify(&self, comment: &str) -> Result<Category> {
        let comment = comment.trim();
        if comment.is_empty() {
            return Err(IxenError::Validation("Comment is required".to_string()));
        }

        let api_key = auth::get_api_key(&self.config.api_key_env)?;
        let reply = self.complete(&api_key, &self.request(comment)).await?;
        let category = parse_category(&reply)?;

        tracing::debug!("Classified {:?} as {}", comment, category);
        Ok(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exact_labels() {
        assert_eq!(parse_category("Purchase Intent").unwrap(), Category::PurchaseIntent);
        assert_eq!(parse_category(" \"Question\"\n").unwrap(), Category::Question);
        assert_eq!(parse_category("general.").unwrap(), Category::General);
    }

    #[test]
    fn test_parse_label_inside_sentence() {
        let reply = "This comment shows Purchase Intent, not a general remark.";
        assert_eq!(parse_category(reply).unwrap(), Category::PurchaseIntent);
    }

    #[test]
    fn test_parse_unknown_reply_fails() {
        let err = parse_category("Spam").unwrap_err();
        assert!(matches!(err, IxenError::Classification(_)));
    }

    #[test]
    fn test_request_carries_comment_and_limits() {
        let classifier = AnthropicClassifier::new(ClassifierConfig::default());
        let request = classifier.request("Is this waterproof?");
        assert_eq!(request.max_tokens, ClassifierConfig::default().max_tokens);
        assert_eq!(request.messages.len(), 1);
        assert!(request.messages[0].content.contains("Is this waterproof?"));

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json["system"].as_str().unwrap().contains("Purchase Intent"));
    }

    fn retry_after(value: &str) -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::RETRY_AFTER, value.parse().unwrap());
        headers
    }

    #[test]
    fn test_retry_after_seconds_honored() {
        assert_eq!(retry_wait_ms(&retry_after("2"), 500), 2_000);
        assert_eq!(retry_wait_ms(&reqwest::header::HeaderMap::new(), 500), 500);
        assert_eq!(retry_wait_ms(&retry_after("soon"), 1_000), 1_000);
    }

    #[test]
    fn test_huge_retry_after_is_capped() {
        assert_eq!(retry_wait_ms(&retry_after("18446744073709552"), 500), MAX_BACKOFF_MS);
        assert_eq!(retry_wait_ms(&retry_after(&u64::MAX.to_string()), 500), MAX_BACKOFF_MS);
    }

    #[tokio::test]
    async fn test_blank_comment_rejected_before_network() {
        let classifier = AnthropicClassifier::new(ClassifierConfig::default());
        let err = classifier.classify("   ").await.unwrap_err();
        assert!(matches!(err, IxenError::Validation(_)));
    }
}
