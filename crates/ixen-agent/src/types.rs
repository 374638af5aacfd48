//! Wire types for classification

use ixen_core::Category;
use serde::{Deserialize, Serialize};

/// Body of a classification request from the browser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyRequest {
    pub comment: String,
}

/// Result of a classification request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyResponse {
    pub category: Category,
}

/// Anthropic API message format
#[derive(Debug, Clone, Serialize)]
pub(crate) struct AnthropicMessage {
    pub role: &'static str,
    pub content: String,
}

/// Anthropic API request format
#[derive(Debug, Clone, Serialize)]
pub(crate) struct AnthropicRequest {
    pub model: String,
    pub max_tokens: usize,
    pub system: &'static str,
    pub messages: Vec<AnthropicMessage>,
}

/// Anthropic API response format
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AnthropicResponse {
    pub content: Vec<AnthropicContent>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// Content block in Anthropic response
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AnthropicContent {
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct Usage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_response_uses_labels() {
        let json = serde_json::to_string(&ClassifyResponse {
            category: Category::PurchaseIntent,
        })
        .unwrap();
        assert_eq!(json, r#"{"category":"Purchase Intent"}"#);
    }

    #[test]
    fn test_response_parses_text_blocks() {
        let raw = r#"{
            "id": "msg_1",
            "type": "message",
            "content": [{"type": "text", "text": "Question"}],
            "usage": {"input_tokens": 40, "output_tokens": 2}
        }"#;
        let response: AnthropicResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.content[0].text, "Question");
        assert_eq!(response.usage.unwrap().output_tokens, 2);
    }
}
