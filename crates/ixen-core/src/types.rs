//! Domain types shared by the relay, the server and the dashboard

use crate::{IxenError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform username of the creator being watched
///
/// Always stored without the leading `@`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CreatorId(String);

impl CreatorId {
    /// Parse a user-supplied username, stripping one leading `@`
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let name = trimmed.strip_prefix('@').unwrap_or(trimmed).trim();
        if name.is_empty() {
            return Err(IxenError::Validation("Username is required".to_string()));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CreatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A chat message from the live room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    pub speaker_id: String,
    pub text: String,
    pub avatar_url: Option<String>,
    pub message_id: Option<String>,
}

/// How the platform reports a gift
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GiftType {
    /// Sent once, reported once
    #[default]
    Standard,
    /// Sent repeatedly in a combo, reported as ticks ending in a final tick
    Streakable,
}

/// A gift sent in the live room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GiftEvent {
    pub speaker_id: String,
    pub gift_name: String,
    /// Cumulative count, always >= 1
    pub repeat_count: u32,
    pub avatar_url: Option<String>,
    pub gift_type: GiftType,
    pub is_streak_final: bool,
    pub message_id: Option<String>,
}

impl GiftEvent {
    /// Intermediate ticks of a streak are never relayed, only the final one
    pub fn is_relayable(&self) -> bool {
        !(self.gift_type == GiftType::Streakable && !self.is_streak_final)
    }
}

/// Normalized event vocabulary every upstream transport speaks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterEvent {
    /// Connection confirmed; the room id is only used for logging
    Connected { room_id: Option<String> },
    Message(ChatEvent),
    Gift(GiftEvent),
    /// Stream ended, voluntarily or not
    Disconnected { reason: String },
    /// Any transport failure
    Error {
        message: String,
        detail: Option<String>,
    },
}

impl AdapterEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            AdapterEvent::Connected { .. } => "connected",
            AdapterEvent::Message(_) => "message",
            AdapterEvent::Gift(_) => "gift",
            AdapterEvent::Disconnected { .. } => "disconnected",
            AdapterEvent::Error { .. } => "error",
        }
    }
}

/// Payload of `connected` and `disconnected` frames
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub message: String,
}

/// Payload of `comment` frames
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPayload {
    pub unique_id: String,
    pub comment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<String>,
}

/// Payload of `gift` frames
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftPayload {
    pub unique_id: String,
    pub gift_name: String,
    pub repeat_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<String>,
}

/// Payload of `error` frames
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<ChatEvent> for CommentPayload {
    fn from(event: ChatEvent) -> Self {
        Self {
            unique_id: event.speaker_id,
            comment: event.text,
            profile_picture_url: event.avatar_url,
            msg_id: event.message_id,
        }
    }
}

impl From<GiftEvent> for GiftPayload {
    fn from(event: GiftEvent) -> Self {
        Self {
            unique_id: event.speaker_id,
            gift_name: event.gift_name,
            repeat_count: event.repeat_count,
            profile_picture_url: event.avatar_url,
            msg_id: event.message_id,
        }
    }
}

/// One unit of the push-channel protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMessage {
    Connected(StatusPayload),
    Comment(CommentPayload),
    Gift(GiftPayload),
    Disconnected(StatusPayload),
    Error(ErrorPayload),
}

impl RelayMessage {
    pub fn connected(message: impl Into<String>) -> Self {
        RelayMessage::Connected(StatusPayload {
            message: message.into(),
        })
    }

    pub fn disconnected(message: impl Into<String>) -> Self {
        RelayMessage::Disconnected(StatusPayload {
            message: message.into(),
        })
    }

    pub fn error(message: impl Into<String>, error: Option<String>) -> Self {
        RelayMessage::Error(ErrorPayload {
            message: message.into(),
            error,
        })
    }

    /// Frame kind, the SSE `event:` field
    pub fn kind(&self) -> &'static str {
        match self {
            RelayMessage::Connected(_) => "connected",
            RelayMessage::Comment(_) => "comment",
            RelayMessage::Gift(_) => "gift",
            RelayMessage::Disconnected(_) => "disconnected",
            RelayMessage::Error(_) => "error",
        }
    }

    /// JSON payload, the SSE `data:` field
    pub fn data(&self) -> Result<String> {
        let json = match self {
            RelayMessage::Connected(p) | RelayMessage::Disconnected(p) => serde_json::to_string(p)?,
            RelayMessage::Comment(p) => serde_json::to_string(p)?,
            RelayMessage::Gift(p) => serde_json::to_string(p)?,
            RelayMessage::Error(p) => serde_json::to_string(p)?,
        };
        Ok(json)
    }

    /// Rebuild a message from a frame's kind and data
    pub fn from_parts(kind: &str, data: &str) -> Result<Self> {
        let message = match kind {
            "connected" => RelayMessage::Connected(serde_json::from_str(data)?),
            "comment" => RelayMessage::Comment(serde_json::from_str(data)?),
            "gift" => RelayMessage::Gift(serde_json::from_str(data)?),
            "disconnected" => RelayMessage::Disconnected(serde_json::from_str(data)?),
            "error" => RelayMessage::Error(serde_json::from_str(data)?),
            other => {
                return Err(IxenError::Other(format!("Unknown frame kind: {}", other)));
            }
        };
        Ok(message)
    }

    /// `disconnected` and `error` end the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, RelayMessage::Disconnected(_) | RelayMessage::Error(_))
    }
}

/// Business category of a chat comment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Purchase Intent")]
    PurchaseIntent,
    #[serde(rename = "Question")]
    Question,
    #[serde(rename = "General")]
    General,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::PurchaseIntent, Category::Question, Category::General];

    pub fn label(&self) -> &'static str {
        match self {
            Category::PurchaseIntent => "Purchase Intent",
            Category::Question => "Question",
            Category::General => "General",
        }
    }

    /// Match a label leniently (case, spacing and underscores ignored)
    pub fn from_label(label: &str) -> Option<Self> {
        let folded: String = label
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(|c| c.to_lowercase())
            .collect();
        match folded.as_str() {
            "purchaseintent" => Some(Category::PurchaseIntent),
            "question" => Some(Category::Question),
            "general" => Some(Category::General),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
