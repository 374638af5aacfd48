//! Dashboard view state driven by relay frames

use crate::feed::{BoundedFeed, FeedItem};
use ixen_core::config::DashboardConfig;
use ixen_core::{Category, CommentPayload, GiftPayload, IxenError, RelayMessage};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

/// Connection status shown in the header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A dismissable notice (toast)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
}

impl Notice {
    fn info(title: &str, description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: title.to_string(),
            description: description.into(),
        }
    }

    fn error(title: &str, description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.to_string(),
            description: description.into(),
        }
    }
}

/// Unfiltered live feed entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveComment {
    pub id: String,
    pub speaker_id: String,
    pub text: String,
    pub avatar_url: Option<String>,
}

/// A comment filed under a category
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorizedComment {
    pub id: String,
    pub speaker_id: String,
    pub text: String,
    pub avatar_url: Option<String>,
    pub category: Category,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GiftEntry {
    pub id: String,
    pub speaker_id: String,
    pub gift_name: String,
    pub count: u32,
    pub avatar_url: Option<String>,
}

impl FeedItem for LiveComment {
    fn id(&self) -> &str {
        &self.id
    }
}

impl FeedItem for CategorizedComment {
    fn id(&self) -> &str {
        &self.id
    }
}

impl FeedItem for GiftEntry {
    fn id(&self) -> &str {
        &self.id
    }
}

/// A comment waiting on the classifier
///
/// Carries the stream generation so a result arriving after a reconnect is
/// discarded instead of leaking into the new stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRequest {
    pub id: String,
    pub speaker_id: String,
    pub text: String,
    pub avatar_url: Option<String>,
    generation: u64,
}

/// Everything the dashboard renders for one stream
#[derive(Debug, Clone)]
pub struct DashboardState {
    creator: Option<String>,
    status: ConnectionStatus,
    live: BoundedFeed<LiveComment>,
    categories: HashMap<Category, BoundedFeed<CategorizedComment>>,
    gifts: BoundedFeed<GiftEntry>,
    notices: Vec<Notice>,
    generation: u64,
    config: DashboardConfig,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new(DashboardConfig::default())
    }
}

impl DashboardState {
    pub fn new(config: DashboardConfig) -> Self {
        Self {
            creator: None,
            status: ConnectionStatus::Disconnected,
            live: BoundedFeed::new(config.live_capacity),
            categories: Category::ALL
                .iter()
                .map(|c| (*c, BoundedFeed::new(config.category_capacity)))
                .collect(),
            gifts: BoundedFeed::new(config.gift_capacity),
            notices: Vec::new(),
            generation: 0,
            config,
        }
    }

    /// Start watching `creator`, dropping everything from a previous stream
    ///
    /// A blank name is rejected with a notice and leaves the state alone.
    pub fn begin_connect(&mut self, creator: &str) -> Result<(), IxenError> {
        let creator = creator.trim().trim_start_matches('@').trim();
        if creator.is_empty() {
            self.notices.push(Notice::error(
                "Validation Error",
                "Please enter a username.",
            ));
            return Err(IxenError::Validation("Username is required".to_string()));
        }

        if matches!(
            self.status,
            ConnectionStatus::Connecting | ConnectionStatus::Connected
        ) {
            self.disconnect();
        }

        let notices = std::mem::take(&mut self.notices);
        let generation = self.generation + 1;
        *self = Self::new(self.config.clone());
        self.notices = notices;
        self.generation = generation;
        self.creator = Some(creator.to_string());
        self.status = ConnectionStatus::Connecting;
        Ok(())
    }

    /// The user stopped watching
    pub fn disconnect(&mut self) {
        self.status = ConnectionStatus::Disconnected;
        self.notices.push(Notice::info(
            "Disconnected",
            "Live stream monitoring has stopped.",
        ));
    }

    /// Apply one relay frame
    ///
    /// Comments land in the live feed immediately and come back as a
    /// classification request.
    pub fn apply(&mut self, message: RelayMessage) -> Option<ClassificationRequest> {
        match message {
            RelayMessage::Connected(_) => {
                self.status = ConnectionStatus::Connected;
                let creator = self.creator.as_deref().unwrap_or_default();
                self.notices.push(Notice::info(
                    "Connected!",
                    format!("Now monitoring comments for @{}.", creator),
                ));
                None
            }
            RelayMessage::Comment(comment) => self.add_comment(comment),
            RelayMessage::Gift(gift) => {
                self.add_gift(gift);
                None
            }
            RelayMessage::Disconnected(status) => {
                self.status = ConnectionStatus::Disconnected;
                self.notices.push(Notice::info("Disconnected", status.message));
                None
            }
            RelayMessage::Error(error) => {
                self.status = ConnectionStatus::Error;
                self.notices.push(Notice::error("Connection Failed", error.message));
                None
            }
        }
    }

    fn add_comment(&mut self, comment: CommentPayload) -> Option<ClassificationRequest> {
        if comment.comment.trim().is_empty() {
            return None;
        }

        let id = comment
            .msg_id
            .clone()
            .unwrap_or_else(|| format!("live-{}", Uuid::new_v4()));

        self.live.push(LiveComment {
            id: id.clone(),
            speaker_id: comment.unique_id.clone(),
            text: comment.comment.clone(),
            avatar_url: comment.profile_picture_url.clone(),
        });

        Some(ClassificationRequest {
            id,
            speaker_id: comment.unique_id,
            text: comment.comment,
            avatar_url: comment.profile_picture_url,
            generation: self.generation,
        })
    }

    fn add_gift(&mut self, gift: GiftPayload) {
        let id = gift
            .msg_id
            .unwrap_or_else(|| format!("gift-{}", Uuid::new_v4()));
        self.gifts.push(GiftEntry {
            id,
            speaker_id: gift.unique_id,
            gift_name: gift.gift_name,
            count: gift.repeat_count,
            avatar_url: gift.profile_picture_url,
        });
    }

    /// File a classification outcome
    ///
    /// A failure only raises a notice; the comment stays in the live feed
    /// and is left out of every category. Returns whether the comment was
    /// filed.
    pub fn record_classification(
        &mut self,
        request: ClassificationRequest,
        outcome: Result<Category, IxenError>,
    ) -> bool {
        if request.generation != self.generation {
            debug!("Dropping classification for {} from an old stream", request.id);
            return false;
        }

        match outcome {
            Ok(category) => self
                .categories
                .get_mut(&category)
                .map(|feed| {
                    feed.push_unique(CategorizedComment {
                        id: request.id,
                        speaker_id: request.speaker_id,
                        text: request.text,
                        avatar_url: request.avatar_url,
                        category,
                    })
                })
                .unwrap_or(false),
            Err(e) => {
                warn!("Failed to classify comment {}: {}", request.id, e);
                self.notices.push(Notice::error(
                    "AI Error",
                    "Failed to classify a comment. Check the logs for details.",
                ));
                false
            }
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn creator(&self) -> Option<&str> {
        self.creator.as_deref()
    }

    pub fn live(&self) -> &BoundedFeed<LiveComment> {
        &self.live
    }

    pub fn category(&self, category: Category) -> Option<&BoundedFeed<CategorizedComment>> {
        self.categories.get(&category)
    }

    pub fn gifts(&self) -> &BoundedFeed<GiftEntry> {
        &self.gifts
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Hand pending notices to the renderer
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Whether the stream this state belongs to has ended
    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            ConnectionStatus::Disconnected | ConnectionStatus::Error
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(id: Option<&str>, text: &str) -> RelayMessage {
        RelayMessage::Comment(CommentPayload {
            unique_id: "viewer".to_string(),
            comment: text.to_string(),
            profile_picture_url: None,
            msg_id: id.map(str::to_string),
        })
    }

    fn gift(id: Option<&str>) -> RelayMessage {
        RelayMessage::Gift(GiftPayload {
            unique_id: "viewer".to_string(),
            gift_name: "Rose".to_string(),
            repeat_count: 3,
            profile_picture_url: None,
            msg_id: id.map(str::to_string),
        })
    }

    fn connected_state() -> DashboardState {
        let mut state = DashboardState::default();
        state.begin_connect("@alice").unwrap();
        state.apply(RelayMessage::connected("Connected to @alice"));
        state
    }

    fn filed(state: &DashboardState) -> usize {
        Category::ALL
            .iter()
            .map(|c| state.category(*c).map_or(0, |f| f.len()))
            .sum()
    }

    #[test]
    fn test_connected_notice_names_creator() {
        let state = connected_state();
        assert_eq!(state.status(), ConnectionStatus::Connected);
        assert_eq!(state.creator(), Some("alice"));
        let last = state.notices().last().unwrap();
        assert_eq!(last.title, "Connected!");
        assert!(last.description.contains("@alice"));
    }

    #[test]
    fn test_blank_username_rejected() {
        let mut state = DashboardState::default();
        assert!(state.begin_connect(" @ ").is_err());
        assert_eq!(state.status(), ConnectionStatus::Disconnected);
        assert_eq!(state.notices()[0].title, "Validation Error");
    }

    #[test]
    fn test_comment_goes_live_then_classified() {
        let mut state = connected_state();
        let request = state.apply(comment(Some("m1"), "I want to buy this")).unwrap();
        assert_eq!(state.live().len(), 1);
        assert_eq!(filed(&state), 0);

        assert!(state.record_classification(request, Ok(Category::PurchaseIntent)));
        let column = state.category(Category::PurchaseIntent).unwrap();
        assert_eq!(column.newest().unwrap().id, "m1");
    }

    #[test]
    fn test_classification_failure_isolated() {
        let mut state = connected_state();
        let request = state.apply(comment(Some("m1"), "hello")).unwrap();

        let filed_now = state.record_classification(
            request,
            Err(IxenError::Classification("model down".to_string())),
        );
        assert!(!filed_now);
        assert_eq!(state.live().len(), 1);
        assert_eq!(filed(&state), 0);
        assert_eq!(state.status(), ConnectionStatus::Connected);
        assert_eq!(state.notices().last().unwrap().title, "AI Error");
    }

    #[test]
    fn test_category_dedupes_by_message_id() {
        let mut state = connected_state();
        let first = state.apply(comment(Some("m1"), "Is it blue?")).unwrap();
        let again = state.apply(comment(Some("m1"), "Is it blue?")).unwrap();

        assert!(state.record_classification(first, Ok(Category::Question)));
        assert!(!state.record_classification(again, Ok(Category::Question)));
        assert_eq!(state.category(Category::Question).unwrap().len(), 1);
        // The live feed is unfiltered
        assert_eq!(state.live().len(), 2);
    }

    #[test]
    fn test_buffers_bounded() {
        let mut state = connected_state();
        for i in 0..120 {
            let request = state.apply(comment(Some(&format!("m{}", i)), "hi")).unwrap();
            state.record_classification(request, Ok(Category::General));
            state.apply(gift(None));
        }
        assert_eq!(state.live().len(), 100);
        assert_eq!(state.category(Category::General).unwrap().len(), 50);
        assert_eq!(state.gifts().len(), 50);
        assert_eq!(state.live().newest().unwrap().id, "m119");
    }

    #[test]
    fn test_fallback_ids() {
        let mut state = connected_state();
        state.apply(comment(None, "hi"));
        state.apply(gift(None));
        assert!(state.live().newest().unwrap().id.starts_with("live-"));
        assert!(state.gifts().newest().unwrap().id.starts_with("gift-"));
    }

    #[test]
    fn test_reconnect_clears_view_and_drops_stale_results() {
        let mut state = connected_state();
        let stale = state.apply(comment(Some("m1"), "hello")).unwrap();
        state.apply(gift(Some("g1")));

        state.begin_connect("bob").unwrap();
        assert_eq!(state.status(), ConnectionStatus::Connecting);
        assert!(state.live().is_empty());
        assert!(state.gifts().is_empty());

        assert!(!state.record_classification(stale, Ok(Category::General)));
        assert_eq!(filed(&state), 0);
        assert!(state.notices().iter().any(|n| n.title == "Disconnected"));
    }

    #[test]
    fn test_error_frame_sets_error_status() {
        let mut state = DashboardState::default();
        state.begin_connect("ghost").unwrap();
        state.apply(RelayMessage::error(
            "Failed to connect. User is not live or the stream is not available.",
            Some("not_live".to_string()),
        ));
        assert_eq!(state.status(), ConnectionStatus::Error);
        assert!(state.is_finished());
        let notice = state.take_notices().pop().unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert!(notice.description.contains("not live"));
        assert!(state.notices().is_empty());
    }
}
