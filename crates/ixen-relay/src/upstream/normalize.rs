//! Translation of raw transport records into [`AdapterEvent`]s

use ixen_browser::{DomComment, DomGift, DrainBatch};
use ixen_core::{AdapterEvent, ChatEvent, GiftEvent, GiftType, IxenError};

pub const UNKNOWN_SPEAKER: &str = "Unknown User";
pub const SYSTEM_SPEAKER: &str = "System";
pub const NOT_LIVE_MESSAGE: &str = "User is not live or the stream is not available.";
pub const STREAM_ENDED_MESSAGE: &str = "The live stream has ended.";
pub const PAGE_CRASHED_MESSAGE: &str = "The browser page crashed. Please try again.";
pub const CHAT_MISSING_MESSAGE: &str =
    "Could not find chat container. The page structure might have changed.";

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A scraped chat row; rows without text are dropped
pub fn chat_from_dom(raw: DomComment) -> Option<ChatEvent> {
    let text = non_blank(raw.comment)?;
    Some(ChatEvent {
        speaker_id: non_blank(raw.unique_id).unwrap_or_else(|| UNKNOWN_SPEAKER.to_string()),
        text,
        avatar_url: non_blank(raw.profile_picture_url),
        message_id: None,
    })
}

/// A scraped gift row
///
/// The page only renders a combo once it is settled, so DOM gifts are
/// always final.
pub fn gift_from_dom(raw: DomGift) -> Option<GiftEvent> {
    let gift_name = non_blank(raw.gift_name)?;
    Some(GiftEvent {
        speaker_id: non_blank(raw.unique_id).unwrap_or_else(|| UNKNOWN_SPEAKER.to_string()),
        gift_name,
        repeat_count: raw.repeat_count.unwrap_or(1).max(1),
        avatar_url: non_blank(raw.profile_picture_url),
        gift_type: GiftType::Standard,
        is_streak_final: true,
        message_id: None,
    })
}

/// Gift event after streak suppression; intermediate ticks yield nothing
pub fn relay_gift(gift: GiftEvent) -> Option<AdapterEvent> {
    gift.is_relayable().then_some(AdapterEvent::Gift(gift))
}

/// Everything in one drained batch, in page order per kind
pub fn events_from_batch(batch: DrainBatch) -> Vec<AdapterEvent> {
    let mut events: Vec<AdapterEvent> = batch
        .comments
        .into_iter()
        .filter_map(chat_from_dom)
        .map(AdapterEvent::Message)
        .collect();

    events.extend(
        batch
            .gifts
            .into_iter()
            .filter_map(gift_from_dom)
            .filter_map(relay_gift),
    );

    if batch.ended {
        events.push(AdapterEvent::Disconnected {
            reason: STREAM_ENDED_MESSAGE.to_string(),
        });
    }
    events
}

/// A chat line authored by the relay itself
pub fn system_message(text: &str) -> AdapterEvent {
    AdapterEvent::Message(ChatEvent {
        speaker_id: SYSTEM_SPEAKER.to_string(),
        text: text.to_string(),
        avatar_url: None,
        message_id: None,
    })
}

/// Route a transport failure through the error event
pub fn transport_error(message: &str, err: &IxenError) -> AdapterEvent {
    AdapterEvent::Error {
        message: message.to_string(),
        detail: Some(err.to_string()),
    }
}
