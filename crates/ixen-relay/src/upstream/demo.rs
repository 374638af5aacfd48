//! Synthetic live room for local development
//!
//! Cycles through a fixed cast of viewers and comments covering all three
//! categories, and every fifth event plays out a gift streak (ticks, then a
//! final tick) so streak suppression is visible end to end.

use super::normalize::{relay_gift, NOT_LIVE_MESSAGE};
use super::{EventSender, LiveConnection, LiveConnector};
use async_trait::async_trait;
use futures::{pin_mut, Stream, StreamExt};
use ixen_core::config::DemoConfig;
use ixen_core::{AdapterEvent, ChatEvent, CreatorId, GiftEvent, GiftType, IxenError, Result};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

const VIEWERS: &[&str] = &["maya_shops", "tom.k", "luxe_lena", "dj_ray", "nina88", "benji"];

const COMMENTS: &[&str] = &[
    "I want to buy the blue one!",
    "What size is the model wearing?",
    "Love this stream!",
    "Where can I order this?",
    "Does it ship to Canada?",
    "Hello from Brazil",
    "Add two to my cart please",
    "Is this waterproof?",
    "haha this is great",
];

const GIFTS: &[&str] = &["Rose", "Galaxy", "Heart Me", "Doughnut"];

pub struct DemoConnector {
    config: DemoConfig,
}

impl DemoConnector {
    pub fn new(config: DemoConfig) -> Self {
        Self { config }
    }

    fn is_offline(&self, creator: &CreatorId) -> bool {
        self.config
            .offline_creators
            .iter()
            .any(|c| c.trim_start_matches('@').eq_ignore_ascii_case(creator.as_str()))
    }
}

#[async_trait]
impl LiveConnector for DemoConnector {
    fn name(&self) -> &'static str {
        "demo"
    }

    async fn connect(
        &self,
        creator: &CreatorId,
        events: EventSender,
    ) -> Result<Box<dyn LiveConnection>> {
        if self.is_offline(creator) {
            return Err(IxenError::NotLive(NOT_LIVE_MESSAGE.to_string()));
        }

        let room_id = format!("demo-{}", creator);
        info!("Starting demo feed {}", room_id);
        let _ = events
            .send(AdapterEvent::Connected {
                room_id: Some(room_id.clone()),
            })
            .await;

        let interval = Duration::from_millis(self.config.interval_ms.max(1));
        let feed = tokio::spawn(forward(
            demo_feed(interval, self.config.max_events),
            events,
        ));

        Ok(Box::new(DemoConnection {
            room_id,
            feed,
            disconnected: false,
        }))
    }
}

async fn forward(feed: impl Stream<Item = AdapterEvent>, events: EventSender) {
    pin_mut!(feed);
    while let Some(event) = feed.next().await {
        if events.send(event).await.is_err() {
            debug!("Demo feed stopped: session gone");
            return;
        }
    }
}

fn chat(seq: usize) -> ChatEvent {
    ChatEvent {
        speaker_id: VIEWERS[seq % VIEWERS.len()].to_string(),
        text: COMMENTS[seq % COMMENTS.len()].to_string(),
        avatar_url: None,
        message_id: Some(format!("demo-{}", seq)),
    }
}

fn streak(seq: usize) -> Vec<GiftEvent> {
    let ticks = (seq % 3 + 2) as u32;
    (1..=ticks)
        .map(|count| GiftEvent {
            speaker_id: VIEWERS[(seq / 5) % VIEWERS.len()].to_string(),
            gift_name: GIFTS[(seq / 5) % GIFTS.len()].to_string(),
            repeat_count: count,
            avatar_url: None,
            gift_type: GiftType::Streakable,
            is_streak_final: count == ticks,
            message_id: Some(format!("demo-{}-{}", seq, count)),
        })
        .collect()
}

/// The scripted feed; ends with `Disconnected` after `max_events` if set
pub fn demo_feed(
    interval: Duration,
    max_events: Option<usize>,
) -> impl Stream<Item = AdapterEvent> {
    async_stream::stream! {
        let mut seq = 0usize;
        loop {
            if max_events.is_some_and(|max| seq >= max) {
                yield AdapterEvent::Disconnected {
                    reason: "The demo stream has ended.".to_string(),
                };
                break;
            }

            tokio::time::sleep(interval).await;
            if seq % 5 == 4 {
                for tick in streak(seq) {
                    if let Some(event) = relay_gift(tick) {
                        yield event;
                    }
                }
            } else {
                yield AdapterEvent::Message(chat(seq));
            }
            seq += 1;
        }
    }
}

pub struct DemoConnection {
    room_id: String,
    feed: JoinHandle<()>,
    disconnected: bool,
}

#[async_trait]
impl LiveConnection for DemoConnection {
    fn room_id(&self) -> Option<String> {
        Some(self.room_id.clone())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if !self.disconnected {
            self.disconnected = true;
            self.feed.abort();
            debug!("Demo feed {} stopped", self.room_id);
        }
        Ok(())
    }
}

impl Drop for DemoConnection {
    fn drop(&mut self) {
        self.feed.abort();
    }
}
