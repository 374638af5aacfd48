//! DOM-observation transport over the shared headless browser

use super::normalize::{
    events_from_batch, system_message, transport_error, CHAT_MISSING_MESSAGE, NOT_LIVE_MESSAGE,
    PAGE_CRASHED_MESSAGE,
};
use super::{EventSender, LiveConnection, LiveConnector};
use async_trait::async_trait;
use ixen_browser::{BrowserPool, LivePage};
use ixen_core::config::UpstreamConfig;
use ixen_core::{AdapterEvent, CreatorId, IxenError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Opens one observed tab per session on the shared browser
pub struct BrowserConnector {
    pool: Arc<BrowserPool>,
    upstream: UpstreamConfig,
}

impl BrowserConnector {
    pub fn new(pool: Arc<BrowserPool>, upstream: UpstreamConfig) -> Self {
        Self { pool, upstream }
    }
}

#[async_trait]
impl LiveConnector for BrowserConnector {
    fn name(&self) -> &'static str {
        "browser"
    }

    async fn connect(
        &self,
        creator: &CreatorId,
        events: EventSender,
    ) -> Result<Box<dyn LiveConnection>> {
        let browser = self.pool.browser().await?;
        let url = self.upstream.live_url(creator.as_str());
        let timeout = self.pool.navigation_timeout();

        info!("Opening @{}'s live page", creator);
        let page = Arc::new(LivePage::open(browser, &url, timeout).await?);

        match page.is_live().await {
            Ok(true) => {}
            Ok(false) => {
                close_quietly(&page).await;
                return Err(IxenError::NotLive(NOT_LIVE_MESSAGE.to_string()));
            }
            Err(e) => {
                close_quietly(&page).await;
                return Err(IxenError::Setup(format!("Live probe failed: {}", e)));
            }
        }

        let room_id = page.target_id();
        let _ = events
            .send(AdapterEvent::Connected {
                room_id: Some(room_id.clone()),
            })
            .await;

        match page.install_observer().await {
            Ok(true) => debug!("Chat observer installed for @{}", creator),
            Ok(false) => {
                warn!("No chat container on @{}'s live page", creator);
                let _ = events.send(system_message(CHAT_MISSING_MESSAGE)).await;
            }
            Err(e) => {
                close_quietly(&page).await;
                return Err(IxenError::Setup(format!("Failed to observe chat: {}", e)));
            }
        }

        let interval = Duration::from_millis(self.upstream.poll_interval_ms.max(50));
        let poller = tokio::spawn(poll_page(Arc::clone(&page), events, interval));

        Ok(Box::new(BrowserConnection {
            page,
            poller,
            room_id,
            disconnected: false,
        }))
    }
}

async fn close_quietly(page: &LivePage) {
    if let Err(e) = page.close().await {
        warn!("Error closing page {}: {}", page.url(), e);
    }
}

/// Drain the page until it ends, fails, or the session stops listening
async fn poll_page(page: Arc<LivePage>, events: EventSender, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let batch = match page.drain().await {
            Ok(batch) => batch,
            Err(e) => {
                warn!("Drain failed for {}: {}", page.url(), e);
                let _ = events.send(transport_error(PAGE_CRASHED_MESSAGE, &e)).await;
                return;
            }
        };

        for event in events_from_batch(batch) {
            let ended = matches!(event, AdapterEvent::Disconnected { .. });
            if events.send(event).await.is_err() || ended {
                return;
            }
        }
    }
}

/// An observed tab plus the task draining it
pub struct BrowserConnection {
    page: Arc<LivePage>,
    poller: JoinHandle<()>,
    room_id: String,
    disconnected: bool,
}

#[async_trait]
impl LiveConnection for BrowserConnection {
    fn room_id(&self) -> Option<String> {
        Some(self.room_id.clone())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if self.disconnected {
            return Ok(());
        }
        self.disconnected = true;

        self.poller.abort();
        self.page.close().await
    }
}

impl Drop for BrowserConnection {
    fn drop(&mut self) {
        self.poller.abort();
    }
}
