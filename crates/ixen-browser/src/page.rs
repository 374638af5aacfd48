//! One observed live page per relay session
//!
//! headless_chrome is a blocking API, so every call into the tab runs on the
//! blocking pool.

use crate::scripts;
use headless_chrome::{Browser, Tab};
use ixen_core::{IxenError, Result};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A chat row scraped from the page
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomComment {
    #[serde(default)]
    pub unique_id: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub profile_picture_url: Option<String>,
}

/// A gift row scraped from the page
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomGift {
    #[serde(default)]
    pub unique_id: Option<String>,
    #[serde(default)]
    pub gift_name: Option<String>,
    #[serde(default)]
    pub repeat_count: Option<u32>,
    #[serde(default)]
    pub profile_picture_url: Option<String>,
}

/// Everything the observer queued since the last drain
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DrainBatch {
    #[serde(default)]
    pub ended: bool,
    #[serde(default)]
    pub comments: Vec<DomComment>,
    #[serde(default)]
    pub gifts: Vec<DomGift>,
}

impl DrainBatch {
    /// Parse the JSON string produced by the drain script
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Run `discard` when `result` is an error, then hand the result back
fn discard_on_error<T>(result: Result<T>, discard: impl FnOnce()) -> Result<T> {
    if result.is_err() {
        discard();
    }
    result
}

/// A tab showing one creator's live page
pub struct LivePage {
    tab: Arc<Tab>,
    url: String,
    closed: AtomicBool,
}

impl LivePage {
    /// Open a new tab on the shared browser and navigate to `url`
    pub async fn open(browser: Arc<Browser>, url: &str, timeout: Duration) -> Result<Self> {
        debug!("Opening live page {}", url);

        let target = url.to_string();
        let tab = tokio::task::spawn_blocking(move || -> Result<Arc<Tab>> {
            let tab = browser
                .new_tab()
                .map_err(|e| IxenError::Browser(format!("Failed to create tab: {}", e)))?;
            tab.set_default_timeout(timeout);
            let navigated = tab
                .navigate_to(&target)
                .map(|_| ())
                .map_err(|e| IxenError::Setup(format!("Failed to navigate to {}: {}", target, e)))
                .and_then(|_| {
                    tab.wait_until_navigated().map(|_| ()).map_err(|e| {
                        IxenError::Setup(format!("Navigation timeout for {}: {}", target, e))
                    })
                });
            // The browser keeps every tab it created, so a failed one is closed here
            discard_on_error(navigated, || {
                if let Err(e) = tab.close(true) {
                    warn!("Failed to close tab for {}: {}", target, e);
                }
            })?;
            Ok(tab)
        })
        .await
        .map_err(|e| IxenError::Browser(format!("Navigation task failed: {}", e)))??;

        info!("Navigated to {}", url);
        Ok(Self {
            tab,
            url: url.to_string(),
            closed: AtomicBool::new(false),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// DevTools target id of the tab, used as the room id in logs
    pub fn target_id(&self) -> String {
        self.tab.get_target_id().to_string()
    }

    /// Whether the page shows a stream that is on air
    pub async fn is_live(&self) -> Result<bool> {
        let value = self.evaluate(scripts::live_probe()).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    /// Start observing the chat room; `false` when no chat container exists
    pub async fn install_observer(&self) -> Result<bool> {
        let value = self.evaluate(scripts::install_observer()).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    /// Take everything queued since the last drain
    pub async fn drain(&self) -> Result<DrainBatch> {
        let value = self.evaluate(scripts::drain()).await?;
        match value.as_str() {
            Some(raw) => DrainBatch::parse(raw),
            None => Err(IxenError::Transport(format!(
                "Unexpected drain result: {}",
                value
            ))),
        }
    }

    /// Close the tab; closing twice is a no-op
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        debug!("Closing live page {}", self.url);
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || tab.close(true))
            .await
            .map_err(|e| IxenError::Browser(format!("Close task failed: {}", e)))?
            .map_err(|e| IxenError::Browser(format!("Failed to close tab: {}", e)))?;
        Ok(())
    }

    async fn evaluate(&self, script: String) -> Result<serde_json::Value> {
        let tab = Arc::clone(&self.tab);
        let result = tokio::task::spawn_blocking(move || tab.evaluate(&script, false))
            .await
            .map_err(|e| IxenError::Browser(format!("Evaluation task failed: {}", e)))?
            .map_err(|e| IxenError::Transport(format!("JavaScript evaluation failed: {}", e)))?;

        Ok(result.value.unwrap_or(serde_json::Value::Null))
    }
}
