//! Process-wide shared browser
//!
//! Launching Chrome is expensive, so every relay session shares a single
//! process. The first session to need it launches it; sessions arriving while
//! that launch is in flight wait on the same launch instead of starting their
//! own. A failed launch leaves the slot empty so the next session retries.
//! The browser is only torn down when the pool is dropped at process exit.

use headless_chrome::{Browser, LaunchOptions};
use ixen_core::{config::UpstreamConfig, IxenError, Result};
use std::ffi::OsStr;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::info;

/// Chrome flags for running inside containers and small hosts
const LAUNCH_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-gpu",
    "--disable-dev-shm-usage",
    "--no-first-run",
    "--no-zygote",
];

/// Configuration for browser launch
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Run in headless mode (default: true)
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// User agent string
    pub user_agent: Option<String>,
    /// Navigation timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            user_agent: None,
            timeout_seconds: 30,
        }
    }
}

impl From<&UpstreamConfig> for BrowserConfig {
    fn from(upstream: &UpstreamConfig) -> Self {
        Self {
            headless: upstream.headless,
            user_agent: Some(upstream.user_agent.clone()),
            timeout_seconds: upstream.navigation_timeout_secs,
            ..Self::default()
        }
    }
}

/// A value created lazily by the first caller and shared afterwards
///
/// Concurrent first callers all await the same in-flight initialization.
pub struct LazyShared<T> {
    cell: OnceCell<Arc<T>>,
    launches: AtomicUsize,
}

impl<T> LazyShared<T> {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::const_new(),
            launches: AtomicUsize::new(0),
        }
    }

    /// Return the shared value, running `launch` only if nothing exists yet
    pub async fn get_or_launch<F, Fut>(&self, launch: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let shared = self
            .cell
            .get_or_try_init(|| async {
                self.launches.fetch_add(1, Ordering::SeqCst);
                launch().await.map(Arc::new)
            })
            .await?;
        Ok(Arc::clone(shared))
    }

    /// The shared value, if it was launched
    pub fn get(&self) -> Option<Arc<T>> {
        self.cell.get().cloned()
    }

    /// Number of launch attempts so far
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

impl<T> Default for LazyShared<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The browser shared by all sessions of this process
pub struct BrowserPool {
    config: BrowserConfig,
    shared: LazyShared<Browser>,
}

impl BrowserPool {
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            shared: LazyShared::new(),
        }
    }

    /// How long a tab may take to open and navigate
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_seconds)
    }

    /// Get the shared browser, launching it on first use
    pub async fn browser(&self) -> Result<Arc<Browser>> {
        self.shared
            .get_or_launch(|| async {
                let config = self.config.clone();
                tokio::task::spawn_blocking(move || launch(&config))
                    .await
                    .map_err(|e| IxenError::Browser(format!("Browser launch task failed: {}", e)))?
            })
            .await
    }

    pub fn is_launched(&self) -> bool {
        self.shared.get().is_some()
    }
}

fn launch(config: &BrowserConfig) -> Result<Browser> {
    info!(
        "Launching shared browser (headless: {}, size: {}x{})",
        config.headless, config.window_width, config.window_height
    );

    let mut args: Vec<&OsStr> = LAUNCH_ARGS.iter().map(OsStr::new).collect();
    let user_agent_arg: Option<String> = config
        .user_agent
        .as_ref()
        .map(|ua| format!("--user-agent={}", ua));
    if let Some(ref ua_arg) = user_agent_arg {
        args.push(OsStr::new(ua_arg));
    }

    // The default idle timeout would kill the shared process between sessions
    let options = LaunchOptions::default_builder()
        .headless(config.headless)
        .window_size(Some((config.window_width, config.window_height)))
        .idle_browser_timeout(Duration::from_secs(60 * 60 * 24 * 365))
        .args(args)
        .build()
        .map_err(|e| IxenError::Browser(format!("Failed to launch browser: {}", e)))?;

    let browser = Browser::new(options)
        .map_err(|e| IxenError::Browser(format!("Failed to launch browser: {}", e)))?;

    info!("Shared browser launched");
    Ok(browser)
}
