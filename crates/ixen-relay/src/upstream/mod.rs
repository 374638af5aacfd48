//! Upstream connector adapters
//!
//! A transport takes a creator, opens whatever it needs (a browser tab, a
//! synthetic feed) and reports everything through one event sender using the
//! normalized [`AdapterEvent`] vocabulary. The relay session only ever sees
//! these two traits.

pub mod browser;
pub mod demo;
pub mod normalize;

use async_trait::async_trait;
use ixen_browser::{BrowserConfig, BrowserPool};
use ixen_core::config::{IxenConfig, TransportKind};
use ixen_core::{AdapterEvent, CreatorId, Result};
use std::sync::Arc;
use tokio::sync::mpsc;

pub use browser::BrowserConnector;
pub use demo::DemoConnector;

/// Where a transport sends its normalized events
///
/// Bounded: a transport that outruns the browser waits on `send`.
pub type EventSender = mpsc::Sender<AdapterEvent>;

/// An open upstream connection
#[async_trait]
pub trait LiveConnection: Send {
    /// Room or session identifier, for logging
    fn room_id(&self) -> Option<String>;

    /// Tear the connection down; calling it again is a no-op
    async fn disconnect(&mut self) -> Result<()>;
}

/// Opens upstream connections for creators
#[async_trait]
pub trait LiveConnector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Open a connection to `creator`'s live room
    ///
    /// `events` is handed over before anything is opened so no event can be
    /// lost. Implementations send `Connected` once the room is confirmed and
    /// must fail with `NotLive` instead of opening a room that is off air.
    async fn connect(
        &self,
        creator: &CreatorId,
        events: EventSender,
    ) -> Result<Box<dyn LiveConnection>>;
}

/// Build the connector selected in the configuration
pub fn build_connector(config: &IxenConfig) -> Arc<dyn LiveConnector> {
    match config.upstream.transport {
        TransportKind::Browser => {
            let pool = Arc::new(BrowserPool::new(BrowserConfig::from(&config.upstream)));
            Arc::new(BrowserConnector::new(pool, config.upstream.clone()))
        }
        TransportKind::Demo => Arc::new(DemoConnector::new(config.demo.clone())),
    }
}
