//! Headless browser plumbing for the DOM-observation transport
//!
//! One Chrome process is shared by every relay session in the server. Each
//! session opens its own tab on the creator's live page, checks that the
//! stream is actually on air, installs a `MutationObserver` over the chat
//! room and periodically drains what the observer queued.
//!
//! # Architecture
//!
//! - [`pool`]: process-wide browser, launched at most once
//! - [`page`]: one observed live page per session
//! - [`scripts`]: the JavaScript evaluated inside the page
//!
//! # Requirements
//!
//! - Chrome or Chromium browser installed

pub mod page;
pub mod pool;
pub mod scripts;

pub use page::{DomComment, DomGift, DrainBatch, LivePage};
pub use pool::{BrowserConfig, BrowserPool, LazyShared};
