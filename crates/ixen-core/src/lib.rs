//! # ixen-core
//!
//! Core types for the Ixen live-chat relay.
//!
//! Ixen watches a creator's live stream, relays chat and gift events to a
//! browser over server-sent events, and sorts the chat into business
//! categories (purchase intent, questions, general chatter).
//!
//! ## Core vocabulary
//!
//! - An upstream transport emits [`AdapterEvent`]s
//! - A relay session turns them into [`RelayMessage`]s on the push channel
//! - The dashboard files each comment under a [`Category`]

pub mod config;
mod error;
mod types;

pub use config::IxenConfig;
pub use error::{IxenError, Result};
pub use types::*;
