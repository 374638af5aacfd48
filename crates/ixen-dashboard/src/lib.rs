//! # ixen-dashboard
//!
//! Client-side view of one relay stream.
//!
//! [`DashboardState`] consumes relay frames and keeps what the dashboard
//! shows: the unfiltered live feed, one bounded column per [`Category`],
//! the gift list, connection status and notices. Classification is driven
//! by the caller: `apply` hands back a [`ClassificationRequest`] for each
//! comment and `record_classification` files the outcome.
//!
//! [`Category`]: ixen_core::Category

mod feed;
mod profile;
mod state;

pub use feed::{BoundedFeed, FeedItem};
pub use profile::{ProfileCache, PurchaseRecord, ViewerProfile, DEFAULT_AVATAR};
pub use state::{
    CategorizedComment, ClassificationRequest, ConnectionStatus, DashboardState, GiftEntry,
    LiveComment, Notice, NoticeLevel,
};
