//! # ixen-relay
//!
//! The relay between an upstream live-chat transport and one browser.
//!
//! Each browser request gets a [`RelaySession`] that owns exactly one
//! upstream connection and one outbound push channel. Four independent
//! signals can end a session (upstream disconnect, upstream error, client
//! cancel, setup failure) and they may arrive in any order or together.
//! Whichever arrives first moves the session to `Closed` and runs the
//! terminal cleanup; every later signal finds the session closed and does
//! nothing.
//!
//! ## Layout
//!
//! - [`state_machine`]: pure `transition(state, input) -> (state, actions)`
//! - [`session`]: the per-session task that feeds inputs and runs actions
//! - [`push`]: the outbound channel and the SSE frame codec
//! - [`upstream`]: transport trait, normalization and the transports

pub mod push;
pub mod session;
pub mod state_machine;
pub mod upstream;

pub use push::{encode_frame, Frame, FrameDecoder, Outbound};
pub use session::{spawn_session, RelaySession, SessionReport};
pub use state_machine::{transition, Action, CloseTrigger, Input, SessionState};
pub use upstream::{build_connector, EventSender, LiveConnection, LiveConnector};
