//! Pure state machine for relay session control flow
//!
//! No I/O and no async: `transition(state, input) -> (state, actions)`.
//! The session runner applies the returned state before executing any
//! action, so `Closed` doubles as the "already closing" latch: the first
//! terminal input to arrive produces the cleanup actions and every input
//! after it produces none.
//!
//! Terminal action order is fixed: the final frame (if any) is pushed, then
//! the upstream is disconnected, then the channel is closed.

use ixen_core::{ChatEvent, CreatorId, GiftEvent, RelayMessage};

/// Relay session state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Created, nothing opened yet
    Idle,
    /// Upstream open in progress
    Connecting { creator: CreatorId },
    /// Upstream confirmed, events flowing
    Live {
        creator: CreatorId,
        room_id: Option<String>,
    },
    /// Terminal; cleanup has run
    Closed { trigger: CloseTrigger },
}

impl SessionState {
    pub fn is_closed(&self) -> bool {
        matches!(self, SessionState::Closed { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Connecting { .. } => "connecting",
            SessionState::Live { .. } => "live",
            SessionState::Closed { .. } => "closed",
        }
    }
}

/// Which signal closed the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseTrigger {
    UpstreamDisconnected,
    UpstreamError,
    ClientCancelled,
    SetupFailed,
}

/// Inputs fed to the state machine, one per callback turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Begin opening the upstream for this creator
    Open { creator: CreatorId },
    /// Upstream confirmed the connection
    Connected { room_id: Option<String> },
    Chat(ChatEvent),
    Gift(GiftEvent),
    /// Upstream ended the stream
    Disconnected { reason: String },
    /// Upstream failed after setup
    Error {
        message: String,
        detail: Option<String>,
    },
    /// Browser went away
    ClientCancel,
    /// Opening the upstream failed or timed out
    SetupFailed {
        message: String,
        detail: Option<String>,
    },
}

/// Side effects requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Enqueue a frame on the outbound channel
    Push(RelayMessage),
    /// Tear down the upstream connection, or the pending open
    DisconnectUpstream,
    /// Close the outbound channel
    CloseChannel,
    /// Log a lifecycle message
    Log { message: String },
}

fn log(message: String) -> Action {
    Action::Log { message }
}

fn terminal(final_frame: Option<RelayMessage>, message: String) -> Vec<Action> {
    let mut actions = vec![log(message)];
    actions.extend(final_frame.map(Action::Push));
    actions.push(Action::DisconnectUpstream);
    actions.push(Action::CloseChannel);
    actions
}

/// Pure state transition function
///
/// Never panics. Inputs that make no sense in the current state leave it
/// unchanged and produce no side effects beyond a log line.
pub fn transition(state: SessionState, input: Input) -> (SessionState, Vec<Action>) {
    match (state, input) {
        // Closed is terminal and silent
        (state @ SessionState::Closed { .. }, _) => (state, vec![]),

        (SessionState::Idle, Input::Open { creator }) => {
            let actions = vec![log(format!("Connecting to @{}", creator))];
            (SessionState::Connecting { creator }, actions)
        }

        (SessionState::Connecting { creator }, Input::Connected { room_id }) => {
            let actions = vec![
                log(format!(
                    "Live on @{} (room: {})",
                    creator,
                    room_id.as_deref().unwrap_or("unknown")
                )),
                Action::Push(RelayMessage::connected(format!("Connected to @{}", creator))),
            ];
            (SessionState::Live { creator, room_id }, actions)
        }

        // A second confirmation never re-enters Live
        (state, Input::Connected { .. }) => {
            let actions = vec![log(format!(
                "Ignoring connected event while {}",
                state.name()
            ))];
            (state, actions)
        }

        (state @ SessionState::Live { .. }, Input::Chat(chat)) => {
            (state, vec![Action::Push(RelayMessage::Comment(chat.into()))])
        }

        (state @ SessionState::Live { .. }, Input::Gift(gift)) => {
            if gift.is_relayable() {
                (state, vec![Action::Push(RelayMessage::Gift(gift.into()))])
            } else {
                (state, vec![])
            }
        }

        // Chat and gifts only flow while live
        (state, Input::Chat(_)) | (state, Input::Gift(_)) => (state, vec![]),

        (_, Input::Disconnected { reason }) => (
            SessionState::Closed {
                trigger: CloseTrigger::UpstreamDisconnected,
            },
            terminal(
                Some(RelayMessage::disconnected(reason.clone())),
                format!("Upstream disconnected: {}", reason),
            ),
        ),

        (_, Input::Error { message, detail }) => (
            SessionState::Closed {
                trigger: CloseTrigger::UpstreamError,
            },
            terminal(
                Some(RelayMessage::error(message.clone(), detail)),
                format!("Upstream error: {}", message),
            ),
        ),

        (_, Input::SetupFailed { message, detail }) => (
            SessionState::Closed {
                trigger: CloseTrigger::SetupFailed,
            },
            terminal(
                Some(RelayMessage::error(message.clone(), detail)),
                format!("Setup failed: {}", message),
            ),
        ),

        (_, Input::ClientCancel) => (
            SessionState::Closed {
                trigger: CloseTrigger::ClientCancelled,
            },
            terminal(None, "Client disconnected".to_string()),
        ),

        (state, Input::Open { .. }) => {
            let actions = vec![log(format!("Ignoring open while {}", state.name()))];
            (state, actions)
        }
    }
}
