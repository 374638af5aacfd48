//! Relay session runner
//!
//! One tokio task per browser request. Every input reaches the state
//! machine from this one task, one at a time: adapter events, the browser
//! dropping its end of the push channel, the outcome of the pending upstream
//! open and the setup timeout. The new state is stored before any action
//! runs, so nothing can slip in between checking the latch and setting it.

use crate::push::Outbound;
use crate::state_machine::{transition, Action, CloseTrigger, Input, SessionState};
use crate::upstream::{LiveConnection, LiveConnector};
use ixen_core::config::SessionConfig;
use ixen_core::{AdapterEvent, CreatorId, IxenError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

type PendingOpen = JoinHandle<Result<Box<dyn LiveConnection>>>;

/// Adapter events buffered per session; a full buffer makes the transport wait
const EVENT_BUFFER: usize = 256;

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub id: Uuid,
    pub creator: CreatorId,
    pub trigger: CloseTrigger,
}

/// What woke the session loop
enum Wake {
    ClientGone,
    Opened(Result<Box<dyn LiveConnection>>),
    Event(Option<AdapterEvent>),
    SetupTimedOut,
}

impl From<AdapterEvent> for Input {
    fn from(event: AdapterEvent) -> Self {
        match event {
            AdapterEvent::Connected { room_id } => Input::Connected { room_id },
            AdapterEvent::Message(chat) => Input::Chat(chat),
            AdapterEvent::Gift(gift) => Input::Gift(gift),
            AdapterEvent::Disconnected { reason } => Input::Disconnected { reason },
            AdapterEvent::Error { message, detail } => Input::Error { message, detail },
        }
    }
}

fn setup_failed(err: &IxenError) -> Input {
    Input::SetupFailed {
        message: format!("Failed to connect. {}", err),
        detail: Some(err.kind().to_string()),
    }
}

/// One browser request bound to one upstream connection
pub struct RelaySession {
    id: Uuid,
    creator: CreatorId,
    state: SessionState,
    outbound: Outbound,
    upstream: Option<Box<dyn LiveConnection>>,
    pending: Option<PendingOpen>,
    setup_timeout: Duration,
}

impl RelaySession {
    pub fn new(creator: CreatorId, outbound: Outbound, setup_timeout: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            creator,
            state: SessionState::Idle,
            outbound,
            upstream: None,
            pending: None,
            setup_timeout,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Drive the session until it closes
    pub async fn run(mut self, connector: Arc<dyn LiveConnector>) -> SessionReport {
        let (events_tx, mut events) = mpsc::channel(EVENT_BUFFER);
        let mut events_open = true;

        self.apply(Input::Open {
            creator: self.creator.clone(),
        })
        .await;

        // The sender exists before connect starts, so nothing is missed
        let creator = self.creator.clone();
        self.pending = Some(tokio::spawn(async move {
            connector.connect(&creator, events_tx).await
        }));

        let setup_deadline = tokio::time::sleep(self.setup_timeout);
        tokio::pin!(setup_deadline);

        while !self.state.is_closed() {
            let wake = match self.pending.as_mut() {
                Some(pending) => tokio::select! {
                    biased;
                    _ = self.outbound.closed() => Wake::ClientGone,
                    joined = pending => Wake::Opened(joined.unwrap_or_else(|e| {
                        Err(IxenError::Setup(format!("Connect task failed: {}", e)))
                    })),
                    event = events.recv(), if events_open => Wake::Event(event),
                    _ = &mut setup_deadline => Wake::SetupTimedOut,
                },
                None => tokio::select! {
                    biased;
                    _ = self.outbound.closed() => Wake::ClientGone,
                    event = events.recv() => Wake::Event(event),
                },
            };

            match wake {
                Wake::ClientGone => self.apply(Input::ClientCancel).await,
                Wake::Opened(result) => {
                    self.pending = None;
                    self.finish_open(result).await;
                }
                Wake::Event(Some(event)) => {
                    debug!("Session {} adapter event: {}", self.id, event.kind());
                    self.apply(event.into()).await;
                }
                Wake::Event(None) if self.pending.is_some() => {
                    // The sender went away before the open finished; keep
                    // watching the client and the deadline until it does
                    events_open = false;
                }
                Wake::Event(None) => {
                    self.apply(Input::Disconnected {
                        reason: "The upstream connection ended.".to_string(),
                    })
                    .await;
                }
                Wake::SetupTimedOut => {
                    let err = IxenError::Setup(format!(
                        "Timed out after {}s",
                        self.setup_timeout.as_secs()
                    ));
                    self.apply(setup_failed(&err)).await;
                }
            }
        }

        let trigger = match self.state {
            SessionState::Closed { trigger } => trigger,
            _ => CloseTrigger::UpstreamDisconnected,
        };
        info!("Session {} for @{} closed ({:?})", self.id, self.creator, trigger);

        SessionReport {
            id: self.id,
            creator: self.creator,
            trigger,
        }
    }

    async fn finish_open(&mut self, result: Result<Box<dyn LiveConnection>>) {
        match result {
            Ok(connection) => {
                debug!(
                    "Session {} upstream open (room: {})",
                    self.id,
                    connection.room_id().unwrap_or_default()
                );
                self.upstream = Some(connection);
            }
            Err(e) => {
                warn!("Session {} could not open @{}: {}", self.id, self.creator, e);
                self.apply(setup_failed(&e)).await;
            }
        }
    }

    async fn apply(&mut self, input: Input) {
        let state = std::mem::replace(&mut self.state, SessionState::Idle);
        let (next, actions) = transition(state, input);
        self.state = next;

        for action in actions {
            self.execute(action).await;
        }
    }

    async fn execute(&mut self, action: Action) {
        match action {
            Action::Push(message) => {
                self.outbound.push(message).await;
            }
            Action::DisconnectUpstream => self.disconnect_upstream().await,
            Action::CloseChannel => {
                if self.outbound.close() {
                    debug!("Session {} channel closed", self.id);
                }
            }
            Action::Log { message } => info!("[session {}] {}", self.id, message),
        }
    }

    async fn disconnect_upstream(&mut self) {
        if let Some(mut connection) = self.upstream.take() {
            if let Err(e) = connection.disconnect().await {
                warn!("Session {} error disconnecting upstream: {}", self.id, e);
            }
        }

        // An open still in flight gets torn down whenever it finishes
        if let Some(pending) = self.pending.take() {
            tokio::spawn(reap_pending_open(self.id, pending));
        }
    }
}

async fn reap_pending_open(id: Uuid, pending: PendingOpen) {
    match pending.await {
        Ok(Ok(mut connection)) => {
            info!("Session {} closing connection that opened after shutdown", id);
            if let Err(e) = connection.disconnect().await {
                warn!("Session {} error disconnecting late connection: {}", id, e);
            }
        }
        Ok(Err(e)) => debug!("Session {} pending open failed after shutdown: {}", id, e),
        Err(e) => warn!("Session {} pending open task failed: {}", id, e),
    }
}

/// Start a session on its own task
pub fn spawn_session(
    connector: Arc<dyn LiveConnector>,
    creator: CreatorId,
    outbound: Outbound,
    config: &SessionConfig,
) -> JoinHandle<SessionReport> {
    let session = RelaySession::new(
        creator,
        outbound,
        Duration::from_secs(config.setup_timeout_secs),
    );
    tokio::spawn(session.run(connector))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ixen_core::{ChatEvent, GiftEvent, GiftType, RelayMessage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    /// Counts disconnects across every connection it hands out
    struct CountingConnection {
        disconnects: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl LiveConnection for CountingConnection {
        fn room_id(&self) -> Option<String> {
            Some("room-test".to_string())
        }

        async fn disconnect(&mut self) -> Result<()> {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    enum Script {
        /// Confirm, then hand the sender to the test
        Live,
        /// Fail the open
        Fail(fn() -> IxenError),
        /// Block until released, then succeed
        Gate(Mutex<Option<oneshot::Receiver<()>>>),
        /// Drop the event sender, then block until released
        Silent(Mutex<Option<oneshot::Receiver<()>>>),
    }

    struct ScriptedConnector {
        script: Script,
        disconnects: Arc<AtomicUsize>,
        sender: Mutex<Option<crate::upstream::EventSender>>,
    }

    impl ScriptedConnector {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self {
                script,
                disconnects: Arc::new(AtomicUsize::new(0)),
                sender: Mutex::new(None),
            })
        }

        fn send(&self, event: AdapterEvent) {
            let guard = self.sender.lock().unwrap();
            guard.as_ref().unwrap().try_send(event).unwrap();
        }

        fn disconnects(&self) -> usize {
            self.disconnects.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LiveConnector for ScriptedConnector {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn connect(
            &self,
            _creator: &CreatorId,
            events: crate::upstream::EventSender,
        ) -> Result<Box<dyn LiveConnection>> {
            match &self.script {
                Script::Live => {}
                Script::Fail(make) => return Err(make()),
                Script::Gate(gate) => {
                    let rx = gate.lock().unwrap().take();
                    if let Some(rx) = rx {
                        let _ = rx.await;
                    }
                }
                Script::Silent(gate) => {
                    drop(events);
                    let rx = gate.lock().unwrap().take();
                    if let Some(rx) = rx {
                        let _ = rx.await;
                    }
                    return Ok(Box::new(CountingConnection {
                        disconnects: Arc::clone(&self.disconnects),
                    }));
                }
            }
            *self.sender.lock().unwrap() = Some(events.clone());
            events.send(AdapterEvent::Connected { room_id: None }).await.ok();
            Ok(Box::new(CountingConnection {
                disconnects: Arc::clone(&self.disconnects),
            }))
        }
    }

    fn start(
        connector: Arc<ScriptedConnector>,
    ) -> (JoinHandle<SessionReport>, mpsc::Receiver<RelayMessage>) {
        let (outbound, rx) = Outbound::channel(16);
        let handle = spawn_session(
            connector,
            CreatorId::parse("@alice").unwrap(),
            outbound,
            &SessionConfig::default(),
        );
        (handle, rx)
    }

    fn chat(text: &str) -> AdapterEvent {
        AdapterEvent::Message(ChatEvent {
            speaker_id: "viewer".to_string(),
            text: text.to_string(),
            avatar_url: None,
            message_id: None,
        })
    }

    #[tokio::test]
    async fn test_live_session_relays_then_disconnects_once() {
        let connector = ScriptedConnector::new(Script::Live);
        let (handle, mut rx) = start(Arc::clone(&connector));

        assert!(matches!(rx.recv().await, Some(RelayMessage::Connected(_))));

        connector.send(chat("hello"));
        assert!(matches!(rx.recv().await, Some(RelayMessage::Comment(c)) if c.comment == "hello"));

        connector.send(AdapterEvent::Disconnected {
            reason: "Stream ended".to_string(),
        });
        // Racing triggers after the first one change nothing
        connector.send(AdapterEvent::Error {
            message: "late".to_string(),
            detail: None,
        });

        assert_eq!(rx.recv().await, Some(RelayMessage::disconnected("Stream ended")));
        assert_eq!(rx.recv().await, None);

        let report = handle.await.unwrap();
        assert_eq!(report.trigger, CloseTrigger::UpstreamDisconnected);
        assert_eq!(connector.disconnects(), 1);
    }

    #[tokio::test]
    async fn test_error_frame_precedes_close() {
        let connector = ScriptedConnector::new(Script::Live);
        let (handle, mut rx) = start(Arc::clone(&connector));
        rx.recv().await;

        connector.send(AdapterEvent::Error {
            message: "The browser page crashed. Please try again.".to_string(),
            detail: Some("Target closed".to_string()),
        });

        match rx.recv().await {
            Some(RelayMessage::Error(payload)) => {
                assert_eq!(payload.error.as_deref(), Some("Target closed"));
            }
            other => panic!("unexpected frame: {:?}", other),
        }
        assert_eq!(rx.recv().await, None);
        assert_eq!(handle.await.unwrap().trigger, CloseTrigger::UpstreamError);
        assert_eq!(connector.disconnects(), 1);
    }

    #[tokio::test]
    async fn test_streak_ticks_suppressed_in_session() {
        let connector = ScriptedConnector::new(Script::Live);
        let (handle, mut rx) = start(Arc::clone(&connector));
        rx.recv().await;

        for (count, is_final) in [(1, false), (2, false), (3, false), (4, true)] {
            connector.send(AdapterEvent::Gift(GiftEvent {
                speaker_id: "viewer".to_string(),
                gift_name: "Rose".to_string(),
                repeat_count: count,
                avatar_url: None,
                gift_type: GiftType::Streakable,
                is_streak_final: is_final,
                message_id: None,
            }));
        }
        connector.send(AdapterEvent::Disconnected {
            reason: "done".to_string(),
        });

        let mut frames = Vec::new();
        while let Some(frame) = rx.recv().await {
            frames.push(frame);
        }
        let gifts: Vec<_> = frames
            .iter()
            .filter_map(|f| match f {
                RelayMessage::Gift(g) => Some(g.repeat_count),
                _ => None,
            })
            .collect();
        assert_eq!(gifts, vec![4]);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_client_cancel_disconnects_once() {
        let connector = ScriptedConnector::new(Script::Live);
        let (handle, mut rx) = start(Arc::clone(&connector));
        rx.recv().await;

        drop(rx);
        let report = handle.await.unwrap();
        assert_eq!(report.trigger, CloseTrigger::ClientCancelled);
        assert_eq!(connector.disconnects(), 1);
    }

    #[tokio::test]
    async fn test_not_live_is_single_error_frame() {
        let connector = ScriptedConnector::new(Script::Fail(|| {
            IxenError::NotLive("User is not live or the stream is not available.".to_string())
        }));
        let (handle, mut rx) = start(Arc::clone(&connector));

        match rx.recv().await {
            Some(RelayMessage::Error(payload)) => {
                assert!(payload.message.starts_with("Failed to connect."));
                assert_eq!(payload.error.as_deref(), Some("not_live"));
            }
            other => panic!("unexpected frame: {:?}", other),
        }
        assert_eq!(rx.recv().await, None);
        assert_eq!(handle.await.unwrap().trigger, CloseTrigger::SetupFailed);
        assert_eq!(connector.disconnects(), 0);
    }

    #[tokio::test]
    async fn test_cancel_while_open_pending_reaps_connection() {
        let (release, gate) = oneshot::channel();
        let connector = ScriptedConnector::new(Script::Gate(Mutex::new(Some(gate))));
        let (handle, rx) = start(Arc::clone(&connector));

        // Browser leaves while the upstream is still opening
        drop(rx);
        let report = handle.await.unwrap();
        assert_eq!(report.trigger, CloseTrigger::ClientCancelled);
        assert_eq!(connector.disconnects(), 0);

        // The open completes later and is torn down exactly once
        release.send(()).unwrap();
        for _ in 0..100 {
            if connector.disconnects() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(connector.disconnects(), 1);
    }

    #[tokio::test]
    async fn test_setup_timeout_fails_session() {
        let (_release, gate) = oneshot::channel::<()>();
        let connector = ScriptedConnector::new(Script::Gate(Mutex::new(Some(gate))));
        let (outbound, mut rx) = Outbound::channel(4);
        let session = RelaySession::new(
            CreatorId::parse("alice").unwrap(),
            outbound,
            Duration::from_millis(20),
        );
        let handle = tokio::spawn(session.run(connector));

        match rx.recv().await {
            Some(RelayMessage::Error(payload)) => assert!(payload.message.contains("Timed out")),
            other => panic!("unexpected frame: {:?}", other),
        }
        assert_eq!(rx.recv().await, None);
        assert_eq!(handle.await.unwrap().trigger, CloseTrigger::SetupFailed);
    }

    #[tokio::test]
    async fn test_cancel_seen_after_sender_dropped_while_opening() {
        let (release, gate) = oneshot::channel();
        let connector = ScriptedConnector::new(Script::Silent(Mutex::new(Some(gate))));
        let (handle, rx) = start(Arc::clone(&connector));

        // Let the connect task drop its sender first
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(rx);

        let report = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("session should end without waiting for the open")
            .unwrap();
        assert_eq!(report.trigger, CloseTrigger::ClientCancelled);

        release.send(()).unwrap();
        for _ in 0..100 {
            if connector.disconnects() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(connector.disconnects(), 1);
    }

    #[tokio::test]
    async fn test_setup_timeout_fires_after_sender_dropped() {
        let (_release, gate) = oneshot::channel::<()>();
        let connector = ScriptedConnector::new(Script::Silent(Mutex::new(Some(gate))));
        let (outbound, mut rx) = Outbound::channel(4);
        let session = RelaySession::new(
            CreatorId::parse("alice").unwrap(),
            outbound,
            Duration::from_millis(50),
        );
        let handle = tokio::spawn(session.run(connector));

        match rx.recv().await {
            Some(RelayMessage::Error(payload)) => assert!(payload.message.contains("Timed out")),
            other => panic!("unexpected frame: {:?}", other),
        }
        assert_eq!(handle.await.unwrap().trigger, CloseTrigger::SetupFailed);
    }

    #[tokio::test]
    async fn test_open_without_sender_ends_as_disconnect() {
        let (release, gate) = oneshot::channel();
        let connector = ScriptedConnector::new(Script::Silent(Mutex::new(Some(gate))));
        let (handle, mut rx) = start(Arc::clone(&connector));

        tokio::time::sleep(Duration::from_millis(20)).await;
        release.send(()).unwrap();

        let mut frames = Vec::new();
        while let Some(frame) = rx.recv().await {
            frames.push(frame);
        }
        assert_eq!(frames.len(), 1);
        assert!(!matches!(frames[0], RelayMessage::Connected(_)));
        assert_eq!(handle.await.unwrap().trigger, CloseTrigger::UpstreamDisconnected);
        assert_eq!(connector.disconnects(), 1);
    }
}
