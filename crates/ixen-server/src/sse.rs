//! Server-Sent Events endpoint: one relay session per request

use crate::error::ApiError;
use crate::server::SharedState;
use axum::{
    extract::{Query, State},
    http::header,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use ixen_core::{CreatorId, RelayMessage};
use ixen_relay::{spawn_session, Outbound};
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::{wrappers::ReceiverStream, StreamExt};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct LiveQuery {
    pub username: Option<String>,
}

fn to_event(message: RelayMessage) -> Option<Result<Event, Infallible>> {
    match message.data() {
        Ok(json) => Some(Ok(Event::default().event(message.kind()).data(json))),
        Err(e) => {
            warn!("Dropping {} frame that failed to encode: {}", message.kind(), e);
            None
        }
    }
}

/// GET /api/live?username=<creator>
///
/// Validation happens before any session exists. After that the response
/// is always a stream; setup failures arrive as an `error` frame.
pub async fn live_handler(
    State(app): State<SharedState>,
    Query(query): Query<LiveQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let creator = CreatorId::parse(query.username.as_deref().unwrap_or_default())?;

    let (outbound, rx) = Outbound::channel(app.config.session.channel_capacity);
    let handle = spawn_session(
        app.connector.clone(),
        creator.clone(),
        outbound,
        &app.config.session,
    );

    app.session_started();
    info!("Relay requested for @{} ({} active)", creator, app.active_sessions());
    let watcher = app.clone();
    tokio::spawn(async move {
        match handle.await {
            Ok(report) => info!(
                "Session {} for @{} finished: {:?}",
                report.id, report.creator, report.trigger
            ),
            Err(e) => warn!("Session task for @{} failed: {}", creator, e),
        }
        watcher.session_finished();
    });

    let stream = ReceiverStream::new(rx).filter_map(to_event);
    let keep_alive = KeepAlive::new()
        .interval(Duration::from_secs(app.config.server.keep_alive_secs.max(1)))
        .text("ping");

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Sse::new(stream).keep_alive(keep_alive),
    ))
}
