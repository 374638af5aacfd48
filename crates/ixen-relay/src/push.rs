//! Outbound push channel and SSE frame codec
//!
//! Frames on the wire look like `event: <kind>\ndata: <json>\n\n`. The
//! browser leaving is an expected condition, so pushing to a channel that is
//! already closed (by us or by the browser) is a silent no-op and closing
//! twice is fine.

use ixen_core::{RelayMessage, Result};
use tokio::sync::mpsc;
use tracing::debug;

/// Render one message as an SSE frame
pub fn encode_frame(message: &RelayMessage) -> Result<String> {
    Ok(format!("event: {}\ndata: {}\n\n", message.kind(), message.data()?))
}

/// Sending half of a session's push channel
pub struct Outbound {
    tx: Option<mpsc::Sender<RelayMessage>>,
}

impl Outbound {
    /// Create a channel; the receiver feeds the HTTP response body
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<RelayMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx: Some(tx) }, rx)
    }

    /// Enqueue a message; returns whether it reached the channel
    pub async fn push(&self, message: RelayMessage) -> bool {
        let Some(tx) = &self.tx else {
            debug!("Dropping {} frame: channel already closed", message.kind());
            return false;
        };

        match tx.send(message).await {
            Ok(()) => true,
            Err(mpsc::error::SendError(message)) => {
                debug!("Dropping {} frame: browser went away", message.kind());
                false
            }
        }
    }

    /// Close the channel; returns whether this call did the closing
    pub fn close(&mut self) -> bool {
        self.tx.take().is_some()
    }

    /// Resolves once the browser drops its end
    ///
    /// After our own `close` there is nothing left to watch and this never
    /// resolves.
    pub async fn closed(&self) {
        match &self.tx {
            Some(tx) => tx.closed().await,
            None => std::future::pending().await,
        }
    }
}

/// One decoded SSE frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub event: String,
    pub data: String,
}

impl Frame {
    pub fn into_message(self) -> Result<RelayMessage> {
        RelayMessage::from_parts(&self.event, &self.data)
    }
}

/// Reassembles frames from arbitrarily split chunks
///
/// Comment lines (keep-alives) and frames without data are skipped.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns every frame completed by it
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buffer.extend(chunk.iter().filter(|b| **b != b'\r'));

        let mut frames = Vec::new();
        while let Some(end) = find_blank_line(&self.buffer) {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(frame) = parse_block(&String::from_utf8_lossy(&block)) {
                frames.push(frame);
            }
        }
        frames
    }
}

fn find_blank_line(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

fn parse_block(block: &str) -> Option<Frame> {
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();

    for line in block.lines() {
        if line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }

    if data.is_empty() {
        return None;
    }
    Some(Frame {
        event: event.unwrap_or_else(|| "message".to_string()),
        data: data.join("\n"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_frame() {
        let frame = encode_frame(&RelayMessage::connected("Connected to @alice")).unwrap();
        assert_eq!(
            frame,
            "event: connected\ndata: {\"message\":\"Connected to @alice\"}\n\n"
        );
    }

    #[test]
    fn test_decoder_handles_split_chunks() {
        let wire = encode_frame(&RelayMessage::connected("Connected to @alice")).unwrap()
            + &encode_frame(&RelayMessage::disconnected("Stream ended")).unwrap();
        let bytes = wire.as_bytes();

        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        for chunk in bytes.chunks(7) {
            frames.extend(decoder.push(chunk));
        }

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event, "connected");
        assert_eq!(frames[1].event, "disconnected");
        assert_eq!(
            frames[1].clone().into_message().unwrap(),
            RelayMessage::disconnected("Stream ended")
        );
    }

    #[test]
    fn test_decoder_skips_keep_alive() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b": ping\n\nevent: error\r\ndata: {\"message\":\"x\"}\r\n\r\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "error");
    }

    #[tokio::test]
    async fn test_push_after_close_is_silent() {
        let (mut outbound, mut rx) = Outbound::channel(4);
        assert!(outbound.push(RelayMessage::connected("hi")).await);
        assert!(outbound.close());
        assert!(!outbound.close());
        assert!(!outbound.push(RelayMessage::disconnected("late")).await);

        assert_eq!(rx.recv().await, Some(RelayMessage::connected("hi")));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_push_after_browser_left_is_silent() {
        let (outbound, rx) = Outbound::channel(4);
        drop(rx);
        outbound.closed().await;
        assert!(!outbound.push(RelayMessage::connected("nobody home")).await);
    }
}
