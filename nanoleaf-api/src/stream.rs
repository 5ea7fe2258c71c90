//! Event stream task management

use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinHandle;

use crate::error::{ApiError, Result};
use crate::events::{SseDecoder, StreamPayload};

/// Receives every decoded payload, then exactly one terminal error when the stream ends
pub type EventCallback = Arc<dyn Fn(Result<StreamPayload>) + Send + Sync>;

/// Owns the task reading an event stream; dropping it stops the stream
#[derive(Debug)]
pub struct EventStreamHandle {
    task: Option<JoinHandle<()>>,
}

impl EventStreamHandle {
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    /// A handle without a reader task, for API implementations that push events themselves
    pub fn detached() -> Self {
        Self { task: None }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Abort the reader; no callback runs after this returns from the reader's point of view
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for EventStreamHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Decode one body chunk and pass every well-formed payload to `on_event`
///
/// Malformed messages are logged and skipped, the stream stays open. Returns
/// the number of payloads delivered.
pub fn deliver_chunk(decoder: &mut SseDecoder, chunk: &[u8], on_event: &EventCallback) -> usize {
    let mut delivered = 0;
    for message in decoder.feed(chunk) {
        let data = message.data.clone();
        match message.into_payload() {
            Ok(payload) => {
                on_event(Ok(payload));
                delivered += 1;
            }
            Err(e) => {
                tracing::warn!("Invalid data received from nanoleaf controller: {} ({})", data, e);
            }
        }
    }
    delivered
}

/// Read an SSE response body until it ends or fails
pub(crate) async fn pump(response: reqwest::Response, on_event: EventCallback) {
    let mut decoder = SseDecoder::new();
    let mut body = response.bytes_stream();

    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => {
                deliver_chunk(&mut decoder, &bytes, &on_event);
            }
            Err(e) => {
                tracing::debug!("Event stream read failed: {}", e);
                on_event(Err(ApiError::from(e)));
                return;
            }
        }
    }

    on_event(Err(ApiError::StreamClosed));
}
