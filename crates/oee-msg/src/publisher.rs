//! ---
//! oee_section: "02-messaging"
//! oee_subsection: "module"
//! oee_type: "source"
//! oee_scope: "code"
//! oee_description: "Telemetry publish capability and local publishers."
//! oee_version: "v0.1.0"
//! oee_owner: "tbd"
//! ---
use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::Result;

/// Capability to hand one payload to a pub/sub channel.
///
/// Implementations must not block: they are called from the simulation loops.
pub trait TelemetryPublisher: Send + Sync {
    /// Publish `payload` on `topic`.
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<()>;
    /// Human-readable publisher name for logging.
    fn name(&self) -> &'static str;
}

/// One message captured by [`InMemoryPublisher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    /// Destination topic.
    pub topic: String,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

impl PublishedMessage {
    /// Payload as UTF-8 text, lossily decoded.
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Publisher backed by a mutex protected queue, for tests and broker-less runs.
#[derive(Clone, Default)]
pub struct InMemoryPublisher {
    queue: Arc<Mutex<VecDeque<PublishedMessage>>>,
}

impl InMemoryPublisher {
    /// Create an empty publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything published so far.
    pub fn drain(&self) -> Vec<PublishedMessage> {
        self.queue.lock().drain(..).collect()
    }

    /// Messages published on `topic`, oldest first, without draining.
    pub fn on_topic(&self, topic: &str) -> Vec<PublishedMessage> {
        self.queue
            .lock()
            .iter()
            .filter(|message| message.topic == topic)
            .cloned()
            .collect()
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// True when nothing has been published.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

impl TelemetryPublisher for InMemoryPublisher {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<()> {
        self.queue.lock().push_back(PublishedMessage {
            topic: topic.to_owned(),
            payload: payload.to_vec(),
        });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}

/// Publisher that only traces messages; used when no broker is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingPublisher;

impl TelemetryPublisher for LoggingPublisher {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<()> {
        debug!(topic, bytes = payload.len(), "telemetry published");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "logging"
    }
}
