//! ---
//! oee_section: "02-messaging"
//! oee_subsection: "module"
//! oee_type: "source"
//! oee_scope: "code"
//! oee_description: "Bounded queue decoupling the simulation from broker I/O."
//! oee_version: "v0.1.0"
//! oee_owner: "tbd"
//! ---
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::publisher::TelemetryPublisher;
use crate::{MessagingError, Result};

/// Message waiting for a broker forwarder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Slash-separated topic.
    pub topic: String,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

/// Non-blocking publisher that enqueues onto a bounded channel.
///
/// A full queue drops the message and reports [`MessagingError::QueueFull`].
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    sender: mpsc::Sender<OutboundMessage>,
    capacity: usize,
}

/// Receiving end drained by a forwarder task.
#[derive(Debug)]
pub struct OutboundQueue {
    receiver: mpsc::Receiver<OutboundMessage>,
}

impl ChannelPublisher {
    /// Create a publisher and the queue it feeds. `capacity` is raised to at least one.
    pub fn bounded(capacity: usize) -> (Self, OutboundQueue) {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender, capacity }, OutboundQueue { receiver })
    }
}

impl TelemetryPublisher for ChannelPublisher {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<()> {
        let message = OutboundMessage {
            topic: topic.to_owned(),
            payload: payload.to_vec(),
        };
        self.sender.try_send(message).map_err(|err| match err {
            TrySendError::Full(_) => MessagingError::QueueFull(self.capacity),
            TrySendError::Closed(_) => MessagingError::Closed,
        })
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}

impl OutboundQueue {
    /// Wait for the next message; `None` once every publisher is dropped.
    pub async fn recv(&mut self) -> Option<OutboundMessage> {
        self.receiver.recv().await
    }

    /// Take a message if one is ready.
    pub fn try_recv(&mut self) -> Option<OutboundMessage> {
        self.receiver.try_recv().ok()
    }
}
