//! ---
//! oee_section: "02-messaging"
//! oee_subsection: "module"
//! oee_type: "source"
//! oee_scope: "code"
//! oee_description: "Telemetry publish capability and transports."
//! oee_version: "v0.1.0"
//! oee_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Telemetry publishing for the OEE simulator.
//!
//! The simulation only ever sees the [`TelemetryPublisher`] capability. Concrete
//! publishers either keep messages in memory, log them, or queue them for the
//! NATS forwarder task.

pub mod channel;
pub mod frames;
pub mod nats;
pub mod publisher;
pub mod topics;

/// Shared result type for messaging operations.
pub type Result<T> = std::result::Result<T, MessagingError>;

/// Failures raised while handing telemetry to a transport.
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    /// The outbound queue is at capacity; the message was dropped.
    #[error("outbound queue full (capacity {0})")]
    QueueFull(usize),
    /// The consuming side of the queue has gone away.
    #[error("outbound queue closed")]
    Closed,
    /// The payload could not be encoded.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    /// The broker rejected or could not accept the message.
    #[error("broker error: {0}")]
    Broker(String),
}

pub use channel::{ChannelPublisher, OutboundMessage, OutboundQueue};
pub use frames::publish_frame;
pub use nats::NatsForwarder;
pub use publisher::{InMemoryPublisher, LoggingPublisher, PublishedMessage, TelemetryPublisher};
pub use topics::TopicScheme;
