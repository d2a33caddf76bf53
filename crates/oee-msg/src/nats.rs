//! ---
//! oee_section: "02-messaging"
//! oee_subsection: "module"
//! oee_type: "source"
//! oee_scope: "code"
//! oee_description: "Forwarder draining the outbound queue into a NATS broker."
//! oee_version: "v0.1.0"
//! oee_owner: "tbd"
//! ---
use async_nats::{Client, ConnectOptions};
use prometheus::IntCounter;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::channel::{OutboundMessage, OutboundQueue};
use crate::topics::to_subject;
use crate::{MessagingError, Result};

/// Moves queued telemetry to a NATS server, mapping topics to dotted subjects.
///
/// Broker failures are logged and counted; they never stop the forwarder.
#[derive(Debug, Clone)]
pub struct NatsForwarder {
    url: String,
    failures: Option<IntCounter>,
}

impl NatsForwarder {
    /// Forwarder for the broker at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            failures: None,
        }
    }

    /// Count failed publishes on `counter`.
    pub fn with_failure_counter(mut self, counter: IntCounter) -> Self {
        self.failures = Some(counter);
        self
    }

    /// Broker URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Connect (retrying in the background) and forward until shutdown or queue close.
    pub async fn run(
        self,
        mut queue: OutboundQueue,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<()> {
        let client = ConnectOptions::new()
            .retry_on_initial_connect()
            .connect(self.url.as_str())
            .await
            .map_err(|err| MessagingError::Broker(err.to_string()))?;
        info!(url = %self.url, "nats forwarder started");

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                next = queue.recv() => match next {
                    Some(message) => self.forward(&client, message).await,
                    None => break,
                },
            }
        }

        if let Err(err) = client.flush().await {
            warn!(error = %err, "nats flush failed during shutdown");
        }
        info!(url = %self.url, "nats forwarder stopped");
        Ok(())
    }

    async fn forward(&self, client: &Client, message: OutboundMessage) {
        let subject = to_subject(&message.topic);
        match client.publish(subject.clone(), message.payload.into()).await {
            Ok(()) => debug!(subject = %subject, "forwarded to nats"),
            Err(err) => {
                if let Some(counter) = &self.failures {
                    counter.inc();
                }
                warn!(subject = %subject, error = %err, "nats publish failed");
            }
        }
    }
}
