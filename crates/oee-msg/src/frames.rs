//! ---
//! oee_section: "02-messaging"
//! oee_subsection: "module"
//! oee_type: "source"
//! oee_scope: "code"
//! oee_description: "Serialization of cell telemetry onto its topics."
//! oee_version: "v0.1.0"
//! oee_owner: "tbd"
//! ---
use oee_sim::TelemetryFrame;

use crate::publisher::TelemetryPublisher;
use crate::topics::TopicScheme;
use crate::Result;

/// Publish a frame as JSON on the telemetry topic and its bare status on the status topic.
///
/// Both publishes are attempted; the first failure is returned.
pub fn publish_frame(
    publisher: &dyn TelemetryPublisher,
    topics: &TopicScheme,
    frame: &TelemetryFrame,
) -> Result<()> {
    let payload = serde_json::to_vec(frame)?;
    let telemetry = publisher.publish(&topics.telemetry(&frame.id), &payload);
    let status = publisher.publish(&topics.status(&frame.id), frame.status.as_str().as_bytes());
    telemetry.and(status)
}
