//! ---
//! oee_section: "02-messaging"
//! oee_subsection: "module"
//! oee_type: "source"
//! oee_scope: "code"
//! oee_description: "Per-cell topic naming."
//! oee_version: "v0.1.0"
//! oee_owner: "tbd"
//! ---

/// Topic layout `<prefix>/<cell id>/<channel>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicScheme {
    prefix: String,
}

impl TopicScheme {
    /// Build a scheme; trailing slashes on the prefix are ignored.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_owned(),
        }
    }

    /// Prefix without a trailing slash.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Full telemetry payload topic.
    pub fn telemetry(&self, cell_id: &str) -> String {
        format!("{}/{cell_id}/telemetry", self.prefix)
    }

    /// Status-only topic.
    pub fn status(&self, cell_id: &str) -> String {
        format!("{}/{cell_id}/status", self.prefix)
    }
}

impl Default for TopicScheme {
    fn default() -> Self {
        Self::new("porto-brasil/cell")
    }
}

/// NATS subject for a slash-separated topic.
pub fn to_subject(topic: &str) -> String {
    topic.replace('/', ".")
}
