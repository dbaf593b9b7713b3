use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    pub text: String,
}

/// Progress events for one request, in emission order.
///
/// Owned by the task handling the request; never shared across requests.
#[derive(Debug, Default)]
pub struct StatusChannel {
    events: Vec<StatusEvent>,
}

impl StatusChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, text: impl Into<String>) {
        let now = Utc::now().timestamp_micros() as f64 / 1_000_000.0;
        // Timestamps never go backwards within a request, even if the clock does.
        let timestamp = self
            .events
            .last()
            .map(|last| last.timestamp.max(now))
            .unwrap_or(now);
        let text = text.into();
        tracing::debug!(status = %text, "Status");
        self.events.push(StatusEvent { timestamp, text });
    }

    /// Take every event emitted so far, leaving the channel empty.
    pub fn drain(&mut self) -> Vec<StatusEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[StatusEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
