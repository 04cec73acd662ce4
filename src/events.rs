//! Durable lifecycle log plus best-effort notification fan-out.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::event::Event;
use crate::error::Result;
use crate::notify::{Notifier, render_event};

/// Append-only destination for events.
pub trait EventSink: Send + Sync {
    fn append(&self, event: &Event) -> Result<()>;
}

/// Records one event per transition; never fails the caller.
pub struct EventRecorder {
    sink: Arc<dyn EventSink>,
    notifier: Option<Arc<dyn Notifier>>,
    dashboard_url: Option<String>,
}

impl EventRecorder {
    #[must_use]
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink,
            notifier: None,
            dashboard_url: None,
        }
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    #[must_use]
    pub fn with_dashboard_url(mut self, url: Option<String>) -> Self {
        self.dashboard_url = url;
        self
    }

    /// Append `event`, then forward it to the notifier.
    ///
    /// Sink and notifier failures are logged and dropped.
    pub fn record(&self, event: Event) {
        debug!(kind = %event.kind, topic = %event.topic, "{}", event.message);
        if let Err(err) = self.sink.append(&event) {
            warn!(kind = %event.kind, topic = %event.topic, error = %err, "failed to append event");
        }
        if let Some(notifier) = &self.notifier {
            let message = render_event(&event, self.dashboard_url.as_deref());
            if let Err(err) = notifier.notify(&message) {
                warn!(kind = %event.kind, error = %err, "notification failed");
            }
        }
    }
}
