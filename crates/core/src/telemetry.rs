//! Lightweight in-process record of fetch and mutation lifecycle events.

use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    FetchStarted { seq: u64 },
    FetchCompleted { seq: u64, count: usize, rejected: usize },
    FetchFailed { seq: u64, error: String },
    StaleFetchDiscarded { seq: u64 },
    MutationQueued(String),
    MutationConfirmed(String),
    MutationRolledBack { action: String, error: String },
}

pub struct Handle {
    #[cfg(feature = "telemetry")]
    events: Mutex<Vec<Event>>,
}

impl Handle {
    pub fn new() -> Self {
        Self {
            #[cfg(feature = "telemetry")]
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn record(&self, event: Event) {
        #[cfg(feature = "telemetry")]
        {
            match &event {
                Event::FetchStarted { seq } => tracing::debug!(seq, "telemetry fetch started"),
                Event::FetchCompleted {
                    seq,
                    count,
                    rejected,
                } => tracing::debug!(seq, count, rejected, "telemetry fetch completed"),
                Event::FetchFailed { seq, error } => {
                    tracing::debug!(seq, error = %error, "telemetry fetch failed")
                }
                Event::StaleFetchDiscarded { seq } => {
                    tracing::debug!(seq, "telemetry stale fetch discarded")
                }
                Event::MutationQueued(action) => {
                    tracing::debug!(action = action.as_str(), "telemetry mutation queued")
                }
                Event::MutationConfirmed(action) => {
                    tracing::debug!(action = action.as_str(), "telemetry mutation confirmed")
                }
                Event::MutationRolledBack { action, error } => tracing::debug!(
                    action = action.as_str(),
                    error = %error,
                    "telemetry mutation rolled back"
                ),
            }
            self.events.lock().push(event);
        }
        #[cfg(not(feature = "telemetry"))]
        {
            let _ = event;
        }
    }

    pub fn is_enabled(&self) -> bool {
        cfg!(feature = "telemetry")
    }

    /// Copy of everything recorded so far; empty when the feature is off.
    pub fn events(&self) -> Vec<Event> {
        #[cfg(feature = "telemetry")]
        {
            self.events.lock().clone()
        }
        #[cfg(not(feature = "telemetry"))]
        {
            Vec::new()
        }
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::new()
    }
}
