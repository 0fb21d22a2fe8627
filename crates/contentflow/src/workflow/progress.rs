use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::model::StepKind;

/// Events emitted while a job runs. Generated content is not included;
/// observers read it from the version store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    JobStarted {
        job_id: String,
        steps: Vec<StepKind>,
    },
    StepStarted {
        job_id: String,
        step: StepKind,
    },
    StepCompleted {
        job_id: String,
        step: StepKind,
        version: i64,
        cost: i64,
        tokens: i64,
    },
    StepFailed {
        job_id: String,
        step: StepKind,
        error: String,
    },
    JobCompleted {
        job_id: String,
        total_cost: i64,
        total_tokens: i64,
    },
    JobFailed {
        job_id: String,
        error: String,
    },
}

impl ProgressEvent {
    pub fn job_id(&self) -> &str {
        match self {
            ProgressEvent::JobStarted { job_id, .. }
            | ProgressEvent::StepStarted { job_id, .. }
            | ProgressEvent::StepCompleted { job_id, .. }
            | ProgressEvent::StepFailed { job_id, .. }
            | ProgressEvent::JobCompleted { job_id, .. }
            | ProgressEvent::JobFailed { job_id, .. } => job_id,
        }
    }
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Discards every event.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Fans events out to any number of subscribers. Sending with no
/// subscriber is not an error.
#[derive(Clone)]
pub struct BroadcastProgress {
    sender: Arc<broadcast::Sender<ProgressEvent>>,
}

impl BroadcastProgress {
    /// `capacity` events are buffered per subscriber; at least one.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastProgress {
    fn default() -> Self {
        Self::new(256)
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: ProgressEvent) {
        let _ = self.sender.send(event);
    }
}
