//! Event Broadcaster
//!
//! Fans pipeline lifecycle events out to live subscribers over a tokio
//! broadcast channel. Subscribers only see events published after they
//! subscribed, in publish order.

use paypipe_core::domain::event::{PipelineEvent, PipelineEventKind};
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<PipelineEvent>,
}

impl EventBroadcaster {
    /// Create a broadcaster whose subscribers may fall `capacity` events behind
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Publish an event tagged with `pipeline_id`
    ///
    /// Having no subscribers is not an error; the event is simply dropped.
    pub fn publish(&self, pipeline_id: Uuid, kind: PipelineEventKind) {
        let event = PipelineEvent::new(pipeline_id, kind);
        tracing::debug!("[{}] {}", pipeline_id, event.name());
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

/// One subscriber's view of the event stream
pub struct EventSubscription {
    rx: broadcast::Receiver<PipelineEvent>,
}

impl EventSubscription {
    /// Next event, or `None` once the broadcaster is gone
    ///
    /// A subscriber that lagged past the channel capacity loses the
    /// overwritten events and resumes with the oldest one still buffered.
    pub async fn next(&mut self) -> Option<PipelineEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!("Event subscriber lagged, {} event(s) dropped", missed);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
