//! Typed notifications published to presentation subscribers.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::trace;

use crate::IntersectionLogEntry;

use super::{aggregator::MetricsSnapshot, lcs::LcsState};

const DEFAULT_EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub enum MetricsEvent {
    /// Emitted once per cycle when the aggregator is finalized.
    Finalized(Arc<MetricsSnapshot>),
    LcsChanged(LcsState),
    ViewportTransition(IntersectionLogEntry),
}

/// Broadcast channel carrying [`MetricsEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<MetricsEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MetricsEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: MetricsEvent) {
        if self.sender.send(event).is_err() {
            trace!("metrics event dropped without subscribers");
        }
    }
}
