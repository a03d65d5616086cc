// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Change-listener bus: every storage mutation emits a [`ChangeEvent`] to
//! registered listeners (debounced JSONL export, dirty search indices).
//!
//! A bounded channel per subscriber is preferable to synchronous callbacks
//! so a slow subscriber can't stall the writer (spec §9 design note). A
//! full channel drops the oldest event with a warning rather than blocking
//! or growing unbounded — `tokio::sync::broadcast` already has exactly this
//! lagging-receiver semantics, so it is the natural primitive here.

use gobby_core::ChangeEvent;
use tokio::sync::broadcast;
use tracing::warn;

const CHANGE_BUS_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct ChangeBus {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CHANGE_BUS_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> ChangeSubscriber {
        ChangeSubscriber { rx: self.tx.subscribe() }
    }

    /// Publish a change event. Never blocks; if there are no subscribers the
    /// send is a no-op (teacher's pattern: the bus doesn't care who's listening).
    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ChangeSubscriber {
    rx: broadcast::Receiver<ChangeEvent>,
}

impl ChangeSubscriber {
    /// Await the next event, logging and skipping past a lag (dropped
    /// events) with a warning rather than surfacing it as an error.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(dropped = n, "change bus subscriber lagged; oldest events dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gobby_core::{ChangeKind, EntityKind};

    fn sample_event(id: &str) -> ChangeEvent {
        ChangeEvent {
            entity: EntityKind::Task,
            kind: ChangeKind::Created,
            id: id.into(),
            project_id: "prj-000001".into(),
            at_epoch_ms: 0,
        }
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = ChangeBus::new();
        let mut sub = bus.subscribe();
        bus.publish(sample_event("gt-aaaaaa"));
        let event = sub.recv().await.unwrap();
        assert_eq!(event.id, "gt-aaaaaa");
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_dropped_events_without_erroring() {
        let bus = ChangeBus::new();
        let mut sub = bus.subscribe();
        for i in 0..(CHANGE_BUS_CAPACITY + 10) {
            bus.publish(sample_event(&format!("gt-{i:06}")));
        }
        // Should still get a live event rather than an error, after skipping the lag.
        let event = sub.recv().await;
        assert!(event.is_some());
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_panic() {
        let bus = ChangeBus::new();
        bus.publish(sample_event("gt-aaaaaa"));
    }
}
