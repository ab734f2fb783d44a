// Copyright (c) 2026 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Publish-only event bus. The only consumer in scope here is the future
//! WebSocket hub, which lives outside this crate; publishers must never
//! block on delivery and lost events are acceptable (spec.md §4.6).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    #[serde(rename = "job.new")]
    JobNew,
    #[serde(rename = "job.claimed")]
    JobClaimed,
    #[serde(rename = "job.completed")]
    JobCompleted,
    #[serde(rename = "job.paid")]
    JobPaid,
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event_type: EventType, data: serde_json::Value);
}

/// Bounded, drop-oldest channel. A slow or absent subscriber never
/// back-pressures the Job Service: `broadcast::Sender::send` only fails
/// when there are zero receivers, which is the normal case in tests and is
/// treated as a no-op, not an error.
pub struct BroadcastEventBus {
    sender: broadcast::Sender<Event>,
}

impl BroadcastEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl EventBus for BroadcastEventBus {
    async fn publish(&self, event_type: EventType, data: serde_json::Value) {
        let event = Event {
            event_type,
            data,
            timestamp: Utc::now(),
        };
        if let Err(err) = self.sender.send(event) {
            warn!(?err, "no event subscribers, dropping event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_without_subscribers_does_not_panic() {
        let bus = BroadcastEventBus::default();
        bus.publish(EventType::JobNew, serde_json::json!({"jobId": "job_deadbeef"}))
            .await;
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = BroadcastEventBus::default();
        let mut rx = bus.subscribe();
        bus.publish(EventType::JobClaimed, serde_json::json!({"jobId": "job_deadbeef"}))
            .await;
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, EventType::JobClaimed);
    }
}
