//! Live update channel: per-entity analysis updates pushed to connected viewers.
//!
//! Orchestrators publish through [`LivePublisher`]; the production
//! implementation is [`LiveHub`], a broadcast channel drained by websocket
//! subscribers (see [`ws`]). Publishing is synchronous, so the order in which
//! a task publishes is the order subscribers receive.

pub mod ws;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

const HUB_CAPACITY: usize = 256;

/// Entity types that own a live analysis channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Cv,
    JobOffer,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Cv => "cv",
            EntityKind::JobOffer => "job_offer",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `"{entity_type}_analysis_{id}"`
pub fn channel_name(kind: EntityKind, id: Uuid) -> String {
    format!("{}_analysis_{}", kind.as_str(), id)
}

/// Which region of the viewer an update replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveTarget {
    /// The in-progress streaming area.
    AnalysisStream,
    /// The analysis panel itself (final result or error).
    Analysis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LivePayload {
    /// Partial progress: leftover narrative text plus the structured fields so far.
    Stream {
        raw_content: Option<String>,
        analysis: Value,
    },
    /// The complete, final rendering of the entity's analysis.
    Panel { panel: Value },
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveUpdate {
    pub channel: String,
    pub target: LiveTarget,
    pub payload: LivePayload,
}

impl LiveUpdate {
    pub fn stream(channel: &str, raw_content: Option<String>, analysis: Value) -> Self {
        LiveUpdate {
            channel: channel.to_string(),
            target: LiveTarget::AnalysisStream,
            payload: LivePayload::Stream {
                raw_content,
                analysis,
            },
        }
    }

    pub fn panel(channel: &str, panel: Value) -> Self {
        LiveUpdate {
            channel: channel.to_string(),
            target: LiveTarget::Analysis,
            payload: LivePayload::Panel { panel },
        }
    }

    pub fn error(channel: &str, message: impl Into<String>) -> Self {
        LiveUpdate {
            channel: channel.to_string(),
            target: LiveTarget::Analysis,
            payload: LivePayload::Error {
                message: message.into(),
            },
        }
    }
}

/// Sink for live updates. Implementations must not block.
pub trait LivePublisher: Send + Sync {
    fn publish(&self, update: LiveUpdate);
}

/// In-process fan-out of live updates to websocket subscribers.
#[derive(Clone)]
pub struct LiveHub {
    sender: broadcast::Sender<LiveUpdate>,
}

impl LiveHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(HUB_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveUpdate> {
        self.sender.subscribe()
    }

    /// Number of open subscriptions, one per connected live socket.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for LiveHub {
    fn default() -> Self {
        Self::new()
    }
}

impl LivePublisher for LiveHub {
    fn publish(&self, update: LiveUpdate) {
        // No subscribers is normal: nobody has the page open.
        if let Err(broadcast::error::SendError(update)) = self.sender.send(update) {
            trace!(channel = %update.channel, "No live subscribers for update");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_channel_name_format() {
        let id = Uuid::nil();
        assert_eq!(
            channel_name(EntityKind::Cv, id),
            "cv_analysis_00000000-0000-0000-0000-000000000000"
        );
        assert!(channel_name(EntityKind::JobOffer, id).starts_with("job_offer_analysis_"));
    }

    #[test]
    fn test_update_targets() {
        assert_eq!(
            LiveUpdate::stream("c", None, json!({})).target,
            LiveTarget::AnalysisStream
        );
        assert_eq!(LiveUpdate::panel("c", json!({})).target, LiveTarget::Analysis);
        assert_eq!(LiveUpdate::error("c", "boom").target, LiveTarget::Analysis);
    }

    #[test]
    fn test_update_wire_shape() {
        let value = serde_json::to_value(LiveUpdate::error("cv_analysis_1", "boom")).unwrap();
        assert_eq!(value["target"], "analysis");
        assert_eq!(value["payload"]["type"], "error");
        assert_eq!(value["payload"]["message"], "boom");
    }

    #[tokio::test]
    async fn test_hub_delivers_in_publish_order() {
        let hub = LiveHub::new();
        let mut rx = hub.subscribe();

        hub.publish(LiveUpdate::stream("c", Some("one".into()), json!({})));
        hub.publish(LiveUpdate::panel("c", json!({"done": true})));

        assert_eq!(rx.recv().await.unwrap().target, LiveTarget::AnalysisStream);
        assert_eq!(rx.recv().await.unwrap().target, LiveTarget::Analysis);
    }

    #[test]
    fn test_hub_publish_without_subscribers_is_fine() {
        LiveHub::new().publish(LiveUpdate::error("c", "nobody listening"));
    }
}
