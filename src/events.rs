use crate::postprocess::PresentationModel;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Events crossing the boundary to the UI collaborator and between pipeline
/// components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    /// A symbol was decoded and post-processed.
    DecodeSucceeded {
        model: PresentationModel,
        timestamp: SystemTime,
    },
    /// A frame went through a decode attempt without a result; used by the
    /// viewfinder for redraw pacing.
    FrameProcessed {
        frame_id: u64,
        timestamp: SystemTime,
    },
    /// A frame was rejected before decoding (bad dimensions or buffer).
    FrameRejected { frame_id: u64, reason: String },
    /// The ambient light manager recommends toggling assist illumination.
    TorchRecommendation { on: bool },
    /// A component error occurred.
    SessionError { component: String, error: String },
    /// Idle timeout elapsed; the session should shut down.
    ShutdownRequested { reason: String },
}

impl ScanEvent {
    /// Event type as a string for filtering.
    pub fn event_type(&self) -> &'static str {
        match self {
            ScanEvent::DecodeSucceeded { .. } => "decode_succeeded",
            ScanEvent::FrameProcessed { .. } => "frame_processed",
            ScanEvent::FrameRejected { .. } => "frame_rejected",
            ScanEvent::TorchRecommendation { .. } => "torch_recommendation",
            ScanEvent::SessionError { .. } => "session_error",
            ScanEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }

    /// Human-readable description for logs.
    pub fn description(&self) -> String {
        match self {
            ScanEvent::DecodeSucceeded { model, .. } => {
                format!("Decoded {} symbol: {}", model.format, model.status_line)
            }
            ScanEvent::FrameProcessed { frame_id, .. } => {
                format!("Frame {} processed", frame_id)
            }
            ScanEvent::FrameRejected { frame_id, reason } => {
                format!("Frame {} rejected: {}", frame_id, reason)
            }
            ScanEvent::TorchRecommendation { on } => {
                format!("Torch recommendation: {}", if *on { "on" } else { "off" })
            }
            ScanEvent::SessionError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
            ScanEvent::ShutdownRequested { reason } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }
}

/// Async event bus over a broadcast channel.
pub struct EventBus {
    sender: broadcast::Sender<ScanEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers. Publishing with no subscribers is
    /// not an error; events are advisory.
    pub fn publish(&self, event: ScanEvent) -> usize {
        match &event {
            ScanEvent::DecodeSucceeded { model, .. } => {
                info!("Decode succeeded: {} ({})", model.status_line, model.format);
            }
            ScanEvent::SessionError { component, error } => {
                error!("Session error in {}: {}", component, error);
            }
            ScanEvent::ShutdownRequested { reason } => {
                info!("Shutdown requested: {}", reason);
            }
            ScanEvent::FrameRejected { frame_id, reason } => {
                warn!("Frame {} rejected: {}", frame_id, reason);
            }
            _ => {
                debug!("Event: {}", event.description());
            }
        }
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Event filter for selective event handling.
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events.
    All,
    /// Accept only specific event types.
    EventTypes(Vec<&'static str>),
}

impl EventFilter {
    pub fn matches(&self, event: &ScanEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
        }
    }
}

/// Filtering wrapper around a broadcast receiver.
pub struct EventReceiver {
    receiver: broadcast::Receiver<ScanEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    pub fn new(
        receiver: broadcast::Receiver<ScanEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next event passing the filter. Lagged events are skipped
    /// with a warning; `None` means the bus is closed.
    pub async fn recv(&mut self) -> Option<ScanEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Event receiver '{}' lagged, skipped {}", self.name, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut receiver = bus.subscribe();
        bus.publish(ScanEvent::FrameProcessed {
            frame_id: 42,
            timestamp: SystemTime::now(),
        });
        match receiver.recv().await.unwrap() {
            ScanEvent::FrameProcessed { frame_id, .. } => assert_eq!(frame_id, 42),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let bus = EventBus::new(16);
        assert_eq!(
            bus.publish(ScanEvent::ShutdownRequested {
                reason: "test".to_string()
            }),
            0
        );
    }

    #[tokio::test]
    async fn test_filtered_receiver_skips_other_types() {
        let bus = EventBus::new(16);
        let mut receiver = EventReceiver::new(
            bus.subscribe(),
            EventFilter::EventTypes(vec!["shutdown_requested"]),
            "test".to_string(),
        );
        bus.publish(ScanEvent::FrameProcessed {
            frame_id: 1,
            timestamp: SystemTime::now(),
        });
        bus.publish(ScanEvent::ShutdownRequested {
            reason: "idle".to_string(),
        });
        match receiver.recv().await.unwrap() {
            ScanEvent::ShutdownRequested { reason } => assert_eq!(reason, "idle"),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
