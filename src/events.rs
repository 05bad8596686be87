use crate::error::EventBusError;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Events that can occur in the geotweets application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GeoTweetsEvent {
    /// A partition snapshot was delivered to a subscriber
    FeedUpdated {
        location: String,
        accepted: usize,
        rejected: usize,
        timestamp: SystemTime,
    },
    /// A partition watch was lost
    FeedDisconnected {
        location: String,
        cause: String,
        timestamp: SystemTime,
    },
    /// A post was written to the store
    PostAppended { location: String, key: String },
    /// A post write failed
    AppendFailed { location: String, error: String },
    /// A geo search returned results
    SearchCompleted { count: usize, timestamp: SystemTime },
    /// A geo search could not be completed
    SearchFailed { error: String },
    /// The search API refused the credentials
    AuthFailed { error_type: String },
    /// A shake gesture fired
    GestureTriggered { magnitude: f64, timestamp: SystemTime },
    /// No coordinates are available for a location-based query
    LocationUnavailable { reason: String },
    /// A system error occurred in a component
    SystemError { component: String, error: String },
    /// Shutdown requested
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl GeoTweetsEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            GeoTweetsEvent::FeedUpdated {
                location,
                accepted,
                rejected,
                ..
            } => format!(
                "Feed {} updated: {} posts ({} rejected)",
                location, accepted, rejected
            ),
            GeoTweetsEvent::FeedDisconnected { location, cause, .. } => {
                format!("Feed {} disconnected: {}", location, cause)
            }
            GeoTweetsEvent::PostAppended { location, key } => {
                format!("Post {} appended to {}", key, location)
            }
            GeoTweetsEvent::AppendFailed { location, error } => {
                format!("Append to {} failed: {}", location, error)
            }
            GeoTweetsEvent::SearchCompleted { count, .. } => {
                format!("Search returned {} posts", count)
            }
            GeoTweetsEvent::SearchFailed { error } => format!("Search failed: {}", error),
            GeoTweetsEvent::AuthFailed { error_type } => {
                format!("Authentication failed: {}", error_type)
            }
            GeoTweetsEvent::GestureTriggered { magnitude, .. } => {
                format!("Shake detected with magnitude: {:.2}", magnitude)
            }
            GeoTweetsEvent::LocationUnavailable { reason } => {
                format!("Location unavailable: {}", reason)
            }
            GeoTweetsEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
            GeoTweetsEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering and analytics
    pub fn event_type(&self) -> &'static str {
        match self {
            GeoTweetsEvent::FeedUpdated { .. } => "feed_updated",
            GeoTweetsEvent::FeedDisconnected { .. } => "feed_disconnected",
            GeoTweetsEvent::PostAppended { .. } => "post_appended",
            GeoTweetsEvent::AppendFailed { .. } => "append_failed",
            GeoTweetsEvent::SearchCompleted { .. } => "search_completed",
            GeoTweetsEvent::SearchFailed { .. } => "search_failed",
            GeoTweetsEvent::AuthFailed { .. } => "auth_failed",
            GeoTweetsEvent::GestureTriggered { .. } => "gesture_triggered",
            GeoTweetsEvent::LocationUnavailable { .. } => "location_unavailable",
            GeoTweetsEvent::SystemError { .. } => "system_error",
            GeoTweetsEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Async event bus for component coordination using broadcast channels
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<GeoTweetsEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<GeoTweetsEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers
    pub async fn publish(&self, event: GeoTweetsEvent) -> Result<usize, EventBusError> {
        match &event {
            GeoTweetsEvent::FeedDisconnected { location, cause, .. } => {
                warn!("Feed {} disconnected: {}", location, cause);
            }
            GeoTweetsEvent::SearchFailed { error } => {
                warn!("Search failed: {}", error);
            }
            GeoTweetsEvent::SystemError { component, error } => {
                error!("System error in {}: {}", component, error);
            }
            GeoTweetsEvent::ShutdownRequested { reason, .. } => {
                info!("Shutdown requested: {}", reason);
            }
            _ => debug!("Publishing event: {}", event.description()),
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &GeoTweetsEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
        }
    }
}

/// Event receiver with filtering
pub struct EventReceiver {
    receiver: broadcast::Receiver<GeoTweetsEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    /// Create a new event receiver with a filter
    pub fn new(
        receiver: broadcast::Receiver<GeoTweetsEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event. Lagging skips ahead rather than failing.
    pub async fn recv(&mut self) -> Result<GeoTweetsEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_basic_operations() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let event = GeoTweetsEvent::GestureTriggered {
            magnitude: 6.5,
            timestamp: SystemTime::now(),
        };

        let subscriber_count = event_bus.publish(event).await.unwrap();
        assert_eq!(subscriber_count, 1);

        match receiver.recv().await.unwrap() {
            GeoTweetsEvent::GestureTriggered { magnitude, .. } => assert_eq!(magnitude, 6.5),
            _ => panic!("Unexpected event type"),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_fails() {
        let event_bus = EventBus::new(10);
        let result = event_bus
            .publish(GeoTweetsEvent::SearchCompleted {
                count: 3,
                timestamp: SystemTime::now(),
            })
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let event_bus = EventBus::new(10);
        let filter = EventFilter::EventTypes(vec!["search_completed"]);
        let mut filtered = EventReceiver::new(event_bus.subscribe(), filter, "test".to_string());

        event_bus
            .publish(GeoTweetsEvent::PostAppended {
                location: "Texas".to_string(),
                key: "-abc".to_string(),
            })
            .await
            .unwrap();
        event_bus
            .publish(GeoTweetsEvent::SearchCompleted {
                count: 3,
                timestamp: SystemTime::now(),
            })
            .await
            .unwrap();

        let received = timeout(Duration::from_millis(100), filtered.recv())
            .await
            .unwrap()
            .unwrap();
        match received {
            GeoTweetsEvent::SearchCompleted { count, .. } => assert_eq!(count, 3),
            _ => panic!("Unexpected event type"),
        }
    }

    #[test]
    fn test_event_properties() {
        let event = GeoTweetsEvent::FeedUpdated {
            location: "Texas".to_string(),
            accepted: 4,
            rejected: 1,
            timestamp: SystemTime::now(),
        };

        assert_eq!(event.event_type(), "feed_updated");
        assert!(event.description().contains("4 posts"));
        assert!(EventFilter::All.matches(&event));
    }
}
