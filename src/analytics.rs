use crate::events::{EventBus, EventFilter, EventReceiver, GeoTweetsEvent};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Counters for events seen on the bus
#[derive(Debug, Default, Clone)]
pub struct EventMetrics {
    pub total_events: u64,
    pub events_by_type: HashMap<&'static str, u64>,
    pub errors: u64,
    pub last_event_time: Option<SystemTime>,
}

impl EventMetrics {
    pub fn record_event(&mut self, event: &GeoTweetsEvent) {
        self.total_events += 1;
        *self.events_by_type.entry(event.event_type()).or_insert(0) += 1;
        self.last_event_time = Some(SystemTime::now());

        if matches!(
            event,
            GeoTweetsEvent::AppendFailed { .. }
                | GeoTweetsEvent::SearchFailed { .. }
                | GeoTweetsEvent::AuthFailed { .. }
                | GeoTweetsEvent::SystemError { .. }
        ) {
            self.errors += 1;
        }
    }

    pub fn count(&self, event_type: &str) -> u64 {
        self.events_by_type.get(event_type).copied().unwrap_or(0)
    }

    pub fn reset(&mut self) {
        self.total_events = 0;
        self.events_by_type.clear();
        self.errors = 0;
        self.last_event_time = None;
    }
}

/// Records every bus event by name and logs it
#[derive(Clone)]
pub struct AnalyticsRecorder {
    metrics: Arc<Mutex<EventMetrics>>,
}

impl AnalyticsRecorder {
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(Mutex::new(EventMetrics::default())),
        }
    }

    /// Consume events from `event_bus` until cancelled or the bus closes
    pub fn spawn(
        &self,
        event_bus: &EventBus,
        cancellation_token: CancellationToken,
    ) -> JoinHandle<()> {
        let mut receiver = EventReceiver::new(
            event_bus.subscribe(),
            EventFilter::All,
            "analytics".to_string(),
        );
        let recorder = self.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancellation_token.cancelled() => break,
                    event = receiver.recv() => match event {
                        Ok(event) => recorder.record(&event),
                        Err(_) => break,
                    }
                }
            }
            debug!("Analytics recorder stopped");
        })
    }

    pub fn record(&self, event: &GeoTweetsEvent) {
        debug!(event = event.event_type(), "{}", event.description());
        self.metrics.lock().record_event(event);
    }

    pub fn snapshot(&self) -> EventMetrics {
        self.metrics.lock().clone()
    }

    pub fn log_summary(&self) {
        let metrics = self.metrics.lock();
        info!("Event summary:");
        info!("  Total events: {}", metrics.total_events);
        info!("  Errors: {}", metrics.errors);

        let mut by_type: Vec<_> = metrics.events_by_type.iter().collect();
        by_type.sort();
        for (event_type, count) in by_type {
            info!("  {}: {}", event_type, count);
        }
    }
}

impl Default for AnalyticsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, Duration};

    #[test]
    fn test_metrics_count_by_type() {
        let mut metrics = EventMetrics::default();
        metrics.record_event(&GeoTweetsEvent::SearchCompleted {
            count: 2,
            timestamp: SystemTime::now(),
        });
        metrics.record_event(&GeoTweetsEvent::SearchFailed {
            error: "timeout".to_string(),
        });
        metrics.record_event(&GeoTweetsEvent::SearchCompleted {
            count: 0,
            timestamp: SystemTime::now(),
        });

        assert_eq!(metrics.total_events, 3);
        assert_eq!(metrics.count("search_completed"), 2);
        assert_eq!(metrics.count("search_failed"), 1);
        assert_eq!(metrics.count("gesture_triggered"), 0);
        assert_eq!(metrics.errors, 1);

        metrics.reset();
        assert_eq!(metrics.total_events, 0);
        assert!(metrics.last_event_time.is_none());
    }

    #[tokio::test]
    async fn test_recorder_consumes_bus_events() {
        let bus = EventBus::new(16);
        let recorder = AnalyticsRecorder::new();
        let token = CancellationToken::new();
        let handle = recorder.spawn(&bus, token.clone());

        bus.publish(GeoTweetsEvent::PostAppended {
            location: "Ohio".to_string(),
            key: "-k1".to_string(),
        })
        .await
        .unwrap();
        bus.publish(GeoTweetsEvent::GestureTriggered {
            magnitude: 4.0,
            timestamp: SystemTime::now(),
        })
        .await
        .unwrap();

        for _ in 0..50 {
            if recorder.snapshot().total_events == 2 {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }

        let metrics = recorder.snapshot();
        assert_eq!(metrics.count("post_appended"), 1);
        assert_eq!(metrics.count("gesture_triggered"), 1);

        token.cancel();
        handle.await.unwrap();
    }
}
