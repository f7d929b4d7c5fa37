use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::timer::SessionType;

/// Every observable state change in the engines produces an Event.
/// UI consumers subscribe through [`EventBus::subscribe`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Timer started, paused, reset or ended.
    TimerStateChanged {
        is_running: bool,
        session_type: SessionType,
        at: DateTime<Utc>,
    },
    TimerTicked {
        time_left_secs: u64,
        progress: f64,
    },
    SessionEnded {
        session_type: SessionType,
        actual_duration_min: u64,
        completed: bool,
        at: DateTime<Utc>,
    },
    /// Volume or play state of one track changed.
    TrackChanged {
        key: String,
        volume: u8,
        is_playing: bool,
    },
    /// A track's source failed to load; its toggle is disabled.
    TrackUnavailable {
        key: String,
    },
    MixerChanged {
        master_volume: u8,
        muted: bool,
    },
    CatalogLoaded {
        track_keys: Vec<String>,
        from_fallback: bool,
    },
    PresetLoaded {
        name: String,
    },
}

/// Fan-out channel between the engines and their UI consumers.
///
/// Cloning the bus clones the sender; every clone publishes to the same
/// subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn emit(&self, event: Event) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain everything currently queued on a receiver without blocking.
pub fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => out.push(event),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event subscriber lagged");
            }
            Err(_) => break,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.emit(Event::PresetLoaded { name: "rain".into() });
    }

    #[test]
    fn subscribers_see_events_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.emit(Event::MixerChanged { master_volume: 40, muted: false });
        bus.clone().emit(Event::TrackUnavailable { key: "fire".into() });

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Event::MixerChanged { master_volume: 40, .. }));
        assert!(matches!(events[1], Event::TrackUnavailable { .. }));
    }

    #[test]
    fn state_changed_serializes_with_type_tag() {
        let event = Event::TimerStateChanged {
            is_running: true,
            session_type: SessionType::Focus,
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "TimerStateChanged");
        assert_eq!(json["is_running"], true);
        assert_eq!(json["session_type"], "focus");
    }
}
