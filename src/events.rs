//! Typed event fan-out for broadcast consumers.
//!
//! Six channels, one per inbound event family. Channels are bounded to
//! [`EVENT_QUEUE_DEPTH`]; when a subscriber falls behind, new events for it
//! are dropped rather than stalling the transport reader. Unsubscribing is
//! dropping the receiver; closed subscribers are pruned on the next
//! publish.

use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::trace;

use crate::protocol::types::{
    BroadcastEvent, CarEntry, CarUpdate, ConnectionState, SessionUpdate, TrackData,
};

/// Queue depth of every subscriber channel.
pub const EVENT_QUEUE_DEPTH: usize = 10;

struct Topic<T> {
    name: &'static str,
    senders: Mutex<Vec<mpsc::Sender<T>>>,
}

impl<T: Clone> Topic<T> {
    fn new(name: &'static str) -> Self {
        Topic { name, senders: Mutex::new(Vec::new()) }
    }

    fn subscribe(&self) -> mpsc::Receiver<T> {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        self.senders.lock().expect("topic poisoned").push(tx);
        rx
    }

    fn publish(&self, value: &T) {
        let mut senders = self.senders.lock().expect("topic poisoned");
        senders.retain(|tx| !tx.is_closed());
        for tx in senders.iter() {
            if tx.try_send(value.clone()).is_err() {
                trace!(topic = self.name, "slow subscriber, event dropped");
            }
        }
    }

    fn subscriber_count(&self) -> usize {
        let mut senders = self.senders.lock().expect("topic poisoned");
        senders.retain(|tx| !tx.is_closed());
        senders.len()
    }
}

/// Process-wide subscription service for broadcast events.
pub struct EventBus {
    connection: Topic<ConnectionState>,
    track: Topic<TrackData>,
    entries: Topic<CarEntry>,
    sessions: Topic<SessionUpdate>,
    cars: Topic<CarUpdate>,
    events: Topic<BroadcastEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        EventBus::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        EventBus {
            connection: Topic::new("connection-state"),
            track: Topic::new("track-data"),
            entries: Topic::new("entry-list-car"),
            sessions: Topic::new("realtime-update"),
            cars: Topic::new("realtime-car-update"),
            events: Topic::new("broadcasting-event"),
        }
    }

    pub fn subscribe_connection_state(&self) -> mpsc::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    pub fn subscribe_track_data(&self) -> mpsc::Receiver<TrackData> {
        self.track.subscribe()
    }

    pub fn subscribe_car_entries(&self) -> mpsc::Receiver<CarEntry> {
        self.entries.subscribe()
    }

    pub fn subscribe_session_updates(&self) -> mpsc::Receiver<SessionUpdate> {
        self.sessions.subscribe()
    }

    pub fn subscribe_car_updates(&self) -> mpsc::Receiver<CarUpdate> {
        self.cars.subscribe()
    }

    pub fn subscribe_events(&self) -> mpsc::Receiver<BroadcastEvent> {
        self.events.subscribe()
    }

    pub(crate) fn publish_connection_state(&self, state: &ConnectionState) {
        self.connection.publish(state);
    }

    pub(crate) fn publish_track_data(&self, track: &TrackData) {
        self.track.publish(track);
    }

    pub(crate) fn publish_car_entry(&self, entry: &CarEntry) {
        self.entries.publish(entry);
    }

    pub(crate) fn publish_session_update(&self, update: &SessionUpdate) {
        self.sessions.publish(update);
    }

    pub(crate) fn publish_car_update(&self, update: &CarUpdate) {
        self.cars.publish(update);
    }

    pub(crate) fn publish_event(&self, event: &BroadcastEvent) {
        self.events.publish(event);
    }

    /// Live subscriber count across all topics, after pruning.
    pub fn subscriber_count(&self) -> usize {
        self.connection.subscriber_count()
            + self.track.subscriber_count()
            + self.entries.subscriber_count()
            + self.sessions.subscriber_count()
            + self.cars.subscriber_count()
            + self.events.subscriber_count()
    }
}
