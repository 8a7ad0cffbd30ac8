//! Incident correlation against a short position history.
//!
//! Incident events arrive from the server about five seconds after the
//! fact, so the car's position at the event time is reconstructed from a
//! sliding window of realtime car samples keyed by session time.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use tracing::debug;

use crate::events::EVENT_QUEUE_DEPTH;
use crate::protocol::types::{BroadcastEvent, CarEntry, CarUpdate};

/// Server-side delay between an incident and its broadcast event.
pub const EVENT_DELAY: Duration = Duration::from_secs(5);

/// How much sample history is retained.
pub const HISTORY_RETENTION: Duration = Duration::from_secs(20);

/// Kinds of recorded incidents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncidentKind {
    Accident,
    Collision,
    OffTrack,
    Cutting,
}

/// A correlated incident.
#[derive(Debug, Clone)]
pub struct Incident {
    pub kind: IncidentKind,
    /// Wall clock at correlation time.
    pub at: SystemTime,
    /// Session time of the incident itself, delay-corrected.
    pub session_time: Duration,
    pub car_index: u16,
    /// Driver name snapshot; rosters can change later.
    pub driver_name: String,
    pub race_number: i32,
    /// Coarse track location label from the spline bucket.
    pub location: &'static str,
    pub severity: u8,
    pub message: String,
}

/// Sliding-window history plus the incident log.
#[derive(Debug, Default)]
pub struct IncidentLog {
    /// session-time ms -> car index -> last sample at that time.
    history: BTreeMap<i64, HashMap<u16, CarUpdate>>,
    incidents: Vec<Incident>,
    current_session_time: Duration,
    subscribers: Vec<mpsc::Sender<Incident>>,
}

impl IncidentLog {
    pub fn new() -> Self {
        IncidentLog::default()
    }

    /// Bounded incident feed; a slow consumer misses incidents rather
    /// than blocking correlation.
    pub fn subscribe(&mut self) -> mpsc::Receiver<Incident> {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        self.subscribers.push(tx);
        rx
    }

    /// Records a realtime sample under the current session time.
    pub fn record_sample(&mut self, update: &CarUpdate, session_time: Duration) {
        self.current_session_time = session_time;

        let key = session_time.as_millis() as i64;
        if key == 0 {
            // Session not started yet.
            return;
        }

        self.history.entry(key).or_default().insert(update.car_index, update.clone());

        // Retention is anchored to the newest key.
        let cutoff = key - HISTORY_RETENTION.as_millis() as i64;
        self.history.retain(|&at, _| at >= cutoff);
    }

    /// Correlates an incident event to the car's position at the
    /// corrected session time. Events for cars without history are
    /// dropped.
    pub fn handle_event(&mut self, event: &BroadcastEvent, entry: Option<&CarEntry>) {
        let Some(entry) = entry else {
            debug!(car_id = event.car_id, "incident for unknown car dropped");
            return;
        };

        let corrected = self.current_session_time.saturating_sub(EVENT_DELAY);
        let corrected_ms = corrected.as_millis() as i64;

        // Nearest history key at or before the corrected moment.
        let Some((&key, samples)) = self.history.range(..=corrected_ms).next_back() else {
            debug!(car_id = event.car_id, "no history at incident time, dropped");
            return;
        };

        let Some(sample) = samples.get(&(event.car_id as u16)) else {
            debug!(car_id = event.car_id, "car missing from history, incident dropped");
            return;
        };

        let incident = Incident {
            kind: IncidentKind::Accident,
            at: SystemTime::now(),
            session_time: Duration::from_millis(key as u64),
            car_index: event.car_id as u16,
            driver_name: entry.current_driver_name(),
            race_number: entry.race_number,
            location: location_label(sample.spline_position),
            severity: 1,
            message: event.message.clone(),
        };

        self.incidents.push(incident.clone());

        // The log write is complete; subscribers may consume concurrently.
        self.subscribers.retain(|tx| !tx.is_closed());
        for tx in &self.subscribers {
            let _ = tx.try_send(incident.clone());
        }
    }

    pub fn incidents(&self) -> &[Incident] {
        &self.incidents
    }

    pub fn count(&self) -> usize {
        self.incidents.len()
    }

    /// Incidents correlated within the last `window` of wall time.
    pub fn recent(&self, window: Duration) -> Vec<Incident> {
        let cutoff = SystemTime::now().checked_sub(window);
        self.incidents
            .iter()
            .filter(|incident| cutoff.map_or(true, |c| incident.at >= c))
            .cloned()
            .collect()
    }

    /// Oldest and newest history keys, for retention checks.
    pub fn history_span_ms(&self) -> Option<(i64, i64)> {
        let oldest = self.history.keys().next()?;
        let newest = self.history.keys().next_back()?;
        Some((*oldest, *newest))
    }

    pub fn clear(&mut self) {
        self.incidents.clear();
        self.history.clear();
        self.current_session_time = Duration::ZERO;
    }
}

/// Coarse location from the spline position bucket.
fn location_label(spline: f32) -> &'static str {
    let percent = (spline * 100.0) as i32;
    if percent < 10 {
        "Start/Finish"
    } else if percent < 30 {
        "S1"
    } else if percent < 60 {
        "S2"
    } else if percent < 90 {
        "S3"
    } else {
        "Final"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::enums::EventKind;
    use crate::test_utils::{sample_car_update, sample_entry};

    fn accident(car_id: i32) -> BroadcastEvent {
        BroadcastEvent {
            kind: EventKind::Accident,
            message: "Contact".into(),
            time_ms: 20_000,
            car_id,
            car: None,
        }
    }

    #[test]
    fn correlates_to_position_at_corrected_time() {
        let mut log = IncidentLog::new();

        let mut sample = sample_car_update(7, 1);
        sample.spline_position = 0.42;
        log.record_sample(&sample, Duration::from_millis(15_000));
        // The event arrives five seconds later.
        log.record_sample(&sample_car_update(9, 1), Duration::from_millis(20_000));

        log.handle_event(&accident(7), Some(&sample_entry(7)));

        assert_eq!(log.count(), 1);
        let incident = &log.incidents()[0];
        assert_eq!(incident.session_time, Duration::from_millis(15_000));
        assert_eq!(incident.location, "S2");
        assert_eq!(incident.car_index, 7);
        assert_eq!(incident.driver_name, "JDO");
        assert_eq!(incident.message, "Contact");
    }

    #[test]
    fn event_without_entry_is_dropped() {
        let mut log = IncidentLog::new();
        log.record_sample(&sample_car_update(7, 1), Duration::from_millis(15_000));
        log.record_sample(&sample_car_update(7, 1), Duration::from_millis(20_000));

        log.handle_event(&accident(7), None);
        assert_eq!(log.count(), 0);
    }

    #[test]
    fn event_without_history_is_dropped() {
        let mut log = IncidentLog::new();
        // Only fresh history, nothing at or before the corrected time.
        log.record_sample(&sample_car_update(7, 1), Duration::from_millis(30_000));
        log.current_session_time = Duration::from_millis(4_000);

        log.handle_event(&accident(7), Some(&sample_entry(7)));
        assert_eq!(log.count(), 0);
    }

    #[test]
    fn car_absent_at_corrected_time_is_dropped() {
        let mut log = IncidentLog::new();
        log.record_sample(&sample_car_update(9, 1), Duration::from_millis(15_000));
        log.record_sample(&sample_car_update(9, 1), Duration::from_millis(20_000));

        log.handle_event(&accident(7), Some(&sample_entry(7)));
        assert_eq!(log.count(), 0);
    }

    #[test]
    fn zero_session_time_is_not_recorded() {
        let mut log = IncidentLog::new();
        log.record_sample(&sample_car_update(7, 1), Duration::ZERO);
        assert!(log.history_span_ms().is_none());
    }

    #[test]
    fn history_retention_bound() {
        let mut log = IncidentLog::new();
        for second in 1..=60 {
            log.record_sample(
                &sample_car_update(7, 1),
                Duration::from_secs(second),
            );
            let (oldest, newest) = log.history_span_ms().unwrap();
            assert!(newest - oldest <= HISTORY_RETENTION.as_millis() as i64);
        }
    }

    #[test]
    fn location_buckets() {
        assert_eq!(location_label(0.05), "Start/Finish");
        assert_eq!(location_label(0.15), "S1");
        assert_eq!(location_label(0.42), "S2");
        assert_eq!(location_label(0.75), "S3");
        assert_eq!(location_label(0.95), "Final");
    }

    #[tokio::test]
    async fn subscribers_receive_incidents() {
        let mut log = IncidentLog::new();
        let mut rx = log.subscribe();

        let mut sample = sample_car_update(7, 1);
        sample.spline_position = 0.95;
        log.record_sample(&sample, Duration::from_millis(15_000));
        log.record_sample(&sample, Duration::from_millis(20_000));
        log.handle_event(&accident(7), Some(&sample_entry(7)));

        let incident = rx.recv().await.unwrap();
        assert_eq!(incident.location, "Final");
    }
}
