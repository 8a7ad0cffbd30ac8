//! Session phase/type observation and time-of-day multiplier inference.
//!
//! Servers run their time-of-day clock at a configurable multiplier that
//! is not on the wire. It is inferred from the delta pattern of the
//! time-of-day field across realtime updates.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::events::EVENT_QUEUE_DEPTH;
use crate::protocol::enums::{SessionKind, SessionPhase};
use crate::protocol::types::SessionUpdate;

/// Weather snapshot derived from a session update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherConditions {
    pub ambient_temp: u8,
    pub track_temp: u8,
    pub clouds: f32,
    pub rain_level: f32,
    pub wetness: f32,
}

impl WeatherConditions {
    pub fn is_dry(&self) -> bool {
        self.wetness < 0.1
    }

    pub fn is_wet(&self) -> bool {
        !self.is_dry()
    }

    pub fn is_raining(&self) -> bool {
        self.rain_level > 0.1
    }

    pub fn needs_wet_tyres(&self) -> bool {
        self.wetness > 0.3 || self.is_raining()
    }

    pub fn description(&self) -> &'static str {
        if self.is_raining() {
            "Raining"
        } else if self.is_wet() {
            "Wet"
        } else if self.clouds > 0.7 {
            "Cloudy"
        } else if self.clouds > 0.3 {
            "Partly Cloudy"
        } else {
            "Clear"
        }
    }
}

/// Digested session state.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub kind: SessionKind,
    pub phase: SessionPhase,
    pub session_index: u16,
    pub time_elapsed: Duration,
    pub time_remaining: Duration,
    pub weather: WeatherConditions,
    pub best_lap_ms: i32,
    pub observed_at: Instant,
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Session
    }

    pub fn is_race(&self) -> bool {
        self.kind == SessionKind::Race
    }

    pub fn is_qualifying(&self) -> bool {
        matches!(self.kind, SessionKind::Qualifying | SessionKind::Superpole)
    }

    pub fn is_practice(&self) -> bool {
        self.kind == SessionKind::Practice
    }

    /// Fraction of the session already run, in [0, 1].
    pub fn progress(&self) -> f32 {
        let total = self.time_elapsed + self.time_remaining;
        if total.is_zero() {
            return 0.0;
        }
        self.time_elapsed.as_secs_f32() / total.as_secs_f32()
    }

    /// "MM:SS", or "H:MM:SS" from one hour up.
    pub fn remaining_display(&self) -> String {
        let total = self.time_remaining.as_secs();
        let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
        if hours > 0 {
            format!("{hours}:{minutes:02}:{seconds:02}")
        } else {
            format!("{minutes:02}:{seconds:02}")
        }
    }
}

/// Watches session updates; detects session changes and infers the
/// time-of-day multiplier.
#[derive(Debug, Default)]
pub struct SessionTracker {
    current: Option<SessionState>,
    previous: Option<SessionState>,
    multiplier: TimeMultiplierEstimator,
    multiplier_subscribers: Vec<mpsc::Sender<u32>>,
}

impl SessionTracker {
    pub fn new() -> Self {
        SessionTracker::default()
    }

    /// Digests one session update. Returns the new time multiplier when
    /// this update changed it.
    pub fn update(&mut self, update: &SessionUpdate) -> Option<u32> {
        let state = SessionState {
            kind: update.session_kind,
            phase: update.phase,
            session_index: update.session_index,
            time_elapsed: update.session_time,
            time_remaining: update.session_end_time.saturating_sub(update.session_time),
            weather: WeatherConditions {
                ambient_temp: update.ambient_temp,
                track_temp: update.track_temp,
                clouds: update.clouds,
                rain_level: update.rain_level,
                wetness: update.wetness,
            },
            best_lap_ms: update.best_session_lap.computed_time_ms(),
            observed_at: Instant::now(),
        };

        self.previous = self.current.take();
        self.current = Some(state);

        let changed = self.multiplier.observe(update.time_of_day);
        if let Some(multiplier) = changed {
            self.multiplier_subscribers.retain(|tx| !tx.is_closed());
            for tx in &self.multiplier_subscribers {
                let _ = tx.try_send(multiplier);
            }
        }
        changed
    }

    pub fn current(&self) -> Option<&SessionState> {
        self.current.as_ref()
    }

    /// Whether the session type or index changed with the last update.
    pub fn session_changed(&self) -> bool {
        match (&self.current, &self.previous) {
            (Some(current), Some(previous)) => {
                current.kind != previous.kind || current.session_index != previous.session_index
            }
            (Some(_), None) => true,
            _ => false,
        }
    }

    pub fn phase_changed(&self) -> bool {
        match (&self.current, &self.previous) {
            (Some(current), Some(previous)) => current.phase != previous.phase,
            (Some(_), None) => true,
            _ => false,
        }
    }

    pub fn time_multiplier(&self) -> Option<u32> {
        self.multiplier.current()
    }

    /// Bounded feed of multiplier changes.
    pub fn subscribe_multiplier(&mut self) -> mpsc::Receiver<u32> {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        self.multiplier_subscribers.push(tx);
        rx
    }

    pub fn reset(&mut self) {
        self.current = None;
        self.previous = None;
        self.multiplier = TimeMultiplierEstimator::default();
    }
}

/// Infers the server's time-of-day multiplier from consecutive deltas.
///
/// The clock field advances a few milliseconds per realtime update; at 1x
/// the step lands on the protocol's 5 ms quantum, so the delta floored to
/// a multiple of 5 and divided by 5 yields the multiplier. Warm-up
/// observations and implausible deltas are discarded.
#[derive(Debug)]
struct TimeMultiplierEstimator {
    multiplier: Option<u32>,
    last_millis: Option<i64>,
    observations: u32,
}

impl Default for TimeMultiplierEstimator {
    fn default() -> Self {
        TimeMultiplierEstimator { multiplier: None, last_millis: None, observations: 0 }
    }
}

impl TimeMultiplierEstimator {
    fn current(&self) -> Option<u32> {
        self.multiplier
    }

    /// Returns the new multiplier when this observation changed it.
    fn observe(&mut self, time_of_day: Duration) -> Option<u32> {
        let millis = time_of_day.as_millis() as i64;
        let last = self.last_millis;

        if last == Some(millis) {
            return None;
        }

        let mut changed = None;
        if let Some(last) = last {
            let delta = millis - last;
            if (1..240_000).contains(&delta) && self.observations > 3 {
                // Floor to the nearest multiple of 5 ms, then scale.
                let floored = (delta / 5) * 5;
                if floored > 0 {
                    let candidate = (floored as f64 / 5.0 + 0.5) as i64;
                    if (1..25).contains(&candidate) {
                        let candidate = candidate as u32;
                        if self.multiplier != Some(candidate) {
                            self.multiplier = Some(candidate);
                            changed = Some(candidate);
                        }
                    }
                }
            }
        }

        self.last_millis = Some(millis);
        self.observations += 1;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_session_update;

    fn update_with_tod(millis: u64) -> SessionUpdate {
        let mut update = sample_session_update();
        update.time_of_day = Duration::from_millis(millis);
        update
    }

    #[test]
    fn digests_session_state() {
        let mut tracker = SessionTracker::new();
        tracker.update(&sample_session_update());

        let state = tracker.current().unwrap();
        assert!(state.is_race());
        assert!(state.is_active());
        assert_eq!(state.time_remaining, Duration::from_secs(3540));
        assert_eq!(state.remaining_display(), "59:00");
        assert!((state.progress() - 1.0 / 60.0).abs() < 1e-4);
        assert!(state.weather.is_wet() || state.weather.is_dry());
    }

    #[test]
    fn session_change_detection() {
        let mut tracker = SessionTracker::new();
        tracker.update(&sample_session_update());
        assert!(tracker.session_changed());

        tracker.update(&sample_session_update());
        assert!(!tracker.session_changed());

        let mut next = sample_session_update();
        next.session_index = 3;
        tracker.update(&next);
        assert!(tracker.session_changed());
    }

    #[test]
    fn weather_classification() {
        let dry = WeatherConditions {
            ambient_temp: 25,
            track_temp: 35,
            clouds: 0.1,
            rain_level: 0.0,
            wetness: 0.0,
        };
        assert!(dry.is_dry());
        assert!(!dry.needs_wet_tyres());
        assert_eq!(dry.description(), "Clear");

        let storm = WeatherConditions { clouds: 0.9, rain_level: 0.6, wetness: 0.8, ..dry };
        assert!(storm.is_raining());
        assert!(storm.needs_wet_tyres());
        assert_eq!(storm.description(), "Raining");
    }

    #[test]
    fn multiplier_inferred_after_warmup() {
        let mut tracker = SessionTracker::new();

        // Four warm-up observations advancing 5 ms of clock per update:
        // no estimate yet.
        for i in 0..4u64 {
            assert_eq!(tracker.update(&update_with_tod(1_000_000 + i * 5)), None);
        }
        assert_eq!(tracker.time_multiplier(), None);

        // The fifth delta is eligible: 5 ms -> 1x.
        let changed = tracker.update(&update_with_tod(1_000_020));
        assert_eq!(changed, Some(1));
        assert_eq!(tracker.time_multiplier(), Some(1));
    }

    #[test]
    fn accelerated_clock_yields_higher_multiplier() {
        let mut tracker = SessionTracker::new();
        // 50 ms of clock per update: 10x.
        for i in 0..6u64 {
            tracker.update(&update_with_tod(1_000_000 + i * 50));
        }
        assert_eq!(tracker.time_multiplier(), Some(10));
    }

    #[test]
    fn implausible_deltas_are_discarded() {
        let mut tracker = SessionTracker::new();
        for i in 0..6u64 {
            tracker.update(&update_with_tod(1_000_000 + i * 5));
        }
        assert_eq!(tracker.time_multiplier(), Some(1));

        // A four-minute jump (session skip) must not disturb the estimate.
        tracker.update(&update_with_tod(10_000_000));
        assert_eq!(tracker.time_multiplier(), Some(1));

        // A delta mapping to a multiplier of 25 or more is rejected too.
        tracker.update(&update_with_tod(10_000_200));
        assert_eq!(tracker.time_multiplier(), Some(1));
    }

    #[test]
    fn change_notifies_exactly_once() {
        let mut tracker = SessionTracker::new();
        let mut rx = tracker.subscribe_multiplier();

        for i in 0..8u64 {
            tracker.update(&update_with_tod(1_000_000 + i * 5));
        }
        assert_eq!(rx.try_recv().unwrap(), 1);
        // Repeated identical inference does not re-notify.
        assert!(rx.try_recv().is_err());
    }
}
