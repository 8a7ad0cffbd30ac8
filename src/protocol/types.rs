//! Message payload types decoded from the broadcast wire.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::enums::{
    CarLocation, CupCategory, DriverCategory, EventKind, LapKind, Nationality, SessionKind,
    SessionPhase,
};

/// Result of a registration attempt, decoded from message type 1.
///
/// This is a value, not an entity: the engine derives its own connection id
/// from the most recent one received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionState {
    pub connection_id: i32,
    pub success: bool,
    pub read_only: bool,
    pub error_message: String,
}

/// One driver of a car's roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Driver {
    pub first_name: String,
    pub last_name: String,
    pub short_name: String,
    pub category: DriverCategory,
    pub nationality: Nationality,
}

impl Driver {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Static per-car descriptor from the entry list (message type 6).
///
/// Created as a placeholder on the entry-list message, completed by the
/// per-car message, destroyed only on a full entry-list refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarEntry {
    pub car_index: u16,
    pub model: u8,
    pub team_name: String,
    pub race_number: i32,
    pub cup_category: CupCategory,
    pub current_driver_index: u8,
    pub nationality: Nationality,
    pub drivers: Vec<Driver>,
}

impl CarEntry {
    /// Placeholder produced by the entry-list message before the per-car
    /// details arrive.
    pub fn placeholder(car_index: u16) -> Self {
        CarEntry {
            car_index,
            model: 0,
            team_name: String::new(),
            race_number: 0,
            cup_category: CupCategory::Overall,
            current_driver_index: 0,
            nationality: Nationality::default(),
            drivers: Vec::new(),
        }
    }

    pub fn current_driver(&self) -> Option<&Driver> {
        self.drivers.get(self.current_driver_index as usize)
    }

    /// Display name of the current driver, preferring the short name.
    pub fn current_driver_name(&self) -> String {
        match self.current_driver() {
            Some(d) if !d.short_name.is_empty() => d.short_name.clone(),
            Some(d) => d.full_name(),
            None => String::new(),
        }
    }
}

/// A single lap as carried inside realtime updates.
///
/// `time_ms` is absent when the server sent the `i32::MAX` sentinel. The
/// server's reported total is not always trustworthy; consumers should
/// prefer [`LapRecord::computed_time_ms`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LapRecord {
    pub time_ms: Option<i32>,
    pub splits: [Option<i32>; 3],
    pub car_index: u16,
    pub driver_index: u16,
    pub invalid: bool,
    pub valid_for_best: bool,
    pub kind: LapKind,
}

impl LapRecord {
    /// Lap time as the sum of the present splits.
    pub fn computed_time_ms(&self) -> i32 {
        self.splits.iter().flatten().sum()
    }

    /// Whether the server reported a concrete (non-sentinel) total.
    pub fn has_time(&self) -> bool {
        self.time_ms.is_some()
    }
}

impl Default for LapRecord {
    fn default() -> Self {
        LapRecord {
            time_ms: None,
            splits: [None; 3],
            car_index: 0,
            driver_index: 0,
            invalid: false,
            valid_for_best: false,
            kind: LapKind::Regular,
        }
    }
}

/// Session-wide realtime update (message type 2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUpdate {
    pub event_index: u16,
    pub session_index: u16,
    pub session_kind: SessionKind,
    pub phase: SessionPhase,
    pub session_time: Duration,
    pub session_end_time: Duration,
    pub focused_car_index: i32,
    pub active_camera_set: String,
    pub active_camera: String,
    pub current_hud_page: String,
    pub replay_playing: bool,
    pub replay_session_time: f32,
    pub replay_remaining_time: f32,
    /// Opaque time-of-day clock; rounding near 24 h is undefined by the
    /// protocol.
    pub time_of_day: Duration,
    pub ambient_temp: u8,
    pub track_temp: u8,
    pub clouds: f32,
    pub rain_level: f32,
    pub wetness: f32,
    pub best_session_lap: LapRecord,
}

/// Per-car realtime update (message type 3). Ephemeral, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarUpdate {
    pub car_index: u16,
    pub driver_index: u16,
    pub driver_count: u8,
    /// Signed gear: -1 = reverse, 0 = neutral, 1+ = forward gears.
    pub gear: i8,
    pub world_pos_x: f32,
    pub world_pos_y: f32,
    pub heading: f32,
    pub location: CarLocation,
    pub speed_kmh: u16,
    /// Official position, 1-based.
    pub position: u16,
    pub cup_position: u16,
    pub track_position: u16,
    /// Normalized position along the track spline in [0, 1).
    pub spline_position: f32,
    pub laps: u16,
    /// Delta to the session best in milliseconds.
    pub delta_ms: i32,
    pub best_session_lap: LapRecord,
    pub last_lap: LapRecord,
    pub current_lap: LapRecord,
}

/// Track description (message type 5).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackData {
    pub name: String,
    pub id: i32,
    pub length_m: i32,
    pub camera_sets: HashMap<String, Vec<String>>,
    pub hud_pages: Vec<String>,
}

/// Broadcasting event (message type 7), with the cached entry attached
/// when the car is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastEvent {
    pub kind: EventKind,
    pub message: String,
    pub time_ms: i32,
    pub car_id: i32,
    pub car: Option<CarEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computed_time_prefers_split_sum() {
        let lap = LapRecord {
            time_ms: Some(90_000),
            splits: [Some(30_000), Some(30_500), Some(29_000)],
            ..LapRecord::default()
        };
        assert_eq!(lap.computed_time_ms(), 89_500);
    }

    #[test]
    fn computed_time_skips_absent_splits() {
        let lap = LapRecord { splits: [Some(30_000), None, None], ..LapRecord::default() };
        assert_eq!(lap.computed_time_ms(), 30_000);
    }

    #[test]
    fn current_driver_name_prefers_short_name() {
        let mut entry = CarEntry::placeholder(3);
        entry.drivers.push(Driver {
            first_name: "John".into(),
            last_name: "Doe".into(),
            short_name: "JDO".into(),
            category: DriverCategory::Silver,
            nationality: Nationality(17),
        });
        assert_eq!(entry.current_driver_name(), "JDO");

        entry.drivers[0].short_name.clear();
        assert_eq!(entry.current_driver_name(), "John Doe");
    }

    #[test]
    fn current_driver_out_of_range_is_none() {
        let mut entry = CarEntry::placeholder(3);
        entry.current_driver_index = 2;
        assert!(entry.current_driver().is_none());
        assert_eq!(entry.current_driver_name(), "");
    }
}
