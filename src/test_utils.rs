//! Frame builders for tests and benchmarks.
//!
//! These synthesize well-formed inbound datagrams the same way the
//! simulator would emit them, so protocol tests never hand-count byte
//! offsets.

use crate::protocol::codec::ByteWriter;
use crate::protocol::enums::{CarLocation, CupCategory, DriverCategory, Nationality, SessionKind};
use crate::protocol::messages::InboundMessage;
use crate::protocol::types::{CarEntry, CarUpdate, Driver, LapRecord, SessionUpdate, TrackData};

fn framed(message: InboundMessage) -> ByteWriter {
    let mut w = ByteWriter::new();
    w.write_u8(message as u8);
    w
}

/// Registration result (type 1). `readonly_byte` is the raw wire byte:
/// zero means read-only.
pub fn registration_result_frame(
    connection_id: i32,
    success: bool,
    readonly_byte: u8,
    error: &str,
) -> Vec<u8> {
    let mut w = framed(InboundMessage::RegistrationResult);
    w.write_i32(connection_id);
    w.write_bool(success);
    w.write_u8(readonly_byte);
    w.write_string(error).expect("error message fits");
    w.into_inner()
}

/// Entry list (type 4).
pub fn entry_list_frame(connection_id: i32, car_indices: &[u16]) -> Vec<u8> {
    let mut w = framed(InboundMessage::EntryList);
    w.write_i32(connection_id);
    w.write_u16(car_indices.len() as u16);
    for &index in car_indices {
        w.write_u16(index);
    }
    w.into_inner()
}

/// Entry list car (type 6) from a populated descriptor.
pub fn entry_car_frame(entry: &CarEntry) -> Vec<u8> {
    let mut w = framed(InboundMessage::EntryListCar);
    w.write_u16(entry.car_index);
    w.write_u8(entry.model);
    w.write_string(&entry.team_name).expect("team name fits");
    w.write_i32(entry.race_number);
    w.write_u8(entry.cup_category as u8);
    w.write_u8(entry.current_driver_index);
    w.write_u16(entry.nationality.0);
    w.write_u8(entry.drivers.len() as u8);
    for driver in &entry.drivers {
        w.write_string(&driver.first_name).expect("name fits");
        w.write_string(&driver.last_name).expect("name fits");
        w.write_string(&driver.short_name).expect("name fits");
        w.write_u8(driver.category as u8);
        w.write_u16(driver.nationality.0);
    }
    w.into_inner()
}

/// Realtime car update (type 3).
pub fn car_update_frame(update: &CarUpdate) -> Vec<u8> {
    let mut w = framed(InboundMessage::RealtimeCarUpdate);
    w.write_u16(update.car_index);
    w.write_u16(update.driver_index);
    w.write_u8(update.driver_count);
    w.write_u8((update.gear + 2) as u8);
    w.write_f32(update.world_pos_x);
    w.write_f32(update.world_pos_y);
    w.write_f32(update.heading);
    w.write_u8(update.location as u8);
    w.write_u16(update.speed_kmh);
    w.write_u16(update.position);
    w.write_u16(update.cup_position);
    w.write_u16(update.track_position);
    w.write_f32(update.spline_position);
    w.write_u16(update.laps);
    w.write_i32(update.delta_ms);
    w.write_lap(&update.best_session_lap);
    w.write_lap(&update.last_lap);
    w.write_lap(&update.current_lap);
    w.into_inner()
}

/// Realtime session update (type 2).
pub fn session_update_frame(update: &SessionUpdate) -> Vec<u8> {
    let mut w = framed(InboundMessage::RealtimeUpdate);
    w.write_u16(update.event_index);
    w.write_u16(update.session_index);
    w.write_u8(update.session_kind as u8);
    w.write_u8(update.phase as u8);
    w.write_f32(update.session_time.as_millis() as f32);
    w.write_f32(update.session_end_time.as_millis() as f32);
    w.write_i32(update.focused_car_index);
    w.write_string(&update.active_camera_set).expect("camera set fits");
    w.write_string(&update.active_camera).expect("camera fits");
    w.write_string(&update.current_hud_page).expect("hud page fits");
    w.write_bool(update.replay_playing);
    if update.replay_playing {
        w.write_f32(update.replay_session_time);
        w.write_f32(update.replay_remaining_time);
    }
    w.write_f32(update.time_of_day.as_millis() as f32);
    w.write_u8(update.ambient_temp);
    w.write_u8(update.track_temp);
    w.write_u8((update.clouds * 10.0).round() as u8);
    w.write_u8((update.rain_level * 10.0).round() as u8);
    w.write_u8((update.wetness * 10.0).round() as u8);
    w.write_lap(&update.best_session_lap);
    w.into_inner()
}

/// Track data (type 5).
pub fn track_data_frame(connection_id: i32, track: &TrackData) -> Vec<u8> {
    let mut w = framed(InboundMessage::TrackData);
    w.write_i32(connection_id);
    w.write_string(&track.name).expect("track name fits");
    w.write_i32(track.id);
    w.write_i32(track.length_m);
    w.write_u8(track.camera_sets.len() as u8);
    for (set, cameras) in &track.camera_sets {
        w.write_string(set).expect("camera set fits");
        w.write_u8(cameras.len() as u8);
        for camera in cameras {
            w.write_string(camera).expect("camera fits");
        }
    }
    w.write_u8(track.hud_pages.len() as u8);
    for page in &track.hud_pages {
        w.write_string(page).expect("hud page fits");
    }
    w.into_inner()
}

/// Broadcasting event (type 7).
pub fn event_frame(kind: u8, message: &str, time_ms: i32, car_id: i32) -> Vec<u8> {
    let mut w = framed(InboundMessage::BroadcastingEvent);
    w.write_u8(kind);
    w.write_string(message).expect("message fits");
    w.write_i32(time_ms);
    w.write_i32(car_id);
    w.into_inner()
}

/// A populated single-driver entry.
pub fn sample_entry(car_index: u16) -> CarEntry {
    CarEntry {
        car_index,
        model: 3,
        team_name: "Red Ferrari".into(),
        race_number: 31,
        cup_category: CupCategory::Overall,
        current_driver_index: 0,
        nationality: Nationality(0x11),
        drivers: vec![Driver {
            first_name: "John".into(),
            last_name: "Doe".into(),
            short_name: "JDO".into(),
            category: DriverCategory::Gold,
            nationality: Nationality(0x11),
        }],
    }
}

/// A plausible on-track car update.
pub fn sample_car_update(car_index: u16, driver_count: u8) -> CarUpdate {
    CarUpdate {
        car_index,
        driver_index: 0,
        driver_count,
        gear: 3,
        world_pos_x: 100.0,
        world_pos_y: -50.0,
        heading: 1.57,
        location: CarLocation::Track,
        speed_kmh: 210,
        position: 4,
        cup_position: 2,
        track_position: 4,
        spline_position: 0.42,
        laps: 12,
        delta_ms: -150,
        best_session_lap: LapRecord::default(),
        last_lap: LapRecord::default(),
        current_lap: LapRecord::default(),
    }
}

/// A plausible mid-race session update.
pub fn sample_session_update() -> SessionUpdate {
    SessionUpdate {
        event_index: 1,
        session_index: 2,
        session_kind: SessionKind::Race,
        phase: crate::protocol::enums::SessionPhase::Session,
        session_time: std::time::Duration::from_secs(60),
        session_end_time: std::time::Duration::from_secs(3600),
        focused_car_index: 5,
        active_camera_set: "TV1".into(),
        active_camera: "cam1".into(),
        current_hud_page: "Broadcasting".into(),
        replay_playing: false,
        replay_session_time: 0.0,
        replay_remaining_time: 0.0,
        time_of_day: std::time::Duration::from_millis(43_200_000),
        ambient_temp: 26,
        track_temp: 38,
        clouds: 0.3,
        rain_level: 0.0,
        wetness: 0.1,
        best_session_lap: LapRecord::default(),
    }
}
