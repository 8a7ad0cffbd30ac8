//! Inbound message decoders.
//!
//! Each decoder consumes exactly the bytes of its frame from the reader
//! and validates the protocol bounds before any caller state is touched.
//! Decode failures therefore never leave partial updates behind.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::{CodecError, Result, TelemetryError};
use crate::protocol::codec::ByteReader;
use crate::protocol::enums::{
    CarLocation, CupCategory, DriverCategory, EventKind, Nationality, SessionKind, SessionPhase,
};
use crate::protocol::types::{
    BroadcastEvent, CarEntry, CarUpdate, ConnectionState, Driver, SessionUpdate, TrackData,
};

/// Highest car index the server may assign.
pub const MAX_CAR_INDEX: u16 = 9999;
/// Maximum cars in one entry list.
pub const MAX_CARS: u16 = 200;
/// Maximum drivers per car.
pub const MAX_DRIVERS: u8 = 10;
/// Maximum camera sets in track data.
pub const MAX_CAMERA_SETS: u8 = 50;
/// Maximum cameras per set.
pub const MAX_CAMERAS: u8 = 100;
/// Maximum HUD pages in track data.
pub const MAX_HUD_PAGES: u8 = 50;
/// Plausible track length range in meters.
pub const TRACK_LENGTH_RANGE: std::ops::RangeInclusive<i32> = 1000..=25000;

fn check_car_index(index: u16) -> Result<u16> {
    if index > MAX_CAR_INDEX {
        return Err(TelemetryError::validation("carIndex", index as i64, "must be 0..=9999"));
    }
    Ok(index)
}

/// Message type 1.
pub fn registration_result(r: &mut ByteReader<'_>) -> Result<ConnectionState> {
    let connection_id = r.read_i32()?;
    let success = r.read_bool()?;
    // The wire byte is 0 for a read-only connection.
    let read_only = r.read_u8()? == 0;
    let error_message = r.read_string()?;

    Ok(ConnectionState { connection_id, success, read_only, error_message })
}

/// Message type 4: the connection id echo and the listed car indices.
pub fn entry_list(r: &mut ByteReader<'_>) -> Result<(i32, Vec<u16>)> {
    let connection_id = r.read_i32()?;

    let car_count = r.read_u16()?;
    if car_count > MAX_CARS {
        return Err(TelemetryError::Codec(CodecError::BoundExceeded {
            field: "carCount",
            value: car_count as i64,
            max: MAX_CARS as i64,
        }));
    }

    let mut indices = Vec::with_capacity(car_count as usize);
    for _ in 0..car_count {
        indices.push(check_car_index(r.read_u16()?)?);
    }

    Ok((connection_id, indices))
}

/// Message type 6: the full descriptor for one listed car.
pub fn entry_list_car(r: &mut ByteReader<'_>) -> Result<CarEntry> {
    let car_index = check_car_index(r.read_u16()?)?;
    let model = r.read_u8()?;
    let team_name = r.read_string()?;
    let race_number = r.read_i32()?;
    let cup_category = CupCategory::try_from(r.read_u8()?)?;
    let current_driver_index = r.read_u8()?;
    let nationality = Nationality(r.read_u16()?);

    let driver_count = r.read_u8()?;
    if driver_count > MAX_DRIVERS {
        return Err(TelemetryError::Codec(CodecError::BoundExceeded {
            field: "driverCount",
            value: driver_count as i64,
            max: MAX_DRIVERS as i64,
        }));
    }
    if current_driver_index >= driver_count {
        return Err(TelemetryError::validation(
            "currentDriverIndex",
            current_driver_index as i64,
            "must be less than driverCount",
        ));
    }

    let mut drivers = Vec::with_capacity(driver_count as usize);
    for _ in 0..driver_count {
        let first_name = r.read_string()?;
        let last_name = r.read_string()?;
        let short_name = r.read_string()?;
        let category = DriverCategory::try_from(r.read_u8()?)?;
        let nationality = Nationality(r.read_u16()?);
        drivers.push(Driver { first_name, last_name, short_name, category, nationality });
    }

    Ok(CarEntry {
        car_index,
        model,
        team_name,
        race_number,
        cup_category,
        current_driver_index,
        nationality,
        drivers,
    })
}

/// Message type 5.
pub fn track_data(r: &mut ByteReader<'_>) -> Result<(i32, TrackData)> {
    let connection_id = r.read_i32()?;
    let name = r.read_string()?;
    let id = r.read_i32()?;

    let length_m = r.read_i32()?;
    if !TRACK_LENGTH_RANGE.contains(&length_m) {
        return Err(TelemetryError::Codec(CodecError::OutOfRange {
            field: "trackMeters",
            value: length_m as i64,
            min: *TRACK_LENGTH_RANGE.start() as i64,
            max: *TRACK_LENGTH_RANGE.end() as i64,
        }));
    }

    let camera_set_count = r.read_u8()?;
    if camera_set_count > MAX_CAMERA_SETS {
        return Err(TelemetryError::Codec(CodecError::BoundExceeded {
            field: "cameraSetCount",
            value: camera_set_count as i64,
            max: MAX_CAMERA_SETS as i64,
        }));
    }

    let mut camera_sets = HashMap::with_capacity(camera_set_count as usize);
    for _ in 0..camera_set_count {
        let set_name = r.read_string()?;
        let camera_count = r.read_u8()?;
        if camera_count > MAX_CAMERAS {
            return Err(TelemetryError::Codec(CodecError::BoundExceeded {
                field: "cameraCount",
                value: camera_count as i64,
                max: MAX_CAMERAS as i64,
            }));
        }
        let mut cameras = Vec::with_capacity(camera_count as usize);
        for _ in 0..camera_count {
            cameras.push(r.read_string()?);
        }
        camera_sets.insert(set_name, cameras);
    }

    let hud_page_count = r.read_u8()?;
    if hud_page_count > MAX_HUD_PAGES {
        return Err(TelemetryError::Codec(CodecError::BoundExceeded {
            field: "hudPageCount",
            value: hud_page_count as i64,
            max: MAX_HUD_PAGES as i64,
        }));
    }
    let mut hud_pages = Vec::with_capacity(hud_page_count as usize);
    for _ in 0..hud_page_count {
        hud_pages.push(r.read_string()?);
    }

    Ok((connection_id, TrackData { name, id, length_m, camera_sets, hud_pages }))
}

fn millis_f32(value: f32) -> Duration {
    Duration::from_millis(value.max(0.0) as u64)
}

/// Message type 2. The replay-time fields exist on the wire only while a
/// replay is playing.
pub fn session_update(r: &mut ByteReader<'_>) -> Result<SessionUpdate> {
    let event_index = r.read_u16()?;
    let session_index = r.read_u16()?;
    let session_kind = SessionKind::try_from(r.read_u8()?)?;
    let phase = SessionPhase::try_from(r.read_u8()?)?;
    let session_time = millis_f32(r.read_f32()?);
    let session_end_time = millis_f32(r.read_f32()?);
    let focused_car_index = r.read_i32()?;
    let active_camera_set = r.read_string()?;
    let active_camera = r.read_string()?;
    let current_hud_page = r.read_string()?;

    let replay_playing = r.read_bool()?;
    let (replay_session_time, replay_remaining_time) = if replay_playing {
        (r.read_f32()?, r.read_f32()?)
    } else {
        (0.0, 0.0)
    };

    let time_of_day = millis_f32(r.read_f32()?);
    let ambient_temp = r.read_u8()?;
    let track_temp = r.read_u8()?;
    // Decimal tenths on the wire.
    let clouds = r.read_u8()? as f32 / 10.0;
    let rain_level = r.read_u8()? as f32 / 10.0;
    let wetness = r.read_u8()? as f32 / 10.0;
    let best_session_lap = r.read_lap()?;

    Ok(SessionUpdate {
        event_index,
        session_index,
        session_kind,
        phase,
        session_time,
        session_end_time,
        focused_car_index,
        active_camera_set,
        active_camera,
        current_hud_page,
        replay_playing,
        replay_session_time,
        replay_remaining_time,
        time_of_day,
        ambient_temp,
        track_temp,
        clouds,
        rain_level,
        wetness,
        best_session_lap,
    })
}

/// Message type 3.
pub fn car_update(r: &mut ByteReader<'_>) -> Result<CarUpdate> {
    let car_index = check_car_index(r.read_u16()?)?;
    let driver_index = r.read_u16()?;
    let driver_count = r.read_u8()?;
    // Raw gear is offset by two so reverse lands on -1 and neutral on 0.
    let gear = r.read_u8()? as i8 - 2;
    let world_pos_x = r.read_f32()?;
    let world_pos_y = r.read_f32()?;
    let heading = r.read_f32()?;
    let location = CarLocation::try_from(r.read_u8()?)?;
    let speed_kmh = r.read_u16()?;
    let position = r.read_u16()?;
    let cup_position = r.read_u16()?;
    let track_position = r.read_u16()?;
    let spline_position = r.read_f32()?;
    let laps = r.read_u16()?;
    let delta_ms = r.read_i32()?;
    let best_session_lap = r.read_lap()?;
    let last_lap = r.read_lap()?;
    let current_lap = r.read_lap()?;

    Ok(CarUpdate {
        car_index,
        driver_index,
        driver_count,
        gear,
        world_pos_x,
        world_pos_y,
        heading,
        location,
        speed_kmh,
        position,
        cup_position,
        track_position,
        spline_position,
        laps,
        delta_ms,
        best_session_lap,
        last_lap,
        current_lap,
    })
}

/// Message type 7. The entry attachment happens at the engine, which owns
/// the cache.
pub fn broadcast_event(r: &mut ByteReader<'_>) -> Result<BroadcastEvent> {
    let kind = EventKind::try_from(r.read_u8()?)?;
    let message = r.read_string()?;
    let time_ms = r.read_i32()?;
    let car_id = r.read_i32()?;

    Ok(BroadcastEvent { kind, message, time_ms, car_id, car: None })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codec::ByteWriter;

    #[test]
    fn registration_result_frame() {
        // id=42, success=1, readonly byte=1 (writable), empty error.
        let buf = [0x2A, 0x00, 0x00, 0x00, 0x01, 0x01, 0x00, 0x00];
        let mut r = ByteReader::new(&buf);
        let state = registration_result(&mut r).unwrap();
        assert!(r.is_empty());
        assert_eq!(state.connection_id, 42);
        assert!(state.success);
        assert!(!state.read_only);
        assert_eq!(state.error_message, "");
    }

    #[test]
    fn registration_result_readonly_byte_zero() {
        let buf = [0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00];
        let mut r = ByteReader::new(&buf);
        assert!(registration_result(&mut r).unwrap().read_only);
    }

    #[test]
    fn entry_list_frame() {
        // id=42, two cars: 5 and 9.
        let buf = [0x2A, 0x00, 0x00, 0x00, 0x02, 0x00, 0x05, 0x00, 0x09, 0x00];
        let mut r = ByteReader::new(&buf);
        let (id, cars) = entry_list(&mut r).unwrap();
        assert!(r.is_empty());
        assert_eq!(id, 42);
        assert_eq!(cars, vec![5, 9]);
    }

    #[test]
    fn entry_list_rejects_oversized_count() {
        let mut w = ByteWriter::new();
        w.write_i32(1);
        w.write_u16(201);
        let buf = w.into_inner();
        let mut r = ByteReader::new(&buf);
        assert!(matches!(
            entry_list(&mut r),
            Err(TelemetryError::Codec(CodecError::BoundExceeded { field: "carCount", .. }))
        ));
    }

    #[test]
    fn entry_list_rejects_bad_car_index() {
        let mut w = ByteWriter::new();
        w.write_i32(1);
        w.write_u16(1);
        w.write_u16(10_000);
        let buf = w.into_inner();
        let mut r = ByteReader::new(&buf);
        assert!(matches!(entry_list(&mut r), Err(TelemetryError::Validation { .. })));
    }

    fn sample_entry_car() -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.write_u16(5); // car index
        w.write_u8(3); // model
        w.write_string("Red Ferrari").unwrap();
        w.write_i32(31); // race number
        w.write_u8(0); // cup category
        w.write_u8(0); // current driver index
        w.write_u16(0x11); // nationality
        w.write_u8(1); // driver count
        w.write_string("John").unwrap();
        w.write_string("Doe").unwrap();
        w.write_string("JDO").unwrap();
        w.write_u8(2); // gold
        w.write_u16(0x11);
        w.into_inner()
    }

    #[test]
    fn entry_list_car_frame() {
        let buf = sample_entry_car();
        let mut r = ByteReader::new(&buf);
        let car = entry_list_car(&mut r).unwrap();
        assert!(r.is_empty());
        assert_eq!(car.car_index, 5);
        assert_eq!(car.team_name, "Red Ferrari");
        assert_eq!(car.race_number, 31);
        assert_eq!(car.drivers.len(), 1);
        assert_eq!(car.drivers[0].full_name(), "John Doe");
        assert_eq!(car.drivers[0].category, DriverCategory::Gold);
    }

    #[test]
    fn entry_list_car_rejects_driver_index_past_count() {
        let mut buf = sample_entry_car();
        buf[21] = 1; // current driver index == driver count
        let mut r = ByteReader::new(&buf);
        assert!(matches!(
            entry_list_car(&mut r),
            Err(TelemetryError::Validation { field: "currentDriverIndex", .. })
        ));
    }

    fn sample_track_data() -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.write_i32(42);
        w.write_string("Monza").unwrap();
        w.write_i32(7);
        w.write_i32(5793);
        w.write_u8(1); // one camera set
        w.write_string("TV1").unwrap();
        w.write_u8(2);
        w.write_string("cam1").unwrap();
        w.write_string("cam2").unwrap();
        w.write_u8(1); // one hud page
        w.write_string("Broadcasting").unwrap();
        w.into_inner()
    }

    #[test]
    fn track_data_frame() {
        let buf = sample_track_data();
        let mut r = ByteReader::new(&buf);
        let (id, track) = track_data(&mut r).unwrap();
        assert!(r.is_empty());
        assert_eq!(id, 42);
        assert_eq!(track.name, "Monza");
        assert_eq!(track.length_m, 5793);
        assert_eq!(track.camera_sets["TV1"], vec!["cam1", "cam2"]);
        assert_eq!(track.hud_pages, vec!["Broadcasting"]);
    }

    #[test]
    fn track_data_rejects_implausible_length() {
        let mut w = ByteWriter::new();
        w.write_i32(42);
        w.write_string("Oval").unwrap();
        w.write_i32(7);
        w.write_i32(500);
        let buf = w.into_inner();
        let mut r = ByteReader::new(&buf);
        assert!(matches!(
            track_data(&mut r),
            Err(TelemetryError::Codec(CodecError::OutOfRange { field: "trackMeters", .. }))
        ));
    }

    #[test]
    fn session_update_frame() {
        let buf = crate::test_utils::session_update_frame(&crate::test_utils::sample_session_update());
        let mut r = ByteReader::new(&buf[1..]);
        let update = session_update(&mut r).unwrap();
        assert!(r.is_empty());
        assert_eq!(update.session_kind, SessionKind::Race);
        assert_eq!(update.phase, SessionPhase::Session);
        assert_eq!(update.session_time, Duration::from_secs(60));
        assert!((update.clouds - 0.3).abs() < f32::EPSILON);
        assert!(!update.replay_playing);
    }

    #[test]
    fn session_update_reads_replay_times_only_when_replaying() {
        let mut sample = crate::test_utils::sample_session_update();
        sample.replay_playing = true;
        sample.replay_session_time = 1_000.0;
        sample.replay_remaining_time = 2_000.0;
        let buf = crate::test_utils::session_update_frame(&sample);
        let mut r = ByteReader::new(&buf[1..]);
        let update = session_update(&mut r).unwrap();
        assert!(r.is_empty());
        assert!(update.replay_playing);
        assert_eq!(update.replay_session_time, 1_000.0);
        assert_eq!(update.replay_remaining_time, 2_000.0);
    }

    #[test]
    fn car_update_frame() {
        let buf = crate::test_utils::car_update_frame(&crate::test_utils::sample_car_update(5, 1));
        let mut r = ByteReader::new(&buf[1..]);
        let update = car_update(&mut r).unwrap();
        assert!(r.is_empty());
        assert_eq!(update.car_index, 5);
        assert_eq!(update.gear, 3);
        assert_eq!(update.location, CarLocation::Track);
        assert_eq!(update.position, 4);
        assert!((update.spline_position - 0.42).abs() < f32::EPSILON);
        assert_eq!(update.delta_ms, -150);
    }

    #[test]
    fn broadcast_event_frame() {
        let mut w = ByteWriter::new();
        w.write_u8(4); // accident
        w.write_string("Contact").unwrap();
        w.write_i32(20_000);
        w.write_i32(7);
        let buf = w.into_inner();
        let mut r = ByteReader::new(&buf);
        let event = broadcast_event(&mut r).unwrap();
        assert!(r.is_empty());
        assert_eq!(event.kind, EventKind::Accident);
        assert_eq!(event.message, "Contact");
        assert_eq!(event.car_id, 7);
        assert!(event.car.is_none());
    }

    #[test]
    fn truncated_frames_error_at_every_offset() {
        let buf = sample_entry_car();
        for cut in 0..buf.len() {
            let mut r = ByteReader::new(&buf[..cut]);
            assert!(entry_list_car(&mut r).is_err(), "cut at {cut} should fail");
        }
    }
}
