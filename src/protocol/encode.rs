//! Outbound request encoders.
//!
//! Every command after registration carries the server-assigned connection
//! id right after its discriminator.

use crate::error::Result;
use crate::protocol::codec::ByteWriter;
use crate::protocol::messages::{OutboundMessage, PROTOCOL_VERSION};

/// Register command. The protocol version byte follows the discriminator;
/// fails if any string exceeds the u16 length prefix.
pub fn register(
    display_name: &str,
    connection_password: &str,
    update_interval_ms: i32,
    command_password: &str,
) -> Result<Vec<u8>> {
    let mut w = ByteWriter::new();
    w.write_u8(OutboundMessage::Register as u8);
    w.write_u8(PROTOCOL_VERSION);
    w.write_string(display_name)?;
    w.write_string(connection_password)?;
    w.write_i32(update_interval_ms);
    w.write_string(command_password)?;
    Ok(w.into_inner())
}

/// Unregister command.
pub fn unregister(connection_id: i32) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.write_u8(OutboundMessage::Unregister as u8);
    w.write_i32(connection_id);
    w.into_inner()
}

/// Entry-list refresh request.
pub fn entry_list_request(connection_id: i32) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.write_u8(OutboundMessage::RequestEntryList as u8);
    w.write_i32(connection_id);
    w.into_inner()
}

/// Track-data refresh request.
pub fn track_data_request(connection_id: i32) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.write_u8(OutboundMessage::RequestTrackData as u8);
    w.write_i32(connection_id);
    w.into_inner()
}

/// Focus/camera change. Each optional block is preceded by a one-byte
/// presence flag; camera set and camera travel together.
pub fn focus_request(
    connection_id: i32,
    car_index: Option<u16>,
    camera: Option<(&str, &str)>,
) -> Result<Vec<u8>> {
    let mut w = ByteWriter::new();
    w.write_u8(OutboundMessage::ChangeFocus as u8);
    w.write_i32(connection_id);

    match car_index {
        Some(index) => {
            w.write_u8(1);
            w.write_u16(index);
        }
        None => w.write_u8(0),
    }

    match camera {
        Some((set, camera)) => {
            w.write_u8(1);
            w.write_string(set)?;
            w.write_string(camera)?;
        }
        None => w.write_u8(0),
    }

    Ok(w.into_inner())
}

/// Instant replay request.
pub fn instant_replay_request(
    connection_id: i32,
    start_session_time_ms: f32,
    duration_ms: f32,
    focused_car_index: i32,
    camera_set: &str,
    camera: &str,
) -> Result<Vec<u8>> {
    let mut w = ByteWriter::new();
    w.write_u8(OutboundMessage::InstantReplayRequest as u8);
    w.write_i32(connection_id);
    w.write_f32(start_session_time_ms);
    w.write_f32(duration_ms);
    w.write_i32(focused_car_index);
    w.write_string(camera_set)?;
    w.write_string(camera)?;
    Ok(w.into_inner())
}

/// HUD page change request.
pub fn hud_page_request(connection_id: i32, page: &str) -> Result<Vec<u8>> {
    let mut w = ByteWriter::new();
    w.write_u8(OutboundMessage::ChangeHudPage as u8);
    w.write_i32(connection_id);
    w.write_string(page)?;
    Ok(w.into_inner())
}
