//! Wire enums of the broadcast protocol.
//!
//! Numeric values are dictated by the simulator's protocol version 4 and
//! must not change. Unknown values are rejected at decode time with a
//! validation error; the lookup tables that map cars, tracks and
//! nationalities to display names are data, not protocol, and live outside
//! this crate.

use serde::{Deserialize, Serialize};

use crate::error::TelemetryError;

/// Session kind as reported in realtime updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SessionKind {
    Practice = 0,
    Qualifying = 4,
    Superpole = 9,
    Race = 10,
    Hotlap = 11,
    Hotstint = 12,
    HotlapSuperpole = 13,
    Replay = 14,
}

impl TryFrom<u8> for SessionKind {
    type Error = TelemetryError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SessionKind::Practice),
            4 => Ok(SessionKind::Qualifying),
            9 => Ok(SessionKind::Superpole),
            10 => Ok(SessionKind::Race),
            11 => Ok(SessionKind::Hotlap),
            12 => Ok(SessionKind::Hotstint),
            13 => Ok(SessionKind::HotlapSuperpole),
            14 => Ok(SessionKind::Replay),
            other => {
                Err(TelemetryError::validation("sessionType", other as i64, "unknown session type"))
            }
        }
    }
}

/// Phase within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SessionPhase {
    None = 0,
    Starting = 1,
    PreFormation = 2,
    FormationLap = 3,
    PreSession = 4,
    Session = 5,
    SessionOver = 6,
    PostSession = 7,
    ResultUi = 8,
}

impl TryFrom<u8> for SessionPhase {
    type Error = TelemetryError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SessionPhase::None),
            1 => Ok(SessionPhase::Starting),
            2 => Ok(SessionPhase::PreFormation),
            3 => Ok(SessionPhase::FormationLap),
            4 => Ok(SessionPhase::PreSession),
            5 => Ok(SessionPhase::Session),
            6 => Ok(SessionPhase::SessionOver),
            7 => Ok(SessionPhase::PostSession),
            8 => Ok(SessionPhase::ResultUi),
            other => Err(TelemetryError::validation(
                "sessionPhase",
                other as i64,
                "unknown session phase",
            )),
        }
    }
}

/// Where a car currently is on the circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CarLocation {
    None = 0,
    Track = 1,
    Pitlane = 2,
    PitEntry = 3,
    PitExit = 4,
}

impl TryFrom<u8> for CarLocation {
    type Error = TelemetryError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CarLocation::None),
            1 => Ok(CarLocation::Track),
            2 => Ok(CarLocation::Pitlane),
            3 => Ok(CarLocation::PitEntry),
            4 => Ok(CarLocation::PitExit),
            other => {
                Err(TelemetryError::validation("carLocation", other as i64, "unknown car location"))
            }
        }
    }
}

/// Driver skill category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DriverCategory {
    Bronze = 0,
    Silver = 1,
    Gold = 2,
    Platinum = 3,
    Error = 255,
}

impl TryFrom<u8> for DriverCategory {
    type Error = TelemetryError;

    fn try_from(value: u8) -> Result<Self, TelemetryError> {
        match value {
            0 => Ok(DriverCategory::Bronze),
            1 => Ok(DriverCategory::Silver),
            2 => Ok(DriverCategory::Gold),
            3 => Ok(DriverCategory::Platinum),
            255 => Ok(DriverCategory::Error),
            other => Err(TelemetryError::validation(
                "driverCategory",
                other as i64,
                "unknown driver category",
            )),
        }
    }
}

/// Cup sub-classification used for class leaderboards.
///
/// Overall/Pro = 0, ProAm = 1, Am = 2, Silver = 3, National = 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CupCategory {
    Overall = 0,
    ProAm = 1,
    Am = 2,
    Silver = 3,
    National = 4,
}

impl TryFrom<u8> for CupCategory {
    type Error = TelemetryError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CupCategory::Overall),
            1 => Ok(CupCategory::ProAm),
            2 => Ok(CupCategory::Am),
            3 => Ok(CupCategory::Silver),
            4 => Ok(CupCategory::National),
            other => {
                Err(TelemetryError::validation("cupCategory", other as i64, "must be 0..=4"))
            }
        }
    }
}

/// Lap classification. Out- and inlaps start or end in the pit lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LapKind {
    Outlap,
    Regular,
    Inlap,
}

/// Kind of a broadcasting event (message type 7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventKind {
    None = 0,
    GreenFlag = 1,
    SessionOver = 2,
    PenaltyMessage = 3,
    Accident = 4,
    LapCompleted = 5,
    BestSessionLap = 6,
    BestPersonalLap = 7,
}

impl TryFrom<u8> for EventKind {
    type Error = TelemetryError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(EventKind::None),
            1 => Ok(EventKind::GreenFlag),
            2 => Ok(EventKind::SessionOver),
            3 => Ok(EventKind::PenaltyMessage),
            4 => Ok(EventKind::Accident),
            5 => Ok(EventKind::LapCompleted),
            6 => Ok(EventKind::BestSessionLap),
            7 => Ok(EventKind::BestPersonalLap),
            other => {
                Err(TelemetryError::validation("eventType", other as i64, "unknown event type"))
            }
        }
    }
}

/// Raw nationality identifier as sent on the wire.
///
/// Mapping the id to a country name is display data and out of scope here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Nationality(pub u16);
