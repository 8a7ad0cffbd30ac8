//! Message discriminators of broadcast protocol version 4.

use crate::error::CodecError;

/// Protocol version byte sent right after the register discriminator.
pub const PROTOCOL_VERSION: u8 = 4;

/// Outbound request discriminators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutboundMessage {
    Register = 1,
    Unregister = 9,
    RequestEntryList = 10,
    RequestTrackData = 11,
    ChangeHudPage = 49,
    ChangeFocus = 50,
    InstantReplayRequest = 51,
}

/// Inbound message discriminators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InboundMessage {
    RegistrationResult = 1,
    RealtimeUpdate = 2,
    RealtimeCarUpdate = 3,
    EntryList = 4,
    TrackData = 5,
    EntryListCar = 6,
    BroadcastingEvent = 7,
}

impl TryFrom<u8> for InboundMessage {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(InboundMessage::RegistrationResult),
            2 => Ok(InboundMessage::RealtimeUpdate),
            3 => Ok(InboundMessage::RealtimeCarUpdate),
            4 => Ok(InboundMessage::EntryList),
            5 => Ok(InboundMessage::TrackData),
            6 => Ok(InboundMessage::EntryListCar),
            7 => Ok(InboundMessage::BroadcastingEvent),
            other => Err(CodecError::UnknownMessageType(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_discriminators() {
        for raw in 1..=7u8 {
            assert_eq!(InboundMessage::try_from(raw).unwrap() as u8, raw);
        }
        assert_eq!(
            InboundMessage::try_from(8),
            Err(CodecError::UnknownMessageType(8))
        );
        assert_eq!(
            InboundMessage::try_from(0),
            Err(CodecError::UnknownMessageType(0))
        );
    }

    #[test]
    fn outbound_discriminators() {
        assert_eq!(OutboundMessage::Register as u8, 1);
        assert_eq!(OutboundMessage::Unregister as u8, 9);
        assert_eq!(OutboundMessage::RequestEntryList as u8, 10);
        assert_eq!(OutboundMessage::RequestTrackData as u8, 11);
        assert_eq!(OutboundMessage::ChangeHudPage as u8, 49);
        assert_eq!(OutboundMessage::ChangeFocus as u8, 50);
        assert_eq!(OutboundMessage::InstantReplayRequest as u8, 51);
    }
}
