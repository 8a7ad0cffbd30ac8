//! Broadcast protocol: wire codec, message types and the engine.

pub mod codec;
pub mod decode;
pub mod encode;
pub mod engine;
pub mod enums;
pub mod messages;
pub mod types;

pub use engine::{NullSink, ProtocolEngine, RaceSink, SendFn};
pub use messages::{InboundMessage, OutboundMessage, PROTOCOL_VERSION};
