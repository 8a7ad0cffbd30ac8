//! Shared-memory telemetry: region layouts, the torn-read-safe reader and
//! the sampling service.

pub mod layout;
pub mod reader;
pub mod service;

pub use layout::{GameStatus, Graphics, Physics, SimSession, StaticData, TrackFlag};
pub use reader::SharedMemoryLink;
pub use service::{MemoryStatusProbe, SharedMemoryService, TelemetrySnapshot};
