//! Race-aware telemetry aggregator for the sim's twin feeds.
//!
//! `pitwire` joins two independent real-time sources into one coherent
//! model of a race session:
//!
//! - the **broadcast UDP protocol** (entry list, realtime car and session
//!   updates, track data, broadcasting events), and
//! - the **host-local shared-memory pages** (physics, graphics, static
//!   data) the simulator exposes on Windows.
//!
//! # Architecture
//!
//! Transport → codec → protocol engine → domain trackers. The
//! [`Supervisor`] watches the shared-memory feed and opens or tears down
//! the broadcast session as the game starts, pauses and exits. All
//! decoded traffic flows through the [`RaceModel`], which owns the entry
//! list, lap book, leaderboard, gap tracker, incident log and position
//! graph, and republishes typed events on a bounded [`EventBus`].
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pitwire::{
//!     BroadcastSettings, MemoryStatusProbe, RaceModel, SharedMemoryService, Supervisor,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let model = Arc::new(RaceModel::new());
//!     let shmem = Arc::new(SharedMemoryService::new());
//!     let probe = Box::new(MemoryStatusProbe::new(Arc::clone(&shmem)));
//!
//!     let supervisor = Supervisor::new(BroadcastSettings::default(), Arc::clone(&model), probe);
//!     let handle = supervisor.handle();
//!     let cancel = CancellationToken::new();
//!
//!     let mut standings_feed = model.events().subscribe_session_updates();
//!     tokio::spawn(supervisor.run(cancel.clone()));
//!
//!     while let Some(_update) = standings_feed.recv().await {
//!         println!("link: {:?}", handle.state());
//!         for row in model.standings() {
//!             println!("P{} #{} {}", row.position, row.race_number, row.gap);
//!         }
//!     }
//!     cancel.cancel();
//! }
//! ```

pub mod analytics;
pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod protocol;
pub mod shmem;
pub mod supervisor;
pub mod trackers;
pub mod transport;

#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;

// Core exports
pub use error::{CodecError, Result, TelemetryError};
pub use events::{EventBus, EVENT_QUEUE_DEPTH};
pub use model::RaceModel;

// Protocol exports
pub use protocol::engine::{NullSink, ProtocolEngine, RaceSink, SendFn};
pub use protocol::enums::{
    CarLocation, CupCategory, DriverCategory, EventKind, LapKind, Nationality, SessionKind,
    SessionPhase,
};
pub use protocol::types::{
    BroadcastEvent, CarEntry, CarUpdate, ConnectionState, Driver, LapRecord, SessionUpdate,
    TrackData,
};

// Lifecycle exports
pub use supervisor::{
    BroadcastSettings, FeedSnapshot, LinkState, StatusSource, Supervisor, SupervisorHandle,
};
pub use transport::Transport;

// Shared memory exports
pub use shmem::{
    GameStatus, Graphics, MemoryStatusProbe, Physics, SharedMemoryLink, SharedMemoryService,
    StaticData, TelemetrySnapshot,
};

// Tracker exports
pub use trackers::{
    CarRecord, EntryList, GapTracker, Incident, IncidentKind, IncidentLog, LapBook, LapSummary,
    Leaderboard, LeaderboardRow, PositionGraph, SessionState, WeatherConditions,
};

// Analytics exports
pub use analytics::{
    AnalyticsService, Compound, Corner, DrivingSample, FuelCalculator, FuelStatus, TempRegime,
    TyreMonitor, TyreState,
};

// Configuration exports
pub use config::{load_from_dir as load_broadcast_config, BroadcastConfig};
