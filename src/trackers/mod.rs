//! Race-state trackers fed by the protocol engine.
//!
//! Every tracker keys on the car index; there are no object graphs, just
//! independent maps joined by index at read time.

pub mod entry_list;
pub mod gaps;
pub mod incidents;
pub mod laps;
pub mod leaderboard;
pub mod position;
pub mod session;

pub use entry_list::{CarRecord, EntryList};
pub use gaps::GapTracker;
pub use incidents::{Incident, IncidentKind, IncidentLog};
pub use laps::{LapBook, LapHistory, LapSummary};
pub use leaderboard::{Leaderboard, LeaderboardRow};
pub use position::{CarPosition, PositionGraph};
pub use session::{SessionState, SessionTracker, WeatherConditions};
