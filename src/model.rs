//! The race-aware model.
//!
//! [`RaceModel`] is the sink behind the protocol engine: every decoded
//! message updates the trackers synchronously on the reader task, then
//! fans out to external subscribers through the bounded event bus. All
//! tracker state sits behind reader-writer locks; queries return cloned
//! snapshots.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::events::EventBus;
use crate::protocol::engine::RaceSink;
use crate::protocol::enums::{CupCategory, EventKind};
use crate::protocol::types::{
    BroadcastEvent, CarEntry, CarUpdate, ConnectionState, SessionUpdate, TrackData,
};
use crate::trackers::{
    CarRecord, EntryList, GapTracker, Incident, IncidentLog, LapBook, LapSummary, Leaderboard,
    LeaderboardRow, PositionGraph, SessionState, SessionTracker,
};

/// Joined race state for one session.
pub struct RaceModel {
    entries: RwLock<EntryList>,
    gaps: RwLock<GapTracker>,
    laps: RwLock<LapBook>,
    leaderboard: RwLock<Leaderboard>,
    incidents: RwLock<IncidentLog>,
    positions: RwLock<PositionGraph>,
    session: RwLock<SessionTracker>,
    track: RwLock<Option<TrackData>>,
    session_time: RwLock<Duration>,
    player_car: AtomicU16,
    events: EventBus,
    connection_tx: watch::Sender<Option<ConnectionState>>,
}

impl Default for RaceModel {
    fn default() -> Self {
        RaceModel::new()
    }
}

impl RaceModel {
    pub fn new() -> Self {
        let (connection_tx, _) = watch::channel(None);
        RaceModel {
            entries: RwLock::new(EntryList::new()),
            gaps: RwLock::new(GapTracker::new()),
            laps: RwLock::new(LapBook::new()),
            leaderboard: RwLock::new(Leaderboard::new()),
            incidents: RwLock::new(IncidentLog::new()),
            positions: RwLock::new(PositionGraph::new()),
            session: RwLock::new(SessionTracker::new()),
            track: RwLock::new(None),
            session_time: RwLock::new(Duration::ZERO),
            player_car: AtomicU16::new(0),
            events: EventBus::new(),
            connection_tx,
        }
    }

    /// External subscription surface.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// The car whose perspective leaderboard queries use.
    pub fn set_player_car(&self, car_index: u16) {
        self.player_car.store(car_index, Ordering::Relaxed);
    }

    pub fn player_car(&self) -> u16 {
        self.player_car.load(Ordering::Relaxed)
    }

    /// Latest registration outcome of the current attach attempt.
    pub fn connection_state(&self) -> Option<ConnectionState> {
        self.connection_tx.borrow().clone()
    }

    pub fn connection_updates(&self) -> watch::Receiver<Option<ConnectionState>> {
        self.connection_tx.subscribe()
    }

    /// Forgets the previous registration outcome before a new attempt.
    pub fn reset_connection(&self) {
        self.connection_tx.send_replace(None);
    }

    // Queries. Everything returns owned snapshots.

    pub fn car(&self, car_index: u16) -> Option<CarRecord> {
        self.entries.read().expect("entries poisoned").get(car_index)
    }

    pub fn field(&self) -> Vec<CarRecord> {
        self.entries.read().expect("entries poisoned").snapshot()
    }

    pub fn car_count(&self) -> usize {
        self.entries.read().expect("entries poisoned").len()
    }

    pub fn track(&self) -> Option<TrackData> {
        self.track.read().expect("track poisoned").clone()
    }

    pub fn standings(&self) -> Vec<LeaderboardRow> {
        self.leaderboard.read().expect("leaderboard poisoned").rows().to_vec()
    }

    pub fn battles(&self) -> Vec<Vec<LeaderboardRow>> {
        self.leaderboard.read().expect("leaderboard poisoned").battles()
    }

    pub fn standings_by_class(&self, category: CupCategory) -> Vec<LeaderboardRow> {
        self.leaderboard.read().expect("leaderboard poisoned").by_class(category)
    }

    /// Checkpoint-measured gap between two cars; `spline_behind` is the
    /// trailing car's current spline position.
    pub fn time_gap(&self, ahead: u16, behind: u16, spline_behind: f32) -> Option<Duration> {
        self.gaps.read().expect("gaps poisoned").time_gap(ahead, behind, spline_behind)
    }

    pub fn incidents(&self) -> Vec<Incident> {
        self.incidents.read().expect("incidents poisoned").incidents().to_vec()
    }

    pub fn subscribe_incidents(&self) -> mpsc::Receiver<Incident> {
        self.incidents.write().expect("incidents poisoned").subscribe()
    }

    pub fn session_state(&self) -> Option<SessionState> {
        self.session.read().expect("session poisoned").current().cloned()
    }

    pub fn time_multiplier(&self) -> Option<u32> {
        self.session.read().expect("session poisoned").time_multiplier()
    }

    pub fn subscribe_time_multiplier(&self) -> mpsc::Receiver<u32> {
        self.session.write().expect("session poisoned").subscribe_multiplier()
    }

    pub fn best_lap(&self, car_index: u16) -> Option<LapSummary> {
        self.laps.read().expect("laps poisoned").car(car_index)?.best_lap().cloned()
    }

    pub fn lap_history(&self, car_index: u16) -> Vec<LapSummary> {
        self.laps
            .read()
            .expect("laps poisoned")
            .car(car_index)
            .map(|history| history.history().to_vec())
            .unwrap_or_default()
    }

    pub fn theoretical_best_ms(&self, car_index: u16) -> Option<i32> {
        self.laps.read().expect("laps poisoned").car(car_index)?.theoretical_best_ms()
    }

    pub fn consistency_ms(&self, car_index: u16) -> Option<f64> {
        self.laps.read().expect("laps poisoned").car(car_index)?.consistency_ms()
    }

    /// Drops per-session state; used between sessions.
    pub fn reset_session(&self) {
        self.entries.write().expect("entries poisoned").clear();
        self.gaps.write().expect("gaps poisoned").clear();
        self.laps.write().expect("laps poisoned").clear();
        self.incidents.write().expect("incidents poisoned").clear();
        self.positions.write().expect("positions poisoned").reset();
        self.session.write().expect("session poisoned").reset();
        *self.session_time.write().expect("session time poisoned") = Duration::ZERO;
        info!("session state cleared");
    }

    /// Removes cars not seen within `max_age`.
    pub fn prune_entries(&self, max_age: Duration) {
        self.entries.write().expect("entries poisoned").prune(max_age);
    }
}

impl RaceSink for RaceModel {
    fn connection_state(&self, state: &ConnectionState) {
        self.connection_tx.send_replace(Some(state.clone()));
        self.events.publish_connection_state(state);
    }

    fn track_data(&self, track: &TrackData) {
        self.gaps.write().expect("gaps poisoned").initialize(track.length_m as f32);
        *self.track.write().expect("track poisoned") = Some(track.clone());
        self.events.publish_track_data(track);
    }

    fn car_entry(&self, entry: &CarEntry) {
        self.entries.write().expect("entries poisoned").update_descriptor(entry.clone());
        self.events.publish_car_entry(entry);
    }

    fn session_update(&self, update: &SessionUpdate) {
        *self.session_time.write().expect("session time poisoned") = update.session_time;

        if let Some(multiplier) = self.session.write().expect("session poisoned").update(update) {
            debug!(multiplier, "time multiplier changed");
        }

        {
            let entries = self.entries.read().expect("entries poisoned");
            self.leaderboard.write().expect("leaderboard poisoned").refresh(
                &entries.snapshot(),
                update.session_kind,
                self.player_car(),
            );
        }

        self.events.publish_session_update(update);
    }

    fn car_update(&self, update: &CarUpdate) {
        let session_time = *self.session_time.read().expect("session time poisoned");

        self.entries.write().expect("entries poisoned").update_sample(update.clone());
        self.gaps
            .write()
            .expect("gaps poisoned")
            .record(update.car_index, update.spline_position);
        self.positions.write().expect("positions poisoned").observe(
            update.car_index,
            update.spline_position,
            update.location,
        );
        self.incidents
            .write()
            .expect("incidents poisoned")
            .record_sample(update, session_time);

        if update.last_lap.computed_time_ms() > 0 {
            self.laps.write().expect("laps poisoned").record(&update.last_lap);
        }

        self.events.publish_car_update(update);
    }

    fn broadcast_event(&self, event: &BroadcastEvent) {
        if event.kind == EventKind::Accident {
            self.incidents
                .write()
                .expect("incidents poisoned")
                .handle_event(event, event.car.as_ref());
        }
        self.events.publish_event(event);
    }
}
