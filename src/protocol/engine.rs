//! Broadcast protocol engine.
//!
//! Owns the connection id and the entry-list cache, marshals outbound
//! requests, parses inbound frames and routes typed events into a
//! [`RaceSink`]. The engine also implements the desynchronization
//! recovery rule: a realtime car update that does not match the cached
//! entry roster suppresses the update and asks the server for a fresh
//! entry list, at most once per second.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{Result, TelemetryError};
use crate::protocol::codec::ByteReader;
use crate::protocol::messages::InboundMessage;
use crate::protocol::types::{
    BroadcastEvent, CarEntry, CarUpdate, ConnectionState, SessionUpdate, TrackData,
};
use crate::protocol::{decode, encode};

/// Minimum spacing between desync-triggered entry-list refreshes.
pub const ENTRY_LIST_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Dispatch surface for decoded messages.
///
/// Implementations run synchronously on the transport reader task and must
/// not block; fan-out to slow consumers goes through the bounded event bus.
/// Panics inside a sink are contained and never kill the reader.
pub trait RaceSink: Send + Sync {
    fn connection_state(&self, _state: &ConnectionState) {}
    fn track_data(&self, _track: &TrackData) {}
    fn car_entry(&self, _entry: &CarEntry) {}
    fn session_update(&self, _update: &SessionUpdate) {}
    fn car_update(&self, _update: &CarUpdate) {}
    fn broadcast_event(&self, _event: &BroadcastEvent) {}
}

/// A sink that ignores everything.
pub struct NullSink;

impl RaceSink for NullSink {}

/// Outbound write path handed to the engine by the transport.
pub type SendFn = Box<dyn Fn(&[u8]) -> Result<()> + Send + Sync>;

/// Protocol state machine for one broadcast session.
pub struct ProtocolEngine {
    /// Server-assigned id; 0 until the first registration result.
    connection_id: Arc<AtomicI32>,
    /// Informational identifier (usually the remote address).
    identifier: String,
    send: SendFn,
    /// Entry-list cache, exclusively owned by the engine.
    entries: RwLock<HashMap<u16, CarEntry>>,
    /// Zero instant initially, so the first desync refreshes immediately.
    last_entry_list_request: Mutex<Option<Instant>>,
    sink: Arc<dyn RaceSink>,
}

impl ProtocolEngine {
    pub fn new(identifier: impl Into<String>, send: SendFn, sink: Arc<dyn RaceSink>) -> Self {
        ProtocolEngine {
            connection_id: Arc::new(AtomicI32::new(0)),
            identifier: identifier.into(),
            send,
            entries: RwLock::new(HashMap::new()),
            last_entry_list_request: Mutex::new(None),
            sink,
        }
    }

    /// Current connection id (0 before registration).
    pub fn connection_id(&self) -> i32 {
        self.connection_id.load(Ordering::Acquire)
    }

    /// Shared handle to the connection id, for command senders that
    /// outlive the reader task.
    pub fn connection_id_handle(&self) -> Arc<AtomicI32> {
        Arc::clone(&self.connection_id)
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Cached entry for a car, if the list has delivered it.
    pub fn car(&self, car_index: u16) -> Option<CarEntry> {
        self.entries.read().expect("entry cache poisoned").get(&car_index).cloned()
    }

    pub fn car_count(&self) -> usize {
        self.entries.read().expect("entry cache poisoned").len()
    }

    /// Parses one inbound datagram and dispatches its payload.
    ///
    /// Codec and validation errors abort only this frame; the caller keeps
    /// reading. Sink errors do not exist by construction: sinks are
    /// infallible and panics are contained here.
    pub fn process_inbound(&self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        let mut r = ByteReader::new(data);
        let discriminator = r.read_u8().map_err(TelemetryError::Codec)?;
        let message = InboundMessage::try_from(discriminator).map_err(|e| {
            warn!(discriminator, "unknown inbound message type");
            TelemetryError::Codec(e)
        })?;

        match message {
            InboundMessage::RegistrationResult => self.on_registration_result(&mut r),
            InboundMessage::EntryList => self.on_entry_list(&mut r),
            InboundMessage::EntryListCar => self.on_entry_list_car(&mut r),
            InboundMessage::TrackData => self.on_track_data(&mut r),
            InboundMessage::RealtimeUpdate => self.on_session_update(&mut r),
            InboundMessage::RealtimeCarUpdate => self.on_car_update(&mut r),
            InboundMessage::BroadcastingEvent => self.on_broadcast_event(&mut r),
        }
    }

    fn on_registration_result(&self, r: &mut ByteReader<'_>) -> Result<()> {
        let state = decode::registration_result(r)?;
        self.connection_id.store(state.connection_id, Ordering::Release);

        info!(
            connection_id = state.connection_id,
            success = state.success,
            read_only = state.read_only,
            error = %state.error_message,
            "registration result"
        );

        self.dispatch(|| self.sink.connection_state(&state));

        if state.success {
            if let Err(e) = self.request_entry_list() {
                warn!(error = %e, "entry list request after registration failed");
            }
            if let Err(e) = self.request_track_data() {
                warn!(error = %e, "track data request after registration failed");
            }
        }

        Ok(())
    }

    fn on_entry_list(&self, r: &mut ByteReader<'_>) -> Result<()> {
        let (connection_id, indices) = decode::entry_list(r)?;
        debug!(connection_id, cars = indices.len(), "entry list received");

        // Placeholders only; descriptors are completed by the per-car
        // messages and dispatched from there.
        let mut cache = self.entries.write().expect("entry cache poisoned");
        cache.clear();
        for index in indices {
            cache.insert(index, CarEntry::placeholder(index));
        }

        Ok(())
    }

    fn on_entry_list_car(&self, r: &mut ByteReader<'_>) -> Result<()> {
        let entry = decode::entry_list_car(r)?;

        {
            let mut cache = self.entries.write().expect("entry cache poisoned");
            match cache.get_mut(&entry.car_index) {
                Some(slot) => *slot = entry.clone(),
                // Stale cross-message from a previous list; nothing to do.
                None => {
                    debug!(car_index = entry.car_index, "entry car for unlisted index ignored");
                    return Ok(());
                }
            }
        }

        debug!(
            car_index = entry.car_index,
            team = %entry.team_name,
            race_number = entry.race_number,
            "entry car received"
        );

        self.dispatch(|| self.sink.car_entry(&entry));
        Ok(())
    }

    fn on_track_data(&self, r: &mut ByteReader<'_>) -> Result<()> {
        let (connection_id, track) = decode::track_data(r)?;
        info!(
            connection_id,
            track = %track.name,
            length_m = track.length_m,
            "track data received"
        );

        self.dispatch(|| self.sink.track_data(&track));
        Ok(())
    }

    fn on_session_update(&self, r: &mut ByteReader<'_>) -> Result<()> {
        let update = decode::session_update(r)?;
        self.dispatch(|| self.sink.session_update(&update));
        Ok(())
    }

    fn on_car_update(&self, r: &mut ByteReader<'_>) -> Result<()> {
        let update = decode::car_update(r)?;

        let roster_matches = self
            .entries
            .read()
            .expect("entry cache poisoned")
            .get(&update.car_index)
            .is_some_and(|entry| entry.drivers.len() == update.driver_count as usize);

        if !roster_matches {
            // Late join or driver swap we have not seen: suppress the
            // update and resynchronize, rate-limited to one request per
            // second.
            let mut last = self.last_entry_list_request.lock().expect("request clock poisoned");
            let due = last.map_or(true, |at| at.elapsed() > ENTRY_LIST_REFRESH_INTERVAL);
            if due {
                warn!(car_index = update.car_index, "unknown car, requesting fresh entry list");
                *last = Some(Instant::now());
                drop(last);
                if let Err(e) = self.request_entry_list() {
                    warn!(error = %e, "entry list refresh failed");
                }
            }
            return Ok(());
        }

        self.dispatch(|| self.sink.car_update(&update));
        Ok(())
    }

    fn on_broadcast_event(&self, r: &mut ByteReader<'_>) -> Result<()> {
        let mut event = decode::broadcast_event(r)?;

        if event.car_id >= 0 {
            event.car = self.car(event.car_id as u16);
        }

        self.dispatch(|| self.sink.broadcast_event(&event));
        Ok(())
    }

    fn dispatch<F: FnOnce()>(&self, f: F) {
        if catch_unwind(AssertUnwindSafe(f)).is_err() {
            warn!("sink panicked during dispatch; frame dropped for that consumer");
        }
    }

    /// Emits a register frame. Fails if the display name does not fit the
    /// wire's u16 length prefix.
    pub fn request_connection(
        &self,
        display_name: &str,
        connection_password: &str,
        update_interval_ms: i32,
        command_password: &str,
    ) -> Result<()> {
        let frame =
            encode::register(display_name, connection_password, update_interval_ms, command_password)?;
        (self.send)(&frame)
    }

    /// Emits an unregister frame; best-effort.
    pub fn disconnect(&self) -> Result<()> {
        (self.send)(&encode::unregister(self.connection_id()))
    }

    pub fn request_entry_list(&self) -> Result<()> {
        debug!(connection_id = self.connection_id(), "requesting entry list");
        (self.send)(&encode::entry_list_request(self.connection_id()))
    }

    pub fn request_track_data(&self) -> Result<()> {
        debug!(connection_id = self.connection_id(), "requesting track data");
        (self.send)(&encode::track_data_request(self.connection_id()))
    }

    pub fn set_focus(&self, car_index: Option<u16>, camera: Option<(&str, &str)>) -> Result<()> {
        let frame = encode::focus_request(self.connection_id(), car_index, camera)?;
        (self.send)(&frame)
    }

    pub fn request_instant_replay(
        &self,
        start_session_time_ms: f32,
        duration_ms: f32,
        focused_car_index: i32,
        camera_set: &str,
        camera: &str,
    ) -> Result<()> {
        let frame = encode::instant_replay_request(
            self.connection_id(),
            start_session_time_ms,
            duration_ms,
            focused_car_index,
            camera_set,
            camera,
        )?;
        (self.send)(&frame)
    }

    pub fn request_hud_page(&self, page: &str) -> Result<()> {
        let frame = encode::hud_page_request(self.connection_id(), page)?;
        (self.send)(&frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CodecError, TelemetryError};
    use crate::test_utils::{
        car_update_frame, entry_car_frame, entry_list_frame, event_frame,
        registration_result_frame, sample_car_update, sample_entry,
    };

    #[derive(Default)]
    struct Recorder {
        states: Mutex<Vec<ConnectionState>>,
        entries: Mutex<Vec<CarEntry>>,
        cars: Mutex<Vec<CarUpdate>>,
        events: Mutex<Vec<BroadcastEvent>>,
    }

    impl RaceSink for Recorder {
        fn connection_state(&self, state: &ConnectionState) {
            self.states.lock().unwrap().push(state.clone());
        }
        fn car_entry(&self, entry: &CarEntry) {
            self.entries.lock().unwrap().push(entry.clone());
        }
        fn car_update(&self, update: &CarUpdate) {
            self.cars.lock().unwrap().push(update.clone());
        }
        fn broadcast_event(&self, event: &BroadcastEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn engine_with_recorder() -> (Arc<ProtocolEngine>, Arc<Recorder>, Arc<Mutex<Vec<Vec<u8>>>>) {
        let sent: Arc<Mutex<Vec<Vec<u8>>>> = Arc::default();
        let sink = Arc::new(Recorder::default());
        let tx = Arc::clone(&sent);
        let send: SendFn = Box::new(move |frame| {
            tx.lock().unwrap().push(frame.to_vec());
            Ok(())
        });
        let engine = Arc::new(ProtocolEngine::new("test", send, sink.clone()));
        (engine, sink, sent)
    }

    #[test]
    fn registration_success_assigns_id_and_refreshes() {
        let (engine, sink, sent) = engine_with_recorder();

        // type=1, id=42, success=1, readonly=1, error="".
        engine
            .process_inbound(&[0x01, 0x2A, 0x00, 0x00, 0x00, 0x01, 0x01, 0x00, 0x00])
            .unwrap();

        assert_eq!(engine.connection_id(), 42);

        let states = sink.states.lock().unwrap();
        assert_eq!(states.len(), 1);
        assert!(states[0].success);

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(&sent[0][..5], &[0x0A, 0x2A, 0x00, 0x00, 0x00]);
        assert_eq!(&sent[1][..5], &[0x0B, 0x2A, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn registration_failure_does_not_refresh() {
        let (engine, sink, sent) = engine_with_recorder();
        engine
            .process_inbound(&registration_result_frame(7, false, 1, "wrong password"))
            .unwrap();

        assert_eq!(engine.connection_id(), 7);
        assert!(!sink.states.lock().unwrap()[0].success);
        assert!(sent.lock().unwrap().is_empty());
    }

    #[test]
    fn entry_list_then_car_completes_descriptor() {
        let (engine, sink, _sent) = engine_with_recorder();

        engine.process_inbound(&entry_list_frame(42, &[5, 9])).unwrap();
        assert_eq!(engine.car_count(), 2);
        // Placeholders are not dispatched.
        assert!(sink.entries.lock().unwrap().is_empty());

        engine.process_inbound(&entry_car_frame(&sample_entry(5))).unwrap();

        let car = engine.car(5).expect("car 5 cached");
        assert_eq!(car.team_name, "Red Ferrari");
        assert_eq!(car.race_number, 31);
        assert_eq!(car.drivers[0].full_name(), "John Doe");
        assert_eq!(sink.entries.lock().unwrap().len(), 1);
    }

    #[test]
    fn entry_car_for_unlisted_index_is_ignored() {
        let (engine, sink, _sent) = engine_with_recorder();

        engine.process_inbound(&entry_list_frame(42, &[])).unwrap();
        engine.process_inbound(&entry_car_frame(&sample_entry(5))).unwrap();

        assert!(engine.car(5).is_none());
        assert!(sink.entries.lock().unwrap().is_empty());
    }

    #[test]
    fn desync_suppresses_update_and_requests_refresh_once() {
        let (engine, sink, sent) = engine_with_recorder();

        // Unknown car with an empty cache: suppressed, one refresh frame.
        engine.process_inbound(&car_update_frame(&sample_car_update(5, 1))).unwrap();
        assert!(sink.cars.lock().unwrap().is_empty());
        {
            let sent = sent.lock().unwrap();
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0][0], 0x0A);
        }

        // A second desynced update inside the refresh interval stays quiet.
        engine.process_inbound(&car_update_frame(&sample_car_update(5, 1))).unwrap();
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn matching_roster_dispatches_update() {
        let (engine, sink, _sent) = engine_with_recorder();

        engine.process_inbound(&entry_list_frame(42, &[5])).unwrap();
        engine.process_inbound(&entry_car_frame(&sample_entry(5))).unwrap();
        engine.process_inbound(&car_update_frame(&sample_car_update(5, 1))).unwrap();

        let cars = sink.cars.lock().unwrap();
        assert_eq!(cars.len(), 1);
        assert_eq!(cars[0].car_index, 5);
    }

    #[test]
    fn driver_count_mismatch_counts_as_desync() {
        let (engine, sink, sent) = engine_with_recorder();

        engine.process_inbound(&entry_list_frame(42, &[5])).unwrap();
        engine.process_inbound(&entry_car_frame(&sample_entry(5))).unwrap();
        engine.process_inbound(&car_update_frame(&sample_car_update(5, 2))).unwrap();

        assert!(sink.cars.lock().unwrap().is_empty());
        assert_eq!(sent.lock().unwrap().last().unwrap()[0], 0x0A);
    }

    #[test]
    fn broadcast_event_attaches_cached_entry() {
        let (engine, sink, _sent) = engine_with_recorder();

        engine.process_inbound(&entry_list_frame(42, &[7])).unwrap();
        engine.process_inbound(&entry_car_frame(&sample_entry(7))).unwrap();
        engine.process_inbound(&event_frame(4, "Contact", 20_000, 7)).unwrap();

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].car.as_ref().unwrap().team_name, "Red Ferrari");
    }

    #[test]
    fn unknown_discriminator_is_an_error() {
        let (engine, _sink, _sent) = engine_with_recorder();
        match engine.process_inbound(&[0x63]) {
            Err(TelemetryError::Codec(CodecError::UnknownMessageType(0x63))) => {}
            other => panic!("expected unknown message type, got {other:?}"),
        }
    }

    #[test]
    fn empty_datagram_is_a_no_op() {
        let (engine, _sink, sent) = engine_with_recorder();
        engine.process_inbound(&[]).unwrap();
        assert!(sent.lock().unwrap().is_empty());
    }

    #[test]
    fn truncated_frame_leaves_cache_unchanged() {
        let (engine, _sink, _sent) = engine_with_recorder();
        engine.process_inbound(&entry_list_frame(42, &[5])).unwrap();

        let frame = entry_list_frame(42, &[6, 7]);
        for cut in 1..frame.len() {
            let _ = engine.process_inbound(&frame[..cut]);
        }
        // The partial lists never replaced the cache.
        assert!(engine.car(5).is_some());
    }

    #[test]
    fn panicking_sink_does_not_kill_processing() {
        struct Bomb;
        impl RaceSink for Bomb {
            fn connection_state(&self, _: &ConnectionState) {
                panic!("subscriber bug");
            }
        }

        let send: SendFn = Box::new(|_| Ok(()));
        let engine = ProtocolEngine::new("test", send, Arc::new(Bomb));
        engine.process_inbound(&registration_result_frame(1, false, 1, "")).unwrap();
        assert_eq!(engine.connection_id(), 1);
    }
}
