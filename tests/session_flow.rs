//! End-to-end session lifecycle against a scripted server and feed.
//!
//! A local UDP socket plays the simulator's broadcast side while a
//! scripted status source plays the shared-memory feed. The supervisor
//! must register, sync the entry list, surface live data through the
//! model, and tear the session down when the game goes away.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use pitwire::test_utils::{
    car_update_frame, entry_car_frame, entry_list_frame, registration_result_frame, sample_car_update,
    sample_entry, sample_session_update, session_update_frame, track_data_frame,
};
use pitwire::{
    BroadcastSettings, FeedSnapshot, GameStatus, LinkState, RaceModel, StatusSource, Supervisor,
    TrackData,
};

/// Feed snapshot the test flips at will.
#[derive(Clone)]
struct ScriptedFeed {
    snapshot: Arc<Mutex<FeedSnapshot>>,
    auto_advance: Arc<Mutex<bool>>,
}

impl ScriptedFeed {
    fn live() -> Self {
        ScriptedFeed {
            snapshot: Arc::new(Mutex::new(FeedSnapshot {
                readable: true,
                status: GameStatus::Live,
                packet_id: 1,
            })),
            auto_advance: Arc::new(Mutex::new(true)),
        }
    }

    fn set(&self, status: GameStatus, packet_id: i32) {
        let mut snap = self.snapshot.lock().unwrap();
        snap.status = status;
        snap.packet_id = packet_id;
    }

    fn freeze_packet_id(&self) {
        *self.auto_advance.lock().unwrap() = false;
    }
}

#[async_trait]
impl StatusSource for ScriptedFeed {
    async fn sample(&mut self) -> FeedSnapshot {
        let mut snap = self.snapshot.lock().unwrap();
        if *self.auto_advance.lock().unwrap() {
            snap.packet_id += 1;
        }
        *snap
    }
}

async fn wait_for<F: FnMut() -> bool>(what: &str, mut condition: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

fn sample_track() -> TrackData {
    TrackData {
        name: "Monza".into(),
        id: 7,
        length_m: 5793,
        camera_sets: Default::default(),
        hud_pages: vec!["Broadcasting".into()],
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn full_session_lifecycle() {
    let server = UdpSocket::bind(("127.0.0.1", 0)).await.unwrap();
    let port = server.local_addr().unwrap().port();

    let model = Arc::new(RaceModel::new());
    let feed = ScriptedFeed::live();

    let settings = BroadcastSettings {
        host: "127.0.0.1".into(),
        port,
        display_name: "pitwire-test".into(),
        ..BroadcastSettings::default()
    };

    let supervisor = Supervisor::new(settings, Arc::clone(&model), Box::new(feed.clone()));
    let handle = supervisor.handle();
    let cancel = CancellationToken::new();
    let runner = tokio::spawn(supervisor.run(cancel.clone()));

    // The client must register with protocol version 4.
    let mut buf = [0u8; 1024];
    let (n, client) = server.recv_from(&mut buf).await.unwrap();
    assert_eq!(buf[0], 1, "first frame is a register request");
    assert_eq!(buf[1], 4, "protocol version byte");
    assert!(n >= 2);

    server.send_to(&registration_result_frame(42, true, 1, ""), client).await.unwrap();

    // Registration success triggers entry-list and track-data requests.
    let mut seen = Vec::new();
    for _ in 0..2 {
        let (n, _) = server.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[1..5], &[0x2A, 0, 0, 0], "requests carry the connection id");
        seen.push(buf[..n][0]);
    }
    seen.sort_unstable();
    assert_eq!(seen, vec![0x0A, 0x0B]);

    wait_for("attached state", || handle.state() == LinkState::Attached).await;

    // Serve the session: entry list and car details first, so the later
    // car update matches the cached roster.
    server.send_to(&entry_list_frame(42, &[5]), client).await.unwrap();
    server.send_to(&entry_car_frame(&sample_entry(5)), client).await.unwrap();
    server.send_to(&track_data_frame(42, &sample_track()), client).await.unwrap();
    wait_for("entry synced", || {
        model.car(5).is_some_and(|record| record.entry.is_some())
    })
    .await;
    wait_for("track data in the model", || model.track().is_some()).await;

    server.send_to(&car_update_frame(&sample_car_update(5, 1)), client).await.unwrap();
    wait_for("car sample in the model", || {
        model.car(5).is_some_and(|record| record.sample.is_some())
    })
    .await;

    // The leaderboard refreshes on session updates.
    server.send_to(&session_update_frame(&sample_session_update()), client).await.unwrap();
    wait_for("standings", || !model.standings().is_empty()).await;

    // Focus commands work while attached.
    handle.set_focus(Some(5), None).unwrap();
    let (_, _) = server.recv_from(&mut buf).await.unwrap();
    assert_eq!(buf[0], 50);

    // Game exits: status off with a stalled packet id.
    feed.freeze_packet_id();
    feed.set(GameStatus::Off, 0);

    wait_for("detached state", || handle.state() == LinkState::Detached).await;
    assert!(handle.set_focus(None, None).is_err(), "commands need a session");

    cancel.cancel();
    runner.await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn menu_pause_keeps_supervisor_cycling() {
    let server = UdpSocket::bind(("127.0.0.1", 0)).await.unwrap();
    let port = server.local_addr().unwrap().port();

    let model = Arc::new(RaceModel::new());
    let feed = ScriptedFeed::live();

    let settings = BroadcastSettings {
        host: "127.0.0.1".into(),
        port,
        ..BroadcastSettings::default()
    };
    let supervisor = Supervisor::new(settings, Arc::clone(&model), Box::new(feed.clone()));
    let handle = supervisor.handle();
    let cancel = CancellationToken::new();
    let runner = tokio::spawn(supervisor.run(cancel.clone()));

    let mut buf = [0u8; 1024];
    let (_, client) = server.recv_from(&mut buf).await.unwrap();
    server.send_to(&registration_result_frame(7, true, 1, ""), client).await.unwrap();
    wait_for("attached state", || handle.state() == LinkState::Attached).await;

    // Menu screen: off, but the physics packet id keeps rising.
    feed.set(GameStatus::Off, 100);
    wait_for("paused state", || handle.state() == LinkState::Paused).await;

    // Back to the track: re-attach (after the pause delay) and register
    // again.
    feed.set(GameStatus::Live, 5000);
    wait_for("re-registration", || {
        // Drain whatever the client sent; a new register frame means the
        // supervisor came back.
        matches!(server.try_recv_from(&mut buf), Ok((n, _)) if n > 0 && buf[0] == 1)
    })
    .await;

    cancel.cancel();
    runner.await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_registration_backs_off() {
    let server = UdpSocket::bind(("127.0.0.1", 0)).await.unwrap();
    let port = server.local_addr().unwrap().port();

    let model = Arc::new(RaceModel::new());
    let feed = ScriptedFeed::live();
    let settings = BroadcastSettings {
        host: "127.0.0.1".into(),
        port,
        ..BroadcastSettings::default()
    };
    let supervisor = Supervisor::new(settings, Arc::clone(&model), Box::new(feed.clone()));
    let handle = supervisor.handle();
    let cancel = CancellationToken::new();
    let runner = tokio::spawn(supervisor.run(cancel.clone()));

    let mut buf = [0u8; 1024];
    let (_, client) = server.recv_from(&mut buf).await.unwrap();
    server
        .send_to(&registration_result_frame(0, false, 1, "wrong password"), client)
        .await
        .unwrap();

    wait_for("back to detached", || handle.state() == LinkState::Detached).await;
    assert!(model.connection_state().is_none() || !model.connection_state().unwrap().success);

    cancel.cancel();
    runner.await.unwrap();
}
