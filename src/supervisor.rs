//! Connection supervisor.
//!
//! A 100 ms polling state machine over the secondary telemetry feed that
//! decides when the broadcast session is opened, held and torn down. The
//! game's menu screen also reports `Off`, so liveness is inferred from the
//! physics packet id: a strictly increasing id with `Off` status means the
//! game is paused in the menu, a stalled or zero id means it is gone.

use std::net::SocketAddr;
use std::sync::atomic::AtomicI32;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, TelemetryError};
use crate::model::RaceModel;
use crate::protocol::encode;
use crate::protocol::engine::{ProtocolEngine, RaceSink};
use crate::shmem::GameStatus;
use crate::transport::Transport;

/// Supervisor poll period; the supervisor never cycles faster than this.
pub const TICK_PERIOD: Duration = Duration::from_millis(100);
/// Wait after a failed attach before trying again.
pub const ATTACH_BACKOFF: Duration = Duration::from_secs(5);
/// Wait after the game resumes from pause before re-attaching.
pub const PAUSE_RESUME_DELAY: Duration = Duration::from_secs(1);
/// How long registration may stay unanswered before the attempt counts as
/// failed.
pub const REGISTRATION_TIMEOUT: Duration = Duration::from_secs(5);

/// One observation of the secondary feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedSnapshot {
    pub readable: bool,
    pub status: GameStatus,
    pub packet_id: i32,
}

impl FeedSnapshot {
    pub fn unreadable() -> Self {
        FeedSnapshot { readable: false, status: GameStatus::Off, packet_id: 0 }
    }
}

/// Source of [`FeedSnapshot`]s, polled once per tick.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn sample(&mut self) -> FeedSnapshot;
}

/// Lifecycle of the broadcast link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Detached,
    Attaching,
    Attached,
    Paused,
    Detaching,
}

/// What the runner should do after an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkCommand {
    Idle,
    /// Open transport and register.
    Attach,
    /// Re-attach after the pause delay.
    Resume,
    /// Game paused in the menu: drop the session, keep watching.
    Pause,
    /// Game gone or feed dead: drop the session.
    Detach,
}

/// Pure transition logic of the supervisor, one observation at a time.
///
/// Separated from the async runner so the state machine is testable
/// against scripted feed snapshots.
#[derive(Debug)]
pub struct LinkTracker {
    state: LinkState,
    last_packet_id: i32,
}

impl Default for LinkTracker {
    fn default() -> Self {
        LinkTracker::new()
    }
}

impl LinkTracker {
    pub fn new() -> Self {
        LinkTracker { state: LinkState::Detached, last_packet_id: 0 }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// The game is truly closed when the packet id stalls or resets.
    fn game_closed(&self, packet_id: i32) -> bool {
        packet_id == 0 || packet_id <= self.last_packet_id
    }

    pub fn observe(&mut self, snap: &FeedSnapshot) -> LinkCommand {
        match self.state {
            LinkState::Detached => {
                if snap.readable && snap.status != GameStatus::Off {
                    self.state = LinkState::Attaching;
                    LinkCommand::Attach
                } else {
                    LinkCommand::Idle
                }
            }
            LinkState::Attaching => {
                if !snap.readable {
                    self.state = LinkState::Detaching;
                    LinkCommand::Detach
                } else {
                    // Registration progress is the runner's business.
                    LinkCommand::Idle
                }
            }
            LinkState::Attached => {
                if !snap.readable {
                    self.state = LinkState::Detaching;
                    return LinkCommand::Detach;
                }
                if snap.status == GameStatus::Off {
                    let closed = self.game_closed(snap.packet_id);
                    self.last_packet_id = snap.packet_id;
                    if closed {
                        self.state = LinkState::Detaching;
                        LinkCommand::Detach
                    } else {
                        self.state = LinkState::Paused;
                        LinkCommand::Pause
                    }
                } else {
                    LinkCommand::Idle
                }
            }
            LinkState::Paused => {
                if !snap.readable {
                    self.state = LinkState::Detaching;
                    return LinkCommand::Detach;
                }
                if snap.status != GameStatus::Off {
                    self.state = LinkState::Attaching;
                    LinkCommand::Resume
                } else {
                    let closed = self.game_closed(snap.packet_id);
                    self.last_packet_id = snap.packet_id;
                    if closed {
                        self.state = LinkState::Detaching;
                        LinkCommand::Detach
                    } else {
                        LinkCommand::Idle
                    }
                }
            }
            LinkState::Detaching => {
                self.enter_detached();
                LinkCommand::Idle
            }
        }
    }

    /// Registration succeeded.
    pub fn mark_attached(&mut self) {
        self.state = LinkState::Attached;
    }

    /// Attach or registration failed; back to square one.
    pub fn fail_attach(&mut self) {
        self.enter_detached();
    }

    /// Session died underneath us (reader exit, timeout).
    pub fn force_detached(&mut self) {
        self.enter_detached();
    }

    fn enter_detached(&mut self) {
        self.state = LinkState::Detached;
        // Invariant: the packet id tracker resets with the state machine.
        self.last_packet_id = 0;
    }
}

/// Connection settings for the broadcast session.
#[derive(Debug, Clone)]
pub struct BroadcastSettings {
    pub host: String,
    pub port: u16,
    pub display_name: String,
    pub connection_password: String,
    pub command_password: String,
    pub update_interval_ms: i32,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        BroadcastSettings {
            host: "127.0.0.1".into(),
            port: 9000,
            display_name: "pitwire".into(),
            connection_password: String::new(),
            command_password: String::new(),
            update_interval_ms: 100,
        }
    }
}

impl BroadcastSettings {
    /// Settings from the simulator's own broadcasting configuration.
    pub fn from_config(config: &crate::config::BroadcastConfig) -> Self {
        BroadcastSettings {
            port: config.udp_listener_port,
            connection_password: config.connection_password.clone(),
            command_password: config.command_password.clone(),
            ..BroadcastSettings::default()
        }
    }
}

/// Imperative controls of an attached session.
///
/// Cheap to clone out of the supervisor handle; every call goes straight
/// to the socket with the current connection id.
pub struct SessionCommands {
    transport: Arc<Transport>,
    connection_id: Arc<AtomicI32>,
}

impl SessionCommands {
    fn connection_id(&self) -> i32 {
        self.connection_id.load(std::sync::atomic::Ordering::Acquire)
    }

    pub fn set_focus(&self, car_index: Option<u16>, camera: Option<(&str, &str)>) -> Result<()> {
        let frame = encode::focus_request(self.connection_id(), car_index, camera)?;
        self.transport.send(&frame)
    }

    /// Camera change without touching the focused car.
    pub fn set_camera(&self, camera_set: &str, camera: &str) -> Result<()> {
        self.set_focus(None, Some((camera_set, camera)))
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
        self.transport.send(&frame)
    }

    pub fn request_hud_page(&self, page: &str) -> Result<()> {
        let frame = encode::hud_page_request(self.connection_id(), page)?;
        self.transport.send(&frame)
    }

    pub fn request_entry_list(&self) -> Result<()> {
        self.transport.send(&encode::entry_list_request(self.connection_id()))
    }

    pub fn request_track_data(&self) -> Result<()> {
        self.transport.send(&encode::track_data_request(self.connection_id()))
    }
}

/// Clonable view on a running supervisor.
#[derive(Clone)]
pub struct SupervisorHandle {
    state_rx: watch::Receiver<LinkState>,
    commands: Arc<RwLock<Option<SessionCommands>>>,
}

impl SupervisorHandle {
    pub fn state(&self) -> LinkState {
        *self.state_rx.borrow()
    }

    /// Stream of link-state changes, starting with the current state.
    pub fn state_updates(&self) -> impl Stream<Item = LinkState> + 'static {
        WatchStream::new(self.state_rx.clone())
    }

    fn with_commands<T>(&self, f: impl FnOnce(&SessionCommands) -> Result<T>) -> Result<T> {
        let guard = self.commands.read().expect("commands lock poisoned");
        match guard.as_ref() {
            Some(commands) => f(commands),
            None => Err(TelemetryError::NotConnected),
        }
    }

    pub fn set_focus(&self, car_index: Option<u16>, camera: Option<(&str, &str)>) -> Result<()> {
        self.with_commands(|c| c.set_focus(car_index, camera))
    }

    pub fn set_camera(&self, camera_set: &str, camera: &str) -> Result<()> {
        self.with_commands(|c| c.set_camera(camera_set, camera))
    }

    pub fn request_instant_replay(
        &self,
        start_session_time_ms: f32,
        duration_ms: f32,
        focused_car_index: i32,
        camera_set: &str,
        camera: &str,
    ) -> Result<()> {
        self.with_commands(|c| {
            c.request_instant_replay(
                start_session_time_ms,
                duration_ms,
                focused_car_index,
                camera_set,
                camera,
            )
        })
    }

    pub fn request_hud_page(&self, page: &str) -> Result<()> {
        self.with_commands(|c| c.request_hud_page(page))
    }

    pub fn request_entry_list(&self) -> Result<()> {
        self.with_commands(|c| c.request_entry_list())
    }

    pub fn request_track_data(&self) -> Result<()> {
        self.with_commands(|c| c.request_track_data())
    }
}

struct ActiveSession {
    transport: Arc<Transport>,
    engine: Arc<ProtocolEngine>,
    reader: JoinHandle<Result<()>>,
    started: Instant,
}

/// Owns the broadcast session lifecycle.
pub struct Supervisor {
    settings: BroadcastSettings,
    model: Arc<RaceModel>,
    source: Box<dyn StatusSource>,
    tracker: LinkTracker,
    session: Option<ActiveSession>,
    /// Gate in front of the next attach attempt (backoff, pause delay).
    next_attach_at: Option<Instant>,
    state_tx: watch::Sender<LinkState>,
    commands: Arc<RwLock<Option<SessionCommands>>>,
}

impl Supervisor {
    pub fn new(
        settings: BroadcastSettings,
        model: Arc<RaceModel>,
        source: Box<dyn StatusSource>,
    ) -> Self {
        let (state_tx, _) = watch::channel(LinkState::Detached);
        Supervisor {
            settings,
            model,
            source,
            tracker: LinkTracker::new(),
            session: None,
            next_attach_at: None,
            state_tx,
            commands: Arc::new(RwLock::new(None)),
        }
    }

    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle {
            state_rx: self.state_tx.subscribe(),
            commands: Arc::clone(&self.commands),
        }
    }

    /// Runs the tick loop until cancelled, then drains the session.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("connection supervisor started");
        let mut ticker = tokio::time::interval(TICK_PERIOD);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.detach(true).await;
                    self.tracker.force_detached();
                    self.publish_state();
                    info!("connection supervisor stopped");
                    return;
                }
                _ = ticker.tick() => self.tick().await,
            }
        }
    }

    async fn tick(&mut self) {
        let snap = self.source.sample().await;

        // A dead reader while nominally attached is a disconnect.
        if matches!(self.tracker.state(), LinkState::Attached)
            && self.session.as_ref().is_some_and(|s| s.reader.is_finished())
        {
            warn!("transport reader exited, detaching");
            self.detach(false).await;
            self.tracker.force_detached();
            self.next_attach_at = Some(Instant::now() + ATTACH_BACKOFF);
        }

        match self.tracker.observe(&snap) {
            LinkCommand::Idle | LinkCommand::Attach => {}
            LinkCommand::Resume => {
                info!("game resumed, re-attaching after delay");
                self.next_attach_at = Some(Instant::now() + PAUSE_RESUME_DELAY);
            }
            LinkCommand::Pause => {
                info!("game paused in menu, dropping session");
                self.detach(true).await;
            }
            LinkCommand::Detach => {
                info!("game closed, dropping session");
                self.detach(true).await;
            }
        }

        if self.tracker.state() == LinkState::Attaching {
            self.drive_attach().await;
        }

        self.publish_state();
    }

    async fn drive_attach(&mut self) {
        let started = match self.session.as_ref().map(|s| s.started) {
            None => {
                let gate_open = self.next_attach_at.map_or(true, |at| Instant::now() >= at);
                if !gate_open {
                    return;
                }
                match self.attach().await {
                    Ok(session) => self.session = Some(session),
                    Err(e) => {
                        warn!(error = %e, "attach failed, backing off");
                        self.tracker.fail_attach();
                        self.next_attach_at = Some(Instant::now() + ATTACH_BACKOFF);
                    }
                }
                return;
            }
            Some(started) => started,
        };

        match self.model.connection_state() {
            Some(state) if state.success => {
                info!(connection_id = state.connection_id, "broadcast session attached");
                self.tracker.mark_attached();
                self.next_attach_at = None;
            }
            Some(state) => {
                warn!(error = %state.error_message, "registration rejected");
                self.detach(false).await;
                self.tracker.fail_attach();
                self.next_attach_at = Some(Instant::now() + ATTACH_BACKOFF);
            }
            None if started.elapsed() > REGISTRATION_TIMEOUT => {
                warn!("registration unanswered, backing off");
                self.detach(false).await;
                self.tracker.fail_attach();
                self.next_attach_at = Some(Instant::now() + ATTACH_BACKOFF);
            }
            None => {}
        }
    }

    async fn attach(&mut self) -> Result<ActiveSession> {
        let addr = self.resolve_remote().await?;
        let transport = Arc::new(Transport::connect(addr).await?);

        self.model.reset_connection();
        let sink: Arc<dyn RaceSink> = self.model.clone();
        let engine =
            Arc::new(ProtocolEngine::new(addr.to_string(), transport.sender(), sink));

        let reader = {
            let transport = Arc::clone(&transport);
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { transport.read_loop(engine).await })
        };

        if let Err(e) = engine.request_connection(
            &self.settings.display_name,
            &self.settings.connection_password,
            self.settings.update_interval_ms,
            &self.settings.command_password,
        ) {
            transport.shutdown();
            reader.abort();
            return Err(e);
        }

        *self.commands.write().expect("commands lock poisoned") = Some(SessionCommands {
            transport: Arc::clone(&transport),
            connection_id: engine.connection_id_handle(),
        });

        debug!(%addr, "registration requested");
        Ok(ActiveSession { transport, engine, reader, started: Instant::now() })
    }

    async fn resolve_remote(&self) -> Result<SocketAddr> {
        let mut addrs = tokio::net::lookup_host((self.settings.host.as_str(), self.settings.port))
            .await
            .map_err(|e| TelemetryError::transport("resolve", e))?;
        addrs.next().ok_or_else(|| {
            TelemetryError::transport(
                "resolve",
                std::io::Error::new(std::io::ErrorKind::NotFound, "no address for host"),
            )
        })
    }

    /// Single drain point: unregister (best effort), stop the reader, drop
    /// the socket.
    async fn detach(&mut self, unregister: bool) {
        *self.commands.write().expect("commands lock poisoned") = None;

        if let Some(session) = self.session.take() {
            if unregister {
                if let Err(e) = session.engine.disconnect() {
                    debug!(error = %e, "unregister frame not sent");
                }
            }
            session.transport.shutdown();
            if let Err(e) = session.reader.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "reader task join failed");
                }
            }
        }
    }

    fn publish_state(&self) {
        self.state_tx.send_if_modified(|state| {
            if *state != self.tracker.state() {
                *state = self.tracker.state();
                true
            } else {
                false
            }
        });
    }
}
