//! # Session State Machine
//!
//! One [`Session`] owns the lifecycle of a single game connection:
//! `Disconnected → Authenticating → PendingGame → Entered → Disconnected`,
//! with `Entered` split into alive and dead. The session is synchronous and
//! single-threaded; transports and timers feed it through
//! [`Session::handle_event`] on the host's turn queue, and every
//! host-initiated action passes the action gate before any wire traffic.
//!
//! Resets cancel timers first and clear registries last, so a callback
//! delivered mid-reset only ever observes a fully-old or fully-new session.

pub mod containers;
pub mod gate;
pub mod ping;
pub mod timers;
pub mod vips;
pub mod walk;

use std::time::Instant;

use tracing::{debug, instrument, warn};

use crate::config::SessionConfig;
use crate::error::{ProtocolError, Result};
use crate::features::{FeatureSet, GameFeature};
use crate::protocol::command::ClientCommand;
use crate::protocol::encode::{self, Challenge, LoginRequest};
use crate::protocol::types::{
    ChaseMode, ClientOs, Credentials, Direction, FightMode, MessageMode, Outfit, Position,
    PvpMode, VipEntry, VipStatus,
};
use crate::sink::{DeathKind, Environment, EventSink, MapProbe};
use crate::transport::{RsaCipher, Transport};

use containers::{Container, ContainerRegistry};
use gate::{ActionGate, GateContext};
use ping::PingTracker;
use timers::{Scheduler, TimerHandle, TimerKind};
use vips::VipRegistry;
use walk::{WalkSequencer, FLAG_AUTO_WALK, FLAG_PREWALK};

/// Lifecycle states of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Authenticating,
    PendingGame,
    EnteredAlive,
    EnteredDead,
}

impl SessionState {
    fn entered(self) -> bool {
        matches!(self, SessionState::EnteredAlive | SessionState::EnteredDead)
    }
}

/// Everything the host's turn queue can deliver into the session: decoded
/// server events, transport lifecycle changes, and timer firings.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Pre-login challenge; answering it sends the login packet.
    Challenge { timestamp: u32, random: u8 },
    LoggedIn,
    LoginError { message: String },
    PendingGame,
    EnterGame,
    GameStart,
    GameEnd,
    Death { kind: DeathKind, penalty: u8 },

    /// Server asked for a keepalive reply.
    PingRequest,
    /// Legacy keepalive ack.
    PingBack,
    /// Extended keepalive ack for one probe id.
    PingBackExtended { ping_id: u32 },

    WalkCancelled,
    PredictiveWalkCancelled { position: Position, direction: Direction },
    WalkIdSync { walk_id: u32 },
    PlayerMoved { position: Position, direction: Direction },

    AttackCancelled { seq: u32 },
    ModeSync {
        fight: FightMode,
        chase: ChaseMode,
        safe_fight: bool,
        pvp: PvpMode,
    },
    GmActions { actions: Vec<u8> },

    ContainerOpened { container_id: u8, container: Container },
    ContainerClosed { container_id: u8 },
    VipAdded { player_id: u32, entry: VipEntry },
    VipStateChanged { player_id: u32, status: VipStatus },

    ConnectionError { message: String, code: u8 },
    TransportClosed,

    PingTimer,
    ExtendedPingTimer,
    ConnectionCheckTimer,
}

/// The little the session tracks about its own character.
#[derive(Debug, Clone)]
struct LocalPlayer {
    name: String,
    position: Position,
    direction: Direction,
    walking: bool,
}

impl LocalPlayer {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            position: Position::default(),
            direction: Direction::South,
            walking: false,
        }
    }
}

#[derive(Debug, Default)]
struct ActiveTimers {
    ping: Option<TimerHandle>,
    extended_ping: Option<TimerHandle>,
    connection_check: Option<TimerHandle>,
}

impl ActiveTimers {
    fn cancel_all(&mut self) {
        for handle in [
            self.ping.take(),
            self.extended_ping.take(),
            self.connection_check.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.cancel();
        }
    }
}

/// A single game-session engine. See the module docs for the lifecycle.
pub struct Session {
    config: SessionConfig,
    features: Option<FeatureSet>,
    state: SessionState,

    transport: Option<Box<dyn Transport>>,
    rsa: Box<dyn RsaCipher>,
    scheduler: Box<dyn Scheduler>,
    sink: Box<dyn EventSink>,
    environment: Box<dyn Environment>,
    map: Box<dyn MapProbe>,

    gate: ActionGate,
    walk: WalkSequencer,
    ping: PingTracker,
    containers: ContainerRegistry,
    vips: VipRegistry,
    timers: ActiveTimers,

    credentials: Credentials,
    local_player: Option<LocalPlayer>,
    login_sent: bool,

    fight_mode: FightMode,
    chase_mode: ChaseMode,
    safe_fight: bool,
    pvp_mode: PvpMode,

    attacking: Option<u32>,
    following: Option<u32>,
    seq: u32,

    gm_actions: Vec<u8>,
    last_traffic: Option<Instant>,
    connection_fail_warned: bool,
}

impl Session {
    pub fn new(
        config: SessionConfig,
        rsa: Box<dyn RsaCipher>,
        scheduler: Box<dyn Scheduler>,
        sink: Box<dyn EventSink>,
        environment: Box<dyn Environment>,
        map: Box<dyn MapProbe>,
    ) -> Self {
        Self {
            config,
            features: None,
            state: SessionState::Disconnected,
            transport: None,
            rsa,
            scheduler,
            sink,
            environment,
            map,
            gate: ActionGate::new(false),
            walk: WalkSequencer::new(),
            ping: PingTracker::new(),
            containers: ContainerRegistry::new(),
            vips: VipRegistry::new(),
            timers: ActiveTimers::default(),
            credentials: Credentials::default(),
            local_player: None,
            login_sent: false,
            fight_mode: FightMode::Balanced,
            chase_mode: ChaseMode::DontChase,
            safe_fight: true,
            pvp_mode: PvpMode::WhiteDove,
            attacking: None,
            following: None,
            seq: 0,
            gm_actions: Vec::new(),
            last_traffic: None,
            connection_fail_warned: false,
        }
    }

    // --- negotiation and lifecycle ---------------------------------------

    /// Negotiate the protocol version (plus any server-advertised extras)
    /// for the next login. Rejected while a session is live.
    pub fn set_protocol_version(&mut self, version: u16, extras: GameFeature) -> Result<()> {
        if self.state != SessionState::Disconnected {
            return Err(ProtocolError::AlreadyOnline);
        }
        let features = FeatureSet::negotiate_with(version, extras);
        self.gate = ActionGate::new(features.has(GameFeature::BOT_PROTECTION));
        self.features = Some(features);
        Ok(())
    }

    pub fn features(&self) -> Option<&FeatureSet> {
        self.features.as_ref()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_online(&self) -> bool {
        self.state.entered()
    }

    /// Start a login against a world server. The host supplies the
    /// connected transport; the session owns it from here on.
    #[instrument(skip_all, fields(character = %credentials.character_name))]
    pub fn login_world(
        &mut self,
        credentials: Credentials,
        transport: Box<dyn Transport>,
    ) -> Result<()> {
        if self.state != SessionState::Disconnected || self.transport.is_some() {
            return Err(ProtocolError::AlreadyOnline);
        }
        let features = self.features.ok_or(ProtocolError::ProtocolNotConfigured)?;

        self.reset_game_state();
        self.local_player = Some(LocalPlayer::new(&credentials.character_name));
        self.credentials = credentials;
        self.transport = Some(transport);
        self.state = SessionState::Authenticating;

        // without a challenge the login packet goes out immediately
        if !features.has(GameFeature::CHALLENGE_ON_LOGIN) {
            self.send_login_packet(None)?;
        }
        Ok(())
    }

    /// Replay a recorded session. The transport plays back captured
    /// traffic; the state machine runs exactly as if it were live.
    pub fn play_record(&mut self, transport: Box<dyn Transport>) -> Result<()> {
        if self.state != SessionState::Disconnected || self.transport.is_some() {
            return Err(ProtocolError::AlreadyOnline);
        }
        if self.features.is_none() {
            return Err(ProtocolError::ProtocolNotConfigured);
        }

        self.reset_game_state();
        self.local_player = Some(LocalPlayer::new("Player"));
        self.credentials = Credentials {
            character_name: "Player".into(),
            world_name: "Record".into(),
            ..Default::default()
        };
        self.transport = Some(transport);
        self.state = SessionState::Authenticating;
        Ok(())
    }

    /// Abort an in-flight login: a leave packet goes out on a best-effort
    /// basis, then the transport is torn down regardless of any server
    /// reply already in flight.
    pub fn cancel_login(&mut self) {
        if self.transport.is_some() {
            let _ = self.send_internal(ClientCommand::LeaveGame);
        }
        self.sink.on_logout();
        self.process_disconnect();
    }

    /// Ask the server for a clean logout and wait for its game-end.
    pub fn safe_logout(&mut self) -> Result<()> {
        if !self.is_online() {
            return Ok(());
        }
        self.sink.on_logout();
        self.send_internal(ClientCommand::LeaveGame)
    }

    /// Logout and tear the connection down without waiting.
    pub fn force_logout(&mut self) {
        if !self.is_online() {
            return;
        }
        self.sink.on_logout();
        let _ = self.send_internal(ClientCommand::LeaveGame);
        self.process_disconnect();
    }

    // --- event intake ----------------------------------------------------

    /// Feed one event from the host's turn queue.
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Challenge { timestamp, random } => {
                self.mark_traffic();
                // a repeated challenge must not re-run the stream-mode flips
                if self.state == SessionState::Authenticating && !self.login_sent {
                    if let Err(error) =
                        self.send_login_packet(Some(Challenge { timestamp, random }))
                    {
                        warn!(%error, "login packet failed");
                        self.process_disconnect();
                    }
                }
            }
            SessionEvent::LoggedIn => {
                self.mark_traffic();
                self.sink.on_login();
            }
            SessionEvent::LoginError { message } => {
                self.mark_traffic();
                self.sink.on_connection_error(&message, 0);
            }
            SessionEvent::PendingGame => {
                self.mark_traffic();
                self.state = SessionState::PendingGame;
                self.sink.on_pending_game();
                if let Err(error) = self.send_internal(ClientCommand::EnterGame) {
                    warn!(%error, "enter-game failed");
                }
            }
            SessionEvent::EnterGame => {
                self.mark_traffic();
                self.sink.on_enter_game();
            }
            SessionEvent::GameStart => {
                self.mark_traffic();
                self.process_game_start();
            }
            SessionEvent::GameEnd => {
                self.mark_traffic();
                self.process_game_end();
            }
            SessionEvent::Death { kind, penalty } => {
                self.mark_traffic();
                self.state = SessionState::EnteredDead;
                if let Some(player) = self.local_player.as_mut() {
                    player.walking = false;
                }
                self.sink.on_death(kind, penalty);
            }

            SessionEvent::PingRequest => {
                self.mark_traffic();
                self.sink.on_ping();
                if let Err(error) = self.send_internal(ClientCommand::PingBack) {
                    debug!(%error, "ping reply failed");
                }
            }
            SessionEvent::PingBack => {
                self.mark_traffic();
                let rtt = self.ping.record_legacy_ack(Instant::now());
                let extended = self
                    .features
                    .is_some_and(|f| f.has(GameFeature::EXTENDED_CLIENT_PING));
                if !extended {
                    if let Some(rtt) = rtt {
                        self.sink.on_ping_back(rtt);
                    }
                }
            }
            SessionEvent::PingBackExtended { ping_id } => {
                self.mark_traffic();
                if let Some(rtt) = self.ping.ack_probe(ping_id, Instant::now()) {
                    self.sink.on_ping_back(rtt);
                }
            }

            SessionEvent::WalkCancelled => {
                self.mark_traffic();
                self.walk.on_walk_cancel();
                if let Some(player) = self.local_player.as_mut() {
                    player.walking = false;
                }
            }
            SessionEvent::PredictiveWalkCancelled {
                position,
                direction,
            } => {
                self.mark_traffic();
                let accepted = match self.local_player.as_mut() {
                    Some(player) => {
                        let rollback = player.position != position;
                        player.position = position;
                        player.direction = direction;
                        player.walking = false;
                        rollback
                    }
                    None => false,
                };
                self.walk.on_predictive_cancel(accepted);
            }
            SessionEvent::WalkIdSync { walk_id } => {
                self.mark_traffic();
                self.walk.sync_walk_id(walk_id);
            }
            SessionEvent::PlayerMoved {
                position,
                direction,
            } => {
                self.mark_traffic();
                if let Some(player) = self.local_player.as_mut() {
                    player.position = position;
                    player.direction = direction;
                    player.walking = false;
                }
            }

            SessionEvent::AttackCancelled { seq } => {
                self.mark_traffic();
                if seq == 0 || seq == self.seq {
                    self.set_attacking(None);
                }
            }
            SessionEvent::ModeSync {
                fight,
                chase,
                safe_fight,
                pvp,
            } => {
                self.mark_traffic();
                if self.fight_mode != fight {
                    self.fight_mode = fight;
                    self.sink.on_fight_mode_change(fight);
                }
                if self.chase_mode != chase {
                    self.chase_mode = chase;
                    self.sink.on_chase_mode_change(chase);
                }
                if self.safe_fight != safe_fight {
                    self.safe_fight = safe_fight;
                    self.sink.on_safe_fight_change(safe_fight);
                }
                if self.pvp_mode != pvp {
                    self.pvp_mode = pvp;
                    self.sink.on_pvp_mode_change(pvp);
                }
            }
            SessionEvent::GmActions { actions } => {
                self.mark_traffic();
                self.sink.on_gm_actions(&actions);
                self.gm_actions = actions;
            }

            SessionEvent::ContainerOpened {
                container_id,
                container,
            } => {
                self.mark_traffic();
                self.containers.open(container_id, container);
                self.sink.on_container_opened(container_id);
            }
            SessionEvent::ContainerClosed { container_id } => {
                self.mark_traffic();
                if self.containers.close(container_id).is_some() {
                    self.sink.on_container_closed(container_id);
                } else {
                    debug!(container_id, "close for a container that is not open");
                }
            }
            SessionEvent::VipAdded { player_id, entry } => {
                self.mark_traffic();
                self.vips.add(player_id, entry.clone());
                self.sink.on_add_vip(player_id, &entry);
            }
            SessionEvent::VipStateChanged { player_id, status } => {
                self.mark_traffic();
                if self.vips.set_status(player_id, status) {
                    if let Some(entry) = self.vips.get(player_id) {
                        let entry = entry.clone();
                        self.sink.on_vip_state_change(player_id, &entry);
                    }
                }
            }

            SessionEvent::ConnectionError { message, code } => {
                if self.transport.is_some() {
                    self.sink.on_connection_error(&message, code);
                    self.process_disconnect();
                }
            }
            SessionEvent::TransportClosed => self.process_disconnect(),

            SessionEvent::PingTimer => self.on_ping_timer(),
            SessionEvent::ExtendedPingTimer => self.on_extended_ping_timer(),
            SessionEvent::ConnectionCheckTimer => self.on_connection_check_timer(),
        }
    }

    // --- login and lifecycle internals -----------------------------------

    fn send_login_packet(&mut self, challenge: Option<Challenge>) -> Result<()> {
        let features = self.features.ok_or(ProtocolError::ProtocolNotConfigured)?;
        let identity = &self.config.client;
        let request = LoginRequest {
            credentials: &self.credentials,
            os_code: identity.custom_os.unwrap_or_else(detected_os_code),
            client_version: identity.client_version,
            content_revision: identity.content_revision,
            challenge,
            vendor: &identity.vendor,
            build_version: &identity.build_version,
            custom_identification: identity.custom_identification.as_deref(),
            identifiers: None,
        };
        let (frame, stream_key) = encode::encode_login(&request, &features, self.rsa.as_ref())?;

        let transport = self
            .transport
            .as_ref()
            .ok_or(ProtocolError::ConnectionClosed)?;
        if features.has(GameFeature::PROTOCOL_CHECKSUM) {
            transport.enable_checksum();
        }
        transport.send(frame)?;

        // exact post-login order: cipher, compression, sequencing
        if let Some(key) = stream_key {
            transport.enable_encryption(key);
        }
        if features.has(GameFeature::PACKET_COMPRESSION) {
            transport.enable_compression();
        }
        if features.has(GameFeature::SEQUENCED_PACKETS) {
            transport.enable_sequencing();
        }
        self.login_sent = true;
        Ok(())
    }

    fn process_game_start(&mut self) {
        let Some(features) = self.features else {
            return;
        };
        self.state = SessionState::EnteredAlive;
        self.last_traffic = Some(Instant::now());

        // push local fight modes so both sides agree from the first frame
        if let Err(error) = self.send_internal(ClientCommand::ChangeFightModes {
            fight: self.fight_mode,
            chase: self.chase_mode,
            safe_fight: self.safe_fight,
            pvp: self.pvp_mode,
        }) {
            warn!(%error, "fight mode sync failed");
        }

        self.sink.on_game_start();

        if features.has(GameFeature::EXTENDED_CLIENT_PING) {
            self.timers.extended_ping = Some(self.scheduler.schedule_repeating(
                TimerKind::ExtendedPing,
                self.config.ping.extended_ping_delay,
            ));
        }
        if features.has(GameFeature::CLIENT_PING) {
            self.timers.ping = Some(
                self.scheduler
                    .schedule_repeating(TimerKind::Ping, self.config.ping.ping_delay),
            );
        }
        self.timers.connection_check = Some(self.scheduler.schedule_repeating(
            TimerKind::ConnectionCheck,
            self.config.ping.connection_check_interval,
        ));
    }

    fn process_game_end(&mut self) {
        self.state = SessionState::Disconnected;
        self.sink.on_game_end();
        if self.connection_fail_warned {
            self.sink.on_connection_failing(false);
            self.connection_fail_warned = false;
        }
        self.reset_game_state();
        self.credentials = Credentials::default();
    }

    fn process_disconnect(&mut self) {
        if self.is_online() {
            self.process_game_end();
        } else {
            self.state = SessionState::Disconnected;
        }
        if let Some(transport) = self.transport.take() {
            transport.disconnect();
        }
    }

    /// Full state reset. Timers are cancelled before anything else is
    /// touched and the registries are emptied last, so a reentrant
    /// callback never sees a half-reset session.
    fn reset_game_state(&mut self) {
        self.timers.cancel_all();

        self.seq = 0;
        self.walk.reset();
        self.ping.reset();
        self.fight_mode = FightMode::Balanced;
        self.chase_mode = ChaseMode::DontChase;
        self.pvp_mode = PvpMode::WhiteDove;
        self.safe_fight = true;
        self.attacking = None;
        self.following = None;
        self.local_player = None;
        self.login_sent = false;
        self.gm_actions.clear();
        self.last_traffic = None;
        self.connection_fail_warned = false;

        self.containers.clear();
        self.vips.clear();
    }

    // --- timers ----------------------------------------------------------

    fn on_ping_timer(&mut self) {
        if !self.is_online() || self.transport.is_none() {
            return;
        }
        // strictly one legacy probe in flight
        if !self.ping.can_send_legacy() {
            return;
        }
        if self.send_internal(ClientCommand::Ping).is_ok() {
            self.ping.record_legacy_sent(Instant::now());
        }
    }

    fn on_extended_ping_timer(&mut self) {
        if !self.is_online() || self.transport.is_none() {
            return;
        }
        let ping_id = self.ping.begin_probe(Instant::now());
        let local_ping = self.ping.last_rtt_ms().unwrap_or(0).min(u16::MAX as u64) as u16;
        let frame_rate = self.environment.frame_rate();
        if let Err(error) = self.send_internal(ClientCommand::NewPing {
            ping_id,
            local_ping,
            frame_rate,
        }) {
            debug!(%error, "extended ping failed");
        }
    }

    fn on_connection_check_timer(&mut self) {
        if !self.is_online() {
            return;
        }
        let healthy = self
            .last_traffic
            .is_some_and(|at| at.elapsed() < self.config.ping.failing_threshold);
        if !healthy && !self.connection_fail_warned {
            self.sink.on_connection_failing(true);
            self.connection_fail_warned = true;
        } else if healthy && self.connection_fail_warned {
            self.sink.on_connection_failing(false);
            self.connection_fail_warned = false;
        }
    }

    fn mark_traffic(&mut self) {
        self.last_traffic = Some(Instant::now());
    }

    // --- send paths ------------------------------------------------------

    fn send_raw(&self, command: ClientCommand) -> Result<()> {
        let features = self.features.ok_or(ProtocolError::ProtocolNotConfigured)?;
        let frame = encode::encode(&command, &features)?;
        self.transport
            .as_ref()
            .ok_or(ProtocolError::ConnectionClosed)?
            .send(frame)
    }

    /// Internally generated send: the bot filter is suppressed around it.
    fn send_internal(&mut self, command: ClientCommand) -> Result<()> {
        self.gate.begin_internal();
        let result = self.send_raw(command);
        self.gate.end_internal();
        result
    }

    fn gate_context(&self) -> GateContext {
        GateContext {
            entered: self.state.entered(),
            alive: self.state == SessionState::EnteredAlive,
            has_local_player: self.local_player.is_some(),
            transport_connected: self
                .transport
                .as_ref()
                .is_some_and(|t| t.is_connected()),
            trusted_input: self.environment.in_input_event(),
        }
    }

    fn check_gate(&self, allow_when_dead: bool) -> Result<()> {
        self.gate.check(self.gate_context(), allow_when_dead)
    }

    /// Gate, encode, send. The shape of almost every host action.
    fn send_gated(&self, command: ClientCommand) -> Result<()> {
        self.check_gate(false)?;
        self.send_raw(command)
    }

    fn has_feature(&self, flag: GameFeature) -> bool {
        self.features.is_some_and(|f| f.has(flag))
    }

    // --- movement --------------------------------------------------------

    /// One walk step. Walking is exempt from the bot filter.
    pub fn walk(&mut self, direction: Direction, with_prewalk: bool) -> Result<()> {
        self.gate.begin_internal();
        let result = self.walk_inner(direction, with_prewalk);
        self.gate.end_internal();
        result
    }

    fn walk_inner(&mut self, direction: Direction, with_prewalk: bool) -> Result<()> {
        self.check_gate(false)?;
        self.sink.on_walk(direction);

        if self.has_feature(GameFeature::NEW_WALKING) {
            let origin = self
                .local_player
                .as_ref()
                .map(|p| p.position)
                .unwrap_or_default();
            let flags = if with_prewalk { FLAG_PREWALK } else { 0 };
            let command = ClientCommand::NewWalk {
                walk_id: self.walk.walk_id(),
                prediction_id: self.walk.prediction_id(),
                origin,
                flags,
                path: vec![direction],
            };
            self.send_raw(command)?;
        } else {
            self.send_raw(ClientCommand::Walk { direction })?;
        }

        if with_prewalk {
            if let Some(player) = self.local_player.as_mut() {
                player.position = player.position.stepped(direction);
                player.direction = direction;
                player.walking = true;
            }
        }
        Ok(())
    }

    /// Multi-step walk along `path` starting at `origin`.
    pub fn auto_walk(&mut self, path: &[Direction], origin: Position) -> Result<()> {
        self.check_gate(false)?;
        let new_walking = self.has_feature(GameFeature::NEW_WALKING);
        self.walk.validate_path(path.len(), new_walking)?;

        // a new walk always supersedes following
        if self.following.is_some() {
            self.cancel_follow()?;
        }

        let mut flags = FLAG_AUTO_WALK;
        let first = path[0];
        let can_prewalk = self
            .local_player
            .as_ref()
            .map(|p| p.position == origin && !p.walking)
            .unwrap_or(false)
            && self.map.is_walkable(origin.stepped(first));
        if can_prewalk {
            flags |= FLAG_PREWALK;
            if let Some(player) = self.local_player.as_mut() {
                player.position = player.position.stepped(first);
                player.direction = first;
                player.walking = true;
            }
        }

        self.sink.on_auto_walk(path);

        if new_walking {
            self.send_raw(ClientCommand::NewWalk {
                walk_id: self.walk.walk_id(),
                prediction_id: self.walk.prediction_id(),
                origin,
                flags,
                path: path.to_vec(),
            })
        } else {
            self.send_raw(ClientCommand::AutoWalk {
                path: path.to_vec(),
            })
        }
    }

    /// Turning is exempt from the bot filter, like walking.
    pub fn turn(&mut self, direction: Direction) -> Result<()> {
        self.gate.begin_internal();
        let result = self.turn_inner(direction);
        self.gate.end_internal();
        result
    }

    fn turn_inner(&mut self, direction: Direction) -> Result<()> {
        self.check_gate(false)?;
        self.send_raw(ClientCommand::Turn { direction })?;
        if let Some(player) = self.local_player.as_mut() {
            player.direction = direction;
        }
        Ok(())
    }

    /// Stop all movement; an active follow is cancelled first. Exempt
    /// from the bot filter, like walking.
    pub fn stop(&mut self) -> Result<()> {
        self.gate.begin_internal();
        let result = self.stop_inner();
        self.gate.end_internal();
        result
    }

    fn stop_inner(&mut self) -> Result<()> {
        self.check_gate(false)?;
        if self.following.is_some() {
            self.cancel_follow()?;
        }
        self.send_raw(ClientCommand::Stop)
    }

    // --- combat ----------------------------------------------------------

    /// Attack `creature_id`; attacking the current target again cancels.
    pub fn attack(&mut self, creature_id: Option<u32>) -> Result<()> {
        self.check_gate(false)?;

        // attacking the current target toggles the attack off
        let target = if creature_id.is_some() && creature_id == self.attacking {
            None
        } else {
            creature_id
        };

        if target.is_some() && self.following.is_some() {
            self.cancel_follow()?;
        }
        self.set_attacking(target);
        self.advance_seq(target);
        self.send_raw(ClientCommand::Attack {
            creature_id: target.unwrap_or(0),
            seq: self.seq,
        })
    }

    /// Follow `creature_id`; following the current target again cancels.
    /// Following is exempt from the bot filter, like walking.
    pub fn follow(&mut self, creature_id: Option<u32>) -> Result<()> {
        self.gate.begin_internal();
        let result = self.follow_inner(creature_id);
        self.gate.end_internal();
        result
    }

    fn follow_inner(&mut self, creature_id: Option<u32>) -> Result<()> {
        self.check_gate(false)?;
        let target = if creature_id.is_some() && creature_id == self.following {
            None
        } else {
            creature_id
        };

        if target.is_some() && self.attacking.is_some() {
            self.cancel_attack()?;
        }
        self.set_following(target);
        self.advance_seq(target);
        self.send_raw(ClientCommand::Follow {
            creature_id: target.unwrap_or(0),
            seq: self.seq,
        })
    }

    pub fn cancel_attack_and_follow(&mut self) -> Result<()> {
        self.check_gate(false)?;
        self.set_following(None);
        self.set_attacking(None);
        self.send_raw(ClientCommand::CancelAttackAndFollow)
    }

    fn cancel_attack(&mut self) -> Result<()> {
        self.set_attacking(None);
        self.advance_seq(None);
        self.send_internal(ClientCommand::Attack {
            creature_id: 0,
            seq: self.seq,
        })
    }

    fn cancel_follow(&mut self) -> Result<()> {
        self.set_following(None);
        self.advance_seq(None);
        self.send_internal(ClientCommand::Follow {
            creature_id: 0,
            seq: self.seq,
        })
    }

    /// Creature-id based sequencing uses the target id directly; the
    /// older scheme just counts.
    fn advance_seq(&mut self, target: Option<u32>) {
        if self.has_feature(GameFeature::ID_BASED_ATTACK_SEQ) {
            if let Some(id) = target {
                self.seq = id;
            }
        } else {
            self.seq += 1;
        }
    }

    fn set_attacking(&mut self, creature_id: Option<u32>) {
        if self.attacking != creature_id {
            let old = self.attacking;
            self.attacking = creature_id;
            self.sink.on_attacking_creature_change(creature_id, old);
        }
    }

    fn set_following(&mut self, creature_id: Option<u32>) {
        if self.following != creature_id {
            let old = self.following;
            self.following = creature_id;
            self.sink.on_following_creature_change(creature_id, old);
        }
    }

    // --- fight modes ------------------------------------------------------

    pub fn set_fight_mode(&mut self, mode: FightMode) -> Result<()> {
        self.check_gate(false)?;
        if self.fight_mode == mode {
            return Ok(());
        }
        self.fight_mode = mode;
        self.send_fight_modes()?;
        self.sink.on_fight_mode_change(mode);
        Ok(())
    }

    pub fn set_chase_mode(&mut self, mode: ChaseMode) -> Result<()> {
        self.check_gate(false)?;
        if self.chase_mode == mode {
            return Ok(());
        }
        self.chase_mode = mode;
        self.send_fight_modes()?;
        self.sink.on_chase_mode_change(mode);
        Ok(())
    }

    pub fn set_safe_fight(&mut self, on: bool) -> Result<()> {
        self.check_gate(false)?;
        if self.safe_fight == on {
            return Ok(());
        }
        self.safe_fight = on;
        self.send_fight_modes()?;
        self.sink.on_safe_fight_change(on);
        Ok(())
    }

    pub fn set_pvp_mode(&mut self, mode: PvpMode) -> Result<()> {
        self.check_gate(false)?;
        if !self.has_feature(GameFeature::PVP_MODE) {
            return Ok(());
        }
        if self.pvp_mode == mode {
            return Ok(());
        }
        self.pvp_mode = mode;
        self.send_fight_modes()?;
        self.sink.on_pvp_mode_change(mode);
        Ok(())
    }

    fn send_fight_modes(&self) -> Result<()> {
        self.send_raw(ClientCommand::ChangeFightModes {
            fight: self.fight_mode,
            chase: self.chase_mode,
            safe_fight: self.safe_fight,
            pvp: self.pvp_mode,
        })
    }

    // --- talking ----------------------------------------------------------

    pub fn talk(&self, text: &str) -> Result<()> {
        self.talk_channel(MessageMode::Say, 0, text)
    }

    pub fn talk_channel(&self, mode: MessageMode, channel_id: u16, text: &str) -> Result<()> {
        self.check_gate(false)?;
        if text.is_empty() {
            return Ok(());
        }
        self.send_raw(self.talk_command(mode, channel_id, "", text))
    }

    pub fn talk_private(&self, mode: MessageMode, receiver: &str, text: &str) -> Result<()> {
        self.check_gate(false)?;
        if receiver.is_empty() || text.is_empty() {
            return Ok(());
        }
        self.send_raw(self.talk_command(mode, 0, receiver, text))
    }

    fn talk_command(
        &self,
        mode: MessageMode,
        channel_id: u16,
        receiver: &str,
        text: &str,
    ) -> ClientCommand {
        let (position, direction) = self
            .local_player
            .as_ref()
            .map(|p| (p.position, p.direction))
            .unwrap_or((Position::default(), Direction::Invalid));
        ClientCommand::Talk {
            mode,
            channel_id,
            receiver: receiver.to_owned(),
            text: text.to_owned(),
            position,
            direction,
        }
    }

    // --- channels ---------------------------------------------------------

    pub fn request_channels(&self) -> Result<()> {
        self.send_gated(ClientCommand::RequestChannels)
    }

    pub fn join_channel(&self, channel_id: u16) -> Result<()> {
        self.send_gated(ClientCommand::JoinChannel { channel_id })
    }

    pub fn leave_channel(&self, channel_id: u16) -> Result<()> {
        self.send_gated(ClientCommand::LeaveChannel { channel_id })
    }

    pub fn open_private_channel(&self, receiver: &str) -> Result<()> {
        self.send_gated(ClientCommand::OpenPrivateChannel {
            receiver: receiver.to_owned(),
        })
    }

    pub fn open_own_channel(&self) -> Result<()> {
        self.send_gated(ClientCommand::OpenOwnChannel)
    }

    pub fn invite_to_own_channel(&self, name: &str) -> Result<()> {
        self.send_gated(ClientCommand::InviteToOwnChannel {
            name: name.to_owned(),
        })
    }

    pub fn exclude_from_own_channel(&self, name: &str) -> Result<()> {
        self.send_gated(ClientCommand::ExcludeFromOwnChannel {
            name: name.to_owned(),
        })
    }

    pub fn close_npc_channel(&self) -> Result<()> {
        self.send_gated(ClientCommand::CloseNpcChannel)
    }

    // --- items and containers ---------------------------------------------

    pub fn equip_item(&self, item_id: u16, count: u16) -> Result<()> {
        self.send_gated(ClientCommand::EquipItem { item_id, count })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn move_thing(
        &self,
        from: Position,
        thing_id: u16,
        stack_pos: u8,
        to: Position,
        count: u16,
    ) -> Result<()> {
        self.send_gated(ClientCommand::Move {
            from,
            thing_id,
            stack_pos,
            to,
            count,
        })
    }

    pub fn use_item(&self, position: Position, item_id: u16, stack_pos: u8, index: u8) -> Result<()> {
        self.send_gated(ClientCommand::UseItem {
            position,
            item_id,
            stack_pos,
            index,
        })
    }

    /// Open a container item into the lowest free container id.
    pub fn open_container(&self, position: Position, item_id: u16, stack_pos: u8) -> Result<()> {
        self.use_item(position, item_id, stack_pos, self.containers.find_empty_id())
    }

    pub fn use_item_with(
        &self,
        from: Position,
        item_id: u16,
        from_stack_pos: u8,
        to: Position,
        to_thing_id: u16,
        to_stack_pos: u8,
    ) -> Result<()> {
        self.send_gated(ClientCommand::UseItemWith {
            from,
            item_id,
            from_stack_pos,
            to,
            to_thing_id,
            to_stack_pos,
        })
    }

    pub fn use_on_creature(
        &self,
        position: Position,
        item_id: u16,
        stack_pos: u8,
        creature_id: u32,
    ) -> Result<()> {
        self.send_gated(ClientCommand::UseOnCreature {
            position,
            item_id,
            stack_pos,
            creature_id,
        })
    }

    pub fn rotate_item(&self, position: Position, item_id: u16, stack_pos: u8) -> Result<()> {
        self.send_gated(ClientCommand::RotateItem {
            position,
            item_id,
            stack_pos,
        })
    }

    pub fn wrap_item(&self, position: Position, item_id: u16, stack_pos: u8) -> Result<()> {
        self.send_gated(ClientCommand::WrapItem {
            position,
            item_id,
            stack_pos,
        })
    }

    pub fn close_container(&self, container_id: u8) -> Result<()> {
        self.send_gated(ClientCommand::CloseContainer { container_id })
    }

    pub fn up_container(&self, container_id: u8) -> Result<()> {
        self.send_gated(ClientCommand::UpContainer { container_id })
    }

    pub fn refresh_container(&self, container_id: u8) -> Result<()> {
        self.send_gated(ClientCommand::RefreshContainer { container_id })
    }

    pub fn seek_in_container(&self, container_id: u8, index: u16) -> Result<()> {
        if !self.has_feature(GameFeature::CONTAINER_PAGINATION) {
            debug!("container pagination is not available in this protocol");
            return Ok(());
        }
        self.send_gated(ClientCommand::SeekInContainer {
            container_id,
            index,
        })
    }

    pub fn browse_field(&self, position: Position) -> Result<()> {
        if !self.has_feature(GameFeature::BROWSE_FIELD) {
            debug!("field browsing is not available in this protocol");
            return Ok(());
        }
        self.send_gated(ClientCommand::BrowseField { position })
    }

    pub fn edit_text(&self, id: u32, text: &str) -> Result<()> {
        self.send_gated(ClientCommand::EditText {
            id,
            text: text.to_owned(),
        })
    }

    pub fn edit_list(&self, list_id: u8, id: u32, text: &str) -> Result<()> {
        self.send_gated(ClientCommand::EditList {
            list_id,
            id,
            text: text.to_owned(),
        })
    }

    // --- looking ----------------------------------------------------------

    /// Looking stays available while dead.
    pub fn look(&self, position: Position, thing_id: u16, stack_pos: u8) -> Result<()> {
        self.check_gate(true)?;
        self.send_raw(ClientCommand::Look {
            position,
            thing_id,
            stack_pos,
        })
    }

    pub fn look_creature(&self, creature_id: u32) -> Result<()> {
        if !self.has_feature(GameFeature::LOOK_CREATURE) {
            debug!("looking at creatures by id is not available in this protocol");
            return Ok(());
        }
        self.check_gate(true)?;
        self.send_raw(ClientCommand::LookCreature { creature_id })
    }

    // --- party ------------------------------------------------------------

    pub fn invite_to_party(&self, creature_id: u32) -> Result<()> {
        self.send_gated(ClientCommand::InviteToParty { creature_id })
    }

    pub fn join_party(&self, creature_id: u32) -> Result<()> {
        self.send_gated(ClientCommand::JoinParty { creature_id })
    }

    pub fn revoke_party_invitation(&self, creature_id: u32) -> Result<()> {
        self.send_gated(ClientCommand::RevokePartyInvitation { creature_id })
    }

    pub fn pass_party_leadership(&self, creature_id: u32) -> Result<()> {
        self.send_gated(ClientCommand::PassPartyLeadership { creature_id })
    }

    pub fn leave_party(&self) -> Result<()> {
        self.send_gated(ClientCommand::LeaveParty)
    }

    pub fn share_experience(&self, active: bool) -> Result<()> {
        self.send_gated(ClientCommand::ShareExperience { active })
    }

    // --- trading ----------------------------------------------------------

    pub fn inspect_npc_trade(&self, item_id: u16, count: u16) -> Result<()> {
        self.send_gated(ClientCommand::InspectNpcTrade { item_id, count })
    }

    pub fn buy_item(
        &self,
        item_id: u16,
        sub_type: u8,
        amount: u8,
        ignore_capacity: bool,
        buy_with_backpack: bool,
    ) -> Result<()> {
        self.send_gated(ClientCommand::BuyItem {
            item_id,
            sub_type,
            amount,
            ignore_capacity,
            buy_with_backpack,
        })
    }

    pub fn sell_item(
        &self,
        item_id: u16,
        sub_type: u8,
        amount: u16,
        ignore_equipped: bool,
    ) -> Result<()> {
        self.send_gated(ClientCommand::SellItem {
            item_id,
            sub_type,
            amount,
            ignore_equipped,
        })
    }

    pub fn close_npc_trade(&self) -> Result<()> {
        self.send_gated(ClientCommand::CloseNpcTrade)
    }

    pub fn request_trade(
        &self,
        position: Position,
        thing_id: u16,
        stack_pos: u8,
        creature_id: u32,
    ) -> Result<()> {
        self.send_gated(ClientCommand::RequestTrade {
            position,
            thing_id,
            stack_pos,
            creature_id,
        })
    }

    pub fn inspect_trade(&self, counter_offer: bool, index: u8) -> Result<()> {
        self.send_gated(ClientCommand::InspectTrade {
            counter_offer,
            index,
        })
    }

    pub fn accept_trade(&self) -> Result<()> {
        self.send_gated(ClientCommand::AcceptTrade)
    }

    pub fn reject_trade(&self) -> Result<()> {
        self.send_gated(ClientCommand::RejectTrade)
    }

    // --- outfit -----------------------------------------------------------

    pub fn request_outfit(&self) -> Result<()> {
        self.send_gated(ClientCommand::RequestOutfit)
    }

    pub fn change_outfit(&self, outfit: Outfit) -> Result<()> {
        self.send_gated(ClientCommand::ChangeOutfit { outfit })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_outfit_extensions(
        &self,
        mount: u8,
        wings: u8,
        aura: u8,
        shader: u8,
        health_bar: u8,
        mana_bar: u8,
    ) -> Result<()> {
        self.send_gated(ClientCommand::OutfitExtensions {
            mount,
            wings,
            aura,
            shader,
            health_bar,
            mana_bar,
        })
    }

    // --- imbuement --------------------------------------------------------

    pub fn apply_imbuement(
        &self,
        slot: u8,
        imbuement_id: u32,
        protection_charm: bool,
    ) -> Result<()> {
        self.send_gated(ClientCommand::ApplyImbuement {
            slot,
            imbuement_id,
            protection_charm,
        })
    }

    pub fn clear_imbuement(&self, slot: u8) -> Result<()> {
        self.send_gated(ClientCommand::ClearImbuement { slot })
    }

    pub fn close_imbuing_window(&self) -> Result<()> {
        self.send_gated(ClientCommand::CloseImbuingWindow)
    }

    // --- vips -------------------------------------------------------------

    pub fn add_vip(&self, name: &str) -> Result<()> {
        self.send_gated(ClientCommand::AddVip {
            name: name.to_owned(),
        })
    }

    pub fn remove_vip(&mut self, player_id: u32) -> Result<()> {
        self.check_gate(false)?;
        self.send_raw(ClientCommand::RemoveVip { player_id })?;
        self.vips.remove(player_id);
        Ok(())
    }

    pub fn edit_vip(
        &self,
        player_id: u32,
        description: &str,
        icon_id: u32,
        notify_login: bool,
    ) -> Result<()> {
        if !self.has_feature(GameFeature::ADDITIONAL_VIP_INFO) {
            debug!("vip details are not editable in this protocol");
            return Ok(());
        }
        self.send_gated(ClientCommand::EditVip {
            player_id,
            description: description.to_owned(),
            icon_id,
            notify_login,
        })
    }

    // --- reports and requests ----------------------------------------------

    pub fn report_bug(&self, comment: &str) -> Result<()> {
        self.send_gated(ClientCommand::BugReport {
            comment: comment.to_owned(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn report_rule_violation(
        &self,
        target: &str,
        reason: u8,
        action: u8,
        comment: &str,
        statement: &str,
        statement_id: u16,
        ip_banishment: bool,
    ) -> Result<()> {
        self.send_gated(ClientCommand::RuleViolation {
            target: target.to_owned(),
            reason,
            action,
            comment: comment.to_owned(),
            statement: statement.to_owned(),
            statement_id,
            ip_banishment,
        })
    }

    pub fn report_rule_violation_new(
        &self,
        reason: u8,
        action: u8,
        character_name: &str,
        comment: &str,
        translation: &str,
    ) -> Result<()> {
        self.send_gated(ClientCommand::NewRuleViolation {
            reason,
            action,
            character_name: character_name.to_owned(),
            comment: comment.to_owned(),
            translation: translation.to_owned(),
        })
    }

    pub fn debug_report(
        &self,
        what: &str,
        signature: &str,
        date: &str,
        description: &str,
    ) -> Result<()> {
        self.send_gated(ClientCommand::DebugReport {
            what: what.to_owned(),
            signature: signature.to_owned(),
            date: date.to_owned(),
            description: description.to_owned(),
        })
    }

    pub fn request_quest_log(&self) -> Result<()> {
        self.send_gated(ClientCommand::RequestQuestLog)
    }

    pub fn request_quest_line(&self, quest_id: u16) -> Result<()> {
        self.send_gated(ClientCommand::RequestQuestLine { quest_id })
    }

    pub fn request_item_info(&self, item_id: u16, sub_type: u8, index: u8) -> Result<()> {
        self.send_gated(ClientCommand::RequestItemInfo {
            item_id,
            sub_type,
            index,
        })
    }

    pub fn answer_modal_dialog(&self, dialog_id: u32, button: u8, choice: u8) -> Result<()> {
        self.send_gated(ClientCommand::AnswerModalDialog {
            dialog_id,
            button,
            choice,
        })
    }

    // --- store and prey -----------------------------------------------------

    pub fn open_store(&self, service_type: u8) -> Result<()> {
        self.send_gated(ClientCommand::OpenStore { service_type })
    }

    pub fn request_store_offers(&self, category_name: &str, service_type: u8) -> Result<()> {
        self.send_gated(ClientCommand::RequestStoreOffers {
            category_name: category_name.to_owned(),
            service_type,
        })
    }

    pub fn buy_store_offer(&self, offer_id: u32, product_type: u8, name: &str) -> Result<()> {
        self.send_gated(ClientCommand::BuyStoreOffer {
            offer_id,
            product_type,
            name: name.to_owned(),
        })
    }

    pub fn open_transaction_history(&self, entries_per_page: u8) -> Result<()> {
        self.send_gated(ClientCommand::OpenTransactionHistory { entries_per_page })
    }

    pub fn request_transaction_history(&self, page: u32, entries_per_page: u32) -> Result<()> {
        self.send_gated(ClientCommand::RequestTransactionHistory {
            page,
            entries_per_page,
        })
    }

    pub fn transfer_coins(&self, recipient: &str, amount: u16) -> Result<()> {
        self.send_gated(ClientCommand::TransferCoins {
            recipient: recipient.to_owned(),
            amount,
        })
    }

    pub fn prey_action(&self, slot: u8, action_type: u8, index: u16) -> Result<()> {
        self.send_gated(ClientCommand::PreyAction {
            slot,
            action_type,
            index,
        })
    }

    pub fn prey_request(&self) -> Result<()> {
        self.send_gated(ClientCommand::PreyRequest)
    }

    pub fn update_auto_loot(&self, client_id: u16, name: &str, remove: bool) -> Result<()> {
        self.send_gated(ClientCommand::UpdateAutoLoot {
            client_id,
            name: name.to_owned(),
            remove,
        })
    }

    // --- misc ---------------------------------------------------------------

    pub fn change_map_aware_range(&self, x_range: u8, y_range: u8) -> Result<()> {
        if !self.has_feature(GameFeature::CHANGE_MAP_AWARE_RANGE) {
            debug!("map aware range is fixed in this protocol");
            return Ok(());
        }
        self.send_gated(ClientCommand::ChangeMapAwareRange { x_range, y_range })
    }

    /// Extension channel with the server; internally generated traffic, so
    /// the bot filter does not apply.
    pub fn send_extended_opcode(&mut self, opcode: u8, buffer: &str) -> Result<()> {
        if !self.has_feature(GameFeature::EXTENDED_OPCODE) {
            return Err(ProtocolError::ProtocolLimit(
                "extended opcodes are not enabled on this server".into(),
            ));
        }
        self.send_internal(ClientCommand::ExtendedOpcode {
            opcode,
            buffer: buffer.to_owned(),
        })
    }

    // --- accessors ----------------------------------------------------------

    pub fn walk_id(&self) -> u32 {
        self.walk.walk_id()
    }

    pub fn walk_prediction_id(&self) -> u32 {
        self.walk.prediction_id()
    }

    pub fn attack_seq(&self) -> u32 {
        self.seq
    }

    pub fn attacking_creature(&self) -> Option<u32> {
        self.attacking
    }

    pub fn following_creature(&self) -> Option<u32> {
        self.following
    }

    pub fn fight_mode(&self) -> FightMode {
        self.fight_mode
    }

    pub fn chase_mode(&self) -> ChaseMode {
        self.chase_mode
    }

    pub fn safe_fight(&self) -> bool {
        self.safe_fight
    }

    pub fn pvp_mode(&self) -> PvpMode {
        self.pvp_mode
    }

    pub fn character_name(&self) -> &str {
        &self.credentials.character_name
    }

    pub fn world_name(&self) -> &str {
        &self.credentials.world_name
    }

    pub fn last_ping_ms(&self) -> Option<u64> {
        self.ping.last_rtt_ms()
    }

    pub fn containers(&self) -> &ContainerRegistry {
        &self.containers
    }

    pub fn vips(&self) -> &VipRegistry {
        &self.vips
    }

    pub fn gm_actions(&self) -> &[u8] {
        &self.gm_actions
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("features", &self.features)
            .field("character", &self.credentials.character_name)
            .finish_non_exhaustive()
    }
}

fn detected_os_code() -> u16 {
    let os = if cfg!(target_os = "windows") {
        ClientOs::Windows
    } else if cfg!(target_os = "macos") {
        ClientOs::Mac
    } else if cfg!(target_os = "android") {
        ClientOs::Android
    } else if cfg!(target_os = "ios") {
        ClientOs::Ios
    } else {
        ClientOs::Linux
    };
    os.wire_code()
}
