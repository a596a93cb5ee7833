#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Session state machine integration tests, driven through mock host
//! boundaries: a recording transport, a recording scheduler, a recording
//! sink and a scriptable environment.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;

use game_session_protocol::protocol::decode;
use game_session_protocol::session::containers::Container;
use game_session_protocol::session::timers::{Scheduler, TimerHandle, TimerKind};
use game_session_protocol::sink::DeathKind;
use game_session_protocol::{
    ChaseMode, ClientCommand, Credentials, Direction, Environment, EventSink, FeatureSet,
    FightMode, GameFeature, MapProbe, Position, ProtocolError, PvpMode, RsaCipher, Session,
    SessionConfig, SessionEvent, SessionState, Transport, VipEntry, VipStatus,
};

// ============================================================================
// MOCK HOST BOUNDARIES
// ============================================================================

#[derive(Default)]
struct WireLog {
    frames: Mutex<Vec<Bytes>>,
    connected: AtomicBool,
    checksum: AtomicBool,
    encrypted: AtomicBool,
    compressed: AtomicBool,
    sequenced: AtomicBool,
}

struct MockTransport(Arc<WireLog>);

impl MockTransport {
    fn pair() -> (Box<dyn Transport>, Arc<WireLog>) {
        let log = Arc::new(WireLog::default());
        log.connected.store(true, Ordering::Release);
        (Box::new(MockTransport(log.clone())), log)
    }
}

impl Transport for MockTransport {
    fn is_connected(&self) -> bool {
        self.0.connected.load(Ordering::Acquire)
    }

    fn send(&self, frame: Bytes) -> Result<(), ProtocolError> {
        self.0.frames.lock().unwrap().push(frame);
        Ok(())
    }

    fn enable_checksum(&self) {
        self.0.checksum.store(true, Ordering::Release);
    }

    fn enable_encryption(&self, _key: [u32; 4]) {
        self.0.encrypted.store(true, Ordering::Release);
    }

    fn enable_compression(&self) {
        self.0.compressed.store(true, Ordering::Release);
    }

    fn enable_sequencing(&self) {
        self.0.sequenced.store(true, Ordering::Release);
    }

    fn disconnect(&self) {
        self.0.connected.store(false, Ordering::Release);
    }
}

#[derive(Default, Clone)]
struct MockScheduler {
    scheduled: Arc<Mutex<Vec<(TimerKind, Duration, TimerHandle)>>>,
}

impl Scheduler for MockScheduler {
    fn schedule_repeating(&self, kind: TimerKind, interval: Duration) -> TimerHandle {
        let handle = TimerHandle::new();
        self.scheduled
            .lock()
            .unwrap()
            .push((kind, interval, handle.clone()));
        handle
    }
}

#[derive(Default, Clone)]
struct RecordingSink {
    events: Arc<Mutex<Vec<String>>>,
}

impl RecordingSink {
    fn take(&self) -> Vec<String> {
        std::mem::take(&mut self.events.lock().unwrap())
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl EventSink for RecordingSink {
    fn on_game_start(&mut self) {
        self.record("game_start".into());
    }

    fn on_game_end(&mut self) {
        self.record("game_end".into());
    }

    fn on_logout(&mut self) {
        self.record("logout".into());
    }

    fn on_death(&mut self, kind: DeathKind, penalty: u8) {
        self.record(format!("death({kind:?},{penalty})"));
    }

    fn on_ping_back(&mut self, latency_ms: u64) {
        self.record(format!("ping_back({latency_ms})"));
    }

    fn on_connection_failing(&mut self, failing: bool) {
        self.record(format!("connection_failing({failing})"));
    }

    fn on_fight_mode_change(&mut self, mode: FightMode) {
        self.record(format!("fight_mode({mode:?})"));
    }

    fn on_attacking_creature_change(&mut self, new: Option<u32>, old: Option<u32>) {
        self.record(format!("attacking({new:?},{old:?})"));
    }

    fn on_following_creature_change(&mut self, new: Option<u32>, old: Option<u32>) {
        self.record(format!("following({new:?},{old:?})"));
    }

    fn on_container_opened(&mut self, container_id: u8) {
        self.record(format!("container_opened({container_id})"));
    }

    fn on_container_closed(&mut self, container_id: u8) {
        self.record(format!("container_closed({container_id})"));
    }
}

#[derive(Clone)]
struct ScriptedEnvironment {
    trusted: Arc<AtomicBool>,
}

impl Environment for ScriptedEnvironment {
    fn in_input_event(&self) -> bool {
        self.trusted.load(Ordering::Acquire)
    }

    fn frame_rate(&self) -> u16 {
        50
    }
}

struct OpenMap;

impl MapProbe for OpenMap {
    fn is_walkable(&self, _position: Position) -> bool {
        true
    }
}

struct IdentityRsa;

impl RsaCipher for IdentityRsa {
    fn block_size(&self) -> usize {
        128
    }

    fn encrypt_block(&self, _block: &mut [u8]) -> Result<(), ProtocolError> {
        Ok(())
    }
}

struct Harness {
    session: Session,
    wire: Arc<WireLog>,
    scheduler: MockScheduler,
    sink: RecordingSink,
    trusted: Arc<AtomicBool>,
    features: FeatureSet,
}

impl Harness {
    /// A session logged in and entered at `version` with `extras`.
    fn online(version: u16, extras: GameFeature) -> Self {
        let scheduler = MockScheduler::default();
        let sink = RecordingSink::default();
        let trusted = Arc::new(AtomicBool::new(true));
        let mut session = Session::new(
            SessionConfig::default(),
            Box::new(IdentityRsa),
            Box::new(scheduler.clone()),
            Box::new(sink.clone()),
            Box::new(ScriptedEnvironment {
                trusted: trusted.clone(),
            }),
            Box::new(OpenMap),
        );
        session.set_protocol_version(version, extras).unwrap();

        let (transport, wire) = MockTransport::pair();
        let credentials = Credentials {
            account_name: "account".into(),
            password: "secret".into(),
            character_name: "Knight".into(),
            world_name: "World".into(),
            ..Default::default()
        };
        session.login_world(credentials, transport).unwrap();
        session.handle_event(SessionEvent::Challenge {
            timestamp: 1,
            random: 2,
        });
        session.handle_event(SessionEvent::GameStart);

        wire.frames.lock().unwrap().clear();
        sink.take();
        Self {
            session,
            wire,
            scheduler,
            sink,
            trusted,
            features: FeatureSet::negotiate_with(version, extras),
        }
    }

    /// Every frame sent so far, decoded, draining the log.
    fn sent(&self) -> Vec<ClientCommand> {
        std::mem::take(&mut *self.wire.frames.lock().unwrap())
            .into_iter()
            .map(|frame| decode::decode(frame, &self.features).expect("sent frame must decode"))
            .collect()
    }

    fn timers(&self) -> Vec<(TimerKind, Duration, TimerHandle)> {
        self.scheduler.scheduled.lock().unwrap().clone()
    }
}

// ============================================================================
// LOGIN LIFECYCLE
// ============================================================================

#[test]
fn login_requires_a_negotiated_protocol() {
    let mut session = Session::new(
        SessionConfig::default(),
        Box::new(IdentityRsa),
        Box::new(MockScheduler::default()),
        Box::new(RecordingSink::default()),
        Box::new(ScriptedEnvironment {
            trusted: Arc::new(AtomicBool::new(true)),
        }),
        Box::new(OpenMap),
    );
    let (transport, _) = MockTransport::pair();
    assert!(matches!(
        session.login_world(Credentials::default(), transport),
        Err(ProtocolError::ProtocolNotConfigured)
    ));
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[test]
fn a_second_login_is_rejected_without_touching_the_first() {
    let mut harness = Harness::online(1098, GameFeature::empty());
    let (transport, _) = MockTransport::pair();
    assert!(matches!(
        harness.session.login_world(Credentials::default(), transport),
        Err(ProtocolError::AlreadyOnline)
    ));
    assert_eq!(harness.session.state(), SessionState::EnteredAlive);
    assert_eq!(harness.session.character_name(), "Knight");
    assert!(harness.sent().is_empty());
}

#[test]
fn challenge_answer_flips_the_stream_modes_in_order() {
    let scheduler = MockScheduler::default();
    let mut session = Session::new(
        SessionConfig::default(),
        Box::new(IdentityRsa),
        Box::new(scheduler),
        Box::new(RecordingSink::default()),
        Box::new(ScriptedEnvironment {
            trusted: Arc::new(AtomicBool::new(true)),
        }),
        Box::new(OpenMap),
    );
    session
        .set_protocol_version(1290, GameFeature::SEQUENCED_PACKETS)
        .unwrap();

    let (transport, wire) = MockTransport::pair();
    session
        .login_world(Credentials::default(), transport)
        .unwrap();
    assert_eq!(session.state(), SessionState::Authenticating);
    // nothing goes out before the server's challenge
    assert!(wire.frames.lock().unwrap().is_empty());

    session.handle_event(SessionEvent::Challenge {
        timestamp: 77,
        random: 3,
    });
    assert_eq!(wire.frames.lock().unwrap().len(), 1);
    assert!(wire.checksum.load(Ordering::Acquire));
    assert!(wire.encrypted.load(Ordering::Acquire));
    assert!(wire.compressed.load(Ordering::Acquire));
    assert!(wire.sequenced.load(Ordering::Acquire));
}

#[test]
fn a_repeated_challenge_does_not_resend_the_login() {
    let mut session = Session::new(
        SessionConfig::default(),
        Box::new(IdentityRsa),
        Box::new(MockScheduler::default()),
        Box::new(RecordingSink::default()),
        Box::new(ScriptedEnvironment {
            trusted: Arc::new(AtomicBool::new(true)),
        }),
        Box::new(OpenMap),
    );
    session
        .set_protocol_version(1098, GameFeature::empty())
        .unwrap();
    let (transport, wire) = MockTransport::pair();
    session
        .login_world(Credentials::default(), transport)
        .unwrap();

    session.handle_event(SessionEvent::Challenge {
        timestamp: 77,
        random: 3,
    });
    assert_eq!(wire.frames.lock().unwrap().len(), 1);

    session.handle_event(SessionEvent::Challenge {
        timestamp: 78,
        random: 4,
    });
    assert_eq!(wire.frames.lock().unwrap().len(), 1);
}

#[test]
fn game_start_syncs_fight_modes_and_schedules_the_timers() {
    let scheduler = MockScheduler::default();
    let sink = RecordingSink::default();
    let mut session = Session::new(
        SessionConfig::default(),
        Box::new(IdentityRsa),
        Box::new(scheduler.clone()),
        Box::new(sink.clone()),
        Box::new(ScriptedEnvironment {
            trusted: Arc::new(AtomicBool::new(true)),
        }),
        Box::new(OpenMap),
    );
    session
        .set_protocol_version(1098, GameFeature::EXTENDED_CLIENT_PING)
        .unwrap();
    let (transport, wire) = MockTransport::pair();
    session
        .login_world(Credentials::default(), transport)
        .unwrap();
    session.handle_event(SessionEvent::Challenge {
        timestamp: 1,
        random: 1,
    });
    wire.frames.lock().unwrap().clear();

    session.handle_event(SessionEvent::GameStart);
    assert_eq!(session.state(), SessionState::EnteredAlive);
    assert!(sink.take().contains(&"game_start".to_string()));

    let features = FeatureSet::negotiate_with(1098, GameFeature::EXTENDED_CLIENT_PING);
    let frames = std::mem::take(&mut *wire.frames.lock().unwrap());
    let first = decode::decode(frames[0].clone(), &features).unwrap();
    assert!(matches!(
        first,
        ClientCommand::ChangeFightModes {
            fight: FightMode::Balanced,
            chase: ChaseMode::DontChase,
            safe_fight: true,
            pvp: PvpMode::WhiteDove,
        }
    ));

    let kinds: Vec<TimerKind> = scheduler
        .scheduled
        .lock()
        .unwrap()
        .iter()
        .map(|(kind, _, _)| *kind)
        .collect();
    assert!(kinds.contains(&TimerKind::Ping));
    assert!(kinds.contains(&TimerKind::ExtendedPing));
    assert!(kinds.contains(&TimerKind::ConnectionCheck));
}

#[test]
fn game_end_cancels_timers_and_resets_everything() {
    let mut harness = Harness::online(1098, GameFeature::EXTENDED_CLIENT_PING);
    harness.session.handle_event(SessionEvent::ContainerOpened {
        container_id: 0,
        container: Container::default(),
    });
    harness.session.handle_event(SessionEvent::VipAdded {
        player_id: 9,
        entry: VipEntry {
            name: "Ann".into(),
            status: VipStatus::Online,
            description: String::new(),
            icon_id: 0,
            notify_login: false,
        },
    });
    harness.session.set_fight_mode(FightMode::Offensive).unwrap();
    assert_eq!(harness.session.containers().len(), 1);

    harness.session.handle_event(SessionEvent::GameEnd);

    assert_eq!(harness.session.state(), SessionState::Disconnected);
    assert!(harness.session.containers().is_empty());
    assert!(harness.session.vips().is_empty());
    assert_eq!(harness.session.fight_mode(), FightMode::Balanced);
    assert_eq!(harness.session.walk_id(), 0);
    for (kind, _, handle) in harness.timers() {
        assert!(handle.is_cancelled(), "timer {kind:?} still running");
    }
}

#[test]
fn death_restricts_the_session_to_looking() {
    let mut harness = Harness::online(1098, GameFeature::empty());
    harness.session.handle_event(SessionEvent::Death {
        kind: DeathKind::Regular,
        penalty: 55,
    });
    assert_eq!(harness.session.state(), SessionState::EnteredDead);
    assert_eq!(
        harness.sink.take(),
        vec!["death(Regular,55)".to_string()]
    );

    assert!(matches!(
        harness.session.stop(),
        Err(ProtocolError::NotInGame)
    ));
    assert!(matches!(
        harness.session.talk("hello"),
        Err(ProtocolError::NotInGame)
    ));
    assert!(harness.session.look(Position::new(1, 1, 7), 99, 0).is_ok());
}

// ============================================================================
// COMBAT
// ============================================================================

#[test]
fn attacking_the_current_target_again_cancels_the_attack() {
    let mut harness = Harness::online(1098, GameFeature::empty());

    harness.session.attack(Some(5)).unwrap();
    assert_eq!(harness.session.attacking_creature(), Some(5));
    // creature-id based sequencing at this version
    assert_eq!(harness.session.attack_seq(), 5);

    harness.session.attack(Some(5)).unwrap();
    assert_eq!(harness.session.attacking_creature(), None);

    let sent = harness.sent();
    assert_eq!(
        sent[0],
        ClientCommand::Attack {
            creature_id: 5,
            seq: 5
        }
    );
    assert!(matches!(
        sent[1],
        ClientCommand::Attack { creature_id: 0, .. }
    ));
    assert_eq!(
        harness.sink.take(),
        vec![
            "attacking(Some(5),None)".to_string(),
            "attacking(None,Some(5))".to_string(),
        ]
    );
}

#[test]
fn attack_and_follow_cancel_each_other() {
    let mut harness = Harness::online(1098, GameFeature::empty());

    harness.session.follow(Some(7)).unwrap();
    assert_eq!(harness.session.following_creature(), Some(7));

    harness.session.attack(Some(5)).unwrap();
    assert_eq!(harness.session.following_creature(), None);
    assert_eq!(harness.session.attacking_creature(), Some(5));

    harness.session.follow(Some(7)).unwrap();
    assert_eq!(harness.session.attacking_creature(), None);
    assert_eq!(harness.session.following_creature(), Some(7));

    // cancel packet for the follow goes out before the new attack
    let sent = harness.sent();
    assert!(matches!(
        sent[1],
        ClientCommand::Follow { creature_id: 0, .. }
    ));
    assert!(matches!(sent[2], ClientCommand::Attack { creature_id: 5, .. }));
}

#[test]
fn stopping_cancels_an_active_follow_first() {
    let mut harness = Harness::online(1098, GameFeature::empty());

    harness.session.follow(Some(7)).unwrap();
    harness.sent();

    harness.session.stop().unwrap();
    assert_eq!(harness.session.following_creature(), None);
    let sent = harness.sent();
    assert!(matches!(
        sent[0],
        ClientCommand::Follow { creature_id: 0, .. }
    ));
    assert_eq!(sent[1], ClientCommand::Stop);
}

#[test]
fn server_attack_cancel_matches_the_seq_or_zero() {
    let mut harness = Harness::online(1098, GameFeature::empty());
    harness.session.attack(Some(5)).unwrap();

    harness
        .session
        .handle_event(SessionEvent::AttackCancelled { seq: 999 });
    assert_eq!(harness.session.attacking_creature(), Some(5));

    harness
        .session
        .handle_event(SessionEvent::AttackCancelled { seq: 5 });
    assert_eq!(harness.session.attacking_creature(), None);

    harness.session.attack(Some(6)).unwrap();
    harness
        .session
        .handle_event(SessionEvent::AttackCancelled { seq: 0 });
    assert_eq!(harness.session.attacking_creature(), None);
}

#[test]
fn old_protocols_count_the_attack_seq_instead() {
    let mut harness = Harness::online(900, GameFeature::empty());
    harness.session.attack(Some(5)).unwrap();
    assert_eq!(harness.session.attack_seq(), 1);
    harness.session.follow(Some(9)).unwrap();
    assert_eq!(harness.session.attack_seq(), 3); // attack cancel bumped it too
}

// ============================================================================
// FIGHT MODES
// ============================================================================

#[test]
fn mode_setters_no_op_on_the_current_value() {
    let mut harness = Harness::online(1098, GameFeature::empty());

    harness.session.set_fight_mode(FightMode::Balanced).unwrap();
    assert!(harness.sent().is_empty());
    assert!(harness.sink.take().is_empty());

    harness.session.set_fight_mode(FightMode::Offensive).unwrap();
    let sent = harness.sent();
    assert!(matches!(
        sent[0],
        ClientCommand::ChangeFightModes {
            fight: FightMode::Offensive,
            ..
        }
    ));
    assert_eq!(harness.sink.take(), vec!["fight_mode(Offensive)".to_string()]);
}

#[test]
fn pvp_mode_needs_its_capability() {
    let mut harness = Harness::online(999, GameFeature::empty());
    harness.session.set_pvp_mode(PvpMode::RedFist).unwrap();
    assert!(harness.sent().is_empty());
    assert_eq!(harness.session.pvp_mode(), PvpMode::WhiteDove);

    let mut harness = Harness::online(1000, GameFeature::empty());
    harness.session.set_pvp_mode(PvpMode::RedFist).unwrap();
    assert_eq!(harness.session.pvp_mode(), PvpMode::RedFist);
    assert_eq!(harness.sent().len(), 1);
}

// ============================================================================
// WALKING
// ============================================================================

#[test]
fn walk_ids_are_monotonic_across_cancels_and_resyncs() {
    let mut harness = Harness::online(1098, GameFeature::NEW_WALKING);
    assert_eq!(harness.session.walk_id(), 0);

    harness.session.handle_event(SessionEvent::WalkCancelled);
    assert_eq!(harness.session.walk_id(), 1);

    harness
        .session
        .handle_event(SessionEvent::WalkIdSync { walk_id: 5 });
    assert_eq!(harness.session.walk_id(), 5);
    harness
        .session
        .handle_event(SessionEvent::WalkIdSync { walk_id: 3 });
    assert_eq!(harness.session.walk_id(), 5);
}

#[test]
fn predictive_cancel_bumps_the_walk_id_only_on_rollback() {
    let mut harness = Harness::online(1098, GameFeature::NEW_WALKING);
    harness.session.handle_event(SessionEvent::PlayerMoved {
        position: Position::new(100, 100, 7),
        direction: Direction::South,
    });
    // a prewalk step moves the predicted position off the server's tile
    harness.session.walk(Direction::East, true).unwrap();

    harness
        .session
        .handle_event(SessionEvent::PredictiveWalkCancelled {
            position: Position::new(100, 100, 7),
            direction: Direction::South,
        });
    assert_eq!(harness.session.walk_prediction_id(), 1);
    assert_eq!(harness.session.walk_id(), 1);

    // position already agrees, nothing to roll back
    harness
        .session
        .handle_event(SessionEvent::PredictiveWalkCancelled {
            position: Position::new(100, 100, 7),
            direction: Direction::South,
        });
    assert_eq!(harness.session.walk_prediction_id(), 2);
    assert_eq!(harness.session.walk_id(), 1);
}

#[test]
fn long_paths_need_the_new_walking_capability() {
    let path = vec![Direction::North; 128];
    let origin = Position::new(50, 50, 7);

    let mut harness = Harness::online(1098, GameFeature::empty());
    assert!(matches!(
        harness.session.auto_walk(&path, origin),
        Err(ProtocolError::ProtocolLimit(_))
    ));
    assert!(harness.sent().is_empty());

    let mut harness = Harness::online(1098, GameFeature::NEW_WALKING);
    harness.session.auto_walk(&path, origin).unwrap();
    match &harness.sent()[0] {
        ClientCommand::NewWalk { flags, path, .. } => {
            assert_eq!(flags & 0x04, 0x04);
            assert_eq!(path.len(), 128);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn empty_paths_are_rejected_before_any_wire_traffic() {
    let mut harness = Harness::online(1098, GameFeature::NEW_WALKING);
    assert!(matches!(
        harness.session.auto_walk(&[], Position::new(1, 1, 7)),
        Err(ProtocolError::ProtocolLimit(_))
    ));
    assert!(harness.sent().is_empty());
}

// ============================================================================
// KEEPALIVES
// ============================================================================

#[test]
fn legacy_ping_keeps_one_probe_in_flight() {
    let mut harness = Harness::online(1098, GameFeature::empty());

    harness.session.handle_event(SessionEvent::PingTimer);
    harness.session.handle_event(SessionEvent::PingTimer);
    assert_eq!(harness.sent(), vec![ClientCommand::Ping]);

    harness.session.handle_event(SessionEvent::PingBack);
    assert_eq!(harness.sink.take(), vec!["ping_back(0)".to_string()]);

    harness.session.handle_event(SessionEvent::PingTimer);
    assert_eq!(harness.sent(), vec![ClientCommand::Ping]);
}

#[test]
fn extended_probes_match_acks_out_of_order() {
    let mut harness = Harness::online(1098, GameFeature::EXTENDED_CLIENT_PING);

    harness.session.handle_event(SessionEvent::ExtendedPingTimer);
    harness.session.handle_event(SessionEvent::ExtendedPingTimer);
    let sent = harness.sent();
    assert_eq!(
        sent[0],
        ClientCommand::NewPing {
            ping_id: 1,
            local_ping: 0,
            frame_rate: 50
        }
    );
    assert!(matches!(sent[1], ClientCommand::NewPing { ping_id: 2, .. }));

    harness
        .session
        .handle_event(SessionEvent::PingBackExtended { ping_id: 2 });
    harness
        .session
        .handle_event(SessionEvent::PingBackExtended { ping_id: 1 });
    assert_eq!(harness.sink.take().len(), 2);

    // a stray ack for an unknown probe is ignored
    harness
        .session
        .handle_event(SessionEvent::PingBackExtended { ping_id: 99 });
    assert!(harness.sink.take().is_empty());
}

#[test]
fn server_pings_are_answered_immediately() {
    let mut harness = Harness::online(1098, GameFeature::empty());
    harness.session.handle_event(SessionEvent::PingRequest);
    assert_eq!(harness.sent(), vec![ClientCommand::PingBack]);
}

// ============================================================================
// REGISTRIES
// ============================================================================

#[test]
fn container_ids_are_reused_lowest_first() {
    let mut harness = Harness::online(1098, GameFeature::empty());
    let position = Position::new(10, 10, 7);

    harness.session.open_container(position, 2854, 0).unwrap();
    harness.session.handle_event(SessionEvent::ContainerOpened {
        container_id: 0,
        container: Container::default(),
    });
    harness.session.open_container(position, 2854, 1).unwrap();
    harness.session.handle_event(SessionEvent::ContainerOpened {
        container_id: 1,
        container: Container::default(),
    });
    harness
        .session
        .handle_event(SessionEvent::ContainerClosed { container_id: 0 });
    harness.session.open_container(position, 2854, 2).unwrap();

    let indexes: Vec<u8> = harness
        .sent()
        .iter()
        .map(|command| match command {
            ClientCommand::UseItem { index, .. } => *index,
            other => panic!("unexpected command: {other:?}"),
        })
        .collect();
    assert_eq!(indexes, vec![0, 1, 0]);

    // a close for an id that is not open changes nothing
    harness
        .session
        .handle_event(SessionEvent::ContainerClosed { container_id: 9 });
    assert_eq!(
        harness.sink.take(),
        vec![
            "container_opened(0)".to_string(),
            "container_opened(1)".to_string(),
            "container_closed(0)".to_string(),
        ]
    );
}

#[test]
fn vip_status_changes_only_touch_known_entries() {
    let mut harness = Harness::online(1098, GameFeature::empty());
    harness.session.handle_event(SessionEvent::VipAdded {
        player_id: 4,
        entry: VipEntry {
            name: "Ann".into(),
            status: VipStatus::Offline,
            description: String::new(),
            icon_id: 0,
            notify_login: false,
        },
    });
    harness.session.handle_event(SessionEvent::VipStateChanged {
        player_id: 4,
        status: VipStatus::Online,
    });
    harness.session.handle_event(SessionEvent::VipStateChanged {
        player_id: 99,
        status: VipStatus::Online,
    });
    assert_eq!(
        harness.session.vips().get(4).unwrap().status,
        VipStatus::Online
    );
    assert_eq!(harness.session.vips().len(), 1);
}

// ============================================================================
// ACTION GATE
// ============================================================================

#[test]
fn untrusted_calls_are_dropped_but_walking_stays_exempt() {
    let mut harness = Harness::online(1098, GameFeature::empty());
    harness.trusted.store(false, Ordering::Release);

    assert!(matches!(
        harness.session.talk("hello"),
        Err(ProtocolError::BotProtectionViolation)
    ));
    assert!(harness.session.walk(Direction::North, false).is_ok());
    assert!(harness.session.turn(Direction::East).is_ok());
    assert!(harness.session.stop().is_ok());
    assert!(harness.session.follow(Some(3)).is_ok());

    harness.trusted.store(true, Ordering::Release);
    assert!(harness.session.talk("hello").is_ok());
}

#[test]
fn empty_talk_is_dropped_silently() {
    let harness = Harness::online(1098, GameFeature::empty());
    assert!(harness.session.talk("").is_ok());
    assert!(harness.sent().is_empty());
}

// ============================================================================
// CONNECTION HEALTH
// ============================================================================

#[test]
fn connection_failing_is_edge_triggered() {
    let mut config = SessionConfig::default();
    config.ping.failing_threshold = Duration::from_secs(0);

    let scheduler = MockScheduler::default();
    let sink = RecordingSink::default();
    let mut session = Session::new(
        config,
        Box::new(IdentityRsa),
        Box::new(scheduler),
        Box::new(sink.clone()),
        Box::new(ScriptedEnvironment {
            trusted: Arc::new(AtomicBool::new(true)),
        }),
        Box::new(OpenMap),
    );
    session
        .set_protocol_version(1098, GameFeature::empty())
        .unwrap();
    let (transport, _) = MockTransport::pair();
    session
        .login_world(Credentials::default(), transport)
        .unwrap();
    session.handle_event(SessionEvent::Challenge {
        timestamp: 1,
        random: 1,
    });
    session.handle_event(SessionEvent::GameStart);
    sink.take();

    // a zero threshold means the session always looks stale
    session.handle_event(SessionEvent::ConnectionCheckTimer);
    session.handle_event(SessionEvent::ConnectionCheckTimer);
    assert_eq!(sink.take(), vec!["connection_failing(true)".to_string()]);

    // the warning clears once on game end
    session.handle_event(SessionEvent::GameEnd);
    let events = sink.take();
    assert!(events.contains(&"connection_failing(false)".to_string()));
    assert!(events.contains(&"game_end".to_string()));
}

#[test]
fn disconnect_tears_down_through_game_end() {
    let mut harness = Harness::online(1098, GameFeature::empty());
    harness.session.handle_event(SessionEvent::TransportClosed);
    assert_eq!(harness.session.state(), SessionState::Disconnected);
    assert!(!harness.wire.connected.load(Ordering::Acquire));
    assert!(harness.sink.take().contains(&"game_end".to_string()));

    // everything is gated off afterwards
    assert!(matches!(
        harness.session.stop(),
        Err(ProtocolError::NotInGame)
    ));
}

#[test]
fn safe_logout_asks_and_waits() {
    let mut harness = Harness::online(1098, GameFeature::empty());
    harness.session.safe_logout().unwrap();
    assert_eq!(harness.sent(), vec![ClientCommand::LeaveGame]);
    // still in game until the server confirms
    assert_eq!(harness.session.state(), SessionState::EnteredAlive);
    assert_eq!(harness.sink.take(), vec!["logout".to_string()]);
}
