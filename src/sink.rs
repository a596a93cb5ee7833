//! Host notification and environment boundaries.
//!
//! [`EventSink`] is the one-way channel from the session core to the host:
//! every method is a notification with no return value, and every method has
//! a no-op default so hosts implement only what they display. [`Environment`]
//! and [`MapProbe`] are the two host facts the core needs to ask for.

use crate::protocol::types::{ChaseMode, Direction, FightMode, Position, PvpMode, VipEntry};

/// Reason a character died, with the relief applied to the usual penalty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathKind {
    Regular,
    Blessed,
    NoPenalty,
}

/// Session-to-host notifications.
#[allow(unused_variables)]
pub trait EventSink {
    fn on_login(&mut self) {}
    fn on_pending_game(&mut self) {}
    fn on_enter_game(&mut self) {}
    fn on_game_start(&mut self) {}
    fn on_game_end(&mut self) {}
    fn on_logout(&mut self) {}
    fn on_death(&mut self, kind: DeathKind, penalty: u8) {}

    fn on_ping(&mut self) {}
    fn on_ping_back(&mut self, latency_ms: u64) {}
    /// Edge-triggered: fired once when the connection starts or stops
    /// looking unhealthy, not on every check.
    fn on_connection_failing(&mut self, failing: bool) {}
    fn on_connection_error(&mut self, message: &str, code: u8) {}

    fn on_walk(&mut self, direction: Direction) {}
    fn on_auto_walk(&mut self, path: &[Direction]) {}

    fn on_fight_mode_change(&mut self, mode: FightMode) {}
    fn on_chase_mode_change(&mut self, mode: ChaseMode) {}
    fn on_safe_fight_change(&mut self, safe: bool) {}
    fn on_pvp_mode_change(&mut self, mode: PvpMode) {}
    fn on_attacking_creature_change(&mut self, new: Option<u32>, old: Option<u32>) {}
    fn on_following_creature_change(&mut self, new: Option<u32>, old: Option<u32>) {}

    fn on_add_vip(&mut self, player_id: u32, entry: &VipEntry) {}
    fn on_vip_state_change(&mut self, player_id: u32, entry: &VipEntry) {}

    fn on_container_opened(&mut self, container_id: u8) {}
    fn on_container_closed(&mut self, container_id: u8) {}

    fn on_gm_actions(&mut self, actions: &[u8]) {}
}

/// No-notifications sink for hosts that only drive the wire.
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {}

/// Host facts the session core consults.
pub trait Environment {
    /// True while the current call stack originates from a user input
    /// event. The action gate uses this as the trusted-context check.
    fn in_input_event(&self) -> bool;

    /// Recent rendering rate, forwarded as a hint in extended ping probes.
    fn frame_rate(&self) -> u16 {
        0
    }
}

/// Walkability oracle for prewalk decisions. Conservative hosts can always
/// answer `false`, which only disables prediction.
pub trait MapProbe {
    fn is_walkable(&self, position: Position) -> bool;
}
