//! Action gating.
//!
//! Every host-initiated game action passes one check before any wire
//! traffic: the session must be entered and alive (dead sessions keep only
//! looking), a local player must exist, the transport must be connected,
//! and under bot protection the call must come from a trusted input
//! context unless the session itself raised the suppression flag around an
//! internal send. A rejected call is dropped whole; no partial state
//! change, no partial packet.

use tracing::warn;

use crate::error::{ProtocolError, Result};

/// Snapshot of the facts the gate rules on, taken at call time.
#[derive(Debug, Clone, Copy)]
pub struct GateContext {
    pub entered: bool,
    pub alive: bool,
    pub has_local_player: bool,
    pub transport_connected: bool,
    pub trusted_input: bool,
}

#[derive(Debug)]
pub struct ActionGate {
    bot_protection: bool,
    internal_send: bool,
}

impl ActionGate {
    pub fn new(bot_protection: bool) -> Self {
        Self {
            bot_protection,
            internal_send: false,
        }
    }

    /// Raise the suppression flag for an internally generated send (login
    /// follow-ups, ping replies, mode sync). Must be paired with
    /// [`end_internal`](Self::end_internal).
    pub fn begin_internal(&mut self) {
        self.internal_send = true;
    }

    pub fn end_internal(&mut self) {
        self.internal_send = false;
    }

    /// Gate a game action. `allow_when_dead` admits the few actions a dead
    /// session may still perform.
    pub fn check(&self, ctx: GateContext, allow_when_dead: bool) -> Result<()> {
        if !ctx.entered || !ctx.has_local_player {
            return Err(ProtocolError::NotInGame);
        }
        if !ctx.alive && !allow_when_dead {
            return Err(ProtocolError::NotInGame);
        }
        if !ctx.transport_connected {
            return Err(ProtocolError::ConnectionClosed);
        }
        if self.bot_protection && !self.internal_send && !ctx.trusted_input {
            warn!("dropping game action from an untrusted context");
            return Err(ProtocolError::BotProtectionViolation);
        }
        Ok(())
    }
}
