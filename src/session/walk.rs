//! Walk sequencing state.
//!
//! Under the rewritten walking scheme every walk packet carries two
//! counters. `walk_id` names the walk the client believes it is on; the
//! server's cancels bump it and a resync raises it to whichever side is
//! ahead, never lowering it. `prediction_id` counts predictive
//! cancellations and bumps on every one, accepted or not.

use crate::error::{ProtocolError, Result};

/// Prewalk bit in the walk packet's flag byte.
pub const FLAG_PREWALK: u8 = 0x01;
/// Auto-walk bit in the walk packet's flag byte.
pub const FLAG_AUTO_WALK: u8 = 0x04;

/// Longest path a legacy auto-walk packet accepts.
pub const MAX_LEGACY_PATH: usize = 127;
/// Longest path under the rewritten walking scheme.
pub const MAX_NEW_WALK_PATH: usize = 4097;

#[derive(Debug, Default)]
pub struct WalkSequencer {
    walk_id: u32,
    prediction_id: u32,
}

impl WalkSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn walk_id(&self) -> u32 {
        self.walk_id
    }

    pub fn prediction_id(&self) -> u32 {
        self.prediction_id
    }

    /// Reject empty and oversized paths before any wire traffic.
    pub fn validate_path(&self, steps: usize, new_walking: bool) -> Result<()> {
        if steps == 0 {
            return Err(ProtocolError::ProtocolLimit("empty walk path".into()));
        }
        let limit = if new_walking {
            MAX_NEW_WALK_PATH
        } else {
            MAX_LEGACY_PATH
        };
        if steps > limit {
            return Err(ProtocolError::ProtocolLimit(format!(
                "walk path of {steps} steps exceeds the protocol limit of {limit}"
            )));
        }
        Ok(())
    }

    /// Server cancelled the current walk outright.
    pub fn on_walk_cancel(&mut self) {
        self.walk_id += 1;
    }

    /// Server cancelled a predicted step. The prediction counter always
    /// advances; the walk id only when the local player accepted the
    /// rollback.
    pub fn on_predictive_cancel(&mut self, accepted: bool) {
        self.prediction_id += 1;
        if accepted {
            self.walk_id += 1;
        }
    }

    /// Resync against the server's view. Monotonic: the id never moves
    /// backwards.
    pub fn sync_walk_id(&mut self, server_walk_id: u32) {
        self.walk_id = self.walk_id.max(server_walk_id);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
