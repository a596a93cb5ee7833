//! Keepalive round-trip tracking.
//!
//! Two schemes coexist. The legacy scheme is strictly one probe in flight:
//! a new ping is only sent once the previous ack arrived, and the round
//! trip is taken from the matched pair. The extended scheme sends probes
//! with increasing ids on a fixed cadence and matches acks out of order
//! against a pending map, so a slow ack never blocks the next probe.

use std::collections::VecDeque;
use std::time::Instant;

use tracing::debug;

/// Outstanding extended probes beyond this are dropped oldest-first; an ack
/// for a dropped probe is ignored like any unknown id.
const MAX_PENDING_PROBES: usize = 64;

#[derive(Debug)]
pub struct PingTracker {
    sent: u64,
    received: u64,
    last_rtt_ms: Option<u64>,
    legacy_sent_at: Option<Instant>,
    next_probe_id: u32,
    pending: VecDeque<(u32, Instant)>,
}

impl Default for PingTracker {
    fn default() -> Self {
        Self {
            sent: 0,
            received: 0,
            last_rtt_ms: None,
            legacy_sent_at: None,
            next_probe_id: 1,
            pending: VecDeque::new(),
        }
    }
}

impl PingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Legacy probes are gated on the previous ack: true only when no
    /// probe is outstanding.
    pub fn can_send_legacy(&self) -> bool {
        self.sent == self.received
    }

    pub fn record_legacy_sent(&mut self, now: Instant) {
        self.sent += 1;
        self.legacy_sent_at = Some(now);
    }

    /// Legacy ack. Returns the round trip when it completes the matched
    /// pair; a stray ack only bumps the counter.
    pub fn record_legacy_ack(&mut self, now: Instant) -> Option<u64> {
        self.received += 1;
        if self.received == self.sent {
            let rtt = self
                .legacy_sent_at
                .map(|sent_at| now.duration_since(sent_at).as_millis() as u64);
            self.last_rtt_ms = rtt.or(self.last_rtt_ms);
            rtt
        } else {
            None
        }
    }

    /// Start an extended probe; returns its id. Ids increase for the
    /// lifetime of the tracker so acks are unambiguous.
    pub fn begin_probe(&mut self, now: Instant) -> u32 {
        let id = self.next_probe_id;
        self.next_probe_id = self.next_probe_id.wrapping_add(1);
        self.pending.push_back((id, now));
        if self.pending.len() > MAX_PENDING_PROBES {
            let dropped = self.pending.pop_front();
            debug!(?dropped, "dropping oldest unacked ping probe");
        }
        id
    }

    /// Match an extended ack against its probe, in any order. Unknown ids
    /// (stale, dropped, or fabricated) are ignored.
    pub fn ack_probe(&mut self, ping_id: u32, now: Instant) -> Option<u64> {
        let index = self.pending.iter().position(|(id, _)| *id == ping_id)?;
        let (_, sent_at) = self.pending.remove(index)?;
        let rtt = now.duration_since(sent_at).as_millis() as u64;
        self.last_rtt_ms = Some(rtt);
        Some(rtt)
    }

    /// Most recent round trip, from either scheme.
    pub fn last_rtt_ms(&self) -> Option<u64> {
        self.last_rtt_ms
    }

    pub fn pending_probes(&self) -> usize {
        self.pending.len()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn legacy_allows_one_probe_in_flight() {
        let mut tracker = PingTracker::new();
        let now = Instant::now();
        assert!(tracker.can_send_legacy());
        tracker.record_legacy_sent(now);
        assert!(!tracker.can_send_legacy());
        tracker.record_legacy_ack(now + Duration::from_millis(40));
        assert!(tracker.can_send_legacy());
        assert_eq!(tracker.last_rtt_ms(), Some(40));
    }

    #[test]
    fn extended_acks_match_out_of_order() {
        let mut tracker = PingTracker::new();
        let now = Instant::now();
        let first = tracker.begin_probe(now);
        let second = tracker.begin_probe(now + Duration::from_millis(10));
        assert_eq!(
            tracker.ack_probe(second, now + Duration::from_millis(30)),
            Some(20)
        );
        assert_eq!(
            tracker.ack_probe(first, now + Duration::from_millis(50)),
            Some(50)
        );
        assert_eq!(tracker.ack_probe(first, now), None);
    }

    #[test]
    fn pending_probes_are_bounded() {
        let mut tracker = PingTracker::new();
        let now = Instant::now();
        let first = tracker.begin_probe(now);
        for _ in 0..MAX_PENDING_PROBES {
            tracker.begin_probe(now);
        }
        assert_eq!(tracker.pending_probes(), MAX_PENDING_PROBES);
        // the oldest probe was evicted, its late ack is ignored
        assert_eq!(tracker.ack_probe(first, now), None);
    }

    #[test]
    fn reset_clears_everything() {
        let mut tracker = PingTracker::new();
        let now = Instant::now();
        tracker.record_legacy_sent(now);
        tracker.begin_probe(now);
        tracker.reset();
        assert!(tracker.can_send_legacy());
        assert_eq!(tracker.pending_probes(), 0);
        assert_eq!(tracker.last_rtt_ms(), None);
    }
}
