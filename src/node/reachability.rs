//! Successor reachability tracking.
//!
//! A member that fails `max_failures` hand-offs in a row is suspected for
//! `suspect_timeout` and skipped when picking where the token goes next.
//! Once the timeout passes it gets one more attempt; another failure
//! suspects it again straight away.
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::registry::{successor_of, MemberId};

#[derive(Clone, Copy, Debug, Default)]
struct SuccessorHealth {
    consecutive_failures: u32,
    suspected_since: Option<Instant>,
}

#[derive(Clone, Debug)]
pub struct Reachability {
    max_failures: u32,
    suspect_timeout: Duration,
    members: HashMap<MemberId, SuccessorHealth>,
}

impl Reachability {
    pub fn new(max_failures: u32, suspect_timeout: Duration) -> Self {
        Self {
            max_failures: max_failures.max(1),
            suspect_timeout,
            members: HashMap::new(),
        }
    }

    pub fn record_success(&mut self, member: MemberId) {
        self.members.remove(&member);
    }

    /// Returns the number of consecutive failures against `member`
    pub fn record_failure(&mut self, member: MemberId) -> u32 {
        let health = self.members.entry(member).or_default();
        health.consecutive_failures = health.consecutive_failures.saturating_add(1);
        if health.consecutive_failures >= self.max_failures {
            health.suspected_since = Some(Instant::now());
        }
        health.consecutive_failures
    }

    pub fn is_suspected(&self, member: MemberId) -> bool {
        self.members
            .get(&member)
            .and_then(|health| health.suspected_since)
            .map(|since| since.elapsed() < self.suspect_timeout)
            .unwrap_or(false)
    }

    pub fn consecutive_failures(&self, member: MemberId) -> u32 {
        self.members
            .get(&member)
            .map(|health| health.consecutive_failures)
            .unwrap_or(0)
    }

    /// Where the token should go next from `me`.
    ///
    /// Walks the ring from the direct successor, skipping suspected members.
    /// Returns `me` when alone, the direct successor when everyone else is
    /// suspected, and `None` when `me` is not in `snapshot`.
    pub fn choose_target(&self, me: MemberId, snapshot: &[MemberId]) -> Option<MemberId> {
        let direct = successor_of(me, snapshot)?;
        let mut candidate = direct;
        while candidate != me {
            if !self.is_suspected(candidate) {
                return Some(candidate);
            }
            candidate = successor_of(candidate, snapshot)?;
        }
        Some(direct)
    }
}
