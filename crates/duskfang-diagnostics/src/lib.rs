//! duskfang-diagnostics -- an append-only gameplay event log and named
//! counters, consumed only as an optional debug export.
//!
//! A fixed set of gameplay-meaningful events (ability hits, parries,
//! pack-plan changes, rejected state transitions) and a handful of named
//! counters that integration tests assert on directly (e.g.
//! `threat_budget_deferrals`). There is no per-component diffing or
//! provenance tracking here, just counts and a flat event log -- see
//! DESIGN.md for the tradeoff.
//!
//! Recording a [`GameEvent`] or bumping a counter is the *only* side effect
//! of `duskfang-core`'s event hooks (bash-hit, parry, wolf state change);
//! nothing here feeds back into simulation state, keeping the log a pure
//! observer.

#![deny(unsafe_code)]

use serde::{Deserialize, Serialize};

pub mod event;

pub use event::GameEvent;

/// Names of the rolling counters tracked by the diagnostic log. Kept as an
/// enum (rather than a free-form string key) so a typo in a test assertion
/// fails to compile instead of silently reading a zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Counter {
    /// `Attack` rejected because the wolf's facing was outside
    /// `ATTACK_FACING_COS_THRESHOLD` of the player.
    GatingAngleRejects,
    /// `Attack` rejected because line-of-sight to the player was blocked.
    GatingLosRejects,
    /// `Attack` rejected because `max_concurrent_attackers` was already met.
    ThreatBudgetDeferrals,
    /// An invalid id (destroyed body/wolf/pack) was referenced by a host call.
    InvalidIdAccess,
    /// Total attacks thrown by the player (light + heavy + special).
    AttacksThrown,
    /// Attacks dodged via roll invulnerability.
    AttacksDodged,
    /// Attacks absorbed by a block (including perfect parries).
    AttacksBlocked,
}

const COUNTER_COUNT: usize = 7;

fn counter_index(c: Counter) -> usize {
    match c {
        Counter::GatingAngleRejects => 0,
        Counter::GatingLosRejects => 1,
        Counter::ThreatBudgetDeferrals => 2,
        Counter::InvalidIdAccess => 3,
        Counter::AttacksThrown => 4,
        Counter::AttacksDodged => 5,
        Counter::AttacksBlocked => 6,
    }
}

/// Append-only log of gameplay events plus named counters. Cheap to clone
/// for snapshot purposes; cleared only by `init_run`/`reset_run`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticLog {
    events: Vec<GameEvent>,
    counters: [u64; COUNTER_COUNT],
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a gameplay event. Events are never removed except by `reset`.
    pub fn record(&mut self, event: GameEvent) {
        tracing::trace!(?event, "diagnostic event recorded");
        self.events.push(event);
    }

    /// Increment a named counter by one.
    pub fn bump(&mut self, counter: Counter) {
        self.counters[counter_index(counter)] += 1;
    }

    /// Increment a named counter by an explicit amount.
    pub fn bump_by(&mut self, counter: Counter, amount: u64) {
        self.counters[counter_index(counter)] += amount;
    }

    pub fn count(&self, counter: Counter) -> u64 {
        self.counters[counter_index(counter)]
    }

    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    /// Clear the log. Called by `init_run`/`reset_run` so a fresh run starts
    /// from zero counters.
    pub fn reset(&mut self) {
        self.events.clear();
        self.counters = [0; COUNTER_COUNT];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let log = DiagnosticLog::new();
        assert_eq!(log.count(Counter::ThreatBudgetDeferrals), 0);
    }

    #[test]
    fn bump_increments_only_the_named_counter() {
        let mut log = DiagnosticLog::new();
        log.bump(Counter::GatingAngleRejects);
        log.bump(Counter::GatingAngleRejects);
        assert_eq!(log.count(Counter::GatingAngleRejects), 2);
        assert_eq!(log.count(Counter::GatingLosRejects), 0);
    }

    #[test]
    fn reset_clears_events_and_counters() {
        let mut log = DiagnosticLog::new();
        log.record(GameEvent::PerfectParry { tick: 1 });
        log.bump(Counter::AttacksBlocked);
        log.reset();
        assert!(log.events().is_empty());
        assert_eq!(log.count(Counter::AttacksBlocked), 0);
    }
}
