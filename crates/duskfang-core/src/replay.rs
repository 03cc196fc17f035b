//! Deterministic replay with input recording and checkpoint verification
//!.
//!
//! A [`ReplayRecorder`] captures an initial [`Snapshot`], then records
//! each tick's [`RawInputFrame`] plus an optional state-hash checkpoint,
//! producing a [`ReplayLog`]. [`replay`] restores the initial snapshot
//! onto a `Core`, re-feeds the recorded inputs tick-by-tick, and reports
//! the first tick where the replayed state hash diverges from the one
//! recorded live, if any.
//!
//! This is explicitly not a rollback-reconciliation buffer: there is no
//! speculative re-simulation or prediction rollback here, only
//! deterministic record/replay for regression tests and bug reports.
//!
//! # Recording
//!
//! ```
//! use duskfang_core::coordinator::Core;
//! use duskfang_core::input::RawInputFrame;
//! use duskfang_core::progression::CharacterClass;
//! use duskfang_core::replay::ReplayRecorder;
//! use duskfang_foundation::fixed::fixed;
//!
//! let mut core = Core::new(12345, CharacterClass::Warden);
//! let mut recorder = ReplayRecorder::new(core.capture_snapshot(), 10);
//!
//! for tick in 0..100u64 {
//!     let input = RawInputFrame::default();
//!     recorder.record_tick(tick, input, Some(core.state_hash()));
//!     core.tick(input, fixed(1.0 / 60.0));
//! }
//!
//! let log = recorder.finish();
//! ```
//!
//! # Replaying
//!
//! ```
//! # use duskfang_core::coordinator::Core;
//! # use duskfang_core::input::RawInputFrame;
//! # use duskfang_core::progression::CharacterClass;
//! # use duskfang_core::replay::ReplayRecorder;
//! # use duskfang_foundation::fixed::fixed;
//! # let mut core = Core::new(12345, CharacterClass::Warden);
//! # let mut recorder = ReplayRecorder::new(core.capture_snapshot(), 10);
//! # for tick in 0..100u64 {
//! #     let input = RawInputFrame::default();
//! #     recorder.record_tick(tick, input, Some(core.state_hash()));
//! #     core.tick(input, fixed(1.0 / 60.0));
//! # }
//! # let log = recorder.finish();
//! use duskfang_core::replay::replay;
//!
//! let mut playback = Core::new(12345, CharacterClass::Warden);
//! let result = replay(&mut playback, &log).expect("replay log should be well-formed");
//! assert!(result.completed);
//! assert!(result.first_divergence.is_none());
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use duskfang_foundation::error::CoreError;
use duskfang_foundation::fixed::fixed;

use crate::coordinator::Core;
use crate::input::RawInputFrame;
use crate::snapshot::Snapshot;

// ---------------------------------------------------------------------------
// ReplayLog
// ---------------------------------------------------------------------------

/// A complete replay log: initial snapshot + ordered sequence of inputs
/// and checkpoints. Fully serializable (bincode) for storage,
/// transmission, or regression test fixtures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayLog {
    /// The state captured at the start of recording. Replay begins by
    /// restoring this snapshot onto the target `Core`.
    pub initial_snapshot: Snapshot,

    /// Total number of ticks that were recorded. Replay executes exactly
    /// this many ticks from the initial snapshot, regardless of how many
    /// entries (inputs/checkpoints) exist.
    pub total_ticks: u64,

    /// Ordered sequence of replay entries.
    pub entries: Vec<ReplayEntry>,
}

// ---------------------------------------------------------------------------
// ReplayEntry
// ---------------------------------------------------------------------------

/// A single entry in a [`ReplayLog`]: either an input frame or a state
/// hash checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReplayEntry {
    /// An input frame recorded at the given tick.
    Input { tick: u64, input: RawInputFrame },
    /// A state hash checkpoint recorded at the given tick, before that
    /// tick was executed.
    Checkpoint { tick: u64, state_hash: [u8; 32] },
}

// ---------------------------------------------------------------------------
// ReplayResult / ReplayDivergence
// ---------------------------------------------------------------------------

/// The outcome of replaying a [`ReplayLog`] against a `Core`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayResult {
    pub completed: bool,
    pub ticks_replayed: u64,
    /// The first checkpoint where the replayed state hash did not match
    /// the recorded hash. `None` if every checkpoint matched.
    pub first_divergence: Option<ReplayDivergence>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayDivergence {
    pub tick: u64,
    pub expected_hash: [u8; 32],
    pub actual_hash: [u8; 32],
}

// ---------------------------------------------------------------------------
// ReplayRecorder
// ---------------------------------------------------------------------------

/// Records a simulation run into a [`ReplayLog`].
///
/// Create a recorder with an initial snapshot and a checkpoint interval.
/// Call [`record_tick`](Self::record_tick) before each `core.tick(...)`
/// call to capture the input and (periodically) a state hash checkpoint.
/// When done, call [`finish`](Self::finish) to produce the log.
///
/// Enforces monotonically increasing tick numbers: each call to
/// `record_tick` must supply a tick strictly greater than the previous
/// call.
pub struct ReplayRecorder {
    log: ReplayLog,
    checkpoint_interval: u64,
    ticks_recorded: u64,
    last_tick: Option<u64>,
}

impl ReplayRecorder {
    /// `checkpoint_interval` of `0` means "checkpoint whenever a hash is
    /// supplied"; otherwise a checkpoint is kept only on ticks divisible
    /// by the interval.
    pub fn new(initial_snapshot: Snapshot, checkpoint_interval: u64) -> Self {
        ReplayRecorder {
            log: ReplayLog {
                initial_snapshot,
                total_ticks: 0,
                entries: Vec::new(),
            },
            checkpoint_interval,
            ticks_recorded: 0,
            last_tick: None,
        }
    }

    /// # Panics
    ///
    /// Panics if `tick` is not strictly greater than the tick supplied in
    /// the previous call.
    pub fn record_tick(&mut self, tick: u64, input: RawInputFrame, state_hash: Option<[u8; 32]>) {
        if let Some(prev) = self.last_tick {
            assert!(
                tick > prev,
                "ReplayRecorder::record_tick: tick {tick} is not strictly greater than previous tick {prev}"
            );
        }
        self.last_tick = Some(tick);
        self.ticks_recorded += 1;

        self.log.entries.push(ReplayEntry::Input { tick, input });

        if let Some(hash) = state_hash {
            let should_checkpoint =
                self.checkpoint_interval == 0 || tick % self.checkpoint_interval == 0;
            if should_checkpoint {
                self.log.entries.push(ReplayEntry::Checkpoint { tick, state_hash: hash });
            }
        }
    }

    pub fn finish(mut self) -> ReplayLog {
        self.log.total_ticks = self.ticks_recorded;
        self.log
    }
}

// ---------------------------------------------------------------------------
// replay()
// ---------------------------------------------------------------------------

/// Replay a [`ReplayLog`] against `core`, verifying determinism at each
/// checkpoint.
///
/// Validates the log (no duplicate entries, no tick overflow) before
/// touching `core`, so on a validation error `core`'s state is guaranteed
/// unmodified. On success, restores the initial snapshot, then for each
/// tick in range: checks any checkpoint recorded for that tick against
/// the live state hash (before executing it, matching how the hash was
/// captured during recording), then feeds the recorded input (or a
/// default empty input) through `core.tick`.
///
/// Stops at the first divergence but still reports ticks replayed up to
/// that point.
pub fn replay(core: &mut Core, log: &ReplayLog) -> Result<ReplayResult, CoreError> {
    let mut input_map: BTreeMap<u64, RawInputFrame> = BTreeMap::new();
    let mut checkpoint_map: BTreeMap<u64, [u8; 32]> = BTreeMap::new();

    for entry in &log.entries {
        match entry {
            ReplayEntry::Input { tick, input } => {
                if input_map.insert(*tick, *input).is_some() {
                    return Err(CoreError::InvalidReplayLog(format!(
                        "duplicate Input entry at tick {tick}"
                    )));
                }
            }
            ReplayEntry::Checkpoint { tick, state_hash } => {
                if checkpoint_map.insert(*tick, *state_hash).is_some() {
                    return Err(CoreError::InvalidReplayLog(format!(
                        "duplicate Checkpoint entry at tick {tick}"
                    )));
                }
            }
        }
    }

    let start_tick = log.initial_snapshot.run.tick;
    let total_ticks = log.total_ticks;

    if total_ticks == 0 {
        return Ok(ReplayResult {
            completed: true,
            ticks_replayed: 0,
            first_divergence: None,
        });
    }

    let end_tick = start_tick.checked_add(total_ticks).ok_or_else(|| {
        CoreError::InvalidReplayLog(format!(
            "tick range overflow: start_tick ({start_tick}) + total_ticks ({total_ticks})"
        ))
    })?;

    core.restore_from_snapshot(&log.initial_snapshot);

    let mut ticks_replayed: u64 = 0;
    let dt = fixed(1.0 / 60.0);

    for tick in start_tick..end_tick {
        if let Some(expected_hash) = checkpoint_map.get(&tick) {
            let actual_hash = core.state_hash();
            if &actual_hash != expected_hash {
                return Ok(ReplayResult {
                    completed: false,
                    ticks_replayed,
                    first_divergence: Some(ReplayDivergence {
                        tick,
                        expected_hash: *expected_hash,
                        actual_hash,
                    }),
                });
            }
        }

        let input = input_map.get(&tick).copied().unwrap_or_default();
        core.tick(input, dt);
        ticks_replayed += 1;
    }

    Ok(ReplayResult {
        completed: true,
        ticks_replayed,
        first_divergence: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progression::CharacterClass;

    #[test]
    fn replay_of_a_clean_run_never_diverges() {
        let mut recording = Core::new(42, CharacterClass::Warden);
        let mut recorder = ReplayRecorder::new(recording.capture_snapshot(), 5);

        for tick in 0..60u64 {
            let input = RawInputFrame {
                move_x: if tick % 3 == 0 { 1.0 } else { 0.0 },
                ..Default::default()
            };
            recorder.record_tick(tick, input, Some(recording.state_hash()));
            recording.tick(input, fixed(1.0 / 60.0));
        }
        let log = recorder.finish();

        let mut playback = Core::new(1, CharacterClass::Kensei);
        let result = replay(&mut playback, &log).unwrap();
        assert!(result.completed);
        assert!(result.first_divergence.is_none());
        assert_eq!(result.ticks_replayed, 60);
        assert_eq!(playback.state_hash(), recording.state_hash());
    }

    #[test]
    fn duplicate_checkpoint_entries_are_rejected_before_mutating_core() {
        let core_snapshot = Core::new(1, CharacterClass::Warden).capture_snapshot();
        let log = ReplayLog {
            initial_snapshot: core_snapshot,
            total_ticks: 1,
            entries: vec![
                ReplayEntry::Checkpoint { tick: 0, state_hash: [0u8; 32] },
                ReplayEntry::Checkpoint { tick: 0, state_hash: [1u8; 32] },
            ],
        };
        let mut core = Core::new(99, CharacterClass::Raider);
        let hash_before = core.state_hash();
        assert!(replay(&mut core, &log).is_err());
        assert_eq!(core.state_hash(), hash_before);
    }

    #[test]
    fn zero_total_ticks_is_trivially_complete() {
        let snapshot = Core::new(1, CharacterClass::Warden).capture_snapshot();
        let log = ReplayLog { initial_snapshot: snapshot, total_ticks: 0, entries: Vec::new() };
        let mut core = Core::new(1, CharacterClass::Warden);
        let result = replay(&mut core, &log).unwrap();
        assert!(result.completed);
        assert_eq!(result.ticks_replayed, 0);
    }
}
