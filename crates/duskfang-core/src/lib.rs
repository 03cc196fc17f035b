//! duskfang-core -- the deterministic combat/physics/wolf-AI simulation
//! core of a top-down roguelike combat game.
//!
//! A single [`coordinator::Core`] owns every subsystem below and advances
//! them in one fixed order per call to [`coordinator::Core::tick`]. Given
//! an initial seed, a character class, and a stream of per-tick
//! [`input::RawInputFrame`]s, the core produces a bit-identical sequence
//! of state hashes on every machine (see [`snapshot`]).
//!
//! # Quick start
//!
//! ```
//! use duskfang_core::coordinator::Core;
//! use duskfang_core::input::RawInputFrame;
//! use duskfang_core::progression::CharacterClass;
//! use duskfang_foundation::fixed::fixed;
//!
//! let mut core = Core::new(12345, CharacterClass::Warden);
//! for _ in 0..60 {
//!     core.tick(RawInputFrame::default(), fixed(1.0 / 60.0));
//! }
//! assert_eq!(core.run.tick, 60);
//! ```

#![deny(unsafe_code)]

pub mod coordinator;

pub mod combat;
pub mod constants;
pub mod difficulty;
pub mod input;
pub mod pack;
pub mod physics;
pub mod player;
pub mod progression;
pub mod replay;
pub mod run_context;
pub mod skeleton;
pub mod snapshot;
pub mod wolf;

/// Convenience re-exports for host/FFI crates driving a `Core`.
pub mod prelude {
    pub use crate::coordinator::Core;
    pub use crate::input::{GatedInput, InputGate, RawInputFrame};
    pub use crate::progression::{CharacterClass, NullProgressionHook, ProgressionHook};
    pub use crate::replay::{replay, ReplayDivergence, ReplayEntry, ReplayLog, ReplayRecorder, ReplayResult};
    pub use crate::snapshot::Snapshot;
}
