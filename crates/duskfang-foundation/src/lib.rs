//! duskfang-foundation -- deterministic scalar math, RNG, and id allocation
//! shared by every other crate in the duskfang simulation core.
//!
//! Everything in this crate is pure and allocation-light: no `f32` leaks
//! into gameplay state, the RNG is the single permitted source of
//! randomness, and ids are dense and never recycled within a run. These
//! three properties are what make the rest of the workspace reproducible
//! bit-for-bit across machines.

#![deny(unsafe_code)]

pub mod error;
pub mod fixed;
pub mod ids;
pub mod rng;

pub mod prelude {
    pub use crate::error::CoreError;
    pub use crate::fixed::{fixed, Fixed, FixedVec2, FixedVec3};
    pub use crate::ids::IdAllocator;
    pub use crate::rng::Rng;
}
