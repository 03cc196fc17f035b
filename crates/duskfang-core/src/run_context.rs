//! Per-run bookkeeping that doesn't belong to any one subsystem:
//! elapsed tick count, wall-clock-independent run seed, and the current
//! character class.

use serde::{Deserialize, Serialize};

use crate::progression::CharacterClass;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunContext {
    pub seed: u32,
    pub tick: u64,
    pub character_class: CharacterClass,
    pub max_concurrent_attackers: u32,
    /// Opaque phase tag owned entirely by the host's 8-phase shell. The
    /// core stores and exposes whatever the shell last wrote and never
    /// reads or branches on this value.
    pub shell_phase: u32,
}

impl RunContext {
    pub fn new(seed: u32, character_class: CharacterClass) -> Self {
        RunContext {
            seed,
            tick: 0,
            character_class,
            max_concurrent_attackers: crate::constants::DEFAULT_MAX_CONCURRENT_ATTACKERS,
            shell_phase: 0,
        }
    }
}
