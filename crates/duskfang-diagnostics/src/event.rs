//! Gameplay events recorded by [`crate::DiagnosticLog`].
//!
//! Every variant corresponds to an externally observable gameplay moment
//! (bash-hit, parry, wolf recovery) or a named counter worth tracking over
//! a run. Hooks are pure appends to the log -- nothing here is read back
//! by the simulation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    /// Warden shoulder bash connected with a target.
    BashHit { tick: u64, target_wolf_id: u32 },
    /// Raider berserker charge connected with a target.
    ChargeHit { tick: u64, target_wolf_id: u32 },
    /// Kensei flow dash connected with a target.
    DashHit { tick: u64, target_wolf_id: u32, combo_level: u8 },
    /// An incoming attack arrived within the parry window.
    PerfectParry { tick: u64 },
    /// An incoming attack was blocked (not a perfect parry).
    Blocked { tick: u64 },
    /// A wolf transitioned between FSM states.
    WolfStateChange {
        tick: u64,
        wolf_id: u32,
        from: &'static str,
        to: &'static str,
    },
    /// A pack adopted a new plan.
    PackPlanChange {
        tick: u64,
        pack_id: u32,
        plan: &'static str,
    },
    /// A wolf died.
    WolfKilled { tick: u64, wolf_id: u32 },
    /// A host call referenced a destroyed/unknown id.
    InvalidIdReferenced { tick: u64, kind: &'static str, id: u32 },
}
