//! A read-only projection of [`Core`] plus the read-API accessors and the
//! BLAKE3 state hash used by the determinism tests.
//!
//! Capture, restore, state hash, fork, keyed to the flat data model:
//! there is exactly one physics world, one player, one wolf/pack sim per
//! run, so the snapshot is a plain struct of clones rather than an
//! archetype-table dump. The progression hook is deliberately absent from
//! it: it is host-injected behaviour, not simulation state, and has
//! nothing to serialize.

use serde::{Deserialize, Serialize};

use duskfang_diagnostics::DiagnosticLog;
use duskfang_foundation::error::CoreError;
use duskfang_foundation::fixed::FixedVec2;

use crate::combat::CombatState;
use crate::coordinator::Core;
use crate::difficulty::AdaptiveDifficulty;
use crate::pack::PackSim;
use crate::physics::PhysicsWorld;
use crate::player::PlayerState;
use crate::run_context::RunContext;
use crate::wolf::WolfSim;

/// A full, serializable copy of everything `Core::tick` mutates.
///
/// Cloning a `Core`'s state into a `Snapshot` and later restoring it
/// reproduces bit-identical future ticks, since every field here is
/// exactly what `tick()` reads and writes -- nothing is reconstructed or
/// re-derived on restore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub physics: PhysicsWorld,
    pub player: PlayerState,
    pub combat: CombatState,
    pub wolves: WolfSim,
    pub packs: PackSim,
    pub difficulty: AdaptiveDifficulty,
    pub run: RunContext,
    pub rng_state: u32,
    pub diagnostics: DiagnosticLog,
    pub player_body_id: u32,
}

impl Core {
    /// Capture the current state into a standalone [`Snapshot`]. Cheap
    /// relative to a full `tick()` but not free -- every field is cloned.
    pub fn capture_snapshot(&self) -> Snapshot {
        Snapshot {
            physics: self.physics.clone(),
            player: self.player.clone(),
            combat: self.combat.clone(),
            wolves: self.wolves.clone(),
            packs: self.packs.clone(),
            difficulty: self.difficulty.clone(),
            run: self.run.clone(),
            rng_state: self.rng.state(),
            diagnostics: self.diagnostics.clone(),
            player_body_id: self.player_body_id(),
        }
    }

    /// Overwrite every mutable field from `snapshot`. The progression hook
    /// is untouched -- it is not part of simulation state.
    pub fn restore_from_snapshot(&mut self, snapshot: &Snapshot) {
        self.physics = snapshot.physics.clone();
        self.player = snapshot.player.clone();
        self.combat = snapshot.combat.clone();
        self.wolves = snapshot.wolves.clone();
        self.packs = snapshot.packs.clone();
        self.difficulty = snapshot.difficulty.clone();
        self.run = snapshot.run.clone();
        self.rng.set_state(snapshot.rng_state);
        self.diagnostics = snapshot.diagnostics.clone();
        self.set_player_body_id(snapshot.player_body_id);
    }

    /// Fold tick, player state, every wolf, every pack, and the RNG state
    /// through BLAKE3 in a fixed field order. Two cores fed the same seed
    /// and the same input sequence produce identical hashes at every
    /// tick -- this is the basis for the replay divergence check.
    pub fn state_hash(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hash_player(&mut hasher, &self.player);
        hash_combat(&mut hasher, &self.combat);
        hasher.update(&self.run.tick.to_le_bytes());
        hasher.update(&self.rng.state().to_le_bytes());
        for wolf in self.wolves.wolves() {
            hasher.update(&wolf.id.to_le_bytes());
            hasher.update(&wolf.body_id.to_le_bytes());
            hasher.update(&wolf.hp.raw().to_le_bytes());
            hasher.update(&wolf.state_timer.raw().to_le_bytes());
            hash_vec2(&mut hasher, position_of(&self.physics, wolf.body_id));
        }
        for pack in self.packs.packs() {
            hasher.update(&pack.id.to_le_bytes());
            hasher.update(&pack.morale.raw().to_le_bytes());
            hasher.update(&(pack.plan as u32).to_le_bytes());
        }
        *hasher.finalize().as_bytes()
    }

    /// Clone the current state into an independent `Core` sharing no
    /// mutable state with `self` -- used by speculative tooling (e.g. a
    /// UI "what if" preview) that must not perturb the live run.
    pub fn fork_snapshot(&self) -> Core {
        let mut forked = Core::new(self.run.seed, self.run.character_class);
        forked.restore_from_snapshot(&self.capture_snapshot());
        forked
    }
}

impl Snapshot {
    /// Serialize to bytes for storage in a [`crate::replay::ReplayLog`] or
    /// a regression fixture.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CoreError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| CoreError::InvalidSnapshot(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Snapshot, CoreError> {
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map(|(snapshot, _)| snapshot)
            .map_err(|e| CoreError::InvalidSnapshot(e.to_string()))
    }

    // -- §6 read API: position/motion ---------------------------------------

    pub fn get_x(&self) -> f32 {
        self.player.position.x.to_f32()
    }

    pub fn get_y(&self) -> f32 {
        self.player.position.y.to_f32()
    }

    pub fn get_vel_x(&self) -> f32 {
        self.player.velocity.x.to_f32()
    }

    pub fn get_vel_y(&self) -> f32 {
        self.player.velocity.y.to_f32()
    }

    pub fn get_is_grounded(&self) -> bool {
        self.player.grounded
    }

    pub fn get_jump_count(&self) -> u8 {
        self.player.jump_count
    }

    pub fn get_is_wall_sliding(&self) -> bool {
        self.player.wall_sliding
    }

    // -- vitals ---------------------------------------------------------------

    pub fn get_hp(&self) -> f32 {
        self.player.hp.to_f32()
    }

    pub fn get_max_hp(&self) -> u32 {
        crate::player::MAX_HEALTH
    }

    pub fn get_stamina(&self) -> f32 {
        self.player.stamina.to_f32()
    }

    // -- combat -----------------------------------------------------------

    pub fn get_is_rolling(&self) -> bool {
        self.combat.is_rolling()
    }

    pub fn get_block_state(&self) -> bool {
        self.combat.blocking
    }

    // -- abilities --------------------------------------------------------

    pub fn is_bash_active(&self) -> bool {
        matches!(
            &self.player.ability,
            crate::player::Ability::Warden(b) if b.phase == crate::player::BashPhase::Active
        )
    }

    pub fn get_bash_charge_level(&self) -> f32 {
        match &self.player.ability {
            crate::player::Ability::Warden(b) => b.charge_time.to_f32(),
            _ => 0.0,
        }
    }

    pub fn get_bash_targets_hit(&self) -> u32 {
        match &self.player.ability {
            crate::player::Ability::Warden(b) => b.targets_hit,
            _ => 0,
        }
    }

    pub fn is_berserker_charge_active(&self) -> bool {
        matches!(&self.player.ability, crate::player::Ability::Raider(c) if c.active)
    }

    pub fn get_berserker_charge_duration(&self) -> f32 {
        match &self.player.ability {
            crate::player::Ability::Raider(c) => c.duration_remaining.to_f32(),
            _ => 0.0,
        }
    }

    pub fn is_flow_dash_active(&self) -> bool {
        matches!(
            &self.player.ability,
            crate::player::Ability::Kensei(d) if d.phase == crate::player::DashPhase::Active
        )
    }

    pub fn get_flow_dash_combo_level(&self) -> u8 {
        match &self.player.ability {
            crate::player::Ability::Kensei(d) => d.combo_level,
            _ => 0,
        }
    }

    pub fn is_dash_invulnerable(&self) -> bool {
        self.player.is_dash_invulnerable()
    }

    pub fn can_dash_cancel(&self) -> bool {
        self.player.can_dash_cancel()
    }

    // -- enemies ------------------------------------------------------------

    pub fn get_enemy_count(&self) -> usize {
        self.wolves.len()
    }

    pub fn get_enemy_x(&self, index: usize) -> f32 {
        self.nth_wolf_position(index).map(|p| p.x.to_f32()).unwrap_or(0.0)
    }

    pub fn get_enemy_y(&self, index: usize) -> f32 {
        self.nth_wolf_position(index).map(|p| p.y.to_f32()).unwrap_or(0.0)
    }

    pub fn get_enemy_vx(&self, index: usize) -> f32 {
        self.nth_wolf_velocity(index).map(|v| v.x.to_f32()).unwrap_or(0.0)
    }

    pub fn get_enemy_vy(&self, index: usize) -> f32 {
        self.nth_wolf_velocity(index).map(|v| v.y.to_f32()).unwrap_or(0.0)
    }

    fn nth_wolf_position(&self, index: usize) -> Option<FixedVec2> {
        let wolf = self.wolves.wolves().nth(index)?;
        self.physics.get_body(wolf.body_id).map(|b| b.position)
    }

    fn nth_wolf_velocity(&self, index: usize) -> Option<FixedVec2> {
        let wolf = self.wolves.wolves().nth(index)?;
        self.physics.get_body(wolf.body_id).map(|b| b.velocity)
    }

    // -- wolf animation signals ----------------------------------------------
    //
    // Procedural, derived entirely from each wolf's existing `state_timer`
    // and `facing` -- no separate skeleton is stored per wolf, reusing
    // state that already exists rather than caching new animation
    // history. Gait phase is a triangle wave over `state_timer`, not a true
    // sinusoid, since `Fixed` has no trig; these signals are cosmetic and
    // are not read by the §8 invariants.

    pub fn get_wolf_leg_x(&self, index: usize, leg: u8) -> f32 {
        let Some(wolf) = self.wolves.wolves().nth(index) else { return 0.0 };
        let phase_offset = if leg % 2 == 0 { 0.0 } else { 0.5 };
        let stride = gait_phase(wolf.state_timer.to_f32(), phase_offset);
        stride * wolf.facing.x.to_f32().signum().max(0.01) * 0.05
    }

    pub fn get_wolf_leg_y(&self, index: usize, leg: u8) -> f32 {
        let Some(wolf) = self.wolves.wolves().nth(index) else { return 0.0 };
        let phase_offset = if leg % 2 == 0 { 0.0 } else { 0.5 };
        gait_phase(wolf.state_timer.to_f32(), phase_offset).abs() * 0.03
    }

    pub fn get_wolf_body_bob(&self, index: usize) -> f32 {
        let Some(wolf) = self.wolves.wolves().nth(index) else { return 0.0 };
        gait_phase(wolf.state_timer.to_f32(), 0.25).abs() * 0.02
    }

    pub fn get_wolf_head_pitch(&self, index: usize) -> f32 {
        let Some(wolf) = self.wolves.wolves().nth(index) else { return 0.0 };
        wolf.facing.y.to_f32() * 0.3
    }

    pub fn get_wolf_head_yaw(&self, index: usize) -> f32 {
        let Some(wolf) = self.wolves.wolves().nth(index) else { return 0.0 };
        wolf.facing.x.to_f32()
    }

    pub fn get_wolf_tail_wag(&self, index: usize) -> f32 {
        let Some(wolf) = self.wolves.wolves().nth(index) else { return 0.0 };
        let aggression = wolf.aggression.to_f32().clamp(0.0, 1.0);
        gait_phase(wolf.state_timer.to_f32() * (1.0 + aggression), 0.0) * 0.4
    }

    pub fn get_wolf_ear_rotation(&self, index: usize) -> f32 {
        let Some(wolf) = self.wolves.wolves().nth(index) else { return 0.0 };
        1.0 - wolf.hp_ratio().to_f32().clamp(0.0, 1.0)
    }

    pub fn get_wolf_body_stretch(&self, index: usize) -> f32 {
        let Some((velocity, wolf)) = self
            .wolves
            .wolves()
            .nth(index)
            .and_then(|w| self.physics.get_body(w.body_id).map(|b| (b.velocity, w)))
        else {
            return 1.0;
        };
        let speed = velocity.length().to_f32();
        (1.0 + speed / wolf.base_speed.to_f32().max(0.01) * 0.15).min(1.6)
    }

    // -- physics (optional) -------------------------------------------------

    pub fn get_physics_player_x(&self) -> f32 {
        self.physics
            .get_body(self.player_body_id)
            .map(|b| b.position.x.to_f32())
            .unwrap_or_else(|| self.get_x())
    }

    pub fn get_physics_player_y(&self) -> f32 {
        self.physics
            .get_body(self.player_body_id)
            .map(|b| b.position.y.to_f32())
            .unwrap_or_else(|| self.get_y())
    }

    pub fn get_physics_player_vel_x(&self) -> f32 {
        self.physics
            .get_body(self.player_body_id)
            .map(|b| b.velocity.x.to_f32())
            .unwrap_or(0.0)
    }

    pub fn get_physics_player_vel_y(&self) -> f32 {
        self.physics
            .get_body(self.player_body_id)
            .map(|b| b.velocity.y.to_f32())
            .unwrap_or(0.0)
    }
}

fn position_of(world: &PhysicsWorld, body_id: u32) -> FixedVec2 {
    world.get_body(body_id).map(|b| b.position).unwrap_or(FixedVec2::ZERO)
}

/// Triangle wave in `[-1, 1]` with period 1.0 over `t`, at the given phase
/// offset (`0.5` is half a period out of phase with `0.0`).
fn gait_phase(t: f32, phase_offset: f32) -> f32 {
    let x = (t + phase_offset).rem_euclid(1.0);
    if x < 0.5 {
        4.0 * x - 1.0
    } else {
        3.0 - 4.0 * x
    }
}

fn hash_vec2(hasher: &mut blake3::Hasher, v: FixedVec2) {
    hasher.update(&v.x.raw().to_le_bytes());
    hasher.update(&v.y.raw().to_le_bytes());
}

fn hash_player(hasher: &mut blake3::Hasher, player: &PlayerState) {
    hash_vec2(hasher, player.position);
    hash_vec2(hasher, player.velocity);
    hasher.update(&player.hp.raw().to_le_bytes());
    hasher.update(&player.stamina.raw().to_le_bytes());
    hasher.update(&player.health_int.to_le_bytes());
    hasher.update(&[player.grounded as u8, player.wall_sliding as u8, player.jump_count]);
}

fn hash_combat(hasher: &mut blake3::Hasher, combat: &CombatState) {
    hasher.update(&(combat.attack_phase as u8 as u32).to_le_bytes());
    hasher.update(&combat.combo_count.to_le_bytes());
    hasher.update(&[combat.blocking as u8, combat.stunned as u8]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::RawInputFrame;
    use crate::progression::CharacterClass;

    fn run_ticks(core: &mut Core, n: u32) {
        for _ in 0..n {
            core.tick(RawInputFrame::default(), duskfang_foundation::fixed::fixed(1.0 / 60.0));
        }
    }

    #[test]
    fn restore_reproduces_identical_future_hash() {
        let mut core = Core::new(12345, CharacterClass::Warden);
        run_ticks(&mut core, 30);
        let snapshot = core.capture_snapshot();

        let hash_before_divergence = core.state_hash();
        run_ticks(&mut core, 10);

        core.restore_from_snapshot(&snapshot);
        assert_eq!(core.state_hash(), hash_before_divergence);
        run_ticks(&mut core, 10);
        let replayed = core.state_hash();

        core.restore_from_snapshot(&snapshot);
        run_ticks(&mut core, 10);
        assert_eq!(core.state_hash(), replayed);
    }

    #[test]
    fn snapshot_round_trips_through_bytes() {
        let mut core = Core::new(7, CharacterClass::Kensei);
        run_ticks(&mut core, 5);
        let snapshot = core.capture_snapshot();
        let bytes = snapshot.to_bytes().unwrap();
        let restored = Snapshot::from_bytes(&bytes).unwrap();
        assert_eq!(restored.get_x(), snapshot.get_x());
        assert_eq!(restored.run.tick, snapshot.run.tick);
    }

    #[test]
    fn fork_snapshot_does_not_perturb_original() {
        let mut core = Core::new(1, CharacterClass::Raider);
        run_ticks(&mut core, 15);
        let hash_before = core.state_hash();
        let mut fork = core.fork_snapshot();
        run_ticks(&mut fork, 20);
        assert_eq!(core.state_hash(), hash_before);
    }
}
