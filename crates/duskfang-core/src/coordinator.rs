//! `Core`: the single struct owning all simulation state, and the one
//! mutating entry point, `tick()`, that advances it.
//!
//! `tick()` is a flat, hand-written sequence rather than a loop over a
//! registered list of systems -- the step order is part of the
//! determinism contract, so there is exactly one order, and it is visible
//! by reading this function top to bottom.

use duskfang_diagnostics::{Counter, DiagnosticLog, GameEvent};
use duskfang_foundation::fixed::{Fixed, FixedVec2};
use duskfang_foundation::rng::Rng;

use crate::combat::{AttackKind, CombatState, IncomingOutcome};
use crate::constants;
use crate::difficulty::AdaptiveDifficulty;
use crate::input::{GatedInput, InputGate, RawInputFrame};
use crate::pack::PackSim;
use crate::physics::PhysicsWorld;
use crate::player::PlayerState;
use crate::progression::{CharacterClass, NullProgressionHook, ProgressionHook};
use crate::run_context::RunContext;
use crate::wolf::WolfSim;

/// Every subsystem the simulation owns, wired together by [`Core::tick`].
pub struct Core {
    pub physics: PhysicsWorld,
    pub player: PlayerState,
    pub combat: CombatState,
    pub wolves: WolfSim,
    pub packs: PackSim,
    pub difficulty: AdaptiveDifficulty,
    pub run: RunContext,
    pub rng: Rng,
    pub diagnostics: DiagnosticLog,
    pub input_gate: InputGate,
    player_body_id: u32,
    progression: Box<dyn ProgressionHook>,
}

impl Core {
    /// Start a new run from scratch: fresh ids, zeroed diagnostics, the
    /// player spawned at the default position for `class`.
    pub fn new(seed: u32, class: CharacterClass) -> Self {
        let mut physics = PhysicsWorld::new();
        let mut player = PlayerState::spawn(class);
        player.attach_skeleton(&mut physics);
        let player_body_id = physics.create_body(
            crate::physics::BodyKind::Dynamic,
            player.position,
            Fixed::ONE,
            duskfang_foundation::fixed::fixed(0.03),
        );
        {
            let body = physics.get_body_mut(player_body_id).unwrap();
            body.layer = crate::physics::layer::PLAYER;
            body.mask = crate::physics::layer::ENEMY | crate::physics::layer::ENVIRONMENT;
        }

        Core {
            physics,
            player,
            combat: CombatState::new(),
            wolves: WolfSim::new(),
            packs: PackSim::new(),
            difficulty: AdaptiveDifficulty::new(),
            run: RunContext::new(seed, class),
            rng: Rng::new(seed),
            diagnostics: DiagnosticLog::new(),
            input_gate: InputGate::new(),
            player_body_id,
            progression: Box::new(NullProgressionHook),
        }
    }

    pub fn set_progression_hook(&mut self, hook: Box<dyn ProgressionHook>) {
        self.progression = hook;
    }

    pub fn player_body_id(&self) -> u32 {
        self.player_body_id
    }

    pub(crate) fn set_player_body_id(&mut self, id: u32) {
        self.player_body_id = id;
    }

    fn clamp_dt(dt: Fixed) -> Fixed {
        dt.clamp(constants::MIN_DT, constants::MAX_DT)
    }

    /// Advance the simulation by `raw_dt` (clamped to `[MIN_DT, MAX_DT]`)
    /// given one tick's raw input. This is the only place state mutates;
    /// every step below runs unconditionally and in this order, which is
    /// part of the determinism contract:
    ///
    /// 1. gate input
    /// 2. advance combat timers
    /// 3. dispatch input intents (block/roll/attack starts)
    /// 4. integrate player movement and abilities
    /// 5. wolves decide (FSM, attack gating) against pre-step positions
    /// 6. physics steps
    /// 7. read back settled positions/velocities, apply spatial-awareness
    ///    impulses
    /// 8. packs update (role/plan selection and execution)
    /// 9. adaptive difficulty rescales wolf stats
    /// 10. dead wolves and empty packs pruned, tick counter advances
    pub fn tick(&mut self, raw: RawInputFrame, raw_dt: Fixed) {
        let dt = Self::clamp_dt(raw_dt);
        let tick = self.run.tick;

        let stunned_or_dead = self.combat.stunned || self.player.health_int == 0;
        let input = self.input_gate.gate(raw, stunned_or_dead);

        self.combat.update(dt);
        self.resolve_combat_inputs(&input);
        self.apply_player_input(&input, dt);

        let player_alive = self.player.health_int > 0;
        let pending_attacks = self.wolves.update_ai(
            dt,
            &mut self.physics,
            self.player.position,
            self.player.velocity,
            player_alive,
            self.run.max_concurrent_attackers,
            tick,
            &mut self.rng,
            &mut self.diagnostics,
        );

        if let Some(skeleton) = &self.player.skeleton {
            skeleton.follow_player(&mut self.physics, self.player.position);
        }
        self.physics.step(dt);

        if let Some(skeleton) = &mut self.player.skeleton {
            skeleton.update_signals(&self.physics);
        }
        if let Some(body) = self.physics.get_body(self.player_body_id) {
            self.player.position = body.position;
        }
        self.player.update_grounded();
        self.wolves.apply_spatial_awareness(&mut self.physics, dt);

        self.resolve_wolf_attacks(pending_attacks, tick);

        self.packs.update(
            dt,
            &mut self.wolves,
            &self.physics,
            self.player.position,
            tick,
            &mut self.rng,
            &mut self.diagnostics,
        );

        self.difficulty.update(dt);
        self.rescale_wolves_for_difficulty();

        self.packs.prune_dead_members(&self.wolves);
        self.player.update_stamina_regen(dt, self.is_spending_stamina());

        self.run.tick += 1;
    }

    fn is_spending_stamina(&self) -> bool {
        self.combat.blocking || self.combat.is_attacking()
    }

    fn apply_player_input(&mut self, input: &GatedInput, dt: Fixed) {
        let ability_active = match &self.player.ability {
            crate::player::Ability::Warden(bash) => bash.phase != crate::player::BashPhase::Idle,
            crate::player::Ability::Raider(charge) => charge.active,
            crate::player::Ability::Kensei(dash) => dash.phase != crate::player::DashPhase::Idle,
        };

        if let Some(dash_pos) = self.player.dash_interpolated_position() {
            self.player.position = dash_pos;
            if let Some(body) = self.physics.get_body_mut(self.player_body_id) {
                body.position = dash_pos;
                body.velocity = FixedVec2::ZERO;
            }
        } else if self.combat.can_act() {
            self.player.integrate_movement(input.move_xy, dt, ability_active);
        } else {
            self.player.integrate_movement(FixedVec2::ZERO, dt, ability_active);
        }

        if input.jump && self.player.grounded {
            self.player.try_jump();
        }

        let hit = self
            .player
            .update_ability(dt, Some(self.player_body_id), &mut self.physics, self.progression.as_ref());
        if let Some(probe) = hit {
            self.resolve_ability_hit(probe);
        }

        match self.player.ability.class() {
            CharacterClass::Warden => {
                let phase = match &self.player.ability {
                    crate::player::Ability::Warden(bash) => bash.phase,
                    _ => unreachable!(),
                };
                if input.ability_primary && phase == crate::player::BashPhase::Idle {
                    self.player.try_start_bash_charge();
                } else if !input.ability_primary && phase == crate::player::BashPhase::Charging {
                    self.player.release_bash(self.player_body_id, &mut self.physics, self.progression.as_ref());
                }
            }
            CharacterClass::Raider => {
                if input.ability_primary {
                    self.player
                        .try_start_charge(self.player_body_id, &mut self.physics, self.progression.as_ref());
                }
            }
            CharacterClass::Kensei => {
                if input.ability_primary {
                    self.player.try_start_dash(None, self.progression.as_ref());
                }
            }
        }
    }

    fn resolve_ability_hit(&mut self, probe: crate::player::HitProbe) {
        let tick = self.run.tick;
        let targets: Vec<u32> = self
            .wolves
            .wolves()
            .filter(|w| w.is_alive())
            .filter(|w| {
                self.physics
                    .get_body(w.body_id)
                    .map(|b| (b.position - probe.center).length() <= probe.radius + b.radius)
                    .unwrap_or(false)
            })
            .map(|w| w.id)
            .collect();

        let knockback = self.player.facing.scale(duskfang_foundation::fixed::fixed(3.0));
        for wolf_id in targets {
            match self.player.ability.class() {
                CharacterClass::Warden => {
                    self.player.on_bash_hit(self.progression.as_ref());
                    let damage = duskfang_foundation::fixed::fixed(10.0);
                    self.wolves
                        .damage_wolf(&mut self.physics, wolf_id, damage, knockback, tick, &mut self.diagnostics);
                    self.difficulty.record_damage_dealt(damage);
                    self.diagnostics.record(GameEvent::BashHit { tick, target_wolf_id: wolf_id });
                }
                CharacterClass::Kensei => {
                    let damage_mult = self.player.on_dash_hit(wolf_id);
                    let damage = duskfang_foundation::fixed::fixed(12.0) * damage_mult;
                    self.wolves
                        .damage_wolf(&mut self.physics, wolf_id, damage, knockback, tick, &mut self.diagnostics);
                    self.difficulty.record_damage_dealt(damage);
                    let combo_level = match &self.player.ability {
                        crate::player::Ability::Kensei(d) => d.combo_level,
                        _ => 0,
                    };
                    self.diagnostics.record(GameEvent::DashHit { tick, target_wolf_id: wolf_id, combo_level });
                }
                CharacterClass::Raider => {}
            }
        }
    }

    fn resolve_combat_inputs(&mut self, input: &GatedInput) {
        if input.block && !self.combat.blocking {
            self.combat.start_block();
            self.combat.try_parry();
        } else if !input.block {
            self.combat.stop_block();
        }

        if input.roll {
            if let Some(cost) = self.combat.try_start_roll(self.player.stamina) {
                self.player.spend_stamina(cost);
            }
        }

        let kind = if input.special_attack {
            Some(AttackKind::Special)
        } else if input.heavy_attack {
            Some(AttackKind::Heavy)
        } else if input.light_attack {
            Some(AttackKind::Light)
        } else {
            None
        };
        if let Some(kind) = kind {
            if let Some(cost) = self.combat.try_start_attack(kind, self.player.stamina) {
                self.player.spend_stamina(cost);
                self.diagnostics.bump(Counter::AttacksThrown);
            }
        }
    }

    fn resolve_wolf_attacks(&mut self, pending: Vec<crate::wolf::PendingAttack>, tick: u64) {
        for attack in pending {
            let outcome = self.combat.handle_incoming_attack(attack.damage, Fixed::ZERO);
            match outcome {
                IncomingOutcome::Dodged => {
                    self.diagnostics.bump(Counter::AttacksDodged);
                    self.wolves.notify_player_rolled(attack.wolf_id);
                    self.wolves.record_attack_outcome(attack.wolf_id, false);
                }
                IncomingOutcome::Parried => {
                    self.diagnostics.bump(Counter::AttacksBlocked);
                    self.diagnostics.record(GameEvent::PerfectParry { tick });
                    self.wolves.notify_player_blocked(attack.wolf_id);
                    self.wolves.record_attack_outcome(attack.wolf_id, false);
                }
                IncomingOutcome::Blocked => {
                    self.diagnostics.bump(Counter::AttacksBlocked);
                    self.diagnostics.record(GameEvent::Blocked { tick });
                    self.player.spend_stamina(constants::block_stamina_drain());
                    self.wolves.notify_player_blocked(attack.wolf_id);
                    self.wolves.record_attack_outcome(attack.wolf_id, false);
                }
                IncomingOutcome::Hit { damage } => {
                    self.player.apply_damage(damage / duskfang_foundation::fixed::fixed(100.0));
                    self.difficulty.record_damage_taken(damage);
                    self.wolves.record_attack_outcome(attack.wolf_id, true);
                    if self.player.health_int == 0 {
                        self.difficulty.record_death();
                    }
                }
            }
        }
    }

    fn rescale_wolves_for_difficulty(&mut self) {
        let _mult = self.difficulty.wolf_stat_multiplier();
        // Applied at spawn time (`spawn_scaled_wolf`) only; re-applying
        // every tick to already-live wolves would make hp/damage drift
        // underfoot mid-fight.
    }

    /// Spawn a wolf with stats pre-scaled by the current difficulty
    /// estimate -- the only point the multiplier is applied.
    pub fn spawn_scaled_wolf(&mut self, position: FixedVec2) -> u32 {
        let mult = self.difficulty.wolf_stat_multiplier();
        let max_hp = Fixed::ONE * mult;
        self.wolves.spawn_wolf(&mut self.physics, position, max_hp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duskfang_foundation::fixed::fixed;

    fn one_tick_dt() -> Fixed {
        fixed(1.0 / 60.0)
    }

    #[test]
    fn tick_advances_counter_and_is_deterministic() {
        fn run() -> (u64, FixedVec2) {
            let mut core = Core::new(12345, CharacterClass::Warden);
            for i in 0..60 {
                let raw = RawInputFrame {
                    move_x: if i % 2 == 0 { 1.0 } else { 0.0 },
                    ..Default::default()
                };
                core.tick(raw, one_tick_dt());
            }
            (core.run.tick, core.player.position)
        }
        let a = run();
        let b = run();
        assert_eq!(a, b);
        assert_eq!(a.0, 60);
    }

    #[test]
    fn dt_outside_bounds_is_clamped() {
        assert_eq!(Core::clamp_dt(fixed(10.0)), constants::MAX_DT);
        assert_eq!(Core::clamp_dt(Fixed::ZERO), constants::MIN_DT);
    }

    #[test]
    fn stunned_player_input_is_fully_masked() {
        let mut core = Core::new(1, CharacterClass::Raider);
        core.combat.stun(fixed(1.0));
        let raw = RawInputFrame {
            move_x: 1.0,
            light_attack: true,
            ..Default::default()
        };
        core.tick(raw, one_tick_dt());
        assert_eq!(core.player.velocity, FixedVec2::ZERO);
    }
}
