//! Player attack/block/parry/roll state machine.
//!
//! `CombatState` only tracks timers and phase transitions; it never touches
//! `PlayerState::hp` or stamina directly beyond the gating checks below --
//! the coordinator applies damage and spends stamina once an outcome is
//! decided, so this module stays a pure state machine.

use serde::{Deserialize, Serialize};

use duskfang_foundation::fixed::Fixed;

use crate::constants;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackKind {
    Light,
    Heavy,
    Special,
}

impl AttackKind {
    fn stamina_cost(self) -> Fixed {
        match self {
            AttackKind::Light => constants::light_stamina_cost(),
            AttackKind::Heavy => constants::heavy_stamina_cost(),
            AttackKind::Special => constants::special_stamina_cost(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackPhase {
    Idle,
    Windup,
    Active,
    Recovery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RollPhase {
    Idle,
    Rolling,
    Cooldown,
}

/// What happened when an incoming attack was resolved against the
/// defender's current combat state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IncomingOutcome {
    /// Roll i-frames were active; no damage, no stamina cost.
    Dodged,
    /// Parry window was active; attacker gets staggered, defender opens a
    /// counter window.
    Parried,
    /// Block was held; damage reduced to zero, stamina drained instead.
    Blocked,
    /// Nothing absorbed it; full damage lands and may interrupt windup.
    Hit { damage: Fixed },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatState {
    pub attack_kind: Option<AttackKind>,
    pub attack_phase: AttackPhase,
    pub phase_timer: Fixed,
    pub combo_count: u8,
    pub combo_timer: Fixed,

    pub blocking: bool,
    pub parry_timer: Fixed,
    pub counter_window_timer: Fixed,

    pub roll_phase: RollPhase,
    pub roll_timer: Fixed,

    pub stunned: bool,
    pub stun_timer: Fixed,
}

impl Default for CombatState {
    fn default() -> Self {
        CombatState {
            attack_kind: None,
            attack_phase: AttackPhase::Idle,
            phase_timer: Fixed::ZERO,
            combo_count: 0,
            combo_timer: Fixed::ZERO,
            blocking: false,
            parry_timer: Fixed::ZERO,
            counter_window_timer: Fixed::ZERO,
            roll_phase: RollPhase::Idle,
            roll_timer: Fixed::ZERO,
            stunned: false,
            stun_timer: Fixed::ZERO,
        }
    }
}

impl CombatState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_attacking(&self) -> bool {
        self.attack_phase != AttackPhase::Idle
    }

    pub fn is_active_frame(&self) -> bool {
        self.attack_phase == AttackPhase::Active
    }

    pub fn is_rolling(&self) -> bool {
        self.roll_phase == RollPhase::Rolling
    }

    pub fn can_act(&self) -> bool {
        !self.stunned && self.attack_phase == AttackPhase::Idle && self.roll_phase != RollPhase::Rolling
    }

    /// Begin an attack if idle, not stunned, and stamina allows. Returns the
    /// stamina cost to deduct on success.
    pub fn try_start_attack(&mut self, kind: AttackKind, stamina: Fixed) -> Option<Fixed> {
        if self.stunned || self.roll_phase == RollPhase::Rolling {
            return None;
        }
        let cost = kind.stamina_cost();
        if self.attack_phase == AttackPhase::Idle {
            if stamina < cost {
                return None;
            }
        } else if !(self.attack_phase == AttackPhase::Recovery
            && self.combo_timer > Fixed::ZERO
            && self.combo_count < 2)
        {
            return None;
        } else if stamina < cost {
            return None;
        }

        self.attack_kind = Some(kind);
        self.attack_phase = AttackPhase::Windup;
        self.phase_timer = Fixed::ZERO;
        Some(cost)
    }

    /// Advance attack/roll/block/stun timers by `dt`. Call once per tick,
    /// before gameplay reads `attack_phase`/`is_active_frame`.
    pub fn update(&mut self, dt: Fixed) {
        if self.stunned {
            self.stun_timer -= dt;
            if self.stun_timer <= Fixed::ZERO {
                self.stunned = false;
            }
        }

        if self.parry_timer > Fixed::ZERO {
            self.parry_timer -= dt;
        }
        if self.counter_window_timer > Fixed::ZERO {
            self.counter_window_timer -= dt;
        }

        match self.attack_phase {
            AttackPhase::Idle => {}
            AttackPhase::Windup => {
                self.phase_timer += dt;
                if self.phase_timer >= constants::attack_windup() {
                    self.attack_phase = AttackPhase::Active;
                    self.phase_timer = Fixed::ZERO;
                }
            }
            AttackPhase::Active => {
                self.phase_timer += dt;
                if self.phase_timer >= constants::attack_active() {
                    self.attack_phase = AttackPhase::Recovery;
                    self.phase_timer = Fixed::ZERO;
                    self.combo_timer = constants::combo_window();
                }
            }
            AttackPhase::Recovery => {
                self.phase_timer += dt;
                if self.combo_timer > Fixed::ZERO {
                    self.combo_timer -= dt;
                }
                if self.phase_timer >= constants::attack_recovery() {
                    self.attack_phase = AttackPhase::Idle;
                    self.phase_timer = Fixed::ZERO;
                    self.attack_kind = None;
                    self.combo_count = 0;
                    self.combo_timer = Fixed::ZERO;
                }
            }
        }

        match self.roll_phase {
            RollPhase::Idle => {}
            RollPhase::Rolling => {
                self.roll_timer += dt;
                if self.roll_timer >= constants::roll_duration() {
                    self.roll_phase = RollPhase::Cooldown;
                    self.roll_timer = Fixed::ZERO;
                }
            }
            RollPhase::Cooldown => {
                self.roll_timer += dt;
                if self.roll_timer >= constants::roll_cooldown() {
                    self.roll_phase = RollPhase::Idle;
                    self.roll_timer = Fixed::ZERO;
                }
            }
        }
    }

    /// Whether the attack just transitioned into its active frame this tick
    /// (phase is Active and the timer was just reset to zero).
    pub fn just_entered_active(&self) -> bool {
        self.attack_phase == AttackPhase::Active && self.phase_timer.is_zero()
    }

    /// Chain into the next attack while in Recovery with a live combo
    /// window, incrementing `combo_count`. Call right after
    /// `try_start_attack` succeeds during Recovery.
    pub fn register_combo_step(&mut self) {
        if self.combo_count < 2 {
            self.combo_count += 1;
        }
    }

    pub fn start_block(&mut self) -> bool {
        if !self.can_act() {
            return false;
        }
        self.blocking = true;
        true
    }

    pub fn stop_block(&mut self) {
        self.blocking = false;
    }

    /// Open the parry window: a short grace period at the start of a block
    /// hold where a hit becomes a parry instead of a block.
    pub fn try_parry(&mut self) -> bool {
        if !self.blocking {
            return false;
        }
        self.parry_timer = constants::parry_window();
        true
    }

    pub fn try_start_roll(&mut self, stamina: Fixed) -> Option<Fixed> {
        if self.roll_phase != RollPhase::Idle || self.stunned {
            return None;
        }
        let cost = constants::roll_stamina_cost();
        if stamina < cost {
            return None;
        }
        self.roll_phase = RollPhase::Rolling;
        self.roll_timer = Fixed::ZERO;
        self.blocking = false;
        Some(cost)
    }

    fn apply_stun(&mut self, duration: Fixed) {
        self.stunned = true;
        self.stun_timer = self.stun_timer.max(duration);
        self.attack_phase = AttackPhase::Idle;
        self.attack_kind = None;
        self.phase_timer = Fixed::ZERO;
    }

    /// Resolve an incoming attack against the current defensive state, per
    /// the priority order: roll i-frames, then parry window, then block,
    /// then an unabsorbed hit. A hit whose damage clears
    /// `damage_interrupt_threshold` interrupts an in-progress windup.
    pub fn handle_incoming_attack(&mut self, damage: Fixed, attacker_stun_on_parry: Fixed) -> IncomingOutcome {
        if self.roll_phase == RollPhase::Rolling {
            return IncomingOutcome::Dodged;
        }
        if self.parry_timer > Fixed::ZERO {
            self.parry_timer = Fixed::ZERO;
            self.counter_window_timer = constants::counter_window();
            let _ = attacker_stun_on_parry;
            return IncomingOutcome::Parried;
        }
        if self.blocking {
            return IncomingOutcome::Blocked;
        }
        if damage >= constants::damage_interrupt_threshold() && self.attack_phase == AttackPhase::Windup {
            self.apply_stun(fixed_stun_duration());
        }
        IncomingOutcome::Hit { damage }
    }

    pub fn counter_available(&self) -> bool {
        self.counter_window_timer > Fixed::ZERO
    }

    pub fn consume_counter(&mut self) -> bool {
        if self.counter_window_timer > Fixed::ZERO {
            self.counter_window_timer = Fixed::ZERO;
            true
        } else {
            false
        }
    }

    pub fn stun(&mut self, duration: Fixed) {
        self.apply_stun(duration);
    }
}

fn fixed_stun_duration() -> Fixed {
    constants::attack_windup()
}

#[cfg(test)]
mod tests {
    use super::*;
    use duskfang_foundation::fixed::fixed;

    #[test]
    fn attack_cycles_windup_active_recovery_then_idle() {
        let mut c = CombatState::new();
        c.try_start_attack(AttackKind::Light, Fixed::ONE).unwrap();
        assert_eq!(c.attack_phase, AttackPhase::Windup);

        for _ in 0..120 {
            c.update(fixed(1.0 / 60.0));
        }
        assert_eq!(c.attack_phase, AttackPhase::Idle);
        assert!(c.attack_kind.is_none());
    }

    #[test]
    fn insufficient_stamina_refuses_attack() {
        let mut c = CombatState::new();
        assert!(c.try_start_attack(AttackKind::Special, Fixed::ZERO).is_none());
    }

    #[test]
    fn rolling_dodges_incoming_damage() {
        let mut c = CombatState::new();
        c.try_start_roll(Fixed::ONE).unwrap();
        let outcome = c.handle_incoming_attack(fixed(20.0), Fixed::ZERO);
        assert_eq!(outcome, IncomingOutcome::Dodged);
    }

    #[test]
    fn parry_window_converts_hit_and_opens_counter() {
        let mut c = CombatState::new();
        c.start_block();
        c.try_parry();
        let outcome = c.handle_incoming_attack(fixed(10.0), Fixed::ZERO);
        assert_eq!(outcome, IncomingOutcome::Parried);
        assert!(c.counter_available());
    }

    #[test]
    fn heavy_hit_during_windup_interrupts_into_stun() {
        let mut c = CombatState::new();
        c.try_start_attack(AttackKind::Heavy, Fixed::ONE).unwrap();
        let outcome = c.handle_incoming_attack(fixed(20.0), Fixed::ZERO);
        assert!(matches!(outcome, IncomingOutcome::Hit { .. }));
        assert!(c.stunned);
        assert_eq!(c.attack_phase, AttackPhase::Idle);
    }

    #[test]
    fn block_absorbs_without_stun() {
        let mut c = CombatState::new();
        c.start_block();
        let outcome = c.handle_incoming_attack(fixed(20.0), Fixed::ZERO);
        assert_eq!(outcome, IncomingOutcome::Blocked);
        assert!(!c.stunned);
    }
}
