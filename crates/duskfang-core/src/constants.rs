//! Every simulation tunable, as `Fixed` constants.
//!
//! These are compile-time constants rather than a loaded config file: the
//! core performs no I/O, so "configuration" here means a small set of
//! named values a host can read but the core never reads from disk.

use duskfang_foundation::fixed::{fixed, Fixed};

// ---------------------------------------------------------------------------
// Timestep
// ---------------------------------------------------------------------------

pub const MIN_DT: Fixed = Fixed::from_raw(273); // 1/240 in Q16.16 (~0.0041667)
pub const MAX_DT: Fixed = Fixed::from_raw(2185); // 1/30 in Q16.16 (~0.0333333)

// ---------------------------------------------------------------------------
// Player movement
// ---------------------------------------------------------------------------

pub fn move_speed() -> Fixed {
    fixed(0.3)
}
pub fn move_accel() -> Fixed {
    fixed(16.0)
}
pub fn quick_turn_boost() -> Fixed {
    fixed(2.5)
}
pub fn friction_idle() -> Fixed {
    fixed(8.0)
}
pub fn friction_moving() -> Fixed {
    fixed(1.5)
}
pub fn velocity_snap_epsilon() -> Fixed {
    fixed(0.0005)
}
pub fn facing_update_epsilon() -> Fixed {
    fixed(0.1)
}
pub fn stamina_regen_rate() -> Fixed {
    fixed(0.4)
}
pub fn block_stamina_drain() -> Fixed {
    fixed(0.1)
}
pub fn min_action_stamina() -> Fixed {
    fixed(0.01)
}
pub fn jump_stamina_cost() -> Fixed {
    fixed(0.15)
}
pub fn jump_min_stamina() -> Fixed {
    fixed(0.1)
}
pub const MAX_JUMP_COUNT: u8 = 2;
pub fn grounded_height() -> Fixed {
    fixed(0.3)
}

// ---------------------------------------------------------------------------
// Warden shoulder bash
// ---------------------------------------------------------------------------

pub fn bash_charge_speed_mult() -> Fixed {
    fixed(0.5)
}
pub fn bash_max_charge() -> Fixed {
    fixed(1.0)
}
pub fn bash_min_charge() -> Fixed {
    fixed(0.3)
}
pub fn bash_base_stamina_cost() -> Fixed {
    fixed(0.3)
}
pub fn bash_base_force() -> Fixed {
    fixed(10.0)
}
pub fn bash_impulse_scale() -> Fixed {
    fixed(0.1)
}
pub fn bash_active_duration() -> Fixed {
    fixed(0.6)
}
pub fn bash_hit_radius() -> Fixed {
    fixed(0.05)
}
pub fn bash_hit_offset() -> Fixed {
    fixed(0.04)
}
pub fn bash_active_extend() -> Fixed {
    fixed(0.1)
}
pub fn bash_base_stamina_refund() -> Fixed {
    fixed(0.1)
}

// ---------------------------------------------------------------------------
// Raider berserker charge
// ---------------------------------------------------------------------------

pub fn charge_min_stamina() -> Fixed {
    fixed(0.3)
}
pub fn charge_base_force() -> Fixed {
    fixed(10.0)
}
pub fn charge_impulse_scale() -> Fixed {
    fixed(0.1)
}
pub fn charge_speed_mult_base() -> Fixed {
    fixed(2.5)
}
pub fn charge_stamina_drain_rate() -> Fixed {
    fixed(0.15)
}
pub fn charge_base_duration() -> Fixed {
    fixed(2.0)
}
pub fn charge_push_force_per_sec() -> Fixed {
    fixed(100.0)
}

// ---------------------------------------------------------------------------
// Kensei flow dash
// ---------------------------------------------------------------------------

pub fn dash_min_stamina() -> Fixed {
    fixed(0.2)
}
pub const MAX_COMBO: u8 = 3;
pub fn dash_distance() -> Fixed {
    fixed(0.15)
}
pub fn dash_active_duration() -> Fixed {
    fixed(0.12)
}
pub fn dash_base_stamina_cost() -> Fixed {
    fixed(0.2)
}
pub fn dash_hit_refund() -> Fixed {
    fixed(0.1)
}
pub fn dash_combo_damage_step() -> Fixed {
    fixed(0.25)
}

// ---------------------------------------------------------------------------
// Combat
// ---------------------------------------------------------------------------

pub fn light_stamina_cost() -> Fixed {
    fixed(0.15)
}
pub fn heavy_stamina_cost() -> Fixed {
    fixed(0.25)
}
pub fn special_stamina_cost() -> Fixed {
    fixed(0.40)
}
pub fn attack_windup() -> Fixed {
    fixed(0.3)
}
pub fn attack_active() -> Fixed {
    fixed(0.2)
}
pub fn attack_recovery() -> Fixed {
    fixed(0.4)
}
pub fn combo_window() -> Fixed {
    fixed(1.0)
}
pub fn parry_window() -> Fixed {
    fixed(0.2)
}
pub fn counter_window() -> Fixed {
    fixed(0.5)
}
pub fn roll_duration() -> Fixed {
    fixed(0.6)
}
pub fn roll_cooldown() -> Fixed {
    fixed(1.0)
}
pub fn roll_stamina_cost() -> Fixed {
    fixed(0.2)
}

// ---------------------------------------------------------------------------
// Wolf AI
// ---------------------------------------------------------------------------

/// `cos(60 deg)`, resolving the open question on `ATTACK_FACING_COS_THRESHOLD`.
pub fn attack_facing_cos_threshold() -> Fixed {
    fixed(0.5)
}
/// Resolving the open question on `DAMAGE_INTERRUPT_THRESHOLD`: 15 damage
/// units (in the same units as `Wolf::damage`/`hp`, i.e. fraction of max_hp
/// scaled by 100 -- see `wolf.rs`).
pub fn damage_interrupt_threshold() -> Fixed {
    fixed(15.0)
}
pub const DEFAULT_MAX_CONCURRENT_ATTACKERS: u32 = 2;
pub fn wolf_attack_min_stamina() -> Fixed {
    fixed(0.3)
}
pub fn wolf_radius() -> Fixed {
    fixed(0.04)
}
pub fn separation_distance() -> Fixed {
    fixed(0.1) // 2.5 * WOLF_RADIUS
}
pub fn separation_strength() -> Fixed {
    fixed(0.8)
}
pub fn los_block_perp_distance() -> Fixed {
    fixed(0.05)
}
pub fn base_wolf_speed() -> Fixed {
    fixed(0.22)
}
pub fn memory_speed_blend() -> Fixed {
    fixed(0.9)
}
pub fn intelligence_creep_rate() -> Fixed {
    fixed(0.01)
}
pub fn intelligence_cap() -> Fixed {
    fixed(0.9)
}
pub fn recent_block_or_roll_window() -> Fixed {
    fixed(1.0)
}
pub fn cautious_attack_cooldown_floor() -> Fixed {
    fixed(0.5)
}
pub fn retreat_hp_ratio_with_low_morale() -> Fixed {
    fixed(0.3)
}
pub fn retreat_hp_ratio_unconditional() -> Fixed {
    fixed(0.15)
}
pub fn fearful_hp_ratio() -> Fixed {
    fixed(0.3)
}
pub fn desperate_hp_ratio() -> Fixed {
    fixed(0.2)
}
pub fn low_morale_retreat_interrupt_ratio() -> Fixed {
    fixed(0.2)
}
pub fn approach_stop_ratio() -> Fixed {
    fixed(0.9)
}
pub fn patrol_alert_ratio() -> Fixed {
    fixed(0.7)
}
pub fn circle_strafe_speed_mult() -> Fixed {
    fixed(0.7)
}
pub fn collision_cooldown_decay() -> Fixed {
    fixed(0.9)
}
pub fn velocity_facing_epsilon() -> Fixed {
    fixed(0.01)
}
/// How long a wolf knocked out of an attack by damage stays in forced
/// recovery, shorter than the ordinary `attack_recovery` window.
pub fn damage_interrupt_recovery_duration() -> Fixed {
    fixed(0.5)
}

// ---------------------------------------------------------------------------
// Pack AI
// ---------------------------------------------------------------------------

pub fn plan_reevaluate_period() -> Fixed {
    fixed(3.0)
}
pub fn pack_retreat_avg_health() -> Fixed {
    fixed(0.3)
}
pub fn skirmisher_speed_threshold() -> Fixed {
    fixed(0.28)
}
pub fn bruiser_aggression_threshold() -> Fixed {
    fixed(0.6)
}
pub fn support_intelligence_threshold() -> Fixed {
    fixed(0.7)
}
pub fn pincer_radius() -> Fixed {
    fixed(0.15)
}
pub fn pack_morale_health_weight() -> Fixed {
    fixed(0.7)
}
pub fn pack_morale_base() -> Fixed {
    fixed(0.3)
}
/// Reuses `separation_distance`'s geometric scale: a pack-mate counts as
/// "near the player" within 4 separation-distances.
pub fn pack_near_player_radius() -> Fixed {
    separation_distance() * fixed(4.0)
}

// ---------------------------------------------------------------------------
// Adaptive difficulty
// ---------------------------------------------------------------------------

pub fn difficulty_update_period() -> Fixed {
    fixed(10.0)
}
pub fn default_player_skill() -> Fixed {
    fixed(0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_dt_is_one_over_240() {
        assert!((MIN_DT.to_f32() - 1.0 / 240.0).abs() < 0.0001);
    }

    #[test]
    fn max_dt_is_one_over_30() {
        assert!((MAX_DT.to_f32() - 1.0 / 30.0).abs() < 0.0001);
    }
}
