//! End-to-end scenarios driven entirely through `Core::tick`, exercising
//! several subsystems together the way a host driving the simulation one
//! frame at a time would. Per-module edge cases already have focused unit
//! tests next to their source; this file covers the cross-module paths
//! (input gating -> combat -> wolf AI -> diagnostics, determinism across a
//! full run, replay fidelity) that only show up once everything is wired
//! together.

use duskfang_core::combat::AttackPhase;
use duskfang_core::coordinator::Core;
use duskfang_core::input::RawInputFrame;
use duskfang_core::progression::{CharacterClass, ProgressionHook};
use duskfang_core::replay::{replay, ReplayRecorder};
use duskfang_core::wolf::WolfFsmState;
use duskfang_diagnostics::Counter;
use duskfang_foundation::fixed::{fixed, Fixed, FixedVec2};

fn one_tick() -> Fixed {
    fixed(1.0 / 60.0)
}

/// Put a freshly spawned wolf one tick away from entering its active attack
/// frame, facing the player dead-on so the facing-angle gate passes.
fn arm_wolf_attack(core: &mut Core, wolf_id: u32, player_pos: FixedVec2, wolf_pos: FixedVec2) {
    let to_player = player_pos - wolf_pos;
    let dir = to_player.scale(Fixed::ONE / to_player.length());
    let wolf = core.wolves.get_mut(wolf_id).unwrap();
    wolf.state = WolfFsmState::AttackWindup;
    wolf.state_timer = duskfang_core::constants::attack_windup() - one_tick();
    wolf.attack_cooldown = Fixed::ZERO;
    wolf.facing = dir;
}

/// Put a freshly spawned wolf one tick away from *requesting* an attack
/// windup (still in `CircleStrafe`), so the threat budget gate -- which only
/// fires at the `CircleStrafe -> AttackWindup` transition -- gets a chance
/// to act on it this tick.
fn arm_wolf_windup_request(core: &mut Core, wolf_id: u32, player_pos: FixedVec2, wolf_pos: FixedVec2) {
    let to_player = player_pos - wolf_pos;
    let dir = to_player.scale(Fixed::ONE / to_player.length());
    let wolf = core.wolves.get_mut(wolf_id).unwrap();
    wolf.state = WolfFsmState::CircleStrafe;
    wolf.state_timer = fixed(0.4);
    wolf.attack_cooldown = Fixed::ZERO;
    wolf.facing = dir;
}

// ---------------------------------------------------------------------------
// Determinism
// ---------------------------------------------------------------------------

#[test]
fn six_hundred_ticks_of_varied_input_are_bit_identical_across_runs() {
    fn run() -> [u8; 32] {
        let mut core = Core::new(12345, CharacterClass::Kensei);
        for i in 0..600u64 {
            let raw = RawInputFrame {
                move_x: ((i % 7) as f32 / 6.0) * 2.0 - 1.0,
                move_y: ((i % 5) as f32 / 4.0) * 2.0 - 1.0,
                light_attack: i % 11 == 0,
                block: i % 13 == 0,
                roll: i % 17 == 0,
                ability_primary: i % 23 == 0,
                ..Default::default()
            };
            core.tick(raw, one_tick());
        }
        core.state_hash()
    }
    assert_eq!(run(), run());
}

#[test]
fn replay_log_reproduces_a_six_hundred_tick_run_exactly() {
    let mut live = Core::new(777, CharacterClass::Warden);
    let mut recorder = ReplayRecorder::new(live.capture_snapshot(), 25);

    for tick in 0..600u64 {
        let input = RawInputFrame {
            move_x: if tick % 4 < 2 { 1.0 } else { -1.0 },
            ability_primary: tick % 30 == 0,
            ..Default::default()
        };
        recorder.record_tick(tick, input, Some(live.state_hash()));
        live.tick(input, one_tick());
    }
    let log = recorder.finish();

    let mut playback = Core::new(1, CharacterClass::Raider);
    let result = replay(&mut playback, &log).expect("well-formed log replays");

    assert!(result.completed);
    assert!(result.first_divergence.is_none());
    assert_eq!(result.ticks_replayed, 600);
    assert_eq!(playback.state_hash(), live.state_hash());
}

// ---------------------------------------------------------------------------
// Perfect parry: a block held right as a wolf bite lands
// converts the hit into a parry and opens the counter window, instead of
// draining stamina like an ordinary block.
// ---------------------------------------------------------------------------

#[test]
fn blocking_the_instant_a_bite_lands_is_a_perfect_parry_not_a_block() {
    let mut core = Core::new(99, CharacterClass::Warden);
    let player_pos = core.player.position;
    let wolf_pos = player_pos + FixedVec2::new(fixed(0.05), Fixed::ZERO);
    let wolf_id = core.spawn_scaled_wolf(wolf_pos);
    arm_wolf_attack(&mut core, wolf_id, player_pos, wolf_pos);

    core.tick(RawInputFrame { block: true, ..Default::default() }, one_tick());

    assert_eq!(core.diagnostics.count(Counter::AttacksBlocked), 1);
    assert!(core.combat.counter_available(), "a perfect parry must open the counter window");
    assert!(!core.combat.stunned, "a parried hit must not stun the defender");
}

// ---------------------------------------------------------------------------
// Roll i-frames: rolling on the same tick an attack lands
// dodges it for free, with no stamina spent beyond the roll's own cost.
// ---------------------------------------------------------------------------

#[test]
fn rolling_the_instant_a_bite_lands_dodges_it() {
    let mut core = Core::new(13, CharacterClass::Raider);
    let player_pos = core.player.position;
    let wolf_pos = player_pos + FixedVec2::new(fixed(0.05), Fixed::ZERO);
    let wolf_id = core.spawn_scaled_wolf(wolf_pos);
    arm_wolf_attack(&mut core, wolf_id, player_pos, wolf_pos);
    let hp_before = core.player.hp;

    core.tick(RawInputFrame { roll: true, ..Default::default() }, one_tick());

    assert_eq!(core.diagnostics.count(Counter::AttacksDodged), 1);
    assert_eq!(core.player.hp, hp_before, "a dodged attack deals no damage");
}

// ---------------------------------------------------------------------------
// Threat budget: only `max_concurrent_attackers` wolves may be attacking
// at once; the rest are deferred to circle-strafe.
// ---------------------------------------------------------------------------

#[test]
fn excess_simultaneous_attackers_are_deferred_to_the_threat_budget() {
    let mut core = Core::new(5, CharacterClass::Warden);
    let player_pos = core.player.position;
    assert_eq!(core.run.max_concurrent_attackers, 2);

    let wolf_positions = [
        player_pos + FixedVec2::new(fixed(0.05), Fixed::ZERO),
        player_pos + FixedVec2::new(fixed(-0.05), Fixed::ZERO),
        player_pos + FixedVec2::new(Fixed::ZERO, fixed(0.05)),
    ];
    let wolf_ids: Vec<u32> = wolf_positions.iter().map(|p| core.spawn_scaled_wolf(*p)).collect();
    for (id, pos) in wolf_ids.iter().zip(wolf_positions.iter()) {
        arm_wolf_windup_request(&mut core, *id, player_pos, *pos);
    }

    core.tick(RawInputFrame::default(), one_tick());

    let winding_up = wolf_ids
        .iter()
        .filter(|id| core.wolves.get(**id).unwrap().state == WolfFsmState::AttackWindup)
        .count();
    let deferred = wolf_ids
        .iter()
        .filter(|id| core.wolves.get(**id).unwrap().state == WolfFsmState::CircleStrafe)
        .count();
    assert_eq!(winding_up, 2, "exactly the budgeted number of wolves should enter windup");
    assert_eq!(deferred, 1, "the excess attacker should be held back in circle-strafe");
    assert_eq!(core.diagnostics.count(Counter::ThreatBudgetDeferrals), 1);
}

// ---------------------------------------------------------------------------
// Adaptive difficulty scaling at spawn time only: stats are baked in when
// a wolf is spawned and never drift underfoot mid-fight.
// ---------------------------------------------------------------------------

#[test]
fn wolves_spawned_after_skill_rises_are_tougher_than_earlier_ones() {
    let mut core = Core::new(21, CharacterClass::Warden);
    let early_id = core.spawn_scaled_wolf(FixedVec2::new(fixed(0.5), fixed(0.6)));
    let early_hp = core.wolves.get(early_id).unwrap().hp;

    core.difficulty.record_damage_dealt(fixed(1000.0));
    core.difficulty.update(duskfang_core::constants::difficulty_update_period());
    assert!(core.difficulty.wolf_stat_multiplier() > Fixed::ONE);

    let later_id = core.spawn_scaled_wolf(FixedVec2::new(fixed(0.4), fixed(0.6)));
    let later_hp = core.wolves.get(later_id).unwrap().hp;
    assert!(later_hp > early_hp);

    // The earlier wolf's hp must not have been retroactively rescaled.
    assert_eq!(core.wolves.get(early_id).unwrap().hp, early_hp);
}

// ---------------------------------------------------------------------------
// Progression hook: a host-supplied hook changes ability outcomes without
// the core persisting anything about the upgrade tree itself.
// ---------------------------------------------------------------------------

struct FixedBonusHook;

impl ProgressionHook for FixedBonusHook {
    fn effect_scalar(&self, _class_id: u32, key: &str, default: Fixed) -> Fixed {
        if key == "warden.bash.stamina_refund" {
            fixed(0.5)
        } else {
            default
        }
    }
}

#[test]
fn a_progression_hook_changes_bash_stamina_refund_without_persisting_state() {
    let mut core = Core::new(3, CharacterClass::Warden);
    core.set_progression_hook(Box::new(FixedBonusHook));
    core.player.stamina = fixed(0.1);

    core.player.on_bash_hit(&FixedBonusHook);

    assert!(
        core.player.stamina.to_f32() > 0.5,
        "the hook's larger refund bonus should be reflected in stamina"
    );
}

// ---------------------------------------------------------------------------
// Stun masking: a stunned player's input is fully discarded,
// not just their movement.
// ---------------------------------------------------------------------------

#[test]
fn a_stunned_player_cannot_start_an_attack_even_with_full_stamina() {
    let mut core = Core::new(8, CharacterClass::Raider);
    core.combat.stun(fixed(0.5));

    core.tick(
        RawInputFrame { light_attack: true, heavy_attack: true, special_attack: true, ..Default::default() },
        one_tick(),
    );

    assert_eq!(core.combat.attack_phase, AttackPhase::Idle);
    assert_eq!(core.diagnostics.count(Counter::AttacksThrown), 0);
}

// ---------------------------------------------------------------------------
// Host-owned run phase: the core stores whatever the shell wrote and
// never touches it during `tick`.
// ---------------------------------------------------------------------------

#[test]
fn shell_phase_survives_ticks_untouched_by_the_core() {
    let mut core = Core::new(1, CharacterClass::Kensei);
    core.run.shell_phase = 4;
    for _ in 0..30 {
        core.tick(RawInputFrame::default(), one_tick());
    }
    assert_eq!(core.run.shell_phase, 4);
}
