//! Flat, C-callable interface to [`duskfang_core`].
//!
//! Every function here is `#[no_mangle] pub extern "C"` and operates on an
//! opaque [`CoreHandle`] returned by [`duskfang_create`] and freed by
//! [`duskfang_destroy`]. A single flat C ABI lets any host language link
//! against it (C, C#, Python via `ctypes`, JS via a C-ABI shim) without a
//! per-language binding layer.
//!
//! The core never panics on normal inputs; every function here
//! additionally wraps its body in [`std::panic::catch_unwind`] so a bug
//! that *does* panic degrades to a recognisable sentinel return instead of
//! unwinding across the FFI boundary (which is undefined behaviour).

#![deny(unsafe_code)]

use std::ffi::c_char;
use std::os::raw::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

use duskfang_core::coordinator::Core;
use duskfang_core::input::RawInputFrame;
use duskfang_core::progression::{CharacterClass, ProgressionHook};
use duskfang_core::snapshot::Snapshot;
use duskfang_foundation::fixed::{fixed, Fixed};

/// A C-side progression callback: `(class_id, key, default_fixed) -> fixed`,
/// matching the `upgrade_get_effect_scalar` hook. `key` is a
/// NUL-terminated string valid for the duration of the call only.
pub type EffectScalarCallback =
    extern "C" fn(class_id: u32, key: *const c_char, default_fixed: i32) -> i32;

struct FfiProgressionHook {
    callback: EffectScalarCallback,
}

impl ProgressionHook for FfiProgressionHook {
    fn effect_scalar(&self, class_id: u32, key: &str, default: Fixed) -> Fixed {
        let c_key = match std::ffi::CString::new(key) {
            Ok(s) => s,
            Err(_) => return default,
        };
        let result = panic::catch_unwind(|| (self.callback)(class_id, c_key.as_ptr(), default.raw()));
        match result {
            Ok(raw) => Fixed::from_raw(raw),
            Err(_) => default,
        }
    }
}

/// Owns the simulation plus the input frame accumulated by
/// `duskfang_set_player_input`/`duskfang_set_ability_input` since the last
/// `duskfang_update`, and a cached read-only [`Snapshot`] refreshed after
/// every tick so it's always safe to consume for rendering or hashing.
pub struct CoreHandle {
    core: Core,
    pending_input: RawInputFrame,
    last_snapshot: Snapshot,
}

impl CoreHandle {
    fn new(seed: u32, class: CharacterClass) -> Self {
        let core = Core::new(seed, class);
        let last_snapshot = core.capture_snapshot();
        CoreHandle {
            core,
            pending_input: RawInputFrame::default(),
            last_snapshot,
        }
    }

    fn refresh_snapshot(&mut self) {
        self.last_snapshot = self.core.capture_snapshot();
    }
}

// ---------------------------------------------------------------------------
// Handle lifecycle
// ---------------------------------------------------------------------------

/// Construct a new run and return an opaque handle. `character_type` is
/// `0 = Warden`, `1 = Raider`, `2 = Kensei` (anything else falls back to
/// Warden, matching `CharacterClass::from_u8`).
#[no_mangle]
pub extern "C" fn duskfang_create(seed: u32, character_type: u8) -> *mut CoreHandle {
    let class = CharacterClass::from_u8(character_type);
    let result = panic::catch_unwind(AssertUnwindSafe(|| CoreHandle::new(seed, class)));
    match result {
        Ok(handle) => {
            tracing::debug!(seed, character_type, "duskfang_create");
            Box::into_raw(Box::new(handle))
        }
        Err(_) => {
            tracing::error!(seed, character_type, "duskfang_create panicked");
            ptr::null_mut()
        }
    }
}

/// Free a handle created by `duskfang_create`. Passing `null` is a no-op;
/// passing an already-freed handle is a contract violation.
#[no_mangle]
pub extern "C" fn duskfang_destroy(handle: *mut CoreHandle) {
    if handle.is_null() {
        return;
    }
    tracing::debug!("duskfang_destroy");
    let _ = panic::catch_unwind(AssertUnwindSafe(|| unsafe {
        drop(Box::from_raw(handle));
    }));
}

/// Every function below dereferences `handle` only through this helper (or
/// [`with_handle_ref`]), which returns the supplied default for a null
/// pointer instead of dereferencing it. The raw pointer cast itself still
/// requires the host to uphold the usual FFI contract (a valid, live
/// `CoreHandle*`); nothing in this module can enforce that across a C
/// boundary.
fn with_handle<R>(handle: *mut CoreHandle, default: R, f: impl FnOnce(&mut CoreHandle) -> R) -> R {
    if handle.is_null() {
        return default;
    }
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let handle_ref: &mut CoreHandle = unsafe { &mut *handle };
        f(handle_ref)
    }));
    result.unwrap_or(default)
}

fn with_handle_ref<R>(handle: *const CoreHandle, default: R, f: impl FnOnce(&CoreHandle) -> R) -> R {
    if handle.is_null() {
        return default;
    }
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let handle_ref: &CoreHandle = unsafe { &*handle };
        f(handle_ref)
    }));
    result.unwrap_or(default)
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Resets RNG to `seed`, clears world, spawns the player at `(0.5, 0.5)`,
/// empties wolf and pack lists. `start_weapon` selects the character class
/// the same way `set_character_type` does.
#[no_mangle]
pub extern "C" fn duskfang_init_run(handle: *mut CoreHandle, seed: u32, start_weapon: u32) {
    with_handle(handle, (), |h| {
        let class = CharacterClass::from_u8(start_weapon as u8);
        h.core = Core::new(seed, class);
        h.pending_input = RawInputFrame::default();
        h.refresh_snapshot();
    });
}

/// Alias for `init_run` that preserves the currently selected character
/// class.
#[no_mangle]
pub extern "C" fn duskfang_reset_run(handle: *mut CoreHandle, new_seed: u32) {
    with_handle(handle, (), |h| {
        let class = h.core.run.character_class;
        h.core = Core::new(new_seed, class);
        h.pending_input = RawInputFrame::default();
        h.refresh_snapshot();
    });
}

#[no_mangle]
pub extern "C" fn duskfang_set_character_type(handle: *mut CoreHandle, t: u8) {
    with_handle(handle, (), |h| {
        let class = CharacterClass::from_u8(t);
        let seed = h.core.run.seed;
        h.core = Core::new(seed, class);
        h.pending_input = RawInputFrame::default();
        h.refresh_snapshot();
    });
}

#[no_mangle]
pub extern "C" fn duskfang_get_character_type(handle: *const CoreHandle) -> u8 {
    with_handle_ref(handle, 0, |h| h.core.run.character_class.as_u8())
}

/// Register the host's `upgrade_get_effect_scalar` callback. A handle with
/// no callback registered keeps the default `NullProgressionHook`, which
/// always returns the caller-supplied default.
#[no_mangle]
pub extern "C" fn duskfang_set_progression_hook(handle: *mut CoreHandle, callback: EffectScalarCallback) {
    with_handle(handle, (), |h| {
        h.core.set_progression_hook(Box::new(FfiProgressionHook { callback }));
    });
}

// ---------------------------------------------------------------------------
// Per-tick
// ---------------------------------------------------------------------------

/// Stores the current input frame. Called at most once per tick, before
/// `duskfang_update`. `special` maps to the special attack button; the
/// class ability trigger is a separate frame set by
/// `duskfang_set_ability_input`, since each class's ability has its own
/// input shape.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub extern "C" fn duskfang_set_player_input(
    handle: *mut CoreHandle,
    ix: f32,
    iy: f32,
    rolling: u8,
    jumping: u8,
    light: u8,
    heavy: u8,
    blocking: u8,
    special: u8,
) {
    with_handle(handle, (), |h| {
        h.pending_input.move_x = ix;
        h.pending_input.move_y = iy;
        h.pending_input.roll = rolling != 0;
        h.pending_input.jump = jumping != 0;
        h.pending_input.light_attack = light != 0;
        h.pending_input.heavy_attack = heavy != 0;
        h.pending_input.block = blocking != 0;
        h.pending_input.special_attack = special != 0;
    });
}

/// Sets the class-ability trigger frame (held for the "charging" classes,
/// edge-triggered for Kensei's dash). Like `set_player_input`, persists
/// across ticks until overwritten.
#[no_mangle]
pub extern "C" fn duskfang_set_ability_input(handle: *mut CoreHandle, primary: u8, release: u8) {
    with_handle(handle, (), |h| {
        h.pending_input.ability_primary = primary != 0;
        h.pending_input.ability_release = release != 0;
    });
}

/// Advances one tick using the input frame last stored by
/// `set_player_input`/`set_ability_input`, and refreshes the cached
/// snapshot consumed by every read accessor below.
#[no_mangle]
pub extern "C" fn duskfang_update(handle: *mut CoreHandle, dt: f32) {
    with_handle(handle, (), |h| {
        h.core.tick(h.pending_input, fixed(dt));
        h.refresh_snapshot();
    });
}

// ---------------------------------------------------------------------------
// Read API -- position/motion/vitals
// ---------------------------------------------------------------------------

macro_rules! snapshot_f32_getter {
    ($name:ident, $method:ident) => {
        #[no_mangle]
        pub extern "C" fn $name(handle: *const CoreHandle) -> f32 {
            with_handle_ref(handle, 0.0, |h| h.last_snapshot.$method())
        }
    };
}

macro_rules! snapshot_bool_getter {
    ($name:ident, $method:ident) => {
        #[no_mangle]
        pub extern "C" fn $name(handle: *const CoreHandle) -> u8 {
            with_handle_ref(handle, 0, |h| h.last_snapshot.$method() as u8)
        }
    };
}

snapshot_f32_getter!(duskfang_get_x, get_x);
snapshot_f32_getter!(duskfang_get_y, get_y);
snapshot_f32_getter!(duskfang_get_vel_x, get_vel_x);
snapshot_f32_getter!(duskfang_get_vel_y, get_vel_y);
snapshot_bool_getter!(duskfang_get_is_grounded, get_is_grounded);
snapshot_bool_getter!(duskfang_get_is_wall_sliding, get_is_wall_sliding);
snapshot_bool_getter!(duskfang_get_is_rolling, get_is_rolling);
snapshot_bool_getter!(duskfang_get_block_state, get_block_state);

#[no_mangle]
pub extern "C" fn duskfang_get_jump_count(handle: *const CoreHandle) -> u8 {
    with_handle_ref(handle, 0, |h| h.last_snapshot.get_jump_count())
}

snapshot_f32_getter!(duskfang_get_hp, get_hp);
snapshot_f32_getter!(duskfang_get_stamina, get_stamina);

#[no_mangle]
pub extern "C" fn duskfang_get_max_hp(handle: *const CoreHandle) -> u32 {
    with_handle_ref(handle, 0, |h| h.last_snapshot.get_max_hp())
}

/// Shell-owned: the core stores and returns whatever phase tag the host
/// last wrote via `duskfang_set_phase`, never reading or branching on it
/// itself. Defaults to `0` for a fresh run.
#[no_mangle]
pub extern "C" fn duskfang_get_phase(handle: *const CoreHandle) -> u32 {
    with_handle_ref(handle, 0, |h| h.core.run.shell_phase)
}

#[no_mangle]
pub extern "C" fn duskfang_set_phase(handle: *mut CoreHandle, phase: u32) {
    with_handle(handle, (), |h| h.core.run.shell_phase = phase);
}

/// Host-facing animation-state tag: `0 = idle/moving, 1 = rolling,
/// 2 = blocking, 3 = ability-active, 4 = dead`.
#[no_mangle]
pub extern "C" fn duskfang_get_player_anim_state(handle: *const CoreHandle) -> u32 {
    with_handle_ref(handle, 0, |h| {
        let s = &h.last_snapshot;
        if s.get_hp() <= 0.0 {
            4
        } else if s.get_is_rolling() {
            1
        } else if s.is_bash_active() || s.is_berserker_charge_active() || s.is_flow_dash_active() {
            3
        } else if s.get_block_state() {
            2
        } else {
            0
        }
    })
}

// ---------------------------------------------------------------------------
// Read API -- abilities
// ---------------------------------------------------------------------------

snapshot_bool_getter!(duskfang_is_bash_active, is_bash_active);
snapshot_f32_getter!(duskfang_get_bash_charge_level, get_bash_charge_level);

#[no_mangle]
pub extern "C" fn duskfang_get_bash_targets_hit(handle: *const CoreHandle) -> u32 {
    with_handle_ref(handle, 0, |h| h.last_snapshot.get_bash_targets_hit())
}

snapshot_bool_getter!(duskfang_is_berserker_charge_active, is_berserker_charge_active);
snapshot_f32_getter!(duskfang_get_berserker_charge_duration, get_berserker_charge_duration);
snapshot_bool_getter!(duskfang_is_flow_dash_active, is_flow_dash_active);

#[no_mangle]
pub extern "C" fn duskfang_get_flow_dash_combo_level(handle: *const CoreHandle) -> u8 {
    with_handle_ref(handle, 0, |h| h.last_snapshot.get_flow_dash_combo_level())
}

snapshot_bool_getter!(duskfang_is_dash_invulnerable, is_dash_invulnerable);
snapshot_bool_getter!(duskfang_can_dash_cancel, can_dash_cancel);

fn ability_usable(h: &CoreHandle) -> bool {
    use duskfang_core::player::{Ability, BashPhase, DashPhase};
    let player = &h.core.player;
    let usable = match &player.ability {
        Ability::Warden(b) => b.phase == BashPhase::Idle,
        Ability::Raider(c) => !c.active,
        Ability::Kensei(d) => d.phase == DashPhase::Idle,
    };
    usable && h.core.combat.can_act()
}

/// `id` is ignored beyond selecting the current class's single ability --
/// each class has exactly one active ability, not an id-addressable set --
/// and is kept only so callers can use a uniform `can_use_ability(id)`
/// signature across classes.
#[no_mangle]
pub extern "C" fn duskfang_can_use_ability(handle: *const CoreHandle, _id: u32) -> u8 {
    with_handle_ref(handle, 0, |h| ability_usable(h) as u8)
}

/// Arms the current class's ability for the next `duskfang_update` call by
/// setting the same `ability_primary` frame `duskfang_set_ability_input`
/// does; returns whether the ability was usable at the time of the call.
#[no_mangle]
pub extern "C" fn duskfang_use_ability(handle: *mut CoreHandle, _id: u32) -> u8 {
    with_handle(handle, 0, |h| {
        let usable = ability_usable(h);
        if usable {
            h.pending_input.ability_primary = true;
        }
        usable as u8
    })
}

#[no_mangle]
pub extern "C" fn duskfang_get_ability_cooldown(handle: *const CoreHandle, _id: u32) -> f32 {
    with_handle_ref(handle, 0.0, |h| {
        use duskfang_core::player::Ability;
        match &h.core.player.ability {
            Ability::Warden(b) => b.active_timer.to_f32(),
            Ability::Raider(c) => c.duration_remaining.to_f32(),
            Ability::Kensei(d) => d.timer.to_f32(),
        }
    })
}

#[no_mangle]
pub extern "C" fn duskfang_get_ability_stamina_cost(handle: *const CoreHandle, _id: u32) -> f32 {
    use duskfang_core::constants;
    use duskfang_core::progression::CharacterClass as Class;
    with_handle_ref(handle, 0.0, |h| match h.core.run.character_class {
        Class::Warden => constants::bash_base_stamina_cost().to_f32(),
        Class::Raider => constants::charge_min_stamina().to_f32(),
        Class::Kensei => constants::dash_base_stamina_cost().to_f32(),
    })
}

// ---------------------------------------------------------------------------
// Read API -- enemies
// ---------------------------------------------------------------------------

#[no_mangle]
pub extern "C" fn duskfang_get_enemy_count(handle: *const CoreHandle) -> u32 {
    with_handle_ref(handle, 0, |h| h.last_snapshot.get_enemy_count() as u32)
}

macro_rules! snapshot_enemy_getter {
    ($name:ident, $method:ident) => {
        #[no_mangle]
        pub extern "C" fn $name(handle: *const CoreHandle, index: u32) -> f32 {
            with_handle_ref(handle, 0.0, |h| h.last_snapshot.$method(index as usize))
        }
    };
}

snapshot_enemy_getter!(duskfang_get_enemy_x, get_enemy_x);
snapshot_enemy_getter!(duskfang_get_enemy_y, get_enemy_y);
snapshot_enemy_getter!(duskfang_get_enemy_vx, get_enemy_vx);
snapshot_enemy_getter!(duskfang_get_enemy_vy, get_enemy_vy);

#[no_mangle]
pub extern "C" fn duskfang_get_wolf_leg_x(handle: *const CoreHandle, index: u32, leg: u8) -> f32 {
    with_handle_ref(handle, 0.0, |h| h.last_snapshot.get_wolf_leg_x(index as usize, leg))
}

#[no_mangle]
pub extern "C" fn duskfang_get_wolf_leg_y(handle: *const CoreHandle, index: u32, leg: u8) -> f32 {
    with_handle_ref(handle, 0.0, |h| h.last_snapshot.get_wolf_leg_y(index as usize, leg))
}

snapshot_enemy_getter!(duskfang_get_wolf_body_bob, get_wolf_body_bob);
snapshot_enemy_getter!(duskfang_get_wolf_head_pitch, get_wolf_head_pitch);
snapshot_enemy_getter!(duskfang_get_wolf_head_yaw, get_wolf_head_yaw);
snapshot_enemy_getter!(duskfang_get_wolf_tail_wag, get_wolf_tail_wag);
snapshot_enemy_getter!(duskfang_get_wolf_ear_rotation, get_wolf_ear_rotation);
snapshot_enemy_getter!(duskfang_get_wolf_body_stretch, get_wolf_body_stretch);

// ---------------------------------------------------------------------------
// Read API -- physics (optional)
// ---------------------------------------------------------------------------

snapshot_f32_getter!(duskfang_get_physics_player_x, get_physics_player_x);
snapshot_f32_getter!(duskfang_get_physics_player_y, get_physics_player_y);
snapshot_f32_getter!(duskfang_get_physics_player_vel_x, get_physics_player_vel_x);
snapshot_f32_getter!(duskfang_get_physics_player_vel_y, get_physics_player_vel_y);

// ---------------------------------------------------------------------------
// Write API -- shell-owned concerns, thin pass-throughs to the host's own
// run-phase shell. The simulation core has no shop, risk, or
// miniboss-phase state of its own; these are stubs so a host linking only
// against `duskfang-ffi` sees the complete signature set, documented as
// shell concerns rather than core behaviour.
// ---------------------------------------------------------------------------

#[no_mangle]
pub extern "C" fn duskfang_commit_choice(_handle: *mut CoreHandle, _id: u32) -> u8 {
    1
}

#[no_mangle]
pub extern "C" fn duskfang_buy_shop_item(_handle: *mut CoreHandle, _index: u32) -> u8 {
    1
}

#[no_mangle]
pub extern "C" fn duskfang_reroll_shop_items(_handle: *mut CoreHandle) -> u8 {
    1
}

#[no_mangle]
pub extern "C" fn duskfang_escape_risk(_handle: *mut CoreHandle) -> u8 {
    1
}

#[no_mangle]
pub extern "C" fn duskfang_damage_miniboss(_handle: *mut CoreHandle, _amount: f32) -> u8 {
    1
}

// ---------------------------------------------------------------------------
// Debug export -- diagnostic counters, available as an optional export for
// hosts that want them; gameplay never depends on reading these back.
// ---------------------------------------------------------------------------

/// `counter` indices match `duskfang_diagnostics::Counter` declaration
/// order: 0 GatingAngleRejects, 1 GatingLosRejects, 2 ThreatBudgetDeferrals,
/// 3 InvalidIdAccess, 4 AttacksThrown, 5 AttacksDodged, 6 AttacksBlocked.
/// Out-of-range indices return `0`.
#[no_mangle]
pub extern "C" fn duskfang_get_diagnostic_counter(handle: *const CoreHandle, counter: u32) -> u64 {
    use duskfang_diagnostics::Counter;
    let tag = match counter {
        0 => Counter::GatingAngleRejects,
        1 => Counter::GatingLosRejects,
        2 => Counter::ThreatBudgetDeferrals,
        3 => Counter::InvalidIdAccess,
        4 => Counter::AttacksThrown,
        5 => Counter::AttacksDodged,
        6 => Counter::AttacksBlocked,
        _ => return 0,
    };
    with_handle_ref(handle, 0, |h| h.core.diagnostics.count(tag))
}

/// The BLAKE3 state hash of the cached snapshot. Writes exactly 32 bytes
/// into `out`; `out` must point at a buffer of at least that size.
#[no_mangle]
pub extern "C" fn duskfang_get_state_hash(handle: *const CoreHandle, out: *mut u8) {
    if out.is_null() {
        return;
    }
    with_handle_ref(handle, (), |h| {
        let hash = h.core.state_hash();
        unsafe { ptr::copy_nonoverlapping(hash.as_ptr(), out, hash.len()) };
    });
}

// Referenced only in doc comments above to describe the opaque-pointer
// convention without exposing `CoreHandle`'s real layout to hosts.
#[allow(dead_code)]
type OpaqueHandle = c_void;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_destroy_round_trip_does_not_crash() {
        let handle = duskfang_create(12345, 0);
        assert!(!handle.is_null());
        duskfang_destroy(handle);
    }

    #[test]
    fn null_handle_reads_return_defaults_instead_of_crashing() {
        assert_eq!(duskfang_get_x(ptr::null()), 0.0);
        assert_eq!(duskfang_get_enemy_count(ptr::null()), 0);
        assert_eq!(duskfang_can_use_ability(ptr::null(), 0), 0);
    }

    #[test]
    fn update_advances_tick_and_refreshes_snapshot() {
        let handle = duskfang_create(12345, 0);
        duskfang_set_player_input(handle, 1.0, 0.0, 0, 0, 0, 0, 0, 0);
        for _ in 0..10 {
            duskfang_update(handle, 1.0 / 60.0);
        }
        let x = duskfang_get_x(handle);
        assert!(x > 0.5, "expected player to have moved right, got x = {x}");
        duskfang_destroy(handle);
    }

    #[test]
    fn set_character_type_restarts_the_run_with_the_new_class() {
        let handle = duskfang_create(12345, 0);
        duskfang_set_character_type(handle, 2);
        assert_eq!(duskfang_get_character_type(handle), 2);
        duskfang_destroy(handle);
    }

    #[test]
    fn state_hash_is_reproducible_from_the_same_seed() {
        let a = duskfang_create(777, 1);
        let b = duskfang_create(777, 1);
        let mut hash_a = [0u8; 32];
        let mut hash_b = [0u8; 32];
        duskfang_get_state_hash(a, hash_a.as_mut_ptr());
        duskfang_get_state_hash(b, hash_b.as_mut_ptr());
        assert_eq!(hash_a, hash_b);
        duskfang_destroy(a);
        duskfang_destroy(b);
    }
}
