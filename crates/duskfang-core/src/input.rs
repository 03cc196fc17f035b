//! Raw input sanitization and gating.
//!
//! The host hands the core a raw per-tick input frame (movement axes plus
//! action flags); `InputGate` is the only place that frame is touched
//! before gameplay code sees it, so every other module can assume inputs
//! are already clamped, normalized, and masked for stun/death.

use serde::{Deserialize, Serialize};

use duskfang_foundation::fixed::{Fixed, FixedVec2};

/// One tick's worth of raw host input, as handed across the FFI boundary.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RawInputFrame {
    pub move_x: f32,
    pub move_y: f32,
    pub jump: bool,
    pub light_attack: bool,
    pub heavy_attack: bool,
    pub special_attack: bool,
    pub block: bool,
    pub roll: bool,
    pub ability_primary: bool,
    pub ability_release: bool,
}

/// Sanitized input for one tick: movement clamped to the unit disc, actions
/// masked to `false` while stunned or dead.
#[derive(Debug, Clone, Copy, Default)]
pub struct GatedInput {
    pub move_xy: FixedVec2,
    pub jump: bool,
    pub light_attack: bool,
    pub heavy_attack: bool,
    pub special_attack: bool,
    pub block: bool,
    pub roll: bool,
    pub ability_primary: bool,
    pub ability_release: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct InputGate;

impl InputGate {
    pub fn new() -> Self {
        InputGate
    }

    /// Clamp, normalize, and (when `stunned_or_dead`) mask a raw frame.
    pub fn gate(&self, raw: RawInputFrame, stunned_or_dead: bool) -> GatedInput {
        let move_xy = Self::clamp_move(raw.move_x, raw.move_y);

        if stunned_or_dead {
            return GatedInput {
                move_xy: FixedVec2::ZERO,
                jump: false,
                light_attack: false,
                heavy_attack: false,
                special_attack: false,
                block: false,
                roll: false,
                ability_primary: false,
                ability_release: false,
            };
        }

        GatedInput {
            move_xy,
            jump: raw.jump,
            light_attack: raw.light_attack,
            heavy_attack: raw.heavy_attack,
            special_attack: raw.special_attack,
            block: raw.block,
            roll: raw.roll,
            ability_primary: raw.ability_primary,
            ability_release: raw.ability_release,
        }
    }

    fn clamp_move(x: f32, y: f32) -> FixedVec2 {
        let x = if x.is_finite() { x } else { 0.0 };
        let y = if y.is_finite() { y } else { 0.0 };
        let v = FixedVec2::new(Fixed::from_f32(x), Fixed::from_f32(y));
        let len = v.length();
        if len > Fixed::ONE {
            v.scale(Fixed::ONE / len)
        } else {
            v
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagonal_input_is_clamped_to_unit_length() {
        let gate = InputGate::new();
        let gated = gate.gate(
            RawInputFrame {
                move_x: 1.0,
                move_y: 1.0,
                ..Default::default()
            },
            false,
        );
        assert!((gated.move_xy.length().to_f32() - 1.0).abs() < 0.01);
    }

    #[test]
    fn stunned_masks_every_action() {
        let gate = InputGate::new();
        let gated = gate.gate(
            RawInputFrame {
                move_x: 1.0,
                move_y: 0.0,
                light_attack: true,
                jump: true,
                ..Default::default()
            },
            true,
        );
        assert_eq!(gated.move_xy, FixedVec2::ZERO);
        assert!(!gated.light_attack);
        assert!(!gated.jump);
    }

    #[test]
    fn non_finite_axes_become_zero() {
        let gate = InputGate::new();
        let gated = gate.gate(
            RawInputFrame {
                move_x: f32::NAN,
                move_y: f32::INFINITY,
                ..Default::default()
            },
            false,
        );
        assert_eq!(gated.move_xy, FixedVec2::ZERO);
    }
}
