//! Adaptive difficulty: a rolling estimate of player skill used to rescale
//! wolf stats.
//!
//! The estimate is a simple exponential blend over a fixed window, not a
//! full history buffer -- the core never needs to replay "how did skill
//! get here", only "what is it now", so there's nothing to gain from
//! storing more than the running average and the window timer.

use serde::{Deserialize, Serialize};

use duskfang_foundation::fixed::Fixed;

use crate::constants;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SkillSignals {
    pub damage_taken: Fixed,
    pub damage_dealt: Fixed,
    pub perfect_parries: u32,
    pub deaths: u32,
}

impl Default for SkillSignals {
    fn default() -> Self {
        SkillSignals {
            damage_taken: Fixed::ZERO,
            damage_dealt: Fixed::ZERO,
            perfect_parries: 0,
            deaths: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveDifficulty {
    pub skill_estimate: Fixed,
    pub window_timer: Fixed,
    accum: SkillSignals,
}

impl Default for AdaptiveDifficulty {
    fn default() -> Self {
        AdaptiveDifficulty {
            skill_estimate: constants::default_player_skill(),
            window_timer: Fixed::ZERO,
            accum: SkillSignals::default(),
        }
    }
}

impl AdaptiveDifficulty {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_damage_dealt(&mut self, amount: Fixed) {
        self.accum.damage_dealt += amount;
    }

    pub fn record_damage_taken(&mut self, amount: Fixed) {
        self.accum.damage_taken += amount;
    }

    pub fn record_perfect_parry(&mut self) {
        self.accum.perfect_parries += 1;
    }

    pub fn record_death(&mut self) {
        self.accum.deaths += 1;
    }

    /// Advance the window timer; every `difficulty_update_period` seconds,
    /// blend a fresh per-window skill sample into the running estimate and
    /// reset the accumulator.
    pub fn update(&mut self, dt: Fixed) {
        self.window_timer += dt;
        if self.window_timer < constants::difficulty_update_period() {
            return;
        }
        self.window_timer = Fixed::ZERO;

        let dealt_vs_taken = if (self.accum.damage_dealt + self.accum.damage_taken).is_zero() {
            constants::default_player_skill()
        } else {
            self.accum.damage_dealt / (self.accum.damage_dealt + self.accum.damage_taken)
        };
        let parry_bonus = Fixed::from_int(self.accum.perfect_parries.min(10) as i32) * Fixed::from_raw(655); // ~0.01 per parry
        let death_penalty = Fixed::from_int(self.accum.deaths as i32) * Fixed::from_raw(6554); // ~0.1 per death

        let sample = (dealt_vs_taken + parry_bonus - death_penalty).clamp(Fixed::ZERO, Fixed::ONE);
        self.skill_estimate = (self.skill_estimate + sample) / Fixed::from_int(2);

        self.accum = SkillSignals::default();
    }

    /// Multiplier applied to a wolf's base hp/damage/speed, centred on `1.0`
    /// at the default skill estimate and spanning roughly `[0.75, 1.25]`.
    pub fn wolf_stat_multiplier(&self) -> Fixed {
        let centered = self.skill_estimate - constants::default_player_skill();
        Fixed::ONE + centered * Fixed::from_int(1) / Fixed::from_int(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duskfang_foundation::fixed::fixed;

    #[test]
    fn stays_at_default_with_no_signals() {
        let mut d = AdaptiveDifficulty::new();
        d.update(constants::difficulty_update_period());
        assert!((d.skill_estimate.to_f32() - 0.5).abs() < 0.05);
    }

    #[test]
    fn heavy_damage_dealt_raises_estimate() {
        let mut d = AdaptiveDifficulty::new();
        d.record_damage_dealt(fixed(100.0));
        d.update(constants::difficulty_update_period());
        assert!(d.skill_estimate.to_f32() > 0.5);
    }

    #[test]
    fn deaths_lower_the_estimate() {
        let mut d = AdaptiveDifficulty::new();
        d.record_death();
        d.record_death();
        d.update(constants::difficulty_update_period());
        assert!(d.skill_estimate.to_f32() < 0.5);
    }

    #[test]
    fn multiplier_is_one_at_default_skill() {
        let d = AdaptiveDifficulty::new();
        assert_eq!(d.wolf_stat_multiplier(), Fixed::ONE);
    }
}
