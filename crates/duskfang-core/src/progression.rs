//! Upgrade-effect lookup hook consumed by class abilities.
//!
//! The core neither stores nor persists the upgrade tree; it only consumes
//! the current scalar for a `(class_id, key)` pair at activation time. This
//! is a pure, non-blocking lookup -- implementations that lack
//! a progression system return the supplied default.

use duskfang_foundation::fixed::Fixed;

/// Identifies one of the three playable classes, matching
/// `set_character_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum CharacterClass {
    Warden = 0,
    Raider = 1,
    Kensei = 2,
}

impl CharacterClass {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => CharacterClass::Raider,
            2 => CharacterClass::Kensei,
            _ => CharacterClass::Warden,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// A pure key -> scalar lookup for upgrade effects, called at most once per
/// ability activation.
pub trait ProgressionHook {
    fn effect_scalar(&self, class_id: u32, key: &str, default: Fixed) -> Fixed;
}

/// Default hook for hosts without a progression system: always returns the
/// supplied default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressionHook;

impl ProgressionHook for NullProgressionHook {
    fn effect_scalar(&self, _class_id: u32, _key: &str, default: Fixed) -> Fixed {
        default
    }
}
