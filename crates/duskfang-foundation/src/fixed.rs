//! Deterministic Q16.16 fixed-point scalars and vectors.
//!
//! `Fixed` is a signed 32-bit integer with an implicit scale of `2^16`. All
//! positional, velocity, angular, and timing quantities inside the
//! simulation are `Fixed` so that the same sequence of operations produces
//! the same bits on every machine -- the core's determinism guarantee does
//! not hold for native floats, which is why this type exists instead of
//! `f32`/`f64` everywhere. The boundary marshals to/from `f32` only for
//! input and snapshot (see [`Fixed::from_f32`]/[`Fixed::to_f32`]).

use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// Number of fractional bits.
pub const FRAC_BITS: u32 = 16;
const ONE_RAW: i64 = 1 << FRAC_BITS;

/// A Q16.16 fixed-point scalar.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fixed(pub i32);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);
    pub const ONE: Fixed = Fixed(ONE_RAW as i32);
    pub const HALF: Fixed = Fixed((ONE_RAW / 2) as i32);

    /// Construct from a raw Q16.16 value.
    #[inline]
    pub const fn from_raw(raw: i32) -> Self {
        Fixed(raw)
    }

    /// Construct from an integer.
    #[inline]
    pub const fn from_int(v: i32) -> Self {
        Fixed(v.saturating_mul(ONE_RAW as i32))
    }

    /// Construct from an `f32`. Used only at the simulation boundary
    /// (input frames, snapshot export) -- never inside gameplay math.
    #[inline]
    pub fn from_f32(v: f32) -> Self {
        if !v.is_finite() {
            return Fixed::ZERO;
        }
        let scaled = (v as f64) * (ONE_RAW as f64);
        Fixed(scaled.clamp(i32::MIN as f64, i32::MAX as f64) as i32)
    }

    /// Convert back to `f32` for the host boundary.
    #[inline]
    pub fn to_f32(self) -> f32 {
        (self.0 as f64 / ONE_RAW as f64) as f32
    }

    #[inline]
    pub fn raw(self) -> i32 {
        self.0
    }

    #[inline]
    pub fn abs(self) -> Fixed {
        Fixed(self.0.saturating_abs())
    }

    #[inline]
    pub fn min(self, other: Fixed) -> Fixed {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }

    #[inline]
    pub fn max(self, other: Fixed) -> Fixed {
        if self.0 >= other.0 {
            self
        } else {
            other
        }
    }

    #[inline]
    pub fn clamp(self, lo: Fixed, hi: Fixed) -> Fixed {
        self.max(lo).min(hi)
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Newton's-method square root, seeded from a bit-length estimate and
    /// bounded to at most 16 iterations -- deterministic and
    /// platform-independent (no libm `sqrtf`).
    pub fn sqrt(self) -> Fixed {
        if self.0 <= 0 {
            return Fixed::ZERO;
        }
        let n = self.0 as i64;
        // Seed the estimate from the bit length of n (in Q16.16 terms) so
        // convergence is fast regardless of magnitude.
        let bits = 64 - n.leading_zeros() as i64;
        let mut x = 1i64 << ((bits + FRAC_BITS as i64) / 2).max(1);
        for _ in 0..16 {
            if x == 0 {
                break;
            }
            let next = (x + (n << FRAC_BITS) / x) / 2;
            if next == x {
                break;
            }
            x = next;
        }
        Fixed(x.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
    }
}

impl Add for Fixed {
    type Output = Fixed;
    #[inline]
    fn add(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Fixed {
    #[inline]
    fn add_assign(&mut self, rhs: Fixed) {
        *self = *self + rhs;
    }
}

impl Sub for Fixed {
    type Output = Fixed;
    #[inline]
    fn sub(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign for Fixed {
    #[inline]
    fn sub_assign(&mut self, rhs: Fixed) {
        *self = *self - rhs;
    }
}

impl Neg for Fixed {
    type Output = Fixed;
    #[inline]
    fn neg(self) -> Fixed {
        Fixed(self.0.saturating_neg())
    }
}

impl Mul for Fixed {
    type Output = Fixed;
    #[inline]
    fn mul(self, rhs: Fixed) -> Fixed {
        let wide = (self.0 as i64) * (rhs.0 as i64);
        let shifted = wide >> FRAC_BITS;
        Fixed(shifted.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
    }
}

impl Div for Fixed {
    type Output = Fixed;
    #[inline]
    fn div(self, rhs: Fixed) -> Fixed {
        if rhs.0 == 0 {
            return Fixed::ZERO;
        }
        let wide = (self.0 as i64) << FRAC_BITS;
        let result = wide / (rhs.0 as i64);
        Fixed(result.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
    }
}

impl fmt::Debug for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}", self.to_f32())
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}", self.to_f32())
    }
}

/// Convenience constructor for literal fixed-point constants in gameplay
/// tables (e.g. `fixed(0.3)` for `MOVE_SPEED`).
#[inline]
pub fn fixed(v: f32) -> Fixed {
    Fixed::from_f32(v)
}

// ---------------------------------------------------------------------------
// FixedVec2 / FixedVec3
// ---------------------------------------------------------------------------

/// A two-component fixed-point vector (xy-plane position/velocity).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Debug, Default)]
pub struct FixedVec2 {
    pub x: Fixed,
    pub y: Fixed,
}

impl FixedVec2 {
    pub const ZERO: FixedVec2 = FixedVec2 {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    #[inline]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        FixedVec2 { x, y }
    }

    #[inline]
    pub fn dot(self, rhs: FixedVec2) -> Fixed {
        self.x * rhs.x + self.y * rhs.y
    }

    #[inline]
    pub fn length_sq(self) -> Fixed {
        self.dot(self)
    }

    #[inline]
    pub fn length(self) -> Fixed {
        self.length_sq().sqrt()
    }

    /// Returns the zero vector on zero-length input -- never `NaN`, since
    /// `Fixed` has no such representation; this keeps the contract explicit.
    pub fn normalize(self) -> FixedVec2 {
        let len = self.length();
        if len.is_zero() {
            FixedVec2::ZERO
        } else {
            FixedVec2::new(self.x / len, self.y / len)
        }
    }

    #[inline]
    pub fn scale(self, s: Fixed) -> FixedVec2 {
        FixedVec2::new(self.x * s, self.y * s)
    }

    #[inline]
    pub fn perpendicular(self) -> FixedVec2 {
        FixedVec2::new(-self.y, self.x)
    }
}

impl Add for FixedVec2 {
    type Output = FixedVec2;
    #[inline]
    fn add(self, rhs: FixedVec2) -> FixedVec2 {
        FixedVec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for FixedVec2 {
    #[inline]
    fn add_assign(&mut self, rhs: FixedVec2) {
        *self = *self + rhs;
    }
}

impl Sub for FixedVec2 {
    type Output = FixedVec2;
    #[inline]
    fn sub(self, rhs: FixedVec2) -> FixedVec2 {
        FixedVec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// A three-component fixed-point vector. `z` is reserved for a future
/// vertical axis and currently always zero.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Debug, Default)]
pub struct FixedVec3 {
    pub x: Fixed,
    pub y: Fixed,
    pub z: Fixed,
}

impl FixedVec3 {
    pub const ZERO: FixedVec3 = FixedVec3 {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
        z: Fixed::ZERO,
    };

    #[inline]
    pub const fn new(x: Fixed, y: Fixed, z: Fixed) -> Self {
        FixedVec3 { x, y, z }
    }

    #[inline]
    pub fn from_xy(xy: FixedVec2) -> Self {
        FixedVec3::new(xy.x, xy.y, Fixed::ZERO)
    }

    #[inline]
    pub fn xy(self) -> FixedVec2 {
        FixedVec2::new(self.x, self.y)
    }

    #[inline]
    pub fn dot(self, rhs: FixedVec3) -> Fixed {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    #[inline]
    pub fn length_sq(self) -> Fixed {
        self.dot(self)
    }

    #[inline]
    pub fn length(self) -> Fixed {
        self.length_sq().sqrt()
    }

    pub fn normalize(self) -> FixedVec3 {
        let len = self.length();
        if len.is_zero() {
            FixedVec3::ZERO
        } else {
            FixedVec3::new(self.x / len, self.y / len, self.z / len)
        }
    }

    #[inline]
    pub fn scale(self, s: Fixed) -> FixedVec3 {
        FixedVec3::new(self.x * s, self.y * s, self.z * s)
    }
}

impl Add for FixedVec3 {
    type Output = FixedVec3;
    #[inline]
    fn add(self, rhs: FixedVec3) -> FixedVec3 {
        FixedVec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for FixedVec3 {
    type Output = FixedVec3;
    #[inline]
    fn sub(self, rhs: FixedVec3) -> FixedVec3 {
        FixedVec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_saturates_instead_of_panicking() {
        let a = Fixed::from_raw(i32::MAX);
        let b = Fixed::from_int(1);
        assert_eq!((a + b).raw(), i32::MAX);
    }

    #[test]
    fn sqrt_matches_float_within_tolerance() {
        for v in [0.0f32, 1.0, 2.0, 0.25, 100.0, 0.0001] {
            let got = fixed(v).sqrt().to_f32();
            let want = v.sqrt();
            assert!((got - want).abs() < 0.01, "sqrt({v}) = {got}, want ~{want}");
        }
    }

    #[test]
    fn sqrt_of_negative_is_zero() {
        assert_eq!(fixed(-4.0).sqrt(), Fixed::ZERO);
    }

    #[test]
    fn normalize_zero_length_is_zero_not_nan() {
        assert_eq!(FixedVec2::ZERO.normalize(), FixedVec2::ZERO);
    }

    #[test]
    fn normalize_unit_length() {
        let v = FixedVec2::new(fixed(3.0), fixed(4.0)).normalize();
        assert!((v.length().to_f32() - 1.0).abs() < 0.001);
    }

    #[test]
    fn division_by_zero_is_zero() {
        assert_eq!(fixed(5.0) / Fixed::ZERO, Fixed::ZERO);
    }

    #[test]
    fn roundtrip_f32() {
        let v = fixed(0.3);
        assert!((v.to_f32() - 0.3).abs() < 0.0001);
    }

    #[test]
    fn non_finite_f32_becomes_zero() {
        assert_eq!(Fixed::from_f32(f32::NAN), Fixed::ZERO);
        assert_eq!(Fixed::from_f32(f32::INFINITY), Fixed::ZERO);
    }
}
