/*
 * This file is part of Prinbee, a distributed database system.
 *
 * Copyright (c) 2026, The Prinbee Authors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! Signed 512-bit integer. Same eight-limb little-endian layout as
//! [`super::uint512::Uint512`]; limb 7 is interpreted as signed (two's
//! complement across the whole 512 bits), mirroring the C++
//! `int512_t { f_value[7]; int64_t f_high_value; }` split.

use super::uint512::Uint512;
use crate::error::{PrinbeeError, PrinbeeResult};
use std::{cmp::Ordering, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Int512 {
    limbs: [u64; 8],
}

impl Int512 {
    pub const ZERO: Self = Self { limbs: [0; 8] };
    pub const ONE: Self = Self {
        limbs: [1, 0, 0, 0, 0, 0, 0, 0],
    };

    pub const fn from_limbs(limbs: [u64; 8]) -> Self {
        Self { limbs }
    }

    pub const fn limbs(&self) -> &[u64; 8] {
        &self.limbs
    }

    pub fn is_zero(&self) -> bool {
        super::limbs_is_zero(&self.limbs)
    }

    pub fn is_negative(&self) -> bool {
        (self.limbs[7] as i64) < 0
    }

    pub fn is_positive(&self) -> bool {
        !self.is_negative()
    }

    /// Two's complement negation: flip all bits, add one.
    pub fn neg(&self) -> Self {
        let inverted = super::limbs_not(&self.limbs);
        let (negated, _) = super::limbs_add(&inverted, Uint512::ONE.limbs());
        Self { limbs: negated }
    }

    pub fn abs(&self) -> Self {
        if self.is_negative() {
            self.neg()
        } else {
            *self
        }
    }

    /// Magnitude as an unsigned value (two's-complement negated if negative).
    fn magnitude(&self) -> Uint512 {
        Uint512::from_limbs(self.abs().limbs)
    }

    pub fn bit_size(&self) -> usize {
        super::limbs_bit_size(&self.limbs)
    }

    /// Lexicographic on (sign, magnitude limbs high->low)
    pub fn compare(&self, rhs: &Self) -> Ordering {
        let a_sign = self.limbs[7] as i64;
        let b_sign = rhs.limbs[7] as i64;
        match a_sign.cmp(&b_sign) {
            Ordering::Equal => {
                for i in (0..7).rev() {
                    match self.limbs[i].cmp(&rhs.limbs[i]) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                }
                Ordering::Equal
            }
            other => other,
        }
    }

    pub fn add(&self, rhs: &Self) -> (Self, bool) {
        let a_neg = self.is_negative();
        let b_neg = rhs.is_negative();
        let (limbs, wrapped) = super::limbs_add(&self.limbs, &rhs.limbs);
        let result = Self { limbs };
        // signed overflow: both operands same sign but result differs
        let overflow = a_neg == b_neg && result.is_negative() != a_neg;
        let _ = wrapped;
        (result, overflow)
    }

    pub fn sub(&self, rhs: &Self) -> (Self, bool) {
        self.add(&rhs.neg())
    }

    pub fn mul(&self, rhs: &Self) -> Self {
        // two's complement multiply is bit-identical to unsigned multiply
        // truncated to the same width.
        Self {
            limbs: super::limbs_mul(&self.limbs, &rhs.limbs),
        }
    }

    /// Truncating division (quotient rounds toward zero, remainder takes the
    /// dividend's sign), matching C++ `/` and `%` semantics.
    pub fn div_rem(&self, rhs: &Self) -> PrinbeeResult<(Self, Self)> {
        if rhs.is_zero() {
            return Err(PrinbeeError::Logic("division by zero".into()));
        }
        let (uq, ur) = self.magnitude().div_rem(&rhs.magnitude())?;
        let neg_q = self.is_negative() != rhs.is_negative();
        let mut q = Self::from_limbs(*uq.limbs());
        if neg_q {
            q = q.neg();
        }
        let mut r = Self::from_limbs(*ur.limbs());
        if self.is_negative() && !r.is_zero() {
            r = r.neg();
        }
        Ok((q, r))
    }

    pub fn and(&self, rhs: &Self) -> Self {
        Self {
            limbs: self.magnitude_bits_and(rhs, |a, b| a & b),
        }
    }

    pub fn or(&self, rhs: &Self) -> Self {
        Self {
            limbs: self.magnitude_bits_and(rhs, |a, b| a | b),
        }
    }

    pub fn xor(&self, rhs: &Self) -> Self {
        Self {
            limbs: self.magnitude_bits_and(rhs, |a, b| a ^ b),
        }
    }

    fn magnitude_bits_and(&self, rhs: &Self, f: impl Fn(u64, u64) -> u64) -> [u64; 8] {
        let mut out = [0u64; 8];
        for i in 0..8 {
            out[i] = f(self.limbs[i], rhs.limbs[i]);
        }
        out
    }

    pub fn not(&self) -> Self {
        Self {
            limbs: super::limbs_not(&self.limbs),
        }
    }

    pub fn lsl(&self, k: u32) -> Self {
        Self {
            limbs: super::limbs_shl(&self.limbs, k),
        }
    }

    /// Arithmetic right shift: sign-extends, unlike `Uint512::lsr`.
    pub fn lsr(&self, k: u32) -> Self {
        if k as usize >= 512 {
            return if self.is_negative() {
                Self { limbs: [u64::MAX; 8] }
            } else {
                Self::ZERO
            };
        }
        let mut shifted = super::limbs_shr_logical(&self.limbs, k);
        if self.is_negative() {
            // fill in the vacated high bits with ones
            let fill = Self { limbs: [u64::MAX; 8] };
            let mask = super::limbs_not(&super::limbs_shr_logical(&fill.limbs, k));
            for i in 0..8 {
                shifted[i] |= mask[i];
            }
        }
        Self { limbs: shifted }
    }

    pub fn to_string_radix(&self, base: u32, prefix: bool, uppercase: bool) -> PrinbeeResult<String> {
        let mag = self.magnitude();
        let body = mag.to_string_radix(base, prefix, uppercase)?;
        if self.is_negative() {
            Ok(format!("-{body}"))
        } else {
            Ok(body)
        }
    }

    /// As [`to_string_radix`] but prepends `+` for non-negative values when
    /// `show_plus` is requested ("`+` shown when caller requests").
    pub fn to_string_signed(
        &self,
        base: u32,
        prefix: bool,
        uppercase: bool,
        show_plus: bool,
    ) -> PrinbeeResult<String> {
        let s = self.to_string_radix(base, prefix, uppercase)?;
        if show_plus && !self.is_negative() {
            Ok(format!("+{s}"))
        } else {
            Ok(s)
        }
    }

    pub fn parse_radix(s: &str, base: u32) -> PrinbeeResult<Self> {
        let (neg, rest) = match s.strip_prefix('-') {
            Some(r) => (true, r),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let mag = Uint512::parse_radix(rest, base)?;
        let mut v = Self::from_limbs(*mag.limbs());
        if neg {
            v = v.neg();
        }
        Ok(v)
    }
}

impl PartialOrd for Int512 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl Ord for Int512 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl fmt::Display for Int512 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_radix(10, false, false).unwrap())
    }
}

impl From<i64> for Int512 {
    fn from(v: i64) -> Self {
        let fill = if v < 0 { u64::MAX } else { 0 };
        let mut limbs = [fill; 8];
        limbs[0] = v as u64;
        Self { limbs }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_one_round_trips() {
        let n = Int512::from(-1i64);
        assert_eq!(n.to_string_radix(10, false, false).unwrap(), "-1");
        assert!(n.is_negative());
    }

    #[test]
    fn negate_and_back() {
        let n = Int512::from(42i64);
        let neg = n.neg();
        assert!(neg.is_negative());
        assert_eq!(neg.neg(), n);
    }

    #[test]
    fn div_mod_sign_rules() {
        let a = Int512::from(-7i64);
        let b = Int512::from(2i64);
        let (q, r) = a.div_rem(&b).unwrap();
        assert_eq!(q, Int512::from(-3i64));
        assert_eq!(r, Int512::from(-1i64));
    }

    #[test]
    fn max_magnitude_plus_one_wraps_with_carry() {
        // (2^512 - 1) interpreted unsigned, plus one, carries to zero.
        let max_pattern = Int512::from_limbs([u64::MAX; 8]);
        let (sum, _) = max_pattern.add(&Int512::ONE);
        assert_eq!(sum, Int512::ZERO);
    }

    #[test]
    fn round_trip_bases() {
        for base in 2..=36u32 {
            let n = Int512::from(-987654321i64);
            let s = n.to_string_radix(base, false, false).unwrap();
            let back = Int512::parse_radix(&s, base).unwrap();
            assert_eq!(n, back, "base {base} round-trip failed");
        }
    }
}
