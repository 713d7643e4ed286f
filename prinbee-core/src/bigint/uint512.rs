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

use super::{
    digit_value, limbs_add, limbs_bit_size, limbs_cmp, limbs_divmod, limbs_is_zero, limbs_mul,
    limbs_shl, limbs_shr_logical, limbs_sub, limbs_to_digits, DIGIT_CHARS_LOWER, DIGIT_CHARS_UPPER,
};
use crate::error::{PrinbeeError, PrinbeeResult};
use std::{cmp::Ordering, fmt};

/// An unsigned 512-bit integer: eight 64-bit limbs, little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Uint512 {
    limbs: [u64; 8],
}

impl Uint512 {
    pub const ZERO: Self = Self { limbs: [0; 8] };
    pub const ONE: Self = Self {
        limbs: [1, 0, 0, 0, 0, 0, 0, 0],
    };
    pub const MAX: Self = Self { limbs: [u64::MAX; 8] };

    pub const fn from_limbs(limbs: [u64; 8]) -> Self {
        Self { limbs }
    }

    pub const fn limbs(&self) -> &[u64; 8] {
        &self.limbs
    }

    pub fn is_zero(&self) -> bool {
        limbs_is_zero(&self.limbs)
    }

    /// Index of the highest set bit + 1; 0 for zero.
    pub fn bit_size(&self) -> usize {
        limbs_bit_size(&self.limbs)
    }

    pub fn compare(&self, rhs: &Self) -> Ordering {
        limbs_cmp(&self.limbs, &rhs.limbs)
    }

    /// Returns `(sum, carry)`.
    pub fn add(&self, rhs: &Self) -> (Self, bool) {
        let (limbs, carry) = limbs_add(&self.limbs, &rhs.limbs);
        (Self { limbs }, carry)
    }

    /// Returns `(diff, borrow)`.
    pub fn sub(&self, rhs: &Self) -> (Self, bool) {
        let (limbs, borrow) = limbs_sub(&self.limbs, &rhs.limbs);
        (Self { limbs }, borrow)
    }

    /// Schoolbook multiply, truncated modulo 2^512.
    pub fn mul(&self, rhs: &Self) -> Self {
        Self {
            limbs: limbs_mul(&self.limbs, &rhs.limbs),
        }
    }

    /// Long division. Fails with [`PrinbeeError::Logic`] on division by zero,
    /// matching "division by zero fails with a logic error".
    pub fn div_rem(&self, rhs: &Self) -> PrinbeeResult<(Self, Self)> {
        if rhs.is_zero() {
            return Err(PrinbeeError::Logic("division by zero".into()));
        }
        let (q, r) = limbs_divmod(&self.limbs, &rhs.limbs);
        Ok((Self { limbs: q }, Self { limbs: r }))
    }

    pub fn and(&self, rhs: &Self) -> Self {
        let mut out = [0u64; 8];
        for i in 0..8 {
            out[i] = self.limbs[i] & rhs.limbs[i];
        }
        Self { limbs: out }
    }

    pub fn or(&self, rhs: &Self) -> Self {
        let mut out = [0u64; 8];
        for i in 0..8 {
            out[i] = self.limbs[i] | rhs.limbs[i];
        }
        Self { limbs: out }
    }

    pub fn xor(&self, rhs: &Self) -> Self {
        let mut out = [0u64; 8];
        for i in 0..8 {
            out[i] = self.limbs[i] ^ rhs.limbs[i];
        }
        Self { limbs: out }
    }

    pub fn not(&self) -> Self {
        let mut out = [0u64; 8];
        for i in 0..8 {
            out[i] = !self.limbs[i];
        }
        Self { limbs: out }
    }

    /// `k >= 512` yields zero. `k` is a bit count, never negative (unsigned shift).
    pub fn lsl(&self, k: u32) -> Self {
        Self {
            limbs: limbs_shl(&self.limbs, k),
        }
    }

    /// Logical right shift; `k >= 512` yields zero.
    pub fn lsr(&self, k: u32) -> Self {
        Self {
            limbs: limbs_shr_logical(&self.limbs, k),
        }
    }

    /// Render in `base` (2..=36). `prefix` adds `0b`/`0`/`0x` for base 2/8/16.
    pub fn to_string_radix(&self, base: u32, prefix: bool, uppercase: bool) -> PrinbeeResult<String> {
        if !(2..=36).contains(&base) {
            return Err(PrinbeeError::Validation(format!(
                "unsupported base {base}, must be in 2..=36"
            )));
        }
        let digits = limbs_to_digits(self.limbs, base);
        let table = if uppercase { DIGIT_CHARS_UPPER } else { DIGIT_CHARS_LOWER };
        let mut s = String::new();
        if prefix {
            match base {
                2 => s.push_str(if uppercase { "0B" } else { "0b" }),
                8 => s.push('0'),
                16 => s.push_str(if uppercase { "0X" } else { "0x" }),
                _ => {}
            }
        }
        for d in digits {
            s.push(table[d as usize] as char);
        }
        Ok(s)
    }

    /// Parse a base-2..36 string, optionally carrying a `0b/0o/0x`-style
    /// introducer when `base` is the matching radix.
    pub fn parse_radix(s: &str, base: u32) -> PrinbeeResult<Self> {
        if !(2..=36).contains(&base) {
            return Err(PrinbeeError::Validation(format!(
                "unsupported base {base}, must be in 2..=36"
            )));
        }
        let mut rest = s;
        match base {
            2 if rest.starts_with("0b") || rest.starts_with("0B") => rest = &rest[2..],
            16 if rest.starts_with("0x") || rest.starts_with("0X") => rest = &rest[2..],
            8 if rest.len() > 1 && rest.starts_with('0') => rest = &rest[1..],
            _ => {}
        }
        if rest.is_empty() {
            return Err(PrinbeeError::Validation("empty numeral".into()));
        }
        let mut acc = Self::ZERO;
        let base_val = Self::from_limbs({
            let mut l = [0u64; 8];
            l[0] = base as u64;
            l
        });
        for b in rest.bytes() {
            let d = digit_value(b).ok_or_else(|| {
                PrinbeeError::Validation(format!("invalid digit {:?} for base {base}", b as char))
            })?;
            if d >= base {
                return Err(PrinbeeError::Validation(format!(
                    "digit {:?} out of range for base {base}",
                    b as char
                )));
            }
            acc = acc.mul(&base_val);
            let (sum, carry) = acc.add(&Self::from_limbs({
                let mut l = [0u64; 8];
                l[0] = d as u64;
                l
            }));
            if carry {
                return Err(PrinbeeError::Validation("numeral overflows uint512".into()));
            }
            acc = sum;
        }
        Ok(acc)
    }
}

impl PartialOrd for Uint512 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl Ord for Uint512 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl fmt::Display for Uint512 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_radix(10, false, false).unwrap())
    }
}

impl From<u64> for Uint512 {
    fn from(v: u64) -> Self {
        let mut limbs = [0u64; 8];
        limbs[0] = v;
        Self { limbs }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_bases() {
        for base in 2..=36u32 {
            let n = Uint512::from(123456789u64);
            let s = n.to_string_radix(base, false, false).unwrap();
            let back = Uint512::parse_radix(&s, base).unwrap();
            assert_eq!(n, back, "base {base} round-trip failed");
        }
    }

    #[test]
    fn wraparound_add() {
        let (sum, carry) = Uint512::MAX.add(&Uint512::ONE);
        assert!(carry);
        assert_eq!(sum, Uint512::ZERO);
    }

    #[test]
    fn div_mod_identity() {
        let a = Uint512::from(1_000_003u64);
        let b = Uint512::from(17u64);
        let (q, r) = a.div_rem(&b).unwrap();
        let (back, carry) = q.mul(&b).add(&r);
        assert!(!carry);
        assert_eq!(back, a);
    }

    #[test]
    fn division_by_zero_is_logic_error() {
        let a = Uint512::from(1u64);
        assert!(matches!(
            a.div_rem(&Uint512::ZERO),
            Err(PrinbeeError::Logic(_))
        ));
    }

    #[test]
    fn shifts_beyond_width_are_zero() {
        let n = Uint512::from(1u64);
        assert_eq!(n.lsl(512), Uint512::ZERO);
        assert_eq!(n.lsr(512), Uint512::ZERO);
    }

    #[test]
    fn hex_prefix_uppercase() {
        let n = Uint512::from(0x80u64);
        assert_eq!(n.to_string_radix(16, true, true).unwrap(), "0X80");
    }

    #[test]
    fn bit_size_of_zero_is_zero() {
        assert_eq!(Uint512::ZERO.bit_size(), 0);
    }
}
