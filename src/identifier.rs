//! 160-bit ring identifiers and the circular interval predicates routing and replication
//! are built on.
//!
//! Identifiers are SHA-1 digests, stored big-endian. Because they are fixed-width byte
//! arrays, lexicographic byte comparison IS unsigned numeric comparison — there's no need
//! for a bignum type the way the original implementation reached for `math/big.Int`.

use serde::{de::Error as DeError, Deserialize, Deserializer, Serialize, Serializer};
use sha1::{Digest, Sha1};
use std::fmt;

/// Number of bits in the ring's identifier space (`m` in Chord papers).
pub const BITS: usize = 160;
/// Number of bytes backing an [`Identifier`].
pub const SIZE: usize = BITS / 8;

/// A 160-bit SHA-1 identifier placed on the ring.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier([u8; SIZE]);

impl Identifier {
    pub const ZERO: Identifier = Identifier([0u8; SIZE]);

    /// Derive an identifier from a peer's `ip:port` address, per the wire spec's literal
    /// `SHA-1(utf8 "ip:port"))`.
    pub fn of_address(ip: &str, port: u16) -> Self {
        let s = format!("{ip}:{port}");
        Self::of_bytes(s.as_bytes())
    }

    /// Derive an identifier as the SHA-1 digest of arbitrary content (used both for record
    /// identifiers and row hashes).
    pub fn of_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(data);
        let digest = hasher.finalize();
        let mut out = [0u8; SIZE];
        out.copy_from_slice(&digest);
        Identifier(out)
    }

    pub fn from_bytes(bytes: [u8; SIZE]) -> Self {
        Identifier(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SIZE] {
        &self.0
    }

    /// `(self + 2^(k-1)) mod 2^160`, the target identifier for finger table entry `k`
    /// (`k` ranges `1..=160`).
    pub fn finger_target(&self, k: usize) -> Identifier {
        debug_assert!((1..=BITS).contains(&k));
        let bit_index = k - 1;
        let byte_from_end = bit_index / 8;
        let bit_in_byte = bit_index % 8;
        let byte_pos = SIZE - 1 - byte_from_end;

        let mut result = self.0;
        let mut carry: u8 = 1 << bit_in_byte;
        let mut i = byte_pos as isize;
        while carry != 0 && i >= 0 {
            let (sum, overflowed) = result[i as usize].overflowing_add(carry);
            result[i as usize] = sum;
            carry = overflowed as u8;
            i -= 1;
        }
        // A carry past the most significant byte overflows 2^160 and is dropped, which is
        // exactly `mod 2^160`.
        Identifier(result)
    }

    /// `n ∈ (a, b]`: left-open, right-closed.
    pub fn between_r(self, a: Identifier, b: Identifier) -> bool {
        let n = self;
        if a == b {
            // Matches the source's fall-through: a collapsed (a,a] interval is treated as
            // the whole ring, same as the other three predicates.
            return true;
        }
        if a < b {
            a < n && n <= b
        } else {
            a < n || n <= b
        }
    }

    /// `n ∈ [a, b)`: left-closed, right-open.
    pub fn between_l(self, a: Identifier, b: Identifier) -> bool {
        let n = self;
        if a == b {
            // Matches the source's fall-through behavior: a collapsed [a,a) interval (other
            // than the n==a point already handled) is treated as the whole ring.
            return true;
        }
        if a < b {
            a <= n && n < b
        } else {
            a <= n || n < b
        }
    }

    /// `n ∈ (a, b)`: open on both ends.
    pub fn between(self, a: Identifier, b: Identifier) -> bool {
        let n = self;
        if a == b {
            return true;
        }
        if a < b {
            a < n && n < b
        } else {
            a < n || n < b
        }
    }

    /// `n ∈ [a, b]`: closed on both ends.
    pub fn between_lr(self, a: Identifier, b: Identifier) -> bool {
        let n = self;
        if a == b {
            return true;
        }
        if a < b {
            a <= n && n <= b
        } else {
            a <= n || n <= b
        }
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let mut out = [0u8; SIZE];
        if bytes.len() != SIZE {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        out.copy_from_slice(&bytes);
        Ok(Identifier(out))
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", self.to_hex())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Identifier::from_hex(&s).map_err(DeError::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id(byte: u8) -> Identifier {
        let mut b = [0u8; SIZE];
        b[SIZE - 1] = byte;
        Identifier(b)
    }

    #[test]
    fn collapsed_point_is_whole_ring_for_all_four_predicates() {
        let a = id(5);
        assert!(id(6).between(a, a));
        assert!(id(200).between(a, a));
        assert!(id(6).between_l(a, a));
        assert!(id(6).between_lr(a, a));
        assert!(id(6).between_r(a, a));
        assert!(id(0).between_r(a, a));
        assert!(id(5).between_r(a, a));
    }

    #[test]
    fn non_wrapping_intervals() {
        let a = id(10);
        let b = id(20);
        assert!(!id(10).between(a, b));
        assert!(id(15).between(a, b));
        assert!(!id(20).between(a, b));

        assert!(id(10).between_l(a, b));
        assert!(!id(20).between_l(a, b));

        assert!(!id(10).between_r(a, b));
        assert!(id(20).between_r(a, b));

        assert!(id(10).between_lr(a, b));
        assert!(id(20).between_lr(a, b));
    }

    #[test]
    fn wrapping_intervals() {
        let a = id(250);
        let b = id(5);
        assert!(id(255).between(a, b));
        assert!(id(2).between(a, b));
        assert!(!id(250).between(a, b));
        assert!(!id(5).between(a, b));
        assert!(id(5).between_r(a, b));
        assert!(!id(250).between_r(a, b));
    }

    #[test]
    fn finger_target_wraps_modulo_2_160() {
        let max = Identifier([0xff; SIZE]);
        let next = max.finger_target(1); // + 2^0 = +1, should wrap to zero
        assert_eq!(next, Identifier::ZERO);
    }

    #[test]
    fn finger_target_basic_addition() {
        let zero = Identifier::ZERO;
        let t = zero.finger_target(1); // + 1
        assert_eq!(t, id(1));
        let t2 = zero.finger_target(9); // + 2^8 = +256
        let mut expected = [0u8; SIZE];
        expected[SIZE - 2] = 1;
        assert_eq!(t2, Identifier(expected));
    }

    #[test]
    fn hex_roundtrip() {
        let a = Identifier::of_address("127.0.0.1", 10001);
        let s = a.to_hex();
        assert_eq!(Identifier::from_hex(&s).unwrap(), a);
    }

    proptest! {
        #[test]
        fn between_lr_is_the_union_of_the_point_and_the_open_interval(a in 0u8..255, b in 0u8..255, n in 0u8..255) {
            let (a, b, n) = (id(a), id(b), id(n));
            prop_assert_eq!(n.between_lr(a, b), n == a || n == b || n.between(a, b));
        }

        #[test]
        fn between_r_implies_between_lr(a in 0u8..255, b in 0u8..255, n in 0u8..255) {
            let (a, b, n) = (id(a), id(b), id(n));
            if n.between_r(a, b) {
                prop_assert!(n.between_lr(a, b));
            }
        }

        #[test]
        fn between_l_is_the_left_endpoint_plus_the_open_interval(a in 0u8..255, b in 0u8..255, n in 0u8..255) {
            let (a, b, n) = (id(a), id(b), id(n));
            if a != b {
                prop_assert_eq!(n.between_l(a, b), n == a || n.between(a, b));
            }
        }

        #[test]
        fn between_r_is_the_right_endpoint_plus_the_open_interval(a in 0u8..255, b in 0u8..255, n in 0u8..255) {
            let (a, b, n) = (id(a), id(b), id(n));
            if a != b {
                prop_assert_eq!(n.between_r(a, b), n == b || n.between(a, b));
            }
        }
    }
}
