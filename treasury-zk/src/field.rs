//! Prime-field helpers for the two moduli used by the protocol.
//!
//! - [`Base`] is the BN254 scalar field. Curve coordinates, Poseidon hashes, Merkle nodes and
//!   every circuit signal live here.
//! - [`Scalar`] is the prime order `L` of the Baby Jubjub subgroup generated by `G`. Private keys
//!   and scalar multipliers live here.
//!
//! They are distinct types, so adding a key to a coordinate does not compile. The only crossings
//! are [`scalar_to_base`], which is lossless because `L < p`, and [`base_to_scalar`], which fails
//! instead of reducing.

use crate::error::ZkError;
use ark_ff::{BigInteger, PrimeField};
use num_bigint::BigUint;

pub type Base = ark_bn254::Fr;

pub type Scalar = ark_ed_on_bn254::Fr;

/// Coordinate field of the BN254 pairing groups (proof points, verifying keys).
pub type ProofField = ark_bn254::Fq;

/// Checked arithmetic and canonical encodings on top of [`PrimeField`].
///
/// Arithmetic itself (`+`, `-`, `*`, unary `-`) comes from arkworks and always returns reduced
/// values. The methods here cover the cases that can fail and turn them into [`ZkError`]s.
pub trait FieldExt: PrimeField {
    /// Name used in error messages.
    const NAME: &'static str;

    /// `a⁻¹` such that `a·a⁻¹ = 1`.
    fn checked_inverse(&self) -> Result<Self, ZkError> {
        self.inverse().ok_or(ZkError::NotInvertible)
    }

    fn checked_div(&self, rhs: &Self) -> Result<Self, ZkError> {
        Ok(*self * rhs.checked_inverse()?)
    }

    /// Square root via Tonelli-Shanks, gated on the Legendre symbol.
    ///
    /// Of the two roots `r` and `-r`, the one with the smaller canonical integer is returned.
    fn checked_sqrt(&self) -> Result<Self, ZkError> {
        let root = self.sqrt().ok_or(ZkError::NoSquareRoot)?;
        let neg = -root;
        Ok(if neg.into_bigint() < root.into_bigint() { neg } else { root })
    }

    fn modulus_biguint() -> BigUint {
        BigUint::from_bytes_be(&Self::MODULUS.to_bytes_be())
    }

    /// Strict conversion: values at or above the modulus are rejected, never reduced.
    fn from_biguint(n: &BigUint) -> Result<Self, ZkError> {
        if *n >= Self::modulus_biguint() {
            return Err(ZkError::FieldMismatch { field: Self::NAME });
        }
        Ok(Self::from_be_bytes_mod_order(&n.to_bytes_be()))
    }

    fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.into_bigint().to_bytes_be())
    }

    /// Reduces an arbitrary big-endian integer into the field.
    fn reduce_be_bytes(bytes: &[u8]) -> Self {
        Self::from_be_bytes_mod_order(bytes)
    }

    fn from_decimal(s: &str) -> Result<Self, ZkError> {
        let s = s.trim();
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ZkError::Encoding(format!("invalid decimal field element: {s:?}")));
        }
        let n = BigUint::parse_bytes(s.as_bytes(), 10)
            .ok_or_else(|| ZkError::Encoding(format!("invalid decimal field element: {s:?}")))?;
        Self::from_biguint(&n)
    }

    /// Decimal form without leading zeros, as circuit witnesses expect.
    fn to_decimal(&self) -> String {
        self.to_biguint().to_str_radix(10)
    }

    /// Strict 32-byte big-endian decoding, as stored by the ledger.
    fn from_be_bytes32(bytes: &[u8; 32]) -> Result<Self, ZkError> {
        Self::from_biguint(&BigUint::from_bytes_be(bytes))
    }

    fn to_be_bytes32(&self) -> [u8; 32] {
        let bytes = self.into_bigint().to_bytes_be();
        let mut out = [0u8; 32];
        out[32 - bytes.len()..].copy_from_slice(&bytes);
        out
    }

    /// Accepts `0x`-prefixed or bare hex of at most 32 bytes.
    fn from_hex(s: &str) -> Result<Self, ZkError> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        if digits.is_empty() || digits.len() > 64 {
            return Err(ZkError::Encoding(format!("invalid hex field element: {s:?}")));
        }
        let padded = format!("{digits:0>64}");
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(&padded, &mut bytes)
            .map_err(|e| ZkError::Encoding(format!("invalid hex field element: {e}")))?;
        Self::from_be_bytes32(&bytes)
    }

    /// `0x`-prefixed, zero-padded 32-byte hex.
    fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_be_bytes32()))
    }
}

impl FieldExt for Base {
    const NAME: &'static str = "base";
}

impl FieldExt for Scalar {
    const NAME: &'static str = "scalar";
}

impl FieldExt for ProofField {
    const NAME: &'static str = "bn254 coordinate";
}

pub fn scalar_to_base(s: &Scalar) -> Base {
    Base::from_be_bytes_mod_order(&s.into_bigint().to_bytes_be())
}

/// Fails with `FieldMismatch` when `b >= L`.
pub fn base_to_scalar(b: &Base) -> Result<Scalar, ZkError> {
    Scalar::from_biguint(&b.to_biguint())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ff::{One, Zero};
    use proptest::prelude::*;

    const P: &str = "21888242871839275222246405745257275088548364400416034343698204186575808495617";
    const L: &str = "2736030358979909402780800718157159386076813972158567259200215660948447373041";

    #[test]
    fn zero_has_no_inverse() {
        assert_eq!(Base::zero().checked_inverse(), Err(ZkError::NotInvertible));
        assert_eq!(Scalar::zero().checked_inverse(), Err(ZkError::NotInvertible));
        assert_eq!(Base::from(3u64).checked_div(&Base::zero()), Err(ZkError::NotInvertible));
    }

    #[test]
    fn division_multiplies_by_inverse() {
        let six = Base::from(6u64);
        let three = Base::from(3u64);
        assert_eq!(six.checked_div(&three).unwrap(), Base::from(2u64));
    }

    #[test]
    fn construction_reduces_modulo_p() {
        let p = BigUint::parse_bytes(P.as_bytes(), 10).unwrap();
        let p_plus_two = (p + 2u32).to_bytes_be();
        assert_eq!(Base::reduce_be_bytes(&p_plus_two), Base::from(2u64));
    }

    #[test]
    fn decimal_rejects_values_outside_the_field() {
        assert_eq!(Base::from_decimal(P), Err(ZkError::FieldMismatch { field: "base" }));
        assert_eq!(Scalar::from_decimal(L), Err(ZkError::FieldMismatch { field: "scalar" }));
        assert!(matches!(Base::from_decimal("12a"), Err(ZkError::Encoding(_))));
        assert!(matches!(Base::from_decimal("-1"), Err(ZkError::Encoding(_))));
        assert!(matches!(Base::from_decimal(""), Err(ZkError::Encoding(_))));

        let p_minus_one = Base::from_decimal(&(BigUint::parse_bytes(P.as_bytes(), 10).unwrap() - 1u32).to_string()).unwrap();
        assert_eq!(p_minus_one, -Base::one());
    }

    #[test]
    fn decimal_and_hex_forms() {
        assert_eq!(Base::zero().to_decimal(), "0");
        assert_eq!(Base::from(100u64).to_decimal(), "100");
        assert_eq!(Base::from_decimal("0042").unwrap(), Base::from(42u64));

        let x = Base::from(0xabcdu64);
        assert_eq!(x.to_hex(), format!("0x{}abcd", "0".repeat(60)));
        assert_eq!(Base::from_hex("0xabcd").unwrap(), x);
        assert_eq!(Base::from_hex("abcd").unwrap(), x);
        assert!(Base::from_hex("0x").is_err());
        assert!(Base::from_hex(&format!("0x{}", "f".repeat(64))).is_err());
    }

    #[test]
    fn be_bytes_are_fixed_width() {
        let bytes = Base::one().to_be_bytes32();
        assert_eq!(bytes[31], 1);
        assert!(bytes[..31].iter().all(|b| *b == 0));
        assert_eq!(Base::from_be_bytes32(&bytes).unwrap(), Base::one());
        assert_eq!(Base::from_be_bytes32(&[0xff; 32]), Err(ZkError::FieldMismatch { field: "base" }));
    }

    #[test]
    fn crossing_between_fields_is_explicit() {
        let l = Base::from_decimal(L).unwrap();
        assert_eq!(base_to_scalar(&l), Err(ZkError::FieldMismatch { field: "scalar" }));

        let l_minus_one = l - Base::one();
        let s = base_to_scalar(&l_minus_one).unwrap();
        assert_eq!(s, -Scalar::one());
        assert_eq!(scalar_to_base(&s), l_minus_one);
    }

    #[test]
    fn square_roots_are_canonical() {
        assert_eq!(Base::from(4u64).checked_sqrt().unwrap(), Base::from(2u64));
        assert_eq!(Base::zero().checked_sqrt().unwrap(), Base::zero());
        // 5 generates the multiplicative group, so it is a non-residue.
        assert_eq!(Base::from(5u64).checked_sqrt(), Err(ZkError::NoSquareRoot));
    }

    fn base(bytes: [u8; 32]) -> Base {
        Base::reduce_be_bytes(&bytes)
    }

    proptest! {
        #[test]
        fn addition_is_associative(a in any::<[u8; 32]>(), b in any::<[u8; 32]>(), c in any::<[u8; 32]>()) {
            let (a, b, c) = (base(a), base(b), base(c));
            prop_assert_eq!((a + b) + c, a + (b + c));
        }

        #[test]
        fn multiplication_distributes(a in any::<[u8; 32]>(), b in any::<[u8; 32]>(), c in any::<[u8; 32]>()) {
            let (a, b, c) = (base(a), base(b), base(c));
            prop_assert_eq!(a * (b + c), a * b + a * c);
        }

        #[test]
        fn nonzero_elements_invert(a in any::<[u8; 32]>()) {
            let a = base(a);
            prop_assume!(!a.is_zero());
            prop_assert_eq!(a * a.checked_inverse().unwrap(), Base::one());
        }

        #[test]
        fn subtraction_undoes_addition(a in any::<[u8; 32]>(), b in any::<[u8; 32]>()) {
            let (a, b) = (base(a), base(b));
            prop_assert_eq!((a + b) - b, a);
            prop_assert_eq!(a + (-a), Base::zero());
        }

        #[test]
        fn decimal_encoding_is_stable(a in any::<[u8; 32]>()) {
            let a = base(a);
            prop_assert_eq!(Base::from_decimal(&a.to_decimal()).unwrap(), a);
            prop_assert_eq!(Base::from_be_bytes32(&a.to_be_bytes32()).unwrap(), a);
        }
    }
}
