//! Baby Jubjub key pairs: a secret [`Scalar`] and its public point `G·secret`.

use crate::curve::Point;
use crate::error::ZkError;
use crate::field::{FieldExt, Scalar};
use ark_ff::{UniformRand, Zero};
use rand::{CryptoRng, RngCore};
use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct KeyPair {
    pub secret: Scalar,
    pub public: Point,
}

impl KeyPair {
    pub fn from_secret(secret: Scalar) -> Result<Self, ZkError> {
        let public = Point::generator().mul(&secret)?;
        Ok(Self { secret, public })
    }

    /// Samples a non-zero secret.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self, ZkError> {
        loop {
            let secret = Scalar::rand(rng);
            if !secret.is_zero() {
                return Self::from_secret(secret);
            }
        }
    }

    /// Decimal secret, as passed to the circuit's `treasuryPriv` input.
    pub fn secret_decimal(&self) -> String {
        self.secret.to_decimal()
    }
}

// The secret never shows up in logs.
impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public.to_decimal())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn public_key_is_secret_times_generator() {
        let kp = KeyPair::from_secret(Scalar::from(7u64)).unwrap();
        assert_eq!(
            kp.public.to_decimal()[0],
            "17136567613377537256093048180510089265507846305583794083097684103439876474719"
        );
        assert_eq!(kp.secret_decimal(), "7");
    }

    #[test]
    fn generated_keys_are_distinct_and_valid() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let a = KeyPair::generate(&mut rng).unwrap();
        let b = KeyPair::generate(&mut rng).unwrap();
        assert_ne!(a.secret, b.secret);
        assert!(a.public.is_valid());
        assert_eq!(Point::generator().mul(&b.secret).unwrap(), b.public);
    }

    #[test]
    fn debug_output_hides_the_secret() {
        let kp = KeyPair::from_secret(Scalar::from(123456789u64)).unwrap();
        assert!(!format!("{kp:?}").contains("123456789"));
    }
}
