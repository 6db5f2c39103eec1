//! Deposit commitments `(P, Q, v)`.
//!
//! A contributor with nonce key `(c, P = G·c)` addresses a deposit to a treasury public key `T`
//! by publishing `Q = T·c`. The treasury, holding `t` with `T = G·t`, recognises the deposit
//! because `P·t = G·c·t = T·c = Q`. Nobody else can link `Q` to `T`.

use crate::curve::Point;
use crate::error::ZkError;
use crate::field::{Base, FieldExt, Scalar};
use crate::hash::poseidon;
use crate::keys::KeyPair;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Commitment {
    #[serde(rename = "P")]
    p: Point,
    #[serde(rename = "Q")]
    q: Point,
    #[serde(with = "decimal_u128")]
    v: u128,
}

impl Commitment {
    pub fn new(p: Point, q: Point, v: u128) -> Self {
        Self { p, q, v }
    }

    /// `P = contributor_pub`, `Q = treasury_pub · contributor_priv`.
    pub fn from_keys(
        treasury_pub: &Point,
        contributor_priv: &Scalar,
        contributor_pub: &Point,
        v: u128,
    ) -> Result<Self, ZkError> {
        let q = treasury_pub.mul(contributor_priv)?;
        Ok(Self { p: *contributor_pub, q, v })
    }

    /// Creates a fresh deposit to `treasury_pub`, returning the commitment and the one-time
    /// contributor key it was built with.
    pub fn deposit<R: RngCore + CryptoRng>(
        rng: &mut R,
        treasury_pub: &Point,
        v: u128,
    ) -> Result<(Self, KeyPair), ZkError> {
        let nonce = KeyPair::generate(rng)?;
        let commitment = Self::from_keys(treasury_pub, &nonce.secret, &nonce.public, v)?;
        Ok((commitment, nonce))
    }

    pub fn p(&self) -> &Point {
        &self.p
    }

    pub fn q(&self) -> &Point {
        &self.q
    }

    pub fn v(&self) -> u128 {
        self.v
    }

    /// True iff `P · treasury_priv == Q`.
    pub fn is_owned_by(&self, treasury_priv: &Scalar) -> Result<bool, ZkError> {
        Ok(self.p.mul(treasury_priv)? == self.q)
    }

    /// `Poseidon(P.x, P.y, Q.x, Q.y, v)`, the value stored in the Merkle tree.
    pub fn hash(&self) -> Result<Base, ZkError> {
        poseidon(&[self.p.x(), self.p.y(), self.q.x(), self.q.y(), Base::from(self.v)])
    }

    pub fn to_ledger_args(&self) -> LedgerCommitment {
        LedgerCommitment {
            p: LedgerPoint::from(&self.p),
            q: LedgerPoint::from(&self.q),
            v: u128_to_be_bytes32(self.v),
        }
    }

    /// Decodes a commitment emitted by the ledger. Both points are checked for curve membership.
    pub fn from_ledger(raw: &LedgerCommitment) -> Result<Self, ZkError> {
        Ok(Self {
            p: raw.p.to_point()?,
            q: raw.q.to_point()?,
            v: u128_from_be_bytes32(&raw.v)?,
        })
    }

    /// Decimal `(P, Q, v)` as the circuit's witness expects them.
    pub fn to_witness_form(&self) -> ([String; 2], [String; 2], String) {
        (self.p.to_decimal(), self.q.to_decimal(), self.v.to_string())
    }
}

/// A point as 32-byte big-endian coordinates, the layout of the ledger's calls and events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerPoint {
    #[serde(with = "hex_bytes32")]
    pub x: [u8; 32],
    #[serde(with = "hex_bytes32")]
    pub y: [u8; 32],
}

impl LedgerPoint {
    pub fn to_point(&self) -> Result<Point, ZkError> {
        Point::from_coordinates_be(&self.x, &self.y)
    }
}

impl From<&Point> for LedgerPoint {
    fn from(p: &Point) -> Self {
        Self { x: p.x().to_be_bytes32(), y: p.y().to_be_bytes32() }
    }
}

/// Arguments of the ledger's deposit call, and the payload of its commitment event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerCommitment {
    #[serde(rename = "P")]
    pub p: LedgerPoint,
    #[serde(rename = "Q")]
    pub q: LedgerPoint,
    #[serde(with = "hex_bytes32")]
    pub v: [u8; 32],
}

pub fn u128_to_be_bytes32(v: u128) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[16..].copy_from_slice(&v.to_be_bytes());
    out
}

pub fn u128_from_be_bytes32(bytes: &[u8; 32]) -> Result<u128, ZkError> {
    if bytes[..16].iter().any(|b| *b != 0) {
        return Err(ZkError::ValueOverflow);
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&bytes[16..]);
    Ok(u128::from_be_bytes(low))
}

/// Serde adapter: `u128` as a decimal string, since JSON numbers lose precision past 2^53.
pub mod decimal_u128 {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(v: &u128, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&v.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u128, D::Error> {
        let s = String::deserialize(d)?;
        s.parse::<u128>().map_err(|e| D::Error::custom(format!("invalid value {s:?}: {e}")))
    }
}

/// Serde adapter: `[u8; 32]` as `0x`-prefixed hex.
pub mod hex_bytes32 {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(d)?;
        let mut out = [0u8; 32];
        hex::decode_to_slice(s.strip_prefix("0x").unwrap_or(&s), &mut out)
            .map_err(|e| D::Error::custom(format!("expected 32 bytes of hex: {e}")))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn treasury() -> KeyPair {
        KeyPair::from_secret(Scalar::from(7u64)).unwrap()
    }

    fn sample(v: u128) -> Commitment {
        let mut rng = ChaCha20Rng::seed_from_u64(9);
        Commitment::deposit(&mut rng, &treasury().public, v).unwrap().0
    }

    #[test]
    fn treasury_recognises_its_deposits() {
        let c = sample(100);
        assert!(c.is_owned_by(&Scalar::from(7u64)).unwrap());
        assert!(!c.is_owned_by(&Scalar::from(8u64)).unwrap());
    }

    #[test]
    fn from_keys_uses_the_shared_point() {
        let contributor = KeyPair::from_secret(Scalar::from(11u64)).unwrap();
        let c = Commitment::from_keys(&treasury().public, &contributor.secret, &contributor.public, 5)
            .unwrap();
        assert_eq!(c.p(), &contributor.public);
        assert_eq!(*c.q(), contributor.public.mul(&treasury().secret).unwrap());
        assert_eq!(c.v(), 5);
    }

    #[test]
    fn perturbed_commitments_are_not_owned() {
        let c = sample(100);
        let secret = Scalar::from(7u64);

        // Swap each point for another valid one in turn.
        let other = Point::generator();
        assert!(!Commitment::new(other, *c.q(), c.v()).is_owned_by(&secret).unwrap());
        assert!(!Commitment::new(*c.p(), other, c.v()).is_owned_by(&secret).unwrap());
        assert!(!Commitment::new(-*c.p(), *c.q(), c.v()).is_owned_by(&secret).unwrap());
        assert!(!Commitment::new(*c.p(), -*c.q(), c.v()).is_owned_by(&secret).unwrap());
    }

    #[test]
    fn hash_binds_every_field() {
        let c = sample(100);
        let h = c.hash().unwrap();
        assert_eq!(h, c.hash().unwrap());
        assert_ne!(h, Commitment::new(*c.p(), *c.q(), 101).hash().unwrap());
        assert_ne!(h, Commitment::new(*c.q(), *c.p(), 100).hash().unwrap());
    }

    #[test]
    fn ledger_encoding_is_fixed_width_and_validated() {
        let c = sample(u128::MAX);
        let raw = c.to_ledger_args();
        assert_eq!(raw.p.x, c.p().x().to_be_bytes32());
        assert_eq!(&raw.v[..16], &[0u8; 16]);
        assert_eq!(Commitment::from_ledger(&raw).unwrap(), c);

        let mut off_curve = raw;
        off_curve.q.y[31] ^= 1;
        assert_eq!(Commitment::from_ledger(&off_curve), Err(ZkError::InvalidPoint));

        let mut non_canonical = raw;
        non_canonical.p.x = [0xff; 32];
        assert!(matches!(Commitment::from_ledger(&non_canonical), Err(ZkError::FieldMismatch { .. })));

        let mut too_big = raw;
        too_big.v[0] = 1;
        assert_eq!(Commitment::from_ledger(&too_big), Err(ZkError::ValueOverflow));
    }

    #[test]
    fn json_form_uses_hex_points_and_decimal_value() {
        let c = sample(100);
        let json = serde_json::to_value(c).unwrap();
        assert_eq!(json["v"], "100");
        assert_eq!(json["P"]["x"], c.p().x().to_hex());
        assert_eq!(serde_json::from_value::<Commitment>(json).unwrap(), c);

        let ledger_json = serde_json::to_string(&c.to_ledger_args()).unwrap();
        let back: LedgerCommitment = serde_json::from_str(&ledger_json).unwrap();
        assert_eq!(back, c.to_ledger_args());
    }

    #[test]
    fn witness_form_is_decimal() {
        let c = sample(42);
        let (p, q, v) = c.to_witness_form();
        assert_eq!(p, c.p().to_decimal());
        assert_eq!(q, c.q().to_decimal());
        assert_eq!(v, "42");
    }
}
