//! snarkjs proof objects and the argument layout of the ledger's Groth16 verifier.
//!
//! snarkjs writes G2 coordinates as `[c0, c1]` while the EVM pairing precompile reads them as
//! `[c1, c0]`, so both pairs of `b` are reversed on the way to the contract. Nothing else moves.

use crate::commitment::{LedgerPoint, decimal_u128};
use crate::curve::Point;
use crate::error::ZkError;
use crate::field::{Base, FieldExt, ProofField};
use serde::{Deserialize, Serialize};

/// `proof.json` as written by `snarkjs groth16 prove` (projective coordinates, decimal strings).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnarkjsProof {
    pub pi_a: Vec<String>,
    pub pi_b: Vec<Vec<String>>,
    pub pi_c: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve: Option<String>,
}

/// Verifier arguments `(a, b, c, input)` with `b` already in contract order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DecimalCalldata", into = "DecimalCalldata")]
pub struct ProofCalldata {
    pub a: [ProofField; 2],
    pub b: [[ProofField; 2]; 2],
    pub c: [ProofField; 2],
    pub input: Vec<Base>,
}

/// Maps a snarkjs proof and its public signals onto the verifier's argument list.
///
/// Every coordinate must be a canonical BN254 base-field element and every signal a canonical
/// scalar-field element; nothing is reduced.
pub fn format(proof: &SnarkjsProof, public_signals: &[String]) -> Result<ProofCalldata, ZkError> {
    let a = g1_affine(&proof.pi_a, "pi_a")?;
    let c = g1_affine(&proof.pi_c, "pi_c")?;

    if proof.pi_b.len() < 2 {
        return Err(ZkError::Encoding(format!("pi_b has {} rows, expected 3", proof.pi_b.len())));
    }
    let row = |i: usize| -> Result<[ProofField; 2], ZkError> {
        match proof.pi_b[i].as_slice() {
            [c0, c1, ..] => Ok([ProofField::from_decimal(c1)?, ProofField::from_decimal(c0)?]),
            _ => Err(ZkError::Encoding(format!("pi_b[{i}] must hold two coordinates"))),
        }
    };
    let b = [row(0)?, row(1)?];

    let input = public_signals
        .iter()
        .map(|s| Base::from_decimal(s))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ProofCalldata { a, b, c, input })
}

fn g1_affine(coords: &[String], name: &str) -> Result<[ProofField; 2], ZkError> {
    match coords {
        [x, y, ..] => Ok([ProofField::from_decimal(x)?, ProofField::from_decimal(y)?]),
        _ => Err(ZkError::Encoding(format!("{name} must hold at least two coordinates"))),
    }
}

fn word<F: FieldExt>(f: &F) -> String {
    format!("\"{}\"", f.to_hex())
}

impl ProofCalldata {
    /// The string `snarkjs zkey export soliditycalldata` prints for the same proof.
    pub fn to_solidity(&self) -> String {
        let input: Vec<String> = self.input.iter().map(word).collect();
        format!(
            "[{}, {}],[[{}, {}],[{}, {}]],[{}, {}],[{}]",
            word(&self.a[0]),
            word(&self.a[1]),
            word(&self.b[0][0]),
            word(&self.b[0][1]),
            word(&self.b[1][0]),
            word(&self.b[1][1]),
            word(&self.c[0]),
            word(&self.c[1]),
            input.join(","),
        )
    }

    /// 32-byte ABI words in argument order: `a`, `b`, `c`, then the inputs.
    pub fn to_words(&self) -> Vec<[u8; 32]> {
        let mut words = Vec::with_capacity(8 + self.input.len());
        words.extend(self.a.iter().map(|f| f.to_be_bytes32()));
        words.extend(self.b.iter().flatten().map(|f| f.to_be_bytes32()));
        words.extend(self.c.iter().map(|f| f.to_be_bytes32()));
        words.extend(self.input.iter().map(|f| f.to_be_bytes32()));
        words
    }
}

/// JSON form: decimal strings throughout.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecimalCalldata {
    pub a: [String; 2],
    pub b: [[String; 2]; 2],
    pub c: [String; 2],
    pub input: Vec<String>,
}

impl From<ProofCalldata> for DecimalCalldata {
    fn from(cd: ProofCalldata) -> Self {
        let pair = |p: &[ProofField; 2]| [p[0].to_decimal(), p[1].to_decimal()];
        Self {
            a: pair(&cd.a),
            b: [pair(&cd.b[0]), pair(&cd.b[1])],
            c: pair(&cd.c),
            input: cd.input.iter().map(|f| f.to_decimal()).collect(),
        }
    }
}

impl TryFrom<DecimalCalldata> for ProofCalldata {
    type Error = ZkError;

    fn try_from(d: DecimalCalldata) -> Result<Self, Self::Error> {
        let pair = |p: &[String; 2]| -> Result<[ProofField; 2], ZkError> {
            Ok([ProofField::from_decimal(&p[0])?, ProofField::from_decimal(&p[1])?])
        };
        Ok(Self {
            a: pair(&d.a)?,
            b: [pair(&d.b[0])?, pair(&d.b[1])?],
            c: pair(&d.c)?,
            input: d.input.iter().map(|s| Base::from_decimal(s)).collect::<Result<_, _>>()?,
        })
    }
}

/// Arguments of the ledger's `withdraw(amount, changeP, changeQ, a, b, c, input)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalCall {
    #[serde(with = "decimal_u128")]
    pub amount: u128,
    #[serde(rename = "changeP")]
    pub change_p: LedgerPoint,
    #[serde(rename = "changeQ")]
    pub change_q: LedgerPoint,
    #[serde(flatten)]
    pub proof: ProofCalldata,
}

impl WithdrawalCall {
    pub fn new(amount: u128, change_p: &Point, change_q: &Point, proof: ProofCalldata) -> Self {
        Self { amount, change_p: change_p.into(), change_q: change_q.into(), proof }
    }
}
