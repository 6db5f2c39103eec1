//! Groth16 over BN254: snarkjs JSON interop and client-side verification.
//!
//! The withdrawal proof is produced by snarkjs, but it is checked here with arkworks before
//! anything is sent to the ledger. A proof that fails this check must not be submitted.
//!
//! snarkjs JSON stores points in projective form with decimal coordinates. G2 coordinates are
//! `[c0, c1]`, the same order as `Fq2::new(c0, c1)`.

use crate::calldata::SnarkjsProof;
use crate::error::ZkError;
use crate::field::{Base, FieldExt, ProofField};
use ark_bn254::{Bn254, Fq2, G1Affine, G2Affine};
use ark_groth16::{Groth16, Proof, VerifyingKey, prepare_verifying_key};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use serde::{Deserialize, Serialize};

/// `verification_key.json` as exported by `snarkjs zkey export verificationkey`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnarkjsVerifyingKey {
    #[serde(default = "groth16_protocol")]
    pub protocol: String,
    #[serde(default = "bn128_curve")]
    pub curve: String,
    #[serde(rename = "nPublic")]
    pub n_public: usize,
    pub vk_alpha_1: Vec<String>,
    pub vk_beta_2: Vec<Vec<String>>,
    pub vk_gamma_2: Vec<Vec<String>>,
    pub vk_delta_2: Vec<Vec<String>>,
    #[serde(rename = "IC")]
    pub ic: Vec<Vec<String>>,
}

fn groth16_protocol() -> String {
    "groth16".to_string()
}

fn bn128_curve() -> String {
    "bn128".to_string()
}

fn coord(s: &str) -> Result<ProofField, ZkError> {
    ProofField::from_decimal(s)
}

fn checked_g1(p: G1Affine) -> Result<G1Affine, ZkError> {
    if !p.is_on_curve() || !p.is_in_correct_subgroup_assuming_on_curve() {
        return Err(ZkError::InvalidPoint);
    }
    Ok(p)
}

fn checked_g2(p: G2Affine) -> Result<G2Affine, ZkError> {
    if !p.is_on_curve() || !p.is_in_correct_subgroup_assuming_on_curve() {
        return Err(ZkError::InvalidPoint);
    }
    Ok(p)
}

/// `[x, y, z]` with `z` either `"1"` (affine) or `"0"` (identity).
pub fn parse_g1(v: &[String]) -> Result<G1Affine, ZkError> {
    match v {
        [_, _, z] if z == "0" => Ok(G1Affine::identity()),
        [x, y, z] if z == "1" => checked_g1(G1Affine::new_unchecked(coord(x)?, coord(y)?)),
        [x, y] => checked_g1(G1Affine::new_unchecked(coord(x)?, coord(y)?)),
        _ => Err(ZkError::Encoding(format!("G1 point must be [x, y, 1] or [x, y, 0], got {v:?}"))),
    }
}

fn parse_fq2(v: &[String]) -> Result<Fq2, ZkError> {
    match v {
        [c0, c1] => Ok(Fq2::new(coord(c0)?, coord(c1)?)),
        _ => Err(ZkError::Encoding(format!("Fq2 element must have two coordinates, got {v:?}"))),
    }
}

/// `[[x0, x1], [y0, y1], [z0, z1]]` with `z` either `[1, 0]` or `[0, 0]`.
pub fn parse_g2(v: &[Vec<String>]) -> Result<G2Affine, ZkError> {
    let is = |z: &[String], c0: &str| z.len() == 2 && z[0] == c0 && z[1] == "0";
    match v {
        [_, _, z] if is(z, "0") => Ok(G2Affine::identity()),
        [x, y, z] if is(z, "1") => checked_g2(G2Affine::new_unchecked(parse_fq2(x)?, parse_fq2(y)?)),
        [x, y] => checked_g2(G2Affine::new_unchecked(parse_fq2(x)?, parse_fq2(y)?)),
        _ => Err(ZkError::Encoding("G2 point must be [[x0, x1], [y0, y1], [1, 0]]".into())),
    }
}

fn g1_json(p: &G1Affine) -> Vec<String> {
    if p.infinity {
        return vec!["0".into(), "1".into(), "0".into()];
    }
    vec![p.x.to_decimal(), p.y.to_decimal(), "1".into()]
}

fn g2_json(p: &G2Affine) -> Vec<Vec<String>> {
    if p.infinity {
        return vec![
            vec!["0".into(), "0".into()],
            vec!["1".into(), "0".into()],
            vec!["0".into(), "0".into()],
        ];
    }
    vec![
        vec![p.x.c0.to_decimal(), p.x.c1.to_decimal()],
        vec![p.y.c0.to_decimal(), p.y.c1.to_decimal()],
        vec!["1".into(), "0".into()],
    ]
}

impl SnarkjsProof {
    pub fn to_ark(&self) -> Result<Proof<Bn254>, ZkError> {
        Ok(Proof { a: parse_g1(&self.pi_a)?, b: parse_g2(&self.pi_b)?, c: parse_g1(&self.pi_c)? })
    }

    pub fn from_ark(proof: &Proof<Bn254>) -> Self {
        Self {
            pi_a: g1_json(&proof.a),
            pi_b: g2_json(&proof.b),
            pi_c: g1_json(&proof.c),
            protocol: Some(groth16_protocol()),
            curve: Some(bn128_curve()),
        }
    }
}

impl SnarkjsVerifyingKey {
    pub fn to_ark(&self) -> Result<VerifyingKey<Bn254>, ZkError> {
        if self.ic.len() != self.n_public + 1 {
            return Err(ZkError::Encoding(format!(
                "verifying key has {} IC points for {} public inputs",
                self.ic.len(),
                self.n_public
            )));
        }
        Ok(VerifyingKey {
            alpha_g1: parse_g1(&self.vk_alpha_1)?,
            beta_g2: parse_g2(&self.vk_beta_2)?,
            gamma_g2: parse_g2(&self.vk_gamma_2)?,
            delta_g2: parse_g2(&self.vk_delta_2)?,
            gamma_abc_g1: self.ic.iter().map(|p| parse_g1(p)).collect::<Result<_, _>>()?,
        })
    }

    pub fn from_ark(vk: &VerifyingKey<Bn254>) -> Self {
        Self {
            protocol: groth16_protocol(),
            curve: bn128_curve(),
            n_public: vk.gamma_abc_g1.len().saturating_sub(1),
            vk_alpha_1: g1_json(&vk.alpha_g1),
            vk_beta_2: g2_json(&vk.beta_g2),
            vk_gamma_2: g2_json(&vk.gamma_g2),
            vk_delta_2: g2_json(&vk.delta_g2),
            ic: vk.gamma_abc_g1.iter().map(g1_json).collect(),
        }
    }
}

/// Verify a proof against its public inputs.
pub fn verify_proof(
    vk: &VerifyingKey<Bn254>,
    proof: &Proof<Bn254>,
    public_inputs: &[Base],
) -> Result<(), ZkError> {
    if public_inputs.len() + 1 != vk.gamma_abc_g1.len() {
        return Err(ZkError::Encoding(format!(
            "expected {} public inputs, got {}",
            vk.gamma_abc_g1.len().saturating_sub(1),
            public_inputs.len()
        )));
    }
    let pvk = prepare_verifying_key(vk);
    let ok = Groth16::<Bn254>::verify_proof(&pvk, proof, public_inputs)
        .map_err(|e| ZkError::Ark(format!("{e}")))?;
    if !ok {
        return Err(ZkError::VerificationFailed);
    }
    Ok(())
}

/// Verify a snarkjs proof with decimal public signals, as returned by `groth16 fullprove`.
pub fn verify_snarkjs(
    vk: &SnarkjsVerifyingKey,
    proof: &SnarkjsProof,
    public_signals: &[String],
) -> Result<(), ZkError> {
    let inputs = public_signals
        .iter()
        .map(|s| Base::from_decimal(s))
        .collect::<Result<Vec<_>, _>>()?;
    verify_proof(&vk.to_ark()?, &proof.to_ark()?, &inputs)
}

pub fn serialize_vk(vk: &VerifyingKey<Bn254>) -> Result<Vec<u8>, ZkError> {
    let mut out = Vec::new();
    vk.serialize_compressed(&mut out)
        .map_err(|e| ZkError::Serialization(format!("{e}")))?;
    Ok(out)
}

pub fn deserialize_vk(bytes: &[u8]) -> Result<VerifyingKey<Bn254>, ZkError> {
    VerifyingKey::<Bn254>::deserialize_compressed(bytes)
        .map_err(|e| ZkError::Serialization(format!("{e}")))
}

pub fn serialize_proof(proof: &Proof<Bn254>) -> Result<Vec<u8>, ZkError> {
    let mut out = Vec::new();
    proof
        .serialize_compressed(&mut out)
        .map_err(|e| ZkError::Serialization(format!("{e}")))?;
    Ok(out)
}

pub fn deserialize_proof(bytes: &[u8]) -> Result<Proof<Bn254>, ZkError> {
    Proof::<Bn254>::deserialize_compressed(bytes)
        .map_err(|e| ZkError::Serialization(format!("{e}")))
}
