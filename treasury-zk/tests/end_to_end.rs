//! Deposit → scan → tree → witness, with the treasury key `s = 7`.

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use treasury_zk::calldata::{self, SnarkjsProof, WithdrawalCall};
use treasury_zk::commitment::Commitment;
use treasury_zk::field::{FieldExt, Scalar};
use treasury_zk::keys::KeyPair;
use treasury_zk::merkle::MerkleAccumulator;
use treasury_zk::{ZkError, witness};

#[test]
fn treasury_seven_scenario() {
    let treasury = KeyPair::from_secret(Scalar::from(7u64)).unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(2024);
    let (commitment, _nonce) = Commitment::deposit(&mut rng, &treasury.public, 100).unwrap();

    assert!(commitment.is_owned_by(&Scalar::from(7u64)).unwrap());
    assert!(!commitment.is_owned_by(&Scalar::from(8u64)).unwrap());

    let mut tree = MerkleAccumulator::new(4).unwrap();
    let leaf = commitment.hash().unwrap();
    assert_eq!(tree.insert(leaf).unwrap(), 0);

    let path = tree.path_to(0).unwrap();
    assert_eq!(path.compute_root(&leaf).unwrap(), tree.root());
}

#[test]
fn scan_rebuild_and_build_witness() {
    let treasury = KeyPair::from_secret(Scalar::from(7u64)).unwrap();
    let stranger = KeyPair::from_secret(Scalar::from(8u64)).unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(7);

    // The ledger interleaves deposits for several treasuries.
    let history: Vec<Commitment> = [(&treasury, 40u128), (&stranger, 999), (&treasury, 60), (&stranger, 1)]
        .into_iter()
        .map(|(to, v)| Commitment::deposit(&mut rng, &to.public, v).unwrap().0)
        .collect();

    // Ledger side: an independently built tree over the same emissions.
    let ledger_root = MerkleAccumulator::from_leaves(4, history.iter().map(|c| c.hash().unwrap()))
        .unwrap()
        .root();

    let tree = MerkleAccumulator::from_leaves(4, history.iter().map(|c| c.hash().unwrap())).unwrap();
    tree.check_root(&ledger_root).unwrap();

    let owned: Vec<(u64, Commitment)> = history
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_owned_by(&treasury.secret).unwrap())
        .map(|(i, c)| (i as u64, *c))
        .collect();
    assert_eq!(owned.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![0, 2]);

    let leaves: Vec<Commitment> = owned.iter().map(|(_, c)| *c).collect();
    let indices: Vec<u64> = owned.iter().map(|(i, _)| *i).collect();
    let paths = indices.iter().map(|i| tree.path_to(*i).unwrap()).collect::<Vec<_>>();

    let batch = witness::build(&leaves, &paths, &indices, 5).unwrap();
    assert_eq!(batch.total_value().unwrap(), 100);

    let w = batch.witness(&tree.root(), &treasury.secret);
    assert_eq!(w.v, vec!["40", "60", "0", "0", "0"]);
    assert_eq!(w.leaf_index, vec!["0", "2", "0", "0", "0"]);
    assert_eq!(w.root, tree.root().to_decimal());
    assert_eq!(w.treasury_priv, "7");

    // A stale ledger root stops the flow before any proof is built.
    let stale = MerkleAccumulator::from_leaves(4, history[..3].iter().map(|c| c.hash().unwrap()))
        .unwrap()
        .root();
    assert!(matches!(tree.check_root(&stale), Err(ZkError::RootMismatch { .. })));
}

#[test]
fn proof_to_withdrawal_call() {
    let proof: SnarkjsProof = serde_json::from_str(
        r#"{
            "pi_a": ["1", "2", "1"],
            "pi_b": [["3", "4"], ["5", "6"], ["1", "0"]],
            "pi_c": ["7", "8", "1"],
            "protocol": "groth16",
            "curve": "bn128"
        }"#,
    )
    .unwrap();
    let signals = vec!["9".to_string(), "10".to_string()];
    let cd = calldata::format(&proof, &signals).unwrap();

    let treasury = KeyPair::from_secret(Scalar::from(7u64)).unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(3);
    let (change, _) = Commitment::deposit(&mut rng, &treasury.public, 25).unwrap();

    let call = WithdrawalCall::new(75, change.p(), change.q(), cd);
    let json = serde_json::to_value(&call).unwrap();
    assert_eq!(json["amount"], "75");
    assert_eq!(json["b"][1], serde_json::json!(["6", "5"]));
    assert_eq!(json["input"], serde_json::json!(["9", "10"]));
    assert!(call.change_p.to_point().unwrap() == *change.p());
}
