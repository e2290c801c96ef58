//! Property-based tests for the record engine and Merkle proofs

mod common;

use std::collections::{BTreeMap, BTreeSet};

use common::{keys, CHEAP_SCRYPT};
use onions_core::hashers::pow_value;
use onions_core::*;
use proptest::prelude::*;

fn arb_subdomains() -> impl Strategy<Value = Vec<Subdomain>> {
    prop::collection::btree_map("[a-z]{1,10}", "[a-z2-7]{16}\\.onion", 0..6).prop_map(
        |m: BTreeMap<String, String>| m.into_iter().map(|(l, d)| Subdomain::new(l, d)).collect(),
    )
}

fn arb_kind() -> impl Strategy<Value = RecordType> {
    prop_oneof![
        Just(RecordType::Record),
        Just(RecordType::Ticket),
        "[A-Za-z]{0,8}".prop_map(|s| RecordType::parse(&s)),
    ]
}

// Round trip: wire JSON reproduces every field, keys and signatures byte for byte
proptest! {
    #[test]
    fn wire_round_trip(
        kind in arb_kind(),
        name in "[a-z0-9]{0,20}\\.tor",
        contact in "[0-9A-F]{0,40}",
        subdomains in arb_subdomains(),
        master_sig in prop::collection::vec(any::<u8>(), 64),
        service_sig in prop::collection::vec(any::<u8>(), 128),
        with_service_key in any::<bool>(),
        rng in any::<u32>(),
        nonce in any::<u32>(),
    ) {
        let mut r = Record::new_draft(kind, name, contact, subdomains, rng, nonce);
        r.master_key = keys().master_public();
        r.master_sig.copy_from_slice(&master_sig);
        r.service_sig.copy_from_slice(&service_sig);
        if with_service_key {
            r.service_key = Some(keys().service_public().expect("service key"));
        }
        let back = Record::from_wire(&r.to_wire());
        prop_assert_eq!(back.as_bytes(true), r.as_bytes(true));
        prop_assert_eq!(back, r);
    }
}

// Malformed input never panics and never yields a complete record by accident
proptest! {
    #[test]
    fn arbitrary_text_never_panics(s in ".{0,200}") {
        if let Ok(r) = Record::from_wire_str(&s) {
            prop_assert!(!r.is_complete());
        }
    }
}

// PoW monotonicity: a harder difficulty strictly shrinks the threshold, and
// anything accepted at d + 1 is accepted at d
proptest! {
    #[test]
    fn pow_threshold_monotonic(d in 0u8..63) {
        prop_assert!(pow_threshold(d + 1) < pow_threshold(d));
    }

    #[test]
    fn pow_acceptance_monotonic(
        scope in prop::collection::vec(any::<u8>(), 0..96),
        d in 0u8..63,
    ) {
        let value = pow_value(&scope, &CHEAP_SCRYPT).expect("pow");
        if value <= pow_threshold(d + 1) {
            prop_assert!(value <= pow_threshold(d));
        }
    }
}

// The nonce occupies exactly the tail of the unsigned canonical bytes
proptest! {
    #[test]
    fn nonce_only_moves_the_tail(a in any::<u32>(), b in any::<u32>(), name in "[a-z]{4,12}\\.tor") {
        let mut r = Record::new_draft(RecordType::Record, name, "", Vec::new(), 0, a);
        let before = r.as_bytes(false);
        r.nonce = b;
        let after = r.as_bytes(false);
        let tail = before.len() - NONCE_LEN;
        prop_assert_eq!(&before[..tail], &after[..tail]);
        prop_assert_eq!(&after[tail..], &b.to_le_bytes()[..]);
    }
}

fn arb_leaves() -> impl Strategy<Value = Vec<(String, Hash256)>> {
    prop::collection::btree_set("[a-z]{1,6}\\.tor", 1..24).prop_flat_map(|names: BTreeSet<String>| {
        let n = names.len();
        (Just(names), prop::collection::vec(prop::array::uniform32(any::<u8>()), n))
    })
    .prop_map(|(names, hashes)| names.into_iter().zip(hashes).collect())
}

// Merkle determinism, sensitivity, inclusion and absence
proptest! {
    #[test]
    fn merkle_root_deterministic(leaves in arb_leaves()) {
        let a = MerkleTree::from_leaves(leaves.clone());
        let b = MerkleTree::from_leaves(leaves);
        prop_assert_eq!(a.root(), b.root());
    }

    #[test]
    fn merkle_root_sensitive(leaves in arb_leaves(), pick in any::<prop::sample::Index>(), bit in 0usize..256) {
        let root = MerkleTree::from_leaves(leaves.clone()).root();
        let mut changed = leaves;
        let i = pick.index(changed.len());
        changed[i].1[bit / 8] ^= 1 << (bit % 8);
        prop_assert_ne!(MerkleTree::from_leaves(changed).root(), root);
    }

    #[test]
    fn every_leaf_has_a_valid_inclusion_proof(leaves in arb_leaves()) {
        let tree = MerkleTree::from_leaves(leaves.clone());
        let root = tree.root();
        for (name, _) in &leaves {
            let proof = tree.proof_for(name);
            prop_assert_eq!(verify_proof(&root, &proof, name, None), Ok(ProofOutcome::Present));
            prop_assert!(verify_root(&root, &proof));
        }
    }

    #[test]
    fn missing_names_have_valid_absence_proofs(leaves in arb_leaves(), query in "[a-z]{1,6}\\.tor") {
        prop_assume!(leaves.iter().all(|(n, _)| *n != query));
        let tree = MerkleTree::from_leaves(leaves);
        let root = tree.root();
        let proof = tree.proof_for(&query);
        prop_assert_eq!(verify_proof(&root, &proof, &query, None), Ok(ProofOutcome::Absent));
        let MerkleProof::Absence(a) = &proof else {
            return Err(TestCaseError::fail("expected an absence proof"));
        };
        if let Some(l) = &a.left {
            prop_assert!(l.name < query);
        }
        if let Some(r) = &a.right {
            prop_assert!(query < r.name);
        }
    }

    #[test]
    fn proofs_do_not_verify_against_other_roots(leaves in arb_leaves(), other in prop::array::uniform32(any::<u8>())) {
        let tree = MerkleTree::from_leaves(leaves.clone());
        prop_assume!(other != tree.root());
        let proof = tree.proof_for(&leaves[0].0);
        prop_assert_eq!(verify_proof(&other, &proof, &leaves[0].0, None), Err(ProofError::RootMismatch));
    }
}
