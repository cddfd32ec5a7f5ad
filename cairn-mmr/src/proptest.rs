//! Property-based tests for the MMR algebra.
//!
//! Tests the structural laws of the Merkle Mountain Range under arbitrary
//! append sequences.

use proptest::prelude::*;

use cairn_core::{bagged_root_fold, Hash};

use crate::add::add_hashed_leaf;
use crate::consistency::check_consistency;
use crate::index::{
    index_height, is_valid_size, leaf_count, leaf_minus_spur_sum, mmr_index, peaks, peaks_bitmap,
    spur_height_leaf,
};
use crate::proof::{bagged_root, inclusion_proof, peak_hashes, verify_inclusion_path};
use crate::store::{MemStore, NodeStore};

// ============================================================================
// Arbitrary Implementations
// ============================================================================

/// Generate arbitrary hash values (simulating leaf data).
fn arb_hash() -> impl Strategy<Value = Hash> {
    prop::array::uniform32(any::<u8>()).prop_map(Hash::from_bytes)
}

/// Generate a vector of arbitrary hashes.
fn arb_hashes(max_count: usize) -> impl Strategy<Value = Vec<Hash>> {
    prop::collection::vec(arb_hash(), 0..max_count)
}

fn build(leaves: &[Hash]) -> MemStore {
    let mut store = MemStore::new();
    for leaf in leaves {
        add_hashed_leaf(&mut store, *leaf).expect("append should succeed");
    }
    store
}

// ============================================================================
// Property Tests: Sizes and Counts
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Appending n leaves yields leaf_count n and size 2n - popcount(n)
    #[test]
    fn prop_append_size_law(leaves in arb_hashes(200)) {
        let store = build(&leaves);
        let n = leaves.len() as u64;
        prop_assert_eq!(leaf_count(store.size()), n);
        prop_assert_eq!(store.size(), 2 * n - n.count_ones() as u64);
    }

    /// Every size reached by appending is valid, and the bitmap equals the
    /// leaf count
    #[test]
    fn prop_reached_sizes_valid(n in 1u64..300) {
        let mut store = MemStore::new();
        for e in 0..n {
            add_hashed_leaf(&mut store, Hash::from_bytes([e as u8; 32])).expect("append should succeed");
            prop_assert!(is_valid_size(store.size()));
            prop_assert_eq!(peaks_bitmap(store.size()), e + 1);
        }
    }

    /// Peaks are strictly ascending in position and strictly descending in
    /// height
    #[test]
    fn prop_peaks_ordered(n in 1u64..400) {
        let size = mmr_index(n - 1) + spur_height_leaf(n - 1) + 1;
        let ps = peaks(size);
        prop_assert_eq!(ps.len(), n.count_ones() as usize);
        for w in ps.windows(2) {
            prop_assert!(w[0] < w[1]);
            prop_assert!(index_height(w[0] - 1) > index_height(w[1] - 1));
        }
    }

    /// The peak stack length law: leaves minus spurs accumulates to the
    /// popcount
    #[test]
    fn prop_leaf_minus_spur_sum(e in 0u64..100_000) {
        prop_assert_eq!(leaf_minus_spur_sum(e), e.count_ones() as u64);
    }
}

// ============================================================================
// Property Tests: Inclusion Proofs
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Every appended leaf has a valid inclusion proof against its
    /// accumulator peak
    #[test]
    fn prop_all_leaves_provable(leaves in arb_hashes(100)) {
        prop_assume!(!leaves.is_empty());
        let store = build(&leaves);
        let size = store.size();

        for (e, leaf) in leaves.iter().enumerate() {
            let i = mmr_index(e as u64);
            let ip = inclusion_proof(size, &store, i).expect("proof should succeed");
            let peak = store.get(ip.local_peak).expect("peak should exist");
            let (ok, used) = verify_inclusion_path(size, leaf, i, &ip.path, &peak);
            prop_assert!(ok);
            prop_assert_eq!(used, ip.path.len());
        }
    }

    /// Historic inclusion remains provable as the log grows
    #[test]
    fn prop_inclusion_survives_growth(n in 2u64..80, extra in 1u64..40) {
        let mut store = MemStore::new();
        for e in 0..n + extra {
            add_hashed_leaf(&mut store, Hash::from_bytes([(e % 251) as u8; 32]))
                .expect("append should succeed");
        }

        // prove the first n leaves at every size that contains them
        for e in 0..n {
            let i = mmr_index(e);
            let leaf = store.get(i).expect("leaf should exist");
            for j in e..n + extra {
                let size = mmr_index(j) + spur_height_leaf(j) + 1;
                let ip = inclusion_proof(size, &store, i).expect("proof should succeed");
                let peak = store.get(ip.local_peak).expect("peak should exist");
                let (ok, _) = verify_inclusion_path(size, &leaf, i, &ip.path, &peak);
                prop_assert!(ok);
            }
        }
    }

    /// A tampered sibling breaks verification
    #[test]
    fn prop_tampered_sibling_fails(leaves in arb_hashes(60), tamper in any::<[u8; 32]>()) {
        prop_assume!(leaves.len() >= 4);
        let store = build(&leaves);
        let size = store.size();

        let ip = inclusion_proof(size, &store, 0).expect("proof should succeed");
        prop_assume!(!ip.path.is_empty());
        prop_assume!(ip.path[0] != Hash::from_bytes(tamper));

        let mut bad = ip.path.clone();
        bad[0] = Hash::from_bytes(tamper);
        let peak = store.get(ip.local_peak).expect("peak should exist");
        let (ok, _) = verify_inclusion_path(size, &leaves[0], 0, &bad, &peak);
        prop_assert!(!ok);
    }
}

// ============================================================================
// Property Tests: Consistency and Roots
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    /// Any earlier reached size is provably consistent with any later one
    #[test]
    fn prop_consistency_between_reached_sizes(n in 2u64..60, a in 1u64..60, b in 1u64..60) {
        let a = a.min(n);
        let b = b.min(n);
        prop_assume!(a <= b);

        let mut store = MemStore::new();
        for e in 0..n {
            add_hashed_leaf(&mut store, Hash::from_bytes([(e % 251) as u8; 32]))
                .expect("append should succeed");
        }

        let size_a = mmr_index(a - 1) + spur_height_leaf(a - 1) + 1;
        let size_b = mmr_index(b - 1) + spur_height_leaf(b - 1) + 1;

        let peaks_a = peak_hashes(&store, size_a).expect("peaks should exist");
        check_consistency(&store, size_a, size_b, &peaks_a).expect("consistency should hold");
    }

    /// The bagged root is the fold of the accumulator, and it changes when
    /// the log grows
    #[test]
    fn prop_bagged_root_is_accumulator_fold(leaves in arb_hashes(80)) {
        prop_assume!(leaves.len() >= 2);
        let store = build(&leaves);
        let size = store.size();

        let acc = peak_hashes(&store, size).expect("peaks should exist");
        prop_assert_eq!(bagged_root(size, &store).expect("root should exist"), bagged_root_fold(&acc));

        let earlier = mmr_index(leaves.len() as u64 - 2)
            + spur_height_leaf(leaves.len() as u64 - 2) + 1;
        prop_assert_ne!(
            bagged_root(size, &store).expect("root should exist"),
            bagged_root(earlier, &store).expect("root should exist")
        );
    }

    /// Roots are deterministic in the append sequence and sensitive to order
    #[test]
    fn prop_root_deterministic_and_order_sensitive(leaves in arb_hashes(40)) {
        prop_assume!(leaves.len() >= 2);
        prop_assume!(leaves.first() != leaves.last());

        let s1 = build(&leaves);
        let s2 = build(&leaves);
        prop_assert_eq!(
            bagged_root(s1.size(), &s1).expect("root should exist"),
            bagged_root(s2.size(), &s2).expect("root should exist")
        );

        let reversed: Vec<Hash> = leaves.iter().rev().copied().collect();
        let s3 = build(&reversed);
        prop_assert_ne!(
            bagged_root(s1.size(), &s1).expect("root should exist"),
            bagged_root(s3.size(), &s3).expect("root should exist")
        );
    }
}
