//! Accumulator-based consistency proofs.
//!
//! A consistency proof from `MMR(a)` to `MMR(b)` carries one inclusion path
//! per peak of the earlier state. Each path proves that the old peak is
//! covered by exactly one peak of the later state; together they witness
//! that the later log is an untouched extension of the earlier one.
//!
//! ```text
//!     MMR(A):[7, 8]      MMR(B):[7, 10, 11]
//!  2       7                7
//!        /   \            /   \
//!  1    3     6          3     6    10
//!      / \  /  \        / \  /  \   / \
//!  0  1   2 4   5 8    1   2 4   5 8   9 11
//!
//!     Path MMR(A) -> MMR(B)
//!     7 in MMR(B) -> []
//!     8 in MMR(B) -> [9]
//! ```

use serde::{Deserialize, Serialize};

use cairn_core::{Error, Hash, Result};

use crate::index::{is_valid_size, peaks};
use crate::proof::{included_root, inclusion_proof, peak_hashes};
use crate::store::NodeStore;

/// A proof that `MMR(mmr_size_a)` is a prefix of `MMR(mmr_size_b)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyProof {
    /// The earlier, trusted, size.
    pub mmr_size_a: u64,
    /// The later size being checked.
    pub mmr_size_b: u64,
    /// One inclusion path within `MMR(mmr_size_b)` per peak of
    /// `MMR(mmr_size_a)`, highest peak first.
    pub path: Vec<Vec<Hash>>,
}

/// Build the consistency proof between two valid sizes from one store.
pub fn consistency_proof<S: NodeStore>(
    store: &S,
    mmr_size_a: u64,
    mmr_size_b: u64,
) -> Result<ConsistencyProof> {
    if !is_valid_size(mmr_size_a) || mmr_size_a == 0 {
        return Err(Error::InvalidSize(mmr_size_a));
    }
    if !is_valid_size(mmr_size_b) || mmr_size_b < mmr_size_a {
        return Err(Error::InvalidSize(mmr_size_b));
    }

    let mut proof = ConsistencyProof {
        mmr_size_a,
        mmr_size_b,
        path: Vec::new(),
    };
    for peak in peaks(mmr_size_a) {
        proof
            .path
            .push(inclusion_proof(mmr_size_b, store, peak - 1)?.path);
    }
    Ok(proof)
}

/// Compute the roots proven by a consistency proof, given the trusted
/// accumulator for the earlier size.
///
/// Many old peaks fold into the same covering peak, and that peak changes
/// with low frequency, so successive duplicates are collapsed.
pub fn consistent_roots(
    mmr_size_a: u64,
    accumulator_a: &[Hash],
    paths: &[Vec<Hash>],
) -> Result<Vec<Hash>> {
    let from_peaks = peaks(mmr_size_a);

    if from_peaks.len() != paths.len() || from_peaks.len() != accumulator_a.len() {
        return Err(Error::AccumulatorProofLen {
            expected: from_peaks.len(),
            got: paths.len(),
        });
    }

    let mut roots: Vec<Hash> = Vec::new();
    for (k, value) in accumulator_a.iter().enumerate() {
        let root = included_root(from_peaks[k] - 1, value, &paths[k]);
        if roots.last() == Some(&root) {
            continue;
        }
        roots.push(root);
    }
    Ok(roots)
}

/// Verify that the proven roots all fold into the later accumulator.
///
/// Both lists are in descending height order, so a single monotonic scan of
/// `peaks_b` suffices. Returns the proven roots on success.
pub fn verify_consistency(
    proof: &ConsistencyProof,
    peaks_a: &[Hash],
    peaks_b: &[Hash],
) -> Result<Vec<Hash>> {
    let proven = consistent_roots(proof.mmr_size_a, peaks_a, &proof.path)?;

    let mut ib = 0;
    for root in &proven {
        if peaks_b.get(ib) == Some(root) {
            continue;
        }
        // Not the current peak; it must match the next one down.
        ib += 1;
        if peaks_b.get(ib) != Some(root) {
            return Err(Error::ConsistencyCheck);
        }
    }
    Ok(proven)
}

/// Prove and verify in one step against a single store holding the later
/// state. `peaks_a` must come from a trusted source, typically a signed
/// state; everything else is (re)computed from the store.
pub fn check_consistency<S: NodeStore>(
    store: &S,
    mmr_size_a: u64,
    mmr_size_b: u64,
    peaks_a: &[Hash],
) -> Result<Vec<Hash>> {
    let proof = consistency_proof(store, mmr_size_a, mmr_size_b)?;
    let peaks_b = peak_hashes(store, mmr_size_b)?;
    verify_consistency(&proof, peaks_a, &peaks_b)
}
