//! Inclusion proofs against the bagged root.
//!
//! Seals bind the scalar bagged root, not the accumulator, so a receipt
//! checked against a seal needs a proof that reaches the bagged root: the
//! local path to the node's peak, then the fold of the peaks to its right,
//! then the peaks to its left. The split points are pure arithmetic over
//! `(index, size)`, so the proof travels as one flat list.

use cairn_core::{bagged_root_fold, hash_pair, interior_hash, Hash, Result};

use crate::index::{peaks, pos_height, sibling_offset};
use crate::proof::inclusion_proof;
use crate::store::NodeStore;

/// The fold of the peaks strictly right of `local_peak_pos`, or `None`
/// when it is the rightmost peak.
pub fn peak_bag_rhs<S: NodeStore>(
    store: &S,
    size: u64,
    local_peak_pos: u64,
) -> Result<Option<Hash>> {
    let mut rhs = Vec::new();
    for pos in peaks(size).into_iter().filter(|&p| p > local_peak_pos) {
        rhs.push(store.get(pos - 1)?);
    }
    if rhs.is_empty() {
        return Ok(None);
    }
    Ok(Some(bagged_root_fold(&rhs)))
}

/// The values of the peaks strictly left of `local_peak_pos`, highest peak
/// first.
pub fn peaks_lhs<S: NodeStore>(store: &S, size: u64, local_peak_pos: u64) -> Result<Vec<Hash>> {
    let mut lhs = Vec::new();
    for pos in peaks(size).into_iter().filter(|&p| p < local_peak_pos) {
        lhs.push(store.get(pos - 1)?);
    }
    Ok(lhs)
}

/// A proof for node `i` that reaches the bagged root of `MMR(size)`: the
/// local sibling path, then the right-hand bag (when one exists), then the
/// left-hand peaks nearest first.
///
/// Empty exactly when the MMR is the single node being proven.
pub fn inclusion_proof_bagged<S: NodeStore>(size: u64, store: &S, i: u64) -> Result<Vec<Hash>> {
    let ip = inclusion_proof(size, store, i)?;
    let local_peak_pos = ip.local_peak + 1;

    let mut proof = ip.path;
    if let Some(rhs) = peak_bag_rhs(store, size, local_peak_pos)? {
        proof.push(rhs);
    }
    for value in peaks_lhs(store, size, local_peak_pos)?.into_iter().rev() {
        proof.push(value);
    }
    Ok(proof)
}

/// Re-hash `node` at index `i` through a bagged proof and compare against
/// the bagged root.
///
/// The walk re-derives the same split the prover used: siblings combine
/// with position-bound hashes until the local peak, the right-hand bag
/// joins on the right, and each left-hand peak folds on from the left.
pub fn verify_inclusion_bagged(size: u64, node: &Hash, i: u64, proof: &[Hash], root: &Hash) -> bool {
    if i >= size {
        return false;
    }

    let mut pos = i + 1;
    let mut height = pos_height(pos);
    let mut value = *node;
    let mut used = 0;

    loop {
        let (sibling, parent, at_right_child) = if pos_height(pos + 1) > height {
            (pos - sibling_offset(height), pos + 1, true)
        } else {
            (pos + sibling_offset(height), pos + (2 << height), false)
        };
        if sibling > size {
            break;
        }
        let Some(p) = proof.get(used) else {
            return false;
        };
        value = if at_right_child {
            interior_hash(parent, p, &value)
        } else {
            interior_hash(parent, &value, p)
        };
        pos = parent;
        used += 1;
        height += 1;
    }

    let all_peaks = peaks(size);
    let Some(local) = all_peaks.iter().position(|&p| p == pos) else {
        return false;
    };

    if local < all_peaks.len() - 1 {
        let Some(rhs) = proof.get(used) else {
            return false;
        };
        value = hash_pair(&value, rhs);
        used += 1;
    }
    for _ in 0..local {
        let Some(lhs) = proof.get(used) else {
            return false;
        };
        value = hash_pair(lhs, &value);
        used += 1;
    }

    used == proof.len() && value == *root
}
