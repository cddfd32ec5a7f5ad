//! Inclusion proofs against the accumulator, and the bagged root.
//!
//! An inclusion proof walks from a node up to the peak of the perfect
//! subtree containing it. The peak it lands on is a member of the
//! accumulator for the proof's MMR size, so verification reproduces an
//! accumulator entry rather than a single global root. The bagged root
//! exists for sealing: a scalar commitment folded from the accumulator.

use serde::{Deserialize, Serialize};

use cairn_core::{bagged_root_fold, interior_hash, Error, Hash, Result};

use crate::index::{index_height, is_valid_size, peaks, pos_height, sibling_offset};
use crate::store::NodeStore;

/// The result of building an inclusion proof: the sibling path, the index
/// of the local peak the path reaches, and that peak's height index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionPath {
    /// Sibling values, lowest first.
    pub path: Vec<Hash>,
    /// Node index of the accumulator peak the path reaches.
    pub local_peak: u64,
    /// Height index of `local_peak`.
    pub peak_height: u64,
}

/// Collect the proof path for the accumulator peak containing node `i` in
/// the MMR of `size` nodes.
///
/// Works for interior nodes as well as leaves, which is what consistency
/// proofs rely on.
pub fn inclusion_proof<S: NodeStore>(size: u64, store: &S, i: u64) -> Result<InclusionPath> {
    if !is_valid_size(size) {
        return Err(Error::InvalidSize(size));
    }
    if i >= size {
        return Err(Error::GetIndexUnavailable(i));
    }

    let mut i = i;
    let mut height = index_height(i);
    let mut path = Vec::new();

    loop {
        let local_peak = i;

        // If the next node up is a parent, i is its right child and the
        // sibling sits the full subtree width to the left; otherwise i is
        // the left child and the sibling is to the right.
        let sibling = if index_height(i + 1) > height {
            let sibling = i - sibling_offset(height);
            i += 1;
            sibling
        } else {
            let sibling = i + sibling_offset(height);
            i += 2 << height;
            sibling
        };

        if sibling >= size {
            return Ok(InclusionPath {
                path,
                local_peak,
                peak_height: height,
            });
        }

        path.push(store.get(sibling)?);
        height += 1;
    }
}

/// Re-hash `leaf` up the proof path, returning whether `root` was reproduced
/// and how many path elements were consumed reaching it.
///
/// The consumed count supports the concatenated paths used by consistency
/// proofs. At each step the parent's 1-based position is the post-increment
/// value of the walk and is committed into the hash.
pub fn verify_inclusion_path(
    size: u64,
    leaf: &Hash,
    i: u64,
    proof: &[Hash],
    root: &Hash,
) -> (bool, usize) {
    if i >= size {
        return (false, 0);
    }

    // Degenerate case: the node is itself a perfect peak.
    if proof.is_empty() && leaf == root {
        return (true, 0);
    }

    let mut pos = i + 1;
    let mut height = pos_height(pos);
    let mut element = *leaf;

    for (used, p) in proof.iter().enumerate() {
        if pos_height(pos + 1) > height {
            // right child; the sibling in the proof is on the left
            pos += 1;
            element = interior_hash(pos, p, &element);
        } else {
            // left child
            pos += 2 << height;
            element = interior_hash(pos, &element, p);
        }

        if &element == root {
            return (true, used + 1);
        }
        height += 1;
    }
    (false, proof.len())
}

/// Re-hash node `i` with value `node` up the whole proof path, returning the
/// root the path commits to.
pub fn included_root(i: u64, node: &Hash, proof: &[Hash]) -> Hash {
    let mut pos = i + 1;
    let mut height = pos_height(pos);
    let mut root = *node;

    for p in proof {
        if pos_height(pos + 1) > height {
            pos += 1;
            root = interior_hash(pos, p, &root);
        } else {
            pos += 2 << height;
            root = interior_hash(pos, &root, p);
        }
        height += 1;
    }
    root
}

/// The accumulator of the MMR of `size` nodes: peak values, highest peak
/// first.
pub fn peak_hashes<S: NodeStore>(store: &S, size: u64) -> Result<Vec<Hash>> {
    if !is_valid_size(size) {
        return Err(Error::InvalidSize(size));
    }
    let mut hashes = Vec::new();
    for pos in peaks(size) {
        hashes.push(store.get(pos - 1)?);
    }
    Ok(hashes)
}

/// The bagged root of the MMR of `size` nodes: the accumulator folded right
/// to left. This is the scalar value bound by seals.
pub fn bagged_root<S: NodeStore>(size: u64, store: &S) -> Result<Hash> {
    if size == 0 || !is_valid_size(size) {
        return Err(Error::InvalidSize(size));
    }
    Ok(bagged_root_fold(&peak_hashes(store, size)?))
}
