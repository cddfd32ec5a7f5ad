//! Merkle Mountain Range (MMR) algebra.
//!
//! An MMR is an append-only authenticated structure formed by linking
//! perfect binary subtrees ("mountains") at their peaks. This crate holds
//! the pure algebra of the log:
//!
//! - [`index`] - index/height/peak arithmetic over node counts
//! - [`add`] - the node-adder append loop, expressed against a small
//!   storage trait so the engine that owns the bytes stays elsewhere
//! - [`proof`] - inclusion proofs against the accumulator and the bagged
//!   root used by seals
//! - [`consistency`] - accumulator-based consistency proofs between any
//!   two valid sizes
//!
//! Everything here is deterministic and in-memory; storage failures are the
//! only fallible inputs.
//!
//! # Example
//!
//! ```rust
//! use cairn_core::leaf_hash;
//! use cairn_mmr::{add_hashed_leaf, inclusion_proof, peak_hashes, verify_inclusion_path, MemStore};
//!
//! let mut store = MemStore::new();
//! for i in 0u64..7 {
//!     add_hashed_leaf(&mut store, leaf_hash(&i.to_be_bytes())).unwrap();
//! }
//!
//! let size = store.size();
//! let path = inclusion_proof(size, &store, 0).unwrap();
//! let peaks = peak_hashes(&store, size).unwrap();
//! let root = peaks[0];
//!
//! let leaf = leaf_hash(&0u64.to_be_bytes());
//! let (ok, _) = verify_inclusion_path(size, &leaf, 0, &path.path, &root);
//! assert!(ok);
//! ```

pub mod add;
pub mod bagged;
pub mod consistency;
pub mod index;
pub mod proof;
pub mod store;

#[cfg(test)]
mod proptest;
#[cfg(test)]
pub(crate) mod testdb;

pub use add::add_hashed_leaf;
pub use bagged::{inclusion_proof_bagged, peak_bag_rhs, peaks_lhs, verify_inclusion_bagged};
pub use consistency::{
    check_consistency, consistency_proof, consistent_roots, verify_consistency, ConsistencyProof,
};
pub use index::{
    first_mmr_size, index_height, is_valid_size, leaf_count, leaf_index, leaf_minus_spur_sum,
    mmr_index, peak_index, peaks, peaks_bitmap, pos_height, sibling_offset, spur_height_leaf,
    top_height, top_peak,
};
pub use proof::{
    bagged_root, included_root, inclusion_proof, peak_hashes, verify_inclusion_path, InclusionPath,
};
pub use store::{MemStore, NodeAppender, NodeStore};
