//! Cairn Core - fundamental types for the cairn verifiable log.
//!
//! This crate provides the small set of primitives shared by every layer of
//! the log:
//!
//! - [`hash`] - the 32-byte node value, SHA-256 helpers and the
//!   position-bound interior hash used by the MMR
//! - [`error`] - the shared error type for the whole workspace
//!
//! # Example
//!
//! ```rust
//! use cairn_core::{interior_hash, leaf_hash};
//!
//! let left = leaf_hash(b"entry 0");
//! let right = leaf_hash(b"entry 1");
//!
//! // The parent of the first two leaves sits at position 3 (1-based) and
//! // its value commits to that position.
//! let parent = interior_hash(3, &left, &right);
//! assert_ne!(parent, interior_hash(4, &left, &right));
//! ```

pub mod error;
pub mod hash;

pub use error::{Error, Result};
pub use hash::{bagged_root_fold, hash_pair, interior_hash, leaf_hash, Hash};
