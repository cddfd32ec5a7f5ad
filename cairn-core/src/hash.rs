//! The 32-byte node value and the hashing rules of the log.
//!
//! Every node in the log, leaf or interior, is a SHA-256 output. Interior
//! nodes commit to their own 1-based position: the position is mixed into the
//! hash as 8 big-endian bytes ahead of the child values. A node value is
//! therefore bound to its location in the tree and cannot be replayed at
//! another position.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// A 32-byte node value.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash([u8; 32]);

impl Hash {
    /// The zero hash (used as a sentinel).
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create a hash from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Create a hash from a byte slice, which must be exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::LogValueBadSize(bytes.len()))?;
        Ok(Self(arr))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Create from hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| Error::InvalidHash(e.to_string()))?;
        Self::from_slice(&bytes).map_err(|_| Error::InvalidHash(format!("{} hex bytes", bytes.len())))
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Check if this is the zero hash.
    pub fn is_zero(&self) -> bool {
        self == &Self::ZERO
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Hash arbitrary leaf content.
pub fn leaf_hash(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    Hash(hasher.finalize().into())
}

/// Hash two values to produce a parent without a position commitment.
///
/// This is the combining step of the bagged root fold. Interior nodes of the
/// MMR proper use [`interior_hash`] instead.
pub fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    Hash(hasher.finalize().into())
}

/// Hash an interior node, committing to its 1-based position.
///
/// The position is written as 8 big-endian bytes ahead of the children. The
/// width and byte order are load bearing: every proof in every existing log
/// depends on them.
pub fn interior_hash(parent_pos: u64, left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(parent_pos.to_be_bytes());
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    Hash(hasher.finalize().into())
}

/// Fold an accumulator (peaks listed highest first) into the scalar bagged
/// root, right to left.
///
/// Returns the zero hash for an empty accumulator.
pub fn bagged_root_fold(peaks: &[Hash]) -> Hash {
    let mut iter = peaks.iter().rev();
    let Some(first) = iter.next() else {
        return Hash::ZERO;
    };
    let mut root = *first;
    for peak in iter {
        root = hash_pair(peak, &root);
    }
    root
}
