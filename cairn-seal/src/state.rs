//! The MMR state bound by a seal.

use cairn_core::Hash;
use serde::{Deserialize, Serialize};

use crate::codec::SealEnvelope;

/// An MMR state as bound by a signed root.
///
/// All subsequent states whose size is greater can efficiently reproduce
/// this state's root, so old seals remain usable to verify old receipts
/// forever.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MmrState {
    /// The size of the mmr. The size defines the peaks and hence the root.
    pub mmr_size: u64,
    /// The bagged root at `mmr_size`. `None` on states decoded from a
    /// persisted seal: the root is detached and must be recomputed from the
    /// log before the signature can be checked.
    pub root: Option<Hash>,
    /// Unix seconds at the time the root was signed. Allows the same root
    /// to be re-signed.
    pub timestamp: i64,
}

impl MmrState {
    /// A state for `mmr_size` with the given root, stamped now.
    pub fn new(mmr_size: u64, root: Hash) -> Self {
        Self {
            mmr_size,
            root: Some(root),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    /// Replace the timestamp.
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// A decoded seal: the envelope plus the state it claims, with the root
/// still detached. Nothing in here is verified.
#[derive(Debug, Clone)]
pub struct SealedState {
    /// The COSE_Sign1 envelope as read from storage.
    pub envelope: SealEnvelope,
    /// The unverified state carried in the envelope payload (`root` is
    /// `None`).
    pub state: MmrState,
}
