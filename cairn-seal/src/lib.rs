//! Signed root seals for the cairn verifiable log.
//!
//! A seal binds a detached ECDSA signature to an MMR state
//! `{ size, root, timestamp }`. The envelope is COSE_Sign1 over a
//! deterministic CBOR payload, and the signer's public key travels in the
//! protected header so verification is self-contained given a set of
//! trusted keys.
//!
//! The root is *detached*: the signature is computed over the state with
//! the root present, then the root is stripped from the persisted payload.
//! A verifier must recompute the root from the log itself and substitute it
//! back before checking the signature, so a seal can never be verified
//! against a forged root without a log that produces that root.
//!
//! - [`state`] - `MmrState` and `SealedState`
//! - [`codec`] - the `SealCodec` seam and the COSE implementation
//! - [`signer`] - `RootSigner`, producing detached-root envelopes

pub mod codec;
pub mod signer;
pub mod state;

pub use codec::{CoseSealCodec, SealCodec, SealEnvelope, SealerKey};
pub use signer::RootSigner;
pub use state::{MmrState, SealedState};
