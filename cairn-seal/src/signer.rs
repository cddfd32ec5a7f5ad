//! The root signer.

use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};

use cairn_core::{Error, Result};

use crate::codec::{build_protected_header, build_sign1, encode_state, SealEnvelope, SealerKey};
use crate::state::MmrState;

/// Signs MMR states into detached-root COSE_Sign1 envelopes.
///
/// The signing key never leaves this struct; the verified read path only
/// ever sees the public [`SealerKey`].
pub struct RootSigner {
    issuer: String,
    kid: String,
    key: SigningKey,
}

impl RootSigner {
    /// Create a signer for the given issuer and key identifier.
    pub fn new(issuer: impl Into<String>, kid: impl Into<String>, key: SigningKey) -> Self {
        Self {
            issuer: issuer.into(),
            kid: kid.into(),
            key,
        }
    }

    /// The public identity embedded in every seal this signer produces.
    pub fn public_key(&self) -> SealerKey {
        SealerKey::from_verifying_key(&self.key.verifying_key().clone(), self.kid.clone())
    }

    /// Sign `state` for `subject` (conventionally the tenant massif blob
    /// path) and return the serialized envelope.
    ///
    /// The signature is computed over the payload including the root; the
    /// root is then stripped from the persisted payload so that verifiers
    /// are forced to recompute it from the log.
    pub fn sign1(&self, subject: &str, state: &MmrState) -> Result<Vec<u8>> {
        if state.root.is_none() {
            return Err(Error::SealMalformed("cannot seal a state without a root".into()));
        }

        let protected = build_protected_header(&self.issuer, subject, &self.public_key());
        let full_payload = encode_state(state)?;
        let mut sign1 = build_sign1(protected, full_payload, |data| {
            let sig: Signature = self.key.sign(data);
            sig.to_bytes().to_vec()
        });

        // Detach the root so the persisted payload cannot be verified
        // without the log that produces it.
        let stripped = MmrState {
            root: None,
            ..state.clone()
        };
        sign1.payload = Some(encode_state(&stripped)?);

        Ok(SealEnvelope::from_sign1(sign1)?.as_bytes().to_vec())
    }
}

impl std::fmt::Debug for RootSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootSigner")
            .field("issuer", &self.issuer)
            .field("kid", &self.kid)
            .field("key", &"[redacted]")
            .finish()
    }
}
