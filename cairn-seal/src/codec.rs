//! The seal envelope codec.
//!
//! Payloads are deterministic CBOR: definite lengths, integer map keys
//! written in canonical order, so two honest signers of identical state
//! produce identical bytes. The envelope is COSE_Sign1 (tag 18) with ES256,
//! and the protected header carries a CWT claims map whose `cnf` claim
//! embeds the signer's EC public key.

use ciborium::value::Value;
use coset::iana::EnumI64;
use coset::{
    iana, CborSerializable, CoseSign1, CoseSign1Builder, HeaderBuilder, Label,
    TaggedCborSerializable,
};
use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use p256::EncodedPoint;

use cairn_core::{Error, Hash, Result};

use crate::state::MmrState;

/// CBOR keys of the `MmrState` payload map.
const STATE_KEY_MMR_SIZE: u64 = 1;
const STATE_KEY_ROOT: u64 = 2;
const STATE_KEY_TIMESTAMP: u64 = 3;

/// Protected header label for the CWT claims map (RFC 9597).
const HEADER_LABEL_CWT_CLAIMS: i64 = 15;

/// CWT claim keys.
const CWT_KEY_ISSUER: i64 = 1;
const CWT_KEY_SUBJECT: i64 = 2;
const CWT_KEY_CNF: i64 = 8;

/// Confirmation method: a full COSE_Key.
const CNF_KEY_COSE_KEY: i64 = 1;

/// COSE_Key parameter labels.
const COSE_KEY_KTY: i64 = 1;
const COSE_KEY_KID: i64 = 2;
const COSE_KEY_ALG: i64 = 3;
const COSE_KEY_CRV: i64 = -1;
const COSE_KEY_X: i64 = -2;
const COSE_KEY_Y: i64 = -3;

/// The signer identity embedded in a seal: curve name plus affine
/// coordinates. Two keys match only when curve and both coordinates agree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealerKey {
    /// Curve name, `"P-256"`.
    pub curve: String,
    /// Big-endian affine x coordinate.
    pub x: Vec<u8>,
    /// Big-endian affine y coordinate.
    pub y: Vec<u8>,
    /// Key identifier, informational.
    pub kid: String,
}

impl SealerKey {
    /// Capture a verifying key's identity.
    pub fn from_verifying_key(key: &VerifyingKey, kid: impl Into<String>) -> Self {
        let point = key.to_encoded_point(false);
        Self {
            curve: "P-256".to_string(),
            x: point.x().map(|b| b.to_vec()).unwrap_or_default(),
            y: point.y().map(|b| b.to_vec()).unwrap_or_default(),
            kid: kid.into(),
        }
    }

    /// Reconstruct the verifying key from the embedded coordinates.
    pub fn to_verifying_key(&self) -> Result<VerifyingKey> {
        if self.curve != "P-256" {
            return Err(Error::SealMalformed(format!(
                "curve not supported: {}",
                self.curve
            )));
        }
        if self.x.len() != 32 || self.y.len() != 32 {
            return Err(Error::SealMalformed("bad EC coordinate length".into()));
        }
        let point = EncodedPoint::from_affine_coordinates(
            self.x.as_slice().into(),
            self.y.as_slice().into(),
            false,
        );
        VerifyingKey::from_encoded_point(&point)
            .map_err(|e| Error::SealMalformed(format!("bad EC point: {}", e)))
    }

    /// True when `other` names the same key: same curve, same coordinates.
    /// The kid is informational and does not participate.
    pub fn matches(&self, other: &SealerKey) -> bool {
        self.curve == other.curve && self.x == other.x && self.y == other.y
    }
}

/// A parsed COSE_Sign1 seal envelope, retaining the exact bytes read from
/// storage so a replica can re-persist them unchanged.
#[derive(Debug, Clone)]
pub struct SealEnvelope {
    bytes: Vec<u8>,
    sign1: CoseSign1,
}

impl SealEnvelope {
    /// Parse an envelope from its serialized form (tagged or bare).
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let sign1 = CoseSign1::from_tagged_slice(data)
            .or_else(|_| CoseSign1::from_slice(data))
            .map_err(|e| Error::SealMalformed(e.to_string()))?;
        Ok(Self {
            bytes: data.to_vec(),
            sign1,
        })
    }

    /// The serialized envelope, byte for byte as read.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The persisted (rootless) payload.
    pub fn payload(&self) -> Result<&[u8]> {
        self.sign1
            .payload
            .as_deref()
            .ok_or_else(|| Error::SealMalformed("envelope payload is detached".into()))
    }

    /// Extract the signer identity from the protected header's CWT claims.
    pub fn signer_key(&self) -> Result<SealerKey> {
        let claims = header_value(&self.sign1, HEADER_LABEL_CWT_CLAIMS)
            .ok_or_else(|| Error::SealMalformed("no CWT claims in protected header".into()))?;
        let cnf = map_get(claims, CWT_KEY_CNF)
            .ok_or_else(|| Error::SealMalformed("no cnf claim".into()))?;
        let key = map_get(cnf, CNF_KEY_COSE_KEY)
            .ok_or_else(|| Error::SealMalformed("no COSE key in cnf claim".into()))?;

        let curve = map_get(key, COSE_KEY_CRV)
            .and_then(Value::as_text)
            .ok_or_else(|| Error::SealMalformed("no curve in cnf key".into()))?;
        let x = map_get(key, COSE_KEY_X)
            .and_then(Value::as_bytes)
            .ok_or_else(|| Error::SealMalformed("no x coordinate in cnf key".into()))?;
        let y = map_get(key, COSE_KEY_Y)
            .and_then(Value::as_bytes)
            .ok_or_else(|| Error::SealMalformed("no y coordinate in cnf key".into()))?;
        let kid = map_get(key, COSE_KEY_KID)
            .and_then(Value::as_text)
            .unwrap_or_default();

        Ok(SealerKey {
            curve: curve.to_string(),
            x: x.clone(),
            y: y.clone(),
            kid: kid.to_string(),
        })
    }

    pub(crate) fn from_sign1(sign1: CoseSign1) -> Result<Self> {
        let bytes = sign1
            .clone()
            .to_tagged_vec()
            .map_err(|e| Error::SealMalformed(e.to_string()))?;
        Ok(Self { bytes, sign1 })
    }

    pub(crate) fn sign1(&self) -> &CoseSign1 {
        &self.sign1
    }
}

/// The codec seam between the verified reader and the envelope format.
pub trait SealCodec {
    /// Decode an envelope and the unverified state it carries. The decoded
    /// state has no root: it must be recomputed from the log.
    fn decode_signed_root(&self, data: &[u8]) -> Result<(SealEnvelope, MmrState)>;

    /// Verify an envelope against a state whose root has been recomputed
    /// and substituted.
    ///
    /// If `trusted` is supplied, the embedded signer key must match it
    /// before the signature is even examined.
    fn verify_signed_root(
        &self,
        envelope: &SealEnvelope,
        state: &MmrState,
        trusted: Option<&SealerKey>,
    ) -> Result<()>;
}

/// The COSE_Sign1 / deterministic-CBOR implementation of [`SealCodec`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CoseSealCodec;

impl CoseSealCodec {
    /// Create the codec.
    pub fn new() -> Self {
        Self
    }
}

impl SealCodec for CoseSealCodec {
    fn decode_signed_root(&self, data: &[u8]) -> Result<(SealEnvelope, MmrState)> {
        let envelope = SealEnvelope::from_slice(data)?;
        let state = decode_state(envelope.payload()?)?;
        Ok((envelope, state))
    }

    fn verify_signed_root(
        &self,
        envelope: &SealEnvelope,
        state: &MmrState,
        trusted: Option<&SealerKey>,
    ) -> Result<()> {
        let embedded = envelope.signer_key()?;
        if let Some(trusted) = trusted {
            if !embedded.matches(trusted) {
                return Err(Error::RemoteSealKeyMatchFailed);
            }
        }

        if state.root.is_none() {
            return Err(Error::SealMalformed(
                "state root must be recomputed from the log before verification".into(),
            ));
        }
        let payload = encode_state(state)?;

        let verifying_key = embedded.to_verifying_key()?;
        let mut sign1 = envelope.sign1().clone();
        sign1.payload = Some(payload);
        sign1
            .verify_signature(b"", |sig, data| {
                let sig = Signature::from_slice(sig).map_err(|_| Error::Verification)?;
                verifying_key
                    .verify(data, &sig)
                    .map_err(|_| Error::Verification)
            })
            .map_err(|_| Error::Verification)
    }
}

/// Encode an `MmrState` as the deterministic CBOR payload map. The root is
/// included only when present; a detached payload simply omits key 2.
pub(crate) fn encode_state(state: &MmrState) -> Result<Vec<u8>> {
    let mut entries = vec![(
        Value::from(STATE_KEY_MMR_SIZE),
        Value::from(state.mmr_size),
    )];
    if let Some(root) = &state.root {
        entries.push((Value::from(STATE_KEY_ROOT), Value::Bytes(root.as_bytes().to_vec())));
    }
    entries.push((Value::from(STATE_KEY_TIMESTAMP), Value::from(state.timestamp)));

    let mut buf = Vec::new();
    ciborium::ser::into_writer(&Value::Map(entries), &mut buf)
        .map_err(|e| Error::SealMalformed(e.to_string()))?;
    Ok(buf)
}

/// Decode the CBOR payload map back into an `MmrState`.
pub(crate) fn decode_state(payload: &[u8]) -> Result<MmrState> {
    let value: Value = ciborium::de::from_reader(payload)
        .map_err(|e| Error::SealMalformed(e.to_string()))?;
    let map = value
        .as_map()
        .ok_or_else(|| Error::SealMalformed("state payload is not a map".into()))?;

    let mut state = MmrState::default();
    for (k, v) in map {
        let Some(key) = k.as_integer().and_then(|i| u64::try_from(i).ok()) else {
            continue;
        };
        match key {
            STATE_KEY_MMR_SIZE => {
                state.mmr_size = v
                    .as_integer()
                    .and_then(|i| u64::try_from(i).ok())
                    .ok_or_else(|| Error::SealMalformed("bad mmr size".into()))?;
            }
            STATE_KEY_ROOT => {
                let bytes = v
                    .as_bytes()
                    .ok_or_else(|| Error::SealMalformed("bad root".into()))?;
                state.root = Some(Hash::from_slice(bytes)?);
            }
            STATE_KEY_TIMESTAMP => {
                state.timestamp = v
                    .as_integer()
                    .and_then(|i| i64::try_from(i).ok())
                    .ok_or_else(|| Error::SealMalformed("bad timestamp".into()))?;
            }
            _ => {}
        }
    }
    Ok(state)
}

/// Build the protected header for a new seal.
pub(crate) fn build_protected_header(
    issuer: &str,
    subject: &str,
    signer: &SealerKey,
) -> coset::Header {
    let cose_key = Value::Map(vec![
        (Value::from(COSE_KEY_KTY), Value::Text("EC".to_string())),
        (Value::from(COSE_KEY_KID), Value::Text(signer.kid.clone())),
        (
            Value::from(COSE_KEY_ALG),
            Value::from(iana::Algorithm::ES256.to_i64()),
        ),
        (Value::from(COSE_KEY_CRV), Value::Text(signer.curve.clone())),
        (Value::from(COSE_KEY_X), Value::Bytes(signer.x.clone())),
        (Value::from(COSE_KEY_Y), Value::Bytes(signer.y.clone())),
    ]);
    let claims = Value::Map(vec![
        (Value::from(CWT_KEY_ISSUER), Value::Text(issuer.to_string())),
        (Value::from(CWT_KEY_SUBJECT), Value::Text(subject.to_string())),
        (
            Value::from(CWT_KEY_CNF),
            Value::Map(vec![(Value::from(CNF_KEY_COSE_KEY), cose_key)]),
        ),
    ]);

    HeaderBuilder::new()
        .algorithm(iana::Algorithm::ES256)
        .value(HEADER_LABEL_CWT_CLAIMS, claims)
        .build()
}

pub(crate) fn build_sign1(
    protected: coset::Header,
    payload: Vec<u8>,
    sign: impl FnOnce(&[u8]) -> Vec<u8>,
) -> CoseSign1 {
    CoseSign1Builder::new()
        .protected(protected)
        .payload(payload)
        .create_signature(b"", sign)
        .build()
}

fn header_value<'a>(sign1: &'a CoseSign1, label: i64) -> Option<&'a Value> {
    sign1
        .protected
        .header
        .rest
        .iter()
        .find(|(l, _)| matches!(l, Label::Int(i) if *i == label))
        .map(|(_, v)| v)
}

fn map_get(value: &Value, key: i64) -> Option<&Value> {
    value.as_map()?.iter().find_map(|(k, v)| {
        let k = k.as_integer().and_then(|i| i64::try_from(i).ok())?;
        (k == key).then_some(v)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::leaf_hash;

    #[test]
    fn test_state_payload_deterministic() {
        let state = MmrState {
            mmr_size: 11,
            root: Some(leaf_hash(b"root")),
            timestamp: 1_698_342_521,
        };
        assert_eq!(encode_state(&state).unwrap(), encode_state(&state).unwrap());
    }

    #[test]
    fn test_state_roundtrip_without_root() {
        let state = MmrState {
            mmr_size: 26,
            root: None,
            timestamp: 1234,
        };
        let payload = encode_state(&state).unwrap();
        let back = decode_state(&payload).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_root_presence_changes_payload() {
        let stripped = MmrState {
            mmr_size: 26,
            root: None,
            timestamp: 1234,
        };
        let full = MmrState {
            root: Some(leaf_hash(b"root")),
            ..stripped.clone()
        };
        assert_ne!(encode_state(&stripped).unwrap(), encode_state(&full).unwrap());
    }
}
