//! The local reader and the verified read path.
//!
//! [`LocalReader`] composes the directory cache, the seal codec and the
//! MMR algebra: it loads a massif, verifies the massif data against its
//! seal, extends trust over any unsealed suffix with a consistency proof,
//! and optionally proves consistency with a state the caller already
//! trusts. Only after all of that does the caller get a
//! [`VerifiedContext`] to read from.

use tracing::{debug, warn};

use cairn_core::{Error, Result};
use cairn_mmr::{bagged_root, check_consistency, peak_hashes};
use cairn_seal::{MmrState, SealCodec, SealedState};

use crate::context::MassifContext;
use crate::dircache::LogDirCache;
use crate::options::VerifyOptions;

/// Strategy for obtaining the signed state for `(tenant, massif)`.
///
/// The default strategy reads the tenant's local seal files; an auditor
/// replicating a remote log injects one that fetches the remote seal.
pub trait SealGetter {
    /// The latest signed state for the identified massif.
    fn get_signed_root(&self, tenant_or_path: &str, massif_index: u64) -> Result<SealedState>;
}

/// A massif whose contents have been verified against a seal.
#[derive(Debug, Clone)]
pub struct VerifiedContext {
    /// The massif the verification ran over.
    pub massif: MassifContext,
    /// The seal the verification was anchored to.
    pub seal: SealedState,
    /// The verified head state: the full extent of the massif, with the
    /// root recomputed locally and proven consistent with the seal.
    pub state: MmrState,
}

/// Reads massifs and seals from local directories and produces verified
/// contexts.
pub struct LocalReader {
    cache: LogDirCache,
    codec: Box<dyn SealCodec>,
}

impl LocalReader {
    /// A reader over `cache`, decoding and checking seals with `codec`.
    pub fn new(cache: LogDirCache, codec: Box<dyn SealCodec>) -> Self {
        Self { cache, codec }
    }

    /// The directory cache backing this reader.
    pub fn cache(&self) -> &LogDirCache {
        &self.cache
    }

    /// Read the massif identified by a tenant identity (replica mode) or
    /// local path (direct mode), without verification.
    pub fn get_massif(&self, tenant_or_path: &str, massif_index: u64) -> Result<MassifContext> {
        let dir = self.cache.resolve_massif_dir(tenant_or_path)?;
        let mut mc = self.cache.read_massif(&dir, massif_index)?;
        mc.tenant_identity = tenant_or_path.to_string();
        Ok(mc)
    }

    /// Read the most recent massif of a log.
    pub fn get_head_massif(&self, tenant_or_path: &str) -> Result<MassifContext> {
        let dir = self.cache.resolve_massif_dir(tenant_or_path)?;
        self.cache.find_massif_files(&dir)?;
        let head = self
            .cache
            .entry(&dir)
            .and_then(|e| e.head_massif_index)
            .ok_or(Error::MassifNotFound(0))?;
        let mut mc = self.cache.read_massif(&dir, head as u64)?;
        mc.tenant_identity = tenant_or_path.to_string();
        Ok(mc)
    }

    /// Read the oldest massif of a log.
    pub fn get_first_massif(&self, tenant_or_path: &str) -> Result<MassifContext> {
        let dir = self.cache.resolve_massif_dir(tenant_or_path)?;
        self.cache.find_massif_files(&dir)?;
        let first = self
            .cache
            .entry(&dir)
            .and_then(|e| e.first_massif_index)
            .ok_or(Error::MassifNotFound(0))?;
        let mut mc = self.cache.read_massif(&dir, first as u64)?;
        mc.tenant_identity = tenant_or_path.to_string();
        Ok(mc)
    }

    /// Read and decode the seal for the identified massif.
    pub fn get_seal(&self, tenant_or_path: &str, massif_index: u64) -> Result<SealedState> {
        let dir = self.cache.resolve_seal_dir(tenant_or_path)?;
        let data = self.cache.read_seal_bytes(&dir, massif_index)?;
        let (envelope, state) = self.codec.decode_signed_root(&data)?;
        Ok(SealedState { envelope, state })
    }

    /// Load massif `massif_index` and verify it against its seal.
    ///
    /// See [`LocalReader::verify_context`] for the verification contract.
    pub fn get_verified_context(
        &self,
        tenant_or_path: &str,
        massif_index: u64,
        opts: VerifyOptions<'_>,
    ) -> Result<VerifiedContext> {
        let mc = self.get_massif(tenant_or_path, massif_index)?;
        self.verify_context(mc, opts)
    }

    /// Load the head massif and verify it against its seal.
    pub fn get_head_verified_context(
        &self,
        tenant_or_path: &str,
        opts: VerifyOptions<'_>,
    ) -> Result<VerifiedContext> {
        let mc = self.get_head_massif(tenant_or_path)?;
        self.verify_context(mc, opts)
    }

    /// Verify a loaded massif against its signed state.
    ///
    /// In order:
    ///
    /// 1. Obtain the signed state from the configured seal getter.
    /// 2. Require the sealed size to fall within this massif's range.
    /// 3. Recompute the root at the sealed size from the local data,
    ///    substitute it into the state, and verify the signature. When a
    ///    trusted sealer key is configured it must match the embedded key
    ///    before any signature work.
    /// 4. If the massif extends beyond the sealed size, prove the
    ///    extension consistent with the sealed accumulator.
    /// 5. If the caller supplied a trusted base state, prove the whole
    ///    loaded range consistent with it.
    pub fn verify_context(
        &self,
        mc: MassifContext,
        opts: VerifyOptions<'_>,
    ) -> Result<VerifiedContext> {
        let massif_index = mc.start.massif_index as u64;
        let sealed = match opts.seal_getter {
            Some(getter) => getter.get_signed_root(&mc.tenant_identity, massif_index)?,
            None => self.get_seal(&mc.tenant_identity, massif_index)?,
        };

        let first_index = mc.start.first_index;
        let range_count = mc.range_count();
        let sealed_size = sealed.state.mmr_size;
        if sealed_size < first_index || sealed_size > range_count {
            return Err(Error::SealNotConsistentWithMassif {
                size: sealed_size,
                first_index,
                range_count,
            });
        }

        // The seal's root travels detached; recompute it from the log so a
        // forged root cannot be slipped past us, then check the signature.
        let sealed_root = bagged_root(sealed_size, &mc)?;
        let full_state = MmrState {
            root: Some(sealed_root),
            ..sealed.state.clone()
        };
        self.codec.verify_signed_root(
            &sealed.envelope,
            &full_state,
            opts.trusted_sealer_key.as_ref(),
        )?;

        // Extend trust over the unsealed suffix: every sealed peak must
        // fold into the head accumulator.
        if sealed_size < range_count {
            let sealed_peaks = peak_hashes(&mc, sealed_size)?;
            check_consistency(&mc, sealed_size, range_count, &sealed_peaks).map_err(|e| {
                warn!(
                    tenant = %mc.tenant_identity,
                    massif_index,
                    sealed_size,
                    range_count,
                    "unsealed extension is inconsistent with the seal"
                );
                as_inconsistent(e, "the log extension does not fold into the sealed accumulator")
            })?;
        }
        let head_root = bagged_root(range_count, &mc)?;

        if let Some(base) = &opts.trusted_base_state {
            verify_against_base_state(&mc, base, range_count)?;
        }

        debug!(
            tenant = %mc.tenant_identity,
            massif_index,
            sealed_size,
            range_count,
            "massif verified"
        );

        let timestamp = sealed.state.timestamp;
        Ok(VerifiedContext {
            massif: mc,
            seal: sealed,
            state: MmrState {
                mmr_size: range_count,
                root: Some(head_root),
                timestamp,
            },
        })
    }
}

impl SealGetter for LocalReader {
    fn get_signed_root(&self, tenant_or_path: &str, massif_index: u64) -> Result<SealedState> {
        self.get_seal(tenant_or_path, massif_index)
    }
}

/// Check the loaded log against a state the caller trusted previously: the
/// root recomputed at the trusted size must equal the trusted root, and
/// the trusted accumulator must fold into the loaded head.
fn verify_against_base_state(
    mc: &MassifContext,
    base: &MmrState,
    range_count: u64,
) -> Result<()> {
    let Some(trusted_root) = &base.root else {
        return Err(Error::InconsistentState(
            "the trusted base state carries no root".into(),
        ));
    };
    if base.mmr_size > range_count {
        return Err(Error::InconsistentState(format!(
            "the log is behind the trusted base state: {} < {}",
            range_count, base.mmr_size
        )));
    }

    let local_root = bagged_root(base.mmr_size, mc)?;
    if local_root != *trusted_root {
        return Err(Error::InconsistentState(format!(
            "the log no longer reproduces the trusted root at size {}",
            base.mmr_size
        )));
    }

    let base_peaks = peak_hashes(mc, base.mmr_size)?;
    check_consistency(mc, base.mmr_size, range_count, &base_peaks)
        .map_err(|e| as_inconsistent(e, "the log is inconsistent with the trusted base state"))?;
    Ok(())
}

fn as_inconsistent(e: Error, context: &str) -> Error {
    match e {
        Error::ConsistencyCheck => Error::InconsistentState(context.to_string()),
        other => other,
    }
}
