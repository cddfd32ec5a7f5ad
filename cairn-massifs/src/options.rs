//! Reader configuration.

use std::path::PathBuf;

use cairn_seal::{MmrState, SealerKey};

use crate::reader::SealGetter;

/// Options governing how massif and seal directories are resolved and
/// loaded. Held by the directory cache and shared by every reader using
/// that cache.
#[derive(Debug, Clone, Default)]
pub struct ReaderOptions {
    /// Root for replica-mode path resolution. When unset the reader is in
    /// direct-path mode and tenant arguments are taken to be local
    /// directories or files.
    pub replica_dir: Option<PathBuf>,

    /// When set, any massif file whose header height disagrees is
    /// rejected.
    pub require_massif_height: Option<u8>,

    /// Skip building the random-access peak map on read. Only log builders
    /// should set this; without the map the context cannot compute roots
    /// at sizes whose peaks live in earlier massifs.
    pub no_get_root_support: bool,
}

impl ReaderOptions {
    /// Default options: direct-path mode, any height, peak map built.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve tenants beneath a local replica of the remote blob layout.
    pub fn with_replica_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.replica_dir = Some(dir.into());
        self
    }

    /// Require every massif header to carry this height.
    pub fn with_require_massif_height(mut self, height: u8) -> Self {
        self.require_massif_height = Some(height);
        self
    }

    /// Skip the random-access peak map (builders only).
    pub fn without_get_root_support(mut self) -> Self {
        self.no_get_root_support = true;
        self
    }
}

/// Per-call options for the verified read path.
#[derive(Default)]
pub struct VerifyOptions<'a> {
    /// When set, the seal's embedded signing key must match this key. The
    /// check happens before any signature verification.
    pub trusted_sealer_key: Option<SealerKey>,

    /// A previously known-good state for this tenant. The verified read
    /// proves the loaded log consistent with it, detecting divergence
    /// between what was trusted before and what the log now claims.
    pub trusted_base_state: Option<MmrState>,

    /// Strategy for obtaining the signed state for `(tenant, massif)`.
    /// Defaults to reading the tenant's seal files through the reader's
    /// own cache.
    pub seal_getter: Option<&'a dyn SealGetter>,
}

impl<'a> VerifyOptions<'a> {
    /// Default verification: local seal files, no pinned key, no base
    /// state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the sealer public key.
    pub fn with_trusted_sealer_key(mut self, key: SealerKey) -> Self {
        self.trusted_sealer_key = Some(key);
        self
    }

    /// Require consistency with a previously trusted state.
    pub fn with_trusted_base_state(mut self, state: MmrState) -> Self {
        self.trusted_base_state = Some(state);
        self
    }

    /// Obtain seals through `getter` instead of the local seal files.
    pub fn with_seal_getter(mut self, getter: &'a dyn SealGetter) -> Self {
        self.seal_getter = Some(getter);
        self
    }
}
