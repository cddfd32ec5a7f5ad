//! Installing verified remote content into a local replica.
//!
//! The massif bytes land before the seal bytes. A failure between the two
//! writes leaves the log newer than the seal; the next verified read
//! detects that through the seal-window check and re-installs. Nothing
//! here is transactional on purpose: both files are content addressed by
//! massif index and safe to rewrite.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use cairn_core::{Error, Result};

use crate::paths::{massif_file_name, replica_relative_massif_dir, replica_relative_seal_dir, seal_file_name};
use crate::reader::{LocalReader, VerifiedContext};

/// Opens replica files for writing. The caller chooses the semantics;
/// [`FsWriteOpener`] replaces content wholesale, which is always safe
/// because installs only ever happen with fully verified data.
pub trait WriteAppendOpener {
    /// Open `path` for writing, creating it if absent.
    fn open_write(&self, path: &Path) -> Result<Box<dyn Write>>;
}

/// Filesystem-backed [`WriteAppendOpener`] that replaces file contents.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsWriteOpener;

impl WriteAppendOpener for FsWriteOpener {
    fn open_write(&self, path: &Path) -> Result<Box<dyn Write>> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Box::new(file))
    }
}

impl LocalReader {
    /// True when the reader resolves tenants beneath a local replica root.
    pub fn in_replica_mode(&self) -> bool {
        self.cache().options().replica_dir.is_some()
    }

    /// The configured replica root, if any.
    pub fn replica_dir(&self) -> Option<&Path> {
        self.cache().options().replica_dir.as_deref()
    }

    /// The local replica path of a tenant's massif file.
    pub fn massif_local_path(&self, tenant: &str, massif_index: u64) -> Result<PathBuf> {
        let root = self.replica_root()?;
        Ok(root
            .join(replica_relative_massif_dir(tenant))
            .join(massif_file_name(massif_index)))
    }

    /// The local replica path of a tenant's seal file.
    pub fn seal_local_path(&self, tenant: &str, massif_index: u64) -> Result<PathBuf> {
        let root = self.replica_root()?;
        Ok(root
            .join(replica_relative_seal_dir(tenant))
            .join(seal_file_name(massif_index)))
    }

    /// Create the massif and seal directories for a tenant's replica.
    pub fn ensure_replica_dirs(&self, tenant: &str) -> Result<()> {
        let massifs = self.massif_local_path(tenant, 0)?;
        let seals = self.seal_local_path(tenant, 0)?;
        for file in [&massifs, &seals] {
            let dir = file
                .parent()
                .ok_or_else(|| Error::PathIsNotDir(file.clone()))?;
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Install a verified context into the local replica: the massif
    /// bytes, then the seal bytes, then the cache entries.
    ///
    /// It is the caller's responsibility that `vc` came from a verified
    /// read; nothing is re-checked here.
    pub fn replace_verified_context(
        &self,
        vc: &VerifiedContext,
        opener: &dyn WriteAppendOpener,
    ) -> Result<()> {
        let tenant = &vc.massif.tenant_identity;
        let massif_index = vc.massif.start.massif_index as u64;

        let log_path = self.massif_local_path(tenant, massif_index)?;
        write_all(opener, &log_path, &vc.massif.data)?;

        let seal_path = self.seal_local_path(tenant, massif_index)?;
        write_all(opener, &seal_path, vc.seal.envelope.as_bytes())?;

        self.cache().replace_massif(&log_path, vc.massif.start);
        self.cache().replace_seal(&seal_path, massif_index);

        debug!(
            tenant = %tenant,
            massif_index,
            log = %log_path.display(),
            "installed verified massif and seal"
        );
        Ok(())
    }

    fn replica_root(&self) -> Result<&Path> {
        self.replica_dir()
            .ok_or_else(|| Error::PathIsNotDir(PathBuf::from("<replica dir not configured>")))
    }
}

fn write_all(opener: &dyn WriteAppendOpener, path: &Path, data: &[u8]) -> Result<()> {
    let mut w = opener.open_write(path)?;
    w.write_all(data)
        .map_err(|_| Error::WriteIncomplete(path.to_path_buf()))?;
    w.flush()?;
    Ok(())
}
