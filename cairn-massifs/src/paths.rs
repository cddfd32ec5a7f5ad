//! The tenant blob naming schema.
//!
//! A tenant identity of the form `tenant/<uuid>` maps to
//! `v1/mmrs/tenant/<uuid>/0/massifs/<m>.log` and
//! `v1/mmrs/tenant/<uuid>/0/sealedroots/<m>.sth`, where `<m>` is the
//! massif index as 16 hex digits. Blob stores order names lexically, so
//! the fixed-width hex keeps numeric and lexical order aligned. Local
//! replicas mirror everything under `v1/mmrs` beneath a configurable root.

use std::path::PathBuf;

use cairn_core::{Error, Result};

/// Versioned prefix for all merkle log storage paths.
pub const V1_MMR_PREFIX: &str = "v1/mmrs";

/// Prefix including the tenant path segment.
pub const V1_MMR_TENANT_PREFIX: &str = "v1/mmrs/tenant";

/// Extension of massif log files.
pub const MASSIF_EXT: &str = "log";

/// Extension of sealed (signed) root files.
pub const SEAL_EXT: &str = "sth";

/// The directory for the initial accumulation epoch. Changing the massif
/// height requires a new epoch and hence a new directory.
const EPOCH_SEGMENT: &str = "0";

/// Normalize a tenant identity to the `tenant/<uuid>` form.
pub fn normalize_tenant_identity(tenant: &str) -> String {
    if tenant.starts_with("tenant/") {
        tenant.to_string()
    } else {
        format!("tenant/{}", tenant)
    }
}

/// The storage prefix for a tenant's massif blobs.
pub fn tenant_massif_prefix(tenant: &str) -> String {
    format!(
        "{}/{}/{}/massifs/",
        V1_MMR_PREFIX,
        normalize_tenant_identity(tenant),
        EPOCH_SEGMENT
    )
}

/// The storage prefix for a tenant's seals: the signatures that associate
/// the log operator with the log and attest to its good operation.
pub fn tenant_seal_prefix(tenant: &str) -> String {
    format!(
        "{}/{}/{}/sealedroots/",
        V1_MMR_PREFIX,
        normalize_tenant_identity(tenant),
        EPOCH_SEGMENT
    )
}

/// The file name of massif `massif_index`.
pub fn massif_file_name(massif_index: u64) -> String {
    format!("{:016x}.{}", massif_index, MASSIF_EXT)
}

/// The file name of the seal for massif `massif_index`.
pub fn seal_file_name(massif_index: u64) -> String {
    format!("{:016x}.{}", massif_index, SEAL_EXT)
}

/// The full storage path of a tenant's massif blob.
pub fn tenant_massif_blob_path(tenant: &str, massif_index: u64) -> String {
    format!("{}{}", tenant_massif_prefix(tenant), massif_file_name(massif_index))
}

/// The full storage path of a tenant's seal blob.
pub fn tenant_seal_blob_path(tenant: &str, massif_index: u64) -> String {
    format!("{}{}", tenant_seal_prefix(tenant), seal_file_name(massif_index))
}

/// The massif directory for a tenant, relative to a replica root: the
/// storage prefix with `v1/mmrs` stripped.
pub fn replica_relative_massif_dir(tenant: &str) -> PathBuf {
    relative_dir(&tenant_massif_prefix(tenant))
}

/// The seal directory for a tenant, relative to a replica root.
pub fn replica_relative_seal_dir(tenant: &str) -> PathBuf {
    relative_dir(&tenant_seal_prefix(tenant))
}

fn relative_dir(prefix: &str) -> PathBuf {
    let stripped = prefix
        .strip_prefix(V1_MMR_PREFIX)
        .unwrap_or(prefix)
        .trim_matches('/');
    stripped.split('/').collect()
}

/// Shallow check that a storage path could name a massif blob.
pub fn is_massif_path_like(path: &str) -> bool {
    path.starts_with(V1_MMR_TENANT_PREFIX) && path.ends_with(&format!(".{}", MASSIF_EXT))
}

/// Shallow check that a storage path could name a seal blob.
pub fn is_seal_path_like(path: &str) -> bool {
    path.starts_with(V1_MMR_TENANT_PREFIX) && path.ends_with(&format!(".{}", SEAL_EXT))
}

/// Parse the tenant uuid from a massif storage path.
pub fn parse_path_tenant(path: &str) -> Result<String> {
    let rest = path
        .strip_prefix(V1_MMR_TENANT_PREFIX)
        .and_then(|r| r.strip_prefix('/'))
        .ok_or_else(|| Error::MassifPathFmt(path.to_string()))?;
    rest.split('/')
        .next()
        .filter(|uuid| !uuid.is_empty())
        .map(|uuid| uuid.to_string())
        .ok_or_else(|| Error::MassifPathFmt(path.to_string()))
}

/// Parse the massif index and extension from a storage path or file name.
pub fn parse_path_number_ext(path: &str) -> Result<(u64, String)> {
    let base = path
        .rsplit('/')
        .next()
        .ok_or_else(|| Error::MassifPathFmt(path.to_string()))?;
    let (number, ext) = base
        .split_once('.')
        .ok_or_else(|| Error::MassifPathFmt(format!("base name invalid: {}", path)))?;
    if ext != MASSIF_EXT && ext != SEAL_EXT {
        return Err(Error::MassifPathFmt(format!("extension invalid: {}", path)));
    }
    let number = u64::from_str_radix(number, 16)
        .map_err(|e| Error::MassifPathFmt(format!("log file number invalid: {} ({})", path, e)))?;
    Ok((number, ext.to_string()))
}
