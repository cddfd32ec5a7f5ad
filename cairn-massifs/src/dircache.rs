//! Scanning and caching directories of massif and seal files.
//!
//! A [`LogDirCache`] caches the results of scanning a directory for merkle
//! log files. Massif `.log` files are classified by reading their 32-byte
//! start header; seal `.sth` files by their fixed-width hex file names. A
//! cache may, and should, be shared between reader instances. Access is
//! strictly single threaded; the interior mutability is a `RefCell` and
//! the type is deliberately not `Sync`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use cairn_core::{Error, Result};

use crate::context::MassifContext;
use crate::options::ReaderOptions;
use crate::paths::{
    parse_path_number_ext, replica_relative_massif_dir, replica_relative_seal_dir, SEAL_EXT,
};
use crate::start::{MassifStart, START_HEADER_BYTES};

/// Enumerates the files (not subdirectories) of a directory.
pub trait DirLister {
    /// List absolute paths to the files in `dir`.
    fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>>;
}

/// Opens a file for reading.
pub trait Opener {
    /// Open `path` for reading.
    fn open(&self, path: &Path) -> Result<Box<dyn Read>>;
}

/// Filesystem-backed [`DirLister`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FsDirLister;

impl DirLister for FsDirLister {
    fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Filesystem-backed [`Opener`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FsOpener;

impl Opener for FsOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn Read>> {
        Ok(Box::new(File::open(path)?))
    }
}

/// The cached results of scanning one directory.
#[derive(Debug, Clone, Default)]
pub struct LogDirCacheEntry {
    /// The scanned directory.
    pub dir_path: PathBuf,
    /// Lowest massif index found.
    pub first_massif_index: Option<u32>,
    /// Highest massif index found.
    pub head_massif_index: Option<u32>,
    /// Lowest seal index found.
    pub first_seal_index: Option<u32>,
    /// Highest seal index found.
    pub head_seal_index: Option<u32>,
    /// Decoded start headers by file path.
    pub massif_starts: HashMap<PathBuf, MassifStart>,
    /// Massif file paths by massif index.
    pub massif_paths: HashMap<u64, PathBuf>,
    /// Seal file paths by massif index.
    pub seal_paths: HashMap<u64, PathBuf>,
}

impl LogDirCacheEntry {
    fn new(dir_path: PathBuf) -> Self {
        Self {
            dir_path,
            ..Self::default()
        }
    }
}

/// Caches per-directory scans of massif and seal files.
pub struct LogDirCache {
    opts: ReaderOptions,
    opener: Box<dyn Opener>,
    massif_lister: Box<dyn DirLister>,
    seal_lister: Box<dyn DirLister>,
    entries: RefCell<HashMap<PathBuf, LogDirCacheEntry>>,
}

impl LogDirCache {
    /// A cache with injected listers and opener.
    pub fn new(
        opts: ReaderOptions,
        opener: Box<dyn Opener>,
        massif_lister: Box<dyn DirLister>,
        seal_lister: Box<dyn DirLister>,
    ) -> Self {
        Self {
            opts,
            opener,
            massif_lister,
            seal_lister,
            entries: RefCell::new(HashMap::new()),
        }
    }

    /// A cache over the local filesystem.
    pub fn new_fs(opts: ReaderOptions) -> Self {
        Self::new(
            opts,
            Box::new(FsOpener),
            Box::new(FsDirLister),
            Box::new(FsDirLister),
        )
    }

    /// The options this cache was configured with.
    pub fn options(&self) -> &ReaderOptions {
        &self.opts
    }

    /// Drop the cached scan for `dir`; the next access re-scans.
    pub fn delete_entry(&self, dir: &Path) {
        self.entries.borrow_mut().remove(dir);
    }

    /// A copy of the cached scan results for `dir`, if it has been scanned.
    pub fn entry(&self, dir: &Path) -> Option<LogDirCacheEntry> {
        self.entries.borrow().get(dir).cloned()
    }

    /// Scan `dir` for massif files, reading each candidate's start header.
    ///
    /// Files that are too short or carry no massif magic are quietly
    /// ignored; IO failures, height mismatches and duplicate massif
    /// indices are fatal.
    pub fn find_massif_files(&self, dir: &Path) -> Result<()> {
        let files = self.massif_lister.list_files(dir)?;
        for file in files {
            match self.read_massif_start(&file) {
                Ok(_) => {}
                Err(Error::LogFileNoMagic(_)) | Err(Error::LogFileBadHeader(_)) => {
                    debug!(file = %file.display(), "skipping file, not a massif");
                }
                Err(e) => return Err(e),
            }
        }
        let entries = self.entries.borrow();
        if let Some(entry) = entries.get(dir) {
            debug!(
                dir = %dir.display(),
                massifs = entry.massif_paths.len(),
                head = ?entry.head_massif_index,
                "massif scan complete"
            );
        }
        Ok(())
    }

    /// Scan `dir` for seal files. Seals are opaque envelopes, so they are
    /// indexed by their fixed-width hex file names.
    pub fn find_seal_files(&self, dir: &Path) -> Result<()> {
        let files = self.seal_lister.list_files(dir)?;
        let mut entries = self.entries.borrow_mut();
        let entry = entries
            .entry(dir.to_path_buf())
            .or_insert_with(|| LogDirCacheEntry::new(dir.to_path_buf()));

        for file in files {
            let Some(name) = file.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Ok((index, ext)) = parse_path_number_ext(name) else {
                continue;
            };
            if ext != SEAL_EXT {
                continue;
            }
            entry.seal_paths.insert(index, file);
            let index = index as u32;
            entry.head_seal_index = Some(entry.head_seal_index.map_or(index, |h| h.max(index)));
            entry.first_seal_index = Some(entry.first_seal_index.map_or(index, |f| f.min(index)));
        }
        Ok(())
    }

    /// Read and cache the start header of `file`, establishing a cache
    /// entry for its directory.
    pub fn read_massif_start(&self, file: &Path) -> Result<MassifStart> {
        let dir = file.parent().unwrap_or(Path::new("")).to_path_buf();

        if let Some(ms) = self
            .entries
            .borrow()
            .get(&dir)
            .and_then(|e| e.massif_starts.get(file))
        {
            return Ok(*ms);
        }

        let mut reader = self.opener.open(file)?;
        let mut header = [0u8; START_HEADER_BYTES];
        read_header(&mut reader, &mut header)?;

        let ms = MassifStart::decode(&header)?;

        if let Some(required) = self.opts.require_massif_height {
            if ms.massif_height != required {
                warn!(
                    file = %file.display(),
                    header = ms.massif_height,
                    required,
                    "massif height mismatch"
                );
                return Err(Error::MassifHeightHeader {
                    header: ms.massif_height,
                    required,
                });
            }
        }

        let mut entries = self.entries.borrow_mut();
        let entry = entries
            .entry(dir.clone())
            .or_insert_with(|| LogDirCacheEntry::new(dir));

        // A second file claiming an index we have already seen means the
        // directory mixes logs from different tenants.
        if let Some(existing) = entry.massif_paths.get(&(ms.massif_index as u64)) {
            if existing != file {
                return Err(Error::DuplicateMassifIndices {
                    index: ms.massif_index as u64,
                    first: existing.clone(),
                    second: file.to_path_buf(),
                });
            }
        }

        entry
            .massif_paths
            .insert(ms.massif_index as u64, file.to_path_buf());
        entry.massif_starts.insert(file.to_path_buf(), ms);
        entry.head_massif_index = Some(
            entry
                .head_massif_index
                .map_or(ms.massif_index, |h| h.max(ms.massif_index)),
        );
        entry.first_massif_index = Some(
            entry
                .first_massif_index
                .map_or(ms.massif_index, |f| f.min(ms.massif_index)),
        );

        Ok(ms)
    }

    /// Read the massif with `massif_index` from `dir`, scanning the
    /// directory first if it has not been seen.
    pub fn read_massif(&self, dir: &Path, massif_index: u64) -> Result<MassifContext> {
        let scanned = self
            .entry(dir)
            .map(|e| !e.massif_paths.is_empty())
            .unwrap_or(false);
        if !scanned {
            self.find_massif_files(dir)?;
        }
        let path = self
            .entry(dir)
            .and_then(|e| e.massif_paths.get(&massif_index).cloned())
            .ok_or(Error::MassifNotFound(massif_index))?;

        let mut reader = self.opener.open(&path)?;
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;

        MassifContext::from_data(data, !self.opts.no_get_root_support)
    }

    /// Read the raw seal bytes for `massif_index` from `dir`, scanning the
    /// directory first if it has not been seen.
    pub fn read_seal_bytes(&self, dir: &Path, massif_index: u64) -> Result<Vec<u8>> {
        let scanned = self
            .entry(dir)
            .map(|e| !e.seal_paths.is_empty())
            .unwrap_or(false);
        if !scanned {
            self.find_seal_files(dir)?;
        }
        let path = self
            .entry(dir)
            .and_then(|e| e.seal_paths.get(&massif_index).cloned())
            .ok_or(Error::SealNotFound(massif_index))?;

        let mut reader = self.opener.open(&path)?;
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Resolve a tenant identity or local path to the directory holding
    /// massif files.
    ///
    /// In direct-path mode the argument must be an existing directory, or
    /// a file whose parent is used. In replica mode the directory is
    /// derived from the tenant identity and the blob path schema.
    pub fn resolve_massif_dir(&self, tenant_or_path: &str) -> Result<PathBuf> {
        match &self.opts.replica_dir {
            None => dir_from_path(Path::new(tenant_or_path)),
            Some(root) => existing_dir(root.join(replica_relative_massif_dir(tenant_or_path))),
        }
    }

    /// Resolve a tenant identity or local path to the directory holding
    /// seal files.
    pub fn resolve_seal_dir(&self, tenant_or_path: &str) -> Result<PathBuf> {
        match &self.opts.replica_dir {
            None => dir_from_path(Path::new(tenant_or_path)),
            Some(root) => existing_dir(root.join(replica_relative_seal_dir(tenant_or_path))),
        }
    }

    /// Record a freshly installed massif file in the cache.
    pub fn replace_massif(&self, path: &Path, start: MassifStart) {
        let dir = path.parent().unwrap_or(Path::new("")).to_path_buf();
        let mut entries = self.entries.borrow_mut();
        let entry = entries
            .entry(dir.clone())
            .or_insert_with(|| LogDirCacheEntry::new(dir));
        entry
            .massif_paths
            .insert(start.massif_index as u64, path.to_path_buf());
        entry.massif_starts.insert(path.to_path_buf(), start);
        entry.head_massif_index = Some(
            entry
                .head_massif_index
                .map_or(start.massif_index, |h| h.max(start.massif_index)),
        );
        entry.first_massif_index = Some(
            entry
                .first_massif_index
                .map_or(start.massif_index, |f| f.min(start.massif_index)),
        );
    }

    /// Record a freshly installed seal file in the cache.
    pub fn replace_seal(&self, path: &Path, massif_index: u64) {
        let dir = path.parent().unwrap_or(Path::new("")).to_path_buf();
        let mut entries = self.entries.borrow_mut();
        let entry = entries
            .entry(dir.clone())
            .or_insert_with(|| LogDirCacheEntry::new(dir));
        entry.seal_paths.insert(massif_index, path.to_path_buf());
        let index = massif_index as u32;
        entry.head_seal_index = Some(entry.head_seal_index.map_or(index, |h| h.max(index)));
        entry.first_seal_index = Some(entry.first_seal_index.map_or(index, |f| f.min(index)));
    }
}

fn read_header(reader: &mut dyn Read, header: &mut [u8; START_HEADER_BYTES]) -> Result<()> {
    let mut filled = 0;
    while filled < header.len() {
        let n = reader.read(&mut header[filled..])?;
        if n == 0 {
            return Err(Error::LogFileBadHeader(format!(
                "only {} bytes available",
                filled
            )));
        }
        filled += n;
    }
    Ok(())
}

/// An existing directory derived from `path`: the path itself, or its
/// parent when the path names a file.
fn dir_from_path(path: &Path) -> Result<PathBuf> {
    let meta =
        std::fs::metadata(path).map_err(|_| Error::PathIsNotDir(path.to_path_buf()))?;
    if meta.is_dir() {
        return Ok(path.to_path_buf());
    }
    let parent = path.parent().ok_or_else(|| Error::PathIsNotDir(path.to_path_buf()))?;
    existing_dir(parent.to_path_buf())
}

fn existing_dir(dir: PathBuf) -> Result<PathBuf> {
    if dir.is_dir() {
        Ok(dir)
    } else {
        Err(Error::PathIsNotDir(dir))
    }
}
