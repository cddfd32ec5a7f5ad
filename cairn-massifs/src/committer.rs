//! Building a log against a directory of massif files.
//!
//! The committer owns the single-writer side of a log: it locates the head
//! blob (or seeds the first), hands out an appendable [`MassifContext`],
//! and persists a committed context as one whole-file write. Excluding
//! concurrent writers for a log is the caller's responsibility.

use std::path::{Path, PathBuf};

use tracing::debug;

use cairn_core::Result;

use crate::context::MassifContext;
use crate::dircache::LogDirCache;
use crate::options::ReaderOptions;
use crate::paths::massif_file_name;

/// Appends to the massif files of one log directory.
pub struct MassifCommitter {
    dir: PathBuf,
    epoch: u32,
    massif_height: u8,
    cache: LogDirCache,
}

impl MassifCommitter {
    /// A committer for the log in `dir`, creating massifs of the given
    /// height within `epoch`.
    pub fn new(dir: impl Into<PathBuf>, epoch: u32, massif_height: u8) -> Self {
        let dir = dir.into();
        // Builders never need the random access peak map, and any file
        // already present must agree on the height.
        let opts = ReaderOptions::new()
            .with_require_massif_height(massif_height)
            .without_get_root_support();
        Self {
            dir,
            epoch,
            massif_height,
            cache: LogDirCache::new_fs(opts),
        }
    }

    /// The log directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The context to append to: the head blob if it has room, the seed of
    /// the next massif if the head is full, or the seed of massif 0 for an
    /// empty directory. The second value reports whether a new blob was
    /// started.
    pub fn get_current_context(&self) -> Result<(MassifContext, bool)> {
        self.cache.delete_entry(&self.dir);
        self.cache.find_massif_files(&self.dir)?;

        let head = self.cache.entry(&self.dir).and_then(|e| e.head_massif_index);
        let Some(head) = head else {
            debug!(dir = %self.dir.display(), "seeding massif 0");
            return Ok((MassifContext::create_first(self.epoch, self.massif_height), true));
        };

        let mut mc = self.cache.read_massif(&self.dir, head as u64)?;
        if !mc.is_full() {
            return Ok((mc, false));
        }
        mc.start_next_massif()?;
        Ok((mc, true))
    }

    /// Persist the context's blob as one whole-file write.
    pub fn commit_context(&self, mc: &MassifContext) -> Result<()> {
        let path = self.dir.join(massif_file_name(mc.start.massif_index as u64));
        std::fs::write(&path, &mc.data)?;
        self.cache.replace_massif(&path, mc.start);
        debug!(
            path = %path.display(),
            massif_index = mc.start.massif_index,
            range_count = mc.range_count(),
            "committed massif"
        );
        Ok(())
    }
}
