//! Massif storage for the cairn verifiable log.
//!
//! The log's MMR is partitioned into fixed-size chunks called *massifs*,
//! each persisted as one blob of strictly 32-byte fields. A massif blob is
//! self-contained: alongside its own nodes it carries the *peak stack*, the
//! ancestor peaks from preceding massifs that completing this massif will
//! reference. Given one blob and the stack it carries, the log can be
//! extended and verified without any other blob.
//!
//! ```text
//! 3        \   14   massif 1 \ . massif 2
//!           \/    \           \
//!  massif 0 /\     \           |    the 'alpine zone' is above the
//!          /   \    \          |    massif tree line
//! 2 ..... 6.....|....13........|...... 21 .....
//!       /   \   |   /   \      |      /
//! 1    2     5  |  9     12    |    18     20
//!     / \  /  \ | / \    /  \  |   /  \
//!    0   1 3   4| 7   8 10   11| 15   16 ...
//!    | massif 0 |  massif 1 .  | massif 2 ....>
//! ```
//!
//! - [`start`] - the 32-byte start header
//! - [`entry`] - the pre-allocated 64-byte leaf index entries
//! - [`context`] - [`MassifContext`], the append engine
//! - [`peakstack`] - random access into the ancestor peak stack
//! - [`dircache`] - scanning directories of massif and seal files
//! - [`paths`] - the tenant blob naming schema
//! - [`reader`] - [`LocalReader`] and the verified read path
//! - [`replica`] - installing verified remote content locally

pub mod committer;
pub mod context;
pub mod dircache;
pub mod entry;
pub mod options;
pub mod paths;
pub mod peakstack;
pub mod reader;
pub mod replica;
pub mod start;

pub use committer::MassifCommitter;
pub use context::MassifContext;
pub use dircache::{DirLister, FsDirLister, FsOpener, LogDirCache, LogDirCacheEntry, Opener};
pub use entry::{
    empty_index_entry, index_entry_id, new_index_entry, random_prefix, set_index_entry_id,
    INDEX_ENTRY_BYTES,
};
pub use options::{ReaderOptions, VerifyOptions};
pub use paths::{
    is_massif_path_like, is_seal_path_like, massif_file_name, normalize_tenant_identity,
    parse_path_number_ext, parse_path_tenant, seal_file_name, tenant_massif_blob_path,
    tenant_massif_prefix, tenant_seal_blob_path, tenant_seal_prefix,
};
pub use peakstack::peak_stack_map;
pub use reader::{LocalReader, SealGetter, VerifiedContext};
pub use replica::{FsWriteOpener, WriteAppendOpener};
pub use start::{massif_first_index, KeyType, MassifStart, VALUE_BYTES};
