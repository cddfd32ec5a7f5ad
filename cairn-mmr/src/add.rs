//! The node-adder append loop.

use cairn_core::{interior_hash, Hash, Result};

use crate::index::index_height;
use crate::store::NodeAppender;

/// Append a hashed leaf, then complete every interior node the new leaf
/// makes possible. Returns the resulting MMR size.
///
/// After the leaf lands at index `i - 1`, the height of the *next* index
/// tells whether the mmr owes a parent: while the next slot sits above the
/// last appended node, its children are at `i - (2 << g)` and `i - 1` and
/// the parent value commits to its own 1-based position `i + 1`.
///
/// The number of interior nodes appended equals the count of trailing ones
/// in the prior leaf count.
pub fn add_hashed_leaf<S: NodeAppender>(store: &mut S, leaf: Hash) -> Result<u64> {
    let mut i = store.append(leaf)?;

    let mut g = 0;
    while index_height(i) > g {
        let left = store.get(i - (2 << g))?;
        let right = store.get(i - 1)?;
        i = store.append(interior_hash(i + 1, &left, &right))?;
        g += 1;
    }
    Ok(i)
}
