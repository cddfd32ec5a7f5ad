//! Index arithmetic over MMR node counts.
//!
//! Nodes are identified two ways: the 0-based *index* `i` used for storage
//! lookups, and the 1-based *position* `pos = i + 1` whose binary structure
//! drives the arithmetic. A position whose bits are all ones sits at the
//! apex of a perfect subtree.
//!
//! The position tree for a log of 11 nodes:
//!
//! ```text
//! 2        7
//!        /   \
//! 1    3     6    10
//!     / \  /  \   / \
//! 0  1   2 4   5 8   9 11
//! ```

/// Number of bits needed to represent `x`.
fn bit_length(x: u64) -> u64 {
    (64 - x.leading_zeros()) as u64
}

/// True when every bit below the top bit of `pos` is set, i.e. `pos` is the
/// apex of a perfect subtree.
fn all_ones(pos: u64) -> bool {
    pos != 0 && pos.count_ones() as u64 == bit_length(pos)
}

/// The height index of the node at 1-based position `pos`, leaves at 0.
///
/// Iteratively subtracts the largest perfect subtree until the position is
/// an apex, then reads the height from the bit length.
pub fn pos_height(pos: u64) -> u64 {
    let mut pos = pos;
    while !all_ones(pos) {
        pos -= (1 << (bit_length(pos) - 1)) - 1;
    }
    bit_length(pos) - 1
}

/// The height index of the node at 0-based index `i`, leaves at 0.
pub fn index_height(i: u64) -> u64 {
    pos_height(i + 1)
}

/// The distance between siblings at the given height index.
pub fn sibling_offset(height: u64) -> u64 {
    (2 << height) - 1
}

/// The node index occupied by leaf `e`.
///
/// Leaves are interleaved with the interior nodes that complete on their
/// account, so the index is the leaf count doubled less the carries:
/// `2e - popcount(e)`.
pub fn mmr_index(leaf_index: u64) -> u64 {
    2 * leaf_index - leaf_index.count_ones() as u64
}

/// The largest perfect peak size contained in, or exactly, `pos`.
///
/// `top_peak(1..=2) == 1`, `top_peak(3..=6) == 3`, `top_peak(7) == 7`.
pub fn top_peak(pos: u64) -> u64 {
    (1 << (bit_length(pos + 1) - 1)) - 1
}

/// The height of the highest peak in an MMR of `size` nodes, counting a
/// single leaf as height 1. Zero only for the empty MMR.
pub fn top_height(size: u64) -> u64 {
    bit_length(size + 1) - 1
}

/// True when `size` is a complete MMR: its last node is either a leaf or
/// the parent completing a subtree. Sizes that strand a sibling without its
/// parent are not reachable by appending.
pub fn is_valid_size(size: u64) -> bool {
    size == 0 || pos_height(size + 1) <= pos_height(size)
}

/// The peaks of an MMR of `size` nodes as 1-based positions, highest peak
/// first. Returns an empty list if the size is invalid.
///
/// For size 11 the peaks are `[7, 10, 11]`.
pub fn peaks(size: u64) -> Vec<u64> {
    if size == 0 || !is_valid_size(size) {
        return Vec::new();
    }

    let mut peaks = Vec::new();
    let mut peak = 0;
    let mut remaining = size;
    while remaining != 0 {
        // The highest remaining peak is the perfect-tree floor of the
        // remaining size; accumulating the subtracted sizes recovers the
        // peak's position in the original mmr.
        let peak_size = top_peak(remaining);
        peak += peak_size;
        peaks.push(peak);
        remaining -= peak_size;
    }
    peaks
}

/// A bitmask with bit `k` set iff the MMR of `size` nodes has a peak at
/// height `k`. The value equals the leaf count.
///
/// For an invalid size the map is computed for the largest valid size below
/// it.
pub fn peaks_bitmap(size: u64) -> u64 {
    if size == 0 {
        return 0;
    }
    let mut pos = size;
    let mut peak_size = u64::MAX >> size.leading_zeros();
    let mut map = 0;
    while peak_size > 0 {
        map <<= 1;
        if pos >= peak_size {
            pos -= peak_size;
            map |= 1;
        }
        peak_size >>= 1;
    }
    map
}

/// The number of leaves in the largest MMR whose size is at most `size`.
pub fn leaf_count(size: u64) -> u64 {
    peaks_bitmap(size)
}

/// The first complete MMR size containing node `i`.
///
/// Valid sizes are not contiguous: appending one leaf adds the leaf and all
/// the interior nodes it completes. This walks forward from `i` until the
/// next node would start a new subtree.
pub fn first_mmr_size(mmr_index: u64) -> u64 {
    let mut i = mmr_index;
    let mut h0 = index_height(i);
    let mut h1 = index_height(i + 1);
    while h0 < h1 {
        i += 1;
        h0 = h1;
        h1 = index_height(i + 1);
    }
    i + 1
}

/// The leaf ordinal of the leaf node at index `i`.
pub fn leaf_index(mmr_index: u64) -> u64 {
    leaf_count(first_mmr_size(mmr_index)) - 1
}

/// How many interior nodes are appended after leaf `e`: the count of
/// trailing ones in the leaf ordinal.
pub fn spur_height_leaf(leaf_index: u64) -> u64 {
    leaf_index.trailing_ones() as u64
}

/// The running count of leaves minus their spur heights, for all leaves
/// below `e`. This is the number of ancestor peaks retained at leaf `e`,
/// and therefore the peak stack length of massif `e` (massifs accumulate
/// exactly like leaves, one level up). Numerically it equals
/// `popcount(e)`.
pub fn leaf_minus_spur_sum(leaf_index: u64) -> u64 {
    let mut sum = leaf_index;
    let mut x = leaf_index >> 1;
    while x > 0 {
        sum -= x;
        x >>= 1;
    }
    sum
}

/// The index into the packed accumulator (peaks listed highest first) of
/// the peak reached by a leaf proof of length `d`, for an MMR with
/// `leaf_count` leaves.
///
/// The proof of length `d` lands on the peak at height `d`; its packed
/// position is the count of peaks above that height.
pub fn peak_index(leaf_count: u64, d: usize) -> usize {
    (leaf_count >> (d as u64 + 1)).count_ones() as usize
}
