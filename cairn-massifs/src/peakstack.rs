//! Random access into the ancestor peak stack.

use std::collections::HashMap;

use cairn_mmr::peaks;

/// Map each ancestor peak's mmr index to its position in the peak stack of
/// the massif whose first node index is `first_index`.
///
/// The stack of a massif is exactly the accumulator of the MMR formed by
/// all preceding massifs, which has size `first_index`. Peaks are listed
/// highest first, which is also oldest first, matching the physical order
/// of the stack region.
pub fn peak_stack_map(first_index: u64) -> HashMap<u64, usize> {
    peaks(first_index)
        .into_iter()
        .enumerate()
        .map(|(slot, pos)| (pos - 1, slot))
        .collect()
}
