//! The massif append engine.
//!
//! A [`MassifContext`] is constructed entirely from one blob's data. Because
//! each blob carries the peak stack accumulated from its predecessors, the
//! context can extend and verify the log with no access to earlier blobs.
//!
//! The central invariant of the layout: every node referenced while
//! completing massif `m` is either in `m`'s own log region or in its peak
//! stack. The highest ancestor an append can ever need is the root of the
//! most recent perfect-subtree massif, and the stack is precisely that
//! chain.

use std::cell::Cell;
use std::collections::HashMap;

use tracing::debug;

use cairn_core::{Error, Hash, Result};
use cairn_mmr::{
    self as mmr, leaf_count, leaf_minus_spur_sum, spur_height_leaf, NodeAppender, NodeStore,
};

use crate::entry::{index_entry_id, INDEX_ENTRY_BYTES};
use crate::peakstack::peak_stack_map;
use crate::start::{MassifStart, INDEX_HEADER_BYTES, START_HEADER_BYTES, VALUE_BYTES};

/// The append engine for one massif blob.
///
/// The context deals with three massif states: no blob exists yet
/// ([`MassifContext::create_first`]), the most recent blob has room, or the
/// most recent blob is full and a new one is seeded with
/// [`MassifContext::start_next_massif`].
#[derive(Debug, Clone)]
pub struct MassifContext {
    /// The identity of the log this blob belongs to. Informational; set by
    /// the reader that loaded the blob.
    pub tenant_identity: String,
    /// The decoded start header.
    pub start: MassifStart,
    /// The blob bytes: header, index region, peak stack, log region.
    pub data: Vec<u8>,

    /// Random access map from ancestor mmr index to stack slot, built on
    /// read. Builders skip it and rely on the draining cursor instead.
    peak_stack_map: Option<HashMap<u64, usize>>,

    /// Stack slot of the next ancestor the append algorithm will ask for.
    /// Initialized just in time, when the massif's last leaf is added, and
    /// consumed top down; -1 otherwise.
    next_ancestor: Cell<i64>,

    /// The last application id of the previous blob, preserved while this
    /// blob has no entries of its own. Zero for the first blob, which is
    /// less than every real id.
    last_id_prev_blob: u64,
}

impl MassifContext {
    /// Create the seed context for massif 0 of a new log.
    pub fn create_first(epoch: u32, massif_height: u8) -> Self {
        let start = MassifStart::new(epoch, massif_height, 0);
        let mut data = Vec::with_capacity(Self::fixed_prefix_size(&start));
        data.extend_from_slice(&start.encode());
        data.resize(Self::fixed_prefix_size(&start), 0);
        Self {
            tenant_identity: String::new(),
            start,
            data,
            peak_stack_map: None,
            next_ancestor: Cell::new(-1),
            last_id_prev_blob: 0,
        }
    }

    /// Construct a context over blob bytes read from storage.
    ///
    /// `with_peak_map` builds the random access map over the ancestor
    /// stack, which [`cairn_mmr::bagged_root`] needs to reach peaks from
    /// earlier massifs. Builders that only append can skip it.
    pub fn from_data(data: Vec<u8>, with_peak_map: bool) -> Result<Self> {
        let start = MassifStart::decode(&data)?;

        let mut mc = Self {
            tenant_identity: String::new(),
            start,
            data,
            peak_stack_map: None,
            next_ancestor: Cell::new(-1),
            last_id_prev_blob: 0,
        };

        let log_start = mc.log_start();
        if mc.data.len() < log_start {
            return Err(Error::LogFileBadHeader(format!(
                "massif data is shorter than its fixed regions: {} < {}",
                mc.data.len(),
                log_start
            )));
        }
        if (mc.data.len() - log_start) % VALUE_BYTES != 0 {
            return Err(Error::LogFileBadHeader(
                "massif log region is not 32-byte aligned".into(),
            ));
        }

        if with_peak_map {
            mc.peak_stack_map = Some(peak_stack_map(mc.start.first_index));
        }
        Ok(mc)
    }

    fn fixed_prefix_size(start: &MassifStart) -> usize {
        START_HEADER_BYTES
            + INDEX_HEADER_BYTES
            + start.leaves_per_massif() as usize * INDEX_ENTRY_BYTES
    }

    // ------------------------------------------------------------------
    // Region offsets. All fields are 32 bytes so these are pure
    // arithmetic over the header values.
    // ------------------------------------------------------------------

    /// Byte offset of the first index entry.
    pub fn index_start(&self) -> usize {
        START_HEADER_BYTES + INDEX_HEADER_BYTES
    }

    /// Byte size of the pre-allocated index region: one entry per leaf.
    pub fn index_size(&self) -> usize {
        self.start.leaves_per_massif() as usize * INDEX_ENTRY_BYTES
    }

    /// Byte offset of the peak stack region.
    pub fn peak_stack_start(&self) -> usize {
        self.index_start() + self.index_size()
    }

    /// Byte offset of the log region.
    pub fn log_start(&self) -> usize {
        self.peak_stack_start() + self.start.peak_stack_len as usize * VALUE_BYTES
    }

    // ------------------------------------------------------------------
    // Counts
    // ------------------------------------------------------------------

    /// The number of nodes in this massif's log region.
    pub fn count(&self) -> u64 {
        (self.data.len().saturating_sub(self.log_start()) / VALUE_BYTES) as u64
    }

    /// The total number of nodes in the MMR up to and including this blob.
    pub fn range_count(&self) -> u64 {
        self.start.first_index + self.count()
    }

    /// The mmr index of the last leaf that fits in this massif.
    pub fn last_leaf_index(&self) -> u64 {
        let h = self.start.massif_height as u64;
        self.start.first_index + (1 << h) - h - 1
    }

    /// The number of leaves appended to this massif so far.
    pub fn massif_leaf_count(&self) -> u64 {
        leaf_count(self.range_count()) - leaf_count(self.start.first_index)
    }

    /// True when this massif's last leaf (and therefore every interior
    /// node it completes, including any spur above the massif tree line)
    /// has been appended. Massifs hold a fixed leaf count but a variable
    /// node count: the blob completing a perfect subtree also carries the
    /// carries.
    pub fn is_full(&self) -> bool {
        self.start.first_index + self.count() > self.last_leaf_index()
    }

    /// The last node value of the blob.
    fn last_value(&self) -> Result<Hash> {
        if self.count() == 0 {
            return Err(Error::AncestorStackInvalid(
                "an empty massif has no last value".into(),
            ));
        }
        Hash::from_slice(&self.data[self.data.len() - VALUE_BYTES..])
    }

    /// The application id of the newest entry, carrying over from the
    /// previous blob while this one is empty.
    pub fn last_id(&self) -> Result<u64> {
        let leaves = self.massif_leaf_count();
        if leaves == 0 {
            return Ok(self.last_id_prev_blob);
        }
        let offset = self.index_start() + (leaves as usize - 1) * INDEX_ENTRY_BYTES;
        index_entry_id(&self.data, offset)
    }

    /// The index entry in slot `k`.
    pub fn index_entry(&self, k: u64) -> Result<&[u8]> {
        if k >= self.start.leaves_per_massif() {
            return Err(Error::IndexEntryBadSize(k as usize));
        }
        let offset = self.index_start() + k as usize * INDEX_ENTRY_BYTES;
        Ok(&self.data[offset..offset + INDEX_ENTRY_BYTES])
    }

    // ------------------------------------------------------------------
    // Appending
    // ------------------------------------------------------------------

    /// Add a hashed leaf and its index entry, completing any interior
    /// nodes the leaf makes possible. Returns the new MMR size.
    ///
    /// On error the context must be discarded, not persisted: the index
    /// slot may have been written ahead of the failure.
    pub fn add_hashed_leaf(&mut self, index_entry: &[u8], leaf_value: &[u8]) -> Result<u64> {
        if leaf_value.len() != VALUE_BYTES {
            return Err(Error::LogValueBadSize(leaf_value.len()));
        }
        if index_entry.len() != INDEX_ENTRY_BYTES {
            return Err(Error::IndexEntryBadSize(index_entry.len()));
        }

        let next_node = self.start.first_index + self.count();
        let last_leaf = self.last_leaf_index();
        if next_node > last_leaf {
            return Err(Error::MassifFull);
        }

        let id = index_entry_id(index_entry, 0)?;
        let last = self.last_id()?;
        if id != 0 && id <= last {
            return Err(Error::IdNotMonotonic { last, offered: id });
        }

        if next_node == last_leaf {
            // The last leaf of the massif is the only append that
            // references earlier blobs; arm the stack cursor so the
            // ancestors drain in exactly the order the algorithm asks.
            self.next_ancestor
                .set(self.start.peak_stack_len as i64 - 1);
        }

        // Overwrite the pre-allocated index slot for this leaf.
        let slot = self.massif_leaf_count() as usize;
        let offset = self.index_start() + slot * INDEX_ENTRY_BYTES;
        self.data[offset..offset + INDEX_ENTRY_BYTES].copy_from_slice(index_entry);

        mmr::add_hashed_leaf(self, Hash::from_slice(leaf_value)?)
    }

    /// Re-seed this context as the empty start of the next massif.
    ///
    /// The new blob's peak stack is the old stack with the ancestors the
    /// completed massif consumed popped, and the completed massif's last
    /// node pushed. Applied to a blob that is already a fresh seed this is
    /// a no-op, so re-running an interrupted rollover is harmless.
    pub fn start_next_massif(&mut self) -> Result<()> {
        if self.count() == 0 {
            return Ok(());
        }
        if !self.is_full() {
            return Err(Error::MassifNotFull);
        }

        // Strict uniqueness across restarts: carry the last id forward so
        // the next append must exceed it.
        let last_id = self.last_id()?;

        let next_stack = self.next_peak_stack()?;
        let next_start = MassifStart::new(
            self.start.epoch,
            self.start.massif_height,
            self.start.massif_index + 1,
        );

        // The stack we accumulated must agree with the value derived from
        // the new header. Divergence is a strong corruption signal.
        if next_stack.len() / VALUE_BYTES != next_start.peak_stack_len as usize {
            return Err(Error::AncestorStackInvalid(format!(
                "accumulated stack length {} does not match derived length {}",
                next_stack.len() / VALUE_BYTES,
                next_start.peak_stack_len
            )));
        }
        debug_assert_eq!(next_start.first_index, self.range_count());

        let mut data = Vec::with_capacity(Self::fixed_prefix_size(&next_start) + next_stack.len());
        data.extend_from_slice(&next_start.encode());
        data.resize(Self::fixed_prefix_size(&next_start), 0);
        data.extend_from_slice(&next_stack);

        debug!(
            massif_index = next_start.massif_index,
            first_index = next_start.first_index,
            peak_stack_len = next_start.peak_stack_len,
            "starting next massif"
        );

        self.start = next_start;
        self.data = data;
        self.last_id_prev_blob = last_id;
        self.next_ancestor.set(-1);
        if self.peak_stack_map.is_some() {
            self.peak_stack_map = Some(peak_stack_map(self.start.first_index));
        }
        Ok(())
    }

    /// The ancestor peak stack region of this blob.
    pub fn ancestor_peak_stack(&self) -> Result<&[u8]> {
        let stack_start = self.peak_stack_start();
        let log_start = self.log_start();
        if stack_start == log_start {
            return Ok(&[]);
        }
        if log_start > self.data.len() || stack_start + VALUE_BYTES > log_start {
            return Err(Error::AncestorStackInvalid(format!(
                "stack region [{}, {}) exceeds the data",
                stack_start, log_start
            )));
        }
        Ok(&self.data[stack_start..log_start])
    }

    /// Derive the peak stack for the next massif from this completed blob:
    /// pop the ancestors this massif consumed, push this massif's last
    /// node.
    fn next_peak_stack(&self) -> Result<Vec<u8>> {
        let stack = self.ancestor_peak_stack()?;
        let massif_index = self.start.massif_index as u64;

        let stack_len = leaf_minus_spur_sum(massif_index) as usize;
        if stack.len() / VALUE_BYTES != stack_len {
            return Err(Error::AncestorStackInvalid(format!(
                "stack holds {} values, derived length is {}",
                stack.len() / VALUE_BYTES,
                stack_len
            )));
        }

        // Massifs accumulate exactly like leaves one level up: the pop
        // count for massif m is m's spur height.
        let pop = spur_height_leaf(massif_index) as usize;
        let mut next = stack[..(stack_len - pop) * VALUE_BYTES].to_vec();
        next.extend_from_slice(self.last_value()?.as_bytes());
        Ok(next)
    }

    /// The stack value in `slot`.
    fn peak_stack_value(&self, slot: usize) -> Result<Hash> {
        if slot as u64 >= self.start.peak_stack_len {
            return Err(Error::AncestorStackInvalid(format!(
                "stack slot {} out of range {}",
                slot, self.start.peak_stack_len
            )));
        }
        let offset = self.peak_stack_start() + slot * VALUE_BYTES;
        Hash::from_slice(&self.data[offset..offset + VALUE_BYTES])
    }
}

impl NodeStore for MassifContext {
    /// Serve the node at mmr index `i`.
    ///
    /// Nodes at or after `first_index` come from the local log region.
    /// Anything earlier is an ancestor peak: served from the random access
    /// map when present, otherwise from the draining cursor armed by the
    /// final leaf append.
    fn get(&self, i: u64) -> Result<Hash> {
        if i >= self.start.first_index {
            let offset = self.log_start() + (i - self.start.first_index) as usize * VALUE_BYTES;
            if offset + VALUE_BYTES > self.data.len() {
                return Err(Error::GetIndexUnavailable(i));
            }
            return Hash::from_slice(&self.data[offset..offset + VALUE_BYTES]);
        }

        if self.start.first_index == 0 {
            return Err(Error::GetIndexUnavailable(i));
        }

        if let Some(map) = &self.peak_stack_map {
            return match map.get(&i) {
                Some(&slot) => self.peak_stack_value(slot),
                None => Err(Error::GetIndexUnavailable(i)),
            };
        }

        let cursor = self.next_ancestor.get();
        if cursor < 0 {
            return Err(Error::GetIndexUnavailable(i));
        }
        let value = self.peak_stack_value(cursor as usize)?;
        self.next_ancestor.set(cursor - 1);
        Ok(value)
    }
}

impl NodeAppender for MassifContext {
    fn append(&mut self, value: Hash) -> Result<u64> {
        self.data.extend_from_slice(value.as_bytes());
        Ok(self.range_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{empty_index_entry, new_index_entry};
    use cairn_mmr::{add_hashed_leaf, MemStore};

    /// The canonical numbered leaf: 32 bytes with the ordinal in the last
    /// four, big-endian.
    fn numbered_leaf(e: u64) -> [u8; 32] {
        let mut v = [0u8; 32];
        v[28..].copy_from_slice(&(e as u32).to_be_bytes());
        v
    }

    fn entry_with_id(id: u64) -> [u8; INDEX_ENTRY_BYTES] {
        new_index_entry(&[0u8; 16], id, &[0u8; 16])
    }

    /// Drive a height-2 log across `massifs` blobs, returning each blob's
    /// peak stack (as raw bytes) and a reference MMR built alongside.
    fn build_log(massifs: u32) -> (MassifContext, MemStore, Vec<Vec<u8>>) {
        let mut mc = MassifContext::create_first(1, 2);
        let mut reference = MemStore::new();
        let mut stacks = Vec::new();
        let mut e = 0u64;

        for _ in 0..massifs {
            for _ in 0..mc.start.leaves_per_massif() {
                let leaf = numbered_leaf(e);
                let got = mc.add_hashed_leaf(&entry_with_id(e + 1), &leaf).unwrap();
                let want = add_hashed_leaf(&mut reference, Hash::from_bytes(leaf)).unwrap();
                assert_eq!(got, want, "sizes diverge at leaf {}", e);
                e += 1;
            }
            assert!(mc.is_full());
            mc.start_next_massif().unwrap();
            stacks.push(mc.ancestor_peak_stack().unwrap().to_vec());
        }
        (mc, reference, stacks)
    }

    #[test]
    fn test_peak_stack_evolution_height_2() {
        // The stacks seeded for massifs 1..=8 hold these ancestor indices.
        let want: [&[u64]; 8] = [
            &[2],
            &[6],
            &[6, 9],
            &[14],
            &[14, 17],
            &[14, 21],
            &[14, 21, 24],
            &[30],
        ];

        let (_, reference, stacks) = build_log(8);

        for (m, indices) in want.iter().enumerate() {
            let mut expect = Vec::new();
            for &i in indices.iter() {
                expect.extend_from_slice(reference.get(i).unwrap().as_bytes());
            }
            assert_eq!(stacks[m], expect, "stack seeded by massif {}", m);
        }
    }

    #[test]
    fn test_all_nodes_match_reference_mmr() {
        // Every node served by the massif context agrees with a flat MMR
        // built from the same leaves, across several blob boundaries.
        let mut mc = MassifContext::create_first(0, 3);
        let mut reference = MemStore::new();

        for e in 0u64..16 {
            if mc.is_full() {
                mc.start_next_massif().unwrap();
            }
            let leaf = numbered_leaf(e);
            mc.add_hashed_leaf(&empty_index_entry(), &leaf).unwrap();
            add_hashed_leaf(&mut reference, Hash::from_bytes(leaf)).unwrap();
        }

        assert_eq!(mc.range_count(), reference.size());
        for i in mc.start.first_index..mc.range_count() {
            assert_eq!(mc.get(i).unwrap(), reference.get(i).unwrap(), "node {}", i);
        }
    }

    #[test]
    fn test_bagged_roots_match_reference_across_massifs() {
        // With the peak map built, the context serves ancestor peaks for
        // root computations at any size within (and before) its range.
        let mut mc = MassifContext::create_first(0, 2);
        let mut reference = MemStore::new();
        for e in 0u64..8 {
            if mc.is_full() {
                mc.start_next_massif().unwrap();
            }
            let leaf = numbered_leaf(e);
            mc.add_hashed_leaf(&empty_index_entry(), &leaf).unwrap();
            add_hashed_leaf(&mut reference, Hash::from_bytes(leaf)).unwrap();
        }

        // re-read the final blob the way a verifier would
        let verifier = MassifContext::from_data(mc.data.clone(), true).unwrap();
        for size in [7u64, 10, 11, 15] {
            assert_eq!(
                cairn_mmr::bagged_root(size, &verifier).unwrap(),
                cairn_mmr::bagged_root(size, &reference).unwrap(),
                "size {}",
                size
            );
        }
    }

    #[test]
    fn test_massif_full() {
        let mut mc = MassifContext::create_first(0, 2);
        for e in 0..2u64 {
            mc.add_hashed_leaf(&empty_index_entry(), &numbered_leaf(e))
                .unwrap();
        }
        let err = mc
            .add_hashed_leaf(&empty_index_entry(), &numbered_leaf(2))
            .unwrap_err();
        assert!(matches!(err, Error::MassifFull));

        mc.start_next_massif().unwrap();
        mc.add_hashed_leaf(&empty_index_entry(), &numbered_leaf(2))
            .unwrap();
    }

    #[test]
    fn test_start_next_massif_is_idempotent_on_seed() {
        let (mut mc, _, _) = build_log(2);
        let seeded = mc.data.clone();
        mc.start_next_massif().unwrap();
        assert_eq!(mc.data, seeded);
    }

    #[test]
    fn test_start_next_massif_rejects_partial() {
        let mut mc = MassifContext::create_first(0, 2);
        mc.add_hashed_leaf(&empty_index_entry(), &numbered_leaf(0))
            .unwrap();
        assert!(matches!(
            mc.start_next_massif().unwrap_err(),
            Error::MassifNotFull
        ));
    }

    #[test]
    fn test_input_sizes_rejected() {
        let mut mc = MassifContext::create_first(0, 2);
        assert!(matches!(
            mc.add_hashed_leaf(&empty_index_entry(), &[0u8; 31]),
            Err(Error::LogValueBadSize(31))
        ));
        assert!(matches!(
            mc.add_hashed_leaf(&[0u8; 63], &numbered_leaf(0)),
            Err(Error::IndexEntryBadSize(63))
        ));
    }

    #[test]
    fn test_id_monotonic_across_blobs() {
        let mut mc = MassifContext::create_first(0, 2);
        mc.add_hashed_leaf(&entry_with_id(10), &numbered_leaf(0))
            .unwrap();

        // equal id rejected within the blob
        assert!(matches!(
            mc.add_hashed_leaf(&entry_with_id(10), &numbered_leaf(1)),
            Err(Error::IdNotMonotonic {
                last: 10,
                offered: 10
            })
        ));
        mc.add_hashed_leaf(&entry_with_id(11), &numbered_leaf(1))
            .unwrap();

        // the carry survives the blob boundary
        mc.start_next_massif().unwrap();
        assert_eq!(mc.last_id().unwrap(), 11);
        assert!(matches!(
            mc.add_hashed_leaf(&entry_with_id(5), &numbered_leaf(2)),
            Err(Error::IdNotMonotonic {
                last: 11,
                offered: 5
            })
        ));
        mc.add_hashed_leaf(&entry_with_id(12), &numbered_leaf(2))
            .unwrap();
    }

    #[test]
    fn test_empty_first_massif_serves_nothing() {
        let mc = MassifContext::create_first(0, 2);
        assert!(matches!(mc.get(0), Err(Error::GetIndexUnavailable(0))));
    }

    #[test]
    fn test_index_entries_written_once_per_leaf() {
        let mut mc = MassifContext::create_first(0, 3);
        for e in 0..4u64 {
            let entry = new_index_entry(&[e as u8; 16], e + 1, &[0u8; 16]);
            mc.add_hashed_leaf(&entry, &numbered_leaf(e)).unwrap();
        }
        for e in 0..4u64 {
            let entry = mc.index_entry(e).unwrap();
            assert_eq!(entry[0], e as u8);
            assert_eq!(index_entry_id(entry, 0).unwrap(), e + 1);
        }
    }

    #[test]
    fn test_from_data_rejects_truncation() {
        let (mc, _, _) = build_log(3);
        let mut data = mc.data.clone();
        data.truncate(mc.log_start() - 1);
        assert!(matches!(
            MassifContext::from_data(data, false),
            Err(Error::LogFileBadHeader(_))
        ));

        let mut misaligned = mc.data.clone();
        misaligned.push(0);
        assert!(matches!(
            MassifContext::from_data(misaligned, false),
            Err(Error::LogFileBadHeader(_))
        ));
    }
}
