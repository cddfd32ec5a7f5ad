//! The massif start header.
//!
//! Massif blobs are strictly sized in multiples of 32 bytes so that simple
//! content-independent arithmetic places any field. The start header is the
//! first 32-byte field and encodes the little book keeping a blob needs for
//! efficient correctness checks; everything else about the blob's place in
//! the overall MMR is derived from `(massif height, massif index)`, so the
//! derived values can never disagree with the header.
//!
//! Layout, big-endian fields:
//!
//! ```text
//! .     | type| <reserved> | version | epoch  | height | massif index |
//! bytes | 0   | 1 .. 20    | 21 - 22 | 23 - 26|   27   |   28 - 31    |
//! ```

use cairn_core::{Error, Result};
use cairn_mmr::{leaf_minus_spur_sum, mmr_index};

/// Field width for every value in a massif blob.
pub const VALUE_BYTES: usize = 32;

/// Width of the start header.
pub const START_HEADER_BYTES: usize = 32;

/// Width of the reserved index header field that follows the start header.
pub const INDEX_HEADER_BYTES: usize = 32;

/// The supported header version.
pub const MASSIF_CURRENT_VERSION: u16 = 0;

const VERSION_FIRST: usize = 21;
const EPOCH_FIRST: usize = 23;
const HEIGHT_BYTE: usize = 27;
const MASSIF_INDEX_FIRST: usize = 28;

/// Type tags for 32-byte log fields. The first eight values are reserved
/// for application entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KeyType {
    /// The standard application entry type, deliberately zero.
    ApplicationContent = 0,
    /// Interior MMR nodes.
    InteriorNode = 9,
    /// Massif blob start headers.
    MassifStart = 10,
}

/// The decoded start header of a massif blob, plus the values derived from
/// it. `first_index` and `peak_stack_len` are never written to storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MassifStart {
    /// Header version, currently 0.
    pub version: u16,
    /// The accumulation epoch. The massif height is fixed within an epoch.
    pub epoch: u32,
    /// The massif height `H`; each massif holds `2^(H-1)` leaves and
    /// `2^H - 1` nodes.
    pub massif_height: u8,
    /// This blob's 0-based ordinal among the tenant's massifs.
    pub massif_index: u32,
    /// Derived: the mmr index of this blob's first node.
    pub first_index: u64,
    /// Derived: the number of ancestor peaks carried in this blob.
    pub peak_stack_len: u64,
}

/// The mmr index of the first node of the massif `massif_index` for logs
/// with the given massif height.
pub fn massif_first_index(massif_height: u8, massif_index: u32) -> u64 {
    let leaves_per_massif = 1u64 << (massif_height - 1);
    mmr_index(leaves_per_massif * massif_index as u64)
}

impl MassifStart {
    /// A header for massif `massif_index` of a log with the given epoch and
    /// height. The derived fields are filled in.
    pub fn new(epoch: u32, massif_height: u8, massif_index: u32) -> Self {
        Self {
            version: MASSIF_CURRENT_VERSION,
            epoch,
            massif_height,
            massif_index,
            first_index: massif_first_index(massif_height, massif_index),
            peak_stack_len: leaf_minus_spur_sum(massif_index as u64),
        }
    }

    /// Leaves per massif for this log.
    pub fn leaves_per_massif(&self) -> u64 {
        1 << (self.massif_height - 1)
    }

    /// Encode the header into its 32-byte field.
    pub fn encode(&self) -> [u8; START_HEADER_BYTES] {
        let mut field = [0u8; START_HEADER_BYTES];
        field[0] = KeyType::MassifStart as u8;
        field[VERSION_FIRST..VERSION_FIRST + 2].copy_from_slice(&self.version.to_be_bytes());
        field[EPOCH_FIRST..EPOCH_FIRST + 4].copy_from_slice(&self.epoch.to_be_bytes());
        field[HEIGHT_BYTE] = self.massif_height;
        field[MASSIF_INDEX_FIRST..MASSIF_INDEX_FIRST + 4]
            .copy_from_slice(&self.massif_index.to_be_bytes());
        field
    }

    /// Decode a header from the front of `data`.
    ///
    /// Fails on truncated input, an unknown type tag, nonzero reserved
    /// bytes, an unsupported version, or a zero massif height.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < START_HEADER_BYTES {
            return Err(Error::LogFileBadHeader(format!(
                "{} bytes is too short for a start header",
                data.len()
            )));
        }
        if data[0] != KeyType::MassifStart as u8 {
            return Err(Error::LogFileNoMagic(format!(
                "unexpected type tag {}",
                data[0]
            )));
        }
        if data[1..VERSION_FIRST].iter().any(|b| *b != 0) {
            return Err(Error::LogFileNoMagic("reserved bytes not zero".into()));
        }

        let version = u16::from_be_bytes([data[VERSION_FIRST], data[VERSION_FIRST + 1]]);
        if version != MASSIF_CURRENT_VERSION {
            return Err(Error::LogFileNoMagic(format!(
                "unsupported massif version: {}",
                version
            )));
        }

        let epoch = u32::from_be_bytes([
            data[EPOCH_FIRST],
            data[EPOCH_FIRST + 1],
            data[EPOCH_FIRST + 2],
            data[EPOCH_FIRST + 3],
        ]);
        let massif_height = data[HEIGHT_BYTE];
        if massif_height == 0 {
            return Err(Error::LogFileBadHeader("massif height is zero".into()));
        }
        let massif_index = u32::from_be_bytes([
            data[MASSIF_INDEX_FIRST],
            data[MASSIF_INDEX_FIRST + 1],
            data[MASSIF_INDEX_FIRST + 2],
            data[MASSIF_INDEX_FIRST + 3],
        ]);

        Ok(Self {
            version,
            epoch,
            massif_height,
            massif_index,
            first_index: massif_first_index(massif_height, massif_index),
            peak_stack_len: leaf_minus_spur_sum(massif_index as u64),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let start = MassifStart::new(7, 14, 42);
        let decoded = MassifStart::decode(&start.encode()).unwrap();
        assert_eq!(decoded, start);
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        let good = MassifStart::new(1, 3, 0).encode();

        assert!(matches!(
            MassifStart::decode(&good[..31]),
            Err(Error::LogFileBadHeader(_))
        ));

        let mut bad_tag = good;
        bad_tag[0] = KeyType::ApplicationContent as u8;
        assert!(matches!(
            MassifStart::decode(&bad_tag),
            Err(Error::LogFileNoMagic(_))
        ));

        let mut bad_reserved = good;
        bad_reserved[8] = 0x90;
        assert!(matches!(
            MassifStart::decode(&bad_reserved),
            Err(Error::LogFileNoMagic(_))
        ));

        let mut bad_version = good;
        bad_version[22] = 1;
        assert!(matches!(
            MassifStart::decode(&bad_version),
            Err(Error::LogFileNoMagic(_))
        ));

        let mut zero_height = good;
        zero_height[27] = 0;
        assert!(matches!(
            MassifStart::decode(&zero_height),
            Err(Error::LogFileBadHeader(_))
        ));
    }

    #[test]
    fn test_derived_first_index_height_2() {
        // Two leaves per massif: the first node indices follow the mmr
        // index of each massif's first leaf.
        let want = [0u64, 3, 7, 10, 15, 18, 22, 25, 31];
        for (m, w) in want.iter().enumerate() {
            assert_eq!(massif_first_index(2, m as u32), *w, "massif {}", m);
            let start = MassifStart::new(0, 2, m as u32);
            assert_eq!(start.first_index, *w);
        }
    }

    #[test]
    fn test_derived_peak_stack_len() {
        for m in 0u32..64 {
            let start = MassifStart::new(0, 3, m);
            assert_eq!(start.peak_stack_len, m.count_ones() as u64, "massif {}", m);
        }
    }

    #[test]
    fn test_header_cannot_disagree_with_derivation() {
        // first_index and peak_stack_len are not marshalled; decode always
        // recomputes them from (height, index).
        let start = MassifStart::new(0, 4, 9);
        let decoded = MassifStart::decode(&start.encode()).unwrap();
        assert_eq!(decoded.first_index, massif_first_index(4, 9));
        assert_eq!(decoded.peak_stack_len, 2);
    }
}
