//! The pre-allocated 64-byte leaf index entries.
//!
//! Slot `k` of the index region belongs to the `k`-th leaf of the massif
//! and is written exactly once, when that leaf is appended. The layout is
//! opaque to the MMR logic except for the application id, which the engine
//! reads to enforce monotonicity across blob boundaries:
//!
//! ```text
//! | 0 - 15        | 16 - 23  | 24 - 31   | 32 - 47   | 48 - 63  |
//! | random prefix | reserved | u64 BE id | app data  | reserved |
//! ```

use cairn_core::{Error, Result};
use uuid::Uuid;

/// Width of one index entry.
pub const INDEX_ENTRY_BYTES: usize = 64;

const PREFIX_FIRST: usize = 0;
const ID_FIRST: usize = 24;
const ID_END: usize = 32;
const APP_DATA_FIRST: usize = 32;

/// An all-zero index entry, for callers that carry no index metadata.
pub fn empty_index_entry() -> [u8; INDEX_ENTRY_BYTES] {
    [0u8; INDEX_ENTRY_BYTES]
}

/// A fresh 16-byte random prefix.
pub fn random_prefix() -> [u8; 16] {
    Uuid::new_v4().into_bytes()
}

/// Build an index entry from its components.
pub fn new_index_entry(prefix: &[u8; 16], id: u64, app_data: &[u8; 16]) -> [u8; INDEX_ENTRY_BYTES] {
    let mut entry = [0u8; INDEX_ENTRY_BYTES];
    entry[PREFIX_FIRST..PREFIX_FIRST + 16].copy_from_slice(prefix);
    entry[ID_FIRST..ID_END].copy_from_slice(&id.to_be_bytes());
    entry[APP_DATA_FIRST..APP_DATA_FIRST + 16].copy_from_slice(app_data);
    entry
}

/// Read the application id of the entry starting at `offset` in `data`.
pub fn index_entry_id(data: &[u8], offset: usize) -> Result<u64> {
    let bytes: [u8; 8] = data
        .get(offset + ID_FIRST..offset + ID_END)
        .and_then(|s| s.try_into().ok())
        .ok_or(Error::IndexEntryBadSize(data.len().saturating_sub(offset)))?;
    Ok(u64::from_be_bytes(bytes))
}

/// Write the application id of the entry starting at `offset` in `data`.
pub fn set_index_entry_id(data: &mut [u8], offset: usize, id: u64) {
    data[offset + ID_FIRST..offset + ID_END].copy_from_slice(&id.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_layout() {
        let prefix = [0xAAu8; 16];
        let app = [0xBBu8; 16];
        let entry = new_index_entry(&prefix, 0x0102030405060708, &app);

        assert_eq!(&entry[..16], &prefix);
        assert_eq!(&entry[16..24], &[0u8; 8]);
        assert_eq!(
            &entry[24..32],
            &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]
        );
        assert_eq!(&entry[32..48], &app);
        assert_eq!(&entry[48..64], &[0u8; 16]);
    }

    #[test]
    fn test_id_roundtrip() {
        let mut data = vec![0u8; 3 * INDEX_ENTRY_BYTES];
        set_index_entry_id(&mut data, INDEX_ENTRY_BYTES, 77);
        assert_eq!(index_entry_id(&data, INDEX_ENTRY_BYTES).unwrap(), 77);
        assert_eq!(index_entry_id(&data, 0).unwrap(), 0);
    }

    #[test]
    fn test_id_out_of_range() {
        let data = vec![0u8; 16];
        assert!(index_entry_id(&data, 0).is_err());
    }
}
