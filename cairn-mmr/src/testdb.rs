//! The canonical test MMR shared by the known-answer tests.
//!
//! Leaf `f` is the SHA-256 of `f` as 8 big-endian bytes; interior nodes are
//! produced by the node-adder. The first 39 nodes of this log are the
//! interop fixture whose peak hashes appear in the KAT tables.

use cairn_core::{leaf_hash, Hash};

use crate::add::add_hashed_leaf;
use crate::index::leaf_count;
use crate::store::MemStore;

/// The leaf value for ordinal `f` in the canonical log.
pub(crate) fn canonical_leaf(f: u64) -> Hash {
    leaf_hash(&f.to_be_bytes())
}

/// Build the canonical log out to exactly `size` nodes.
pub(crate) fn canonical_test_store(size: u64) -> MemStore {
    let mut store = MemStore::new();
    for f in 0..leaf_count(size) {
        add_hashed_leaf(&mut store, canonical_leaf(f)).expect("mem store appends cannot fail");
    }
    assert_eq!(store.size(), size, "{} is not a valid mmr size", size);
    store
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proof::peak_hashes;
    use crate::store::NodeStore;

    fn hexes(hashes: &[Hash]) -> Vec<String> {
        hashes.iter().map(|h| h.to_hex()).collect()
    }

    #[test]
    fn test_canonical_peak_hashes_size_11() {
        let db = canonical_test_store(39);
        let got = hexes(&peak_hashes(&db, 11).unwrap());
        assert_eq!(
            got,
            vec![
                "827f3213c1de0d4c6277caccc1eeca325e45dfe2c65adce1943774218db61f88",
                "b8faf5f748f149b04018491a51334499fd8b6060c42a835f361fa9665562d12d",
                "8d85f8467240628a94819b26bee26e3a9b2804334c63482deacec8d64ab4e1e7",
            ],
        );
    }

    #[test]
    fn test_canonical_peak_hashes_all_sizes() {
        let table: &[(u64, &[&str])] = &[
            (1, &["af5570f5a1810b7af78caf4bc70a660f0df51e42baf91d4de5b2328de0e83dfc"]),
            (3, &["ad104051c516812ea5874ca3ff06d0258303623d04307c41ec80a7a18b332ef8"]),
            (4, &[
                "ad104051c516812ea5874ca3ff06d0258303623d04307c41ec80a7a18b332ef8",
                "d5688a52d55a02ec4aea5ec1eadfffe1c9e0ee6a4ddbe2377f98326d42dfc975",
            ]),
            (7, &["827f3213c1de0d4c6277caccc1eeca325e45dfe2c65adce1943774218db61f88"]),
            (8, &[
                "827f3213c1de0d4c6277caccc1eeca325e45dfe2c65adce1943774218db61f88",
                "a3eb8db89fc5123ccfd49585059f292bc40a1c0d550b860f24f84efb4760fbf2",
            ]),
            (10, &[
                "827f3213c1de0d4c6277caccc1eeca325e45dfe2c65adce1943774218db61f88",
                "b8faf5f748f149b04018491a51334499fd8b6060c42a835f361fa9665562d12d",
            ]),
            (11, &[
                "827f3213c1de0d4c6277caccc1eeca325e45dfe2c65adce1943774218db61f88",
                "b8faf5f748f149b04018491a51334499fd8b6060c42a835f361fa9665562d12d",
                "8d85f8467240628a94819b26bee26e3a9b2804334c63482deacec8d64ab4e1e7",
            ]),
            (15, &["78b2b4162eb2c58b229288bbcb5b7d97c7a1154eed3161905fb0f180eba6f112"]),
            (16, &[
                "78b2b4162eb2c58b229288bbcb5b7d97c7a1154eed3161905fb0f180eba6f112",
                "e66c57014a6156061ae669809ec5d735e484e8fcfd540e110c9b04f84c0b4504",
            ]),
            (18, &[
                "78b2b4162eb2c58b229288bbcb5b7d97c7a1154eed3161905fb0f180eba6f112",
                "f4a0db79de0fee128fbe95ecf3509646203909dc447ae911aa29416bf6fcba21",
            ]),
            (19, &[
                "78b2b4162eb2c58b229288bbcb5b7d97c7a1154eed3161905fb0f180eba6f112",
                "f4a0db79de0fee128fbe95ecf3509646203909dc447ae911aa29416bf6fcba21",
                "5bc67471c189d78c76461dcab6141a733bdab3799d1d69e0c419119c92e82b3d",
            ]),
            (22, &[
                "78b2b4162eb2c58b229288bbcb5b7d97c7a1154eed3161905fb0f180eba6f112",
                "61b3ff808934301578c9ed7402e3dd7dfe98b630acdf26d1fd2698a3c4a22710",
            ]),
            (23, &[
                "78b2b4162eb2c58b229288bbcb5b7d97c7a1154eed3161905fb0f180eba6f112",
                "61b3ff808934301578c9ed7402e3dd7dfe98b630acdf26d1fd2698a3c4a22710",
                "7a42e3892368f826928202014a6ca95a3d8d846df25088da80018663edf96b1c",
            ]),
            (25, &[
                "78b2b4162eb2c58b229288bbcb5b7d97c7a1154eed3161905fb0f180eba6f112",
                "61b3ff808934301578c9ed7402e3dd7dfe98b630acdf26d1fd2698a3c4a22710",
                "dd7efba5f1824103f1fa820a5c9e6cd90a82cf123d88bd035c7e5da0aba8a9ae",
            ]),
            (26, &[
                "78b2b4162eb2c58b229288bbcb5b7d97c7a1154eed3161905fb0f180eba6f112",
                "61b3ff808934301578c9ed7402e3dd7dfe98b630acdf26d1fd2698a3c4a22710",
                "dd7efba5f1824103f1fa820a5c9e6cd90a82cf123d88bd035c7e5da0aba8a9ae",
                "561f627b4213258dc8863498bb9b07c904c3c65a78c1a36bca329154d1ded213",
            ]),
            (31, &["d4fb5649422ff2eaf7b1c0b851585a8cfd14fb08ce11addb30075a96309582a7"]),
            (32, &[
                "d4fb5649422ff2eaf7b1c0b851585a8cfd14fb08ce11addb30075a96309582a7",
                "1664a6e0ea12d234b4911d011800bb0f8c1101a0f9a49a91ee6e2493e34d8e7b",
            ]),
            (34, &[
                "d4fb5649422ff2eaf7b1c0b851585a8cfd14fb08ce11addb30075a96309582a7",
                "0c9f36783b5929d43c97fe4b170d12137e6950ef1b3a8bd254b15bbacbfdee7f",
            ]),
            (35, &[
                "d4fb5649422ff2eaf7b1c0b851585a8cfd14fb08ce11addb30075a96309582a7",
                "0c9f36783b5929d43c97fe4b170d12137e6950ef1b3a8bd254b15bbacbfdee7f",
                "4d75f61869104baa4ccff5be73311be9bdd6cc31779301dfc699479403c8a786",
            ]),
            (38, &[
                "d4fb5649422ff2eaf7b1c0b851585a8cfd14fb08ce11addb30075a96309582a7",
                "6a169105dcc487dbbae5747a0fd9b1d33a40320cf91cf9a323579139e7ff72aa",
            ]),
            (39, &[
                "d4fb5649422ff2eaf7b1c0b851585a8cfd14fb08ce11addb30075a96309582a7",
                "6a169105dcc487dbbae5747a0fd9b1d33a40320cf91cf9a323579139e7ff72aa",
                "e9a5f5201eb3c3c856e0a224527af5ac7eb1767fb1aff9bd53ba41a60cde9785",
            ]),
        ];

        let db = canonical_test_store(39);
        for (size, want) in table {
            let got = hexes(&peak_hashes(&db, *size).unwrap());
            let want: Vec<String> = want.iter().map(|s| s.to_string()).collect();
            assert_eq!(got, want, "size {}", size);
        }
    }

    #[test]
    fn test_first_leaf_is_hash_of_zero_be64() {
        let db = canonical_test_store(1);
        assert_eq!(
            db.get(0).unwrap().to_hex(),
            "af5570f5a1810b7af78caf4bc70a660f0df51e42baf91d4de5b2328de0e83dfc"
        );
    }
}
