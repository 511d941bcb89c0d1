//! Key hash functions

use serde::Deserialize;

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// 32 bit hash used to place keys and ring points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyHasher {
    /// FNV-1a
    Fnv1a,
    /// FNV-1a followed by an avalanche step, for better spread of short keys
    ModifiedFnv,
    /// CRC32 (IEEE)
    Crc32,
}

impl KeyHasher {
    pub fn hash(self, key: &[u8]) -> u32 {
        match self {
            KeyHasher::Fnv1a => fnv1a(key),
            KeyHasher::ModifiedFnv => modified_fnv(key),
            KeyHasher::Crc32 => crc32fast::hash(key),
        }
    }
}

fn fnv1a(key: &[u8]) -> u32 {
    key.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| {
        (hash ^ byte as u32).wrapping_mul(FNV_PRIME)
    })
}

fn modified_fnv(key: &[u8]) -> u32 {
    let mut hash = fnv1a(key);
    hash = hash.wrapping_add(hash << 13);
    hash ^= hash >> 7;
    hash = hash.wrapping_add(hash << 3);
    hash ^= hash >> 17;
    hash = hash.wrapping_add(hash << 5);
    hash
}
