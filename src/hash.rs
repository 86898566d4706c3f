//! Stable 64-bit FNV-1a hashing.
//!
//! Fingerprints end up in persisted stores, so the hash must not depend on the
//! toolchain (unlike `DefaultHasher`).

const FNV1A64_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV1A64_PRIME: u64 = 0x0000_0100_0000_01b3;

pub fn stable_hash_bytes(seed: u64, bytes: &[u8]) -> u64 {
    let mut hash = FNV1A64_OFFSET ^ seed;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV1A64_PRIME);
    }
    hash
}

pub fn stable_hash_str(seed: u64, value: &str) -> u64 {
    stable_hash_bytes(seed, value.as_bytes())
}

/// Short lowercase hex digest (first 8 hex chars of the 64-bit hash).
pub fn short_digest(value: &str) -> String {
    format!("{:016x}", stable_hash_str(0, value))[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_hashes_to_offset_basis() {
        assert_eq!(stable_hash_str(0, ""), FNV1A64_OFFSET);
    }

    #[test]
    fn known_vector_matches_reference_fnv1a() {
        // Reference FNV-1a 64 of "a".
        assert_eq!(stable_hash_str(0, "a"), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn short_digest_is_stable_and_eight_chars() {
        let first = short_digest("timeout waiting for selector");
        let second = short_digest("timeout waiting for selector");
        assert_eq!(first, second);
        assert_eq!(first.len(), 8);
        assert_ne!(first, short_digest("different text"));
    }
}
