/// Type alias representing the 64-bit hash code used throughout the diff engine.
///
/// ```
/// # use jd_core::hash_bytes;
/// let code = hash_bytes(b"jd");
/// assert_eq!(code.len(), 8);
/// ```
pub type HashCode = [u8; 8];

/// Compute the FNV-1a hash of the provided bytes.
///
/// ```
/// # use jd_core::hash_bytes;
/// let code = hash_bytes(b"diff");
/// let same = hash_bytes(b"diff");
/// assert_eq!(code, same);
/// ```
#[must_use]
pub fn hash_bytes(input: &[u8]) -> HashCode {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    let mut hash = OFFSET_BASIS;
    for byte in input {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash.to_le_bytes()
}

/// Combine a collection of member hashes into a single order-independent
/// aggregate, salted by `seed` so that containers with identical members
/// but different interpretations stay disjoint in the hash space.
///
/// Members are sorted before aggregation, which both erases input order
/// and preserves multiplicity, so the combinator is usable for sets and
/// multisets alike.
///
/// ```
/// # use jd_core::{combine, hash_bytes};
/// let seed = [0u8; 8];
/// let ab = combine(seed, vec![hash_bytes(b"a"), hash_bytes(b"b")]);
/// let ba = combine(seed, vec![hash_bytes(b"b"), hash_bytes(b"a")]);
/// assert_eq!(ab, ba);
/// ```
#[must_use]
pub fn combine(seed: [u8; 8], mut codes: Vec<HashCode>) -> HashCode {
    codes.sort_unstable();
    let mut bytes = Vec::with_capacity(8 + codes.len() * 8);
    bytes.extend_from_slice(&seed);
    for code in codes {
        bytes.extend_from_slice(&code);
    }
    hash_bytes(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_is_order_independent() {
        let seed = [1u8; 8];
        let a = hash_bytes(b"a");
        let b = hash_bytes(b"b");
        let c = hash_bytes(b"c");
        assert_eq!(combine(seed, vec![a, b, c]), combine(seed, vec![c, a, b]));
    }

    #[test]
    fn combine_preserves_multiplicity() {
        let seed = [1u8; 8];
        let a = hash_bytes(b"a");
        let b = hash_bytes(b"b");
        assert_ne!(combine(seed, vec![a, a, b]), combine(seed, vec![a, b, b]));
    }

    #[test]
    fn combine_seed_separates_interpretations() {
        let a = hash_bytes(b"a");
        assert_ne!(combine([1u8; 8], vec![a]), combine([2u8; 8], vec![a]));
    }
}
