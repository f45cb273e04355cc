//! PoW validation.

use certchain_ledger::BlockHeader;
use primitive_types::U256;

use crate::{MAX_BITS, MIN_BITS};

/// Integer threshold derived from compact `bits`: `1 << (256 - bits)`.
pub fn target_from_bits(bits: u32) -> U256 {
    let bits = bits.clamp(MIN_BITS, MAX_BITS);
    U256::one() << (256 - bits as usize)
}

/// A hash is valid work when, read as a big-endian integer, it is
/// strictly below the target.
pub fn validate_hash(hash: &[u8; 32], bits: u32) -> bool {
    U256::from_big_endian(hash) < target_from_bits(bits)
}

/// Validate a header's nonce against its own `bits`.
pub fn validate_header(header: &BlockHeader) -> bool {
    validate_hash(&header.hash_bytes(), header.bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_doubles_as_bits_decrease() {
        assert_eq!(target_from_bits(4), target_from_bits(5) << 1);
    }

    #[test]
    fn bits_are_clamped() {
        assert_eq!(target_from_bits(0), target_from_bits(MIN_BITS));
        assert_eq!(target_from_bits(200), target_from_bits(MAX_BITS));
    }

    #[test]
    fn zero_hash_always_validates() {
        assert!(validate_hash(&[0u8; 32], MAX_BITS));
    }

    #[test]
    fn max_hash_never_validates() {
        assert!(!validate_hash(&[0xFF; 32], MIN_BITS));
    }

    #[test]
    fn boundary_is_strict() {
        // Exactly the target (1 << 252 for bits=4) must fail; one below passes.
        let mut at_target = [0u8; 32];
        at_target[0] = 0x10;
        assert!(!validate_hash(&at_target, 4));

        let mut below = [0xFF; 32];
        below[0] = 0x0F;
        assert!(validate_hash(&below, 4));
    }
}
