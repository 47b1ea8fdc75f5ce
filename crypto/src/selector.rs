//! Contract call selectors.

use sha3::{Digest, Keccak256};

/// First four bytes of a contract call's data, identifying the function.
pub type Selector = [u8; 4];

/// Keccak-256 selector of a canonical function signature such as
/// `"withdraw(uint256)"`.
pub fn function_selector(signature: &str) -> Selector {
    let digest = Keccak256::digest(signature.as_bytes());
    [digest[0], digest[1], digest[2], digest[3]]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_selectors() {
        assert_eq!(function_selector("deposit()"), [0xd0, 0xe3, 0x0d, 0xb0]);
        assert_eq!(function_selector("withdraw(uint256)"), [0x2e, 0x1a, 0x7d, 0x4d]);
    }
}
