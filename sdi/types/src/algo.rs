// Copyright (C) Microsoft Corporation. All rights reserved.

//! Algorithm identifiers.

/// Algorithm identifier enumeration.
///
/// The values are organized by algorithm family:
/// - 0x0001xxxx: Asymmetric signature algorithms
/// - 0x0002xxxx: Asymmetric encryption algorithms
/// - 0x0003xxxx: Symmetric cipher algorithms
/// - 0x0005xxxx: MAC algorithms
/// - 0x0006xxxx: Key derivation and agreement algorithms
/// - 0x0007xxxx: AEAD algorithms
///
/// The enum is represented as a u32 so the numeric blocks stay stable as
/// families grow.
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AlgoId {
    // =============================================================================
    // Asymmetric Signature Algorithms (0x0001xxxx)
    // =============================================================================
    /// ECDSA over P-256 with a SHA-256 message hash.
    EcdsaP256Sha256 = 0x00010001,

    /// RSA PKCS#1 v1.5 signature with a SHA-256 message hash.
    RsaPkcsSha256 = 0x00010002,

    // =============================================================================
    // Asymmetric Encryption Algorithms (0x0002xxxx)
    // =============================================================================
    /// RSA PKCS#1 v1.5 encryption.
    RsaPkcsCrypt = 0x00020001,

    // =============================================================================
    // Symmetric Cipher Algorithms (0x0003xxxx)
    // =============================================================================
    /// AES in ECB mode, no padding.
    AesEcb = 0x00030001,

    /// AES in CBC mode, no padding.
    AesCbc = 0x00030002,

    /// AES in CTR mode.
    AesCtr = 0x00030003,

    // =============================================================================
    // MAC Algorithms (0x0005xxxx)
    // =============================================================================
    /// HMAC with SHA-256.
    HmacSha256 = 0x00050001,

    /// HMAC with SHA-384.
    HmacSha384 = 0x00050002,

    /// HMAC with SHA-512.
    HmacSha512 = 0x00050003,

    /// CMAC with AES.
    CmacAes = 0x00050004,

    // =============================================================================
    // Key Derivation and Agreement Algorithms (0x0006xxxx)
    // =============================================================================
    /// HKDF with SHA-256.
    HkdfSha256 = 0x00060001,

    /// Counter-mode KBKDF with an AES-CMAC PRF.
    KbkdfCmac = 0x00060002,

    /// ECDH key agreement over P-256.
    EcdhP256 = 0x00060003,

    // =============================================================================
    // AEAD Algorithms (0x0007xxxx)
    // =============================================================================
    /// AES-GCM authenticated encryption.
    AesGcm = 0x00070001,

    /// AES-CCM authenticated encryption.
    AesCcm = 0x00070002,
}

impl AlgoId {
    /// Output length in bytes for MAC algorithms, `None` for non-MAC ids.
    pub fn mac_len(&self) -> Option<usize> {
        match self {
            AlgoId::HmacSha256 => Some(32),
            AlgoId::HmacSha384 => Some(48),
            AlgoId::HmacSha512 => Some(64),
            AlgoId::CmacAes => Some(16),
            _ => None,
        }
    }

    /// True for block-cipher modes the core can chain over a driver's raw
    /// ECB entry point.
    pub fn is_block_mode(&self) -> bool {
        matches!(self, AlgoId::AesEcb | AlgoId::AesCbc)
    }

    /// True for block-cipher modes that require an IV.
    pub fn requires_iv(&self) -> bool {
        matches!(self, AlgoId::AesCbc | AlgoId::AesCtr)
    }

    /// AEAD authentication tag length in bytes, `None` for non-AEAD ids.
    pub fn tag_len(&self) -> Option<usize> {
        match self {
            AlgoId::AesGcm | AlgoId::AesCcm => Some(16),
            _ => None,
        }
    }
}

/// Direction of a symmetric cipher operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CipherDirection {
    /// Plaintext in, ciphertext out.
    Encrypt,
    /// Ciphertext in, plaintext out.
    Decrypt,
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_mac_len_per_algo() {
        assert_eq!(AlgoId::HmacSha256.mac_len(), Some(32));
        assert_eq!(AlgoId::HmacSha384.mac_len(), Some(48));
        assert_eq!(AlgoId::HmacSha512.mac_len(), Some(64));
        assert_eq!(AlgoId::CmacAes.mac_len(), Some(16));
        assert_eq!(AlgoId::AesCbc.mac_len(), None);
    }

    #[test]
    fn test_block_mode_classification() {
        assert!(AlgoId::AesEcb.is_block_mode());
        assert!(AlgoId::AesCbc.is_block_mode());
        assert!(!AlgoId::AesCtr.is_block_mode());
        assert!(!AlgoId::HmacSha256.is_block_mode());
        assert!(AlgoId::AesCbc.requires_iv());
        assert!(!AlgoId::AesEcb.requires_iv());
    }
}
