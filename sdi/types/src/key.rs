// Copyright (C) Microsoft Corporation. All rights reserved.

//! Key classification and policy attributes.

use crate::AlgoId;

/// Kind of key material a slot holds.
///
/// The values are organized by key family:
/// - 0x0001xxxx: Symmetric cipher keys
/// - 0x0002xxxx: MAC keys
/// - 0x0003xxxx: Derivation secrets
/// - 0x0004xxxx: Asymmetric key pairs
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum KeyKind {
    // =============================================================================
    // Symmetric Cipher Keys (0x0001xxxx)
    // =============================================================================
    /// AES key, 128 bits.
    Aes128 = 0x00010001,

    /// AES key, 192 bits.
    Aes192 = 0x00010002,

    /// AES key, 256 bits.
    Aes256 = 0x00010003,

    // =============================================================================
    // MAC Keys (0x0002xxxx)
    // =============================================================================
    /// HMAC-SHA-256 key.
    HmacSha256 = 0x00020001,

    /// HMAC-SHA-384 key.
    HmacSha384 = 0x00020002,

    /// HMAC-SHA-512 key.
    HmacSha512 = 0x00020003,

    // =============================================================================
    // Derivation Secrets (0x0003xxxx)
    // =============================================================================
    /// Generic 256-bit secret usable as derivation input.
    Secret256 = 0x00030001,

    // =============================================================================
    // Asymmetric Key Pairs (0x0004xxxx)
    // =============================================================================
    /// NIST P-256 key pair.
    EccP256 = 0x00040001,

    /// RSA 2048-bit key pair.
    Rsa2048 = 0x00040002,
}

impl KeyKind {
    /// Raw material length in bytes for symmetric kinds, `None` for
    /// asymmetric pairs whose encoding is driver-defined.
    pub fn material_len(&self) -> Option<usize> {
        match self {
            KeyKind::Aes128 => Some(16),
            KeyKind::Aes192 => Some(24),
            KeyKind::Aes256 => Some(32),
            KeyKind::HmacSha256 | KeyKind::Secret256 => Some(32),
            KeyKind::HmacSha384 => Some(48),
            KeyKind::HmacSha512 => Some(64),
            KeyKind::EccP256 | KeyKind::Rsa2048 => None,
        }
    }

    /// Signature length in bytes for asymmetric kinds, `None` otherwise.
    pub fn signature_len(&self) -> Option<usize> {
        match self {
            KeyKind::EccP256 => Some(64),
            KeyKind::Rsa2048 => Some(256),
            _ => None,
        }
    }

    /// True for key-pair kinds with an exportable public half.
    pub fn is_asymmetric(&self) -> bool {
        matches!(self, KeyKind::EccP256 | KeyKind::Rsa2048)
    }
}

/// Permissions attached to a key.
///
/// The core checks these before dispatching to a driver; an operation the
/// policy does not allow never reaches hardware.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct KeyUsage {
    /// Key may encrypt (cipher, AEAD, or asymmetric encryption).
    pub encrypt: bool,
    /// Key may decrypt.
    pub decrypt: bool,
    /// Key may produce MACs or signatures.
    pub sign: bool,
    /// Key may verify MACs or signatures.
    pub verify: bool,
    /// Key may act as a derivation or agreement input.
    pub derive: bool,
    /// Raw key material may be exported in the clear.
    pub export: bool,
}

impl KeyUsage {
    /// Every permission granted. Intended for tests and tooling.
    pub fn all() -> Self {
        KeyUsage {
            encrypt: true,
            decrypt: true,
            sign: true,
            verify: true,
            derive: true,
            export: true,
        }
    }
}

/// Attributes of a key: what it is, which algorithm it serves, and what the
/// holder may do with it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct KeyAttributes {
    /// Kind of key material.
    pub kind: KeyKind,
    /// Algorithm the key is bound to.
    pub alg: AlgoId,
    /// Usage policy.
    pub usage: KeyUsage,
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_material_len_per_kind() {
        assert_eq!(KeyKind::Aes128.material_len(), Some(16));
        assert_eq!(KeyKind::Aes256.material_len(), Some(32));
        assert_eq!(KeyKind::HmacSha512.material_len(), Some(64));
        assert_eq!(KeyKind::EccP256.material_len(), None);
    }

    #[test]
    fn test_asymmetric_kinds() {
        assert!(KeyKind::EccP256.is_asymmetric());
        assert!(KeyKind::Rsa2048.is_asymmetric());
        assert!(!KeyKind::Aes256.is_asymmetric());
        assert_eq!(KeyKind::EccP256.signature_len(), Some(64));
        assert_eq!(KeyKind::Aes256.signature_len(), None);
    }

    #[test]
    fn test_default_usage_grants_nothing() {
        let usage = KeyUsage::default();
        assert!(!usage.encrypt);
        assert!(!usage.decrypt);
        assert!(!usage.sign);
        assert!(!usage.verify);
        assert!(!usage.derive);
        assert!(!usage.export);
    }
}
