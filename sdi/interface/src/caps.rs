// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Capability declarations.
//!
//! A driver describes which optional entry points it populates per
//! operation category, plus the in-memory context size it needs for
//! multi-step state. The core allocates exactly that many bytes per active
//! session and never interprets them. Declarations are validated once, at
//! driver registration; a declaration that cannot complete a flow it starts
//! is a configuration error, never a runtime one.

use thiserror::Error;

/// A capability declaration that violates a sibling invariant.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
#[error("invalid {category} capability declaration: {reason}")]
pub struct CapabilityError {
    /// Category the violation was found in.
    pub category: &'static str,
    /// Human-readable rule that was violated.
    pub reason: &'static str,
}

fn fail(category: &'static str, reason: &'static str) -> Result<(), CapabilityError> {
    Err(CapabilityError { category, reason })
}

/// MAC category entry points.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct MacCaps {
    /// Bytes of multi-step context the driver needs.
    pub context_size: usize,
    /// Multi-step setup.
    pub setup: bool,
    /// Multi-step data update.
    pub update: bool,
    /// Multi-step finish producing the MAC.
    pub finish: bool,
    /// Multi-step finish comparing against an expected MAC.
    pub finish_verify: bool,
    /// Multi-step abort.
    pub abort: bool,
    /// One-shot MAC computation.
    pub compute: bool,
    /// One-shot MAC verification.
    pub verify: bool,
}

impl MacCaps {
    fn validate(&self) -> Result<(), CapabilityError> {
        if self.setup {
            if !self.update || !self.abort {
                return fail("mac", "setup requires update and abort");
            }
            if !self.finish && !self.finish_verify {
                return fail("mac", "setup requires a finish variant");
            }
            if self.context_size == 0 {
                return fail("mac", "multi-step entry points require a context size");
            }
        }
        Ok(())
    }
}

/// Cipher category entry points.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct CipherCaps {
    /// Bytes of multi-step context the driver needs.
    pub context_size: usize,
    /// Cipher block size in bytes. Required whenever any cipher entry
    /// point is populated; the core's block-mode chaining depends on it.
    pub block_size: usize,
    /// Multi-step setup.
    pub setup: bool,
    /// IV installation after setup.
    pub set_iv: bool,
    /// Multi-step data update.
    pub update: bool,
    /// Multi-step finish.
    pub finish: bool,
    /// Multi-step abort.
    pub abort: bool,
    /// Stateless whole-block ECB primitive. A driver may populate only
    /// this and let the core chain higher-level block modes over it.
    pub ecb: bool,
}

impl CipherCaps {
    fn validate(&self) -> Result<(), CapabilityError> {
        if self.setup {
            if !self.update || !self.finish || !self.abort {
                return fail("cipher", "setup requires update, finish and abort");
            }
            if self.context_size == 0 {
                return fail("cipher", "multi-step entry points require a context size");
            }
        }
        if (self.setup || self.ecb) && self.block_size == 0 {
            return fail("cipher", "cipher entry points require a block size");
        }
        Ok(())
    }
}

/// AEAD category entry points. Single-call only by design.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct AeadCaps {
    /// One-shot authenticated encryption.
    pub encrypt: bool,
    /// One-shot authenticated decryption.
    pub decrypt: bool,
}

/// Asymmetric category entry points.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct AsymCaps {
    /// Sign a pre-computed hash.
    pub sign: bool,
    /// Verify a signature over a pre-computed hash.
    pub verify: bool,
    /// Asymmetric encryption.
    pub encrypt: bool,
    /// Asymmetric decryption.
    pub decrypt: bool,
}

/// Key management category entry points.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct KeyMgmtCaps {
    /// Import raw key material into a slot.
    pub import: bool,
    /// Generate key material on-device.
    pub generate: bool,
    /// Destroy a slot's key material.
    pub destroy: bool,
    /// Export raw key material in the clear.
    pub export: bool,
    /// Export the public half of a key pair.
    pub export_public: bool,
}

impl KeyMgmtCaps {
    fn validate(&self) -> Result<(), CapabilityError> {
        // A driver that can create keys must be able to wipe them.
        if (self.import || self.generate) && !self.destroy {
            return fail("key management", "import or generate requires destroy");
        }
        Ok(())
    }
}

/// Key derivation / agreement category entry points.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct DerivationCaps {
    /// Bytes of derivation context the driver needs.
    pub context_size: usize,
    /// Derivation setup.
    pub setup: bool,
    /// Collateral input.
    pub collateral: bool,
    /// Terminal derive into a new on-device key.
    pub derive: bool,
    /// Terminal export of the derived material in the clear.
    pub export: bool,
    /// Derivation abort.
    pub abort: bool,
}

impl DerivationCaps {
    fn validate(&self) -> Result<(), CapabilityError> {
        if self.setup {
            if !self.collateral || !self.abort {
                return fail("derivation", "setup requires collateral and abort");
            }
            if !self.derive && !self.export {
                return fail("derivation", "setup requires a terminal entry point");
            }
            if self.context_size == 0 {
                return fail("derivation", "setup requires a context size");
            }
        }
        Ok(())
    }
}

/// Everything one driver declares, one record per category it implements.
///
/// `None` means the whole category is unsupported; inside a category, a
/// `false` entry means that single operation is unsupported.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct DriverCapabilities {
    /// MAC operations.
    pub mac: Option<MacCaps>,
    /// Symmetric cipher operations.
    pub cipher: Option<CipherCaps>,
    /// AEAD operations.
    pub aead: Option<AeadCaps>,
    /// Asymmetric operations.
    pub asym: Option<AsymCaps>,
    /// Key management operations.
    pub key_mgmt: Option<KeyMgmtCaps>,
    /// Key derivation operations.
    pub derivation: Option<DerivationCaps>,
}

impl DriverCapabilities {
    /// Checks every declared category against its sibling invariants.
    ///
    /// # Returns
    /// * `Ok(())` - the declaration can complete every flow it starts
    /// * `Err(CapabilityError)` - the first violated rule
    pub fn validate(&self) -> Result<(), CapabilityError> {
        if let Some(mac) = &self.mac {
            mac.validate()?;
        }
        if let Some(cipher) = &self.cipher {
            cipher.validate()?;
        }
        if let Some(key_mgmt) = &self.key_mgmt {
            key_mgmt.validate()?;
        }
        if let Some(derivation) = &self.derivation {
            derivation.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn full_mac() -> MacCaps {
        MacCaps {
            context_size: 16,
            setup: true,
            update: true,
            finish: true,
            finish_verify: true,
            abort: true,
            compute: true,
            verify: true,
        }
    }

    #[test]
    fn test_empty_declaration_is_valid() {
        assert!(DriverCapabilities::default().validate().is_ok());
    }

    #[test]
    fn test_mac_setup_without_update_rejected() {
        let caps = DriverCapabilities {
            mac: Some(MacCaps {
                update: false,
                ..full_mac()
            }),
            ..Default::default()
        };
        let err = caps.validate().unwrap_err();
        assert_eq!(err.category, "mac");
    }

    #[test]
    fn test_mac_setup_without_finish_variant_rejected() {
        let caps = DriverCapabilities {
            mac: Some(MacCaps {
                finish: false,
                finish_verify: false,
                ..full_mac()
            }),
            ..Default::default()
        };
        assert!(caps.validate().is_err());
    }

    #[test]
    fn test_mac_setup_without_context_size_rejected() {
        let caps = DriverCapabilities {
            mac: Some(MacCaps {
                context_size: 0,
                ..full_mac()
            }),
            ..Default::default()
        };
        assert!(caps.validate().is_err());
    }

    #[test]
    fn test_cipher_ecb_only_needs_block_size() {
        let good = DriverCapabilities {
            cipher: Some(CipherCaps {
                block_size: 16,
                ecb: true,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(good.validate().is_ok());

        let bad = DriverCapabilities {
            cipher: Some(CipherCaps {
                ecb: true,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(bad.validate().unwrap_err().category, "cipher");
    }

    #[test]
    fn test_key_mgmt_import_without_destroy_rejected() {
        let caps = DriverCapabilities {
            key_mgmt: Some(KeyMgmtCaps {
                import: true,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(caps.validate().unwrap_err().category, "key management");
    }

    #[test]
    fn test_derivation_setup_without_terminal_rejected() {
        let caps = DriverCapabilities {
            derivation: Some(DerivationCaps {
                context_size: 16,
                setup: true,
                collateral: true,
                abort: true,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(caps.validate().unwrap_err().category, "derivation");
    }
}
