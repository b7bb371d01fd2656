// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![warn(missing_docs)]

//! Secure-element Driver Interface (SDI) library.
//!
//! The contract between the dispatch core and an external secure-element
//! driver. Key material lives behind the driver boundary and is addressed
//! only through opaque [`KeySlot`] values; multi-step state lives in a
//! caller-allocated context buffer whose size the driver declares in its
//! [`DriverCapabilities`] and whose layout only the driver knows.
//!
//! Every operation is optional: each trait method has a default body
//! returning [`SdiError::NotSupported`], so a driver implements a category
//! by overriding the entry points it populates and declaring them in its
//! capabilities. The core consults the declaration before calling, which
//! keeps an undeclared-but-overridden method unreachable.

mod caps;
mod error;

pub use caps::AeadCaps;
pub use caps::AsymCaps;
pub use caps::CapabilityError;
pub use caps::CipherCaps;
pub use caps::DerivationCaps;
pub use caps::DriverCapabilities;
pub use caps::KeyMgmtCaps;
pub use caps::MacCaps;
pub use error::SdiError;
pub use error::SdiResult;
pub use secore_sdi_types::*;

/// MAC category entry points.
///
/// Multi-step flows run setup → update* → finish | finish_verify, with
/// abort legal at any point after setup. The context slice handed to each
/// call is the same caller-owned buffer for the whole flow, sized per the
/// declared `context_size`.
pub trait MacDriver {
    /// Begin a multi-step MAC operation over `key`.
    ///
    /// # Arguments
    /// * `ctx` - driver context buffer, zeroed by the caller
    /// * `key` - slot of the MAC key
    /// * `alg` - MAC algorithm
    fn mac_setup(&self, ctx: &mut [u8], key: KeySlot, alg: AlgoId) -> SdiResult<()> {
        let _ = (ctx, key, alg);
        Err(SdiError::NotSupported)
    }

    /// Feed message bytes into an active MAC operation.
    fn mac_update(&self, ctx: &mut [u8], data: &[u8]) -> SdiResult<()> {
        let _ = (ctx, data);
        Err(SdiError::NotSupported)
    }

    /// Complete the operation and write the MAC into `out`.
    ///
    /// # Returns
    /// * `usize` - number of MAC bytes written
    fn mac_finish(&self, ctx: &mut [u8], out: &mut [u8]) -> SdiResult<usize> {
        let _ = (ctx, out);
        Err(SdiError::NotSupported)
    }

    /// Complete the operation and compare against an expected MAC.
    ///
    /// # Error
    /// * `SdiError::InvalidSignature` - the MACs did not match; this is the
    ///   expected mismatch outcome, not a fault
    fn mac_finish_verify(&self, ctx: &mut [u8], expected: &[u8]) -> SdiResult<()> {
        let _ = (ctx, expected);
        Err(SdiError::NotSupported)
    }

    /// Abandon the operation and release driver-side state.
    fn mac_abort(&self, ctx: &mut [u8]) -> SdiResult<()> {
        let _ = ctx;
        Err(SdiError::NotSupported)
    }

    /// One-shot MAC over `data`.
    ///
    /// # Returns
    /// * `usize` - number of MAC bytes written
    fn mac_compute(
        &self,
        key: KeySlot,
        alg: AlgoId,
        data: &[u8],
        out: &mut [u8],
    ) -> SdiResult<usize> {
        let _ = (key, alg, data, out);
        Err(SdiError::NotSupported)
    }

    /// One-shot MAC verification over `data`.
    ///
    /// # Error
    /// * `SdiError::InvalidSignature` - the MACs did not match
    fn mac_verify(&self, key: KeySlot, alg: AlgoId, data: &[u8], expected: &[u8]) -> SdiResult<()> {
        let _ = (key, alg, data, expected);
        Err(SdiError::NotSupported)
    }
}

/// Symmetric cipher category entry points.
pub trait CipherDriver {
    /// Begin a multi-step cipher operation over `key`.
    fn cipher_setup(
        &self,
        ctx: &mut [u8],
        key: KeySlot,
        alg: AlgoId,
        dir: CipherDirection,
    ) -> SdiResult<()> {
        let _ = (ctx, key, alg, dir);
        Err(SdiError::NotSupported)
    }

    /// Install the IV. Legal once, between setup and the first update;
    /// whether the mode requires an IV at all is the driver's knowledge.
    fn cipher_set_iv(&self, ctx: &mut [u8], iv: &[u8]) -> SdiResult<()> {
        let _ = (ctx, iv);
        Err(SdiError::NotSupported)
    }

    /// Feed data into an active cipher operation.
    ///
    /// # Returns
    /// * `Vec<u8>` - output produced so far; may lag the input while the
    ///   driver buffers partial blocks
    fn cipher_update(&self, ctx: &mut [u8], input: &[u8]) -> SdiResult<Vec<u8>> {
        let _ = (ctx, input);
        Err(SdiError::NotSupported)
    }

    /// Complete the operation, returning any final output.
    fn cipher_finish(&self, ctx: &mut [u8]) -> SdiResult<Vec<u8>> {
        let _ = ctx;
        Err(SdiError::NotSupported)
    }

    /// Abandon the operation and release driver-side state.
    fn cipher_abort(&self, ctx: &mut [u8]) -> SdiResult<()> {
        let _ = ctx;
        Err(SdiError::NotSupported)
    }

    /// Stateless ECB primitive over whole blocks.
    ///
    /// `input` and `output` are the same length, a multiple of the declared
    /// block size. A driver may populate only this entry point and leave
    /// block-mode chaining to the core.
    fn cipher_ecb(
        &self,
        key: KeySlot,
        alg: AlgoId,
        dir: CipherDirection,
        input: &[u8],
        output: &mut [u8],
    ) -> SdiResult<()> {
        let _ = (key, alg, dir, input, output);
        Err(SdiError::NotSupported)
    }
}

/// AEAD category entry points. Single-call only: there is no streaming
/// variant in this model, so unauthenticated plaintext can never escape.
pub trait AeadDriver {
    /// Authenticated encryption.
    ///
    /// # Returns
    /// * `Vec<u8>` - ciphertext with the authentication tag appended
    fn aead_encrypt(
        &self,
        key: KeySlot,
        alg: AlgoId,
        nonce: &[u8],
        aad: &[u8],
        plaintext: &[u8],
    ) -> SdiResult<Vec<u8>> {
        let _ = (key, alg, nonce, aad, plaintext);
        Err(SdiError::NotSupported)
    }

    /// Authenticated decryption of ciphertext with the tag appended.
    ///
    /// # Error
    /// * `SdiError::AuthenticationFailure` - tag mismatch; no plaintext is
    ///   returned
    fn aead_decrypt(
        &self,
        key: KeySlot,
        alg: AlgoId,
        nonce: &[u8],
        aad: &[u8],
        ciphertext: &[u8],
    ) -> SdiResult<Vec<u8>> {
        let _ = (key, alg, nonce, aad, ciphertext);
        Err(SdiError::NotSupported)
    }
}

/// Asymmetric category entry points.
pub trait AsymDriver {
    /// Sign a pre-computed message hash.
    ///
    /// # Returns
    /// * `usize` - number of signature bytes written
    fn asym_sign(
        &self,
        key: KeySlot,
        alg: AlgoId,
        hash: &[u8],
        sig: &mut [u8],
    ) -> SdiResult<usize> {
        let _ = (key, alg, hash, sig);
        Err(SdiError::NotSupported)
    }

    /// Verify a signature over a pre-computed message hash.
    ///
    /// # Error
    /// * `SdiError::InvalidSignature` - the signature did not verify
    fn asym_verify(&self, key: KeySlot, alg: AlgoId, hash: &[u8], sig: &[u8]) -> SdiResult<()> {
        let _ = (key, alg, hash, sig);
        Err(SdiError::NotSupported)
    }

    /// Asymmetric encryption.
    fn asym_encrypt(&self, key: KeySlot, alg: AlgoId, input: &[u8]) -> SdiResult<Vec<u8>> {
        let _ = (key, alg, input);
        Err(SdiError::NotSupported)
    }

    /// Asymmetric decryption.
    fn asym_decrypt(&self, key: KeySlot, alg: AlgoId, input: &[u8]) -> SdiResult<Vec<u8>> {
        let _ = (key, alg, input);
        Err(SdiError::NotSupported)
    }
}

/// Key management category entry points.
///
/// Slot occupancy preconditions are the core's responsibility; a driver may
/// still report `EmptySlot`/`OccupiedSlot` as a defensive double check.
pub trait KeyMgmtDriver {
    /// Import raw key material into `slot`.
    fn key_import(&self, slot: KeySlot, attrs: &KeyAttributes, data: &[u8]) -> SdiResult<()> {
        let _ = (slot, attrs, data);
        Err(SdiError::NotSupported)
    }

    /// Generate key material on-device into `slot`.
    fn key_generate(&self, slot: KeySlot, attrs: &KeyAttributes) -> SdiResult<()> {
        let _ = (slot, attrs);
        Err(SdiError::NotSupported)
    }

    /// Destroy the key in `slot`, wiping volatile and non-volatile copies
    /// as far as the hardware allows.
    fn key_destroy(&self, slot: KeySlot) -> SdiResult<()> {
        let _ = slot;
        Err(SdiError::NotSupported)
    }

    /// Export raw key material in the clear. Policy is enforced by the
    /// core before this is called.
    fn key_export(&self, slot: KeySlot) -> SdiResult<Vec<u8>> {
        let _ = slot;
        Err(SdiError::NotSupported)
    }

    /// Export the public half of a key pair.
    fn key_export_public(&self, slot: KeySlot) -> SdiResult<Vec<u8>> {
        let _ = slot;
        Err(SdiError::NotSupported)
    }
}

/// Key derivation / agreement category entry points.
pub trait DerivationDriver {
    /// Begin a derivation keyed by `source`, producing `dest_size` bytes.
    fn derivation_setup(
        &self,
        ctx: &mut [u8],
        source: KeySlot,
        alg: AlgoId,
        dest_size: usize,
    ) -> SdiResult<()> {
        let _ = (ctx, source, alg, dest_size);
        Err(SdiError::NotSupported)
    }

    /// Supply one named collateral item. The core guarantees each id is
    /// supplied at most once per session.
    fn derivation_collateral(
        &self,
        ctx: &mut [u8],
        id: CollateralId,
        data: &[u8],
    ) -> SdiResult<()> {
        let _ = (ctx, id, data);
        Err(SdiError::NotSupported)
    }

    /// Terminal: write the derived material into `dest` on-device.
    fn derivation_derive(
        &self,
        ctx: &mut [u8],
        dest: KeySlot,
        attrs: &KeyAttributes,
    ) -> SdiResult<()> {
        let _ = (ctx, dest, attrs);
        Err(SdiError::NotSupported)
    }

    /// Terminal: return the derived material in the clear.
    fn derivation_export(&self, ctx: &mut [u8]) -> SdiResult<Vec<u8>> {
        let _ = ctx;
        Err(SdiError::NotSupported)
    }

    /// Abandon the derivation and release driver-side state.
    fn derivation_abort(&self, ctx: &mut [u8]) -> SdiResult<()> {
        let _ = ctx;
        Err(SdiError::NotSupported)
    }
}

/// A complete secure-element driver.
///
/// The capability declaration is the binding half of the contract: the core
/// routes only to entry points declared there, and validates the
/// declaration's internal consistency at registration.
pub trait SeDriver:
    MacDriver
    + CipherDriver
    + AeadDriver
    + AsymDriver
    + KeyMgmtDriver
    + DerivationDriver
    + Send
    + Sync
{
    /// Returns the driver's capability declaration.
    fn capabilities(&self) -> DriverCapabilities;
}
