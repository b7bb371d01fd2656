// Copyright (C) Microsoft Corporation. All rights reserved.

//! AEAD dispatch. Single-call only; there is no streaming AEAD path, so a
//! forged message can never yield partial plaintext.

use secore_sdi::AlgoId;
use secore_sdi::KeyHandle;
use tracing::instrument;

use crate::dispatch::SeCore;
use crate::error::SeError;
use crate::error::SeResult;

impl SeCore {
    /// Authenticated encryption in one call.
    ///
    /// # Arguments
    /// * `key` - Handle of the AEAD key; needs the `encrypt` usage bit.
    /// * `alg` - AEAD algorithm.
    /// * `nonce` - Per-message nonce; uniqueness is the caller's duty.
    /// * `aad` - Additional data, authenticated but not encrypted.
    /// * `plaintext` - Message to protect.
    ///
    /// # Returns
    /// * Ciphertext with the authentication tag appended.
    ///
    /// # Errors
    /// * `UnknownHandle` - the handle names no live key
    /// * `KeyBusy` - an operation holds the key
    /// * `NotPermitted` - the key's policy forbids encryption
    /// * `NotSupported` - the driver has no AEAD encrypt entry point
    #[instrument(skip_all, fields(key = key.0, algo = ?alg))]
    pub fn aead_encrypt(
        &self,
        key: KeyHandle,
        alg: AlgoId,
        nonce: &[u8],
        aad: &[u8],
        plaintext: &[u8],
    ) -> SeResult<Vec<u8>> {
        let resolved = self.reserve(key)?;
        if !resolved.attrs.usage.encrypt {
            return Err(SeError::NotPermitted);
        }
        let caps = resolved
            .driver
            .capabilities()
            .aead
            .ok_or(SeError::NotSupported)?;
        if !caps.encrypt {
            return Err(SeError::NotSupported);
        }
        self.timed(|| {
            resolved
                .driver
                .aead_encrypt(resolved.slot, alg, nonce, aad, plaintext)
        })
    }

    /// Authenticated decryption in one call.
    ///
    /// Atomic: the tag is verified over the nonce, the additional data and
    /// the whole ciphertext before any plaintext is released.
    ///
    /// # Arguments
    /// * `ciphertext` - Ciphertext with the tag appended, as produced by
    ///   [`aead_encrypt`](SeCore::aead_encrypt).
    ///
    /// # Errors
    /// * `UnknownHandle` - the handle names no live key
    /// * `KeyBusy` - an operation holds the key
    /// * `NotPermitted` - the key's policy forbids decryption
    /// * `NotSupported` - the driver has no AEAD decrypt entry point
    /// * `AuthenticationFailure` - the tag does not verify
    #[instrument(skip_all, fields(key = key.0, algo = ?alg))]
    pub fn aead_decrypt(
        &self,
        key: KeyHandle,
        alg: AlgoId,
        nonce: &[u8],
        aad: &[u8],
        ciphertext: &[u8],
    ) -> SeResult<Vec<u8>> {
        let resolved = self.reserve(key)?;
        if !resolved.attrs.usage.decrypt {
            return Err(SeError::NotPermitted);
        }
        let caps = resolved
            .driver
            .capabilities()
            .aead
            .ok_or(SeError::NotSupported)?;
        if !caps.decrypt {
            return Err(SeError::NotSupported);
        }
        self.timed(|| {
            resolved
                .driver
                .aead_decrypt(resolved.slot, alg, nonce, aad, ciphertext)
        })
    }
}
