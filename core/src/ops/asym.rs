// Copyright (C) Microsoft Corporation. All rights reserved.

//! Asymmetric dispatch. One-shot only: hashing happens on the caller's
//! side and only the digest crosses the driver boundary.

use secore_sdi::AlgoId;
use secore_sdi::KeyHandle;
use tracing::instrument;

use crate::dispatch::SeCore;
use crate::error::SeError;
use crate::error::SeResult;
use crate::session::verdict_from;
use crate::session::Verdict;

impl SeCore {
    /// Signs a pre-computed hash.
    ///
    /// # Arguments
    /// * `key` - Handle of the private key; needs the `sign` usage bit.
    /// * `alg` - Signature algorithm.
    /// * `hash` - The digest to sign.
    /// * `sig` - Destination buffer for the signature.
    ///
    /// # Returns
    /// * Number of signature bytes written.
    ///
    /// # Errors
    /// * `UnknownHandle` - the handle names no live key
    /// * `KeyBusy` - an operation holds the key
    /// * `NotPermitted` - the key's policy forbids signing
    /// * `NotSupported` - the driver has no sign entry point
    /// * `InsufficientBufferSize` - `sig` is smaller than the key kind's
    ///   signature size
    #[instrument(skip_all, fields(key = key.0, algo = ?alg))]
    pub fn sign_hash(
        &self,
        key: KeyHandle,
        alg: AlgoId,
        hash: &[u8],
        sig: &mut [u8],
    ) -> SeResult<usize> {
        let resolved = self.reserve(key)?;
        if !resolved.attrs.usage.sign {
            return Err(SeError::NotPermitted);
        }
        let caps = resolved
            .driver
            .capabilities()
            .asym
            .ok_or(SeError::NotSupported)?;
        if !caps.sign {
            return Err(SeError::NotSupported);
        }
        if let Some(required) = resolved.attrs.kind.signature_len() {
            if sig.len() < required {
                return Err(SeError::InsufficientBufferSize { required });
            }
        }
        self.timed(|| resolved.driver.asym_sign(resolved.slot, alg, hash, sig))
    }

    /// Verifies a signature over a pre-computed hash.
    ///
    /// # Returns
    /// * `Verdict::Match` / `Verdict::Mismatch` - the comparison outcome;
    ///   a mismatch is data, not an error
    ///
    /// # Errors
    /// * `UnknownHandle` - the handle names no live key
    /// * `KeyBusy` - an operation holds the key
    /// * `NotPermitted` - the key's policy forbids verification
    /// * `NotSupported` - the driver has no verify entry point
    #[instrument(skip_all, fields(key = key.0, algo = ?alg))]
    pub fn verify_hash(
        &self,
        key: KeyHandle,
        alg: AlgoId,
        hash: &[u8],
        sig: &[u8],
    ) -> SeResult<Verdict> {
        let resolved = self.reserve(key)?;
        if !resolved.attrs.usage.verify {
            return Err(SeError::NotPermitted);
        }
        let caps = resolved
            .driver
            .capabilities()
            .asym
            .ok_or(SeError::NotSupported)?;
        if !caps.verify {
            return Err(SeError::NotSupported);
        }
        verdict_from(self.timed(|| resolved.driver.asym_verify(resolved.slot, alg, hash, sig)))
    }

    /// Asymmetric encryption with the key's public half.
    ///
    /// # Errors
    /// * `UnknownHandle` - the handle names no live key
    /// * `KeyBusy` - an operation holds the key
    /// * `NotPermitted` - the key's policy forbids encryption
    /// * `NotSupported` - the driver has no encrypt entry point
    #[instrument(skip_all, fields(key = key.0, algo = ?alg))]
    pub fn asym_encrypt(&self, key: KeyHandle, alg: AlgoId, input: &[u8]) -> SeResult<Vec<u8>> {
        let resolved = self.reserve(key)?;
        if !resolved.attrs.usage.encrypt {
            return Err(SeError::NotPermitted);
        }
        let caps = resolved
            .driver
            .capabilities()
            .asym
            .ok_or(SeError::NotSupported)?;
        if !caps.encrypt {
            return Err(SeError::NotSupported);
        }
        self.timed(|| resolved.driver.asym_encrypt(resolved.slot, alg, input))
    }

    /// Asymmetric decryption with the key's private half.
    ///
    /// # Errors
    /// * `UnknownHandle` - the handle names no live key
    /// * `KeyBusy` - an operation holds the key
    /// * `NotPermitted` - the key's policy forbids decryption
    /// * `NotSupported` - the driver has no decrypt entry point
    #[instrument(skip_all, fields(key = key.0, algo = ?alg))]
    pub fn asym_decrypt(&self, key: KeyHandle, alg: AlgoId, input: &[u8]) -> SeResult<Vec<u8>> {
        let resolved = self.reserve(key)?;
        if !resolved.attrs.usage.decrypt {
            return Err(SeError::NotPermitted);
        }
        let caps = resolved
            .driver
            .capabilities()
            .asym
            .ok_or(SeError::NotSupported)?;
        if !caps.decrypt {
            return Err(SeError::NotSupported);
        }
        self.timed(|| resolved.driver.asym_decrypt(resolved.slot, alg, input))
    }
}
