// Copyright (C) Microsoft Corporation. All rights reserved.

//! Key derivation and agreement dispatch.

use secore_sdi::AlgoId;
use secore_sdi::CollateralId;
use secore_sdi::DerivationCaps;
use secore_sdi::KeyAttributes;
use secore_sdi::KeyHandle;
use secore_sdi::KeySlot;
use tracing::debug;
use tracing::error;
use tracing::instrument;
use zeroize::Zeroize;
use zeroize::Zeroizing;

use crate::dispatch::ResolvedKey;
use crate::dispatch::SeCore;
use crate::error::SeError;
use crate::error::SeResult;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum KdfPhase {
    Idle,
    Configured,
    Collecting,
    Derived,
    Exported,
    Aborted,
}

struct ActiveKdf {
    core: SeCore,
    key: ResolvedKey,
    caps: DerivationCaps,
    ctx: Vec<u8>,
    seen: Vec<CollateralId>,
}

/// A key derivation or agreement operation bound to one source key.
///
/// Lifecycle: `Idle → setup → Configured → collateral* → Collecting →
/// derive | export → Derived/Exported`, with `abort` legal from any
/// non-terminal state. Exactly one terminal call is allowed; the second
/// fails with `InvalidState`.
///
/// Derivation output either lands on-device as a new key of the *same*
/// driver (`derive`) or is returned in the clear (`export`); the driver
/// decides which of the two it supports via its capability declaration.
pub struct KdfSession {
    phase: KdfPhase,
    active: Option<ActiveKdf>,
}

impl KdfSession {
    /// Creates an idle session with no key bound.
    pub fn new() -> Self {
        KdfSession {
            phase: KdfPhase::Idle,
            active: None,
        }
    }

    /// Binds the session to a source key and derivation algorithm.
    ///
    /// # Arguments
    /// * `core` - The core the source key lives in.
    /// * `key` - Handle of the source key; needs the `derive` usage bit.
    /// * `alg` - Derivation or agreement algorithm.
    /// * `dest_size` - Bytes of material the terminal call must produce.
    ///
    /// # Errors
    /// * `InvalidState` - the session already left `Idle`
    /// * `KeyBusy` - another operation holds the source key
    /// * `NotPermitted` - the key lacks the `derive` usage bit
    /// * `NotSupported` - the driver has no derivation entry points
    #[instrument(skip_all, fields(key = key.0, algo = ?alg, dest_size))]
    pub fn setup(
        &mut self,
        core: &SeCore,
        key: KeyHandle,
        alg: AlgoId,
        dest_size: usize,
    ) -> SeResult<()> {
        if self.phase != KdfPhase::Idle {
            return Err(SeError::InvalidState);
        }
        let resolved = core.reserve(key)?;
        if !resolved.attrs.usage.derive {
            return Err(SeError::NotPermitted);
        }
        let caps = resolved
            .driver
            .capabilities()
            .derivation
            .ok_or(SeError::NotSupported)?;
        if !caps.setup {
            return Err(SeError::NotSupported);
        }

        let mut ctx = vec![0u8; caps.context_size];
        if let Err(err) = core.timed(|| {
            resolved
                .driver
                .derivation_setup(&mut ctx, resolved.slot, alg, dest_size)
        }) {
            ctx.zeroize();
            return Err(err);
        }

        self.active = Some(ActiveKdf {
            core: core.clone(),
            key: resolved,
            caps,
            ctx,
            seen: Vec::new(),
        });
        self.phase = KdfPhase::Configured;
        debug!("derivation session configured");
        Ok(())
    }

    /// Supplies one collateral input.
    ///
    /// Callable any number of times before the terminal call. Order between
    /// different ids is insignificant; the same id twice is rejected before
    /// the driver sees it.
    ///
    /// # Errors
    /// * `InvalidState` - the session is not collecting
    /// * `DuplicateCollateral` - this id was already supplied
    pub fn collateral(&mut self, id: CollateralId, data: &[u8]) -> SeResult<()> {
        if !matches!(self.phase, KdfPhase::Configured | KdfPhase::Collecting) {
            return Err(SeError::InvalidState);
        }
        let Some(s) = self.active.as_mut() else {
            return Err(SeError::InvalidState);
        };
        if s.seen.contains(&id) {
            return Err(SeError::DuplicateCollateral);
        }
        let result = s
            .core
            .timed(|| s.key.driver.derivation_collateral(&mut s.ctx, id, data));
        if let Err(err) = result {
            self.fail();
            return Err(err);
        }
        s.seen.push(id);
        self.phase = KdfPhase::Collecting;
        Ok(())
    }

    /// Lands the derived material on-device as a new key. Terminal.
    ///
    /// The destination slot belongs to the same driver as the source key;
    /// cross-driver derivation is impossible in the opaque model.
    ///
    /// # Arguments
    /// * `slot` - Destination slot within the source key's driver.
    /// * `attrs` - Attributes of the new key.
    ///
    /// # Returns
    /// * Handle of the freshly registered key.
    ///
    /// # Errors
    /// * `InvalidState` - the session is not collecting
    /// * `NotSupported` - the driver cannot derive on-device
    /// * `OccupiedSlot` - the destination slot already holds a key
    #[instrument(skip_all, fields(slot = slot.0))]
    pub fn derive(&mut self, slot: KeySlot, attrs: KeyAttributes) -> SeResult<KeyHandle> {
        if !matches!(self.phase, KdfPhase::Configured | KdfPhase::Collecting) {
            return Err(SeError::InvalidState);
        }
        let Some(s) = self.active.as_mut() else {
            return Err(SeError::InvalidState);
        };
        if !s.caps.derive {
            return Err(SeError::NotSupported);
        }
        let driver_id = s.key.driver_id;
        let core = s.core.clone();
        core.claim_slot(driver_id, slot)?;

        if let Err(err) = core.timed(|| s.key.driver.derivation_derive(&mut s.ctx, slot, &attrs)) {
            core.release_slot(driver_id, slot);
            self.fail();
            return Err(err);
        }
        let handle = match core.register_key(driver_id, slot, attrs) {
            Ok(handle) => handle,
            Err(err) => {
                // The driver now holds a key the registry refused to track.
                error!(slot = slot.0, "derived key could not be registered");
                core.release_slot(driver_id, slot);
                self.fail();
                return Err(err);
            }
        };
        self.complete(KdfPhase::Derived);
        debug!(key = handle.0, "derived key registered");
        Ok(handle)
    }

    /// Returns the derived material in the clear. Terminal.
    ///
    /// # Returns
    /// * The material, in a buffer wiped on drop.
    ///
    /// # Errors
    /// * `InvalidState` - the session is not collecting
    /// * `NotSupported` - the driver cannot export derivation output
    #[instrument(skip_all)]
    pub fn export(&mut self) -> SeResult<Zeroizing<Vec<u8>>> {
        if !matches!(self.phase, KdfPhase::Configured | KdfPhase::Collecting) {
            return Err(SeError::InvalidState);
        }
        let Some(s) = self.active.as_mut() else {
            return Err(SeError::InvalidState);
        };
        if !s.caps.export {
            return Err(SeError::NotSupported);
        }
        match s.core.timed(|| s.key.driver.derivation_export(&mut s.ctx)) {
            Ok(material) => {
                let material = Zeroizing::new(material);
                self.complete(KdfPhase::Exported);
                debug!(len = material.len(), "derivation output exported");
                Ok(material)
            }
            Err(err) => {
                self.fail();
                Err(err)
            }
        }
    }

    /// Abandons the derivation. Legal from any non-terminal state.
    ///
    /// # Errors
    /// * `InvalidState` - the session is already terminal
    #[instrument(skip_all)]
    pub fn abort(&mut self) -> SeResult<()> {
        match self.phase {
            KdfPhase::Derived | KdfPhase::Exported | KdfPhase::Aborted => {
                Err(SeError::InvalidState)
            }
            KdfPhase::Idle => {
                self.phase = KdfPhase::Aborted;
                Ok(())
            }
            KdfPhase::Configured | KdfPhase::Collecting => {
                self.phase = KdfPhase::Aborted;
                let Some(mut s) = self.active.take() else {
                    return Ok(());
                };
                let result = s.core.timed(|| s.key.driver.derivation_abort(&mut s.ctx));
                s.ctx.zeroize();
                debug!("derivation session aborted");
                result
            }
        }
    }

    fn complete(&mut self, phase: KdfPhase) {
        if let Some(mut s) = self.active.take() {
            s.ctx.zeroize();
        }
        self.phase = phase;
    }

    fn fail(&mut self) {
        self.discard();
        self.phase = KdfPhase::Aborted;
    }

    fn discard(&mut self) {
        if let Some(mut s) = self.active.take() {
            if let Err(err) = s.key.driver.derivation_abort(&mut s.ctx) {
                debug!(?err, "driver context discard failed");
            }
            s.ctx.zeroize();
        }
    }
}

impl Default for KdfSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for KdfSession {
    fn drop(&mut self) {
        if self.active.is_some() {
            debug!("derivation session dropped while active");
            self.discard();
        }
    }
}
