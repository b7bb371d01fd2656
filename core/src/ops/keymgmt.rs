// Copyright (C) Microsoft Corporation. All rights reserved.

//! Key management dispatch.

use secore_sdi::DriverId;
use secore_sdi::KeyAttributes;
use secore_sdi::KeyHandle;
use secore_sdi::KeySlot;
use tracing::debug;
use tracing::error;
use tracing::instrument;
use zeroize::Zeroizing;

use crate::dispatch::SeCore;
use crate::error::SeError;
use crate::error::SeResult;

impl SeCore {
    /// Imports raw key material into a driver slot.
    ///
    /// Slot occupancy is a core-checked precondition; the driver is not
    /// consulted for a slot the core already knows to be taken. On driver
    /// success a fresh handle is minted and registered.
    ///
    /// # Arguments
    /// * `driver` - The driver that will hold the key.
    /// * `slot` - Destination slot within that driver.
    /// * `attrs` - Attributes fixed for the key's lifetime.
    /// * `data` - Raw key material, in the driver's expected encoding.
    ///
    /// # Returns
    /// * Handle of the imported key.
    ///
    /// # Errors
    /// * `UnknownDriver` - no driver is registered under `driver`
    /// * `NotSupported` - the driver cannot import keys
    /// * `OccupiedSlot` - the slot already holds a key
    #[instrument(skip_all, fields(driver = driver.0, slot = slot.0))]
    pub fn import_key(
        &self,
        driver: DriverId,
        slot: KeySlot,
        attrs: KeyAttributes,
        data: &[u8],
    ) -> SeResult<KeyHandle> {
        let drv = self.driver_entry(driver)?;
        let caps = drv.capabilities().key_mgmt.ok_or(SeError::NotSupported)?;
        if !caps.import {
            return Err(SeError::NotSupported);
        }
        self.claim_slot(driver, slot)?;
        if let Err(err) = self.timed(|| drv.key_import(slot, &attrs, data)) {
            self.release_slot(driver, slot);
            return Err(err);
        }
        match self.register_key(driver, slot, attrs) {
            Ok(handle) => {
                debug!(key = handle.0, "key imported");
                Ok(handle)
            }
            Err(err) => {
                error!(slot = slot.0, "imported key could not be registered");
                self.release_slot(driver, slot);
                Err(err)
            }
        }
    }

    /// Generates key material on-device.
    ///
    /// Same preconditions and bookkeeping as [`import_key`]; the material
    /// never exists outside the driver.
    ///
    /// # Errors
    /// * `UnknownDriver` - no driver is registered under `driver`
    /// * `NotSupported` - the driver cannot generate keys
    /// * `OccupiedSlot` - the slot already holds a key
    ///
    /// [`import_key`]: SeCore::import_key
    #[instrument(skip_all, fields(driver = driver.0, slot = slot.0))]
    pub fn generate_key(
        &self,
        driver: DriverId,
        slot: KeySlot,
        attrs: KeyAttributes,
    ) -> SeResult<KeyHandle> {
        let drv = self.driver_entry(driver)?;
        let caps = drv.capabilities().key_mgmt.ok_or(SeError::NotSupported)?;
        if !caps.generate {
            return Err(SeError::NotSupported);
        }
        self.claim_slot(driver, slot)?;
        if let Err(err) = self.timed(|| drv.key_generate(slot, &attrs)) {
            self.release_slot(driver, slot);
            return Err(err);
        }
        match self.register_key(driver, slot, attrs) {
            Ok(handle) => {
                debug!(key = handle.0, "key generated");
                Ok(handle)
            }
            Err(err) => {
                error!(slot = slot.0, "generated key could not be registered");
                self.release_slot(driver, slot);
                Err(err)
            }
        }
    }

    /// Exports raw key material in the clear.
    ///
    /// The core checks the key's `export` usage bit itself, before any
    /// driver call; the driver is never relied on for policy.
    ///
    /// # Returns
    /// * The material, in a buffer wiped on drop.
    ///
    /// # Errors
    /// * `UnknownHandle` - the handle names no live key
    /// * `KeyBusy` - an operation holds the key
    /// * `NotPermitted` - the key's policy forbids export
    /// * `NotSupported` - the driver cannot export material
    #[instrument(skip_all, fields(key = key.0))]
    pub fn export_key(&self, key: KeyHandle) -> SeResult<Zeroizing<Vec<u8>>> {
        let resolved = self.reserve(key)?;
        if !resolved.attrs.usage.export {
            return Err(SeError::NotPermitted);
        }
        let caps = resolved
            .driver
            .capabilities()
            .key_mgmt
            .ok_or(SeError::NotSupported)?;
        if !caps.export {
            return Err(SeError::NotSupported);
        }
        let material = self.timed(|| resolved.driver.key_export(resolved.slot))?;
        Ok(Zeroizing::new(material))
    }

    /// Exports the public half of an asymmetric key.
    ///
    /// Public material is exportable regardless of the `export` usage bit.
    ///
    /// # Errors
    /// * `UnknownHandle` - the handle names no live key
    /// * `KeyBusy` - an operation holds the key
    /// * `InvalidArgument` - the key is not an asymmetric key
    /// * `NotSupported` - the driver cannot export public halves
    #[instrument(skip_all, fields(key = key.0))]
    pub fn export_public_key(&self, key: KeyHandle) -> SeResult<Vec<u8>> {
        let resolved = self.reserve(key)?;
        if !resolved.attrs.kind.is_asymmetric() {
            return Err(SeError::InvalidArgument);
        }
        let caps = resolved
            .driver
            .capabilities()
            .key_mgmt
            .ok_or(SeError::NotSupported)?;
        if !caps.export_public {
            return Err(SeError::NotSupported);
        }
        self.timed(|| resolved.driver.key_export_public(resolved.slot))
    }

    /// Destroys a key: driver wipe plus registry removal.
    ///
    /// Bookkeeping removal is unconditional. A driver that fails to wipe is
    /// logged and the handle still dies.
    ///
    /// # Errors
    /// * `UnknownHandle` - the handle names no live key
    /// * `KeyBusy` - a session holds the key; finish or abort it first
    #[instrument(skip_all, fields(key = key.0))]
    pub fn destroy_key(&self, key: KeyHandle) -> SeResult<()> {
        let entry = self.remove_key_if_idle(key)?;
        let Ok(driver) = self.driver_entry(entry.driver) else {
            // Driver already unregistered; nothing left to wipe.
            return Ok(());
        };
        if let Err(err) = self.timed(|| driver.key_destroy(entry.slot)) {
            error!(key = key.0, slot = entry.slot.0, ?err, "key wipe failed");
        }
        debug!(key = key.0, "key destroyed");
        Ok(())
    }
}
