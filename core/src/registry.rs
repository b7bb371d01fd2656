// Copyright (C) Microsoft Corporation. All rights reserved.

//! Key handle bookkeeping.
//!
//! The registry maps the opaque handles the core hands out to the driver
//! and slot that actually hold the key. It also tracks per-key busy state
//! and per-driver slot occupancy so that two operations can never race into
//! one slot. No key material ever passes through here.

use std::collections::HashMap;
use std::collections::HashSet;

use secore_sdi::DriverId;
use secore_sdi::KeyAttributes;
use secore_sdi::KeyHandle;
use secore_sdi::KeySlot;

use crate::error::SeError;
use crate::error::SeResult;

/// Everything the core remembers about one live key.
#[derive(Debug, Copy, Clone)]
pub(crate) struct KeyEntry {
    /// Driver holding the material.
    pub driver: DriverId,
    /// Slot within that driver.
    pub slot: KeySlot,
    /// Attributes fixed at creation.
    pub attrs: KeyAttributes,
    /// Set while a multi-step operation holds the key.
    pub busy: bool,
}

#[derive(Default)]
pub(crate) struct Registry {
    entries: HashMap<KeyHandle, KeyEntry>,
    occupied: HashSet<(DriverId, KeySlot)>,
    last_handle: u64,
}

impl Registry {
    /// Reserves a slot ahead of handing it to a driver.
    ///
    /// The claim must be released again if the driver call that was meant
    /// to populate the slot fails.
    pub fn claim_slot(&mut self, driver: DriverId, slot: KeySlot) -> SeResult<()> {
        if !self.occupied.insert((driver, slot)) {
            return Err(SeError::OccupiedSlot);
        }
        Ok(())
    }

    /// Releases a slot claim without touching any handle.
    pub fn release_slot(&mut self, driver: DriverId, slot: KeySlot) {
        self.occupied.remove(&(driver, slot));
    }

    /// Mints a fresh handle.
    ///
    /// Handles are never reused within one core instance, so a stale handle
    /// held past destruction can only miss, not alias a newer key.
    pub fn mint(&mut self) -> KeyHandle {
        self.last_handle += 1;
        KeyHandle(self.last_handle)
    }

    /// Registers an entry under a handle.
    pub fn register(&mut self, handle: KeyHandle, entry: KeyEntry) -> SeResult<()> {
        if self.entries.contains_key(&handle) {
            return Err(SeError::DuplicateHandle);
        }
        self.entries.insert(handle, entry);
        Ok(())
    }

    /// Registers a freshly populated slot under a new handle.
    pub fn insert(
        &mut self,
        driver: DriverId,
        slot: KeySlot,
        attrs: KeyAttributes,
    ) -> SeResult<KeyHandle> {
        let handle = self.mint();
        self.register(
            handle,
            KeyEntry {
                driver,
                slot,
                attrs,
                busy: false,
            },
        )?;
        Ok(handle)
    }

    pub fn get(&self, handle: KeyHandle) -> SeResult<&KeyEntry> {
        self.entries.get(&handle).ok_or(SeError::UnknownHandle)
    }

    pub fn get_mut(&mut self, handle: KeyHandle) -> SeResult<&mut KeyEntry> {
        self.entries.get_mut(&handle).ok_or(SeError::UnknownHandle)
    }

    /// Removes a handle and frees its slot claim.
    pub fn remove(&mut self, handle: KeyHandle) -> SeResult<KeyEntry> {
        let entry = self
            .entries
            .remove(&handle)
            .ok_or(SeError::UnknownHandle)?;
        self.occupied.remove(&(entry.driver, entry.slot));
        Ok(entry)
    }

    /// Empties the whole registry, handing back every entry for wiping.
    pub fn drain(&mut self) -> Vec<(KeyHandle, KeyEntry)> {
        self.occupied.clear();
        self.entries.drain().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
