// Copyright (C) Microsoft Corporation. All rights reserved.

//! Driver registration and dispatch plumbing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use secore_sdi::DriverId;
use secore_sdi::KeyAttributes;
use secore_sdi::KeyHandle;
use secore_sdi::KeySlot;
use secore_sdi::SdiResult;
use secore_sdi::SeDriver;
use tracing::debug;
use tracing::error;
use tracing::instrument;

use crate::config::CoreConfig;
use crate::error::SeError;
use crate::error::SeResult;
use crate::registry::KeyEntry;
use crate::registry::Registry;

struct CoreInner {
    config: CoreConfig,
    drivers: HashMap<DriverId, Arc<dyn SeDriver>>,
    registry: Registry,
}

/// The dispatch core.
///
/// Owns the driver table and key registry and routes every operation to the
/// driver holding the addressed key. Handles are per-instance; clones share
/// one underlying core.
///
/// Driver entry points are always invoked with no core lock held, so a slow
/// driver can never stall unrelated operations.
#[derive(Clone)]
pub struct SeCore {
    inner: Arc<RwLock<CoreInner>>,
}

/// Releases a key's busy reservation when the operation holding it ends.
pub(crate) struct BusyGuard {
    core: SeCore,
    handle: KeyHandle,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        let mut inner = self.core.inner.write();
        match inner.registry.get_mut(self.handle) {
            Ok(entry) => entry.busy = false,
            // Teardown drains the registry even under open sessions.
            Err(_) => debug!(handle = self.handle.0, "busy release on missing handle"),
        }
    }
}

/// A key resolved for a multi-step operation.
///
/// Holds the driver alive and keeps the key reserved until dropped.
pub(crate) struct ResolvedKey {
    pub driver: Arc<dyn SeDriver>,
    pub driver_id: DriverId,
    pub slot: KeySlot,
    pub attrs: KeyAttributes,
    _guard: BusyGuard,
}

impl SeCore {
    /// Creates an empty core. No drivers, no keys.
    pub fn new(config: CoreConfig) -> Self {
        SeCore {
            inner: Arc::new(RwLock::new(CoreInner {
                config,
                drivers: HashMap::new(),
                registry: Registry::default(),
            })),
        }
    }

    /// Registers a driver under `id`.
    ///
    /// The driver's capability declaration is validated here, once; a
    /// declaration that cannot complete a flow it starts is rejected and the
    /// driver is not registered.
    ///
    /// # Errors
    /// * `InvalidArgument` - `id` is zero
    /// * `Capability` - the declaration violates a sibling rule
    /// * `DuplicateDriver` - `id` is already taken
    #[instrument(skip_all, fields(driver = id.0))]
    pub fn register_driver(&self, id: DriverId, driver: Arc<dyn SeDriver>) -> SeResult<()> {
        if id.0 == 0 {
            return Err(SeError::InvalidArgument);
        }
        driver.capabilities().validate()?;

        let mut inner = self.inner.write();
        if inner.drivers.contains_key(&id) {
            return Err(SeError::DuplicateDriver);
        }
        inner.drivers.insert(id, driver);
        debug!("driver registered");
        Ok(())
    }

    /// Number of live key handles.
    pub fn registered_keys(&self) -> usize {
        self.inner.read().registry.len()
    }

    /// Unregisters every driver and erases every key.
    ///
    /// Bookkeeping is dropped unconditionally; a driver that fails to wipe
    /// its material is logged and skipped. Handles minted by this core are
    /// all dead afterwards.
    #[instrument(skip_all)]
    pub fn teardown(&self) {
        let (keys, drivers) = {
            let mut inner = self.inner.write();
            let keys = inner.registry.drain();
            let drivers: HashMap<_, _> = inner.drivers.drain().collect();
            (keys, drivers)
        };
        for (handle, entry) in keys {
            let Some(driver) = drivers.get(&entry.driver) else {
                continue;
            };
            if let Err(err) = driver.key_destroy(entry.slot) {
                error!(handle = handle.0, slot = entry.slot.0, ?err, "teardown wipe failed");
            }
        }
        debug!("core torn down");
    }

    /// Runs one driver entry point under the configured deadline.
    ///
    /// The driver is not interrupted; an overrun is detected after the fact
    /// and reported as a communication failure regardless of what the driver
    /// returned.
    pub(crate) fn timed<T>(&self, f: impl FnOnce() -> SdiResult<T>) -> SeResult<T> {
        let deadline = self.inner.read().config.op_deadline;
        let Some(deadline) = deadline else {
            return Ok(f()?);
        };

        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed();
        if elapsed > deadline {
            error!(
                elapsed_ms = elapsed.as_millis() as u64,
                deadline_ms = deadline.as_millis() as u64,
                "driver call overran its deadline"
            );
            return Err(SeError::CommunicationFailure);
        }
        Ok(result?)
    }

    pub(crate) fn driver_entry(&self, id: DriverId) -> SeResult<Arc<dyn SeDriver>> {
        self.inner
            .read()
            .drivers
            .get(&id)
            .cloned()
            .ok_or(SeError::UnknownDriver)
    }

    /// Reserves a key for one operation, multi-step or one-shot.
    ///
    /// The reservation lives as long as the returned value; dropping it
    /// releases the key. A key reserved elsewhere yields `KeyBusy`.
    pub(crate) fn reserve(&self, handle: KeyHandle) -> SeResult<ResolvedKey> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let entry = inner.registry.get_mut(handle)?;
        if entry.busy {
            return Err(SeError::KeyBusy);
        }
        let driver = inner
            .drivers
            .get(&entry.driver)
            .cloned()
            .ok_or(SeError::UnknownDriver)?;
        entry.busy = true;
        let entry = *entry;
        drop(guard);

        Ok(ResolvedKey {
            driver,
            driver_id: entry.driver,
            slot: entry.slot,
            attrs: entry.attrs,
            _guard: BusyGuard {
                core: self.clone(),
                handle,
            },
        })
    }

    pub(crate) fn claim_slot(&self, driver: DriverId, slot: KeySlot) -> SeResult<()> {
        self.inner.write().registry.claim_slot(driver, slot)
    }

    pub(crate) fn release_slot(&self, driver: DriverId, slot: KeySlot) {
        self.inner.write().registry.release_slot(driver, slot);
    }

    pub(crate) fn register_key(
        &self,
        driver: DriverId,
        slot: KeySlot,
        attrs: KeyAttributes,
    ) -> SeResult<KeyHandle> {
        self.inner.write().registry.insert(driver, slot, attrs)
    }

    /// Drops a key's bookkeeping unless an operation holds it.
    pub(crate) fn remove_key_if_idle(&self, handle: KeyHandle) -> SeResult<KeyEntry> {
        let mut inner = self.inner.write();
        if inner.registry.get(handle)?.busy {
            return Err(SeError::KeyBusy);
        }
        inner.registry.remove(handle)
    }
}
