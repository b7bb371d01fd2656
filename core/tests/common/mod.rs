// Copyright (C) Microsoft Corporation. All rights reserved.

//! Shared scaffolding for the integration suites.

// Every suite compiles this module; not all of them touch every helper.
#![allow(dead_code)]

use std::sync::Arc;

use rand::RngCore;
use secore::AlgoId;
use secore::CoreConfig;
use secore::DriverId;
use secore::KeyAttributes;
use secore::KeyHandle;
use secore::KeyKind;
use secore::KeySlot;
use secore::KeyUsage;
use secore::SeCore;
use secore_sdi_mock::MockDriver;

/// Driver id every suite registers its mock under.
pub const DRV: DriverId = DriverId(1);

/// A core with a fully populated mock driver behind [`DRV`].
pub fn new_core() -> SeCore {
    core_with(MockDriver::new())
}

/// A core with `driver` registered behind [`DRV`].
pub fn core_with(driver: MockDriver) -> SeCore {
    let core = SeCore::new(CoreConfig::default());
    let result = core.register_driver(DRV, Arc::new(driver));
    assert!(result.is_ok(), "result {:?}", result);
    core
}

/// Attributes for an HMAC-SHA-256 key with every usage bit set.
pub fn mac_attrs() -> KeyAttributes {
    KeyAttributes {
        kind: KeyKind::HmacSha256,
        alg: AlgoId::HmacSha256,
        usage: KeyUsage::all(),
    }
}

/// Attributes for an AES-256 key bound to `alg`, every usage bit set.
pub fn aes_attrs(alg: AlgoId) -> KeyAttributes {
    KeyAttributes {
        kind: KeyKind::Aes256,
        alg,
        usage: KeyUsage::all(),
    }
}

/// Attributes for a generic derivation secret bound to `alg`.
pub fn secret_attrs(alg: AlgoId) -> KeyAttributes {
    KeyAttributes {
        kind: KeyKind::Secret256,
        alg,
        usage: KeyUsage::all(),
    }
}

/// Imports a fixed HMAC-SHA-256 key into `slot` and returns its handle.
pub fn helper_import_mac_key(core: &SeCore, slot: u64) -> KeyHandle {
    let result = core.import_key(DRV, KeySlot(slot), mac_attrs(), &[0x42; 32]);
    assert!(result.is_ok(), "result {:?}", result);
    result.unwrap()
}

/// Imports a fixed AES-256 key bound to `alg` into `slot`.
pub fn helper_import_aes_key(core: &SeCore, slot: u64, alg: AlgoId) -> KeyHandle {
    let result = core.import_key(DRV, KeySlot(slot), aes_attrs(alg), &[0x24; 32]);
    assert!(result.is_ok(), "result {:?}", result);
    result.unwrap()
}

/// Imports a fixed derivation secret bound to `alg` into `slot`.
pub fn helper_import_secret(core: &SeCore, slot: u64, alg: AlgoId) -> KeyHandle {
    let result = core.import_key(DRV, KeySlot(slot), secret_attrs(alg), &[0x11; 32]);
    assert!(result.is_ok(), "result {:?}", result);
    result.unwrap()
}

/// Generates a key with the given attributes into `slot`.
pub fn helper_generate_key(core: &SeCore, slot: u64, attrs: KeyAttributes) -> KeyHandle {
    let result = core.generate_key(DRV, KeySlot(slot), attrs);
    assert!(result.is_ok(), "result {:?}", result);
    result.unwrap()
}

/// Random payload of the given length.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut data);
    data
}
