// Copyright (C) Microsoft Corporation. All rights reserved.

mod common;

use secore::*;
use test_log::test;

use crate::common::*;

#[test]
fn test_kdf_derive_creates_usable_key() {
    let core = new_core();
    let secret = helper_import_secret(&core, 1, AlgoId::HkdfSha256);

    let mut session = KdfSession::new();
    let result = session.setup(&core, secret, AlgoId::HkdfSha256, 32);
    assert!(result.is_ok(), "result {:?}", result);
    session.collateral(CollateralId(1), b"salt").unwrap();
    session.collateral(CollateralId(2), b"info").unwrap();

    let result = session.derive(KeySlot(9), mac_attrs());
    assert!(result.is_ok(), "result {:?}", result);
    let derived = result.unwrap();

    // The derived key is live registry state like any other key.
    assert_eq!(core.registered_keys(), 2);
    let mut out = [0u8; 32];
    let result = core.mac_compute(derived, AlgoId::HmacSha256, b"data", &mut out);
    assert!(result.is_ok(), "result {:?}", result);
    let result = core.destroy_key(derived);
    assert!(result.is_ok(), "result {:?}", result);
}

#[test]
fn test_kdf_export_matches_derived_material() {
    let core = new_core();
    let secret = helper_import_secret(&core, 1, AlgoId::HkdfSha256);

    let mut derive = KdfSession::new();
    derive.setup(&core, secret, AlgoId::HkdfSha256, 32).unwrap();
    derive.collateral(CollateralId(1), b"salt").unwrap();
    let derived = derive.derive(KeySlot(9), mac_attrs()).unwrap();
    let slotted = core.export_key(derived).unwrap();

    let mut export = KdfSession::new();
    export.setup(&core, secret, AlgoId::HkdfSha256, 32).unwrap();
    export.collateral(CollateralId(1), b"salt").unwrap();
    let result = export.export();
    assert!(result.is_ok(), "result {:?}", result);
    let exported = result.unwrap();

    assert_eq!(exported.as_slice(), slotted.as_slice());
}

#[test]
fn test_kdf_collateral_order_insignificant() {
    let core = new_core();
    let secret = helper_import_secret(&core, 1, AlgoId::KbkdfCmac);

    let mut forward = KdfSession::new();
    forward.setup(&core, secret, AlgoId::KbkdfCmac, 16).unwrap();
    forward.collateral(CollateralId(1), b"label").unwrap();
    forward.collateral(CollateralId(2), b"context").unwrap();
    let first = forward.export().unwrap();

    let mut reversed = KdfSession::new();
    reversed.setup(&core, secret, AlgoId::KbkdfCmac, 16).unwrap();
    reversed.collateral(CollateralId(2), b"context").unwrap();
    reversed.collateral(CollateralId(1), b"label").unwrap();
    let second = reversed.export().unwrap();

    assert_eq!(first.as_slice(), second.as_slice());
}

#[test]
fn test_kdf_duplicate_collateral_rejected() {
    let core = new_core();
    let secret = helper_import_secret(&core, 1, AlgoId::HkdfSha256);

    let mut session = KdfSession::new();
    session.setup(&core, secret, AlgoId::HkdfSha256, 32).unwrap();
    session.collateral(CollateralId(1), b"salt").unwrap();
    assert_eq!(
        session.collateral(CollateralId(1), b"other").unwrap_err(),
        SeError::DuplicateCollateral
    );

    // The duplicate never reached the driver; the session continues.
    session.collateral(CollateralId(2), b"info").unwrap();
    let result = session.export();
    assert!(result.is_ok(), "result {:?}", result);
}

#[test]
fn test_kdf_terminals_are_exclusive() {
    let core = new_core();
    let secret = helper_import_secret(&core, 1, AlgoId::HkdfSha256);

    let mut session = KdfSession::new();
    session.setup(&core, secret, AlgoId::HkdfSha256, 32).unwrap();
    session.collateral(CollateralId(1), b"salt").unwrap();
    session.derive(KeySlot(9), mac_attrs()).unwrap();
    assert_eq!(session.export().unwrap_err(), SeError::InvalidState);
    assert_eq!(
        session.derive(KeySlot(10), mac_attrs()).unwrap_err(),
        SeError::InvalidState
    );
    assert_eq!(session.abort().unwrap_err(), SeError::InvalidState);

    let mut session = KdfSession::new();
    session.setup(&core, secret, AlgoId::HkdfSha256, 32).unwrap();
    session.collateral(CollateralId(1), b"salt").unwrap();
    session.export().unwrap();
    assert_eq!(
        session.derive(KeySlot(10), mac_attrs()).unwrap_err(),
        SeError::InvalidState
    );
    assert_eq!(
        session.collateral(CollateralId(2), b"late").unwrap_err(),
        SeError::InvalidState
    );
}

#[test]
fn test_kdf_derive_into_occupied_slot() {
    let core = new_core();
    let secret = helper_import_secret(&core, 1, AlgoId::HkdfSha256);
    let blocker = helper_import_mac_key(&core, 9);

    let mut session = KdfSession::new();
    session.setup(&core, secret, AlgoId::HkdfSha256, 32).unwrap();
    session.collateral(CollateralId(1), b"salt").unwrap();
    assert_eq!(
        session.derive(KeySlot(9), mac_attrs()).unwrap_err(),
        SeError::OccupiedSlot
    );

    // The collision is caught before the driver runs; a free slot works.
    let result = session.derive(KeySlot(10), mac_attrs());
    assert!(result.is_ok(), "result {:?}", result);
    core.destroy_key(blocker).unwrap();
}

#[test]
fn test_kdf_driver_error_aborts_session_and_frees_slot() {
    let core = new_core();
    let secret = helper_import_secret(&core, 1, AlgoId::HkdfSha256);

    let mut session = KdfSession::new();
    session.setup(&core, secret, AlgoId::HkdfSha256, 16).unwrap();
    session.collateral(CollateralId(1), b"salt").unwrap();

    // 16 output bytes cannot fill a 32-byte key kind.
    assert_eq!(
        session.derive(KeySlot(9), mac_attrs()).unwrap_err(),
        SeError::InvalidArgument
    );
    assert_eq!(
        session.derive(KeySlot(9), mac_attrs()).unwrap_err(),
        SeError::InvalidState
    );

    // The failed derivation released both the slot claim and the secret.
    let result = core.import_key(DRV, KeySlot(9), mac_attrs(), &[0x42; 32]);
    assert!(result.is_ok(), "result {:?}", result);
    let mut retry = KdfSession::new();
    let result = retry.setup(&core, secret, AlgoId::HkdfSha256, 32);
    assert!(result.is_ok(), "result {:?}", result);
    retry.abort().unwrap();
}

#[test]
fn test_kdf_abort_paths() {
    let core = new_core();
    let secret = helper_import_secret(&core, 1, AlgoId::HkdfSha256);

    // Abort straight after setup.
    let mut session = KdfSession::new();
    session.setup(&core, secret, AlgoId::HkdfSha256, 32).unwrap();
    let result = session.abort();
    assert!(result.is_ok(), "result {:?}", result);
    assert_eq!(session.export().unwrap_err(), SeError::InvalidState);

    // Abort mid-collection, then a second abort is a caller error.
    let mut session = KdfSession::new();
    session.setup(&core, secret, AlgoId::HkdfSha256, 32).unwrap();
    session.collateral(CollateralId(1), b"salt").unwrap();
    session.abort().unwrap();
    assert_eq!(session.abort().unwrap_err(), SeError::InvalidState);

    // Abort before setup is legal and terminal.
    let mut idle = KdfSession::new();
    idle.abort().unwrap();
    assert_eq!(
        idle.setup(&core, secret, AlgoId::HkdfSha256, 32).unwrap_err(),
        SeError::InvalidState
    );
}

#[test]
fn test_kdf_requires_derive_usage() {
    let core = new_core();
    let mut attrs = secret_attrs(AlgoId::HkdfSha256);
    attrs.usage.derive = false;
    let secret = core
        .import_key(DRV, KeySlot(1), attrs, &[0x11; 32])
        .unwrap();

    let mut session = KdfSession::new();
    assert_eq!(
        session
            .setup(&core, secret, AlgoId::HkdfSha256, 32)
            .unwrap_err(),
        SeError::NotPermitted
    );
}

#[test]
fn test_kdf_holds_secret_reservation() {
    let core = new_core();
    let secret = helper_import_secret(&core, 1, AlgoId::HkdfSha256);

    let mut session = KdfSession::new();
    session.setup(&core, secret, AlgoId::HkdfSha256, 32).unwrap();
    assert_eq!(core.destroy_key(secret).unwrap_err(), SeError::KeyBusy);
    assert_eq!(core.export_key(secret).unwrap_err(), SeError::KeyBusy);

    session.export().unwrap();
    let result = core.export_key(secret);
    assert!(result.is_ok(), "result {:?}", result);
}
