// Copyright (C) Microsoft Corporation. All rights reserved.

mod common;

use secore::*;
use secore_sdi_mock::MockDriver;
use test_log::test;

use crate::common::*;

#[test]
fn test_import_rejects_occupied_slot() {
    let core = new_core();
    let first = helper_import_mac_key(&core, 1);

    assert_eq!(
        core.import_key(DRV, KeySlot(1), mac_attrs(), &[0x43; 32])
            .unwrap_err(),
        SeError::OccupiedSlot
    );
    assert_eq!(
        core.generate_key(DRV, KeySlot(1), mac_attrs()).unwrap_err(),
        SeError::OccupiedSlot
    );

    // The original key is untouched.
    let mut out = [0u8; 32];
    let result = core.mac_compute(first, AlgoId::HmacSha256, b"data", &mut out);
    assert!(result.is_ok(), "result {:?}", result);
}

#[test]
fn test_import_rejects_wrong_material_length() {
    let core = new_core();

    assert_eq!(
        core.import_key(DRV, KeySlot(1), mac_attrs(), &[0x42; 16])
            .unwrap_err(),
        SeError::InvalidArgument
    );

    // The failed import released its slot claim.
    let result = core.import_key(DRV, KeySlot(1), mac_attrs(), &[0x42; 32]);
    assert!(result.is_ok(), "result {:?}", result);
}

#[test]
fn test_import_unknown_driver() {
    let core = new_core();
    assert_eq!(
        core.import_key(DriverId(9), KeySlot(1), mac_attrs(), &[0x42; 32])
            .unwrap_err(),
        SeError::UnknownDriver
    );
}

#[test]
fn test_destroy_frees_slot_and_kills_handle() {
    let core = new_core();
    let key = helper_import_mac_key(&core, 1);
    assert_eq!(core.registered_keys(), 1);

    let result = core.destroy_key(key);
    assert!(result.is_ok(), "result {:?}", result);
    assert_eq!(core.registered_keys(), 0);

    let mut out = [0u8; 32];
    assert_eq!(
        core.mac_compute(key, AlgoId::HmacSha256, b"data", &mut out)
            .unwrap_err(),
        SeError::UnknownHandle
    );
    assert_eq!(core.destroy_key(key).unwrap_err(), SeError::UnknownHandle);

    // The slot is free again and the new key gets a fresh handle.
    let reborn = helper_import_mac_key(&core, 1);
    assert_ne!(reborn, key);
}

#[test]
fn test_destroy_busy_key_rejected() {
    let core = new_core();
    let key = helper_import_mac_key(&core, 1);

    let mut session = MacSession::new();
    session.setup(&core, key, AlgoId::HmacSha256).unwrap();
    assert_eq!(core.destroy_key(key).unwrap_err(), SeError::KeyBusy);

    // Still destroyable once the session ends.
    session.abort().unwrap();
    let result = core.destroy_key(key);
    assert!(result.is_ok(), "result {:?}", result);
}

#[test]
fn test_destroy_swallows_wipe_failure() {
    let core = core_with(MockDriver::new().with_failing_destroy());
    let key = helper_import_mac_key(&core, 1);

    // The driver reports a hardware fault, the bookkeeping still goes.
    let result = core.destroy_key(key);
    assert!(result.is_ok(), "result {:?}", result);
    assert_eq!(core.registered_keys(), 0);
    let mut out = [0u8; 32];
    assert_eq!(
        core.mac_compute(key, AlgoId::HmacSha256, b"data", &mut out)
            .unwrap_err(),
        SeError::UnknownHandle
    );
}

#[test]
fn test_export_import_symmetry() {
    let core = new_core();
    let material = random_bytes(32);
    let original = core
        .import_key(DRV, KeySlot(1), mac_attrs(), &material)
        .unwrap();

    let result = core.export_key(original);
    assert!(result.is_ok(), "result {:?}", result);
    let exported = result.unwrap();
    assert_eq!(exported.as_slice(), material.as_slice());

    let copy = core.import_key(DRV, KeySlot(2), mac_attrs(), &exported).unwrap();

    let data = random_bytes(96);
    let mut tag_original = [0u8; 32];
    let mut tag_copy = [0u8; 32];
    core.mac_compute(original, AlgoId::HmacSha256, &data, &mut tag_original)
        .unwrap();
    core.mac_compute(copy, AlgoId::HmacSha256, &data, &mut tag_copy)
        .unwrap();
    assert_eq!(tag_original, tag_copy);
}

#[test]
fn test_export_policy() {
    let core = new_core();

    let mut sealed = mac_attrs();
    sealed.usage.export = false;
    let key = core
        .import_key(DRV, KeySlot(1), sealed, &[0x42; 32])
        .unwrap();
    assert_eq!(core.export_key(key).unwrap_err(), SeError::NotPermitted);

    // Usage allows it but the driver cannot.
    let no_export = core_with(MockDriver::new().without_key_export());
    let key = helper_import_mac_key(&no_export, 1);
    assert_eq!(no_export.export_key(key).unwrap_err(), SeError::NotSupported);
}

#[test]
fn test_export_public_half() {
    let core = new_core();

    let mut attrs = KeyAttributes {
        kind: KeyKind::EccP256,
        alg: AlgoId::EcdsaP256Sha256,
        usage: KeyUsage::all(),
    };
    // The public half is exportable even when raw export is not.
    attrs.usage.export = false;
    let key = helper_generate_key(&core, 1, attrs);

    let result = core.export_public_key(key);
    assert!(result.is_ok(), "result {:?}", result);
    assert_eq!(result.unwrap().len(), 65);
    assert_eq!(core.export_key(key).unwrap_err(), SeError::NotPermitted);

    // Symmetric keys have no public half.
    let mac_key = helper_import_mac_key(&core, 2);
    assert_eq!(
        core.export_public_key(mac_key).unwrap_err(),
        SeError::InvalidArgument
    );
}

#[test]
fn test_generated_key_is_usable() {
    let core = new_core();
    let key = helper_generate_key(&core, 1, aes_attrs(AlgoId::AesGcm));
    let nonce = random_bytes(12);
    let plaintext = random_bytes(24);

    let ciphertext = core
        .aead_encrypt(key, AlgoId::AesGcm, &nonce, &[], &plaintext)
        .unwrap();
    let decrypted = core
        .aead_decrypt(key, AlgoId::AesGcm, &nonce, &[], &ciphertext)
        .unwrap();
    assert_eq!(decrypted, plaintext);

    // Two generated keys must not agree.
    let other = helper_generate_key(&core, 2, aes_attrs(AlgoId::AesGcm));
    assert_eq!(
        core.aead_decrypt(other, AlgoId::AesGcm, &nonce, &[], &ciphertext)
            .unwrap_err(),
        SeError::AuthenticationFailure
    );
}
