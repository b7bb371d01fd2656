// Copyright (C) Microsoft Corporation. All rights reserved.

mod common;

use secore::*;
use secore_sdi_mock::MockDriver;
use test_log::test;

use crate::common::*;

#[test]
fn test_aead_roundtrip() {
    let core = new_core();
    let key = helper_import_aes_key(&core, 1, AlgoId::AesGcm);
    let nonce = random_bytes(12);
    let aad = b"header";
    let plaintext = random_bytes(64);

    let result = core.aead_encrypt(key, AlgoId::AesGcm, &nonce, aad, &plaintext);
    assert!(result.is_ok(), "result {:?}", result);
    let ciphertext = result.unwrap();
    assert_eq!(ciphertext.len(), plaintext.len() + 16);
    assert_ne!(ciphertext[..plaintext.len()], plaintext[..]);

    let result = core.aead_decrypt(key, AlgoId::AesGcm, &nonce, aad, &ciphertext);
    assert!(result.is_ok(), "result {:?}", result);
    assert_eq!(result.unwrap(), plaintext);
}

#[test]
fn test_aead_empty_payload_and_aad() {
    let core = new_core();
    let key = helper_import_aes_key(&core, 1, AlgoId::AesCcm);
    let nonce = random_bytes(13);

    let result = core.aead_encrypt(key, AlgoId::AesCcm, &nonce, &[], &[]);
    assert!(result.is_ok(), "result {:?}", result);
    let ciphertext = result.unwrap();
    // Tag only.
    assert_eq!(ciphertext.len(), 16);

    let result = core.aead_decrypt(key, AlgoId::AesCcm, &nonce, &[], &ciphertext);
    assert!(result.is_ok(), "result {:?}", result);
    assert!(result.unwrap().is_empty());
}

#[test]
fn test_aead_tamper_detected() {
    let core = new_core();
    let key = helper_import_aes_key(&core, 1, AlgoId::AesGcm);
    let nonce = random_bytes(12);
    let aad = b"bound data";
    let plaintext = random_bytes(40);

    let ciphertext = core
        .aead_encrypt(key, AlgoId::AesGcm, &nonce, aad, &plaintext)
        .unwrap();

    // Flipped ciphertext byte.
    let mut tampered = ciphertext.clone();
    tampered[3] ^= 1;
    assert_eq!(
        core.aead_decrypt(key, AlgoId::AesGcm, &nonce, aad, &tampered)
            .unwrap_err(),
        SeError::AuthenticationFailure
    );

    // Flipped tag byte.
    let mut tampered = ciphertext.clone();
    let last = tampered.len() - 1;
    tampered[last] ^= 1;
    assert_eq!(
        core.aead_decrypt(key, AlgoId::AesGcm, &nonce, aad, &tampered)
            .unwrap_err(),
        SeError::AuthenticationFailure
    );

    // Wrong nonce.
    let other_nonce = random_bytes(12);
    assert_eq!(
        core.aead_decrypt(key, AlgoId::AesGcm, &other_nonce, aad, &ciphertext)
            .unwrap_err(),
        SeError::AuthenticationFailure
    );

    // Wrong associated data.
    assert_eq!(
        core.aead_decrypt(key, AlgoId::AesGcm, &nonce, b"other data", &ciphertext)
            .unwrap_err(),
        SeError::AuthenticationFailure
    );
}

#[test]
fn test_aead_usage_policy() {
    let core = new_core();

    let mut seal_only = aes_attrs(AlgoId::AesGcm);
    seal_only.usage.decrypt = false;
    let key = core
        .import_key(DRV, KeySlot(1), seal_only, &[0x24; 32])
        .unwrap();
    let nonce = random_bytes(12);

    let ciphertext = core
        .aead_encrypt(key, AlgoId::AesGcm, &nonce, &[], b"payload")
        .unwrap();
    assert_eq!(
        core.aead_decrypt(key, AlgoId::AesGcm, &nonce, &[], &ciphertext)
            .unwrap_err(),
        SeError::NotPermitted
    );
}

#[test]
fn test_aead_without_category_rejected() {
    let core = core_with(MockDriver::new().without_aead());
    let key = helper_import_aes_key(&core, 1, AlgoId::AesGcm);
    let nonce = random_bytes(12);

    assert_eq!(
        core.aead_encrypt(key, AlgoId::AesGcm, &nonce, &[], b"payload")
            .unwrap_err(),
        SeError::NotSupported
    );
    assert_eq!(
        core.aead_decrypt(key, AlgoId::AesGcm, &nonce, &[], &[0u8; 16])
            .unwrap_err(),
        SeError::NotSupported
    );
}

#[test]
fn test_aead_rejects_empty_nonce() {
    let core = new_core();
    let key = helper_import_aes_key(&core, 1, AlgoId::AesGcm);

    assert_eq!(
        core.aead_encrypt(key, AlgoId::AesGcm, &[], &[], b"payload")
            .unwrap_err(),
        SeError::InvalidArgument
    );
}
