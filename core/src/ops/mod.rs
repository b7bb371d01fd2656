// Copyright (C) Microsoft Corporation. All rights reserved.

//! Operation dispatch, one module per category.

pub mod aead;
pub mod asym;
pub mod cipher;
pub mod kdf;
pub mod keymgmt;
pub mod mac;
