// Copyright (C) Microsoft Corporation. All rights reserved.

#![warn(missing_docs)]

//! Secure-element dispatch core.
//!
//! This crate implements the driver registry, opaque key handle lifecycle
//! and multi-step operation sequencing that sit between a cryptography
//! runtime and the secure-element drivers implementing the SDI traits. Key
//! material never passes through here; the core sees handles, opaque slot
//! values and driver-declared context sizes, nothing else.

mod config;
mod dispatch;
mod error;
mod ops;
mod registry;
mod session;

pub use secore_sdi::*;

pub use config::CoreConfig;
pub use dispatch::SeCore;
pub use error::SeError;
pub use error::SeResult;
pub use ops::cipher::CipherSession;
pub use ops::kdf::KdfSession;
pub use ops::mac::MacSession;
pub use session::Verdict;
