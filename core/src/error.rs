// Copyright (C) Microsoft Corporation. All rights reserved.

//! Core error type.

use secore_sdi::CapabilityError;
use secore_sdi::SdiError;
use thiserror::Error;

/// Result alias for core operations.
pub type SeResult<T> = Result<T, SeError>;

/// Errors surfaced by the core.
///
/// Driver faults fold in one-to-one via [`From<SdiError>`]; the remaining
/// variants originate in the core's own bookkeeping and never come from a
/// driver.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum SeError {
    /// The driver does not populate the requested entry point.
    #[error("operation not supported by the driver")]
    NotSupported,

    /// A parameter failed validation.
    #[error("invalid parameter")]
    InvalidArgument,

    /// The addressed slot holds no key.
    #[error("slot holds no key")]
    EmptySlot,

    /// The addressed slot already holds a key.
    #[error("slot already holds a key")]
    OccupiedSlot,

    /// A MAC or signature did not verify.
    #[error("signature verification failed")]
    InvalidSignature,

    /// An AEAD tag did not verify.
    #[error("authentication failed")]
    AuthenticationFailure,

    /// The caller's output buffer is too small.
    #[error("output buffer too small, {required} bytes required")]
    InsufficientBufferSize {
        /// Bytes the caller must provide.
        required: usize,
    },

    /// The driver or its device stopped responding.
    #[error("driver communication failure")]
    CommunicationFailure,

    /// The device reported an internal fault.
    #[error("hardware failure")]
    HardwareFailure,

    /// The device reported physical tampering.
    #[error("tampering detected")]
    TamperingDetected,

    /// A driver's capability declaration violates a sibling rule.
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// No driver is registered under the given id.
    #[error("no driver registered under that id")]
    UnknownDriver,

    /// A driver is already registered under the given id.
    #[error("a driver is already registered under that id")]
    DuplicateDriver,

    /// The key handle does not name a live key.
    #[error("unknown key handle")]
    UnknownHandle,

    /// The key handle is already registered.
    #[error("key handle already registered")]
    DuplicateHandle,

    /// The key is held by an active multi-step operation.
    #[error("key is busy with an active operation")]
    KeyBusy,

    /// The operation is not legal in the session's current state.
    #[error("operation not legal in the current session state")]
    InvalidState,

    /// The key's usage policy forbids the operation.
    #[error("key usage policy forbids the operation")]
    NotPermitted,

    /// The same collateral id was supplied twice to one derivation.
    #[error("collateral id already supplied")]
    DuplicateCollateral,
}

impl From<SdiError> for SeError {
    fn from(err: SdiError) -> Self {
        match err {
            SdiError::NotSupported => SeError::NotSupported,
            SdiError::InvalidArgument => SeError::InvalidArgument,
            SdiError::EmptySlot => SeError::EmptySlot,
            SdiError::OccupiedSlot => SeError::OccupiedSlot,
            SdiError::InvalidSignature => SeError::InvalidSignature,
            SdiError::AuthenticationFailure => SeError::AuthenticationFailure,
            SdiError::InsufficientBufferSize { required } => {
                SeError::InsufficientBufferSize { required }
            }
            SdiError::CommunicationFailure => SeError::CommunicationFailure,
            SdiError::HardwareFailure => SeError::HardwareFailure,
            SdiError::TamperingDetected => SeError::TamperingDetected,
        }
    }
}
