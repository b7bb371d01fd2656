// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use thiserror::Error;

/// Status a driver reports back to the core.
///
/// `InvalidSignature` and `AuthenticationFailure` are expected outcomes of a
/// verification, not faults; the core converts them into verdict values at
/// its own surface. The communication/hardware/tampering variants are device
/// faults the core passes through unchanged.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum SdiError {
    /// The driver does not populate the requested entry point.
    #[error("operation not supported by this driver")]
    NotSupported,

    /// Malformed size, buffer, or parameter.
    #[error("invalid argument")]
    InvalidArgument,

    /// The addressed key slot holds no key.
    #[error("key slot is empty")]
    EmptySlot,

    /// The addressed key slot already holds a key.
    #[error("key slot is occupied")]
    OccupiedSlot,

    /// A MAC or signature comparison did not match.
    #[error("signature or MAC did not verify")]
    InvalidSignature,

    /// Authenticated decryption failed; no plaintext was produced.
    #[error("authentication tag did not verify")]
    AuthenticationFailure,

    /// The caller-provided output buffer is too small.
    #[error("output buffer too small, {required} bytes required")]
    InsufficientBufferSize {
        /// Required output size in bytes.
        required: usize,
    },

    /// Communication with the device failed.
    #[error("communication with the device failed")]
    CommunicationFailure,

    /// The device reported an internal hardware fault.
    #[error("device reported a hardware fault")]
    HardwareFailure,

    /// The device detected physical tampering.
    #[error("device detected tampering")]
    TamperingDetected,
}

/// SDI Result
pub type SdiResult<T> = Result<T, SdiError>;
