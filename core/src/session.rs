// Copyright (C) Microsoft Corporation. All rights reserved.

//! Shared session machinery.

use crate::error::SeError;
use crate::error::SeResult;

/// Outcome of a cryptographic comparison.
///
/// A mismatch is data, not an error: callers must branch on the verdict,
/// while structural failures (bad state, dead driver) stay in the error
/// channel.
#[must_use]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The MAC or signature verified.
    Match,
    /// The MAC or signature did not verify.
    Mismatch,
}

/// Lifecycle of a MAC or cipher session.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum SessionPhase {
    /// Constructed, no key bound.
    Idle,
    /// Key reserved, driver context live.
    Active,
    /// Terminated by a finish variant.
    Finished,
    /// Terminated by abort or by a failed driver call.
    Aborted,
}

/// Folds the driver-side verification status into a verdict.
///
/// Drivers report a failed comparison as `InvalidSignature`; at the core
/// surface that outcome is `Ok(Verdict::Mismatch)`.
pub(crate) fn verdict_from(result: SeResult<()>) -> SeResult<Verdict> {
    match result {
        Ok(()) => Ok(Verdict::Match),
        Err(SeError::InvalidSignature) => Ok(Verdict::Mismatch),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_verdict_folding() {
        assert_eq!(verdict_from(Ok(())).unwrap(), Verdict::Match);
        assert_eq!(
            verdict_from(Err(SeError::InvalidSignature)).unwrap(),
            Verdict::Mismatch
        );
        assert_eq!(
            verdict_from(Err(SeError::HardwareFailure)).unwrap_err(),
            SeError::HardwareFailure
        );
    }
}
