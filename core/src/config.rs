// Copyright (C) Microsoft Corporation. All rights reserved.

//! Core configuration.

use std::time::Duration;

/// Knobs applied to every driver the core dispatches to.
#[derive(Debug, Copy, Clone, Default)]
pub struct CoreConfig {
    /// Upper bound on the wall-clock time of one driver entry point.
    ///
    /// `None` disables the check. When set, a call that overruns the bound
    /// is reported as [`CommunicationFailure`](crate::SeError::CommunicationFailure)
    /// even if the driver eventually returned success.
    pub op_deadline: Option<Duration>,
}
