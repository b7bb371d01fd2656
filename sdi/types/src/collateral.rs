// Copyright (C) Microsoft Corporation. All rights reserved.

//! Collateral identifiers for key derivation sessions.

/// Identifier of one named input to a key derivation or agreement.
///
/// Each collateral item carries the id of the parameter it supplies, e.g. a
/// salt or a peer's public value. An algorithm expects each of its ids
/// exactly once; ordering between different ids is insignificant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollateralId(pub u32);

impl CollateralId {
    /// Secret input keyed into the derivation in addition to the source key.
    pub const SECRET: CollateralId = CollateralId(0x0101);

    /// Application label.
    pub const LABEL: CollateralId = CollateralId(0x0201);

    /// Salt value.
    pub const SALT: CollateralId = CollateralId(0x0202);

    /// Context / info string.
    pub const INFO: CollateralId = CollateralId(0x0203);

    /// Seed value.
    pub const SEED: CollateralId = CollateralId(0x0204);

    /// Peer public value for agreement algorithms.
    pub const PEER_PUBLIC: CollateralId = CollateralId(0x0301);
}
