// Copyright (C) Microsoft Corporation. All rights reserved.

//! Handle and identifier newtypes.

/// Logical identifier for a live key, minted by the core's registry.
///
/// Wide enough to hold a native pointer, an index, or a communication
/// handle. Zero is the "no key" sentinel and is never minted for a live
/// key.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyHandle(pub u64);

impl KeyHandle {
    /// The "no key" sentinel.
    pub const NONE: KeyHandle = KeyHandle(0);

    /// Returns true if this is the "no key" sentinel.
    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

/// Driver-specific opaque key slot value.
///
/// The core carries this value between calls but never interprets it. For a
/// driver it is typically a slot number inside the device; it may equally be
/// a pointer-sized cookie.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeySlot(pub u64);

/// Identifier under which a driver is registered with the core.
///
/// Chosen by the integrator; must be nonzero and unique per core instance.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DriverId(pub u32);
