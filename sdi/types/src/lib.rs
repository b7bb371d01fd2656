// Copyright (C) Microsoft Corporation. All rights reserved.

#![warn(missing_docs)]

//! Plain data types shared between the secure-element core and its drivers.
//!
//! Everything in this crate is passive data: identifiers, algorithm ids, and
//! key attributes. No trait contracts and no behavior live here, so both the
//! core and vendor driver crates can depend on it without pulling in each
//! other.

mod algo;
mod collateral;
mod handle;
mod key;

pub use algo::AlgoId;
pub use algo::CipherDirection;
pub use collateral::CollateralId;
pub use handle::DriverId;
pub use handle::KeyHandle;
pub use handle::KeySlot;
pub use key::KeyAttributes;
pub use key::KeyKind;
pub use key::KeyUsage;
