// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![warn(missing_docs)]

//! In-memory mock secure-element driver.
//!
//! Implements every SDI category with deterministic keyed mixing
//! transforms. The transforms have no cryptographic strength; they exist so
//! the dispatch core's sequencing, policy, and state-machine behavior can be
//! exercised: same key and input always produce the same output, any input
//! or key change perturbs the output, and the block transform is exactly
//! invertible.
//!
//! Capability subsets and fault behavior are configurable through builder
//! methods, so tests can stand up drivers that, for example, only expose the
//! raw ECB entry point or fail their destroy call.

mod driver;
mod mixer;
mod state;

pub use driver::MockDriver;
