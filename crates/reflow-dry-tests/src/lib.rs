// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for Reflow crates.
//!
//! # Modules
//!
//! - [`config`] - In-memory storage fake for testing without filesystem I/O
#![forbid(unsafe_code)]

pub mod config;

pub use config::{InMemoryConfigStore, StoreOp};
