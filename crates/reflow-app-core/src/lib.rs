// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared application services for Reflow (storage port, prefs, toasts).
//! Keeps runtime adapters thin and framework-agnostic.

pub mod config;
pub mod prefs;
pub mod toast;
