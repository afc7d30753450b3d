// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Reflow core: the material lifecycle engine.
//!
//! - [`registry`] owns the material set, enforces
//!   `AVAILABLE -> IN_TRANSIT -> COLLECTED`, and mirrors every change to a
//!   [`ConfigStore`](reflow_app_core::config::ConfigStore).
//! - [`simulator`] moves a truck roster and synthesizes demand on two
//!   cancellable periodic tasks.
//! - [`notify`] holds auto-expiring user-facing notifications.
//! - [`session`] supplies the acting identity.
//! - [`view`] derives dashboard numbers and indexes from snapshots.
//!
//! All three stores are explicit handles: clone them to share, subscribe to
//! their broadcast channels to observe changes.
#![forbid(unsafe_code)]

pub mod ids;
pub mod model;
pub mod notify;
pub mod registry;
pub mod session;
pub mod simulator;
pub mod view;

pub use model::{
    default_roster, Actor, ActorId, ActorStatus, Material, MaterialId, MaterialStatus, Position,
    DEFAULT_LOCATION, MATERIAL_TYPES, SIMULATED_SOURCE_ID, WEIGHT_LABELS,
};
pub use notify::{Notification, NotificationChannel, NotificationEvent, NotificationId, Severity};
pub use registry::{seed_materials, MaterialRegistry, RegistryEvent, MATERIALS_KEY};
pub use session::{Identity, Role, SessionStore};
pub use simulator::{SimulationEvent, Simulator};
pub use view::MaterialStats;
