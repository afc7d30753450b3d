// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Acting identity (mock login) and identity-scoped registry actions.

use crate::ids::short_id;
use crate::model::{ActorId, Material, Position, DEFAULT_LOCATION};
use crate::registry::MaterialRegistry;
use reflow_app_core::config::ConfigStore;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;

/// What an identity does in the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Citizen reporting disposals.
    User,
    /// Collector claiming and completing pickups.
    Collector,
    /// Operator.
    Admin,
}

/// The acting party. `role` stays empty until the profile is completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable id; becomes `generatorId` / `collectorId`.
    pub id: ActorId,
    /// Display name.
    pub name: String,
    /// Chosen role, if any.
    pub role: Option<Role>,
}

impl Identity {
    /// An identity with a fixed id and role.
    pub fn new(id: impl Into<ActorId>, name: impl Into<String>, role: Option<Role>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
        }
    }
}

/// Holds the current identity. There is no real authentication.
#[derive(Default)]
pub struct SessionStore {
    current: Mutex<Option<Identity>>,
}

impl SessionStore {
    /// Empty session (logged out).
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Identity>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Log in as `name` with a freshly minted id and no role.
    pub fn login_mock(&self, name: impl Into<String>) -> Identity {
        let identity = Identity::new(short_id(&mut rand::thread_rng()), name, None);
        info!(identity_id = %identity.id, "mock login");
        *self.lock() = Some(identity.clone());
        identity
    }

    /// Set the role of the logged-in identity. Returns the updated identity,
    /// or `None` when nobody is logged in.
    pub fn complete_profile(&self, role: Role) -> Option<Identity> {
        let mut current = self.lock();
        let identity = current.as_mut()?;
        identity.role = Some(role);
        Some(identity.clone())
    }

    /// Forget the current identity.
    pub fn logout(&self) {
        *self.lock() = None;
    }

    /// The current identity, if any.
    pub fn current(&self) -> Option<Identity> {
        self.lock().clone()
    }
}

impl<S> MaterialRegistry<S>
where
    S: ConfigStore,
{
    /// Report a disposal on behalf of `identity`.
    ///
    /// Without a location fix the material is placed at [`DEFAULT_LOCATION`].
    pub fn report(
        &self,
        identity: &Identity,
        kind: impl Into<String>,
        weight: impl Into<String>,
        location: Option<Position>,
    ) -> Material {
        self.create(
            kind,
            weight,
            location.unwrap_or(DEFAULT_LOCATION),
            Some(identity.id.clone()),
        )
    }

    /// Claim a material for `identity`. Same no-op rules as [`MaterialRegistry::claim`].
    pub fn accept(&self, identity: &Identity, material_id: &str) -> bool {
        self.claim(material_id, identity.id.clone())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::model::MaterialStatus;
    use reflow_dry_tests::InMemoryConfigStore;

    #[test]
    fn login_then_profile_then_logout() {
        let session = SessionStore::new();
        assert!(session.complete_profile(Role::Collector).is_none());

        let me = session.login_mock("João Silva");
        assert_eq!(me.role, None);
        let me = session.complete_profile(Role::Collector).unwrap();
        assert_eq!(me.role, Some(Role::Collector));
        assert_eq!(session.current(), Some(me));

        session.logout();
        assert_eq!(session.current(), None);
    }

    #[test]
    fn report_without_location_uses_default() {
        let reg = MaterialRegistry::restore(InMemoryConfigStore::new());
        let citizen = Identity::new("U1", "Maria", Some(Role::User));
        let m = reg.report(&citizen, "Papel", "A definir", None);
        assert_eq!(m.position, DEFAULT_LOCATION);
        assert_eq!(m.generator_id.as_deref(), Some("U1"));

        let here = Position::new(-23.56, -46.64);
        assert_eq!(reg.report(&citizen, "Vidro", "A definir", Some(here)).position, here);
    }

    #[test]
    fn accept_claims_for_identity() {
        let reg = MaterialRegistry::restore(InMemoryConfigStore::new());
        let collector = Identity::new("C7", "Ana", Some(Role::Collector));
        assert!(reg.accept(&collector, "2"));
        let m = reg.get("2").unwrap();
        assert_eq!(m.status, MaterialStatus::InTransit);
        assert_eq!(m.collector_id.as_deref(), Some("C7"));
    }

    #[test]
    fn role_wire_labels() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(serde_json::to_string(&Role::Collector).unwrap(), "\"collector\"");
    }
}
