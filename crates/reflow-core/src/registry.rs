// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Material registry: the single owner of the material set.
//!
//! Every mutation runs to completion under one lock, so concurrent callers
//! (user actions, the demand process) are linearized in call order. A
//! mutation that changes state is mirrored to durable storage and announced
//! to subscribers before the lock is released; one that fails its
//! precondition is a silent no-op and touches neither.
//!
//! Other processes may share the same store (the CLI next to a running
//! host). Each mutation therefore starts from the stored set when it is
//! readable, so a write never clobbers a change made elsewhere.

use crate::ids::short_id;
use crate::model::{ActorId, Material, MaterialId, MaterialStatus, Position, DEFAULT_LOCATION};
use reflow_app_core::config::{ConfigService, ConfigStore};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use time::macros::datetime;
use time::OffsetDateTime;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Storage key holding the serialized material array.
pub const MATERIALS_KEY: &str = "reflow.materials";

const EVENT_CAPACITY: usize = 256;

/// Change notification published after every effective mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEvent {
    /// A material was appended.
    Created(Material),
    /// A material moved to `IN_TRANSIT`.
    Claimed {
        /// Material id.
        id: MaterialId,
        /// Claiming collector.
        collector_id: ActorId,
    },
    /// A material moved to `COLLECTED`.
    Completed {
        /// Material id.
        id: MaterialId,
    },
    /// The whole set was replaced by the seed set.
    Reset,
}

/// The fixed set used on first start, after a reset, and when storage is unusable.
pub fn seed_materials() -> Vec<Material> {
    let created_at = datetime!(2024-01-01 0:00 UTC);
    let seed = |id: &str, kind: &str, weight: &str, lat: f64, lng: f64| Material {
        id: id.to_string(),
        kind: kind.to_string(),
        weight: weight.to_string(),
        position: Position::new(lat, lng),
        status: MaterialStatus::Available,
        generator_id: None,
        collector_id: None,
        created_at,
    };
    vec![
        seed("1", "Plástico", "2kg", -23.5495, -46.6323),
        seed("2", "Eletrônico", "1 un", -23.5515, -46.6343),
        seed("3", "Metal", "5kg", -23.5500, -46.6360),
    ]
}

/// Shared handle to the material set. Clones point at the same registry.
pub struct MaterialRegistry<S> {
    shared: Arc<Shared<S>>,
}

struct Shared<S> {
    materials: Mutex<Vec<Material>>,
    config: ConfigService<S>,
    events: broadcast::Sender<RegistryEvent>,
}

impl<S> Clone for MaterialRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S> MaterialRegistry<S> {
    fn lock(&self) -> MutexGuard<'_, Vec<Material>> {
        self.shared
            .materials
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.shared.events.subscribe()
    }

    /// Snapshot of every material, in insertion order.
    pub fn list(&self) -> Vec<Material> {
        self.lock().clone()
    }

    /// Snapshot of one material.
    pub fn get(&self, id: &str) -> Option<Material> {
        self.lock().iter().find(|m| m.id == id).cloned()
    }

    /// Number of materials held.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the registry holds no materials.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Borrow the backing store.
    pub fn store(&self) -> &S {
        self.shared.config.store()
    }
}

impl<S> MaterialRegistry<S>
where
    S: ConfigStore,
{
    /// Load the registry from `store`, falling back to the seed set when the
    /// stored value is absent, unreadable, or holds duplicate ids.
    pub fn restore(store: S) -> Self {
        let config = ConfigService::new(store);
        let materials = match config.load::<Vec<Material>>(MATERIALS_KEY) {
            Ok(Some(saved)) if has_unique_ids(&saved) => {
                debug!(count = saved.len(), "restored materials");
                saved
            }
            Ok(Some(_)) => {
                warn!("stored materials repeat an id; starting from seed set");
                seed_materials()
            }
            Ok(None) => {
                debug!("no stored materials; starting from seed set");
                seed_materials()
            }
            Err(err) => {
                warn!(?err, "stored materials unreadable; starting from seed set");
                seed_materials()
            }
        };
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                materials: Mutex::new(materials),
                config,
                events,
            }),
        }
    }

    /// Append a new `AVAILABLE` material with a fresh id and `createdAt = now`.
    ///
    /// A position with a NaN or infinite coordinate is replaced by
    /// [`DEFAULT_LOCATION`].
    pub fn create(
        &self,
        kind: impl Into<String>,
        weight: impl Into<String>,
        position: Position,
        generator_id: Option<ActorId>,
    ) -> Material {
        let position = if position.is_finite() {
            position
        } else {
            warn!(
                lat = position.lat,
                lng = position.lng,
                "non-finite position; using default location"
            );
            DEFAULT_LOCATION
        };
        let mut materials = self.lock();
        self.refresh(&mut materials);
        let mut rng = rand::thread_rng();
        let id = loop {
            let candidate = short_id(&mut rng);
            if !materials.iter().any(|m| m.id == candidate) {
                break candidate;
            }
        };
        let material = Material {
            id,
            kind: kind.into(),
            weight: weight.into(),
            position,
            status: MaterialStatus::Available,
            generator_id,
            collector_id: None,
            created_at: OffsetDateTime::now_utc(),
        };
        info!(material_id = %material.id, kind = %material.kind, "material created");
        materials.push(material.clone());
        self.commit(&materials, RegistryEvent::Created(material.clone()));
        material
    }

    /// Move an `AVAILABLE` material to `IN_TRANSIT` under `collector_id`.
    ///
    /// Unknown ids and materials already claimed are left untouched; the
    /// return value reports whether the claim took effect.
    pub fn claim(&self, id: &str, collector_id: impl Into<ActorId>) -> bool {
        let mut materials = self.lock();
        self.refresh(&mut materials);
        let Some(material) = materials
            .iter_mut()
            .find(|m| m.id == id && m.status == MaterialStatus::Available)
        else {
            debug!(material_id = %id, "claim ignored");
            return false;
        };
        let collector_id = collector_id.into();
        material.status = MaterialStatus::InTransit;
        material.collector_id = Some(collector_id.clone());
        info!(material_id = %id, collector_id = %collector_id, "material claimed");
        self.commit(
            &materials,
            RegistryEvent::Claimed {
                id: id.to_string(),
                collector_id,
            },
        );
        true
    }

    /// Mark a material `COLLECTED`.
    ///
    /// There is no `IN_TRANSIT` guard: an `AVAILABLE` material goes straight
    /// to `COLLECTED` with no collector. Unknown ids and materials already
    /// collected are left untouched.
    pub fn complete(&self, id: &str) -> bool {
        let mut materials = self.lock();
        self.refresh(&mut materials);
        let Some(material) = materials
            .iter_mut()
            .find(|m| m.id == id && m.status != MaterialStatus::Collected)
        else {
            debug!(material_id = %id, "complete ignored");
            return false;
        };
        let from = material.status;
        material.status = MaterialStatus::Collected;
        info!(material_id = %id, %from, "material collected");
        self.commit(&materials, RegistryEvent::Completed { id: id.to_string() });
        true
    }

    /// Replace the set with the seed set and drop the stored copy.
    pub fn reset(&self) {
        let mut materials = self.lock();
        *materials = seed_materials();
        if let Err(err) = self.shared.config.remove(MATERIALS_KEY) {
            warn!(?err, "failed to clear stored materials");
        }
        info!("registry reset to seed set");
        let _ = self.shared.events.send(RegistryEvent::Reset);
    }

    // Adopt the stored set when it is readable. Absent or unreadable storage
    // leaves the in-memory set alone: it may hold changes a failed save lost.
    fn refresh(&self, materials: &mut Vec<Material>) {
        if let Ok(Some(stored)) = self.shared.config.load::<Vec<Material>>(MATERIALS_KEY) {
            if has_unique_ids(&stored) && stored != *materials {
                debug!(count = stored.len(), "picked up materials written elsewhere");
                *materials = stored;
            }
        }
    }

    // Called with the materials lock held so storage writes and events keep call order.
    fn commit(&self, materials: &[Material], event: RegistryEvent) {
        if let Err(err) = self.shared.config.save(MATERIALS_KEY, materials) {
            warn!(?err, "failed to persist materials");
        }
        let _ = self.shared.events.send(event);
    }
}

fn has_unique_ids(materials: &[Material]) -> bool {
    let mut seen = HashSet::with_capacity(materials.len());
    materials.iter().all(|m| seen.insert(m.id.as_str()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use reflow_dry_tests::{InMemoryConfigStore, StoreOp};

    fn registry() -> (MaterialRegistry<InMemoryConfigStore>, InMemoryConfigStore) {
        let store = InMemoryConfigStore::new();
        (MaterialRegistry::restore(store.clone()), store)
    }

    #[test]
    fn claim_then_complete_scenario() {
        let (reg, _) = registry();
        let m = reg.create("Plástico", "2kg", Position::new(-23.5495, -46.6323), None);
        assert_eq!(m.status, MaterialStatus::Available);
        assert_eq!(m.collector_id, None);

        assert!(reg.claim(&m.id, "C1"));
        let claimed = reg.get(&m.id).unwrap();
        assert_eq!(claimed.status, MaterialStatus::InTransit);
        assert_eq!(claimed.collector_id.as_deref(), Some("C1"));

        assert!(!reg.claim(&m.id, "C2"));
        assert_eq!(reg.get(&m.id).unwrap(), claimed);

        assert!(reg.complete(&m.id));
        let done = reg.get(&m.id).unwrap();
        assert_eq!(done.status, MaterialStatus::Collected);
        assert_eq!(done.collector_id.as_deref(), Some("C1"));
        assert_eq!(done.position, m.position);
        assert_eq!(done.created_at, m.created_at);
    }

    #[test]
    fn failed_preconditions_do_not_write_or_notify() {
        let (reg, store) = registry();
        let mut rx = reg.subscribe();
        let before = reg.list();

        assert!(!reg.claim("nope", "C1"));
        assert!(!reg.complete("nope"));
        assert_eq!(reg.list(), before);
        assert_eq!(store.calls(StoreOp::Save), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn complete_forces_available_material_to_collected() {
        let (reg, _) = registry();
        assert!(reg.complete("1"));
        let m = reg.get("1").unwrap();
        assert_eq!(m.status, MaterialStatus::Collected);
        assert_eq!(m.collector_id, None);
        assert!(!reg.claim("1", "C1"));
        assert!(!reg.complete("1"));
    }

    #[test]
    fn every_mutation_is_persisted_and_announced() {
        let (reg, store) = registry();
        let mut rx = reg.subscribe();

        let m = reg.create("Metal", "5kg", Position::new(0.0, 0.0), Some("U1".into()));
        reg.claim(&m.id, "C9");
        reg.complete(&m.id);
        assert_eq!(store.calls(StoreOp::Save), 3);

        assert_eq!(rx.try_recv().unwrap(), RegistryEvent::Created(m.clone()));
        assert_eq!(
            rx.try_recv().unwrap(),
            RegistryEvent::Claimed {
                id: m.id.clone(),
                collector_id: "C9".into()
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            RegistryEvent::Completed { id: m.id.clone() }
        );

        let stored: Vec<Material> =
            serde_json::from_slice(&store.raw(MATERIALS_KEY).unwrap()).unwrap();
        assert_eq!(stored, reg.list());
    }

    #[test]
    fn list_keeps_insertion_order() {
        let (reg, _) = registry();
        let a = reg.create("Papel", "1kg", Position::new(1.0, 1.0), None);
        let b = reg.create("Vidro", "3kg", Position::new(2.0, 2.0), None);
        let ids: Vec<_> = reg.list().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["1".to_string(), "2".into(), "3".into(), a.id, b.id]);
    }

    #[test]
    fn restore_round_trips_stored_state() {
        let (reg, store) = registry();
        let m = reg.create("Eletrônico", "2 un", Position::new(-23.55, -46.63), None);
        reg.claim(&m.id, "C1");
        reg.complete("2");

        let again = MaterialRegistry::restore(store);
        assert_eq!(again.list(), reg.list());
    }

    #[test]
    fn restore_falls_back_to_seed() {
        let store = InMemoryConfigStore::new();
        assert_eq!(MaterialRegistry::restore(store.clone()).list(), seed_materials());

        store.put_raw(MATERIALS_KEY, "{ definitely not json");
        assert_eq!(MaterialRegistry::restore(store.clone()).list(), seed_materials());

        let dup = serde_json::to_vec(&[seed_materials()[0].clone(), seed_materials()[0].clone()])
            .unwrap();
        store.put_raw(MATERIALS_KEY, dup);
        assert_eq!(MaterialRegistry::restore(store.clone()).list(), seed_materials());

        store.fail(StoreOp::Load, true);
        assert_eq!(MaterialRegistry::restore(store).list(), seed_materials());
    }

    #[test]
    fn reset_restores_seed_and_clears_storage() {
        let (reg, store) = registry();
        let mut rx = reg.subscribe();
        reg.create("Papel", "1kg", Position::new(1.0, 1.0), None);
        assert!(store.contains_key(MATERIALS_KEY));

        reg.reset();
        assert_eq!(reg.list(), seed_materials());
        assert!(!store.contains_key(MATERIALS_KEY));
        assert!(matches!(rx.try_recv(), Ok(RegistryEvent::Created(_))));
        assert_eq!(rx.try_recv().unwrap(), RegistryEvent::Reset);
    }

    #[test]
    fn storage_failure_does_not_block_mutation() {
        let (reg, store) = registry();
        store.fail(StoreOp::Save, true);
        let m = reg.create("Metal", "10kg", Position::new(0.5, 0.5), None);
        assert!(reg.claim(&m.id, "C1"));
        assert_eq!(reg.get(&m.id).unwrap().status, MaterialStatus::InTransit);
        assert!(!store.contains_key(MATERIALS_KEY));
    }

    #[test]
    fn racing_claims_have_one_winner() {
        let (reg, _) = registry();
        let m = reg.create("Plástico", "2kg", Position::new(0.0, 0.0), None);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let reg = reg.clone();
                let id = m.id.clone();
                std::thread::spawn(move || reg.claim(&id, format!("C{i}")))
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);
        assert!(reg.get(&m.id).unwrap().collector_id.is_some());
    }

    #[test]
    fn non_finite_position_falls_back_to_default_location() {
        let (reg, store) = registry();
        assert!(reg.claim("1", "C1"));
        for bad in [
            Position::new(f64::NAN, -46.6),
            Position::new(-23.5, f64::INFINITY),
            Position::new(f64::NEG_INFINITY, f64::NAN),
        ] {
            assert_eq!(reg.create("Metal", "1kg", bad, None).position, DEFAULT_LOCATION);
        }

        let blob = String::from_utf8(store.raw(MATERIALS_KEY).unwrap()).unwrap();
        assert!(!blob.contains("null"));
        let again = MaterialRegistry::restore(store);
        assert_eq!(again.len(), 6);
        assert_eq!(again.list(), reg.list());
    }

    #[test]
    fn writes_from_two_handles_on_one_store_both_survive() {
        let store = InMemoryConfigStore::new();
        let host = MaterialRegistry::restore(store.clone());
        let cli = MaterialRegistry::restore(store.clone());

        assert!(cli.claim("1", "C1"));
        let spawned = host.create("Vidro", "3kg", Position::new(-23.55, -46.63), None);
        assert_eq!(host.get("1").unwrap().status, MaterialStatus::InTransit);

        assert!(!host.claim("1", "C2"));
        assert!(cli.complete(&spawned.id));

        let restored = MaterialRegistry::restore(store);
        let first = restored.get("1").unwrap();
        assert_eq!(first.status, MaterialStatus::InTransit);
        assert_eq!(first.collector_id.as_deref(), Some("C1"));
        assert_eq!(restored.get(&spawned.id).unwrap().status, MaterialStatus::Collected);
        assert_eq!(restored.len(), 4);
    }

    #[test]
    fn unreadable_store_keeps_in_memory_changes() {
        let (reg, store) = registry();
        let m = reg.create("Papel", "1kg", Position::new(1.0, 1.0), None);
        store.put_raw(MATERIALS_KEY, "{ torn write");
        assert!(reg.claim(&m.id, "C3"));
        assert_eq!(reg.len(), 4);
        assert_eq!(MaterialRegistry::restore(store).list(), reg.list());
    }
}
