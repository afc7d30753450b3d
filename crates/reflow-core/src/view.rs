// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Read-side views over a material snapshot.
//!
//! Everything here is recomputed from a `list()` snapshot; nothing is stored
//! beside the registry, so there is no second source of truth to drift.

use crate::model::{ActorId, Material, MaterialId, MaterialStatus};
use serde::Serialize;
use std::collections::BTreeMap;

/// Dashboard counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialStats {
    /// All materials.
    pub total: usize,
    /// Waiting for a collector.
    pub available: usize,
    /// Active collections.
    pub in_transit: usize,
    /// Picked up.
    pub collected: usize,
}

impl MaterialStats {
    /// Count materials by status.
    pub fn from_materials(materials: &[Material]) -> Self {
        materials.iter().fold(Self::default(), |mut acc, m| {
            acc.total += 1;
            match m.status {
                MaterialStatus::Available => acc.available += 1,
                MaterialStatus::InTransit => acc.in_transit += 1,
                MaterialStatus::Collected => acc.collected += 1,
            }
            acc
        })
    }
}

/// Map each collector to the materials it claimed, in registry order.
pub fn collector_index(materials: &[Material]) -> BTreeMap<ActorId, Vec<MaterialId>> {
    let mut index: BTreeMap<ActorId, Vec<MaterialId>> = BTreeMap::new();
    for m in materials {
        if let Some(collector) = &m.collector_id {
            index.entry(collector.clone()).or_default().push(m.id.clone());
        }
    }
    index
}

/// Materials of one category.
pub fn of_type<'a>(
    materials: &'a [Material],
    kind: &'a str,
) -> impl Iterator<Item = &'a Material> + 'a {
    materials.iter().filter(move |m| m.kind == kind)
}

/// Materials reported by `generator_id`.
pub fn generated_by<'a>(
    materials: &'a [Material],
    generator_id: &'a str,
) -> impl Iterator<Item = &'a Material> + 'a {
    materials
        .iter()
        .filter(move |m| m.generator_id.as_deref() == Some(generator_id))
}

/// Materials claimed by `collector_id`, optionally restricted to one status.
pub fn claimed_by<'a>(
    materials: &'a [Material],
    collector_id: &'a str,
    status: Option<MaterialStatus>,
) -> impl Iterator<Item = &'a Material> + 'a {
    materials.iter().filter(move |m| {
        m.collector_id.as_deref() == Some(collector_id) && status.is_none_or(|s| m.status == s)
    })
}

/// Copy of the snapshot sorted newest first. Ties keep reverse insertion order.
pub fn newest_first(materials: &[Material]) -> Vec<Material> {
    let mut sorted: Vec<Material> = materials.iter().rev().cloned().collect();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    sorted
}
