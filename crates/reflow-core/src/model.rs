// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Domain records shared by the registry, the simulator and their consumers.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Identifier of a material. Opaque, unique within a registry.
pub type MaterialId = String;

/// Identifier of an acting party (citizen, collector or simulated truck).
pub type ActorId = String;

/// Material categories the demand process draws from.
pub const MATERIAL_TYPES: [&str; 5] = ["Plástico", "Metal", "Eletrônico", "Papel", "Vidro"];

/// Weight labels the demand process draws from.
pub const WEIGHT_LABELS: [&str; 5] = ["1kg", "5kg", "2 un", "10kg", "3kg"];

/// `generatorId` stamped on materials synthesized by the demand process.
pub const SIMULATED_SOURCE_ID: &str = "SIMULATED_USER";

/// Fallback coordinate when a reporter has no location fix (São Paulo center).
pub const DEFAULT_LOCATION: Position = Position::new(-23.5505, -46.6333);

/// A `(latitude, longitude)` pair in degrees.
///
/// Serialized as a two-element `[lat, lng]` array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Position {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

impl Position {
    /// Build a position from latitude and longitude.
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Whether both coordinates are finite. JSON has no encoding for NaN or
    /// infinity, so only finite positions survive storage.
    pub const fn is_finite(self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }

    /// Shift by the given per-axis deltas.
    #[must_use]
    pub fn offset(self, d_lat: f64, d_lng: f64) -> Self {
        Self::new(self.lat + d_lat, self.lng + d_lng)
    }
}

impl From<[f64; 2]> for Position {
    fn from([lat, lng]: [f64; 2]) -> Self {
        Self::new(lat, lng)
    }
}

impl From<Position> for [f64; 2] {
    fn from(p: Position) -> Self {
        [p.lat, p.lng]
    }
}

/// Lifecycle state of a material.
///
/// Transitions only ever move forward: `Available -> InTransit -> Collected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaterialStatus {
    /// Reported and waiting for a collector.
    Available,
    /// Claimed by a collector.
    InTransit,
    /// Terminal: picked up.
    Collected,
}

impl MaterialStatus {
    /// Wire label (`AVAILABLE`, `IN_TRANSIT`, `COLLECTED`).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Available => "AVAILABLE",
            Self::InTransit => "IN_TRANSIT",
            Self::Collected => "COLLECTED",
        }
    }
}

impl std::fmt::Display for MaterialStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reported unit of disposable waste.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    /// Unique id, fixed at creation.
    pub id: MaterialId,
    /// Category label, e.g. `Plástico`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Free-form quantity label, e.g. `2kg`. Never parsed.
    pub weight: String,
    /// Where the material was reported. Never changes after creation.
    #[serde(alias = "pos")]
    pub position: Position,
    /// Current lifecycle state.
    pub status: MaterialStatus,
    /// Reporter, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator_id: Option<ActorId>,
    /// Claiming collector; set once the material leaves `Available`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collector_id: Option<ActorId>,
    /// Creation timestamp (RFC 3339 on the wire).
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Decorative status of a simulated truck. Not linked to any material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorStatus {
    /// Idle.
    Available,
    /// Driving somewhere.
    EnRoute,
}

/// A simulated collector truck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    /// Roster id, e.g. `T1`.
    pub id: ActorId,
    /// Driver display name.
    pub name: String,
    /// Vehicle description.
    pub vehicle_kind: String,
    /// Current position; moved by the simulator.
    pub position: Position,
    /// Decorative status.
    pub status: ActorStatus,
}

impl Actor {
    fn new(
        id: &str,
        name: &str,
        vehicle_kind: &str,
        position: Position,
        status: ActorStatus,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            vehicle_kind: vehicle_kind.to_string(),
            position,
            status,
        }
    }
}

/// The fixed truck roster the simulator starts from.
pub fn default_roster() -> Vec<Actor> {
    use ActorStatus::{Available, EnRoute};
    let light_truck = "Caminhão Leve";
    vec![
        Actor::new("T1", "Carlos S.", light_truck, Position::new(-23.5485, -46.6313), EnRoute),
        Actor::new("T2", "Ana P.", "Van", Position::new(-23.5600, -46.6400), Available),
        Actor::new("T3", "João M.", light_truck, Position::new(-23.5400, -46.6200), EnRoute),
        Actor::new("T4", "Roberto F.", "Carroça", Position::new(-23.5550, -46.6250), Available),
    ]
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use time::macros::datetime;

    fn sample() -> Material {
        Material {
            id: "abc1234".into(),
            kind: "Plástico".into(),
            weight: "2kg".into(),
            position: Position::new(-23.5495, -46.6323),
            status: MaterialStatus::InTransit,
            generator_id: None,
            collector_id: Some("C1".into()),
            created_at: datetime!(2024-05-01 12:30:00.123456789 UTC),
        }
    }

    #[test]
    fn material_wire_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "abc1234",
                "type": "Plástico",
                "weight": "2kg",
                "position": [-23.5495, -46.6323],
                "status": "IN_TRANSIT",
                "collectorId": "C1",
                "createdAt": "2024-05-01T12:30:00.123456789Z",
            })
        );
    }

    #[test]
    fn legacy_pos_key_is_accepted() {
        let raw = r#"{"id":"1","pos":[-23.5,-46.6],"type":"Metal","weight":"5kg",
            "status":"AVAILABLE","createdAt":"2024-01-01T00:00:00.000Z"}"#;
        let m: Material = serde_json::from_str(raw).unwrap();
        assert_eq!(m.position, Position::new(-23.5, -46.6));
        assert_eq!(m.generator_id, None);
        assert_eq!(m.status, MaterialStatus::Available);
    }

    #[test]
    fn status_order_matches_lifecycle() {
        assert!(MaterialStatus::Available < MaterialStatus::InTransit);
        assert!(MaterialStatus::InTransit < MaterialStatus::Collected);
        assert_eq!(MaterialStatus::InTransit.to_string(), "IN_TRANSIT");
    }

    #[test]
    fn roster_ids_are_distinct() {
        let roster = default_roster();
        let mut ids: Vec<_> = roster.iter().map(|a| a.id.as_str()).collect();
        ids.dedup();
        assert_eq!(ids, vec!["T1", "T2", "T3", "T4"]);
    }
}
