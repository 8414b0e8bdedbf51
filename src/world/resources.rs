//! Resource spots for water, food (corn), wood and stone
//!
//! A ResourceSpot is a fixed location where bots harvest a resource.
//! Spots deplete when harvested and, when regrowth is enabled, refill over
//! time up to their capacity.

use serde::{Deserialize, Serialize};

use crate::core::types::{SpotId, Vec3};

/// Type of resource available at a spot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Water,
    Food,
    Wood,
    Stone,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Water,
        ResourceKind::Food,
        ResourceKind::Wood,
        ResourceKind::Stone,
    ];

    /// Whether an exhausted, non-regrowing spot of this kind leaves the map
    ///
    /// Clear-cut forests and picked-over fields vanish; quarries and water
    /// holes stay where they are.
    pub fn removable_when_depleted(&self) -> bool {
        matches!(self, ResourceKind::Food | ResourceKind::Wood)
    }
}

/// A spot where bots can harvest a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpot {
    pub id: SpotId,
    pub kind: ResourceKind,
    pub position: Vec3,
    pub radius: f32,
    pub available: f32,
    pub max_available: f32,
    /// Units per simulated second; 0.0 = no regrowth
    pub regrow_rate: f32,
}

impl ResourceSpot {
    /// Check if a position is within this spot
    pub fn contains(&self, pos: Vec3) -> bool {
        self.position.ground_distance(&pos) <= self.radius
    }

    pub fn regrows(&self) -> bool {
        self.regrow_rate > 0.0
    }

    /// Harvest up to `amount`; returns what was actually granted
    pub fn harvest(&mut self, amount: f32) -> f32 {
        let granted = amount.max(0.0).min(self.available);
        self.available = (self.available - granted).max(0.0);
        granted
    }

    /// Regrow toward capacity
    pub fn regrow(&mut self, dt: f32) {
        if !self.regrows() || self.available >= self.max_available {
            return;
        }
        self.available = (self.available + self.regrow_rate * dt.max(0.0)).min(self.max_available);
    }

    /// Empty for good and allowed to disappear
    pub fn is_permanently_depleted(&self) -> bool {
        !self.regrows() && self.available <= 0.0 && self.kind.removable_when_depleted()
    }
}

/// All resource spots of a world, in insertion order
#[derive(Debug, Clone, Default)]
pub struct ResourceField {
    spots: Vec<ResourceSpot>,
    next_id: u32,
}

impl ResourceField {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a spot; `available` starts at capacity
    pub fn add(
        &mut self,
        kind: ResourceKind,
        position: Vec3,
        radius: f32,
        max_available: f32,
        regrow_rate: f32,
    ) -> SpotId {
        let id = SpotId(self.next_id);
        self.next_id += 1;
        let max_available = max_available.max(0.0);
        self.spots.push(ResourceSpot {
            id,
            kind,
            position,
            radius,
            available: max_available,
            max_available,
            regrow_rate: regrow_rate.max(0.0),
        });
        id
    }

    pub fn get(&self, id: SpotId) -> Option<&ResourceSpot> {
        self.spots.iter().find(|s| s.id == id)
    }

    pub fn get_mut(&mut self, id: SpotId) -> Option<&mut ResourceSpot> {
        self.spots.iter_mut().find(|s| s.id == id)
    }

    pub fn spots(&self) -> &[ResourceSpot] {
        &self.spots
    }

    pub fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &ResourceSpot> {
        self.spots.iter().filter(move |s| s.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.spots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spots.is_empty()
    }

    /// Harvest from a spot, clamped to what is left
    ///
    /// Unknown (already removed) spots grant nothing, same as an empty one.
    pub fn harvest(&mut self, id: SpotId, amount: f32) -> f32 {
        self.get_mut(id).map(|spot| spot.harvest(amount)).unwrap_or(0.0)
    }

    /// Regrow every regrowth-enabled spot
    pub fn regrow(&mut self, dt: f32) {
        for spot in &mut self.spots {
            spot.regrow(dt);
        }
    }

    /// Spots that are empty for good
    pub fn depleted_ids(&self) -> Vec<SpotId> {
        self.spots
            .iter()
            .filter(|s| s.is_permanently_depleted())
            .map(|s| s.id)
            .collect()
    }

    pub fn remove(&mut self, id: SpotId) -> Option<ResourceSpot> {
        let idx = self.spots.iter().position(|s| s.id == id)?;
        Some(self.spots.remove(idx))
    }

    /// Nearest non-empty spot of `kind` within `radius` of `from`
    ///
    /// Ties are broken by insertion order.
    pub fn nearest(&self, kind: ResourceKind, from: Vec3, radius: f32) -> Option<SpotId> {
        let mut best: Option<(SpotId, f32)> = None;
        for spot in self.of_kind(kind) {
            if spot.available <= 0.0 {
                continue;
            }
            let distance = spot.position.ground_distance(&from);
            if distance > radius {
                continue;
            }
            // Strictly closer only: earlier spots win ties
            match best {
                Some((_, d)) if distance >= d => {}
                _ => best = Some((spot.id, distance)),
            }
        }
        best.map(|(id, _)| id)
    }
}
