//! Shelter registry - plots, construction progress, ownership and occupancy
//!
//! Lifecycle per shelter: `Plot` (unowned, no progress) ->
//! `UnderConstruction` (owned, progress 0..100) -> `Built`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{AgentId, ShelterId, Vec3};

/// Progress at which a shelter is complete
pub const FULL_PROGRESS: f32 = 100.0;

/// Type of shelter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShelterKind {
    Hut,
    Cabin,
}

/// Derived lifecycle stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShelterStage {
    Plot,
    UnderConstruction,
    Built,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shelter {
    pub id: ShelterId,
    pub kind: ShelterKind,
    pub position: Vec3,
    /// Radius of the blocking footprint once built
    pub footprint: f32,
    /// Construction progress (0.0 to 100.0)
    pub progress: f32,
    pub built: bool,
    pub owner: Option<AgentId>,
    /// Owner color for nameplates
    pub owner_color: Option<String>,
    pub occupied: bool,
}

impl Shelter {
    pub fn stage(&self) -> ShelterStage {
        if self.built {
            ShelterStage::Built
        } else if self.owner.is_some() || self.progress > 0.0 {
            ShelterStage::UnderConstruction
        } else {
            ShelterStage::Plot
        }
    }

    /// Standing point in front of the door, just outside the footprint
    pub fn entrance(&self, clearance: f32) -> Vec3 {
        self.position + Vec3::ground(0.0, self.footprint + clearance)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShelterError {
    #[error("shelter {0:?} not found")]
    NotFound(ShelterId),
    #[error("shelter {shelter:?} already owned by {owner}")]
    AlreadyOwned { shelter: ShelterId, owner: AgentId },
    #[error("shelter {0:?} has no owner")]
    NoOwner(ShelterId),
    #[error("shelter {0:?} is owned by someone else")]
    NotOwner(ShelterId),
    #[error("shelter {0:?} is not built")]
    NotBuilt(ShelterId),
}

/// Result of a construction increment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContributionResult {
    /// Work added, shelter still under construction
    InProgress { progress: f32 },
    /// Work added, shelter is now built
    Completed,
    /// Shelter was already built; nothing changed
    AlreadyComplete,
}

#[derive(Debug, Clone, Default)]
pub struct ShelterRegistry {
    shelters: Vec<Shelter>,
    next_id: u32,
}

impl ShelterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an unclaimed plot
    pub fn add_plot(&mut self, kind: ShelterKind, position: Vec3, footprint: f32) -> ShelterId {
        let id = ShelterId(self.next_id);
        self.next_id += 1;
        self.shelters.push(Shelter {
            id,
            kind,
            position,
            footprint,
            progress: 0.0,
            built: false,
            owner: None,
            owner_color: None,
            occupied: false,
        });
        id
    }

    pub fn get(&self, id: ShelterId) -> Option<&Shelter> {
        self.shelters.iter().find(|s| s.id == id)
    }

    fn get_mut(&mut self, id: ShelterId) -> Result<&mut Shelter, ShelterError> {
        self.shelters
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(ShelterError::NotFound(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Shelter> {
        self.shelters.iter()
    }

    pub fn len(&self) -> usize {
        self.shelters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shelters.is_empty()
    }

    pub fn built_count(&self) -> usize {
        self.shelters.iter().filter(|s| s.built).count()
    }

    /// Claim a shelter for `agent`
    ///
    /// Rejected when a different, still-live agent owns it. Shelters of
    /// expired owners can be taken over.
    pub fn assign_owner(
        &mut self,
        id: ShelterId,
        agent: AgentId,
        color: &str,
        is_live: impl Fn(AgentId) -> bool,
    ) -> Result<(), ShelterError> {
        let shelter = self.get_mut(id)?;
        if let Some(owner) = shelter.owner {
            if owner != agent && is_live(owner) {
                return Err(ShelterError::AlreadyOwned { shelter: id, owner });
            }
        }
        shelter.owner = Some(agent);
        shelter.owner_color = Some(color.to_string());
        Ok(())
    }

    /// Drop every ownership held by `agent`; returns the released shelters
    pub fn release_owner(&mut self, agent: AgentId) -> Vec<ShelterId> {
        let mut released = Vec::new();
        for shelter in self.shelters.iter_mut().filter(|s| s.owner == Some(agent)) {
            shelter.owner = None;
            shelter.owner_color = None;
            shelter.occupied = false;
            released.push(shelter.id);
        }
        released
    }

    /// Add construction work from the owner
    pub fn advance_construction(
        &mut self,
        id: ShelterId,
        by: AgentId,
        amount: f32,
    ) -> Result<ContributionResult, ShelterError> {
        let shelter = self.get_mut(id)?;
        match shelter.owner {
            None => return Err(ShelterError::NoOwner(id)),
            Some(owner) if owner != by => return Err(ShelterError::NotOwner(id)),
            Some(_) => {}
        }
        if shelter.built {
            return Ok(ContributionResult::AlreadyComplete);
        }

        shelter.progress = (shelter.progress + amount.max(0.0)).min(FULL_PROGRESS);
        if shelter.progress >= FULL_PROGRESS {
            shelter.progress = FULL_PROGRESS;
            shelter.built = true;
            Ok(ContributionResult::Completed)
        } else {
            Ok(ContributionResult::InProgress {
                progress: shelter.progress,
            })
        }
    }

    /// Mark a built shelter as occupied or vacant
    pub fn set_occupancy(&mut self, id: ShelterId, occupied: bool) -> Result<(), ShelterError> {
        let shelter = self.get_mut(id)?;
        if occupied && !shelter.built {
            return Err(ShelterError::NotBuilt(id));
        }
        shelter.occupied = occupied;
        Ok(())
    }

    /// Nearest shelter nobody live owns, excluding `skip`
    ///
    /// With `built` set this finds vacant finished shelters, otherwise
    /// open plots.
    pub fn nearest_free(
        &self,
        from: Vec3,
        built: bool,
        skip: &[ShelterId],
        is_live: impl Fn(AgentId) -> bool,
    ) -> Option<ShelterId> {
        let mut best: Option<(ShelterId, f32)> = None;
        for shelter in &self.shelters {
            if skip.contains(&shelter.id) || shelter.built != built {
                continue;
            }
            if shelter.owner.map_or(false, |o| is_live(o)) {
                continue;
            }
            let distance = shelter.position.ground_distance(&from);
            match best {
                Some((_, d)) if distance >= d => {}
                _ => best = Some((shelter.id, distance)),
            }
        }
        best.map(|(id, _)| id)
    }

    /// Built shelters as (center, footprint radius) for the nav grid
    pub fn built_footprints(&self) -> impl Iterator<Item = (Vec3, f32)> + '_ {
        self.shelters
            .iter()
            .filter(|s| s.built)
            .map(|s| (s.position, s.footprint))
    }
}
