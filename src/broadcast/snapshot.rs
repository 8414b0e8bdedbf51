//! Full world snapshots for observers
//!
//! Observers always receive complete state, never deltas, so a reconnecting
//! client needs no sequence numbers or resend buffer.

use serde::{Deserialize, Serialize};

use crate::core::sundial::DayPhase;
use crate::core::types::{AgentId, ShelterId, SpotId, Tick, Vec3};
use crate::entity::agent::{Agent, BodyShape, Inventory, LifetimeCounters};
use crate::entity::needs::Needs;
use crate::world::resources::{ResourceKind, ResourceSpot};
use crate::world::shelter::{Shelter, ShelterKind, ShelterStage};
use crate::world::World;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotView {
    pub id: SpotId,
    pub position: Vec3,
    pub radius: f32,
    pub available: f32,
    pub max_available: f32,
}

impl From<&ResourceSpot> for SpotView {
    fn from(spot: &ResourceSpot) -> Self {
        Self {
            id: spot.id,
            position: spot.position,
            radius: spot.radius,
            available: spot.available,
            max_available: spot.max_available,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShelterView {
    pub id: ShelterId,
    pub kind: ShelterKind,
    pub position: Vec3,
    pub stage: ShelterStage,
    pub progress: f32,
    pub built: bool,
    pub owner_id: Option<AgentId>,
    pub owner_color: Option<String>,
    pub occupied: bool,
}

impl From<&Shelter> for ShelterView {
    fn from(shelter: &Shelter) -> Self {
        Self {
            id: shelter.id,
            kind: shelter.kind,
            position: shelter.position,
            stage: shelter.stage(),
            progress: shelter.progress,
            built: shelter.built,
            owner_id: shelter.owner,
            owner_color: shelter.owner_color.clone(),
            occupied: shelter.occupied,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SundialView {
    pub position: Vec3,
    pub time_of_day: f32,
    pub phase: DayPhase,
    pub day: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotView {
    pub id: AgentId,
    pub name: String,
    pub color: String,
    pub shape: BodyShape,
    pub width: f32,
    pub height: f32,
    pub position: Vec3,
    pub target: Option<Vec3>,
    pub state: String,
    pub needs: Needs,
    pub inventory: Inventory,
    pub counters: LifetimeCounters,
    pub shelter_id: Option<ShelterId>,
    pub partner_id: Option<AgentId>,
    pub spawned_at: u64,
}

impl From<&Agent> for BotView {
    fn from(agent: &Agent) -> Self {
        Self {
            id: agent.id,
            name: agent.appearance.name.clone(),
            color: agent.appearance.color.clone(),
            shape: agent.appearance.shape,
            width: agent.appearance.width,
            height: agent.appearance.height,
            position: agent.position,
            target: agent.target,
            state: agent.state.as_str().to_string(),
            needs: agent.needs.clone(),
            inventory: agent.inventory,
            counters: agent.counters,
            shelter_id: agent.shelter,
            partner_id: agent.partner,
            spawned_at: agent.spawned_at_ms,
        }
    }
}

/// Payload of `world:init` and `world:update`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldSnapshot {
    pub generation: u64,
    pub tick: Tick,
    pub speed: f32,
    pub ground_radius: f32,
    pub water_spots: Vec<SpotView>,
    pub corn_spots: Vec<SpotView>,
    pub wood_spots: Vec<SpotView>,
    pub stone_spots: Vec<SpotView>,
    pub shelters: Vec<ShelterView>,
    pub sundial: SundialView,
    pub bots: Vec<BotView>,
}

impl WorldSnapshot {
    pub fn capture(world: &World, speed: f32) -> Self {
        let env = &world.env;
        let spots = |kind: ResourceKind| -> Vec<SpotView> {
            env.resources.of_kind(kind).map(SpotView::from).collect()
        };
        Self {
            generation: world.generation,
            tick: world.current_tick,
            speed,
            ground_radius: env.ground_radius,
            water_spots: spots(ResourceKind::Water),
            corn_spots: spots(ResourceKind::Food),
            wood_spots: spots(ResourceKind::Wood),
            stone_spots: spots(ResourceKind::Stone),
            shelters: env.shelters.iter().map(ShelterView::from).collect(),
            sundial: SundialView {
                position: env.sundial.sun_position(env.ground_radius),
                time_of_day: env.sundial.time_of_day(),
                phase: env.sundial.phase(),
                day: env.sundial.day(),
            },
            bots: world.agents.iter().map(BotView::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::EngineConfig;
    use crate::world::spawn::generate_world;

    #[test]
    fn test_snapshot_groups_spots_by_kind() {
        let config = EngineConfig::default();
        let world = generate_world(&config, 0);
        let snapshot = WorldSnapshot::capture(&world, 2.0);

        assert_eq!(snapshot.water_spots.len(), config.world.water_spots);
        assert_eq!(snapshot.corn_spots.len(), config.world.food_spots);
        assert_eq!(snapshot.wood_spots.len(), config.world.wood_spots);
        assert_eq!(snapshot.stone_spots.len(), config.world.stone_spots);
        assert_eq!(snapshot.bots.len(), config.world.agent_count);
        assert_eq!(snapshot.speed, 2.0);
    }

    #[test]
    fn test_snapshot_uses_camel_case_keys() {
        let world = generate_world(&EngineConfig::default(), 0);
        let json = serde_json::to_value(WorldSnapshot::capture(&world, 1.0)).unwrap();
        assert!(json.get("groundRadius").is_some());
        assert!(json.get("cornSpots").is_some());
        assert!(json["waterSpots"][0].get("maxAvailable").is_some());
        assert!(json["bots"][0]["counters"].get("sheltersBuilt").is_some());
        assert!(json["shelters"][0].get("ownerColor").is_some());
    }
}
