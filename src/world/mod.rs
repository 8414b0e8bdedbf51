//! World - owns all bots, resource spots, shelters and the nav grid
//!
//! The world is mutated only by the simulation tick and the subsystems it
//! delegates to, and is rebuilt wholesale on reset.

pub mod resources;
pub mod shelter;
pub mod spawn;

use ahash::AHashMap;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::core::config::EngineConfig;
use crate::core::sundial::Sundial;
use crate::core::types::{AgentId, ShelterId, SpotId, Tick, Vec3};
use crate::entity::agent::{Agent, Appearance, Goal};
use crate::nav::grid::NavGrid;
use crate::simulation::social::Speech;

pub use resources::{ResourceField, ResourceKind, ResourceSpot};
pub use shelter::{Shelter, ShelterRegistry};
pub use spawn::generate_world;

/// Everything a bot's controller may act on besides the bots themselves
#[derive(Debug, Clone)]
pub struct Environment {
    pub ground_radius: f32,
    pub sundial: Sundial,
    pub resources: ResourceField,
    pub shelters: ShelterRegistry,
    pub nav: NavGrid,
}

impl Environment {
    /// Block a newly built shelter on the grid; paths crossing it go stale
    pub fn on_shelter_built(&mut self, id: ShelterId) {
        if let Some(shelter) = self.shelters.get(id) {
            let (center, radius) = (shelter.position, shelter.footprint);
            self.nav.block_footprint(center, radius);
        }
    }
}

/// The simulated world
pub struct World {
    /// Incremented on every reset; stale async results carry older values
    pub generation: u64,
    pub seed: u64,
    pub current_tick: Tick,
    pub env: Environment,
    pub agents: Vec<Agent>,
    agent_index: AHashMap<AgentId, usize>,
    pub rng: ChaCha8Rng,
    next_ordinal: u64,
    /// Social output produced this tick, drained by the loop
    pub outbox: Vec<Speech>,
}

impl World {
    pub fn new(seed: u64, generation: u64, env: Environment, rng: ChaCha8Rng) -> Self {
        Self {
            generation,
            seed,
            current_tick: 0,
            env,
            agents: Vec::new(),
            agent_index: AHashMap::new(),
            rng,
            next_ordinal: 0,
            outbox: Vec::new(),
        }
    }

    /// Spawn a bot; ids are derived from the seed so a rebuild reproduces them
    pub fn spawn_agent(&mut self, appearance: Appearance, position: Vec3, speed: f32) -> AgentId {
        let id = AgentId::from_parts(self.seed ^ self.generation.rotate_left(32), self.next_ordinal);
        self.next_ordinal += 1;

        let agent = Agent::new(id, appearance, position, speed, self.current_tick);
        self.agent_index.insert(id, self.agents.len());
        self.agents.push(agent);
        id
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agent_index.get(&id).map(|&idx| &self.agents[idx])
    }

    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        match self.agent_index.get(&id) {
            Some(&idx) => Some(&mut self.agents[idx]),
            None => None,
        }
    }

    pub fn index_of(&self, id: AgentId) -> Option<usize> {
        self.agent_index.get(&id).copied()
    }

    pub fn is_live(&self, id: AgentId) -> bool {
        self.agent_index.contains_key(&id)
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.agents.iter().map(|a| a.id).collect()
    }

    /// Remove a bot and release what it held
    pub fn remove_agent(&mut self, id: AgentId) -> Option<Agent> {
        let idx = self.agent_index.remove(&id)?;
        let agent = self.agents.remove(idx);
        for (i, a) in self.agents.iter().enumerate().skip(idx) {
            self.agent_index.insert(a.id, i);
        }

        let released = self.env.shelters.release_owner(id);
        if let Some(sheltered) = agent.sheltered_in {
            // Occupancy of a shelter the bot was visiting
            let _ = self.env.shelters.set_occupancy(sheltered, false);
        }
        for other in self.agents.iter_mut() {
            if other.partner == Some(id) {
                other.partner = None;
                other.coupling_complete = false;
                if matches!(other.goal, Some(Goal::Couple { .. })) {
                    other.abandon_goal();
                }
            }
        }
        debug!(agent = %id, released = released.len(), "agent removed");
        Some(agent)
    }

    /// Recompute the ground radius from the population and rebuild the grid
    /// if it changed; existing paths go stale through the grid version
    pub fn resize_for_population(&mut self, config: &EngineConfig) -> bool {
        let radius = config.world.ground_radius_for(self.agents.len());
        if (radius - self.env.ground_radius).abs() < f32::EPSILON {
            return false;
        }
        info!(
            from = self.env.ground_radius,
            to = radius,
            agents = self.agents.len(),
            "resizing world"
        );
        self.env.ground_radius = radius;
        let footprints: Vec<(Vec3, f32)> = self.env.shelters.built_footprints().collect();
        self.env.nav.rebuild(radius, footprints);
        true
    }

    /// Drop food/wood spots that are empty for good
    pub fn remove_depleted_spots(&mut self) -> Vec<SpotId> {
        let depleted = self.env.resources.depleted_ids();
        for id in &depleted {
            self.env.resources.remove(*id);
            debug!(spot = ?id, "spot exhausted and removed");
        }
        depleted
    }
}
