//! Deterministic world generation
//!
//! The same seed always produces the same ground radius, spots, plots and
//! starting bots, which is what makes a reset reproducible.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::core::config::EngineConfig;
use crate::core::sundial::Sundial;
use crate::core::types::Vec3;
use crate::entity::identity::generate_appearance;
use crate::entity::needs::{NeedKind, Needs};
use crate::nav::grid::NavGrid;
use crate::world::resources::{ResourceField, ResourceKind};
use crate::world::shelter::{ShelterKind, ShelterRegistry};
use crate::world::{Environment, World};

/// Placement attempts before a candidate is accepted regardless of overlap
const MAX_PLACEMENT_ATTEMPTS: usize = 64;

/// Fraction of the ground radius used for spots and plots
const PLACEMENT_SPREAD: f32 = 0.85;

/// Clearance kept free in front of a plot's door
pub const ENTRANCE_CLEARANCE: f32 = 1.0;

/// Counts derived from config for one generation
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnConfig {
    pub seed: u64,
    pub agent_count: usize,
    pub ground_radius: f32,
    pub spot_counts: [(ResourceKind, usize); 4],
    pub plot_count: usize,
}

impl SpawnConfig {
    pub fn from_config(config: &EngineConfig) -> Self {
        let world = &config.world;
        Self {
            seed: world.seed,
            agent_count: world.agent_count,
            ground_radius: world.ground_radius_for(world.agent_count),
            spot_counts: [
                (ResourceKind::Water, world.water_spots),
                (ResourceKind::Food, world.food_spots),
                (ResourceKind::Wood, world.wood_spots),
                (ResourceKind::Stone, world.stone_spots),
            ],
            plot_count: world.agent_count + world.spare_plots,
        }
    }
}

/// Already placed circles, used for overlap rejection
struct Placement {
    taken: Vec<(Vec3, f32)>,
}

impl Placement {
    fn new() -> Self {
        Self { taken: Vec::new() }
    }

    fn is_free(&self, pos: Vec3, radius: f32) -> bool {
        self.taken
            .iter()
            .all(|(other, r)| other.ground_distance(&pos) > r + radius)
    }

    /// Sample a point in the disc of `spread` snapped to a cell center,
    /// retrying until it overlaps nothing already placed
    fn place(
        &mut self,
        rng: &mut ChaCha8Rng,
        grid: &NavGrid,
        spread: f32,
        radius: f32,
    ) -> Vec3 {
        let mut candidate = Vec3::ZERO;
        for _ in 0..MAX_PLACEMENT_ATTEMPTS {
            candidate = grid.to_world(grid.to_cell(random_in_disc(rng, spread)));
            if candidate.ground_length() <= spread && self.is_free(candidate, radius) {
                break;
            }
        }
        self.taken.push((candidate, radius));
        candidate
    }
}

fn random_in_disc(rng: &mut ChaCha8Rng, radius: f32) -> Vec3 {
    let angle = rng.gen_range(0.0..std::f32::consts::TAU);
    // sqrt keeps the density uniform over the disc
    let distance = radius * rng.gen::<f32>().sqrt();
    Vec3::ground(angle.cos() * distance, angle.sin() * distance)
}

fn capacity_for(kind: ResourceKind, config: &EngineConfig) -> (f32, f32) {
    let world = &config.world;
    match kind {
        ResourceKind::Water => (world.water_capacity, world.water_regrow_rate),
        ResourceKind::Food => (world.food_capacity, world.food_regrow_rate),
        ResourceKind::Wood => (world.wood_capacity, world.wood_regrow_rate),
        ResourceKind::Stone => (world.stone_capacity, world.stone_regrow_rate),
    }
}

/// Build a fresh world for `generation` from the configured seed
pub fn generate_world(config: &EngineConfig, generation: u64) -> World {
    let spawn = SpawnConfig::from_config(config);
    let mut rng = ChaCha8Rng::seed_from_u64(spawn.seed);

    let nav = NavGrid::new(spawn.ground_radius, config.nav.cell_size);
    let mut placement = Placement::new();
    let mut resources = ResourceField::new();
    let mut shelters = ShelterRegistry::new();

    // Plots first: they need room for the footprint and the door
    let footprint = config.world.shelter_footprint;
    let plot_spread = (spawn.ground_radius - footprint - ENTRANCE_CLEARANCE - 2.0)
        .max(footprint)
        .min(spawn.ground_radius * PLACEMENT_SPREAD);
    for i in 0..spawn.plot_count {
        let kind = if i % 3 == 2 { ShelterKind::Cabin } else { ShelterKind::Hut };
        let pos = placement.place(
            &mut rng,
            &nav,
            plot_spread,
            footprint + ENTRANCE_CLEARANCE + 1.0,
        );
        shelters.add_plot(kind, pos, footprint);
    }

    let spot_spread = spawn.ground_radius * PLACEMENT_SPREAD;
    for (kind, count) in spawn.spot_counts {
        let (capacity, regrow) = capacity_for(kind, config);
        for _ in 0..count {
            let pos = placement.place(&mut rng, &nav, spot_spread, config.world.spot_radius + 1.0);
            resources.add(kind, pos, config.world.spot_radius, capacity, regrow);
        }
    }

    let env = Environment {
        ground_radius: spawn.ground_radius,
        sundial: Sundial::new(config.world.day_length_secs),
        resources,
        shelters,
        nav,
    };

    let mut world = World::new(spawn.seed, generation, env, rng);

    for _ in 0..spawn.agent_count {
        let appearance = generate_appearance(&mut world.rng);
        let pos = placement.place(&mut world.rng, &world.env.nav, spot_spread * 0.7, 1.0);
        let id = world.spawn_agent(appearance, pos, config.agents.move_speed);

        let initial: Vec<(NeedKind, f32)> = NeedKind::ALL
            .iter()
            .filter(|k| **k != NeedKind::Homeostasis)
            .map(|k| (*k, world.rng.gen_range(65.0..config.needs.max_value.max(65.1))))
            .collect();
        let chatter = world.rng.gen_range(0.0..config.agents.chatter_interval_secs.max(0.1));

        if let Some(agent) = world.agent_mut(id) {
            agent.needs = Needs::full(config.needs.max_value);
            for (kind, value) in initial {
                agent.needs.set(kind, value, &config.needs);
            }
            agent.chatter_timer = chatter;
        }
    }

    info!(
        seed = spawn.seed,
        generation,
        agents = spawn.agent_count,
        radius = spawn.ground_radius,
        spots = world.env.resources.len(),
        plots = world.env.shelters.len(),
        "world generated"
    );

    world
}
