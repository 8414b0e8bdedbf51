//! Integration tests for whole-world scenarios
//!
//! These drive `run_simulation_tick` and `Simulation` the same way the loop
//! does:
//! - A starving bot walks to food, harvests once and recovers
//! - Two bots contending for one plot end up with different plots
//! - Reset rebuilds the initial world regardless of what happened before
//! - A goal walled in by built shelters is abandoned within one tick

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use bot_habitat::broadcast::WorldSnapshot;
use bot_habitat::core::sundial::Sundial;
use bot_habitat::core::types::{Cell, Vec3};
use bot_habitat::core::EngineConfig;
use bot_habitat::entity::{Appearance, BodyShape, BotState, Goal, NeedKind, NeedLevel};
use bot_habitat::nav::grid::NavGrid;
use bot_habitat::nav::pathfinding::find_path;
use bot_habitat::simulation::tick::run_simulation_tick;
use bot_habitat::simulation::Simulation;
use bot_habitat::world::shelter::{ShelterError, ShelterKind};
use bot_habitat::world::{Environment, ResourceField, ResourceKind, ShelterRegistry, World};

fn config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.agents.idle_wander_chance = 0.0;
    config.agents.chatter_chance = 0.0;
    config
}

fn empty_world(radius: f32) -> World {
    let env = Environment {
        ground_radius: radius,
        sundial: Sundial::new(240.0),
        resources: ResourceField::new(),
        shelters: ShelterRegistry::new(),
        nav: NavGrid::new(radius, 1.0),
    };
    World::new(7, 0, env, ChaCha8Rng::seed_from_u64(7))
}

fn look(name: &str) -> Appearance {
    Appearance {
        name: name.into(),
        color: "#f4a261".into(),
        shape: BodyShape::Capsule,
        width: 0.8,
        height: 1.6,
    }
}

fn spot_count(s: &WorldSnapshot) -> usize {
    s.water_spots.len() + s.corn_spots.len() + s.wood_spots.len() + s.stone_spots.len()
}

#[test]
fn test_critical_food_scenario() {
    let config = config();
    let mut world = empty_world(30.0);
    let spot = world
        .env
        .resources
        .add(ResourceKind::Food, Vec3::ground(6.5, 0.5), 1.5, 10.0, 0.0);
    let id = world.spawn_agent(look("Bram"), Vec3::ground(0.5, 0.5), config.agents.move_speed);
    world
        .agent_mut(id)
        .unwrap()
        .needs
        .set(NeedKind::Food, 15.0, &config.needs);
    assert_eq!(
        world.agent(id).unwrap().needs.level(NeedKind::Food, &config.needs),
        NeedLevel::Critical
    );

    let mut harvested = false;
    for _ in 0..200 {
        run_simulation_tick(&mut world, &config, 0.1);
        if world.env.resources.get(spot).unwrap().available < 10.0 {
            harvested = true;
            break;
        }
    }

    assert!(harvested, "bot never harvested");
    let available = world.env.resources.get(spot).unwrap().available;
    assert!((available - 7.0).abs() < 0.01, "available = {}", available);
    let agent = world.agent(id).unwrap();
    assert_ne!(agent.needs.level(NeedKind::Food, &config.needs), NeedLevel::Critical);
    assert_eq!(agent.counters.harvested, 3);
}

#[test]
fn test_surplus_harvest_is_carried_and_eaten_later() {
    let mut config = config();
    config.agents.harvest_amount = 8.0;
    let mut world = empty_world(30.0);
    let spot = world
        .env
        .resources
        .add(ResourceKind::Food, Vec3::ground(6.5, 0.5), 1.5, 20.0, 0.0);
    let id = world.spawn_agent(look("Tamsin"), Vec3::ground(0.5, 0.5), config.agents.move_speed);
    world
        .agent_mut(id)
        .unwrap()
        .needs
        .set(NeedKind::Food, 45.0, &config.needs);

    for _ in 0..200 {
        run_simulation_tick(&mut world, &config, 0.1);
        if world.env.resources.get(spot).unwrap().available < 20.0 {
            break;
        }
    }
    assert!((world.env.resources.get(spot).unwrap().available - 12.0).abs() < 0.01);
    let agent = world.agent(id).unwrap();
    assert_eq!(agent.inventory.food, 4);
    assert_eq!(agent.needs.get(NeedKind::Food), config.needs.max_value);

    // Hungry again: eats from the pack instead of walking back
    world
        .agent_mut(id)
        .unwrap()
        .needs
        .set(NeedKind::Food, 40.0, &config.needs);
    run_simulation_tick(&mut world, &config, 0.1);

    let agent = world.agent(id).unwrap();
    assert_eq!(agent.inventory.food, 3);
    assert!(agent.needs.get(NeedKind::Food) > 50.0);
    assert!(agent.goal.is_none());
    assert!((world.env.resources.get(spot).unwrap().available - 12.0).abs() < 0.01);
}

#[test]
fn test_heir_moves_into_orphaned_shelter() {
    let config = config();
    let mut world = empty_world(30.0);
    let hut = world
        .env
        .shelters
        .add_plot(ShelterKind::Hut, Vec3::ground(8.0, 0.5), 1.2);
    let builder = world.spawn_agent(look("Ada"), Vec3::ground(-5.5, 0.5), 3.0);
    world
        .env
        .shelters
        .assign_owner(hut, builder, "#111111", |_| true)
        .unwrap();
    world
        .env
        .shelters
        .advance_construction(hut, builder, 100.0)
        .unwrap();
    world.env.on_shelter_built(hut);
    world.agent_mut(builder).unwrap().shelter = Some(hut);
    let heir = world.spawn_agent(look("Bo"), Vec3::ground(0.5, 0.5), 3.0);

    world.remove_agent(builder);
    assert_eq!(world.env.shelters.get(hut).unwrap().owner, None);

    let report = run_simulation_tick(&mut world, &config, 0.1);
    assert_eq!(report.shelters_claimed, vec![hut]);
    let agent = world.agent(heir).unwrap();
    assert_eq!(agent.shelter, Some(hut));
    assert_eq!(agent.goal, Some(Goal::Rest { shelter: Some(hut) }));
    assert_eq!(world.env.shelters.get(hut).unwrap().owner, Some(heir));

    for _ in 0..100 {
        run_simulation_tick(&mut world, &config, 0.1);
    }
    assert_eq!(world.env.shelters.get(hut).unwrap().owner, Some(heir));
    assert_eq!(world.env.shelters.built_count(), 1);
}

#[test]
fn test_tick_report_counts_lost_claims_and_couplings() {
    let config = config();
    let mut world = empty_world(30.0);
    let plot = world
        .env
        .shelters
        .add_plot(ShelterKind::Hut, Vec3::ground(5.0, 5.0), 1.2);
    let builder = world.spawn_agent(look("Ada"), Vec3::ground(3.5, 3.5), 3.0);
    world
        .env
        .shelters
        .assign_owner(plot, builder, "#111111", |_| true)
        .unwrap();
    {
        let agent = world.agent_mut(builder).unwrap();
        agent.shelter = Some(plot);
        agent.inventory.add(ResourceKind::Wood, 2, 10);
        agent.inventory.add(ResourceKind::Stone, 2, 10);
        agent.goal = Some(Goal::Build { shelter: plot });
        agent.state = BotState::Building;
        agent.action_timer = 0.0;
    }
    // Someone else took the plot over while the builder was away
    let squatter = bot_habitat::core::types::AgentId::new();
    world
        .env
        .shelters
        .assign_owner(plot, squatter, "#222222", |_| false)
        .unwrap();

    let a = world.spawn_agent(look("Cato"), Vec3::ground(-5.5, 0.5), 3.0);
    let b = world.spawn_agent(look("Dara"), Vec3::ground(-5.5, 1.0), 3.0);
    for (me, other) in [(a, b), (b, a)] {
        let agent = world.agent_mut(me).unwrap();
        agent.partner = Some(other);
        agent.goal = Some(Goal::Couple { partner: other });
        agent.state = BotState::Coupling;
        agent.action_timer = 0.05;
    }

    let report = run_simulation_tick(&mut world, &config, 0.1);
    assert_eq!(report.claims_rejected, 1);
    assert_eq!(world.agent(builder).unwrap().shelter, None);
    assert_eq!(report.couplings, 2);
    assert_eq!(report.births.len(), 1);
}

#[test]
fn test_second_claim_on_same_plot_is_rejected() {
    let mut world = empty_world(30.0);
    let plot = world
        .env
        .shelters
        .add_plot(ShelterKind::Hut, Vec3::ground(5.0, 5.0), 1.2);
    let a = world.spawn_agent(look("Ada"), Vec3::ground(0.5, 0.5), 3.0);
    let b = world.spawn_agent(look("Bo"), Vec3::ground(1.5, 0.5), 3.0);

    let live = |_| true;
    assert!(world.env.shelters.assign_owner(plot, a, "#111111", live).is_ok());
    let second = world.env.shelters.assign_owner(plot, b, "#222222", live);
    assert!(matches!(second, Err(ShelterError::AlreadyOwned { owner, .. }) if owner == a));
    assert_eq!(world.env.shelters.get(plot).unwrap().owner, Some(a));
}

#[test]
fn test_contending_bots_claim_different_plots() {
    let config = config();
    let mut world = empty_world(30.0);
    let near = world
        .env
        .shelters
        .add_plot(ShelterKind::Hut, Vec3::ground(4.0, 0.5), 1.2);
    let far = world
        .env
        .shelters
        .add_plot(ShelterKind::Hut, Vec3::ground(-12.0, 0.5), 1.2);
    let a = world.spawn_agent(look("Ada"), Vec3::ground(0.5, 1.5), 3.0);
    let b = world.spawn_agent(look("Bo"), Vec3::ground(0.5, -0.5), 3.0);

    run_simulation_tick(&mut world, &config, 0.1);

    let owner_a = world.agent(a).unwrap().shelter;
    let owner_b = world.agent(b).unwrap().shelter;
    assert_eq!(owner_a, Some(near));
    assert_eq!(owner_b, Some(far));
    assert_eq!(world.env.shelters.get(near).unwrap().owner, Some(a));
    assert_eq!(world.env.shelters.get(far).unwrap().owner, Some(b));
}

#[test]
fn test_reset_restores_initial_spawn() {
    let mut config = EngineConfig::default();
    config.world.agent_count = 5;
    let mut sim = Simulation::new(config);
    let initial = sim.snapshot();
    assert_eq!(initial.bots.len(), 5);

    for _ in 0..500 {
        sim.tick();
    }
    // Disturb the world beyond what ticking alone does
    let first_spot = sim.world().env.resources.spots()[0].id;
    sim.world_mut().env.resources.harvest(first_spot, 1_000.0);
    let last = *sim.world().agent_ids().last().unwrap();
    sim.world_mut().remove_agent(last);
    assert_eq!(sim.world().agent_count(), 4);

    let ack = sim.reset();
    assert_eq!(ack.agents, 5);
    assert_eq!(ack.spots, spot_count(&initial));

    let fresh = sim.snapshot();
    assert_eq!(fresh.generation, 1);
    assert_eq!(fresh.tick, 0);
    assert_eq!(fresh.water_spots, initial.water_spots);
    assert_eq!(fresh.corn_spots, initial.corn_spots);
    assert_eq!(fresh.wood_spots, initial.wood_spots);
    assert_eq!(fresh.stone_spots, initial.stone_spots);
    assert_eq!(fresh.shelters, initial.shelters);
    let positions = |s: &WorldSnapshot| -> Vec<Vec3> {
        s.bots.iter().map(|b| b.position).collect()
    };
    assert_eq!(positions(&fresh), positions(&initial));
}

#[test]
fn test_goal_enclosed_by_shelters_falls_back_within_one_tick() {
    let config = config();
    let mut world = empty_world(30.0);
    let goal = Vec3::ground(10.5, 0.5);
    let goal_cell = world.env.nav.to_cell(goal);

    // Ring of tiny built shelters around the goal cell
    for dx in -1..=1 {
        for dz in -1..=1 {
            if dx == 0 && dz == 0 {
                continue;
            }
            let center = world
                .env
                .nav
                .to_world(Cell::new(goal_cell.ix + dx, goal_cell.iz + dz));
            let id = world.env.shelters.add_plot(ShelterKind::Hut, center, 0.1);
            let owner = bot_habitat::core::types::AgentId::new();
            world
                .env
                .shelters
                .assign_owner(id, owner, "#000000", |_| true)
                .unwrap();
            world
                .env
                .shelters
                .advance_construction(id, owner, 100.0)
                .unwrap();
            world.env.on_shelter_built(id);
        }
    }
    assert!(world.env.nav.is_walkable(goal_cell));

    assert!(find_path(&world.env.nav, Vec3::ground(0.5, 0.5), goal, 20_000).is_err());

    world.env.resources.add(ResourceKind::Water, goal, 0.5, 10.0, 0.0);
    let id = world.spawn_agent(look("Wren"), Vec3::ground(0.5, 0.5), 3.0);
    world
        .agent_mut(id)
        .unwrap()
        .needs
        .set(NeedKind::Water, 10.0, &config.needs);

    let report = run_simulation_tick(&mut world, &config, 0.1);

    assert_eq!(report.path_failures, 1);
    let agent = world.agent(id).unwrap();
    assert_eq!(agent.state, BotState::Idle);
    assert!(agent.goal.is_none());
    assert!(agent.retry_cooldown > 0.0);
    assert!(agent.path.is_empty());
}

#[test]
fn test_long_run_keeps_world_consistent() {
    let mut config = EngineConfig::default();
    config.world.agent_count = 8;
    let mut sim = Simulation::new(config);

    for _ in 0..5_000 {
        let report = sim.tick();
        let world = sim.world();
        assert_eq!(report.tick, world.current_tick);
        for agent in &world.agents {
            for kind in NeedKind::ALL {
                let v = agent.needs.get(kind);
                assert!((0.0..=100.0).contains(&v), "{:?} = {}", kind, v);
            }
            if let Some(partner) = agent.partner {
                assert!(world.is_live(partner));
            }
        }
        for spot in world.env.resources.spots() {
            assert!(spot.available >= 0.0 && spot.available <= spot.max_available);
        }
        for shelter in world.env.shelters.iter() {
            assert!(shelter.progress <= 100.0);
            assert_eq!(shelter.built, shelter.progress >= 100.0);
        }
        assert!(world.agent_count() <= sim.config().world.max_agents);
    }
}
