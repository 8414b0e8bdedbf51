//! Tick system - orchestrates one simulation step
//!
//! Fixed order per tick:
//! time -> need decay -> resource regrowth -> pairing -> controllers
//! (with social output) -> births/expiries -> resize.
//!
//! Everything here is synchronous and bounded; nothing awaits I/O.

use tracing::debug;

use crate::core::config::EngineConfig;
use crate::core::types::{AgentId, ShelterId, SpotId, Tick};
use crate::entity::needs::DecayContext;
use crate::simulation::controller::{self, ControllerEvent, Peers, StepContext};
use crate::simulation::population::{pair_partners, resolve_births, resolve_expiries};
use crate::simulation::social::{announce_needs, maybe_chatter, milestone, Milestone};
use crate::world::World;

/// What happened during one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub tick: Tick,
    pub births: Vec<AgentId>,
    pub expiries: Vec<AgentId>,
    pub shelters_claimed: Vec<ShelterId>,
    pub shelters_built: Vec<ShelterId>,
    /// Builders whose plot turned out to belong to someone else
    pub claims_rejected: usize,
    pub couplings: usize,
    pub removed_spots: Vec<SpotId>,
    pub path_failures: usize,
    pub resized: bool,
}

/// Run a single simulation tick advancing time by `dt` simulated seconds
pub fn run_simulation_tick(world: &mut World, config: &EngineConfig, dt: f32) -> TickReport {
    world.current_tick += 1;
    let tick = world.current_tick;
    let mut report = TickReport {
        tick,
        ..Default::default()
    };

    world.env.sundial.advance(dt);
    update_needs(world, config, dt);

    world.env.resources.regrow(dt);
    report.removed_spots = world.remove_depleted_spots();

    pair_partners(world, config);
    run_controllers(world, config, dt, &mut report);

    report.births = resolve_births(world, config);
    report.expiries = resolve_expiries(world, config, dt);
    if !report.births.is_empty() || !report.expiries.is_empty() {
        report.resized = world.resize_for_population(config);
    }

    if tick % 100 == 0 {
        debug!(
            tick,
            agents = world.agent_count(),
            shelters = world.env.shelters.built_count(),
            "tick"
        );
    }

    report
}

fn update_needs(world: &mut World, config: &EngineConfig, dt: f32) {
    let night = world.env.sundial.is_night();
    for agent in world.agents.iter_mut() {
        let ctx = DecayContext {
            sheltered: agent.sheltered_in.is_some(),
            night,
        };
        agent.needs.decay(dt, ctx, &config.needs);
    }
}

fn run_controllers(world: &mut World, config: &EngineConfig, dt: f32, report: &mut TickReport) {
    let tick = world.current_tick;
    let peers = Peers::capture(&world.agents);

    let agents = &mut world.agents;
    let rng = &mut world.rng;
    let outbox = &mut world.outbox;
    let mut ctx = StepContext {
        env: &mut world.env,
        peers: &peers,
        config,
        tick,
        dt,
    };

    for agent in agents.iter_mut() {
        for event in controller::step(agent, &mut ctx, rng) {
            match event {
                ControllerEvent::Harvested { kind, first: true, .. } => {
                    outbox.push(milestone(agent, Milestone::FirstHarvest { resource: kind }, config, tick));
                }
                ControllerEvent::ShelterBuilt(id) => {
                    report.shelters_built.push(id);
                    outbox.push(milestone(agent, Milestone::ShelterBuilt, config, tick));
                }
                ControllerEvent::ShelterClaimed(id) => report.shelters_claimed.push(id),
                ControllerEvent::ClaimRejected(id) => {
                    debug!(agent = %agent.id, shelter = ?id, "lost claim on plot");
                    report.claims_rejected += 1;
                }
                ControllerEvent::CouplingFinished => report.couplings += 1,
                ControllerEvent::PathFailed(_) => report.path_failures += 1,
                ControllerEvent::Harvested { .. } => {}
            }
        }

        if let Some(speech) = announce_needs(agent, config, tick) {
            outbox.push(speech);
        }
        if let Some(speech) = maybe_chatter(agent, ctx.env, config, rng, dt, tick) {
            outbox.push(speech);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::needs::NeedKind;
    use crate::world::spawn::generate_world;

    #[test]
    fn test_tick_advances_counter_and_time() {
        let config = EngineConfig::default();
        let mut world = generate_world(&config, 0);
        let before = world.env.sundial.elapsed_secs();
        let report = run_simulation_tick(&mut world, &config, 0.5);
        assert_eq!(report.tick, 1);
        assert_eq!(world.current_tick, 1);
        assert!((world.env.sundial.elapsed_secs() - before - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_needs_decay_over_ticks() {
        let config = EngineConfig::default();
        let mut world = generate_world(&config, 0);
        let water_before: Vec<f32> = world.agents.iter().map(|a| a.needs.water).collect();
        for _ in 0..10 {
            run_simulation_tick(&mut world, &config, 0.1);
        }
        for (agent, before) in world.agents.iter().zip(water_before) {
            assert!(agent.needs.get(NeedKind::Water) < before);
        }
    }

    #[test]
    fn test_depleted_wood_removed_during_tick() {
        let config = EngineConfig::default();
        let mut world = generate_world(&config, 0);
        let wood = world
            .env
            .resources
            .of_kind(crate::world::ResourceKind::Wood)
            .next()
            .map(|s| s.id)
            .unwrap();
        world.env.resources.harvest(wood, 1_000.0);
        let report = run_simulation_tick(&mut world, &config, 0.1);
        assert_eq!(report.removed_spots, vec![wood]);
        assert!(world.env.resources.get(wood).is_none());
    }

    #[test]
    fn test_long_run_keeps_invariants() {
        let config = EngineConfig::default();
        let mut world = generate_world(&config, 0);
        for _ in 0..3_000 {
            run_simulation_tick(&mut world, &config, 0.1);
            for spot in world.env.resources.spots() {
                assert!(spot.available >= 0.0 && spot.available <= spot.max_available);
            }
            for agent in &world.agents {
                for kind in NeedKind::ALL {
                    let v = agent.needs.get(kind);
                    assert!((0.0..=config.needs.max_value).contains(&v));
                }
            }
            for shelter in world.env.shelters.iter() {
                assert!(shelter.progress <= 100.0);
                assert_eq!(shelter.built, shelter.progress >= 100.0);
            }
        }
    }
}
