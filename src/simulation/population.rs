//! Population changes: pairing, births and expiry
//!
//! These run at world level after every controller has stepped, because
//! they touch more than one bot at a time.

use tracing::info;

use crate::core::config::EngineConfig;
use crate::core::types::AgentId;
use crate::entity::identity::inherit_appearance;
use crate::entity::needs::{NeedKind, NeedLevel, Needs};
use crate::simulation::social::{milestone, Milestone};
use crate::world::World;

/// Pair bots that want a partner and have nothing more pressing, in
/// world order
pub fn pair_partners(world: &mut World, config: &EngineConfig) -> usize {
    if world.agent_count() >= config.world.max_agents {
        return 0;
    }

    let eligible: Vec<usize> = world
        .agents
        .iter()
        .enumerate()
        .filter(|(_, a)| {
            a.partner.is_none()
                && !a.coupling_complete
                && a.needs.level(NeedKind::Reproduction, &config.needs) >= NeedLevel::Seeking
                && a.needs.survival_settled(&config.needs)
        })
        .map(|(idx, _)| idx)
        .collect();

    let mut pairs = 0;
    for pair in eligible.chunks_exact(2) {
        let (a, b) = (pair[0], pair[1]);
        let (id_a, id_b) = (world.agents[a].id, world.agents[b].id);
        world.agents[a].partner = Some(id_b);
        world.agents[b].partner = Some(id_a);
        pairs += 1;
        info!(a = %id_a, b = %id_b, "bots paired");
    }
    pairs
}

/// Spawn a child for every pair whose coupling finished on both sides
pub fn resolve_births(world: &mut World, config: &EngineConfig) -> Vec<AgentId> {
    let mut ready: Vec<(AgentId, AgentId)> = Vec::new();
    for agent in &world.agents {
        let Some(partner) = agent.partner else {
            continue;
        };
        if !agent.coupling_complete || agent.id > partner {
            continue;
        }
        if world.agent(partner).map_or(false, |p| p.coupling_complete) {
            ready.push((agent.id, partner));
        }
    }

    let mut children = Vec::new();
    for (a, b) in ready {
        let (Some(pa), Some(pb)) = (world.agent(a), world.agent(b)) else {
            continue;
        };
        let look_a = pa.appearance.clone();
        let look_b = pb.appearance.clone();
        let midpoint = (pa.position + pb.position) * 0.5;

        let child = if world.agent_count() < config.world.max_agents {
            let appearance = inherit_appearance(&mut world.rng, &look_a, &look_b);
            let position = world
                .env
                .nav
                .nearest_walkable(midpoint, 4)
                .map(|c| world.env.nav.to_world(c))
                .unwrap_or(midpoint);
            let id = world.spawn_agent(appearance, position, config.agents.move_speed);
            if let Some(agent) = world.agent_mut(id) {
                agent.needs = Needs::full(config.needs.max_value);
                agent.chatter_timer = config.agents.chatter_interval_secs;
            }
            Some(id)
        } else {
            None
        };

        let tick = world.current_tick;
        for parent in [a, b] {
            let Some(agent) = world.agent_mut(parent) else {
                continue;
            };
            agent.partner = None;
            agent.coupling_complete = false;
            if child.is_some() {
                agent.counters.children += 1;
            }
        }

        if let Some(child_id) = child {
            let child_name = world
                .agent(child_id)
                .map(|c| c.name().to_string())
                .unwrap_or_default();
            info!(child = %child_id, name = %child_name, "bot born");
            if let Some(parent) = world.agent_mut(a) {
                let post = milestone(parent, Milestone::ChildBorn { child: child_name }, config, tick);
                world.outbox.push(post);
            }
            children.push(child_id);
        }
    }
    children
}

/// Remove bots whose health stayed at zero for the grace period
pub fn resolve_expiries(world: &mut World, config: &EngineConfig, dt: f32) -> Vec<AgentId> {
    let grace = config.agents.expiry_grace_secs;
    let mut expired = Vec::new();
    for agent in world.agents.iter_mut() {
        if agent.needs.homeostasis <= 0.0 {
            agent.zero_health_secs += dt;
            if agent.zero_health_secs >= grace {
                expired.push(agent.id);
            }
        } else {
            agent.zero_health_secs = 0.0;
        }
    }

    for id in &expired {
        if let Some(agent) = world.remove_agent(*id) {
            info!(agent = %id, name = %agent.name(), "bot expired");
        }
    }
    expired
}
