//! Per-bot decision state machine
//!
//! Each tick a bot either follows its current goal (walking a path, running
//! a timed action, resting) or picks a new one. An urgent need overrides
//! whatever the bot was doing. The controller only ever mutates its own bot;
//! contested world state (spots, plots) is arbitrated by the resource field
//! and the shelter registry.

use ahash::AHashMap;
use rand::Rng;
use tracing::debug;

use crate::core::config::EngineConfig;
use crate::core::types::{AgentId, ShelterId, Tick, Vec3};
use crate::entity::agent::{Agent, BotState, Goal};
use crate::entity::needs::{NeedKind, NeedLevel};
use crate::nav::pathfinding::{find_path, PathError};
use crate::world::resources::ResourceKind;
use crate::world::shelter::{ContributionResult, ShelterError};
use crate::world::spawn::ENTRANCE_CLEARANCE;
use crate::world::Environment;

/// Positions of every live bot at the start of the tick
#[derive(Debug, Clone, Default)]
pub struct Peers {
    positions: AHashMap<AgentId, Vec3>,
}

impl Peers {
    pub fn capture(agents: &[Agent]) -> Self {
        Self {
            positions: agents.iter().map(|a| (a.id, a.position)).collect(),
        }
    }

    pub fn is_live(&self, id: AgentId) -> bool {
        self.positions.contains_key(&id)
    }

    pub fn position_of(&self, id: AgentId) -> Option<Vec3> {
        self.positions.get(&id).copied()
    }
}

/// Something the world has to react to after a controller step
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    Harvested {
        kind: ResourceKind,
        amount: f32,
        first: bool,
    },
    ShelterClaimed(ShelterId),
    ClaimRejected(ShelterId),
    ShelterBuilt(ShelterId),
    PathFailed(PathError),
    CouplingFinished,
}

/// Shared inputs of one controller step
pub struct StepContext<'a> {
    pub env: &'a mut Environment,
    pub peers: &'a Peers,
    pub config: &'a EngineConfig,
    pub tick: Tick,
    pub dt: f32,
}

/// Advance one bot by one tick
pub fn step<R: Rng>(agent: &mut Agent, ctx: &mut StepContext<'_>, rng: &mut R) -> Vec<ControllerEvent> {
    let mut events = Vec::new();
    let dt = ctx.dt;

    agent.retry_cooldown = (agent.retry_cooldown - dt).max(0.0);
    agent.speak_cooldown = (agent.speak_cooldown - dt).max(0.0);

    if let Some(partner) = agent.partner {
        if !ctx.peers.is_live(partner) {
            agent.partner = None;
        }
    }

    // Lazy invalidation: a path computed on an older grid is dropped here
    // and requested again below
    if !agent.path.is_empty() && agent.path_version != ctx.env.nav.version() {
        debug!(agent = %agent.id, "path stale after grid change");
        agent.clear_path();
        if agent.state.is_travelling() {
            if let Some(goal) = agent.goal {
                pursue(agent, goal, ctx, &mut events);
            }
        }
    }

    override_for_urgent_need(agent, ctx, &mut events);

    match agent.state {
        BotState::Idle => choose_goal(agent, ctx, rng, &mut events),
        BotState::Wandering | BotState::SeekingResource(_) | BotState::Moving => {
            if follow_path(agent, dt) {
                arrive(agent, ctx, &mut events);
            }
        }
        BotState::Gathering | BotState::Speaking | BotState::Coupling => {
            agent.action_timer -= dt;
            if agent.action_timer <= 0.0 {
                finish_action(agent, ctx, &mut events);
            }
        }
        BotState::Building => build_tick(agent, ctx, &mut events),
        BotState::Resting => rest_tick(agent, ctx),
    }

    events
}

/// Whether `goal` replenishes `need`
fn addresses(goal: &Goal, need: NeedKind) -> bool {
    match goal {
        Goal::Rest { .. } => matches!(
            need,
            NeedKind::Sleep | NeedKind::Clothing | NeedKind::Homeostasis
        ),
        Goal::Build { .. } => need == NeedKind::Clothing,
        other => other.serves() == Some(need),
    }
}

fn override_for_urgent_need(agent: &mut Agent, ctx: &mut StepContext<'_>, events: &mut Vec<ControllerEvent>) {
    let Some(need) = agent.needs.urgent_need(&ctx.config.needs) else {
        return;
    };
    if agent.goal.as_ref().map_or(false, |g| addresses(g, need)) {
        return;
    }
    // Resting already covers sleep/warmth/health even without a goal
    if agent.state == BotState::Resting && addresses(&Goal::Rest { shelter: None }, need) {
        return;
    }
    if agent.retry_cooldown > 0.0 {
        return;
    }
    if consume_from_inventory(agent, need, ctx.config) {
        return;
    }
    if let Some(goal) = goal_for_need(agent, need, ctx) {
        debug!(agent = %agent.id, ?need, ?goal, "urgent need overrides goal");
        set_goal(agent, goal, ctx, events);
    }
}

/// Eat or drink from carried supplies
fn consume_from_inventory(agent: &mut Agent, need: NeedKind, config: &EngineConfig) -> bool {
    let (kind, per_unit) = match need {
        NeedKind::Water => (ResourceKind::Water, config.needs.water_per_unit),
        NeedKind::Food => (ResourceKind::Food, config.needs.food_per_unit),
        _ => return false,
    };
    if !agent.inventory.take(kind, 1) {
        return false;
    }
    agent.needs.replenish(need, per_unit, &config.needs);
    true
}

/// Pick the goal that replenishes `need`, if the world offers one
fn goal_for_need(agent: &mut Agent, need: NeedKind, ctx: &mut StepContext<'_>) -> Option<Goal> {
    let radius = ctx.config.agents.search_radius;
    match need {
        NeedKind::Water | NeedKind::Food => {
            let kind = if need == NeedKind::Water {
                ResourceKind::Water
            } else {
                ResourceKind::Food
            };
            let spot = ctx.env.resources.nearest(kind, agent.position, radius)?;
            Some(Goal::Harvest {
                spot,
                kind,
                need: Some(need),
            })
        }
        NeedKind::Sleep | NeedKind::Homeostasis => Some(Goal::Rest {
            shelter: built_home(agent, ctx.env),
        }),
        NeedKind::Clothing => match built_home(agent, ctx.env) {
            Some(home) => Some(Goal::Rest { shelter: Some(home) }),
            // No roof yet: building one is the only way to get warm
            None => building_goal(agent, ctx).or(Some(Goal::Rest { shelter: None })),
        },
        NeedKind::Air => agent.sheltered_in.map(|_| Goal::Breathe),
        NeedKind::Reproduction => agent.partner.map(|partner| Goal::Couple { partner }),
    }
}

fn built_home(agent: &Agent, env: &Environment) -> Option<ShelterId> {
    let id = agent.shelter?;
    env.shelters
        .get(id)
        .filter(|s| s.built && s.owner == Some(agent.id))
        .map(|s| s.id)
}

/// Homeless bots move into a vacant built shelter when there is one.
/// Otherwise claim a plot if needed, then either fetch materials or go build.
fn building_goal(agent: &mut Agent, ctx: &mut StepContext<'_>) -> Option<Goal> {
    let owned = agent.shelter.filter(|id| {
        ctx.env
            .shelters
            .get(*id)
            .map_or(false, |s| s.owner == Some(agent.id))
    });
    let plot = match owned {
        Some(plot) => plot,
        None => {
            let peers = ctx.peers;
            let is_live = |id: AgentId| peers.is_live(id);
            if let Some(home) = claim_shelter(agent, ctx.env, true, is_live) {
                return Some(Goal::Rest { shelter: Some(home) });
            }
            claim_shelter(agent, ctx.env, false, is_live)?
        }
    };

    if ctx.env.shelters.get(plot).map_or(true, |s| s.built) {
        return None;
    }

    let cfg = &ctx.config.agents;
    let missing = if agent.inventory.wood < cfg.wood_per_increment {
        Some(ResourceKind::Wood)
    } else if agent.inventory.stone < cfg.stone_per_increment {
        Some(ResourceKind::Stone)
    } else {
        None
    };

    match missing {
        Some(kind) => {
            let spot = ctx.env.resources.nearest(kind, agent.position, cfg.search_radius)?;
            Some(Goal::Harvest {
                spot,
                kind,
                need: None,
            })
        }
        None => Some(Goal::Build { shelter: plot }),
    }
}

/// Claim the nearest free shelter (`built`) or plot, moving on to the next
/// one when a live bot got there first
fn claim_shelter(
    agent: &mut Agent,
    env: &mut Environment,
    built: bool,
    is_live: impl Fn(AgentId) -> bool,
) -> Option<ShelterId> {
    let mut rejected = Vec::new();
    loop {
        let candidate = env
            .shelters
            .nearest_free(agent.position, built, &rejected, &is_live)?;
        match env
            .shelters
            .assign_owner(candidate, agent.id, &agent.appearance.color, &is_live)
        {
            Ok(()) => {
                agent.shelter = Some(candidate);
                debug!(agent = %agent.id, shelter = ?candidate, built, "shelter claimed");
                return Some(candidate);
            }
            Err(ShelterError::AlreadyOwned { .. }) => {
                debug!(agent = %agent.id, shelter = ?candidate, "plot already taken");
                rejected.push(candidate);
            }
            Err(_) => return None,
        }
    }
}

/// Idle decision: pressing needs first, then building, then maybe a stroll
fn choose_goal<R: Rng>(
    agent: &mut Agent,
    ctx: &mut StepContext<'_>,
    rng: &mut R,
    events: &mut Vec<ControllerEvent>,
) {
    if agent.retry_cooldown <= 0.0 {
        let mut pressing: Vec<NeedKind> = NeedKind::ALL
            .iter()
            .copied()
            .filter(|k| agent.needs.level(*k, &ctx.config.needs) >= NeedLevel::Seeking)
            .collect();
        // Stable sort keeps priority order among equal values
        pressing.sort_by(|a, b| agent.needs.get(*a).total_cmp(&agent.needs.get(*b)));

        for need in pressing {
            if consume_from_inventory(agent, need, ctx.config) {
                return;
            }
            if let Some(goal) = goal_for_need(agent, need, ctx) {
                set_goal(agent, goal, ctx, events);
                return;
            }
        }

        if agent.needs.survival_settled(&ctx.config.needs) && built_home(agent, ctx.env).is_none() {
            let had_plot = agent.shelter;
            if let Some(goal) = building_goal(agent, ctx) {
                if had_plot.is_none() {
                    if let Some(plot) = agent.shelter {
                        events.push(ControllerEvent::ShelterClaimed(plot));
                    }
                }
                set_goal(agent, goal, ctx, events);
                return;
            }
        }
    }

    if rng.gen::<f32>() < ctx.config.agents.idle_wander_chance {
        if let Some(dest) = wander_target(agent, ctx.env, ctx.config.agents.wander_radius, rng) {
            agent.goal = Some(Goal::Wander);
            travel_to(agent, dest, BotState::Wandering, ctx, events);
        }
    }
}

fn wander_target<R: Rng>(agent: &Agent, env: &Environment, radius: f32, rng: &mut R) -> Option<Vec3> {
    let angle = rng.gen_range(0.0..std::f32::consts::TAU);
    let distance = rng.gen_range(0.0..radius.max(0.1));
    let raw = agent.position + Vec3::ground(angle.cos() * distance, angle.sin() * distance);
    let cell = env.nav.nearest_walkable(raw, 4)?;
    Some(env.nav.to_world(cell))
}

/// Switch to `goal` and start working toward it
fn set_goal(agent: &mut Agent, goal: Goal, ctx: &mut StepContext<'_>, events: &mut Vec<ControllerEvent>) {
    let stays_inside = matches!(goal, Goal::Rest { shelter: Some(id) } if agent.sheltered_in == Some(id));
    if !stays_inside {
        leave_shelter(agent, ctx.env);
    }
    agent.clear_path();
    agent.goal = Some(goal);
    pursue(agent, goal, ctx, events);
}

/// Request the path (or start the action) for the current goal
fn pursue(agent: &mut Agent, goal: Goal, ctx: &mut StepContext<'_>, events: &mut Vec<ControllerEvent>) {
    match goal {
        Goal::Harvest { spot, kind, .. } => match ctx.env.resources.get(spot) {
            Some(s) => {
                let dest = s.position;
                travel_to(agent, dest, BotState::SeekingResource(kind), ctx, events);
            }
            None => agent.abandon_goal(),
        },
        Goal::Rest { shelter: None } => {
            agent.clear_path();
            agent.state = BotState::Resting;
        }
        Goal::Rest { shelter: Some(id) } | Goal::Build { shelter: id } => {
            if agent.sheltered_in == Some(id) {
                agent.state = BotState::Resting;
                return;
            }
            match ctx.env.shelters.get(id) {
                Some(s) => {
                    let dest = s.entrance(ENTRANCE_CLEARANCE);
                    travel_to(agent, dest, BotState::Moving, ctx, events);
                }
                None => agent.abandon_goal(),
            }
        }
        Goal::Breathe => {
            leave_shelter(agent, ctx.env);
            agent.abandon_goal();
        }
        Goal::Couple { partner } => match ctx.peers.position_of(partner) {
            Some(dest) if dest.ground_distance(&agent.position) <= coupling_range(ctx.config) => {
                start_coupling(agent, ctx.config);
            }
            Some(dest) => {
                travel_to(agent, dest, BotState::Moving, ctx, events);
            }
            None => {
                agent.partner = None;
                agent.abandon_goal();
            }
        },
        // A stroll is not worth a second search
        Goal::Wander => agent.abandon_goal(),
    }
}

/// Ask the pathfinder for a route; on failure fall back to idling for the
/// retry cooldown
fn travel_to(
    agent: &mut Agent,
    dest: Vec3,
    state: BotState,
    ctx: &mut StepContext<'_>,
    events: &mut Vec<ControllerEvent>,
) -> bool {
    let grid = &ctx.env.nav;
    match find_path(grid, agent.position, dest, ctx.config.nav.max_expansions) {
        Ok(mut path) => {
            // The first waypoint is the cell the bot is standing in
            if path.len() > 1 {
                path.remove(0);
            }
            if let Some(last) = path.last_mut() {
                *last = dest;
            }
            agent.set_path(path, grid.version());
            agent.state = state;
            true
        }
        Err(err) => {
            debug!(agent = %agent.id, error = %err, "no path, backing off");
            agent.abandon_goal();
            agent.retry_cooldown = ctx.config.agents.path_fail_cooldown_secs;
            events.push(ControllerEvent::PathFailed(err));
            false
        }
    }
}

/// Move along the path; returns true once the last waypoint is reached
fn follow_path(agent: &mut Agent, dt: f32) -> bool {
    let mut budget = agent.speed * dt;
    while budget > 0.0 {
        let Some(waypoint) = agent.current_waypoint() else {
            break;
        };
        let distance = agent.position.ground_distance(&waypoint);
        if distance <= budget {
            agent.position = waypoint;
            agent.path_cursor += 1;
            budget -= distance;
        } else {
            let dir = agent.position.ground_direction(&waypoint);
            agent.position = agent.position + dir * budget;
            budget = 0.0;
        }
    }
    agent.path_exhausted()
}

fn coupling_range(config: &EngineConfig) -> f32 {
    config.agents.approach_distance * 2.0
}

fn start_coupling(agent: &mut Agent, config: &EngineConfig) {
    agent.clear_path();
    agent.state = BotState::Coupling;
    agent.action_timer = config.agents.coupling_secs;
}

/// Path finished: start the action for the current goal
fn arrive(agent: &mut Agent, ctx: &mut StepContext<'_>, events: &mut Vec<ControllerEvent>) {
    agent.clear_path();
    let Some(goal) = agent.goal else {
        agent.state = BotState::Idle;
        return;
    };

    match goal {
        Goal::Harvest { .. } => {
            agent.state = BotState::Gathering;
            agent.action_timer = ctx.config.agents.gather_secs;
        }
        Goal::Rest { shelter } => {
            if let Some(id) = shelter {
                if ctx.env.shelters.set_occupancy(id, true).is_ok() {
                    agent.sheltered_in = Some(id);
                }
            }
            agent.state = BotState::Resting;
        }
        Goal::Build { .. } => {
            agent.state = BotState::Building;
            agent.action_timer = ctx.config.agents.build_interval_secs;
        }
        Goal::Couple { partner } => match ctx.peers.position_of(partner) {
            Some(pos) if pos.ground_distance(&agent.position) <= coupling_range(ctx.config) => {
                start_coupling(agent, ctx.config);
            }
            // Partner moved on; follow again
            Some(_) => pursue(agent, goal, ctx, events),
            None => {
                agent.partner = None;
                agent.abandon_goal();
            }
        },
        Goal::Breathe | Goal::Wander => agent.abandon_goal(),
    }
}

/// A timed action ran out
fn finish_action(agent: &mut Agent, ctx: &mut StepContext<'_>, events: &mut Vec<ControllerEvent>) {
    match (agent.state, agent.goal) {
        (BotState::Gathering, Some(Goal::Harvest { spot, kind, need })) => {
            let granted = ctx.env.resources.harvest(spot, ctx.config.agents.harvest_amount);
            if granted > 0.0 {
                let first = agent.counters.harvested == 0;
                match need {
                    Some(need) => {
                        let per_unit = match need {
                            NeedKind::Water => ctx.config.needs.water_per_unit,
                            _ => ctx.config.needs.food_per_unit,
                        };
                        // Eat until full, carry the rest
                        let deficit = ctx.config.needs.max_value - agent.needs.get(need);
                        let eaten = granted.min((deficit / per_unit).ceil().max(0.0));
                        agent.needs.replenish(need, eaten * per_unit, &ctx.config.needs);
                        let surplus = (granted - eaten).round() as u32;
                        if surplus > 0 {
                            agent.inventory.add(kind, surplus, ctx.config.agents.inventory_cap);
                        }
                    }
                    None => {
                        agent.inventory.add(
                            kind,
                            granted.round() as u32,
                            ctx.config.agents.inventory_cap,
                        );
                    }
                }
                agent.counters.harvested += granted.round().max(1.0) as u32;
                debug!(agent = %agent.id, ?kind, granted, "harvested");
                events.push(ControllerEvent::Harvested {
                    kind,
                    amount: granted,
                    first,
                });
            } else {
                debug!(agent = %agent.id, spot = ?spot, "spot empty on arrival");
            }
            agent.abandon_goal();
        }
        (BotState::Coupling, _) => {
            agent.coupling_complete = true;
            let max = ctx.config.needs.max_value;
            agent.needs.set(NeedKind::Reproduction, max, &ctx.config.needs);
            agent.abandon_goal();
            events.push(ControllerEvent::CouplingFinished);
        }
        _ => agent.abandon_goal(),
    }
}

fn build_tick(agent: &mut Agent, ctx: &mut StepContext<'_>, events: &mut Vec<ControllerEvent>) {
    agent.action_timer -= ctx.dt;
    if agent.action_timer > 0.0 {
        return;
    }
    let Some(Goal::Build { shelter }) = agent.goal else {
        agent.abandon_goal();
        return;
    };

    let cfg = &ctx.config.agents;
    if agent.inventory.wood < cfg.wood_per_increment || agent.inventory.stone < cfg.stone_per_increment {
        // Out of materials; the next idle decision fetches more
        agent.abandon_goal();
        return;
    }

    match ctx.env.shelters.advance_construction(shelter, agent.id, cfg.build_increment) {
        Ok(ContributionResult::InProgress { progress }) => {
            agent.inventory.take(ResourceKind::Wood, cfg.wood_per_increment);
            agent.inventory.take(ResourceKind::Stone, cfg.stone_per_increment);
            agent.action_timer = cfg.build_interval_secs;
            debug!(agent = %agent.id, shelter = ?shelter, progress, "construction advanced");
        }
        Ok(ContributionResult::Completed) => {
            agent.inventory.take(ResourceKind::Wood, cfg.wood_per_increment);
            agent.inventory.take(ResourceKind::Stone, cfg.stone_per_increment);
            agent.counters.shelters_built += 1;
            ctx.env.on_shelter_built(shelter);
            events.push(ControllerEvent::ShelterBuilt(shelter));
            agent.abandon_goal();
        }
        Ok(ContributionResult::AlreadyComplete) => agent.abandon_goal(),
        Err(err) => {
            debug!(agent = %agent.id, error = %err, "construction rejected");
            if matches!(err, ShelterError::NotOwner(_) | ShelterError::NoOwner(_)) {
                agent.shelter = None;
                events.push(ControllerEvent::ClaimRejected(shelter));
            }
            agent.abandon_goal();
        }
    }
}

fn rest_tick(agent: &mut Agent, ctx: &mut StepContext<'_>) {
    let needs_cfg = &ctx.config.needs;
    let dt = ctx.dt;
    if agent.sheltered_in.is_some() {
        agent.needs.replenish(NeedKind::Sleep, needs_cfg.sleep_rate_sheltered * dt, needs_cfg);
        agent.needs.replenish(NeedKind::Clothing, needs_cfg.warmth_rate_sheltered * dt, needs_cfg);
        agent.needs.replenish(
            NeedKind::Homeostasis,
            needs_cfg.homeostasis_recovery_rate * dt,
            needs_cfg,
        );
    } else {
        agent.needs.replenish(NeedKind::Sleep, needs_cfg.sleep_rate_outdoors * dt, needs_cfg);
    }

    let rested = agent.needs.sleep >= ctx.config.agents.rest_until;
    let warm = agent.sheltered_in.is_none()
        || agent.needs.level(NeedKind::Clothing, needs_cfg) == NeedLevel::Normal;
    if rested && warm {
        leave_shelter(agent, ctx.env);
        agent.abandon_goal();
    }
}

fn leave_shelter(agent: &mut Agent, env: &mut Environment) {
    if let Some(id) = agent.sheltered_in.take() {
        let _ = env.shelters.set_occupancy(id, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sundial::Sundial;
    use crate::entity::agent::{Appearance, BodyShape};
    use crate::nav::grid::NavGrid;
    use crate::world::resources::ResourceField;
    use crate::world::shelter::{ShelterKind, ShelterRegistry};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn env() -> Environment {
        Environment {
            ground_radius: 30.0,
            sundial: Sundial::new(240.0),
            resources: ResourceField::new(),
            shelters: ShelterRegistry::new(),
            nav: NavGrid::new(30.0, 1.0),
        }
    }

    fn bot(pos: Vec3) -> Agent {
        let look = Appearance {
            name: "Orla".into(),
            color: "#48cae4".into(),
            shape: BodyShape::Sphere,
            width: 0.9,
            height: 0.9,
        };
        Agent::new(AgentId::new(), look, pos, 3.0, 0)
    }

    fn quiet_config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.agents.idle_wander_chance = 0.0;
        config
    }

    fn run(agent: &mut Agent, env: &mut Environment, config: &EngineConfig, ticks: usize) -> Vec<ControllerEvent> {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut all = Vec::new();
        for tick in 0..ticks {
            let peers = Peers::capture(std::slice::from_ref(agent));
            let mut ctx = StepContext {
                env: &mut *env,
                peers: &peers,
                config,
                tick: tick as Tick,
                dt: 0.1,
            };
            all.extend(step(agent, &mut ctx, &mut rng));
        }
        all
    }

    #[test]
    fn test_urgent_hunger_walks_to_food_and_eats() {
        let config = quiet_config();
        let mut env = env();
        let spot = env.resources.add(ResourceKind::Food, Vec3::ground(6.5, 0.5), 1.5, 10.0, 0.0);
        let mut agent = bot(Vec3::ground(0.5, 0.5));
        agent.needs.set(NeedKind::Food, 15.0, &config.needs);

        run(&mut agent, &mut env, &config, 1);
        assert_eq!(agent.state, BotState::SeekingResource(ResourceKind::Food));

        let events = run(&mut agent, &mut env, &config, 60);
        assert!(events.iter().any(|e| matches!(e, ControllerEvent::Harvested { first: true, .. })));
        assert!((env.resources.get(spot).unwrap().available - 7.0).abs() < 0.01);
        assert!(!agent.needs.level(NeedKind::Food, &config.needs).is_urgent());
    }

    #[test]
    fn test_unreachable_goal_falls_back() {
        let config = quiet_config();
        let mut env = env();
        let goal_cell = env.nav.to_cell(Vec3::ground(10.5, 0.5));
        for dx in -1..=1 {
            for dz in -1..=1 {
                if dx != 0 || dz != 0 {
                    let c = crate::core::types::Cell::new(goal_cell.ix + dx, goal_cell.iz + dz);
                    let pos = env.nav.to_world(c);
                    env.nav.block_footprint(pos, 0.1);
                }
            }
        }
        env.resources.add(ResourceKind::Water, Vec3::ground(10.5, 0.5), 0.5, 10.0, 0.0);
        let mut agent = bot(Vec3::ground(0.5, 0.5));
        agent.needs.set(NeedKind::Water, 10.0, &config.needs);

        let events = run(&mut agent, &mut env, &config, 1);
        assert!(events.iter().any(|e| matches!(e, ControllerEvent::PathFailed(_))));
        assert_eq!(agent.state, BotState::Idle);
        assert!(agent.goal.is_none());
        assert!(agent.retry_cooldown > 0.0);

        // No retry every tick while the cooldown runs
        let events = run(&mut agent, &mut env, &config, 5);
        assert!(events.is_empty());
    }

    #[test]
    fn test_stale_path_is_recomputed() {
        let config = quiet_config();
        let mut env = env();
        env.resources.add(ResourceKind::Food, Vec3::ground(12.5, 0.5), 1.5, 10.0, 0.0);
        let mut agent = bot(Vec3::ground(0.5, 0.5));
        agent.needs.set(NeedKind::Food, 15.0, &config.needs);
        run(&mut agent, &mut env, &config, 1);
        let old_version = agent.path_version;

        env.nav.block_footprint(Vec3::ground(6.5, 0.5), 1.5);
        run(&mut agent, &mut env, &config, 1);
        assert!(agent.path_version > old_version);
        assert_eq!(agent.path_version, env.nav.version());
        for waypoint in &agent.path {
            assert!(env.nav.is_walkable(env.nav.to_cell(*waypoint)));
        }
    }

    #[test]
    fn test_builds_shelter_with_materials() {
        let mut config = quiet_config();
        config.agents.build_increment = 50.0;
        let mut env = env();
        let plot = env.shelters.add_plot(ShelterKind::Hut, Vec3::ground(5.5, 5.5), 1.2);
        let mut agent = bot(Vec3::ground(0.5, 0.5));
        agent.inventory.add(ResourceKind::Wood, 4, 10);
        agent.inventory.add(ResourceKind::Stone, 4, 10);

        let events = run(&mut agent, &mut env, &config, 200);
        assert!(events.contains(&ControllerEvent::ShelterClaimed(plot)));
        assert!(events.contains(&ControllerEvent::ShelterBuilt(plot)));
        let shelter = env.shelters.get(plot).unwrap();
        assert!(shelter.built);
        assert_eq!(shelter.owner, Some(agent.id));
        assert_eq!(agent.counters.shelters_built, 1);
        assert_eq!(agent.inventory.wood, 2);
        assert!(!env.nav.is_walkable(env.nav.to_cell(shelter.position)));
    }

    #[test]
    fn test_builder_fetches_missing_materials() {
        let config = quiet_config();
        let mut env = env();
        env.shelters.add_plot(ShelterKind::Hut, Vec3::ground(5.5, 5.5), 1.2);
        let wood = env.resources.add(ResourceKind::Wood, Vec3::ground(-4.5, 0.5), 1.5, 15.0, 0.0);
        let mut agent = bot(Vec3::ground(0.5, 0.5));

        run(&mut agent, &mut env, &config, 1);
        assert_eq!(
            agent.goal,
            Some(Goal::Harvest { spot: wood, kind: ResourceKind::Wood, need: None })
        );
    }

    #[test]
    fn test_rejected_claim_moves_on_to_next_plot() {
        let mut env = env();
        let near = env.shelters.add_plot(ShelterKind::Hut, Vec3::ground(3.5, 0.5), 1.2);
        let far = env.shelters.add_plot(ShelterKind::Hut, Vec3::ground(-9.5, 0.5), 1.2);
        let rival = AgentId::new();
        env.shelters.assign_owner(near, rival, "#000", |_| true).unwrap();
        let mut agent = bot(Vec3::ground(0.5, 0.5));

        // The rival looks gone during the search but is live by the time
        // the claim lands
        let checks = std::cell::Cell::new(0);
        let is_live = |id: AgentId| {
            if id != rival {
                return true;
            }
            checks.set(checks.get() + 1);
            checks.get() > 1
        };

        assert_eq!(claim_shelter(&mut agent, &mut env, false, is_live), Some(far));
        assert_eq!(agent.shelter, Some(far));
        assert_eq!(env.shelters.get(near).unwrap().owner, Some(rival));
        assert_eq!(env.shelters.get(far).unwrap().owner, Some(agent.id));
    }

    #[test]
    fn test_rest_in_shelter_restores_sleep() {
        let config = quiet_config();
        let mut env = env();
        let mut agent = bot(Vec3::ground(0.5, 0.5));
        let plot = env.shelters.add_plot(ShelterKind::Hut, Vec3::ground(5.5, 5.5), 1.2);
        env.shelters.assign_owner(plot, agent.id, "#fff", |_| true).unwrap();
        env.shelters.advance_construction(plot, agent.id, 100.0).unwrap();
        env.on_shelter_built(plot);
        agent.shelter = Some(plot);
        agent.needs.set(NeedKind::Sleep, 10.0, &config.needs);

        run(&mut agent, &mut env, &config, 40);
        assert_eq!(agent.state, BotState::Resting);
        assert_eq!(agent.sheltered_in, Some(plot));
        assert!(env.shelters.get(plot).unwrap().occupied);

        run(&mut agent, &mut env, &config, 400);
        assert!(agent.needs.sleep > 75.0);
        assert_eq!(agent.state, BotState::Idle);
        assert_eq!(agent.sheltered_in, None);
        assert!(!env.shelters.get(plot).unwrap().occupied);
    }

    #[test]
    fn test_drinks_from_inventory_first() {
        let config = quiet_config();
        let mut env = env();
        let mut agent = bot(Vec3::ground(0.5, 0.5));
        agent.inventory.add(ResourceKind::Water, 2, 10);
        agent.needs.set(NeedKind::Water, 10.0, &config.needs);

        // Critical override drinks one, the idle decision drinks the next
        run(&mut agent, &mut env, &config, 1);
        assert_eq!(agent.inventory.water, 0);
        assert!((agent.needs.water - 34.0).abs() < 0.01);
        assert!(agent.goal.is_none());
    }
}
