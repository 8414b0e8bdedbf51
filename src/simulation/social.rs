//! Social output: need announcements, milestones and periodic chatter
//!
//! Speeches are queued on the world outbox during the tick and handed to the
//! publish worker by the loop. Lifetime post counters only move once the
//! content service confirms a post.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::config::EngineConfig;
use crate::core::sundial::DayPhase;
use crate::core::types::{AgentId, Tick};
use crate::entity::agent::{Agent, BotState};
use crate::entity::needs::{NeedKind, NeedLevel};
use crate::world::resources::ResourceKind;
use crate::world::Environment;

/// Noteworthy events in a bot's life
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Milestone {
    FirstHarvest { resource: ResourceKind },
    ShelterBuilt,
    ChildBorn { child: String },
}

/// Why a speech was produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "source")]
pub enum SpeechSource {
    /// A need entered a more severe bucket; `previous` is the tracker record
    /// to restore if the post is rejected
    Need {
        need: NeedKind,
        level: NeedLevel,
        previous: Option<NeedLevel>,
    },
    Milestone(Milestone),
    Chatter,
}

/// One post a bot wants to publish
#[derive(Debug, Clone, PartialEq)]
pub struct Speech {
    pub agent_id: AgentId,
    pub name: String,
    pub color: String,
    pub title: String,
    pub content: String,
    pub source: SpeechSource,
    pub tick: Tick,
}

fn speech(agent: &Agent, title: String, content: String, source: SpeechSource, tick: Tick) -> Speech {
    Speech {
        agent_id: agent.id,
        name: agent.name().to_string(),
        color: agent.appearance.color.clone(),
        title,
        content,
        source,
        tick,
    }
}

fn need_text(name: &str, need: NeedKind, level: NeedLevel) -> (String, String) {
    let label = need.label();
    match level {
        NeedLevel::Seeking => (
            format!("Looking for {}", label),
            format!("{} here. Running a little low on {}, going to sort that out.", name, label),
        ),
        NeedLevel::Critical => (
            format!("Urgent: {}", label),
            format!("{} needs {} badly. Dropping everything else.", name, label),
        ),
        NeedLevel::Zero => (
            format!("Out of {}", label),
            format!("{} has no {} left at all. This is getting dangerous.", name, label),
        ),
        NeedLevel::Normal => (
            format!("{} is fine", label),
            format!("{} feels fine about {}.", name, label),
        ),
    }
}

fn milestone_text(name: &str, milestone: &Milestone) -> (String, String) {
    match milestone {
        Milestone::FirstHarvest { resource } => (
            format!("First {}", resource_label(*resource)),
            format!("{} just gathered {} for the first time.", name, resource_label(*resource)),
        ),
        Milestone::ShelterBuilt => (
            "Shelter finished".to_string(),
            format!("{} finished building a shelter. Finally a roof.", name),
        ),
        Milestone::ChildBorn { child } => (
            format!("Welcome, {}", child),
            format!("{} is now a parent. Say hello to {}.", name, child),
        ),
    }
}

fn resource_label(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Water => "water",
        ResourceKind::Food => "corn",
        ResourceKind::Wood => "wood",
        ResourceKind::Stone => "stone",
    }
}

/// Update the announcement tracker for every need and return the post due,
/// if any
///
/// Only the most severe due need is announced per tick (ties go to the
/// higher-priority need). Nothing is recorded while the speech cooldown
/// runs, so the post fires on the first tick after it expires.
pub fn announce_needs(agent: &mut Agent, config: &EngineConfig, tick: Tick) -> Option<Speech> {
    let mut due: Option<(NeedKind, NeedLevel)> = None;
    for kind in NeedKind::ALL {
        let level = agent.needs.level(kind, &config.needs);
        if let Some(level) = agent.announcements.observe(kind, level) {
            match due {
                Some((_, worst)) if level <= worst => {}
                _ => due = Some((kind, level)),
            }
        }
    }

    let (need, level) = due?;
    if agent.speak_cooldown > 0.0 {
        return None;
    }

    let previous = agent.announcements.record(need, level);
    agent.speak_cooldown = config.agents.speak_cooldown_secs;
    let (title, content) = need_text(agent.name(), need, level);
    Some(speech(
        agent,
        title,
        content,
        SpeechSource::Need { need, level, previous },
        tick,
    ))
}

/// Milestones skip the cooldown but still restart it
pub fn milestone(agent: &mut Agent, milestone: Milestone, config: &EngineConfig, tick: Tick) -> Speech {
    agent.speak_cooldown = config.agents.speak_cooldown_secs;
    let (title, content) = milestone_text(agent.name(), &milestone);
    speech(agent, title, content, SpeechSource::Milestone(milestone), tick)
}

/// Roll for periodic chatter; an idle bot that speaks enters `Speaking`
pub fn maybe_chatter<R: Rng>(
    agent: &mut Agent,
    env: &Environment,
    config: &EngineConfig,
    rng: &mut R,
    dt: f32,
    tick: Tick,
) -> Option<Speech> {
    agent.chatter_timer -= dt;
    if agent.chatter_timer > 0.0 {
        return None;
    }
    agent.chatter_timer = config.agents.chatter_interval_secs;

    if agent.state != BotState::Idle || agent.speak_cooldown > 0.0 {
        return None;
    }
    if !rng.gen_bool(config.agents.chatter_chance.clamp(0.0, 1.0) as f64) {
        return None;
    }

    let content = chatter_line(agent, env, rng);
    agent.state = BotState::Speaking;
    agent.action_timer = config.agents.speak_secs;
    agent.speak_cooldown = config.agents.speak_cooldown_secs;
    Some(speech(
        agent,
        format!("{} says", agent.name()),
        content,
        SpeechSource::Chatter,
        tick,
    ))
}

fn chatter_line<R: Rng>(agent: &Agent, env: &Environment, rng: &mut R) -> String {
    let mut lines = vec![match env.sundial.phase() {
        DayPhase::Dawn => "Sun's coming up. Good time to get moving.".to_string(),
        DayPhase::Day => "Nice day out here.".to_string(),
        DayPhase::Dusk => "Getting dark soon, better think about shelter.".to_string(),
        DayPhase::Night => "Cold night. Stars are out though.".to_string(),
    }];

    let built = env.shelters.built_count();
    if built > 0 {
        lines.push(format!("{} shelters standing so far. The place is growing.", built));
    }
    if agent.inventory.wood > 0 || agent.inventory.stone > 0 {
        lines.push(format!(
            "Carrying {} wood and {} stone. Building is hard work.",
            agent.inventory.wood, agent.inventory.stone
        ));
    }
    if agent.counters.harvested > 0 {
        lines.push(format!("Gathered {} units so far.", agent.counters.harvested));
    }
    lines.choose(rng).cloned().unwrap_or_default()
}
