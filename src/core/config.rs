//! Engine configuration with documented constants
//!
//! All magic numbers are collected here with explanations of their purpose
//! and how they interact with each other. The config is loaded once at
//! startup and handed to every subsystem call explicitly.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{EngineError, Result};
use crate::entity::needs::NeedKind;

/// Top-level configuration for the engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub world: WorldConfig,
    pub needs: NeedsConfig,
    pub agents: AgentConfig,
    pub nav: NavConfig,
    pub clock: ClockConfig,
    pub server: ServerConfig,
    pub publish: PublishConfig,
}

// === WORLD ===

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Seed for world generation; the same seed always rebuilds the same world
    pub seed: u64,

    /// Number of bots spawned at world creation (and after every reset)
    pub agent_count: usize,

    /// Population cap; births are skipped once reached
    pub max_agents: usize,

    /// Smallest allowed ground radius (world units)
    pub min_ground_radius: f32,

    /// Ground radius grows with sqrt(agent count) times this spacing
    ///
    /// At 12.0, 5 bots fit in the 30-unit minimum and 16 bots
    /// get a 48-unit disc.
    pub spacing_per_agent: f32,

    /// Spot counts per resource kind at world creation
    pub water_spots: usize,
    pub food_spots: usize,
    pub wood_spots: usize,
    pub stone_spots: usize,

    /// Capacities per resource kind (units)
    pub water_capacity: f32,
    pub food_capacity: f32,
    pub wood_capacity: f32,
    pub stone_capacity: f32,

    /// Regrowth per simulated second; 0.0 disables regrowth
    ///
    /// Wood defaults to 0.0 so clear-cut forest patches disappear.
    /// Stone also defaults to 0.0 but quarries stay on the map when empty.
    pub water_regrow_rate: f32,
    pub food_regrow_rate: f32,
    pub wood_regrow_rate: f32,
    pub stone_regrow_rate: f32,

    /// Interaction radius of a resource spot
    pub spot_radius: f32,

    /// Shelter plots created in addition to one per bot
    pub spare_plots: usize,

    /// Radius of a built shelter's blocking footprint
    pub shelter_footprint: f32,

    /// Simulated seconds per full day on the sundial
    pub day_length_secs: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            agent_count: 5,
            max_agents: 24,
            min_ground_radius: 30.0,
            spacing_per_agent: 12.0,
            water_spots: 2,
            food_spots: 4,
            wood_spots: 5,
            stone_spots: 2,
            water_capacity: 50.0,
            food_capacity: 10.0,
            wood_capacity: 15.0,
            stone_capacity: 25.0,
            water_regrow_rate: 1.0,
            food_regrow_rate: 0.05,
            wood_regrow_rate: 0.0,
            stone_regrow_rate: 0.0,
            spot_radius: 1.5,
            spare_plots: 2,
            shelter_footprint: 1.2,
            day_length_secs: 240.0,
        }
    }
}

impl WorldConfig {
    /// Ground radius for a given population
    pub fn ground_radius_for(&self, agent_count: usize) -> f32 {
        let scaled = self.spacing_per_agent * (agent_count as f32).sqrt();
        scaled.max(self.min_ground_radius)
    }
}

// === NEEDS ===

/// One value per need kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerNeed<T> {
    pub water: T,
    pub food: T,
    pub sleep: T,
    pub air: T,
    pub clothing: T,
    pub homeostasis: T,
    pub reproduction: T,
}

impl<T: Copy> PerNeed<T> {
    pub fn splat(value: T) -> Self {
        Self {
            water: value,
            food: value,
            sleep: value,
            air: value,
            clothing: value,
            homeostasis: value,
            reproduction: value,
        }
    }

    pub fn get(&self, kind: NeedKind) -> T {
        match kind {
            NeedKind::Water => self.water,
            NeedKind::Food => self.food,
            NeedKind::Sleep => self.sleep,
            NeedKind::Air => self.air,
            NeedKind::Clothing => self.clothing,
            NeedKind::Homeostasis => self.homeostasis,
            NeedKind::Reproduction => self.reproduction,
        }
    }

    pub fn get_mut(&mut self, kind: NeedKind) -> &mut T {
        match kind {
            NeedKind::Water => &mut self.water,
            NeedKind::Food => &mut self.food,
            NeedKind::Sleep => &mut self.sleep,
            NeedKind::Air => &mut self.air,
            NeedKind::Clothing => &mut self.clothing,
            NeedKind::Homeostasis => &mut self.homeostasis,
            NeedKind::Reproduction => &mut self.reproduction,
        }
    }
}

/// Classification thresholds for a single need
///
/// A value at or below `seeking` makes the bot pursue replenishment,
/// at or below `critical` overrides every other goal, and 0.0 is `zero`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub seeking: f32,
    pub critical: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NeedsConfig {
    /// Upper bound of every need value
    pub max_value: f32,

    /// Decay per simulated second
    ///
    /// Air decays only while the bot is inside a shelter, clothing decays
    /// at `night_clothing_multiplier` times the rate after dusk, and
    /// homeostasis is driven by the other needs rather than this table.
    pub decay: PerNeed<f32>,

    pub thresholds: PerNeed<Thresholds>,

    /// Clothing decay multiplier while the sundial reads night
    pub night_clothing_multiplier: f32,

    /// Air regained per second outdoors
    pub air_recovery_rate: f32,

    /// Homeostasis lost per second for each survival need at zero
    pub homeostasis_penalty_rate: f32,

    /// Homeostasis regained per second while no survival need is critical
    pub homeostasis_recovery_rate: f32,

    /// Need restored per unit of water drunk / food eaten
    pub water_per_unit: f32,
    pub food_per_unit: f32,

    /// Sleep restored per second resting inside a built shelter / outdoors
    pub sleep_rate_sheltered: f32,
    pub sleep_rate_outdoors: f32,

    /// Clothing (warmth) restored per second inside a built shelter
    pub warmth_rate_sheltered: f32,
}

impl Default for NeedsConfig {
    fn default() -> Self {
        let default_thresholds = Thresholds { seeking: 50.0, critical: 20.0 };
        Self {
            max_value: 100.0,
            decay: PerNeed {
                water: 0.8,
                food: 0.5,
                sleep: 0.35,
                air: 2.0,
                clothing: 0.2,
                homeostasis: 0.0,
                reproduction: 0.15,
            },
            thresholds: PerNeed {
                air: Thresholds { seeking: 60.0, critical: 30.0 },
                reproduction: Thresholds { seeking: 40.0, critical: 10.0 },
                ..PerNeed::splat(default_thresholds)
            },
            night_clothing_multiplier: 3.0,
            air_recovery_rate: 5.0,
            homeostasis_penalty_rate: 1.0,
            homeostasis_recovery_rate: 0.2,
            water_per_unit: 12.0,
            food_per_unit: 15.0,
            sleep_rate_sheltered: 4.0,
            sleep_rate_outdoors: 2.0,
            warmth_rate_sheltered: 3.0,
        }
    }
}

// === AGENTS ===

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Movement speed (world units per simulated second)
    pub move_speed: f32,

    /// Distance at which a target counts as reached
    pub approach_distance: f32,

    /// Units requested from a spot per harvest action
    pub harvest_amount: f32,

    /// Per-tick chance that an idle bot starts wandering
    pub idle_wander_chance: f32,

    /// Maximum distance of a random wander target
    pub wander_radius: f32,

    /// Maximum distance searched for a resource spot
    pub search_radius: f32,

    /// Back-off after a failed path request before retrying the goal
    pub path_fail_cooldown_secs: f32,

    /// Durations of timed actions
    pub gather_secs: f32,
    pub speak_secs: f32,
    pub coupling_secs: f32,

    /// Build progress added per construction increment (out of 100)
    pub build_increment: f32,

    /// Seconds between construction increments while building
    pub build_interval_secs: f32,

    /// Materials consumed per construction increment
    pub wood_per_increment: u32,
    pub stone_per_increment: u32,

    /// Per-item inventory cap
    pub inventory_cap: u32,

    /// Sleep value at which a resting bot gets up
    pub rest_until: f32,

    /// Minimum simulated seconds between two posts of the same bot
    pub speak_cooldown_secs: f32,

    /// Periodic chatter: interval and chance per interval
    pub chatter_interval_secs: f32,
    pub chatter_chance: f32,

    /// Seconds with homeostasis at zero before a bot expires
    pub expiry_grace_secs: f32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            move_speed: 3.0,
            approach_distance: 0.8,
            harvest_amount: 3.0,
            idle_wander_chance: 0.02,
            wander_radius: 10.0,
            search_radius: 120.0,
            path_fail_cooldown_secs: 5.0,
            gather_secs: 2.0,
            speak_secs: 2.0,
            coupling_secs: 6.0,
            build_increment: 20.0,
            build_interval_secs: 1.5,
            wood_per_increment: 1,
            stone_per_increment: 1,
            inventory_cap: 10,
            rest_until: 90.0,
            speak_cooldown_secs: 30.0,
            chatter_interval_secs: 60.0,
            chatter_chance: 0.3,
            expiry_grace_secs: 30.0,
        }
    }
}

// === NAVIGATION ===

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavConfig {
    /// Size of one navigation cell (world units)
    pub cell_size: f32,

    /// Node-expansion ceiling for one A* search
    ///
    /// Searches that hit the ceiling report NotFound. The default covers a
    /// full 120x120 grid, so it only trips on pathological maps.
    pub max_expansions: usize,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            cell_size: 1.0,
            max_expansions: 20_000,
        }
    }
}

// === CLOCK ===

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Wall-clock tick interval at 1x speed
    pub base_tick_ms: u64,

    /// Simulated seconds advanced per tick
    pub sim_dt_secs: f32,

    /// Speed multipliers accepted from `sim:speed`
    pub allowed_speeds: Vec<f32>,

    /// Speed at startup and after reset
    pub initial_speed: f32,

    /// Send `world:update` every N ticks
    pub broadcast_every_ticks: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            base_tick_ms: 100,
            sim_dt_secs: 0.1,
            allowed_speeds: vec![1.0, 2.0, 4.0],
            initial_speed: 1.0,
            broadcast_every_ticks: 2,
        }
    }
}

// === SERVER ===

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address of the observer WebSocket endpoint
    pub bind: String,

    /// Messages buffered per observer before it starts lagging
    pub broadcast_capacity: usize,

    /// Inbound control commands buffered for the loop
    pub control_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:9001".into(),
            broadcast_capacity: 64,
            control_capacity: 32,
        }
    }
}

// === PUBLISH ===

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Base URL of the content service; None runs the offline publisher
    pub url: Option<String>,

    /// Bearer token for the content service
    pub api_key: Option<String>,

    /// Jobs buffered for the publish worker; overflow is a soft failure
    pub queue_capacity: usize,

    /// Request timeout
    pub timeout_secs: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            queue_capacity: 64,
            timeout_secs: 10,
        }
    }
}

impl EngineConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a TOML file; missing keys fall back to defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    pub fn parse_toml(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `HABITAT_PUBLISH_URL` / `HABITAT_PUBLISH_KEY` overrides
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("HABITAT_PUBLISH_URL") {
            self.publish.url = Some(url);
        }
        if let Ok(key) = std::env::var("HABITAT_PUBLISH_KEY") {
            self.publish.api_key = Some(key);
        }
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        for kind in NeedKind::ALL {
            let t = self.needs.thresholds.get(kind);
            if t.critical >= t.seeking {
                return Err(EngineError::InvalidConfig(format!(
                    "{:?}: critical threshold ({}) should be < seeking threshold ({})",
                    kind, t.critical, t.seeking
                )));
            }
            if t.seeking >= self.needs.max_value || t.critical <= 0.0 {
                return Err(EngineError::InvalidConfig(format!(
                    "{:?}: thresholds must lie strictly inside (0, {})",
                    kind, self.needs.max_value
                )));
            }
            if self.needs.decay.get(kind) < 0.0 {
                return Err(EngineError::InvalidConfig(format!(
                    "{:?}: decay rate must not be negative",
                    kind
                )));
            }
        }

        if self.nav.cell_size <= 0.0 {
            return Err(EngineError::InvalidConfig("nav.cell_size must be positive".into()));
        }

        if self.clock.allowed_speeds.is_empty()
            || self.clock.allowed_speeds.iter().any(|s| *s <= 0.0)
        {
            return Err(EngineError::InvalidConfig(
                "clock.allowed_speeds must be non-empty and positive".into(),
            ));
        }

        if !self.is_allowed_speed(self.clock.initial_speed) {
            return Err(EngineError::InvalidConfig(format!(
                "clock.initial_speed ({}) is not in allowed_speeds",
                self.clock.initial_speed
            )));
        }

        if self.clock.base_tick_ms == 0 || self.clock.sim_dt_secs <= 0.0 {
            return Err(EngineError::InvalidConfig("clock rates must be positive".into()));
        }

        if self.agents.build_increment <= 0.0 || self.agents.harvest_amount <= 0.0 {
            return Err(EngineError::InvalidConfig(
                "build_increment and harvest_amount must be positive".into(),
            ));
        }

        if self.world.agent_count > self.world.max_agents {
            return Err(EngineError::InvalidConfig(format!(
                "world.agent_count ({}) exceeds max_agents ({})",
                self.world.agent_count, self.world.max_agents
            )));
        }

        Ok(())
    }

    pub fn is_allowed_speed(&self, speed: f32) -> bool {
        self.clock
            .allowed_speeds
            .iter()
            .any(|s| (s - speed).abs() < f32::EPSILON)
    }
}
