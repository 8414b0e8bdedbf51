//! Bot record: identity, display attributes, movement, inventory and counters

use serde::{Deserialize, Serialize};

use crate::core::types::{now_millis, AgentId, ShelterId, SpotId, Tick, Vec3};
use crate::entity::needs::{AnnouncementTracker, NeedKind, Needs};
use crate::world::resources::ResourceKind;

/// Body shape used by renderers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyShape {
    Capsule,
    Cube,
    Cone,
    Sphere,
}

impl BodyShape {
    pub const ALL: [BodyShape; 4] = [
        BodyShape::Capsule,
        BodyShape::Cube,
        BodyShape::Cone,
        BodyShape::Sphere,
    ];
}

/// Display attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appearance {
    pub name: String,
    /// CSS hex color, e.g. "#e76f51"
    pub color: String,
    pub shape: BodyShape,
    pub width: f32,
    pub height: f32,
}

/// Discrete behavioral state of a bot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BotState {
    Idle,
    Wandering,
    SeekingResource(ResourceKind),
    Moving,
    Gathering,
    Building,
    Resting,
    Speaking,
    Coupling,
}

impl BotState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BotState::Idle => "idle",
            BotState::Wandering => "wandering",
            BotState::SeekingResource(_) => "seeking",
            BotState::Moving => "moving",
            BotState::Gathering => "gathering",
            BotState::Building => "building",
            BotState::Resting => "resting",
            BotState::Speaking => "speaking",
            BotState::Coupling => "coupling",
        }
    }

    /// States that follow a path
    pub fn is_travelling(&self) -> bool {
        matches!(
            self,
            BotState::Wandering | BotState::SeekingResource(_) | BotState::Moving
        )
    }

    /// Timed actions that run until `action_timer` expires
    pub fn is_timed(&self) -> bool {
        matches!(
            self,
            BotState::Gathering | BotState::Speaking | BotState::Coupling
        )
    }
}

/// What the bot is currently trying to achieve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Goal {
    /// Walk to a spot and harvest it; `need` is set when the harvest is
    /// meant to satisfy a need directly (drink/eat on the spot)
    Harvest {
        spot: SpotId,
        kind: ResourceKind,
        need: Option<NeedKind>,
    },
    /// Rest for sleep/warmth/health; in a shelter when one is given
    Rest { shelter: Option<ShelterId> },
    /// Claim (if needed) and construct a shelter
    Build { shelter: ShelterId },
    /// Leave the shelter for fresh air
    Breathe,
    /// Meet the paired partner
    Couple { partner: AgentId },
    /// Stroll to a random point
    Wander,
}

impl Goal {
    /// Need this goal replenishes, if any
    pub fn serves(&self) -> Option<NeedKind> {
        match self {
            Goal::Harvest { need, .. } => *need,
            Goal::Rest { .. } => None,
            Goal::Breathe => Some(NeedKind::Air),
            Goal::Couple { .. } => Some(NeedKind::Reproduction),
            Goal::Build { .. } | Goal::Wander => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub wood: u32,
    pub stone: u32,
    pub water: u32,
    pub food: u32,
}

impl Inventory {
    pub fn get(&self, kind: ResourceKind) -> u32 {
        match kind {
            ResourceKind::Water => self.water,
            ResourceKind::Food => self.food,
            ResourceKind::Wood => self.wood,
            ResourceKind::Stone => self.stone,
        }
    }

    /// Add items up to `cap`; returns how many were stored
    pub fn add(&mut self, kind: ResourceKind, amount: u32, cap: u32) -> u32 {
        let slot = self.slot(kind);
        let stored = amount.min(cap.saturating_sub(*slot));
        *slot += stored;
        stored
    }

    /// Remove exactly `amount` items, or nothing if not enough are held
    pub fn take(&mut self, kind: ResourceKind, amount: u32) -> bool {
        let slot = self.slot(kind);
        if *slot < amount {
            return false;
        }
        *slot -= amount;
        true
    }

    fn slot(&mut self, kind: ResourceKind) -> &mut u32 {
        match kind {
            ResourceKind::Water => &mut self.water,
            ResourceKind::Food => &mut self.food,
            ResourceKind::Wood => &mut self.wood,
            ResourceKind::Stone => &mut self.stone,
        }
    }
}

/// Lifetime totals shown on the bot's card
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifetimeCounters {
    pub harvested: u32,
    pub posts: u32,
    /// Votes are counted by the content service; the engine only carries them
    pub votes: u32,
    pub shelters_built: u32,
    pub children: u32,
}

/// A single bot
#[derive(Debug, Clone)]
pub struct Agent {
    pub id: AgentId,
    pub appearance: Appearance,
    pub position: Vec3,
    /// Final destination of the current path
    pub target: Option<Vec3>,
    pub path: Vec<Vec3>,
    pub path_cursor: usize,
    /// NavGrid version the path was computed against
    pub path_version: u64,
    pub speed: f32,
    pub state: BotState,
    pub goal: Option<Goal>,
    pub needs: Needs,
    pub announcements: AnnouncementTracker,
    pub inventory: Inventory,
    /// Owned shelter
    pub shelter: Option<ShelterId>,
    /// Shelter the bot is currently inside
    pub sheltered_in: Option<ShelterId>,
    pub partner: Option<AgentId>,
    pub counters: LifetimeCounters,
    pub birth_tick: Tick,
    pub spawned_at_ms: u64,
    /// Remaining seconds of the current timed action
    pub action_timer: f32,
    /// Remaining seconds before a failed goal may be retried
    pub retry_cooldown: f32,
    /// Remaining seconds before the bot may post again
    pub speak_cooldown: f32,
    /// Seconds until the next chatter roll
    pub chatter_timer: f32,
    /// Seconds spent with homeostasis at zero
    pub zero_health_secs: f32,
    /// Set when a coupling action finished; consumed by the world
    pub coupling_complete: bool,
}

impl Agent {
    pub fn new(id: AgentId, appearance: Appearance, position: Vec3, speed: f32, tick: Tick) -> Self {
        Self {
            id,
            appearance,
            position,
            target: None,
            path: Vec::new(),
            path_cursor: 0,
            path_version: 0,
            speed,
            state: BotState::Idle,
            goal: None,
            needs: Needs::default(),
            announcements: AnnouncementTracker::new(),
            inventory: Inventory::default(),
            shelter: None,
            sheltered_in: None,
            partner: None,
            counters: LifetimeCounters::default(),
            birth_tick: tick,
            spawned_at_ms: now_millis(),
            action_timer: 0.0,
            retry_cooldown: 0.0,
            speak_cooldown: 0.0,
            chatter_timer: 0.0,
            zero_health_secs: 0.0,
            coupling_complete: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.appearance.name
    }

    pub fn set_path(&mut self, path: Vec<Vec3>, version: u64) {
        self.target = path.last().copied();
        self.path = path;
        self.path_cursor = 0;
        self.path_version = version;
    }

    pub fn clear_path(&mut self) {
        self.path.clear();
        self.path_cursor = 0;
        self.target = None;
    }

    pub fn current_waypoint(&self) -> Option<Vec3> {
        self.path.get(self.path_cursor).copied()
    }

    pub fn path_exhausted(&self) -> bool {
        self.path_cursor >= self.path.len()
    }

    /// Drop goal and path and go idle
    pub fn abandon_goal(&mut self) {
        self.goal = None;
        self.clear_path();
        self.state = BotState::Idle;
    }
}
