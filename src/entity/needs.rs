//! Decaying physiological needs that drive bot behavior
//!
//! Every need is a value in `[0, max_value]` where the maximum means fully
//! satisfied. Values only go down between replenishment events.

use serde::{Deserialize, Serialize};

use crate::core::config::NeedsConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NeedKind {
    Water,
    Food,
    Sleep,
    Air,
    Clothing,
    Homeostasis,
    Reproduction,
}

impl NeedKind {
    /// All needs in tie-break priority order (survival first)
    pub const ALL: [NeedKind; 7] = [
        NeedKind::Air,
        NeedKind::Water,
        NeedKind::Homeostasis,
        NeedKind::Food,
        NeedKind::Sleep,
        NeedKind::Clothing,
        NeedKind::Reproduction,
    ];

    /// Lower value = more important when two needs are equally low
    pub fn priority(&self) -> u8 {
        match self {
            NeedKind::Air => 0,
            NeedKind::Water => 1,
            NeedKind::Homeostasis => 2,
            NeedKind::Food => 3,
            NeedKind::Sleep => 4,
            NeedKind::Clothing => 5,
            NeedKind::Reproduction => 6,
        }
    }

    pub fn is_survival(&self) -> bool {
        !matches!(self, NeedKind::Reproduction)
    }

    pub fn label(&self) -> &'static str {
        match self {
            NeedKind::Water => "water",
            NeedKind::Food => "food",
            NeedKind::Sleep => "sleep",
            NeedKind::Air => "air",
            NeedKind::Clothing => "warmth",
            NeedKind::Homeostasis => "health",
            NeedKind::Reproduction => "companionship",
        }
    }

    fn index(&self) -> usize {
        self.priority() as usize
    }
}

/// Urgency bucket of a need, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NeedLevel {
    Normal,
    Seeking,
    Critical,
    Zero,
}

impl NeedLevel {
    pub fn is_urgent(&self) -> bool {
        matches!(self, NeedLevel::Critical | NeedLevel::Zero)
    }
}

/// Environment inputs to need decay for one tick
#[derive(Debug, Clone, Copy, Default)]
pub struct DecayContext {
    /// Bot is resting inside a built shelter
    pub sheltered: bool,
    /// Sundial reads night
    pub night: bool,
}

/// Per-bot needs vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Needs {
    pub water: f32,
    pub food: f32,
    pub sleep: f32,
    pub air: f32,
    pub clothing: f32,
    pub homeostasis: f32,
    pub reproduction: f32,
}

impl Default for Needs {
    fn default() -> Self {
        Self::full(100.0)
    }
}

impl Needs {
    pub fn full(max_value: f32) -> Self {
        Self {
            water: max_value,
            food: max_value,
            sleep: max_value,
            air: max_value,
            clothing: max_value,
            homeostasis: max_value,
            reproduction: max_value,
        }
    }

    pub fn get(&self, kind: NeedKind) -> f32 {
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

    fn slot(&mut self, kind: NeedKind) -> &mut f32 {
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

    /// Set a need directly, clamped into range
    pub fn set(&mut self, kind: NeedKind, value: f32, config: &NeedsConfig) {
        *self.slot(kind) = value.clamp(0.0, config.max_value);
    }

    /// Classify a need against its thresholds
    pub fn level(&self, kind: NeedKind, config: &NeedsConfig) -> NeedLevel {
        let value = self.get(kind);
        let t = config.thresholds.get(kind);
        if value <= 0.0 {
            NeedLevel::Zero
        } else if value <= t.critical {
            NeedLevel::Critical
        } else if value <= t.seeking {
            NeedLevel::Seeking
        } else {
            NeedLevel::Normal
        }
    }

    /// Decay needs over time (called each tick)
    pub fn decay(&mut self, dt: f32, ctx: DecayContext, config: &NeedsConfig) {
        let rates = &config.decay;

        self.lower(NeedKind::Water, rates.water * dt);
        self.lower(NeedKind::Food, rates.food * dt);
        self.lower(NeedKind::Sleep, rates.sleep * dt);
        self.lower(NeedKind::Reproduction, rates.reproduction * dt);

        let clothing_mult = if ctx.night { config.night_clothing_multiplier } else { 1.0 };
        self.lower(NeedKind::Clothing, rates.clothing * clothing_mult * dt);

        // Shelters are stuffy; fresh air comes back outdoors
        if ctx.sheltered {
            self.lower(NeedKind::Air, rates.air * dt);
        } else {
            self.replenish(NeedKind::Air, config.air_recovery_rate * dt, config);
        }

        let exhausted = NeedKind::ALL
            .iter()
            .filter(|k| k.is_survival() && **k != NeedKind::Homeostasis)
            .filter(|k| self.get(**k) <= 0.0)
            .count();
        if exhausted > 0 {
            let penalty = config.homeostasis_penalty_rate * exhausted as f32 * dt;
            self.lower(NeedKind::Homeostasis, penalty + rates.homeostasis * dt);
        } else if !self.any_survival_urgent(config) {
            self.replenish(
                NeedKind::Homeostasis,
                config.homeostasis_recovery_rate * dt,
                config,
            );
        } else {
            self.lower(NeedKind::Homeostasis, rates.homeostasis * dt);
        }
    }

    fn lower(&mut self, kind: NeedKind, amount: f32) {
        let slot = self.slot(kind);
        *slot = (*slot - amount.max(0.0)).max(0.0);
    }

    /// Replenish a need, never above the configured maximum
    pub fn replenish(&mut self, kind: NeedKind, amount: f32, config: &NeedsConfig) {
        let slot = self.slot(kind);
        *slot = (*slot + amount.max(0.0)).min(config.max_value);
    }

    fn any_survival_urgent(&self, config: &NeedsConfig) -> bool {
        NeedKind::ALL
            .iter()
            .filter(|k| k.is_survival() && **k != NeedKind::Homeostasis)
            .any(|k| self.level(*k, config).is_urgent())
    }

    /// The single most urgent need among those in critical or zero state
    ///
    /// Lowest value wins; ties go to the higher-priority need.
    pub fn urgent_need(&self, config: &NeedsConfig) -> Option<NeedKind> {
        self.lowest_at_or_above(NeedLevel::Critical, config)
    }

    fn lowest_at_or_above(&self, floor: NeedLevel, config: &NeedsConfig) -> Option<NeedKind> {
        // ALL is in priority order, so the first minimum found wins ties
        let mut best: Option<(NeedKind, f32)> = None;
        for kind in NeedKind::ALL {
            if self.level(kind, config) < floor {
                continue;
            }
            let value = self.get(kind);
            match best {
                Some((_, best_value)) if value >= best_value => {}
                _ => best = Some((kind, value)),
            }
        }
        best.map(|(kind, _)| kind)
    }

    /// True when every survival need is `normal`
    pub fn survival_settled(&self, config: &NeedsConfig) -> bool {
        NeedKind::ALL
            .iter()
            .filter(|k| k.is_survival())
            .all(|k| self.level(*k, config) == NeedLevel::Normal)
    }
}

/// Remembers which severity bucket was last announced per need
///
/// One post per need episode per bucket: a post is due when a need enters a
/// bucket more severe than the last one announced, and the record clears
/// once the need is back to normal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnouncementTracker {
    announced: [Option<NeedLevel>; 7],
}

impl AnnouncementTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the record for the current level; returns the level to
    /// announce when a post is due
    pub fn observe(&mut self, kind: NeedKind, level: NeedLevel) -> Option<NeedLevel> {
        let slot = &mut self.announced[kind.index()];
        if level == NeedLevel::Normal {
            *slot = None;
            return None;
        }
        match *slot {
            Some(last) if level <= last => None,
            _ => Some(level),
        }
    }

    /// Record an announcement; returns the previous record for rollback
    pub fn record(&mut self, kind: NeedKind, level: NeedLevel) -> Option<NeedLevel> {
        std::mem::replace(&mut self.announced[kind.index()], Some(level))
    }

    /// Undo a record after a soft publish failure
    pub fn restore(&mut self, kind: NeedKind, previous: Option<NeedLevel>) {
        self.announced[kind.index()] = previous;
    }

    pub fn last_announced(&self, kind: NeedKind) -> Option<NeedLevel> {
        self.announced[kind.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> NeedsConfig {
        NeedsConfig::default()
    }

    #[test]
    fn test_level_classification() {
        let cfg = config();
        let mut needs = Needs::default();
        assert_eq!(needs.level(NeedKind::Food, &cfg), NeedLevel::Normal);

        needs.set(NeedKind::Food, 45.0, &cfg);
        assert_eq!(needs.level(NeedKind::Food, &cfg), NeedLevel::Seeking);

        needs.set(NeedKind::Food, 20.0, &cfg);
        assert_eq!(needs.level(NeedKind::Food, &cfg), NeedLevel::Critical);

        needs.set(NeedKind::Food, 0.0, &cfg);
        assert_eq!(needs.level(NeedKind::Food, &cfg), NeedLevel::Zero);
    }

    #[test]
    fn test_decay_never_negative() {
        let cfg = config();
        let mut needs = Needs::full(1.0);
        for _ in 0..100 {
            needs.decay(1.0, DecayContext::default(), &cfg);
        }
        for kind in NeedKind::ALL {
            assert!(needs.get(kind) >= 0.0, "{:?} went negative", kind);
        }
        assert_eq!(needs.water, 0.0);
    }

    #[test]
    fn test_air_decays_only_when_sheltered() {
        let cfg = config();
        let mut needs = Needs::default();
        needs.decay(1.0, DecayContext { sheltered: true, night: false }, &cfg);
        assert!(needs.air < cfg.max_value);

        let before = needs.air;
        needs.decay(1.0, DecayContext::default(), &cfg);
        assert!(needs.air > before);
    }

    #[test]
    fn test_night_speeds_up_clothing_decay() {
        let cfg = config();
        let mut day = Needs::default();
        let mut night = Needs::default();
        day.decay(10.0, DecayContext::default(), &cfg);
        night.decay(10.0, DecayContext { sheltered: false, night: true }, &cfg);
        assert!(night.clothing < day.clothing);
    }

    #[test]
    fn test_zero_need_penalizes_homeostasis() {
        let cfg = config();
        let mut needs = Needs::default();
        needs.set(NeedKind::Water, 0.0, &cfg);
        let before = needs.homeostasis;
        needs.decay(1.0, DecayContext::default(), &cfg);
        assert!(needs.homeostasis < before);
    }

    #[test]
    fn test_replenish_clamps_at_max() {
        let cfg = config();
        let mut needs = Needs::default();
        needs.set(NeedKind::Water, 95.0, &cfg);
        needs.replenish(NeedKind::Water, 50.0, &cfg);
        assert_eq!(needs.water, cfg.max_value);
    }

    #[test]
    fn test_urgent_need_picks_lowest() {
        let cfg = config();
        let mut needs = Needs::default();
        needs.set(NeedKind::Food, 15.0, &cfg);
        needs.set(NeedKind::Sleep, 5.0, &cfg);
        needs.set(NeedKind::Water, 40.0, &cfg); // only seeking
        assert_eq!(needs.urgent_need(&cfg), Some(NeedKind::Sleep));
    }

    #[test]
    fn test_urgent_need_tie_uses_priority() {
        let cfg = config();
        let mut needs = Needs::default();
        needs.set(NeedKind::Food, 10.0, &cfg);
        needs.set(NeedKind::Water, 10.0, &cfg);
        needs.set(NeedKind::Reproduction, 10.0, &cfg);
        assert_eq!(needs.urgent_need(&cfg), Some(NeedKind::Water));
    }

    #[test]
    fn test_no_urgent_need_when_settled() {
        let cfg = config();
        let needs = Needs::default();
        assert_eq!(needs.urgent_need(&cfg), None);
        assert!(needs.survival_settled(&cfg));
    }

    #[test]
    fn test_tracker_announces_each_bucket_once() {
        let mut tracker = AnnouncementTracker::new();
        let kind = NeedKind::Food;

        assert_eq!(tracker.observe(kind, NeedLevel::Seeking), Some(NeedLevel::Seeking));
        tracker.record(kind, NeedLevel::Seeking);
        assert_eq!(tracker.observe(kind, NeedLevel::Seeking), None);

        assert_eq!(tracker.observe(kind, NeedLevel::Critical), Some(NeedLevel::Critical));
        tracker.record(kind, NeedLevel::Critical);
        // Improving back to seeking within the same episode stays quiet
        assert_eq!(tracker.observe(kind, NeedLevel::Seeking), None);

        // Resolution clears the episode
        assert_eq!(tracker.observe(kind, NeedLevel::Normal), None);
        assert_eq!(tracker.last_announced(kind), None);
        assert_eq!(tracker.observe(kind, NeedLevel::Seeking), Some(NeedLevel::Seeking));
    }

    #[test]
    fn test_tracker_restore_after_failure() {
        let mut tracker = AnnouncementTracker::new();
        let previous = tracker.record(NeedKind::Water, NeedLevel::Critical);
        tracker.restore(NeedKind::Water, previous);
        assert_eq!(
            tracker.observe(NeedKind::Water, NeedLevel::Critical),
            Some(NeedLevel::Critical)
        );
    }
}
